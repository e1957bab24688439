mod server;

pub use server::{RecipeBounds, ServerConfig};

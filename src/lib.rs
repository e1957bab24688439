//! # Ladle
//!
//! A recipe sharing server, usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! ladle = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use ladle::config::RecipeBounds;
//! use ladle::server::{AppState, create_router};
//! use ladle::store::SqliteStore;
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/ladle.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: Arc::new(store),
//!     data_dir: PathBuf::from("./data"),
//!     bounds: RecipeBounds::default(),
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the command-line entry point. Disable with
//!   `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;

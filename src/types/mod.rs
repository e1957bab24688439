mod models;
mod relation;

pub use models::*;
pub use relation::RelationKind;

//! Local database layer for Mermaid Edit

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlDiagramStore, LocalStore};

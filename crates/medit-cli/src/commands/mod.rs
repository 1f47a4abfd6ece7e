pub mod common;
pub mod completions;
pub mod config;
pub mod conflicts;
pub mod delete;
pub mod edit;
pub mod export;
pub mod generate;
pub mod import;
pub mod list;
pub mod new;
pub mod show;
pub mod sync;

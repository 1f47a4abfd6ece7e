//! medit-core - Core library for Mermaid Edit
//!
//! Local diagram storage, the remote table client, and the local-first sync
//! engine that reconciles the two. The CLI is a thin shell over this crate.

pub mod ai;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{DiagramId, DiagramRecord};

//! Application-facing services built on the local store.

mod diagrams;

pub use diagrams::{DiagramService, DEFAULT_CONTENT};

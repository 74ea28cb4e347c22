//! Core type definitions shared by the pipeline, the GitHub clients and the HTTP layer.

pub mod credential;
pub mod repository;
pub mod search;

pub use credential::*;
pub use repository::*;
pub use search::*;

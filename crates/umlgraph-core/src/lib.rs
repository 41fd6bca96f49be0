pub mod config;
pub mod cypher;
pub mod error;
pub mod extraction;
pub mod identity;
pub mod ingest;
pub mod io;
pub mod merge;
pub mod model;
pub mod paths;
pub mod plan;
pub mod store;
pub mod validate;

pub use error::{GraphError, Result};

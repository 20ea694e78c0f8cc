//! Core abstractions for Stratoform: the error taxonomy, the typed
//! async-output model, the domain types, configuration loading, and the
//! provider trait seams (plus the in-memory simulated providers behind
//! them).

pub mod config;
pub mod error;
pub mod machine;
pub mod output;
pub mod provider;
pub mod resources;
pub mod types;

pub use error::{StratoformError, StratoformResult};
pub use output::{Output, Promise};
pub use types::{ClusterTopologySpec, NodeRole, ResourceId};

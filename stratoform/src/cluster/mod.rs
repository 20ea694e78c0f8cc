//! Cluster secret material, bootstrap configuration, and compute nodes.

pub mod compute;
pub mod secrets;

use thiserror::Error;

pub type StratoformResult<T> = std::result::Result<T, StratoformError>;

/// Error taxonomy for a provisioning run.
///
/// None of these are retried by the core: retry and reconciliation belong
/// to the provisioning engine behind the provider traits. Every error
/// propagates to the top-level orchestration call and terminates the run;
/// re-running the same topology against the engine's idempotent
/// create-or-update-by-name semantics is the recovery path.
#[derive(Error, Debug)]
pub enum StratoformError {
    /// A required setting is missing or malformed. Raised before any
    /// provisioning call is issued, so no partial infrastructure exists.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The provisioning engine rejected a create-or-update request.
    /// Aborts the dependent subgraph; sibling branches already issued may
    /// still complete.
    #[error("Provider rejected {operation} for '{resource}': {message}")]
    Provider {
        resource: String,
        operation: String,
        message: String,
    },

    /// A computed attribute (identifier, address, endpoint) never
    /// resolved. Blocks all direct and transitive consumers.
    #[error("Computed attribute '{attribute}' never resolved")]
    DependencyResolution { attribute: String },

    /// A caller broke an invariant the core enforces itself: double
    /// secrets issuance, interface counts not matching the topology,
    /// eager dereference of an unresolved output.
    #[error("Contract violation: {message}")]
    ContractViolation { message: String },

    #[error("Serialization operation '{operation}' failed: {message}")]
    Serialization { operation: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod config;
pub mod credentials;
pub mod error;
pub mod fallback;
pub mod providers;
pub mod stats;

// Re-export the surface most embedders touch so callers stay on short
// `atelierd::` paths.
pub use config::OrchestratorConfig;
pub use credentials::{Credential, CredentialPool, PoolRegistry, SharedPoolRegistry};
pub use error::{ErrorClass, FailureKind, InvokeError, OrchestrateError, RotationError};
pub use fallback::{FallbackEngine, FallbackSuccess, SharedFallbackEngine};
pub use providers::{Capability, InvokeOutput, ProviderRequest, RequestOptions};

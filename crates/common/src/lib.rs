pub mod counters;
pub mod credentials;
pub mod domain;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockCountersSink;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockCredentialSource;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDatastreamResolver;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockUploader;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Releases the network resources held by a connection's transport
#[async_trait]
pub trait TransportTeardown: Send + Sync {
    async fn teardown(&self);
}

/// Runs a transport's teardown at most once.
///
/// Shared between a connection's worker and its handle; whichever reaches
/// [`TransportGuard::teardown`] first performs it and any concurrent caller
/// waits for that teardown to finish.
pub struct TransportGuard {
    application_name: String,
    transport: Arc<dyn TransportTeardown>,
    done: OnceCell<()>,
}

impl TransportGuard {
    pub fn new(application_name: impl Into<String>, transport: Arc<dyn TransportTeardown>) -> Self {
        Self {
            application_name: application_name.into(),
            transport,
            done: OnceCell::new(),
        }
    }

    pub async fn teardown(&self) {
        self.done
            .get_or_init(|| async {
                debug!(application = %self.application_name, "tearing down transport");
                self.transport.teardown().await;
            })
            .await;
    }

    pub fn is_torn_down(&self) -> bool {
        self.done.initialized()
    }
}

impl std::fmt::Debug for TransportGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportGuard")
            .field("application_name", &self.application_name)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

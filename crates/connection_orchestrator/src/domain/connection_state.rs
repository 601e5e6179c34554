use common::domain::ConnectionState;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared, observable lifecycle state of one connection.
///
/// Readers never block the worker. Once `Stopped` is recorded no further
/// transition is accepted.
#[derive(Debug, Clone)]
pub struct ConnectionStateCell {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Move to `next`; returns false when the current state is terminal
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut accepted = false;
        self.tx.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            accepted = true;
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        accepted
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Resolves once the connection has reached `Stopped`
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        assert_eq!(ConnectionStateCell::new().get(), ConnectionState::Idle);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let cell = ConnectionStateCell::new();
        assert!(cell.transition(ConnectionState::Running));
        assert!(cell.transition(ConnectionState::Stopped));
        assert!(!cell.transition(ConnectionState::Running));
        assert_eq!(cell.get(), ConnectionState::Stopped);
    }

    #[test]
    fn test_clones_share_state() {
        let cell = ConnectionStateCell::new();
        let observer = cell.clone();
        cell.transition(ConnectionState::Degraded);
        assert_eq!(observer.get(), ConnectionState::Degraded);
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_transition() {
        let cell = ConnectionStateCell::new();
        let waiter = cell.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });

        cell.transition(ConnectionState::Running);
        cell.transition(ConnectionState::Stopped);

        task.await.unwrap();
    }
}

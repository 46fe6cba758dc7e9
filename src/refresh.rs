use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::store::TokenStore;
use crate::transport::ApiTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    Refreshed,
    Failed,
}

enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Collapses concurrent refresh triggers into a single exchange. The first
/// caller to arrive while Idle becomes the leader and performs the exchange;
/// everyone arriving while Refreshing waits on the leader's outcome.
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub(crate) async fn run(
        &self,
        store: &dyn TokenStore,
        transport: &dyn ApiTransport,
    ) -> RefreshOutcome {
        // The state lock guards only the marker and waiter list, never the
        // exchange itself.
        let waiter = {
            let mut state = self.state.lock().await;
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or(RefreshOutcome::Failed);
        }

        let outcome = self.exchange(store, transport).await;

        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };
        for tx in waiters {
            let _ = tx.send(outcome);
        }
        outcome
    }

    async fn exchange(
        &self,
        store: &dyn TokenStore,
        transport: &dyn ApiTransport,
    ) -> RefreshOutcome {
        let refresh_token = match store.load().await {
            Ok(Some(pair)) => pair.refresh_token,
            Ok(None) => {
                debug!("refresh requested with no stored refresh token");
                return RefreshOutcome::Failed;
            }
            Err(err) => {
                warn!("token store unreadable during refresh: {err}");
                return RefreshOutcome::Failed;
            }
        };

        match transport.refresh(&refresh_token).await {
            Ok(pair) => {
                if let Err(err) = store.save(&pair).await {
                    warn!("failed to persist refreshed tokens: {err}");
                    let _ = store.clear().await;
                    return RefreshOutcome::Failed;
                }
                debug!("token refresh succeeded");
                RefreshOutcome::Refreshed
            }
            Err(err) => {
                warn!("token refresh failed: {err}");
                let _ = store.clear().await;
                RefreshOutcome::Failed
            }
        }
    }
}

use std::sync::{Arc, Weak};

use alloy_primitives::Address;
use shared::{domain::BallotSnapshot, error::BallotError};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod abi;
pub mod config;
pub mod eth;
pub mod gate;
pub mod gateway;
pub mod orchestrator;
pub mod simulated;
pub mod state;
pub mod sync;
pub mod wallet;

pub use gate::{permitted_actions, Action, ActionSet};
pub use gateway::{ContractGateway, GatewayError, MissingWalletProvider, WalletProvider};
pub use orchestrator::{ActionRequest, SubmitReceipt, TransactionOrchestrator};
pub use state::{AppState, Session, StateStore};
pub use sync::{ResyncResult, StateSynchronizer};
pub use wallet::WalletSession;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionReplaced(Session),
    SnapshotUpdated(Arc<BallotSnapshot>),
    ResyncFailed(BallotError),
    /// A resync finished after the session changed and was dropped.
    ResyncDiscarded,
    SubmissionStarted {
        action: Action,
    },
    SubmissionConfirmed(SubmitReceipt),
    SubmissionFailed {
        action: Action,
        error: BallotError,
    },
}

/// Client for one ballot contract and one wallet session.
pub struct BallotClient {
    store: StateStore,
    wallet: WalletSession,
    synchronizer: Arc<StateSynchronizer>,
    orchestrator: TransactionOrchestrator,
    events: broadcast::Sender<ClientEvent>,
    account_listener: Mutex<Option<JoinHandle<()>>>,
}

impl BallotClient {
    pub fn new(gateway: Arc<dyn ContractGateway>, provider: Arc<dyn WalletProvider>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let store = StateStore::new();
        let synchronizer = Arc::new(StateSynchronizer::new(
            Arc::clone(&gateway),
            store.clone(),
            events.clone(),
        ));
        let orchestrator = TransactionOrchestrator::new(
            gateway,
            store.clone(),
            Arc::clone(&synchronizer),
            events.clone(),
        );
        Arc::new(Self {
            wallet: WalletSession::new(provider, store.clone()),
            store,
            synchronizer,
            orchestrator,
            events,
            account_listener: Mutex::new(None),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.store.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<Arc<AppState>> {
        self.store.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> Session {
        self.wallet.current()
    }

    /// Connects the wallet, starts listening for account changes and loads
    /// the ballot for the new identity.
    pub async fn connect(self: &Arc<Self>) -> Result<Session, BallotError> {
        let accounts = self.wallet.subscribe_accounts();
        let session = match self.wallet.connect().await {
            Ok(session) => session,
            Err(err) => {
                self.store.update(|state| Some(state.with_error(err.clone())));
                return Err(err);
            }
        };
        let _ = self.events.send(ClientEvent::SessionReplaced(session));
        self.start_account_listener(accounts).await;

        if let Err(err) = self.synchronizer.resync().await {
            warn!("client: initial resync failed: {err}");
        }
        Ok(session)
    }

    pub async fn disconnect(&self) -> Session {
        if let Some(listener) = self.account_listener.lock().await.take() {
            listener.abort();
        }
        let session = self.wallet.disconnect();
        let _ = self.events.send(ClientEvent::SessionReplaced(session));
        session
    }

    pub async fn resync(&self) -> ResyncResult {
        self.synchronizer.resync().await
    }

    pub async fn submit(&self, request: ActionRequest) -> Result<SubmitReceipt, BallotError> {
        self.orchestrator.submit(request).await
    }

    /// Applies an account-change notification and reloads the ballot for
    /// the new identity.
    pub async fn handle_accounts_changed(&self, accounts: Vec<Address>) {
        let Some(session) = self.wallet.apply_accounts_changed(&accounts) else {
            return;
        };
        let _ = self.events.send(ClientEvent::SessionReplaced(session));
        if let Err(err) = self.synchronizer.resync().await {
            debug!("client: resync after account change failed: {err}");
        }
    }

    async fn start_account_listener(
        self: &Arc<Self>,
        mut accounts: broadcast::Receiver<Vec<Address>>,
    ) {
        let client: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match accounts.recv().await {
                    Ok(list) => {
                        let Some(client) = client.upgrade() else {
                            break;
                        };
                        client.handle_accounts_changed(list).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("client: account notifications lagged skipped={skipped}");
                        let Some(client) = client.upgrade() else {
                            break;
                        };
                        match client.wallet.provider().accounts().await {
                            Ok(list) => client.handle_accounts_changed(list).await,
                            Err(err) => warn!("client: failed to re-read accounts: {err}"),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            info!("client: account listener stopped");
        });

        if let Some(previous) = self.account_listener.lock().await.replace(task) {
            previous.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

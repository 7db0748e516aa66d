use std::sync::Arc;

use alloy_primitives::Address;
use shared::{domain::short_address, error::BallotError};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    gateway::WalletProvider,
    state::{Session, StateStore},
};

/// Owns the connected identity. The session itself lives in the shared
/// `StateStore` so replacing it and invalidating identity-bound data is one
/// atomic update.
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    store: StateStore,
}

impl WalletSession {
    pub fn new(provider: Arc<dyn WalletProvider>, store: StateStore) -> Self {
        Self { provider, store }
    }

    pub fn current(&self) -> Session {
        self.store.current().session
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.provider
    }

    pub fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>> {
        self.provider.subscribe_accounts()
    }

    pub async fn connect(&self) -> Result<Session, BallotError> {
        let accounts = self
            .provider
            .request_accounts()
            .await
            .map_err(|err| err.into_connect_failure())?;
        let Some(address) = accounts.first().copied() else {
            return Err(BallotError::UserRejected);
        };

        let session = self.replace(Some(address));
        info!(
            "wallet: connected account={} epoch={}",
            short_address(&address),
            session.epoch
        );
        Ok(session)
    }

    /// Handles an account-change notification. Returns the new session, or
    /// `None` when the active address did not actually change.
    pub fn apply_accounts_changed(&self, accounts: &[Address]) -> Option<Session> {
        let next = accounts.first().copied();
        if next == self.current().address {
            debug!("wallet: account notification without change");
            return None;
        }

        let session = self.replace(next);
        match next {
            Some(address) => info!(
                "wallet: account changed account={} epoch={}",
                short_address(&address),
                session.epoch
            ),
            None => info!("wallet: disconnected epoch={}", session.epoch),
        }
        Some(session)
    }

    pub fn disconnect(&self) -> Session {
        let session = self.replace(None);
        info!("wallet: disconnected epoch={}", session.epoch);
        session
    }

    fn replace(&self, address: Option<Address>) -> Session {
        let mut session = Session::default();
        self.store.update(|state| {
            let next = state.with_session(address);
            session = next.session;
            Some(next)
        });
        session
    }
}

#[cfg(test)]
#[path = "tests/wallet_tests.rs"]
mod tests;

//! Boundary traits for the deployed ballot contract and the wallet provider.

use alloy_primitives::Address;
use async_trait::async_trait;
use shared::{
    domain::VoterRecord,
    error::BallotError,
    protocol::{BallotCall, TransactionRequest, TxReceipt},
    TxHash,
};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("provider is not available")]
    Unavailable,
    #[error("request rejected by user")]
    UserRejected,
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn into_read_failure(self) -> BallotError {
        BallotError::read_failure(self.to_string())
    }

    pub fn into_connect_failure(self) -> BallotError {
        match self {
            Self::Unavailable => {
                BallotError::WalletUnavailable("no wallet provider is installed".into())
            }
            Self::UserRejected => BallotError::UserRejected,
            other => BallotError::WalletUnavailable(other.to_string()),
        }
    }
}

/// Read and write surface of the deployed ballot contract.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn ballot_official_address(&self) -> Result<Address, GatewayError>;
    async fn ballot_official_name(&self) -> Result<String, GatewayError>;
    async fn proposal(&self) -> Result<String, GatewayError>;
    /// Raw `state()` value: 0 created, 1 voting, 2 ended.
    async fn state(&self) -> Result<u8, GatewayError>;
    async fn total_voter(&self) -> Result<u64, GatewayError>;
    async fn total_vote(&self) -> Result<u64, GatewayError>;
    /// Only meaningful once `state()` reports ended.
    async fn final_result(&self) -> Result<u64, GatewayError>;
    async fn voter_register(&self, voter: Address) -> Result<VoterRecord, GatewayError>;

    /// Signs and sends `call` from `from`. Returns once the transaction is
    /// accepted by the node, before inclusion.
    async fn submit(&self, from: Address, call: BallotCall) -> Result<TxHash, GatewayError>;
    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<TxReceipt, GatewayError>;

    // Convenience wrappers over `submit`, one per contract write. The
    // orchestrator goes through `submit` directly.
    async fn add_voter(
        &self,
        from: Address,
        voter: Address,
        name: &str,
    ) -> Result<TxHash, GatewayError> {
        self.submit(
            from,
            BallotCall::AddVoter {
                voter,
                name: name.to_string(),
            },
        )
        .await
    }

    async fn start_vote(&self, from: Address) -> Result<TxHash, GatewayError> {
        self.submit(from, BallotCall::StartVote).await
    }

    async fn do_vote(&self, from: Address, choice: bool) -> Result<TxHash, GatewayError> {
        self.submit(from, BallotCall::DoVote { choice }).await
    }

    async fn end_vote(&self, from: Address) -> Result<TxHash, GatewayError> {
        self.submit(from, BallotCall::EndVote).await
    }
}

/// Account authorization and signing, as exposed by an injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompts for authorization; the first address is the active account.
    async fn request_accounts(&self) -> Result<Vec<Address>, GatewayError>;
    async fn accounts(&self) -> Result<Vec<Address>, GatewayError>;
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, GatewayError>;
    /// Account list changes; an empty list means the wallet disconnected.
    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>>;
}

pub struct MissingWalletProvider {
    accounts: broadcast::Sender<Vec<Address>>,
}

impl Default for MissingWalletProvider {
    fn default() -> Self {
        let (accounts, _) = broadcast::channel(1);
        Self { accounts }
    }
}

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, GatewayError> {
        Err(GatewayError::Unavailable)
    }

    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        Err(GatewayError::Unavailable)
    }

    async fn send_transaction(&self, _request: TransactionRequest) -> Result<TxHash, GatewayError> {
        Err(GatewayError::Unavailable)
    }

    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>> {
        self.accounts.subscribe()
    }
}

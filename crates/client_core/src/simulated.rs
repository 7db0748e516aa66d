//! In-process stand-in for the deployed ballot contract and an injected
//! wallet. Execution follows the deployed contract's rules; the hold
//! switches let callers freeze reads or block inclusion to exercise
//! concurrent paths.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use alloy_primitives::{keccak256, Address};
use async_trait::async_trait;
use shared::{
    domain::VoterRecord,
    protocol::{BallotCall, TransactionRequest, TxReceipt},
    TxHash,
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::debug;

use crate::{
    abi,
    gateway::{ContractGateway, GatewayError, WalletProvider},
};

pub const NOT_OFFICIAL: &str = "only the ballot official may call this";
pub const WRONG_STATE: &str = "function cannot be called in the current ballot state";
pub const VOTE_NOT_COUNTED: &str = "doVote returned false";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Created,
    Voting,
    Ended,
}

impl Stage {
    fn wire(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Voting => 1,
            Self::Ended => 2,
        }
    }
}

struct ContractState {
    official: Address,
    official_name: String,
    proposal: String,
    stage: Stage,
    voters: HashMap<Address, VoterRecord>,
    total_voter: u64,
    total_vote: u64,
    count_result: u64,
    final_result: u64,
}

impl ContractState {
    fn require_official(&self, from: Address) -> Result<(), GatewayError> {
        if from != self.official {
            return Err(GatewayError::Reverted(NOT_OFFICIAL.into()));
        }
        Ok(())
    }

    fn require_stage(&self, stage: Stage) -> Result<(), GatewayError> {
        if self.stage != stage {
            return Err(GatewayError::Reverted(WRONG_STATE.into()));
        }
        Ok(())
    }

    fn can_vote(&self, from: Address) -> bool {
        self.voters
            .get(&from)
            .is_some_and(|voter| voter.is_registered() && !voter.has_voted)
    }

    /// Checks the modifiers without changing state, like gas estimation does.
    fn preflight(&self, from: Address, call: &BallotCall) -> Result<(), GatewayError> {
        match call {
            BallotCall::AddVoter { .. } | BallotCall::StartVote => {
                self.require_stage(Stage::Created)?;
                self.require_official(from)
            }
            BallotCall::DoVote { .. } => {
                self.require_stage(Stage::Voting)?;
                if !self.can_vote(from) {
                    return Err(GatewayError::Reverted(VOTE_NOT_COUNTED.into()));
                }
                Ok(())
            }
            BallotCall::EndVote => {
                self.require_stage(Stage::Voting)?;
                self.require_official(from)
            }
        }
    }

    fn execute(&mut self, from: Address, call: &BallotCall) -> Result<(), GatewayError> {
        match call {
            BallotCall::AddVoter { voter, name } => {
                self.require_stage(Stage::Created)?;
                self.require_official(from)?;
                self.voters.insert(
                    *voter,
                    VoterRecord {
                        name: name.clone(),
                        has_voted: false,
                    },
                );
                self.total_voter += 1;
            }
            BallotCall::StartVote => {
                self.require_stage(Stage::Created)?;
                self.require_official(from)?;
                self.stage = Stage::Voting;
            }
            BallotCall::DoVote { choice } => {
                self.require_stage(Stage::Voting)?;
                // An ineligible vote succeeds on chain but records nothing.
                if self.can_vote(from) {
                    if let Some(voter) = self.voters.get_mut(&from) {
                        voter.has_voted = true;
                    }
                    if *choice {
                        self.count_result += 1;
                    }
                    self.total_vote += 1;
                }
            }
            BallotCall::EndVote => {
                self.require_stage(Stage::Voting)?;
                self.require_official(from)?;
                self.stage = Stage::Ended;
                self.final_result = self.count_result;
            }
        }
        Ok(())
    }
}

struct ChainState {
    contract: ContractState,
    pending: HashMap<TxHash, (Address, BallotCall)>,
    nonce: u64,
    block_number: u64,
}

struct WalletState {
    installed: bool,
    reject_requests: bool,
    accounts: Vec<Address>,
}

pub struct SimulatedBallot {
    chain: Mutex<ChainState>,
    wallet: Mutex<WalletState>,
    account_events: broadcast::Sender<Vec<Address>>,
    reads_held: watch::Sender<bool>,
    inclusions_held: watch::Sender<bool>,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
    dispatches: AtomicUsize,
}

impl SimulatedBallot {
    pub fn new(
        official: Address,
        official_name: impl Into<String>,
        proposal: impl Into<String>,
    ) -> Self {
        let (account_events, _) = broadcast::channel(16);
        let (reads_held, _) = watch::channel(false);
        let (inclusions_held, _) = watch::channel(false);
        Self {
            chain: Mutex::new(ChainState {
                contract: ContractState {
                    official,
                    official_name: official_name.into(),
                    proposal: proposal.into(),
                    stage: Stage::Created,
                    voters: HashMap::new(),
                    total_voter: 0,
                    total_vote: 0,
                    count_result: 0,
                    final_result: 0,
                },
                pending: HashMap::new(),
                nonce: 0,
                block_number: 0,
            }),
            wallet: Mutex::new(WalletState {
                installed: true,
                reject_requests: false,
                accounts: vec![official],
            }),
            account_events,
            reads_held,
            inclusions_held,
            fail_reads: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            dispatches: AtomicUsize::new(0),
        }
    }

    /// Number of view calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of state-changing calls that reached the contract boundary.
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub fn hold_reads(&self, held: bool) {
        self.reads_held.send_replace(held);
    }

    pub fn hold_inclusions(&self, held: bool) {
        self.inclusions_held.send_replace(held);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn set_wallet_installed(&self, installed: bool) {
        self.wallet.lock().await.installed = installed;
    }

    pub async fn set_reject_requests(&self, reject: bool) {
        self.wallet.lock().await.reject_requests = reject;
    }

    /// Switches the wallet's active account and notifies subscribers.
    pub async fn switch_account(&self, account: Option<Address>) {
        let accounts: Vec<Address> = account.into_iter().collect();
        self.wallet.lock().await.accounts = accounts.clone();
        let _ = self.account_events.send(accounts);
    }

    pub async fn pending_transactions(&self) -> usize {
        self.chain.lock().await.pending.len()
    }

    async fn read<T>(
        &self,
        view: impl FnOnce(&ContractState) -> T,
    ) -> Result<T, GatewayError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut held = self.reads_held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("simulated node unreachable".into()));
        }
        let chain = self.chain.lock().await;
        Ok(view(&chain.contract))
    }
}

#[async_trait]
impl ContractGateway for SimulatedBallot {
    async fn ballot_official_address(&self) -> Result<Address, GatewayError> {
        self.read(|contract| contract.official).await
    }

    async fn ballot_official_name(&self) -> Result<String, GatewayError> {
        self.read(|contract| contract.official_name.clone()).await
    }

    async fn proposal(&self) -> Result<String, GatewayError> {
        self.read(|contract| contract.proposal.clone()).await
    }

    async fn state(&self) -> Result<u8, GatewayError> {
        self.read(|contract| contract.stage.wire()).await
    }

    async fn total_voter(&self) -> Result<u64, GatewayError> {
        self.read(|contract| contract.total_voter).await
    }

    async fn total_vote(&self) -> Result<u64, GatewayError> {
        self.read(|contract| contract.total_vote).await
    }

    async fn final_result(&self) -> Result<u64, GatewayError> {
        self.read(|contract| contract.final_result).await
    }

    async fn voter_register(&self, voter: Address) -> Result<VoterRecord, GatewayError> {
        self.read(|contract| contract.voters.get(&voter).cloned().unwrap_or_default())
            .await
    }

    async fn submit(&self, from: Address, call: BallotCall) -> Result<TxHash, GatewayError> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        if self.wallet.lock().await.reject_requests {
            return Err(GatewayError::UserRejected);
        }

        let mut chain = self.chain.lock().await;
        chain.contract.preflight(from, &call)?;
        chain.nonce += 1;
        let tx_hash = keccak256(format!("simulated-tx-{}", chain.nonce));
        debug!(
            "simulated: accepted method={} tx={tx_hash}",
            call.method_name()
        );
        chain.pending.insert(tx_hash, (from, call));
        Ok(tx_hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<TxReceipt, GatewayError> {
        let mut held = self.inclusions_held.subscribe();
        let _ = held.wait_for(|held| !*held).await;

        let mut chain = self.chain.lock().await;
        let (from, call) = chain
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| GatewayError::Transport(format!("unknown transaction {tx_hash}")))?;
        chain.block_number += 1;
        let success = chain.contract.execute(from, &call).is_ok();
        Ok(TxReceipt {
            tx_hash,
            success,
            block_number: Some(chain.block_number),
        })
    }
}

#[async_trait]
impl WalletProvider for SimulatedBallot {
    async fn request_accounts(&self) -> Result<Vec<Address>, GatewayError> {
        let wallet = self.wallet.lock().await;
        if !wallet.installed {
            return Err(GatewayError::Unavailable);
        }
        if wallet.reject_requests {
            return Err(GatewayError::UserRejected);
        }
        Ok(wallet.accounts.clone())
    }

    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        let wallet = self.wallet.lock().await;
        if !wallet.installed {
            return Err(GatewayError::Unavailable);
        }
        Ok(wallet.accounts.clone())
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, GatewayError> {
        let call = abi::decode_call(&request.data)
            .ok_or_else(|| GatewayError::Reverted("unrecognized calldata".into()))?;
        self.submit(request.from, call).await
    }

    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>> {
        self.account_events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/simulated_tests.rs"]
mod tests;

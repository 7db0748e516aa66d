//! JSON-RPC adapters: the deployed contract over `eth_call` and
//! `eth_sendTransaction`, and a wallet backed by node-managed accounts.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use alloy_primitives::{Address, Bytes, U256, U64};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    domain::VoterRecord,
    protocol::{BallotCall, TransactionRequest, TxReceipt},
    TxHash,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    abi::{self, doVoteCall},
    gateway::{ContractGateway, GatewayError, WalletProvider},
};

const USER_REJECTED_CODE: i64 = 4001;
const EXECUTION_REVERTED_CODE: i64 = 3;
const METHOD_NOT_FOUND_CODE: i64 = -32601;

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcErrorObject {
    fn into_gateway_error(self, method: &str) -> GatewayError {
        match self.code {
            USER_REJECTED_CODE => GatewayError::UserRejected,
            EXECUTION_REVERTED_CODE => GatewayError::Reverted(self.message),
            _ if self.message.to_ascii_lowercase().contains("revert") => {
                GatewayError::Reverted(self.message)
            }
            METHOD_NOT_FOUND_CODE => {
                GatewayError::Transport(format!("{method} is not supported by the node"))
            }
            code => GatewayError::Transport(format!("{method} failed ({code}): {}", self.message)),
        }
    }
}

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct RpcClient {
    http: Client,
    url: Url,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: Url) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(http: Client, url: Url) -> Self {
        Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, GatewayError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("rpc: request id={id} method={method}");

        let response = self
            .http
            .post(self.url.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|err| GatewayError::Transport(format!("{method}: {err}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::Transport(format!(
                "{method}: http status {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(format!("{method}: {err}")))?;
        if let Some(error) = body.error {
            return Err(error.into_gateway_error(method));
        }
        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|err| GatewayError::Decode(format!("{method}: {err}")))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    block_number: Option<U64>,
}

pub struct EthBallotContract {
    rpc: Arc<RpcClient>,
    address: Address,
    wallet: Arc<dyn WalletProvider>,
    poll_interval: Duration,
}

impl EthBallotContract {
    pub fn new(
        rpc: Arc<RpcClient>,
        address: Address,
        wallet: Arc<dyn WalletProvider>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rpc,
            address,
            wallet,
            poll_interval,
        }
    }

    async fn eth_call(&self, from: Option<Address>, data: Vec<u8>) -> Result<Bytes, GatewayError> {
        let mut tx = json!({
            "to": self.address,
            "data": Bytes::from(data),
        });
        if let Some(from) = from {
            tx["from"] = json!(from);
        }
        self.rpc.request("eth_call", json!([tx, "latest"])).await
    }

    async fn view<C>(&self, call: C) -> Result<C::Return, GatewayError>
    where
        C: SolCall + Send,
    {
        let data = self.eth_call(None, call.abi_encode()).await?;
        C::abi_decode_returns(&data, true)
            .map_err(|err| GatewayError::Decode(format!("{}: {err}", C::SIGNATURE)))
    }

    async fn view_count<C>(
        &self,
        call: C,
        pick: fn(C::Return) -> U256,
    ) -> Result<u64, GatewayError>
    where
        C: SolCall + Send,
    {
        let value = pick(self.view(call).await?);
        u64::try_from(value)
            .map_err(|_| GatewayError::Decode(format!("{} out of range: {value}", C::SIGNATURE)))
    }

    /// `doVote` returns `false` instead of reverting for ineligible voters,
    /// so its result is checked with a call from the voter first.
    async fn preflight_vote(&self, from: Address, data: &[u8]) -> Result<(), GatewayError> {
        let raw = self.eth_call(Some(from), data.to_vec()).await?;
        let voted = doVoteCall::abi_decode_returns(&raw, true)
            .map_err(|err| GatewayError::Decode(format!("doVote: {err}")))?
            .voted;
        if !voted {
            return Err(GatewayError::Reverted("doVote returned false".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContractGateway for EthBallotContract {
    async fn ballot_official_address(&self) -> Result<Address, GatewayError> {
        Ok(self.view(abi::ballotOfficialAddressCall {}).await?._0)
    }

    async fn ballot_official_name(&self) -> Result<String, GatewayError> {
        Ok(self.view(abi::ballotOfficalNameCall {}).await?._0)
    }

    async fn proposal(&self) -> Result<String, GatewayError> {
        Ok(self.view(abi::proposalCall {}).await?._0)
    }

    async fn state(&self) -> Result<u8, GatewayError> {
        Ok(self.view(abi::stateCall {}).await?._0)
    }

    async fn total_voter(&self) -> Result<u64, GatewayError> {
        self.view_count(abi::totalVoterCall {}, |ret| ret._0).await
    }

    async fn total_vote(&self) -> Result<u64, GatewayError> {
        self.view_count(abi::totalVoteCall {}, |ret| ret._0).await
    }

    async fn final_result(&self) -> Result<u64, GatewayError> {
        self.view_count(abi::finalResultCall {}, |ret| ret._0).await
    }

    async fn voter_register(&self, voter: Address) -> Result<VoterRecord, GatewayError> {
        let ret = self.view(abi::voterRegisterCall { voter }).await?;
        Ok(VoterRecord {
            name: ret.voterName,
            has_voted: ret.voted,
        })
    }

    async fn submit(&self, from: Address, call: BallotCall) -> Result<TxHash, GatewayError> {
        let data = abi::encode_call(&call);
        if matches!(call, BallotCall::DoVote { .. }) {
            self.preflight_vote(from, &data).await?;
        }

        let tx_hash = self
            .wallet
            .send_transaction(TransactionRequest {
                from,
                to: self.address,
                data,
            })
            .await?;
        info!("eth: sent method={} tx={tx_hash}", call.method_name());
        Ok(tx_hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<TxReceipt, GatewayError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .rpc
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                let success = receipt.status.map_or(true, |status| status == U64::from(1));
                let block_number = receipt.block_number.map(|number| number.to::<u64>());
                debug!("eth: included tx={tx_hash} success={success} block={block_number:?}");
                return Ok(TxReceipt {
                    tx_hash,
                    success,
                    block_number,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Wallet over accounts unlocked on the node itself. Account changes are
/// detected by polling `eth_accounts`.
pub struct HttpWallet {
    rpc: Arc<RpcClient>,
    accounts: broadcast::Sender<Vec<Address>>,
}

impl HttpWallet {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        let (accounts, _) = broadcast::channel(16);
        Self { rpc, accounts }
    }

    pub fn spawn_account_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let wallet: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut last: Option<Vec<Address>> = None;
            loop {
                let Some(wallet) = wallet.upgrade() else {
                    break;
                };
                match wallet.accounts().await {
                    Ok(current) => {
                        if last.as_ref().is_some_and(|last| *last != current) {
                            info!("eth: account list changed count={}", current.len());
                            let _ = wallet.accounts.send(current.clone());
                        }
                        last = Some(current);
                    }
                    Err(err) => warn!("eth: account poll failed: {err}"),
                }
                drop(wallet);
                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[async_trait]
impl WalletProvider for HttpWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, GatewayError> {
        match self.rpc.request("eth_requestAccounts", json!([])).await {
            Ok(accounts) => Ok(accounts),
            Err(GatewayError::UserRejected) => Err(GatewayError::UserRejected),
            Err(err) => {
                debug!("eth: eth_requestAccounts unavailable, falling back: {err}");
                self.accounts().await
            }
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        self.rpc.request("eth_accounts", json!([])).await
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, GatewayError> {
        let tx = json!({
            "from": request.from,
            "to": request.to,
            "data": Bytes::from(request.data),
        });
        self.rpc.request("eth_sendTransaction", json!([tx])).await
    }

    fn subscribe_accounts(&self) -> broadcast::Receiver<Vec<Address>> {
        self.accounts.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/eth_tests.rs"]
mod tests;

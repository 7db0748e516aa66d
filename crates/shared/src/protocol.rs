use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

/// State-changing contract calls. Views are plain gateway methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BallotCall {
    AddVoter { voter: Address, name: String },
    StartVote,
    DoVote { choice: bool },
    EndVote,
}

impl BallotCall {
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::AddVoter { .. } => "addVoter",
            Self::StartVote => "startVote",
            Self::DoVote { .. } => "doVote",
            Self::EndVote => "endVote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

//! ABI of the deployed ballot contract.
//!
//! Parameter names are local; selectors only depend on function names and
//! types. `ballotOfficalName` keeps the deployed contract's spelling.

use alloy_sol_types::{sol, SolCall};
use shared::protocol::BallotCall;

sol! {
    function addVoter(address voter, string name) external;
    function startVote() external;
    function doVote(bool choice) external returns (bool voted);
    function endVote() external;

    function ballotOfficialAddress() external view returns (address);
    function ballotOfficalName() external view returns (string);
    function proposal() external view returns (string);
    function state() external view returns (uint8);
    function totalVoter() external view returns (uint256);
    function totalVote() external view returns (uint256);
    function finalResult() external view returns (uint256);
    function voterRegister(address voter) external view returns (string voterName, bool voted);
}

pub fn encode_call(call: &BallotCall) -> Vec<u8> {
    match call {
        BallotCall::AddVoter { voter, name } => addVoterCall {
            voter: *voter,
            name: name.clone(),
        }
        .abi_encode(),
        BallotCall::StartVote => startVoteCall {}.abi_encode(),
        BallotCall::DoVote { choice } => doVoteCall { choice: *choice }.abi_encode(),
        BallotCall::EndVote => endVoteCall {}.abi_encode(),
    }
}

/// Inverse of [`encode_call`]; `None` for calldata that is not one of the
/// ballot's state-changing functions.
pub fn decode_call(data: &[u8]) -> Option<BallotCall> {
    let selector = data.get(..4)?;
    if selector == addVoterCall::SELECTOR {
        let call = addVoterCall::abi_decode(data, true).ok()?;
        Some(BallotCall::AddVoter {
            voter: call.voter,
            name: call.name,
        })
    } else if selector == startVoteCall::SELECTOR {
        Some(BallotCall::StartVote)
    } else if selector == doVoteCall::SELECTOR {
        let call = doVoteCall::abi_decode(data, true).ok()?;
        Some(BallotCall::DoVote {
            choice: call.choice,
        })
    } else if selector == endVoteCall::SELECTOR {
        Some(BallotCall::EndVote)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "tests/abi_tests.rs"]
mod tests;

use std::{fmt, str::FromStr};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotPhase {
    Created,
    Voting,
    Ended,
}

impl BallotPhase {
    /// Decodes the contract's `state()` enum value.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Created),
            1 => Some(Self::Voting),
            2 => Some(Self::Ended),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Voting => 1,
            Self::Ended => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Voting => "Voting in Progress",
            Self::Ended => "Voting Ended",
        }
    }
}

impl fmt::Display for BallotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Voting => "voting",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Official,
    Voter,
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Official => "official",
            Self::Voter => "voter",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Voter entry as returned by `voterRegister(address)`. Unregistered
/// addresses come back as an empty record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub name: String,
    pub has_voted: bool,
}

impl VoterRecord {
    pub fn is_registered(&self) -> bool {
        !self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("total votes {votes} exceeds total voters {voters}")]
    VotesExceedVoters { votes: u64, voters: u64 },
    #[error("final result present in phase {0}")]
    UnexpectedFinalResult(BallotPhase),
    #[error("final result missing for ended ballot")]
    MissingFinalResult,
    #[error("final yes votes {yes} exceeds total votes {votes}")]
    YesExceedsVotes { yes: u64, votes: u64 },
}

/// Immutable copy of the contract's ballot-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotSnapshot {
    phase: BallotPhase,
    proposal: String,
    official_address: Address,
    official_name: String,
    total_voters: u64,
    total_votes: u64,
    final_yes_votes: Option<u64>,
}

impl BallotSnapshot {
    pub fn new(
        phase: BallotPhase,
        proposal: impl Into<String>,
        official_address: Address,
        official_name: impl Into<String>,
        total_voters: u64,
        total_votes: u64,
        final_yes_votes: Option<u64>,
    ) -> Result<Self, SnapshotError> {
        if total_votes > total_voters {
            return Err(SnapshotError::VotesExceedVoters {
                votes: total_votes,
                voters: total_voters,
            });
        }
        match (phase, final_yes_votes) {
            (BallotPhase::Ended, None) => return Err(SnapshotError::MissingFinalResult),
            (BallotPhase::Ended, Some(yes)) if yes > total_votes => {
                return Err(SnapshotError::YesExceedsVotes {
                    yes,
                    votes: total_votes,
                })
            }
            (BallotPhase::Created | BallotPhase::Voting, Some(_)) => {
                return Err(SnapshotError::UnexpectedFinalResult(phase))
            }
            _ => {}
        }

        Ok(Self {
            phase,
            proposal: proposal.into(),
            official_address,
            official_name: official_name.into(),
            total_voters,
            total_votes,
            final_yes_votes,
        })
    }

    pub fn phase(&self) -> BallotPhase {
        self.phase
    }

    pub fn proposal(&self) -> &str {
        &self.proposal
    }

    pub fn official_address(&self) -> Address {
        self.official_address
    }

    pub fn official_name(&self) -> &str {
        &self.official_name
    }

    pub fn total_voters(&self) -> u64 {
        self.total_voters
    }

    pub fn total_votes(&self) -> u64 {
        self.total_votes
    }

    pub fn final_yes_votes(&self) -> Option<u64> {
        self.final_yes_votes
    }

    /// Yes/no split of the closed ballot; `None` until the ballot has ended.
    pub fn outcome(&self) -> Option<BallotOutcome> {
        self.final_yes_votes.map(|yes_votes| BallotOutcome {
            yes_votes,
            no_votes: self.total_votes.saturating_sub(yes_votes),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BallotOutcome {
    pub yes_votes: u64,
    pub no_votes: u64,
}

impl BallotOutcome {
    pub fn total(&self) -> u64 {
        self.yes_votes + self.no_votes
    }

    pub fn yes_percent(&self) -> f64 {
        percent(self.yes_votes, self.total())
    }

    pub fn no_percent(&self) -> f64 {
        percent(self.no_votes, self.total())
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must have 40 hex digits, got {0}")]
    Length(usize),
    #[error("address contains non-hex characters")]
    NotHex,
    #[error("address checksum mismatch")]
    BadChecksum,
}

/// Parses an account address the way wallets accept them: `0x` followed by
/// 40 hex digits, with the EIP-55 checksum enforced when the digits are
/// mixed case.
pub fn parse_address(raw: &str) -> Result<Address, AddressError> {
    let raw = raw.trim();
    let Some(digits) = raw.strip_prefix("0x") else {
        return Err(AddressError::MissingPrefix);
    };
    if digits.len() != 40 {
        return Err(AddressError::Length(digits.len()));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::NotHex);
    }

    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        return Address::parse_checksummed(raw, None).map_err(|_| AddressError::BadChecksum);
    }

    Address::from_str(digits).map_err(|_| AddressError::NotHex)
}

/// `0x1234...abcd` form used in status lines.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;

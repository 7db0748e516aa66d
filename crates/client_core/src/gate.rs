//! Which ballot actions the current user may perform.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared::domain::{BallotPhase, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RegisterVoter,
    StartVoting,
    EndVoting,
    CastVote,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::RegisterVoter,
        Action::StartVoting,
        Action::EndVoting,
        Action::CastVote,
    ];

    fn bit(self) -> u8 {
        match self {
            Self::RegisterVoter => 1,
            Self::StartVoting => 1 << 1,
            Self::EndVoting => 1 << 2,
            Self::CastVote => 1 << 3,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RegisterVoter => "register voter",
            Self::StartVoting => "start voting",
            Self::EndVoting => "end voting",
            Self::CastVote => "cast vote",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionSet {
    bits: u8,
}

impl ActionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, action: Action) -> Self {
        self.bits |= action.bit();
        self
    }

    pub fn contains(&self, action: Action) -> bool {
        self.bits & action.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        Action::ALL
            .into_iter()
            .filter(move |action| self.contains(*action))
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

pub fn permitted_actions(
    phase: BallotPhase,
    role: Role,
    has_voted: bool,
    total_voters: u64,
) -> ActionSet {
    match (phase, role) {
        (BallotPhase::Created, Role::Official) => {
            let actions = ActionSet::empty().with(Action::RegisterVoter);
            if total_voters > 0 {
                actions.with(Action::StartVoting)
            } else {
                actions
            }
        }
        (BallotPhase::Voting, Role::Official) => ActionSet::empty().with(Action::EndVoting),
        (BallotPhase::Voting, Role::Voter) if !has_voted => {
            ActionSet::empty().with(Action::CastVote)
        }
        _ => ActionSet::empty(),
    }
}

#[cfg(test)]
#[path = "tests/gate_tests.rs"]
mod tests;

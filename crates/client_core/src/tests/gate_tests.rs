use super::*;

const PHASES: [BallotPhase; 3] = [BallotPhase::Created, BallotPhase::Voting, BallotPhase::Ended];
const ROLES: [Role; 3] = [Role::Official, Role::Voter, Role::Unknown];

fn listed(phase: BallotPhase, role: Role, has_voted: bool) -> bool {
    matches!(
        (phase, role, has_voted),
        (BallotPhase::Created, Role::Official, _)
            | (BallotPhase::Voting, Role::Official, _)
            | (BallotPhase::Voting, Role::Voter, false)
    )
}

#[test]
fn official_in_created_can_register_and_start_once_voters_exist() {
    let without_voters = permitted_actions(BallotPhase::Created, Role::Official, false, 0);
    assert!(without_voters.contains(Action::RegisterVoter));
    assert!(!without_voters.contains(Action::StartVoting));

    let with_voters = permitted_actions(BallotPhase::Created, Role::Official, false, 1);
    assert_eq!(
        with_voters.iter().collect::<Vec<_>>(),
        vec![Action::RegisterVoter, Action::StartVoting]
    );
}

#[test]
fn official_in_voting_can_only_end() {
    let actions = permitted_actions(BallotPhase::Voting, Role::Official, false, 3);
    assert_eq!(actions.iter().collect::<Vec<_>>(), vec![Action::EndVoting]);
}

#[test]
fn voter_can_cast_once() {
    assert_eq!(
        permitted_actions(BallotPhase::Voting, Role::Voter, false, 3)
            .iter()
            .collect::<Vec<_>>(),
        vec![Action::CastVote]
    );
    assert!(permitted_actions(BallotPhase::Voting, Role::Voter, true, 3).is_empty());
}

#[test]
fn ended_ballot_permits_nothing() {
    for role in ROLES {
        for has_voted in [false, true] {
            assert!(permitted_actions(BallotPhase::Ended, role, has_voted, 5).is_empty());
        }
    }
}

#[test]
fn every_unlisted_combination_is_empty() {
    for phase in PHASES {
        for role in ROLES {
            for has_voted in [false, true] {
                for total_voters in [0, 1, 10] {
                    let actions = permitted_actions(phase, role, has_voted, total_voters);
                    if !listed(phase, role, has_voted) {
                        assert!(
                            actions.is_empty(),
                            "expected no actions for {phase} {role} voted={has_voted}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn action_set_collects_from_iterator() {
    let set: ActionSet = [Action::CastVote, Action::RegisterVoter].into_iter().collect();
    assert!(set.contains(Action::CastVote));
    assert!(set.contains(Action::RegisterVoter));
    assert!(!set.contains(Action::EndVoting));
}

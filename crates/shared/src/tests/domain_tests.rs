use super::*;

const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

fn official() -> Address {
    parse_address(CHECKSUMMED).expect("official address")
}

#[test]
fn phase_wire_values_round_trip_and_reject_unknown() {
    for phase in [BallotPhase::Created, BallotPhase::Voting, BallotPhase::Ended] {
        assert_eq!(BallotPhase::from_wire(phase.to_wire()), Some(phase));
    }
    assert_eq!(BallotPhase::from_wire(3), None);
}

#[test]
fn phases_are_ordered_by_lifecycle() {
    assert!(BallotPhase::Created < BallotPhase::Voting);
    assert!(BallotPhase::Voting < BallotPhase::Ended);
    assert_eq!(BallotPhase::Voting.label(), "Voting in Progress");
}

#[test]
fn snapshot_rejects_more_votes_than_voters() {
    let err = BallotSnapshot::new(BallotPhase::Voting, "p", official(), "o", 1, 2, None)
        .expect_err("invalid snapshot");
    assert_eq!(err, SnapshotError::VotesExceedVoters { votes: 2, voters: 1 });
}

#[test]
fn final_result_only_accepted_once_ended() {
    assert_eq!(
        BallotSnapshot::new(BallotPhase::Voting, "p", official(), "o", 2, 1, Some(1))
            .expect_err("final result while voting"),
        SnapshotError::UnexpectedFinalResult(BallotPhase::Voting)
    );
    assert_eq!(
        BallotSnapshot::new(BallotPhase::Ended, "p", official(), "o", 2, 1, None)
            .expect_err("missing final result"),
        SnapshotError::MissingFinalResult
    );

    let ended = BallotSnapshot::new(BallotPhase::Ended, "p", official(), "o", 2, 1, Some(1))
        .expect("ended snapshot");
    assert_eq!(ended.final_yes_votes(), Some(1));
}

#[test]
fn outcome_splits_yes_and_no() {
    let ended = BallotSnapshot::new(BallotPhase::Ended, "p", official(), "o", 5, 4, Some(3))
        .expect("ended snapshot");
    let outcome = ended.outcome().expect("outcome");
    assert_eq!(outcome.yes_votes, 3);
    assert_eq!(outcome.no_votes, 1);
    assert!((outcome.yes_percent() - 75.0).abs() < f64::EPSILON);

    let empty = BallotSnapshot::new(BallotPhase::Ended, "p", official(), "o", 5, 0, Some(0))
        .expect("empty ballot");
    assert_eq!(empty.outcome().expect("outcome").no_percent(), 0.0);
}

#[test]
fn voter_record_registration_follows_name() {
    assert!(!VoterRecord::default().is_registered());
    assert!(VoterRecord {
        name: "Alice".into(),
        has_voted: false
    }
    .is_registered());
}

#[test]
fn parses_checksummed_and_single_case_addresses() {
    assert!(parse_address(CHECKSUMMED).is_ok());
    assert!(parse_address(&CHECKSUMMED.to_ascii_lowercase()).is_ok());
    assert_eq!(
        parse_address(&CHECKSUMMED.to_ascii_lowercase()).expect("lowercase"),
        official()
    );
}

#[test]
fn rejects_malformed_addresses() {
    assert_eq!(
        parse_address("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
        Err(AddressError::MissingPrefix)
    );
    assert_eq!(parse_address("0x1234"), Err(AddressError::Length(4)));
    assert_eq!(
        parse_address("0xzzzeb6053f3e94c9b9a09f33669435e7ef1beaed"),
        Err(AddressError::NotHex)
    );
    assert_eq!(
        parse_address("0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
        Err(AddressError::BadChecksum)
    );
}

#[test]
fn short_address_keeps_prefix_and_suffix() {
    assert_eq!(short_address(&official()), "0x5aAe...eAed");
}

#[test]
fn snapshot_serializes_phase_in_snake_case() {
    let snapshot = BallotSnapshot::new(BallotPhase::Voting, "p", official(), "o", 1, 0, None)
        .expect("snapshot");
    let json = serde_json::to_value(&snapshot).expect("json");
    assert_eq!(json["phase"], "voting");
    assert_eq!(json["final_yes_votes"], serde_json::Value::Null);
}

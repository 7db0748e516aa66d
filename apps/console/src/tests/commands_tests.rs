use super::*;

#[test]
fn blank_lines_are_ignored() {
    assert_eq!(parse_command("   ").expect("parse"), None);
}

#[test]
fn register_keeps_multi_word_names() {
    let command = parse_command("register 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed Alice Smith")
        .expect("parse")
        .expect("command");
    assert_eq!(
        command,
        Command::Submit(ActionRequest::RegisterVoter {
            address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into(),
            name: "Alice Smith".into(),
        })
    );
}

#[test]
fn register_without_name_is_left_to_validation() {
    let command = parse_command("register 0x01")
        .expect("parse")
        .expect("command");
    assert!(matches!(
        command,
        Command::Submit(ActionRequest::RegisterVoter { name, .. }) if name.is_empty()
    ));
}

#[test]
fn vote_requires_a_choice() {
    assert_eq!(
        parse_command("VOTE Yes").expect("parse"),
        Some(Command::Submit(ActionRequest::CastVote { choice: true }))
    );
    assert_eq!(
        parse_command("vote n").expect("parse"),
        Some(Command::Submit(ActionRequest::CastVote { choice: false }))
    );
    assert!(parse_command("vote maybe").is_err());
}

#[test]
fn switch_accepts_none() {
    assert_eq!(
        parse_command("switch none").expect("parse"),
        Some(Command::Switch { address: None })
    );
    assert!(parse_command("switch").is_err());
}

#[test]
fn unknown_commands_are_errors() {
    let err = parse_command("delete everything").expect_err("unknown");
    assert!(err.to_string().contains("unknown command"));
}

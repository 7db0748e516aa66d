//! Console commands read from stdin, one per line.

use anyhow::{anyhow, bail, Result};
use client_core::ActionRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Status,
    Refresh,
    Submit(ActionRequest),
    /// Simulated wallet only; `None` disconnects the wallet side.
    Switch {
        address: Option<String>,
    },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  connect                    authorize the wallet and load the ballot
  disconnect                 drop the current session
  status                     print the ballot and the permitted actions
  refresh                    re-read the contract
  register <address> <name>  add a voter (official only)
  start                      open voting (official only)
  vote yes|no                cast this account's vote
  end                        close voting (official only)
  switch <address>|none      change the simulated wallet account
  quit";

pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "status" => Command::Status,
        "refresh" => Command::Refresh,
        "register" => {
            let address = words
                .next()
                .ok_or_else(|| anyhow!("usage: register <address> <name>"))?;
            let name = words.collect::<Vec<_>>().join(" ");
            Command::Submit(ActionRequest::RegisterVoter {
                address: address.to_string(),
                name,
            })
        }
        "start" => Command::Submit(ActionRequest::StartVoting),
        "end" => Command::Submit(ActionRequest::EndVoting),
        "vote" => {
            let choice = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("yes" | "y") => true,
                Some("no" | "n") => false,
                _ => bail!("usage: vote yes|no"),
            };
            Command::Submit(ActionRequest::CastVote { choice })
        }
        "switch" => match words.next() {
            Some("none") => Command::Switch { address: None },
            Some(address) => Command::Switch {
                address: Some(address.to_string()),
            },
            None => bail!("usage: switch <address>|none"),
        },
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(Some(command))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;

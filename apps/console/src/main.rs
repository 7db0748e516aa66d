use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    config::{load_settings, load_settings_from, Settings},
    eth::{EthBallotContract, HttpWallet, RpcClient},
    simulated::SimulatedBallot,
    AppState, BallotClient, ClientEvent,
};
use shared::{
    domain::{parse_address, short_address},
    error::ErrorReport,
    Address,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{parse_command, Command, HELP};

#[derive(Parser, Debug)]
struct Args {
    /// JSON-RPC endpoint of the node.
    #[arg(long)]
    rpc_url: Option<String>,
    /// Address of the deployed ballot contract.
    #[arg(long)]
    contract: Option<String>,
    /// Settings file; defaults to ./ballot.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run against an in-process ballot instead of a node.
    #[arg(long)]
    simulate: bool,
}

struct Backend {
    client: Arc<BallotClient>,
    simulated: Option<Arc<SimulatedBallot>>,
}

fn simulated_backend() -> Backend {
    let official = Address::repeat_byte(0x0a);
    let chain = Arc::new(SimulatedBallot::new(
        official,
        "Demo Official",
        "Should the demo ballot pass?",
    ));
    info!(
        "console: simulated ballot official={}",
        short_address(&official)
    );
    Backend {
        client: BallotClient::new(chain.clone(), chain.clone()),
        simulated: Some(chain),
    }
}

fn rpc_backend(settings: &Settings) -> Result<Backend> {
    let rpc = Arc::new(RpcClient::new(settings.rpc_url()?));
    let contract = settings.contract_address()?;
    let wallet = Arc::new(HttpWallet::new(Arc::clone(&rpc)));
    let _poller = wallet.spawn_account_poller(settings.account_poll_interval());
    let gateway = Arc::new(EthBallotContract::new(
        rpc,
        contract,
        wallet.clone(),
        settings.receipt_poll_interval(),
    ));
    info!(
        "console: using node rpc_url={} contract={}",
        settings.rpc_url,
        short_address(&contract)
    );
    Ok(Backend {
        client: BallotClient::new(gateway, wallet),
        simulated: None,
    })
}

fn print_status(state: &AppState) {
    match state.session.address {
        Some(address) => println!("account:  {} ({})", address, state.role()),
        None => println!("account:  not connected"),
    }

    let Some(snapshot) = state.snapshot() else {
        println!("ballot:   not loaded");
        return;
    };
    println!("proposal: {}", snapshot.proposal());
    println!(
        "official: {} ({})",
        snapshot.official_name(),
        short_address(&snapshot.official_address())
    );
    println!("phase:    {}", snapshot.phase().label());
    println!(
        "voters:   {}  votes: {}",
        snapshot.total_voters(),
        snapshot.total_votes()
    );
    if let Some(outcome) = snapshot.outcome() {
        println!(
            "result:   yes {} ({:.1}%)  no {} ({:.1}%)",
            outcome.yes_votes,
            outcome.yes_percent(),
            outcome.no_votes,
            outcome.no_percent()
        );
    }
    if state.has_voted() {
        println!("you have voted");
    }

    let actions: Vec<String> = state
        .permitted_actions()
        .iter()
        .map(|action| action.to_string())
        .collect();
    if actions.is_empty() {
        println!("actions:  none");
    } else {
        println!("actions:  {}", actions.join(", "));
    }
}

fn print_error(report: &ErrorReport) {
    match serde_json::to_string(&report.code) {
        Ok(code) => println!("error {}: {}", code.trim_matches('"'), report.message),
        Err(_) => println!("error: {}", report.message),
    }
}

fn spawn_event_printer(client: &BallotClient) {
    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::SessionReplaced(session) => match session.address {
                    Some(address) => println!("* session: {}", short_address(&address)),
                    None => println!("* session: disconnected"),
                },
                ClientEvent::SubmissionStarted { action } => {
                    println!("* {action}: waiting for confirmation");
                }
                ClientEvent::SubmissionConfirmed(receipt) => {
                    println!("* {}: confirmed tx={}", receipt.action, receipt.tx_hash);
                }
                ClientEvent::SubmissionFailed { action, .. } => {
                    println!("* {action}: failed");
                }
                ClientEvent::SnapshotUpdated(_)
                | ClientEvent::ResyncFailed(_)
                | ClientEvent::ResyncDiscarded => {}
            }
        }
    });
}

async fn run_command(backend: &Backend, command: Command) -> Result<()> {
    let client = &backend.client;
    match command {
        Command::Connect => {
            client.connect().await?;
            print_status(&client.state());
        }
        Command::Disconnect => {
            client.disconnect().await;
        }
        Command::Status => print_status(&client.state()),
        Command::Refresh => {
            client.resync().await?;
            print_status(&client.state());
        }
        Command::Submit(request) => {
            client.submit(request).await?;
            print_status(&client.state());
        }
        Command::Switch { address } => {
            let Some(chain) = &backend.simulated else {
                bail!("switch is only available with --simulate");
            };
            let address = match address {
                Some(raw) => Some(parse_address(&raw)?),
                None => None,
            };
            chain.switch_account(address).await;
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    if let Some(rpc_url) = args.rpc_url {
        settings.rpc_url = rpc_url;
    }
    if let Some(contract) = args.contract {
        settings.contract_address = contract;
    }

    let backend = if args.simulate {
        simulated_backend()
    } else {
        rpc_backend(&settings)?
    };
    spawn_event_printer(&backend.client);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(err) = run_command(&backend, command).await {
            match err.downcast_ref::<shared::error::BallotError>() {
                Some(ballot_error) => print_error(&ErrorReport::from(ballot_error)),
                None => {
                    warn!("console: command failed: {err:#}");
                    println!("{err}");
                }
            }
        }
    }

    backend.client.disconnect().await;
    Ok(())
}

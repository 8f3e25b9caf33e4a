//! StashPass CLI - operator and attendee interface to the ticketing contract
//!
//! This CLI lets organizers and attendees:
//! - Create events, booths and reward rules
//! - Buy, stamp, evolve and refund tickets
//! - Withdraw revenue and hand over organizer authority
//! - Inspect tickets, souvenirs, stats and the module's event history

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod output;

use commands::{attendee, event, inspect, organizer, Completion, Context};
use config::{FileConfig, Overrides, Settings};
use error::{CliError, CliResult};
use output::{print_error, print_info};

/// StashPass CLI application
#[derive(Parser)]
#[command(name = "stashpass")]
#[command(about = "StashPass - event tickets that evolve into souvenirs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, env = "STASHPASS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Network (mainnet, testnet, devnet, localnet)
    #[arg(long, env = "SUI_NETWORK", global = true)]
    network: Option<String>,

    /// JSON-RPC endpoint overriding the network default
    #[arg(long, env = "SUI_RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// Published package id
    #[arg(long, env = "SUI_PACKAGE_ID", global = true)]
    package_id: Option<String>,

    /// Signer key (suiprivkey bech32, base64 or hex)
    #[arg(long, env = "SUI_PRIVATE_KEY", hide_env_values = true, global = true)]
    private_key: Option<String>,

    /// Protocol treasury receiving the purchase fee
    #[arg(long, env = "SUI_PROTOCOL_TREASURY_ID", global = true)]
    treasury_id: Option<String>,

    /// Deployment record path
    #[arg(long, env = "STASHPASS_DEPLOYMENT", global = true)]
    deployment: Option<PathBuf>,

    /// Run against an in-process simulated ledger
    #[arg(long, global = true)]
    simulate: bool,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create a ticket machine, reward config and organizer cap
    CreateEvent(event::CreateEventArgs),

    /// Buy a ticket from a machine
    #[command(alias = "buy")]
    BuyTicket(event::BuyTicketArgs),

    /// Create a booth (organizer only)
    CreateBooth(event::CreateBoothArgs),

    /// Stamp a ticket at a booth
    Stamp(attendee::StampArgs),

    /// Burn a stamped ticket and mint a souvenir
    Evolve(attendee::EvolveArgs),

    /// Refund an unstamped ticket
    Refund(attendee::RefundArgs),

    /// Withdraw the machine balance (organizer only)
    Withdraw(organizer::WithdrawArgs),

    /// Map a badge to a perk and souvenir image (organizer only)
    ConfigureReward(organizer::ConfigureRewardArgs),

    /// Hand the OrganizerCap to another address
    TransferCap(organizer::TransferCapArgs),

    /// Show a ticket and its lifecycle state
    InspectTicket(inspect::InspectTicketArgs),

    /// List tickets (or souvenirs) held by an address
    Tickets(inspect::TicketsArgs),

    /// Show price, sales and revenue for a machine
    Stats(organizer::StatsArgs),

    /// Dry-run a souvenir transfer
    VerifySouvenir(inspect::VerifySouvenirArgs),

    /// Show the module's event history
    Events(inspect::EventsArgs),

    /// Create an event, booths and a demo ticket, then write the deployment record
    Setup(event::SetupArgs),

    /// Show the signer, network and held OrganizerCap
    Whoami,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            network: self.network.clone(),
            rpc_url: self.rpc_url.clone(),
            package_id: self.package_id.clone(),
            private_key: self.private_key.clone(),
            treasury_id: self.treasury_id.clone(),
            deployment: self.deployment.clone(),
            simulate: self.simulate,
        }
    }
}

async fn run(cli: Cli) -> CliResult<Completion> {
    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(file, cli.overrides())?;
    let ctx = Context::build(&settings, cli.output)?;

    match cli.command {
        Commands::CreateEvent(args) => event::create_event(&ctx, args).await,
        Commands::BuyTicket(args) => event::buy_ticket(&ctx, args).await,
        Commands::CreateBooth(args) => event::create_booth(&ctx, args).await,
        Commands::Stamp(args) => attendee::stamp(&ctx, args).await,
        Commands::Evolve(args) => attendee::evolve(&ctx, args).await,
        Commands::Refund(args) => attendee::refund(&ctx, args).await,
        Commands::Withdraw(args) => organizer::withdraw(&ctx, args).await,
        Commands::ConfigureReward(args) => organizer::configure_reward(&ctx, args).await,
        Commands::TransferCap(args) => organizer::transfer_cap(&ctx, args).await,
        Commands::InspectTicket(args) => inspect::inspect_ticket(&ctx, args).await,
        Commands::Tickets(args) => inspect::tickets(&ctx, args).await,
        Commands::Stats(args) => organizer::stats(&ctx, args).await,
        Commands::VerifySouvenir(args) => inspect::verify_souvenir(&ctx, args).await,
        Commands::Events(args) => inspect::events(&ctx, args).await,
        Commands::Setup(args) => event::setup(&ctx, args).await,
        Commands::Whoami => inspect::whoami(&ctx).await,
    }
}

fn report(err: &CliError) -> ExitCode {
    print_error(&err.to_string());
    if let Some(hint) = err.hint() {
        print_info(hint);
    }
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout stays reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(completion) => ExitCode::from(completion.exit_code()),
        Err(err) => report(&err),
    }
}

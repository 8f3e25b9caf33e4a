//! Event creation, ticket sales, booths and one-shot setup

use super::{Completion, Context};
use crate::error::CliResult;
use crate::output::{self, print_field, print_info, print_success, report_confirmation, spinner};
use clap::Args;
use stashpass_core::types::format_sui;
use stashpass_core::ObjectId;
use std::path::PathBuf;

/// Default ticket price: 0.1 SUI.
pub const DEFAULT_PRICE: u64 = 100_000_000;

#[derive(Debug, Args)]
pub struct CreateEventArgs {
    /// Ticket price in MIST
    #[arg(short, long, default_value_t = DEFAULT_PRICE)]
    pub price: u64,
}

#[derive(Debug, Args)]
pub struct BuyTicketArgs {
    /// TicketMachine id (defaults to the recorded event)
    #[arg(short, long)]
    pub machine: Option<ObjectId>,

    /// Payment in MIST (defaults to the machine's listed price)
    #[arg(short, long)]
    pub price: Option<u64>,
}

#[derive(Debug, Args)]
pub struct CreateBoothArgs {
    /// Booth name; becomes the badge stamped on tickets
    #[arg(short, long)]
    pub name: String,

    /// OrganizerCap id (defaults to the recorded or owned cap)
    #[arg(short, long)]
    pub cap: Option<ObjectId>,

    /// Do not record an achievement when stamping
    #[arg(long)]
    pub no_achievement: bool,
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Ticket price in MIST
    #[arg(short, long, default_value_t = DEFAULT_PRICE)]
    pub price: u64,

    /// Booth to create (repeatable)
    #[arg(short, long = "booth", default_values_t = [String::from("Main Gate")])]
    pub booths: Vec<String>,

    /// Where to write the deployment record
    #[arg(long)]
    pub record: Option<PathBuf>,
}

pub async fn create_event(ctx: &Context, args: CreateEventArgs) -> CliResult<Completion> {
    print_info(&format!("Creating event with ticket price {}...", format_sui(args.price as i128)));
    let pb = spinner("Submitting create_event...", ctx.format);
    let receipt = ctx.controller.create_event(args.price).await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success("Event created");
        print_field("digest", &receipt.digest);
        print_field("machine", receipt.machine_id);
        print_field("organizer cap", receipt.organizer_cap_id);
        if let Some(id) = receipt.reward_config_id {
            print_field("reward config", id);
        }
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "ticket machine",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn buy_ticket(ctx: &Context, args: BuyTicketArgs) -> CliResult<Completion> {
    let machine = ctx.machine(args.machine)?;
    let price = match args.price {
        Some(price) => price,
        None => ctx.controller.machine_price(machine).await?,
    };
    print_info(&format!("Buying a ticket from {} for {}...", machine.short(), format_sui(price as i128)));

    let pb = spinner("Submitting buy_ticket...", ctx.format);
    let receipt = ctx.controller.buy_ticket(machine, price).await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success("Ticket purchased");
        print_field("digest", &receipt.digest);
        print_field("ticket", receipt.ticket_id);
        let after = receipt
            .tickets_after
            .map_or_else(|| "?".to_string(), |count| count.to_string());
        print_field("tickets held", format!("{} -> {after}", receipt.tickets_before));
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "ticket",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn create_booth(ctx: &Context, args: CreateBoothArgs) -> CliResult<Completion> {
    let cap = ctx.organizer_cap(args.cap).await?;
    let pb = spinner(&format!("Creating booth '{}'...", args.name), ctx.format);
    let receipt = ctx
        .controller
        .create_booth(cap, &args.name, !args.no_achievement)
        .await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success(&format!("Booth '{}' created", receipt.name));
        print_field("digest", &receipt.digest);
        print_field("booth", receipt.booth_id);
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "booth",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn setup(ctx: &Context, args: SetupArgs) -> CliResult<Completion> {
    let record_path = match args.record {
        Some(path) => path,
        // Keep simulated ids out of the real record.
        None if ctx.simulate => ctx.deployment_path.with_extension("simulated.json"),
        None => ctx.deployment_path.clone(),
    };
    print_info(&format!(
        "Setting up event at {} with {} booth(s)...",
        format_sui(args.price as i128),
        args.booths.len()
    ));

    let pb = spinner("Running setup...", ctx.format);
    let report = ctx.controller.setup(args.price, &args.booths, &record_path).await;
    pb.finish_and_clear();
    let report = report?;

    if ctx.format.is_table() {
        print_success("Setup complete");
        print_field("machine", report.event.machine_id);
        print_field("organizer cap", report.event.organizer_cap_id);
        print_field("demo ticket", report.demo_ticket.ticket_id);
        for booth in &report.booths {
            print_field("booth", format!("{} ({})", booth.booth_id, booth.name));
        }
        print_field("record", record_path.display());
    } else {
        output::print_single(&report, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "setup",
        report.confirmation(),
        ctx.format,
    )))
}

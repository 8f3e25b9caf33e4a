//! Ticket holder operations: stamping, evolving and refunding

use super::{Completion, Context};
use crate::error::CliResult;
use crate::output::{self, print_field, print_success, print_warning, report_confirmation, spinner};
use clap::Args;
use stashpass_core::types::format_sui;
use stashpass_core::ObjectId;

#[derive(Debug, Args)]
pub struct StampArgs {
    /// Ticket to stamp
    #[arg(short, long)]
    pub ticket: ObjectId,

    /// Booth id
    #[arg(short, long, conflicts_with = "booth_name")]
    pub booth: Option<ObjectId>,

    /// Booth name from the deployment record
    #[arg(long)]
    pub booth_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct EvolveArgs {
    /// Stamped ticket to burn
    #[arg(short, long)]
    pub ticket: ObjectId,

    /// RewardConfig id (defaults to the recorded one)
    #[arg(short, long)]
    pub reward_config: Option<ObjectId>,
}

#[derive(Debug, Args)]
pub struct RefundArgs {
    /// Unstamped ticket to refund
    #[arg(short, long)]
    pub ticket: ObjectId,

    /// TicketMachine id (defaults to the recorded event)
    #[arg(short, long)]
    pub machine: Option<ObjectId>,
}

pub async fn stamp(ctx: &Context, args: StampArgs) -> CliResult<Completion> {
    let booth = ctx.booth(args.booth, args.booth_name.as_deref())?;
    let pb = spinner("Stamping ticket...", ctx.format);
    let receipt = ctx.controller.stamp_ticket(booth, args.ticket).await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success("Ticket stamped");
        print_field("digest", &receipt.digest);
        print_field("badges", receipt.badges.join(", "));
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "badge",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn evolve(ctx: &Context, args: EvolveArgs) -> CliResult<Completion> {
    let reward_config = ctx.reward_config(args.reward_config)?;
    let pb = spinner("Evolving ticket into a souvenir...", ctx.format);
    let receipt = ctx
        .controller
        .evolve_to_souvenir(args.ticket, reward_config)
        .await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success("Souvenir minted");
        print_field("digest", &receipt.digest);
        print_field("burned ticket", receipt.consumed_ticket);
        print_field("souvenir", receipt.souvenir_id);
        if let Some(souvenir) = &receipt.souvenir {
            let perks = if souvenir.perks.is_empty() {
                "none".to_string()
            } else {
                souvenir.perks.join(", ")
            };
            print_field("perks", perks);
        }
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "souvenir",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn refund(ctx: &Context, args: RefundArgs) -> CliResult<Completion> {
    let machine = ctx.machine(args.machine)?;
    let pb = spinner("Refunding ticket...", ctx.format);
    let receipt = ctx.controller.refund_ticket(machine, args.ticket).await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success("Ticket refunded");
        print_field("digest", &receipt.digest);
        match receipt.balance_change {
            Some(amount) => print_field("balance change", format_sui(amount)),
            None => print_warning("no balance change reported for the signer"),
        }
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::Done)
}

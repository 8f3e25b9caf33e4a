//! Organizer operations: revenue, reward rules and capability hand-over

use super::{Completion, Context};
use crate::error::CliResult;
use crate::output::{self, print_field, print_success, report_confirmation, spinner};
use clap::Args;
use stashpass_core::types::format_sui;
use stashpass_core::{Address, ObjectId};

#[derive(Debug, Args)]
pub struct WithdrawArgs {
    /// OrganizerCap id (defaults to the recorded or owned cap)
    #[arg(short, long)]
    pub cap: Option<ObjectId>,

    /// TicketMachine id (defaults to the recorded event)
    #[arg(short, long)]
    pub machine: Option<ObjectId>,
}

#[derive(Debug, Args)]
pub struct ConfigureRewardArgs {
    /// Badge (booth name) the rule applies to
    #[arg(short, long)]
    pub badge: String,

    /// Perk granted on the souvenir
    #[arg(short, long)]
    pub perk: String,

    /// Souvenir image URL for this badge
    #[arg(short, long)]
    pub image_url: String,

    /// OrganizerCap id (defaults to the recorded or owned cap)
    #[arg(short, long)]
    pub cap: Option<ObjectId>,

    /// RewardConfig id (defaults to the recorded one)
    #[arg(short, long)]
    pub reward_config: Option<ObjectId>,
}

#[derive(Debug, Args)]
pub struct TransferCapArgs {
    /// New holder of organizer authority
    #[arg(short, long)]
    pub recipient: Address,

    /// OrganizerCap id (defaults to the recorded or owned cap)
    #[arg(short, long)]
    pub cap: Option<ObjectId>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// TicketMachine id (defaults to the recorded event)
    #[arg(short, long)]
    pub machine: Option<ObjectId>,
}

pub async fn withdraw(ctx: &Context, args: WithdrawArgs) -> CliResult<Completion> {
    let cap = ctx.organizer_cap(args.cap).await?;
    let machine = ctx.machine(args.machine)?;
    let pb = spinner("Withdrawing funds...", ctx.format);
    let receipt = ctx.controller.withdraw_funds(cap, machine).await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success("Funds withdrawn");
        print_field("digest", &receipt.digest);
        if let Some(amount) = receipt.balance_change {
            print_field("balance change", format_sui(amount));
        }
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "machine balance",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn configure_reward(ctx: &Context, args: ConfigureRewardArgs) -> CliResult<Completion> {
    let cap = ctx.organizer_cap(args.cap).await?;
    let reward_config = ctx.reward_config(args.reward_config)?;
    let pb = spinner("Updating reward rule...", ctx.format);
    let receipt = ctx
        .controller
        .configure_reward_rule(cap, reward_config, &args.badge, &args.perk, &args.image_url)
        .await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success(&format!("Badge '{}' now grants '{}'", receipt.badge, receipt.perk));
        print_field("digest", &receipt.digest);
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::Done)
}

pub async fn transfer_cap(ctx: &Context, args: TransferCapArgs) -> CliResult<Completion> {
    let cap = ctx.organizer_cap(args.cap).await?;
    let pb = spinner("Transferring OrganizerCap...", ctx.format);
    let receipt = ctx
        .controller
        .transfer_organizer_cap(cap, args.recipient)
        .await;
    pb.finish_and_clear();
    let receipt = receipt?;

    if ctx.format.is_table() {
        print_success(&format!("OrganizerCap sent to {}", receipt.recipient));
        print_field("digest", &receipt.digest);
        print_field("cap", receipt.cap_id);
    } else {
        output::print_single(&receipt, ctx.format)?;
    }
    Ok(Completion::from_pending(report_confirmation(
        "capability transfer",
        receipt.confirmation,
        ctx.format,
    )))
}

pub async fn stats(ctx: &Context, args: StatsArgs) -> CliResult<Completion> {
    let machine = ctx.machine(args.machine)?;
    let stats = ctx.controller.organizer_stats(machine).await?;
    if ctx.format.is_table() {
        print_field("machine", stats.machine);
        print_field("price", format_sui(stats.price as i128));
        print_field("tickets sold", stats.tickets_sold);
        print_field("revenue", &stats.revenue);
    } else {
        output::print_single(&stats, ctx.format)?;
    }
    Ok(Completion::Done)
}

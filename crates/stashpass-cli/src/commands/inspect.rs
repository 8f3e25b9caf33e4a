//! Read-only inspection commands

use super::{Completion, Context};
use crate::error::CliResult;
use crate::output::{self, print_field, print_info, print_success, print_warning};
use clap::Args;
use serde::Serialize;
use stashpass_core::{Address, LedgerEvent, ObjectId, SouvenirView, TicketView};
use tabled::Tabled;

#[derive(Debug, Args)]
pub struct InspectTicketArgs {
    /// Ticket id
    pub ticket: ObjectId,
}

#[derive(Debug, Args)]
pub struct TicketsArgs {
    /// Owner to list (defaults to the signer)
    #[arg(long)]
    pub owner: Option<Address>,

    /// List souvenirs instead of tickets
    #[arg(short, long)]
    pub souvenirs: bool,
}

#[derive(Debug, Args)]
pub struct VerifySouvenirArgs {
    /// Souvenir id
    #[arg(short, long)]
    pub souvenir: ObjectId,

    /// Address the dry-run transfer targets
    #[arg(short, long)]
    pub recipient: Address,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Show only the most recent N events
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Table row for ticket display
#[derive(Debug, Serialize, Tabled)]
struct TicketRow {
    id: String,
    state: String,
    badges: String,
    name: String,
}

impl From<&TicketView> for TicketRow {
    fn from(ticket: &TicketView) -> Self {
        Self {
            id: ticket.id.to_string(),
            state: format!("{:?}", ticket.state()),
            badges: join_or_dash(&ticket.badges),
            name: ticket.name.clone(),
        }
    }
}

/// Table row for souvenir display
#[derive(Debug, Serialize, Tabled)]
struct SouvenirRow {
    id: String,
    perks: String,
    url: String,
}

impl From<&SouvenirView> for SouvenirRow {
    fn from(souvenir: &SouvenirView) -> Self {
        Self {
            id: souvenir.id.to_string(),
            perks: join_or_dash(&souvenir.perks),
            url: souvenir.url.clone(),
        }
    }
}

/// Table row for module events
#[derive(Debug, Serialize, Tabled)]
struct EventRow {
    event: String,
    sender: String,
    data: String,
}

impl From<&LedgerEvent> for EventRow {
    fn from(event: &LedgerEvent) -> Self {
        Self {
            event: stashpass_core::resolver::struct_name(&event.event_type).to_string(),
            sender: event
                .sender
                .map_or_else(|| "-".to_string(), |sender| sender.short()),
            data: event.parsed_json.to_string(),
        }
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

pub async fn inspect_ticket(ctx: &Context, args: InspectTicketArgs) -> CliResult<Completion> {
    let ticket = ctx.controller.inspect_ticket(args.ticket).await?;
    if ctx.format.is_table() {
        print_field("ticket", ticket.id);
        print_field("name", &ticket.name);
        print_field("state", format!("{:?}", ticket.state()));
        print_field("badges", join_or_dash(&ticket.badges));
        print_field("url", &ticket.url);
    } else {
        output::print_single(&ticket, ctx.format)?;
    }
    Ok(Completion::Done)
}

pub async fn tickets(ctx: &Context, args: TicketsArgs) -> CliResult<Completion> {
    if args.souvenirs {
        let souvenirs = ctx.controller.list_souvenirs(args.owner).await?;
        if ctx.format.is_table() {
            let rows = souvenirs.iter().map(SouvenirRow::from).collect();
            output::print_output::<SouvenirRow>(rows, ctx.format)?;
        } else {
            output::print_single(&souvenirs, ctx.format)?;
        }
    } else {
        let tickets = ctx.controller.list_tickets(args.owner).await?;
        if ctx.format.is_table() {
            let rows = tickets.iter().map(TicketRow::from).collect();
            output::print_output::<TicketRow>(rows, ctx.format)?;
        } else {
            output::print_single(&tickets, ctx.format)?;
        }
    }
    Ok(Completion::Done)
}

pub async fn verify_souvenir(ctx: &Context, args: VerifySouvenirArgs) -> CliResult<Completion> {
    let check = ctx
        .controller
        .verify_souvenir_transferable(args.souvenir, args.recipient)
        .await?;
    if ctx.format.is_table() {
        if check.transferable {
            print_success(&format!(
                "Souvenir {} can be transferred to {}",
                check.souvenir_id.short(),
                check.recipient.short()
            ));
        } else {
            print_warning(&format!(
                "Transfer would be rejected: {}",
                check.reason.as_deref().unwrap_or("no reason reported")
            ));
        }
    } else {
        output::print_single(&check, ctx.format)?;
    }
    Ok(Completion::Done)
}

pub async fn events(ctx: &Context, args: EventsArgs) -> CliResult<Completion> {
    let mut events = ctx.controller.event_history().await?;
    if let Some(limit) = args.limit {
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
    }
    if ctx.format.is_table() {
        let rows = events.iter().map(EventRow::from).collect();
        output::print_output::<EventRow>(rows, ctx.format)?;
    } else {
        output::print_single(&events, ctx.format)?;
    }
    Ok(Completion::Done)
}

pub async fn whoami(ctx: &Context) -> CliResult<Completion> {
    let address = ctx.controller.address()?;
    let config = ctx.controller.config();
    let cap = ctx.controller.find_organizer_cap(Some(address)).await?;

    if ctx.format.is_table() {
        print_field("address", address);
        print_field("network", config.network);
        print_field("rpc", &config.rpc_url);
        print_field("package", config.package_id);
        match cap {
            Some(cap) => print_field("organizer cap", cap),
            None => print_info("no OrganizerCap held; organizer commands will be rejected"),
        }
    } else {
        output::print_single(
            &serde_json::json!({
                "address": address,
                "network": config.network,
                "rpc_url": config.rpc_url,
                "package_id": config.package_id,
                "organizer_cap_id": cap,
            }),
            ctx.format,
        )?;
    }
    Ok(Completion::Done)
}

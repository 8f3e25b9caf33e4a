//! Client-visible views over ticketing objects, parsed from Move struct fields.

use crate::error::{StashError, StashResult};
use crate::resolver::struct_name;
use crate::types::{format_sui, ObjectId, ObjectSnapshot, Owner};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol fee withheld from every purchase, in basis points.
pub const PROTOCOL_FEE_BPS: u64 = 100;

/// What the organizer keeps from a sale at `price` once the protocol fee is withheld.
pub fn organizer_share(price: u64) -> u64 {
    let fee = u128::from(price) * u128::from(PROTOCOL_FEE_BPS) / 10_000;
    // fee <= price, so the difference always fits back into u64
    price - fee as u64
}

fn shape_error(object: ObjectId, message: impl Into<String>) -> StashError {
    StashError::ObjectShape {
        object,
        message: message.into(),
    }
}

fn string_field(fields: &Value, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(text) => Some(text.clone()),
        // `Url` and `String` wrappers render as `{ "url": .. }` / `{ "bytes": .. }` in some encoders.
        Value::Object(inner) => inner
            .get("url")
            .or_else(|| inner.get("bytes"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn string_list(fields: &Value, name: &str) -> Vec<String> {
    match fields.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    }
}

/// Reads a u64 that may be a JSON number, a decimal string, or a `Balance` struct.
fn u64_field(fields: &Value, name: &str) -> Option<u64> {
    let value = fields.get(name)?;
    let value = value
        .get("fields")
        .and_then(|inner| inner.get("value"))
        .unwrap_or(value);
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn expect_struct(snapshot: &ObjectSnapshot, names: &[&str]) -> StashResult<()> {
    let object_type = snapshot
        .object_type
        .as_deref()
        .ok_or_else(|| shape_error(snapshot.object_id, "object type not reported"))?;
    if names.contains(&struct_name(object_type)) {
        Ok(())
    } else {
        Err(shape_error(
            snapshot.object_id,
            format!("expected {}, found {object_type}", names.join(" or ")),
        ))
    }
}

fn content(snapshot: &ObjectSnapshot) -> StashResult<&Value> {
    match &snapshot.fields {
        Value::Object(_) => Ok(&snapshot.fields),
        _ => Err(shape_error(snapshot.object_id, "content was not fetched")),
    }
}

/// Client-observed lifecycle state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Held with no badges; refundable.
    Fresh,
    /// Held with at least one badge; evolvable.
    Stamped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    pub id: ObjectId,
    pub name: String,
    pub url: String,
    /// Badge names in stamping order.
    pub badges: Vec<String>,
    pub owner: Option<Owner>,
}

impl TicketView {
    pub fn from_snapshot(snapshot: &ObjectSnapshot) -> StashResult<Self> {
        expect_struct(snapshot, &["Ticket"])?;
        let fields = content(snapshot)?;
        if !matches!(fields.get("badges"), Some(Value::Array(_))) {
            return Err(shape_error(snapshot.object_id, "ticket has no badge list"));
        }
        Ok(Self {
            id: snapshot.object_id,
            name: string_field(fields, "name").unwrap_or_default(),
            url: string_field(fields, "url").unwrap_or_default(),
            badges: string_list(fields, "badges"),
            owner: snapshot.owner.clone(),
        })
    }

    pub fn state(&self) -> TicketState {
        if self.badges.is_empty() {
            TicketState::Fresh
        } else {
            TicketState::Stamped
        }
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.iter().any(|held| held == badge)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SouvenirView {
    pub id: ObjectId,
    pub name: String,
    pub url: String,
    pub perks: Vec<String>,
    pub owner: Option<Owner>,
}

impl SouvenirView {
    pub fn from_snapshot(snapshot: &ObjectSnapshot) -> StashResult<Self> {
        expect_struct(snapshot, &["Souvenir"])?;
        let fields = content(snapshot)?;
        Ok(Self {
            id: snapshot.object_id,
            name: string_field(fields, "name").unwrap_or_default(),
            url: string_field(fields, "url")
                .or_else(|| string_field(fields, "image_url"))
                .unwrap_or_default(),
            perks: string_list(fields, "perks"),
            owner: snapshot.owner.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineView {
    pub id: ObjectId,
    pub price: u64,
    pub balance: u64,
}

impl MachineView {
    pub fn from_snapshot(snapshot: &ObjectSnapshot) -> StashResult<Self> {
        expect_struct(snapshot, &["TicketMachine"])?;
        let fields = content(snapshot)?;
        let price = u64_field(fields, "price")
            .ok_or_else(|| shape_error(snapshot.object_id, "machine has no price"))?;
        Ok(Self {
            id: snapshot.object_id,
            price,
            balance: u64_field(fields, "balance").unwrap_or(0),
        })
    }

    /// Organizer share of one sale after the protocol fee.
    pub fn organizer_share(&self) -> u64 {
        organizer_share(self.price)
    }

    /// Tickets sold, estimated from the accumulated balance.
    pub fn tickets_sold(&self) -> u64 {
        match self.organizer_share() {
            0 => 0,
            share => self.balance / share,
        }
    }

    pub fn stats(&self) -> OrganizerStats {
        OrganizerStats {
            machine: self.id,
            price: self.price,
            balance: self.balance,
            tickets_sold: self.tickets_sold(),
            revenue: format_sui(self.balance as i128),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerStats {
    pub machine: ObjectId,
    pub price: u64,
    pub balance: u64,
    pub tickets_sold: u64,
    pub revenue: String,
}

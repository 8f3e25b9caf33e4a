//! Client-visible shapes of ledger objects, effects and events.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of object ids and addresses on the ledger.
pub const ID_LENGTH: usize = 32;

/// Failed to parse a `0x`-prefixed identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid identifier '{input}': {reason}")]
pub struct ParseIdError {
    pub input: String,
    pub reason: String,
}

fn parse_hex_id(input: &str) -> Result<[u8; ID_LENGTH], ParseIdError> {
    let err = |reason: &str| ParseIdError {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let digits = input
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| err("missing 0x prefix"))?;
    if digits.is_empty() {
        return Err(err("no hex digits"));
    }
    if digits.len() > ID_LENGTH * 2 {
        return Err(err("longer than 32 bytes"));
    }
    // Short forms such as `0x6` are left-padded.
    let padded = format!("{:0>width$}", digits, width = ID_LENGTH * 2);
    let mut out = [0u8; ID_LENGTH];
    hex::decode_to_slice(&padded, &mut out).map_err(|e| err(&e.to_string()))?;
    Ok(out)
}

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            pub const fn new(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            pub fn into_bytes(self) -> [u8; ID_LENGTH] {
                self.0
            }

            /// Short display form used in tables and log lines.
            pub fn short(&self) -> String {
                let full = self.to_string();
                format!("{}…{}", &full[..6], &full[full.len() - 4..])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex_id(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_identifier!(
    /// Identifier of an object on the ledger.
    ObjectId
);

hex_identifier!(
    /// Account address derived from a public key.
    Address
);

impl From<Address> for ObjectId {
    fn from(address: Address) -> Self {
        ObjectId(address.0)
    }
}

/// Fully qualified reference to a specific version of an owned object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    /// Base58 object digest as reported by the ledger.
    pub digest: String,
}

/// Ownership of a ledger object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Address(Address),
    Object(ObjectId),
    Shared { initial_shared_version: u64 },
    Immutable,
}

impl Owner {
    pub fn is_owned_by(&self, address: &Address) -> bool {
        matches!(self, Owner::Address(owner) if owner == address)
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Owner::Shared { .. })
    }
}

/// Snapshot of an object as returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: String,
    pub object_type: Option<String>,
    pub owner: Option<Owner>,
    /// Move struct fields; `Null` when content was not requested.
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl ObjectSnapshot {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            object_id: self.object_id,
            version: self.version,
            digest: self.digest.clone(),
        }
    }
}

/// Read options for object fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectQuery {
    pub with_content: bool,
    pub with_owner: bool,
}

impl ObjectQuery {
    pub fn content() -> Self {
        Self {
            with_content: true,
            with_owner: true,
        }
    }
}

/// Kind of change an object went through in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Mutated,
    Deleted,
    Wrapped,
    Transferred,
    Published,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Mutated => "mutated",
            Self::Deleted => "deleted",
            Self::Wrapped => "wrapped",
            Self::Transferred => "transferred",
            Self::Published => "published",
        }
    }
}

/// One entry of a transaction's effect list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectChange {
    pub kind: ChangeKind,
    pub object_id: ObjectId,
    /// Fully qualified Move type, absent for published packages.
    pub object_type: Option<String>,
    pub owner: Option<Owner>,
    pub version: Option<u64>,
}

/// Coin balance delta reported for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub owner: Owner,
    pub coin_type: String,
    pub amount: i128,
}

/// Event emitted by a Move module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_type: String,
    pub sender: Option<Address>,
    #[serde(default)]
    pub parsed_json: serde_json::Value,
}

/// Execution status reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

/// Result of submitting (or dry-running) a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub digest: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub object_changes: Vec<ObjectChange>,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
    #[serde(default)]
    pub balance_changes: Vec<BalanceChange>,
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            ExecutionStatus::Success => None,
            ExecutionStatus::Failure { error } => Some(error),
        }
    }

    /// Net balance change for an address owner across all coin types matching `coin_type`.
    pub fn balance_change_for(&self, owner: &Address, coin_type: &str) -> Option<i128> {
        let mut matched = false;
        let total = self
            .balance_changes
            .iter()
            .filter(|change| change.owner.is_owned_by(owner) && change.coin_type == coin_type)
            .inspect(|_| matched = true)
            .map(|change| change.amount)
            .sum::<i128>();
        matched.then_some(total)
    }
}

/// Native coin type used for payments and gas.
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// MIST per SUI.
pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// Render an amount in MIST as SUI for display.
pub fn format_sui(mist: i128) -> String {
    let sign = if mist < 0 { "-" } else { "" };
    let abs = mist.unsigned_abs();
    let whole = abs / MIST_PER_SUI as u128;
    let frac = abs % MIST_PER_SUI as u128;
    if frac == 0 {
        format!("{sign}{whole} SUI")
    } else {
        let frac = format!("{:09}", frac);
        format!("{sign}{whole}.{} SUI", frac.trim_end_matches('0'))
    }
}

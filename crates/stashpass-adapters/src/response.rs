//! Sui JSON-RPC response shapes and their conversion into core types.

use serde::Deserialize;
use serde_json::Value;
use stashpass_core::types::{
    Address, BalanceChange, ChangeKind, ExecutionStatus, LedgerEvent, ObjectChange, ObjectId,
    ObjectSnapshot, Owner, TransactionOutcome,
};
use stashpass_core::{StashError, StashResult};

/// u64 values arrive as decimal strings.
fn parse_u64(text: &str, what: &str) -> StashResult<u64> {
    text.parse()
        .map_err(|_| StashError::Protocol(format!("invalid {what} '{text}'")))
}

#[derive(Debug, Clone, Deserialize)]
pub enum RpcOwner {
    AddressOwner(Address),
    ObjectOwner(ObjectId),
    Shared {
        initial_shared_version: u64,
    },
    /// Newer nodes report consensus-ordered address owners this way.
    ConsensusAddressOwner {
        owner: Address,
    },
    Immutable,
}

impl From<RpcOwner> for Owner {
    fn from(owner: RpcOwner) -> Self {
        match owner {
            RpcOwner::AddressOwner(address) => Owner::Address(address),
            RpcOwner::ConsensusAddressOwner { owner } => Owner::Address(owner),
            RpcOwner::ObjectOwner(id) => Owner::Object(id),
            RpcOwner::Shared {
                initial_shared_version,
            } => Owner::Shared {
                initial_shared_version,
            },
            RpcOwner::Immutable => Owner::Immutable,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResponse {
    #[serde(default)]
    pub data: Option<ObjectData>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub object_id: ObjectId,
    pub version: String,
    pub digest: String,
    #[serde(rename = "type", default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub owner: Option<RpcOwner>,
    #[serde(default)]
    pub content: Option<Value>,
}

impl ObjectData {
    pub fn into_snapshot(self) -> StashResult<ObjectSnapshot> {
        let content_type = self
            .content
            .as_ref()
            .and_then(|content| content.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let fields = self
            .content
            .and_then(|mut content| content.get_mut("fields").map(Value::take))
            .unwrap_or(Value::Null);
        Ok(ObjectSnapshot {
            object_id: self.object_id,
            version: parse_u64(&self.version, "object version")?,
            digest: self.digest,
            object_type: self.object_type.or(content_type),
            owner: self.owner.map(Owner::from),
            fields,
        })
    }
}

impl ObjectResponse {
    /// `None` for deleted or missing objects.
    pub fn into_snapshot(self) -> StashResult<Option<ObjectSnapshot>> {
        match self.data {
            Some(data) => data.into_snapshot().map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<Value>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinData {
    pub coin_object_id: ObjectId,
    pub version: String,
    pub digest: String,
    pub balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default)]
    pub parsed_json: Value,
}

impl From<RpcEvent> for LedgerEvent {
    fn from(event: RpcEvent) -> Self {
        LedgerEvent {
            event_type: event.event_type,
            sender: event.sender,
            parsed_json: event.parsed_json,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RpcObjectChange {
    #[serde(rename_all = "camelCase")]
    Created {
        object_id: ObjectId,
        object_type: String,
        #[serde(default)]
        owner: Option<RpcOwner>,
        version: String,
    },
    #[serde(rename_all = "camelCase")]
    Mutated {
        object_id: ObjectId,
        object_type: String,
        #[serde(default)]
        owner: Option<RpcOwner>,
        version: String,
    },
    #[serde(rename_all = "camelCase")]
    Transferred {
        object_id: ObjectId,
        object_type: String,
        recipient: RpcOwner,
        version: String,
    },
    #[serde(rename_all = "camelCase")]
    Deleted {
        object_id: ObjectId,
        object_type: String,
        version: String,
    },
    #[serde(rename_all = "camelCase")]
    Wrapped {
        object_id: ObjectId,
        object_type: String,
        version: String,
    },
    #[serde(rename_all = "camelCase")]
    Published { package_id: ObjectId, version: String },
}

impl RpcObjectChange {
    fn into_change(self) -> ObjectChange {
        let version = |text: &str| text.parse().ok();
        let (kind, object_id, object_type, owner, version) = match self {
            Self::Created {
                object_id,
                object_type,
                owner,
                version: v,
            } => (ChangeKind::Created, object_id, Some(object_type), owner, version(&v)),
            Self::Mutated {
                object_id,
                object_type,
                owner,
                version: v,
            } => (ChangeKind::Mutated, object_id, Some(object_type), owner, version(&v)),
            Self::Transferred {
                object_id,
                object_type,
                recipient,
                version: v,
            } => (
                ChangeKind::Transferred,
                object_id,
                Some(object_type),
                Some(recipient),
                version(&v),
            ),
            Self::Deleted {
                object_id,
                object_type,
                version: v,
            } => (ChangeKind::Deleted, object_id, Some(object_type), None, version(&v)),
            Self::Wrapped {
                object_id,
                object_type,
                version: v,
            } => (ChangeKind::Wrapped, object_id, Some(object_type), None, version(&v)),
            Self::Published {
                package_id,
                version: v,
            } => (ChangeKind::Published, package_id, None, None, version(&v)),
        };
        ObjectChange {
            kind,
            object_id,
            object_type,
            owner: owner.map(Owner::from),
            version,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBalanceChange {
    pub owner: RpcOwner,
    pub coin_type: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct RpcStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEffects {
    pub status: RpcStatus,
    #[serde(default)]
    pub transaction_digest: Option<String>,
}

/// Shared shape of `sui_executeTransactionBlock` and `sui_dryRunTransactionBlock`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockResponse {
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub effects: Option<RpcEffects>,
    #[serde(default)]
    pub object_changes: Vec<RpcObjectChange>,
    #[serde(default)]
    pub events: Vec<RpcEvent>,
    #[serde(default)]
    pub balance_changes: Vec<RpcBalanceChange>,
}

impl TransactionBlockResponse {
    pub fn into_outcome(self) -> StashResult<TransactionOutcome> {
        let effects = self
            .effects
            .ok_or_else(|| StashError::Protocol("transaction response has no effects".into()))?;
        let digest = self
            .digest
            .or(effects.transaction_digest)
            .unwrap_or_default();
        let status = match effects.status.status.as_str() {
            "success" => ExecutionStatus::Success,
            _ => ExecutionStatus::Failure {
                error: effects
                    .status
                    .error
                    .unwrap_or_else(|| "unknown failure".to_string()),
            },
        };
        let balance_changes = self
            .balance_changes
            .into_iter()
            .map(|change| {
                Ok(BalanceChange {
                    owner: change.owner.into(),
                    coin_type: change.coin_type,
                    amount: change.amount.parse().map_err(|_| {
                        StashError::Protocol(format!("invalid balance amount '{}'", change.amount))
                    })?,
                })
            })
            .collect::<StashResult<Vec<_>>>()?;

        Ok(TransactionOutcome {
            digest,
            status,
            object_changes: self
                .object_changes
                .into_iter()
                .map(RpcObjectChange::into_change)
                .collect(),
            events: self.events.into_iter().map(LedgerEvent::from).collect(),
            balance_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PKG: &str = "0xd847b4aa993d7e027ace4351f7467037313966156e499829e167e2ef1ae48da2";

    #[test]
    fn parses_object_with_shared_owner_and_fields() {
        let response: ObjectResponse = serde_json::from_value(json!({
            "data": {
                "objectId": "0xa1",
                "version": "12",
                "digest": "9WzSXdwbky8tNbH7juvyaui4QzMUYEjdCEKMrMgLhXHT",
                "type": format!("{PKG}::event_manager::TicketMachine"),
                "owner": {"Shared": {"initial_shared_version": 5}},
                "content": {
                    "dataType": "moveObject",
                    "type": format!("{PKG}::event_manager::TicketMachine"),
                    "hasPublicTransfer": false,
                    "fields": {"price": "100000000", "balance": "0"}
                }
            }
        }))
        .unwrap();
        let snapshot = response.into_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.version, 12);
        assert_eq!(
            snapshot.owner,
            Some(Owner::Shared {
                initial_shared_version: 5
            })
        );
        assert_eq!(snapshot.fields["price"], "100000000");
    }

    #[test]
    fn deleted_objects_have_no_snapshot() {
        let response: ObjectResponse = serde_json::from_value(json!({
            "error": {"code": "deleted", "object_id": "0x71", "version": 9, "digest": "x"}
        }))
        .unwrap();
        assert!(response.into_snapshot().unwrap().is_none());
    }

    #[test]
    fn converts_execution_response() {
        let response: TransactionBlockResponse = serde_json::from_value(json!({
            "digest": "Hx1",
            "effects": {"status": {"status": "success"}},
            "objectChanges": [
                {"type": "mutated", "sender": "0x1", "owner": {"Shared": {"initial_shared_version": 3}},
                 "objectType": format!("{PKG}::event_manager::TicketMachine"), "objectId": "0xa1",
                 "version": "8", "previousVersion": "7", "digest": "d"},
                {"type": "created", "sender": "0x1", "owner": {"AddressOwner": "0x1"},
                 "objectType": format!("{PKG}::event_manager::Ticket"), "objectId": "0x71",
                 "version": "8", "digest": "d"},
                {"type": "published", "packageId": "0x5", "version": "1", "digest": "d", "modules": []}
            ],
            "events": [{"type": format!("{PKG}::event_manager::TicketPurchased"), "sender": "0x1",
                        "parsedJson": {"price": "100000000"}, "id": {"txDigest": "Hx1", "eventSeq": "0"}}],
            "balanceChanges": [{"owner": {"AddressOwner": "0x1"}, "coinType": "0x2::sui::SUI", "amount": "-101000000"}]
        }))
        .unwrap();
        let outcome = response.into_outcome().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.object_changes.len(), 3);
        assert_eq!(outcome.object_changes[1].kind, ChangeKind::Created);
        assert_eq!(outcome.object_changes[2].object_type, None);
        assert_eq!(
            outcome.balance_change_for(&"0x1".parse().unwrap(), "0x2::sui::SUI"),
            Some(-101_000_000)
        );
        assert_eq!(outcome.events[0].parsed_json["price"], "100000000");
    }

    #[test]
    fn failure_status_carries_the_error() {
        let response: TransactionBlockResponse = serde_json::from_value(json!({
            "effects": {"status": {"status": "failure", "error": "MoveAbort(..., 5) in command 0"},
                        "transactionDigest": "Dry1"}
        }))
        .unwrap();
        let outcome = response.into_outcome().unwrap();
        assert_eq!(outcome.digest, "Dry1");
        assert_eq!(outcome.failure_reason(), Some("MoveAbort(..., 5) in command 0"));
    }
}

//! [`Ledger`] over the Sui full node JSON-RPC API.

use crate::response::{CoinData, ObjectResponse, Page, RpcEvent, TransactionBlockResponse};
use crate::rpc::{RpcClient, RpcError};
use crate::wire::{encode_transaction, gas_coin_spend, GasPlan, ResolvedObject, WireError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use stashpass_core::ledger::Ledger;
use stashpass_core::types::{
    Address, ExecutionStatus, LedgerEvent, ObjectId, ObjectQuery, ObjectRef, ObjectSnapshot,
    Owner, TransactionOutcome, SUI_COIN_TYPE,
};
use stashpass_core::{Keypair, NetworkConfig, StashError, StashResult, TransactionUnit};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Page size for paginated reads.
const PAGE_LIMIT: u32 = 50;

/// Upper bound on pages walked per paginated read.
const MAX_PAGES: usize = 40;

/// Maximum number of gas coins in one payment.
const MAX_GAS_COINS: usize = 255;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl From<WireError> for StashError {
    fn from(err: WireError) -> Self {
        StashError::Serialization(err.to_string())
    }
}

pub struct SuiRpcLedger {
    rpc: RpcClient,
}

impl SuiRpcLedger {
    pub fn new(url: &str) -> StashResult<Self> {
        Ok(Self {
            rpc: RpcClient::new(url, DEFAULT_TIMEOUT)?,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> StashResult<Self> {
        Self::new(&config.rpc_url)
    }

    pub fn url(&self) -> &str {
        self.rpc.url()
    }

    fn object_options(query: ObjectQuery) -> Value {
        json!({
            "showType": true,
            "showOwner": query.with_owner || query.with_content,
            "showContent": query.with_content,
        })
    }

    pub async fn reference_gas_price(&self) -> StashResult<u64> {
        let price: String = self.rpc.call("suix_getReferenceGasPrice", json!([])).await?;
        price
            .parse()
            .map_err(|_| StashError::Protocol(format!("invalid reference gas price '{price}'")))
    }

    async fn multi_get(&self, ids: &[ObjectId]) -> StashResult<Vec<ObjectResponse>> {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        Ok(self
            .rpc
            .call(
                "sui_multiGetObjects",
                json!([ids, {"showType": true, "showOwner": true}]),
            )
            .await?)
    }

    /// Map each object input to an owned reference or a shared-object argument.
    async fn resolve_inputs(&self, unit: &TransactionUnit) -> StashResult<HashMap<ObjectId, ResolvedObject>> {
        let ids: Vec<ObjectId> = unit.object_inputs().copied().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut resolved = HashMap::with_capacity(ids.len());
        for (id, response) in ids.iter().zip(self.multi_get(&ids).await?) {
            let snapshot = response
                .into_snapshot()?
                .ok_or(StashError::NotFound(*id))?;
            let object = match snapshot.owner {
                Some(Owner::Shared {
                    initial_shared_version,
                }) => ResolvedObject::Shared {
                    id: *id,
                    initial_shared_version,
                    mutable: true,
                },
                _ => ResolvedObject::Owned(snapshot.object_ref()),
            };
            resolved.insert(*id, object);
        }
        Ok(resolved)
    }

    /// Largest-first selection of SUI coins covering `required`, skipping coins used as inputs.
    async fn select_gas(
        &self,
        owner: Address,
        required: u64,
        exclude: &[ObjectId],
    ) -> StashResult<Vec<ObjectRef>> {
        let mut coins: Vec<CoinData> = self
            .paginate("suix_getCoins", |cursor| {
                json!([owner.to_string(), SUI_COIN_TYPE, cursor, PAGE_LIMIT])
            })
            .await?;
        coins.retain(|coin| !exclude.contains(&coin.coin_object_id));
        coins.sort_by_key(|coin| std::cmp::Reverse(coin.balance.parse::<u64>().unwrap_or(0)));

        let mut selected = Vec::new();
        let mut total = 0u64;
        for coin in coins.into_iter().take(MAX_GAS_COINS) {
            total = total.saturating_add(coin.balance.parse().unwrap_or(0));
            selected.push(ObjectRef {
                object_id: coin.coin_object_id,
                version: coin.version.parse().map_err(|_| {
                    StashError::Protocol(format!("invalid coin version '{}'", coin.version))
                })?,
                digest: coin.digest,
            });
            if total >= required {
                return Ok(selected);
            }
        }
        Err(StashError::Protocol(format!(
            "insufficient SUI for gas: need {required} MIST, {owner} holds {total}"
        )))
    }

    async fn paginate<T, F>(&self, method: &str, params: F) -> StashResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(Value) -> Value,
    {
        let mut items = Vec::new();
        let mut cursor = Value::Null;
        for _ in 0..MAX_PAGES {
            let page: Page<T> = self.rpc.call(method, params(cursor.clone())).await?;
            items.extend(page.data);
            match page.next_cursor {
                Some(next) if page.has_next_page && !next.is_null() => cursor = next,
                _ => return Ok(items),
            }
        }
        debug!(method, pages = MAX_PAGES, "pagination limit reached");
        Ok(items)
    }

    async fn prepare(&self, unit: &TransactionUnit, sender: Address) -> StashResult<Vec<u8>> {
        let objects = self.resolve_inputs(unit).await?;
        let price = self.reference_gas_price().await?;
        let required = unit.gas_budget.saturating_add(gas_coin_spend(unit));
        let exclude: Vec<ObjectId> = unit.object_inputs().copied().collect();
        let payment = self.select_gas(sender, required, &exclude).await?;
        let gas = GasPlan {
            payment,
            owner: sender,
            price,
            budget: unit.gas_budget,
        };
        Ok(encode_transaction(unit, sender, &gas, &objects)?)
    }
}

#[async_trait]
impl Ledger for SuiRpcLedger {
    fn name(&self) -> &str {
        "sui-rpc"
    }

    #[instrument(skip_all, fields(function = unit.primary_function()))]
    async fn submit(&self, unit: &TransactionUnit, signer: &Keypair) -> StashResult<TransactionOutcome> {
        let sender = signer.address();
        let tx_bytes = self.prepare(unit, sender).await?;
        let signature = signer.sign_transaction(&tx_bytes);

        let result: Result<TransactionBlockResponse, RpcError> = self
            .rpc
            .call(
                "sui_executeTransactionBlock",
                json!([
                    BASE64.encode(&tx_bytes),
                    [signature],
                    {
                        "showEffects": true,
                        "showObjectChanges": true,
                        "showEvents": true,
                        "showBalanceChanges": true,
                    },
                    "WaitForLocalExecution",
                ]),
            )
            .await;

        match result {
            Ok(response) => {
                let outcome = response.into_outcome()?;
                info!(digest = %outcome.digest, success = outcome.is_success(), "transaction executed");
                Ok(outcome)
            }
            // Input validation failures (ownership, locked objects) come back as RPC errors.
            Err(RpcError::Rpc { message, .. }) => Ok(TransactionOutcome {
                digest: String::new(),
                status: ExecutionStatus::Failure { error: message },
                object_changes: Vec::new(),
                events: Vec::new(),
                balance_changes: Vec::new(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    async fn get_object(&self, id: ObjectId, query: ObjectQuery) -> StashResult<Option<ObjectSnapshot>> {
        let response: ObjectResponse = self
            .rpc
            .call(
                "sui_getObject",
                json!([id.to_string(), Self::object_options(query)]),
            )
            .await?;
        response.into_snapshot()
    }

    async fn get_owned_objects(
        &self,
        owner: Address,
        type_filter: Option<&str>,
    ) -> StashResult<Vec<ObjectSnapshot>> {
        let filter = type_filter.map(|t| json!({"StructType": t}));
        let responses: Vec<ObjectResponse> = self
            .paginate("suix_getOwnedObjects", |cursor| {
                json!([
                    owner.to_string(),
                    {
                        "filter": filter,
                        "options": Self::object_options(ObjectQuery::content()),
                    },
                    cursor,
                    PAGE_LIMIT,
                ])
            })
            .await?;
        let mut snapshots = Vec::with_capacity(responses.len());
        for response in responses {
            if let Some(snapshot) = response.into_snapshot()? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    async fn query_events(&self, package: ObjectId, module: &str) -> StashResult<Vec<LedgerEvent>> {
        let events: Vec<RpcEvent> = self
            .paginate("suix_queryEvents", |cursor| {
                json!([
                    {"MoveModule": {"package": package.to_string(), "module": module}},
                    cursor,
                    PAGE_LIMIT,
                    false,
                ])
            })
            .await?;
        Ok(events.into_iter().map(LedgerEvent::from).collect())
    }

    async fn dry_run(&self, unit: &TransactionUnit, sender: Address) -> StashResult<TransactionOutcome> {
        let tx_bytes = self.prepare(unit, sender).await?;
        let response: TransactionBlockResponse = self
            .rpc
            .call("sui_dryRunTransactionBlock", json!([BASE64.encode(&tx_bytes)]))
            .await?;
        response.into_outcome()
    }
}

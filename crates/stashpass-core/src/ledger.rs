//! Narrow facade over the external ledger.

use crate::error::StashResult;
use crate::keys::Keypair;
use crate::transaction::TransactionUnit;
use crate::types::{Address, LedgerEvent, ObjectId, ObjectQuery, ObjectSnapshot, TransactionOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Ledger operations the lifecycle layer consumes.
///
/// `submit` is never retried by callers. Reads may lag submissions; use the
/// consistency poller when a read must reflect a write.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Human-readable backend label for logs.
    fn name(&self) -> &str;

    /// Sign and execute a unit. A ledger-side failure is reported in the
    /// outcome status, not as `Err`.
    async fn submit(&self, unit: &TransactionUnit, signer: &Keypair) -> StashResult<TransactionOutcome>;

    /// `Ok(None)` when the object does not exist or was deleted.
    async fn get_object(&self, id: ObjectId, query: ObjectQuery) -> StashResult<Option<ObjectSnapshot>>;

    /// Objects owned by `owner`, optionally filtered by fully qualified struct type.
    async fn get_owned_objects(
        &self,
        owner: Address,
        type_filter: Option<&str>,
    ) -> StashResult<Vec<ObjectSnapshot>>;

    /// Events emitted by `package::module`, oldest first.
    async fn query_events(&self, package: ObjectId, module: &str) -> StashResult<Vec<LedgerEvent>>;

    /// Execute without committing.
    async fn dry_run(&self, unit: &TransactionUnit, sender: Address) -> StashResult<TransactionOutcome>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn submit(&self, unit: &TransactionUnit, signer: &Keypair) -> StashResult<TransactionOutcome> {
        (**self).submit(unit, signer).await
    }

    async fn get_object(&self, id: ObjectId, query: ObjectQuery) -> StashResult<Option<ObjectSnapshot>> {
        (**self).get_object(id, query).await
    }

    async fn get_owned_objects(
        &self,
        owner: Address,
        type_filter: Option<&str>,
    ) -> StashResult<Vec<ObjectSnapshot>> {
        (**self).get_owned_objects(owner, type_filter).await
    }

    async fn query_events(&self, package: ObjectId, module: &str) -> StashResult<Vec<LedgerEvent>> {
        (**self).query_events(package, module).await
    }

    async fn dry_run(&self, unit: &TransactionUnit, sender: Address) -> StashResult<TransactionOutcome> {
        (**self).dry_run(unit, sender).await
    }
}

//! Lifecycle orchestration for each ticketing journey.
//!
//! Every write follows the same pipeline: build, submit once, classify the
//! status, resolve ledger-assigned ids from the effect list, then poll until a
//! dependent read reflects the write. A poll that runs out of attempts is not a
//! failure; the receipt carries [`Confirmation::Unconfirmed`].

use crate::config::NetworkConfig;
use crate::deployment::DeploymentRecord;
use crate::error::{StashError, StashResult};
use crate::guards::{check_evolve, check_refund, check_snapshot_owner};
use crate::keys::Keypair;
use crate::ledger::Ledger;
use crate::poller::{ConsistencyPoller, Delay, PollOutcome, SnapshotCache};
use crate::resolver::{resolve_deleted, resolve_first, resolve_optional, ObjectPredicate};
use crate::transaction::{Argument, CallArg, ContractCall, TransactionBuilder, TransactionUnit};
use crate::types::{
    Address, LedgerEvent, ObjectId, ObjectQuery, ObjectSnapshot, TransactionOutcome,
    SUI_COIN_TYPE,
};
use crate::views::{MachineView, OrganizerStats, SouvenirView, TicketView};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const TICKET_MACHINE: &str = "TicketMachine";
pub const ORGANIZER_CAP: &str = "OrganizerCap";
pub const REWARD_CONFIG: &str = "RewardConfig";
pub const TICKET: &str = "Ticket";
pub const SOUVENIR: &str = "Souvenir";
pub const BOOTH: &str = "Booth";
pub const BOOTH_CAP: &str = "BoothCap";

/// Whether a dependent read caught up with the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed { attempts: u32 },
    /// Submitted successfully but not yet visible; re-check later.
    Unconfirmed { attempts: u32 },
}

impl Confirmation {
    fn from_outcome<T>(outcome: &PollOutcome<T>) -> Self {
        match outcome {
            PollOutcome::Confirmed { attempts, .. } => Self::Confirmed {
                attempts: *attempts,
            },
            PollOutcome::TimedOut { attempts, .. } => Self::Unconfirmed {
                attempts: *attempts,
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Unconfirmed { .. })
    }

    /// Read attempts it took, or [`StashError::ConsistencyTimeout`] naming `what`.
    pub fn check(&self, what: &str) -> StashResult<u32> {
        match *self {
            Self::Confirmed { attempts } => Ok(attempts),
            Self::Unconfirmed { attempts } => Err(StashError::ConsistencyTimeout {
                what: what.to_string(),
                attempts,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCreated {
    pub digest: String,
    pub machine_id: ObjectId,
    pub organizer_cap_id: ObjectId,
    pub reward_config_id: Option<ObjectId>,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPurchased {
    pub digest: String,
    pub ticket_id: ObjectId,
    pub price: u64,
    /// Owned-ticket count before the purchase.
    pub tickets_before: usize,
    pub tickets_after: Option<usize>,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothCreated {
    pub digest: String,
    pub booth_id: ObjectId,
    pub name: String,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStamped {
    pub digest: String,
    pub ticket_id: ObjectId,
    pub booth_id: ObjectId,
    /// Badges as last read; reflects the stamp only when confirmed.
    pub badges: Vec<String>,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SouvenirMinted {
    pub digest: String,
    pub consumed_ticket: ObjectId,
    pub souvenir_id: ObjectId,
    pub souvenir: Option<SouvenirView>,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRefunded {
    pub digest: String,
    pub ticket_id: ObjectId,
    /// Net SUI change for the caller, gas included.
    pub balance_change: Option<i128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsWithdrawn {
    pub digest: String,
    pub machine_id: ObjectId,
    pub balance_change: Option<i128>,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRuleUpdated {
    pub digest: String,
    pub reward_config_id: ObjectId,
    pub badge: String,
    pub perk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapTransferred {
    pub digest: String,
    pub cap_id: ObjectId,
    pub recipient: Address,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCheck {
    pub souvenir_id: ObjectId,
    pub recipient: Address,
    pub transferable: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupReport {
    pub event: EventCreated,
    pub demo_ticket: TicketPurchased,
    pub booths: Vec<BoothCreated>,
    pub record: DeploymentRecord,
}

impl SetupReport {
    pub fn confirmation(&self) -> Confirmation {
        std::iter::once(self.event.confirmation)
            .chain(std::iter::once(self.demo_ticket.confirmation))
            .chain(self.booths.iter().map(|booth| booth.confirmation))
            .find(Confirmation::is_pending)
            .unwrap_or(self.event.confirmation)
    }
}

/// Orchestrates lifecycle operations against one deployment.
pub struct LifecycleController<L: Ledger> {
    ledger: L,
    config: NetworkConfig,
    signer: Option<Keypair>,
    poller: ConsistencyPoller,
    cache: SnapshotCache,
}

impl<L: Ledger> LifecycleController<L> {
    pub fn new(ledger: L, config: NetworkConfig, signer: Option<Keypair>) -> Self {
        let poller = ConsistencyPoller::with_tokio(config.poll);
        Self {
            ledger,
            config,
            signer,
            poller,
            cache: SnapshotCache::new(),
        }
    }

    /// Replace the poll delay, e.g. with `NoDelay` in tests.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.poller = ConsistencyPoller::new(self.config.poll, delay);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn signer(&self) -> StashResult<&Keypair> {
        self.signer
            .as_ref()
            .ok_or_else(|| StashError::Config("no private key configured".into()))
    }

    pub fn address(&self) -> StashResult<Address> {
        self.signer().map(Keypair::address)
    }

    fn predicate(&self, name: &str) -> ObjectPredicate {
        ObjectPredicate::struct_named(name).in_module(self.config.package_id, &self.config.module)
    }

    fn builder(&self) -> TransactionBuilder {
        TransactionBuilder::for_config(&self.config)
    }

    /// Single contract call unit.
    fn unit(&self, call: ContractCall, args: Vec<CallArg>) -> StashResult<TransactionUnit> {
        let mut tx = self.builder();
        tx.call(call, args)?;
        Ok(tx.build()?)
    }

    /// Submit exactly once and classify a failed status.
    async fn execute(&self, unit: &TransactionUnit) -> StashResult<TransactionOutcome> {
        let signer = self.signer()?;
        let function = unit.primary_function().to_string();
        debug!(
            function = %function,
            commands = unit.commands.len(),
            inputs = unit.inputs.len(),
            ledger = self.ledger.name(),
            "submitting transaction"
        );
        let outcome = self.ledger.submit(unit, signer).await?;
        if let Some(reason) = outcome.failure_reason() {
            warn!(function = %function, digest = %outcome.digest, reason, "transaction rejected");
            return Err(self.config.error_codes.classify(&function, reason));
        }
        info!(function = %function, digest = %outcome.digest, "transaction executed");
        Ok(outcome)
    }

    fn resolve(
        &self,
        operation: &'static str,
        outcome: &TransactionOutcome,
        predicate: &ObjectPredicate,
    ) -> StashResult<ObjectId> {
        resolve_first(&outcome.object_changes, predicate).map_err(|source| {
            StashError::ObjectResolutionFailed {
                operation,
                digest: outcome.digest.clone(),
                source,
            }
        })
    }

    fn expect_deleted(
        &self,
        operation: &'static str,
        outcome: &TransactionOutcome,
        id: ObjectId,
    ) -> StashResult<()> {
        resolve_deleted(&outcome.object_changes, id).map_err(|source| {
            StashError::ObjectResolutionFailed {
                operation,
                digest: outcome.digest.clone(),
                source,
            }
        })
    }

    async fn fetch(&self, id: ObjectId) -> StashResult<ObjectSnapshot> {
        self.ledger
            .get_object(id, ObjectQuery::content())
            .await?
            .ok_or(StashError::NotFound(id))
    }

    /// Poll until `id` is readable.
    async fn await_visible(&self, what: &str, id: ObjectId) -> StashResult<PollOutcome<Option<ObjectSnapshot>>> {
        self.poller
            .poll(
                what,
                || self.ledger.get_object(id, ObjectQuery::content()),
                Option::is_some,
            )
            .await
    }

    async fn owned_of_type(&self, owner: Address, struct_name: &str) -> StashResult<Vec<ObjectSnapshot>> {
        let object_type = self.config.struct_type(struct_name);
        let owned = self
            .ledger
            .get_owned_objects(owner, Some(object_type.as_str()))
            .await?;
        Ok(owned)
    }

    #[instrument(skip(self), fields(package = %self.config.package_id))]
    pub async fn create_event(&self, price: u64) -> StashResult<EventCreated> {
        let unit = self.unit(ContractCall::CreateEvent, vec![CallArg::u64(price)])?;
        let outcome = self.execute(&unit).await?;

        let machine_id = self.resolve("create_event", &outcome, &self.predicate(TICKET_MACHINE))?;
        let organizer_cap_id = self.resolve("create_event", &outcome, &self.predicate(ORGANIZER_CAP))?;
        let reward_config_id = resolve_optional(&outcome.object_changes, &self.predicate(REWARD_CONFIG));
        info!(%machine_id, %organizer_cap_id, ?reward_config_id, "event created");

        let visible = self.await_visible("ticket machine", machine_id).await?;
        Ok(EventCreated {
            digest: outcome.digest,
            machine_id,
            organizer_cap_id,
            reward_config_id,
            confirmation: Confirmation::from_outcome(&visible),
        })
    }

    /// Listed ticket price of a machine.
    pub async fn machine_price(&self, machine: ObjectId) -> StashResult<u64> {
        Ok(MachineView::from_snapshot(&self.fetch(machine).await?)?.price)
    }

    #[instrument(skip(self), fields(%machine))]
    pub async fn buy_ticket(&self, machine: ObjectId, price: u64) -> StashResult<TicketPurchased> {
        let buyer = self.address()?;
        let ticket_type = self.config.struct_type(TICKET);

        // Reads right after our own writes may lag; never let the baseline go backwards.
        let observed = self.owned_of_type(buyer, TICKET).await?.len();
        let tickets_before = self
            .cache
            .get(buyer, &ticket_type)
            .map_or(observed, |cached| cached.max(observed));

        let mut tx = self.builder();
        let payment = tx.split_coins(Argument::GasCoin, &[price])?;
        tx.call(
            ContractCall::BuyTicket,
            vec![CallArg::Object(machine), CallArg::Produced(payment[0])],
        )?;
        let unit = tx.build()?;
        let outcome = self.execute(&unit).await?;

        let ticket_id = self.resolve("buy_ticket", &outcome, &self.predicate(TICKET))?;
        info!(%ticket_id, tickets_before, "ticket purchased, waiting for index");

        let counted = self
            .poller
            .poll(
                "owned ticket count",
                || async { Ok::<_, StashError>(self.owned_of_type(buyer, TICKET).await?.len()) },
                |count| *count > tickets_before,
            )
            .await?;
        let tickets_after = counted.value().copied();
        if let Some(count) = tickets_after {
            self.cache.record(buyer, &ticket_type, count.max(tickets_before + 1));
        }

        Ok(TicketPurchased {
            digest: outcome.digest,
            ticket_id,
            price,
            tickets_before,
            tickets_after,
            confirmation: Confirmation::from_outcome(&counted),
        })
    }

    #[instrument(skip(self), fields(%organizer_cap))]
    pub async fn create_booth(
        &self,
        organizer_cap: ObjectId,
        name: &str,
        records_achievement: bool,
    ) -> StashResult<BoothCreated> {
        let unit = self.unit(
            ContractCall::CreateBooth,
            vec![
                CallArg::Object(organizer_cap),
                CallArg::string(name),
                CallArg::bool(records_achievement),
            ],
        )?;
        let outcome = self.execute(&unit).await?;
        let booth_id = self.resolve(
            "create_booth",
            &outcome,
            &self.predicate(BOOTH).or_named(BOOTH_CAP),
        )?;
        info!(%booth_id, name, "booth created");

        let visible = self.await_visible("booth", booth_id).await?;
        Ok(BoothCreated {
            digest: outcome.digest,
            booth_id,
            name: name.to_string(),
            confirmation: Confirmation::from_outcome(&visible),
        })
    }

    /// Stamp a ticket at a booth. A repeated stamp surfaces as
    /// [`StashError::AlreadyCollected`].
    #[instrument(skip(self), fields(%booth, %ticket))]
    pub async fn stamp_ticket(&self, booth: ObjectId, ticket: ObjectId) -> StashResult<TicketStamped> {
        let before = TicketView::from_snapshot(&self.fetch(ticket).await?)?;
        let unit = self.unit(
            ContractCall::StampTicket,
            vec![CallArg::Object(booth), CallArg::Object(ticket)],
        )?;

        let outcome = match self.execute(&unit).await {
            Err(StashError::RemoteCallRejected { abort, .. })
                if self.config.error_codes.is_already_stamped(abort.as_ref())
                    && abort
                        .as_ref()
                        .and_then(|info| info.function.as_deref())
                        .map_or(true, |function| function == "stamp_ticket") =>
            {
                info!("badge already collected");
                return Err(StashError::AlreadyCollected { booth, ticket });
            }
            other => other?,
        };

        let badges_before = before.badges.len();
        let polled = self
            .poller
            .poll(
                "ticket badges",
                || async { TicketView::from_snapshot(&self.fetch(ticket).await?) },
                |view| view.badges.len() > badges_before,
            )
            .await?;
        let badges = polled
            .value()
            .map(|view| view.badges.clone())
            .unwrap_or(before.badges);

        Ok(TicketStamped {
            digest: outcome.digest,
            ticket_id: ticket,
            booth_id: booth,
            badges,
            confirmation: Confirmation::from_outcome(&polled),
        })
    }

    #[instrument(skip(self), fields(%ticket, %reward_config))]
    pub async fn evolve_to_souvenir(
        &self,
        ticket: ObjectId,
        reward_config: ObjectId,
    ) -> StashResult<SouvenirMinted> {
        let caller = self.address()?;
        let snapshot = self.fetch(ticket).await?;
        let view = TicketView::from_snapshot(&snapshot)?;
        check_evolve(&view).map_err(|v| StashError::guard("evolve_to_souvenir", v))?;
        check_snapshot_owner(&snapshot, &caller)
            .map_err(|v| StashError::guard("evolve_to_souvenir", v))?;

        let unit = self.unit(
            ContractCall::EvolveToSouvenir,
            vec![CallArg::Object(ticket), CallArg::Object(reward_config)],
        )?;
        let outcome = self.execute(&unit).await?;
        let souvenir_id = self.resolve("evolve_to_souvenir", &outcome, &self.predicate(SOUVENIR))?;
        self.expect_deleted("evolve_to_souvenir", &outcome, ticket)?;
        info!(%souvenir_id, "ticket evolved");

        let visible = self.await_visible("souvenir", souvenir_id).await?;
        let souvenir = match visible.value() {
            Some(Some(snapshot)) => Some(SouvenirView::from_snapshot(snapshot)?),
            _ => None,
        };
        Ok(SouvenirMinted {
            digest: outcome.digest,
            consumed_ticket: ticket,
            souvenir_id,
            souvenir,
            confirmation: Confirmation::from_outcome(&visible),
        })
    }

    /// Refund an unstamped ticket. Stamped tickets are rejected before submission.
    #[instrument(skip(self), fields(%machine, %ticket))]
    pub async fn refund_ticket(&self, machine: ObjectId, ticket: ObjectId) -> StashResult<TicketRefunded> {
        let caller = self.address()?;
        let snapshot = self.fetch(ticket).await?;
        let view = TicketView::from_snapshot(&snapshot)?;
        check_refund(&view).map_err(|v| StashError::guard("refund_ticket", v))?;
        check_snapshot_owner(&snapshot, &caller).map_err(|v| StashError::guard("refund_ticket", v))?;

        let unit = self.unit(
            ContractCall::RefundTicket,
            vec![CallArg::Object(machine), CallArg::Object(ticket)],
        )?;
        let outcome = self.execute(&unit).await?;
        self.expect_deleted("refund_ticket", &outcome, ticket)?;

        let balance_change = outcome.balance_change_for(&caller, SUI_COIN_TYPE);
        match balance_change {
            Some(amount) => info!(amount, "ticket refunded"),
            None => warn!("refund executed but no balance change was reported for the caller"),
        }
        Ok(TicketRefunded {
            digest: outcome.digest,
            ticket_id: ticket,
            balance_change,
        })
    }

    #[instrument(skip(self), fields(%organizer_cap, %machine))]
    pub async fn withdraw_funds(&self, organizer_cap: ObjectId, machine: ObjectId) -> StashResult<FundsWithdrawn> {
        let caller = self.address()?;
        let unit = self.unit(
            ContractCall::WithdrawFunds,
            vec![CallArg::Object(organizer_cap), CallArg::Object(machine)],
        )?;
        let outcome = self.execute(&unit).await?;
        let balance_change = outcome.balance_change_for(&caller, SUI_COIN_TYPE);

        let drained = self
            .poller
            .poll(
                "machine balance",
                || async { MachineView::from_snapshot(&self.fetch(machine).await?) },
                |view| view.balance == 0,
            )
            .await?;
        Ok(FundsWithdrawn {
            digest: outcome.digest,
            machine_id: machine,
            balance_change,
            confirmation: Confirmation::from_outcome(&drained),
        })
    }

    /// Upsert one badge to perk mapping.
    #[instrument(skip(self, perk, image_url), fields(%organizer_cap, %reward_config))]
    pub async fn configure_reward_rule(
        &self,
        organizer_cap: ObjectId,
        reward_config: ObjectId,
        badge: &str,
        perk: &str,
        image_url: &str,
    ) -> StashResult<RewardRuleUpdated> {
        let unit = self.unit(
            ContractCall::UpdateRewardRule,
            vec![
                CallArg::Object(organizer_cap),
                CallArg::Object(reward_config),
                CallArg::string(badge),
                CallArg::string(perk),
                CallArg::string(image_url),
            ],
        )?;
        let outcome = self.execute(&unit).await?;
        Ok(RewardRuleUpdated {
            digest: outcome.digest,
            reward_config_id: reward_config,
            badge: badge.to_string(),
            perk: perk.to_string(),
        })
    }

    /// First organizer capability held by `owner` (the signer by default).
    pub async fn find_organizer_cap(&self, owner: Option<Address>) -> StashResult<Option<ObjectId>> {
        let owner = match owner {
            Some(owner) => owner,
            None => self.address()?,
        };
        Ok(self
            .owned_of_type(owner, ORGANIZER_CAP)
            .await?
            .first()
            .map(|cap| cap.object_id))
    }

    /// Hand organizer authority to `recipient`.
    #[instrument(skip(self), fields(%cap, %recipient))]
    pub async fn transfer_organizer_cap(&self, cap: ObjectId, recipient: Address) -> StashResult<CapTransferred> {
        let caller = self.address()?;
        let snapshot = self.fetch(cap).await?;
        check_snapshot_owner(&snapshot, &caller)
            .map_err(|v| StashError::guard("transfer_organizer_cap", v))?;

        let mut tx = self.builder();
        tx.transfer_objects(vec![CallArg::Object(cap)], recipient)?;
        let unit = tx.build()?;
        let outcome = self.execute(&unit).await?;

        let moved = self
            .poller
            .poll(
                "capability owner",
                || async { self.fetch(cap).await },
                |snapshot| {
                    snapshot
                        .owner
                        .as_ref()
                        .is_some_and(|owner| owner.is_owned_by(&recipient))
                },
            )
            .await?;
        Ok(CapTransferred {
            digest: outcome.digest,
            cap_id: cap,
            recipient,
            confirmation: Confirmation::from_outcome(&moved),
        })
    }

    pub async fn inspect_ticket(&self, ticket: ObjectId) -> StashResult<TicketView> {
        TicketView::from_snapshot(&self.fetch(ticket).await?)
    }

    pub async fn list_tickets(&self, owner: Option<Address>) -> StashResult<Vec<TicketView>> {
        let owner = match owner {
            Some(owner) => owner,
            None => self.address()?,
        };
        self.owned_of_type(owner, TICKET)
            .await?
            .iter()
            .map(TicketView::from_snapshot)
            .collect()
    }

    pub async fn list_souvenirs(&self, owner: Option<Address>) -> StashResult<Vec<SouvenirView>> {
        let owner = match owner {
            Some(owner) => owner,
            None => self.address()?,
        };
        self.owned_of_type(owner, SOUVENIR)
            .await?
            .iter()
            .map(SouvenirView::from_snapshot)
            .collect()
    }

    pub async fn organizer_stats(&self, machine: ObjectId) -> StashResult<OrganizerStats> {
        Ok(MachineView::from_snapshot(&self.fetch(machine).await?)?.stats())
    }

    /// Dry-run a transfer of `souvenir` to check it is freely tradeable.
    #[instrument(skip(self), fields(%souvenir, %recipient))]
    pub async fn verify_souvenir_transferable(
        &self,
        souvenir: ObjectId,
        recipient: Address,
    ) -> StashResult<TransferCheck> {
        let sender = self.address()?;
        SouvenirView::from_snapshot(&self.fetch(souvenir).await?)?;

        let mut tx = self.builder();
        tx.transfer_objects(vec![CallArg::Object(souvenir)], recipient)?;
        let unit = tx.build()?;
        let outcome = self.ledger.dry_run(&unit, sender).await?;
        Ok(TransferCheck {
            souvenir_id: souvenir,
            recipient,
            transferable: outcome.is_success(),
            reason: outcome.failure_reason().map(str::to_string),
        })
    }

    pub async fn event_history(&self) -> StashResult<Vec<LedgerEvent>> {
        self.ledger
            .query_events(self.config.package_id, &self.config.module)
            .await
    }

    /// Create an event, buy a demo ticket, create booths, then write the
    /// deployment record to `record_path`.
    #[instrument(skip(self, booths, record_path), fields(booths = booths.len()))]
    pub async fn setup(&self, price: u64, booths: &[String], record_path: &Path) -> StashResult<SetupReport> {
        let event = self.create_event(price).await?;
        let demo_ticket = self.buy_ticket(event.machine_id, price).await?;

        let mut created = Vec::with_capacity(booths.len());
        for name in booths {
            created.push(self.create_booth(event.organizer_cap_id, name, true).await?);
        }

        let mut record = DeploymentRecord::new(self.config.network, self.config.package_id);
        record.module = self.config.module.clone();
        record.test_event_id = Some(event.machine_id);
        record.organizer_cap_id = Some(event.organizer_cap_id);
        record.reward_config_id = event.reward_config_id;
        record.treasury_id = self.config.treasury_id;
        for booth in &created {
            record.add_booth(booth.name.clone(), booth.booth_id);
        }
        record.save(record_path)?;
        info!(path = %record_path.display(), "deployment record written");

        Ok(SetupReport {
            event,
            demo_ticket,
            booths: created,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::poller::{NoDelay, PollConfig};
    use crate::types::{ChangeKind, ExecutionStatus, ObjectChange, Owner};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const PKG: &str = "0xd847";

    /// Replays canned submit outcomes and serves a fixed object table.
    #[derive(Default)]
    struct ScriptedLedger {
        outcomes: Mutex<VecDeque<TransactionOutcome>>,
        objects: Mutex<Vec<ObjectSnapshot>>,
        submitted: Mutex<Vec<TransactionUnit>>,
    }

    impl ScriptedLedger {
        fn push_outcome(&self, outcome: TransactionOutcome) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        fn put(&self, snapshot: ObjectSnapshot) {
            self.objects.lock().unwrap().push(snapshot);
        }

        fn submissions(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Ledger for ScriptedLedger {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn submit(&self, unit: &TransactionUnit, _signer: &Keypair) -> StashResult<TransactionOutcome> {
            self.submitted.lock().unwrap().push(unit.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| StashError::Protocol("no scripted outcome".into()))
        }

        async fn get_object(&self, id: ObjectId, _query: ObjectQuery) -> StashResult<Option<ObjectSnapshot>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .find(|object| object.object_id == id)
                .cloned())
        }

        async fn get_owned_objects(
            &self,
            owner: Address,
            type_filter: Option<&str>,
        ) -> StashResult<Vec<ObjectSnapshot>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|object| object.owner.as_ref().is_some_and(|o| o.is_owned_by(&owner)))
                .filter(|object| type_filter.map_or(true, |t| object.object_type.as_deref() == Some(t)))
                .cloned()
                .collect())
        }

        async fn query_events(&self, _package: ObjectId, _module: &str) -> StashResult<Vec<LedgerEvent>> {
            Ok(Vec::new())
        }

        async fn dry_run(&self, _unit: &TransactionUnit, _sender: Address) -> StashResult<TransactionOutcome> {
            Ok(success(vec![]))
        }
    }

    fn success(object_changes: Vec<ObjectChange>) -> TransactionOutcome {
        TransactionOutcome {
            digest: "Dgst1".into(),
            status: ExecutionStatus::Success,
            object_changes,
            events: vec![],
            balance_changes: vec![],
        }
    }

    fn failure(error: &str) -> TransactionOutcome {
        TransactionOutcome {
            status: ExecutionStatus::Failure {
                error: error.to_string(),
            },
            ..success(vec![])
        }
    }

    fn created(id: &str, name: &str) -> ObjectChange {
        ObjectChange {
            kind: ChangeKind::Created,
            object_id: id.parse().unwrap(),
            object_type: Some(format!("{PKG}::event_manager::{name}")),
            owner: None,
            version: Some(1),
        }
    }

    fn keypair() -> Keypair {
        Keypair::from_secret_bytes(&[7u8; 32])
    }

    fn ticket(id: &str, owner: Address, badges: &[&str]) -> ObjectSnapshot {
        ObjectSnapshot {
            object_id: id.parse().unwrap(),
            version: 2,
            digest: "obj".into(),
            object_type: Some(format!("{}::event_manager::Ticket", PKG.parse::<ObjectId>().unwrap())),
            owner: Some(Owner::Address(owner)),
            fields: json!({"name": "Sui Summit", "url": "https://img", "badges": badges}),
        }
    }

    fn controller(ledger: Arc<ScriptedLedger>) -> LifecycleController<Arc<ScriptedLedger>> {
        let config = NetworkConfig::new(Network::Localnet, PKG.parse().unwrap()).with_poll(PollConfig {
            interval_ms: 10,
            max_attempts: 2,
        });
        LifecycleController::new(ledger, config, Some(keypair())).with_delay(Arc::new(NoDelay))
    }

    #[tokio::test]
    async fn create_event_resolves_machine_and_cap_by_exact_type() {
        let ledger = Arc::new(ScriptedLedger::default());
        ledger.push_outcome(success(vec![
            created("0xc1", "OrganizerCap"),
            created("0xa1", "TicketMachine"),
        ]));
        let receipt = controller(ledger.clone()).create_event(100_000_000).await.unwrap();
        assert_eq!(receipt.machine_id, "0xa1".parse().unwrap());
        assert_eq!(receipt.organizer_cap_id, "0xc1".parse().unwrap());
        assert_eq!(receipt.reward_config_id, None);
        // The scripted ledger never shows the machine, so visibility stays pending.
        assert_eq!(receipt.confirmation, Confirmation::Unconfirmed { attempts: 2 });
        assert!(matches!(
            receipt.confirmation.check("ticket machine"),
            Err(StashError::ConsistencyTimeout { ref what, attempts: 2 }) if what == "ticket machine"
        ));
        assert_eq!(Confirmation::Confirmed { attempts: 1 }.check("ticket machine").unwrap(), 1);
    }

    #[tokio::test]
    async fn create_event_without_cap_is_a_resolution_failure() {
        let ledger = Arc::new(ScriptedLedger::default());
        ledger.push_outcome(success(vec![created("0xa1", "TicketMachine")]));
        let err = controller(ledger).create_event(1).await.unwrap_err();
        assert!(matches!(
            err,
            StashError::ObjectResolutionFailed {
                operation: "create_event",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn duplicate_stamp_maps_to_already_collected() {
        let ledger = Arc::new(ScriptedLedger::default());
        let owner = keypair().address();
        ledger.put(ticket("0x71", owner, &["Main Gate"]));
        ledger.push_outcome(failure(
            "MoveAbort(MoveLocation { module: ModuleId { address: d847, name: Identifier(\"event_manager\") }, function: 4, instruction: 21, function_name: Some(\"stamp_ticket\") }, 5) in command 0",
        ));
        let err = controller(ledger)
            .stamp_ticket("0xb1".parse().unwrap(), "0x71".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StashError::AlreadyCollected { .. }));
    }

    #[tokio::test]
    async fn other_rejections_keep_the_raw_reason() {
        let ledger = Arc::new(ScriptedLedger::default());
        ledger.push_outcome(failure("InsufficientCoinBalance in command 0"));
        let err = controller(ledger)
            .create_booth("0xc1".parse().unwrap(), "Main Gate", true)
            .await
            .unwrap_err();
        match err {
            StashError::RemoteCallRejected {
                function, reason, ..
            } => {
                assert_eq!(function, "create_booth");
                assert!(reason.contains("InsufficientCoinBalance"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn refund_guard_blocks_stamped_ticket_before_submission() {
        let ledger = Arc::new(ScriptedLedger::default());
        ledger.put(ticket("0x71", keypair().address(), &["Main Gate"]));
        let err = controller(ledger.clone())
            .refund_ticket("0xa1".parse().unwrap(), "0x71".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_pre_submission());
        assert_eq!(ledger.submissions(), 0);
    }

    #[tokio::test]
    async fn evolve_guard_blocks_fresh_ticket() {
        let ledger = Arc::new(ScriptedLedger::default());
        ledger.put(ticket("0x71", keypair().address(), &[]));
        let err = controller(ledger.clone())
            .evolve_to_souvenir("0x71".parse().unwrap(), "0xe1".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StashError::Guard { operation: "evolve_to_souvenir", .. }));
        assert_eq!(ledger.submissions(), 0);
    }

    #[tokio::test]
    async fn writes_require_a_signer() {
        let ledger = Arc::new(ScriptedLedger::default());
        let config = NetworkConfig::new(Network::Localnet, PKG.parse().unwrap());
        let controller = LifecycleController::new(ledger.clone(), config, None);
        let err = controller.create_event(1).await.unwrap_err();
        assert!(matches!(err, StashError::Config(_)));
        assert_eq!(ledger.submissions(), 0);
    }
}

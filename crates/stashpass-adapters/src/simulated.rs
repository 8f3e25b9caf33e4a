//! In-process [`Ledger`] that executes the `event_manager` contract rules
//! against an object table.
//!
//! Used by tests and by `--simulate` CLI runs. Units are executed atomically:
//! a failing command leaves the table untouched. Owned-object indexing can be
//! made to lag behind writes to exercise the consistency poller.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use stashpass_core::ledger::Ledger;
use stashpass_core::transaction::{Argument, CallInput, Command, ContractCall, MoveTarget, PureValue};
use stashpass_core::types::{
    Address, BalanceChange, ChangeKind, ExecutionStatus, LedgerEvent, ObjectChange, ObjectId,
    ObjectQuery, ObjectSnapshot, Owner, TransactionOutcome, SUI_COIN_TYPE,
};
use stashpass_core::views::organizer_share;
use stashpass_core::{Keypair, StashResult, TransactionUnit, DEFAULT_MODULE};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Flat gas charge per executed unit, in MIST.
pub const SIMULATED_GAS_FEE: u64 = 1_000_000;

pub const TICKET_NAME: &str = "StashPass Ticket";
pub const TICKET_URL: &str = "https://stashpass.app/ticket.png";
pub const SOUVENIR_NAME: &str = "StashPass Souvenir";

/// Reward rule every new event starts with.
pub const DEFAULT_RULE: (&str, &str, &str) = (
    "Main Gate",
    "Early Bird Access",
    "https://stashpass.app/souvenir/main-gate.png",
);

/// Abort codes raised by the simulated contract.
pub mod abort {
    pub const INCORRECT_PAYMENT: u64 = 0;
    pub const NOT_ORGANIZER: u64 = 1;
    pub const NO_BADGES: u64 = 2;
    pub const ALREADY_STAMPED_BEFORE_REFUND: u64 = 3;
    pub const INSUFFICIENT_BALANCE: u64 = 4;
    pub const ALREADY_STAMPED: u64 = 5;
}

/// Structs with the `store` ability; everything else (notably `Ticket`) is soulbound.
const TRANSFERABLE: &[&str] = &["OrganizerCap", "Souvenir"];

#[derive(Debug, Clone)]
struct SimObject {
    version: u64,
    name: &'static str,
    owner: Owner,
    fields: Value,
}

/// Value produced by a command or taken from the input table.
#[derive(Debug, Clone)]
enum Slot {
    Pure(PureValue),
    Object(ObjectId),
    Coin(u64),
}

#[derive(Clone, Default)]
struct World {
    objects: BTreeMap<ObjectId, SimObject>,
    next_id: u64,
}

/// Reason a unit failed, rendered the way a full node reports it.
struct Failure(String);

impl Failure {
    fn abort(module: &str, function: &str, code: u64, command: usize) -> Self {
        Failure(format!(
            "MoveAbort(MoveLocation {{ module: ModuleId {{ address: simulated, name: Identifier(\"{module}\") }}, function: 0, instruction: 0, function_name: Some(\"{function}\") }}, {code}) in command {command}"
        ))
    }
}

/// Effects accumulated while executing one unit.
struct Effects {
    sender: Address,
    changes: Vec<ObjectChange>,
    events: Vec<LedgerEvent>,
    sender_delta: i128,
}

struct Execution<'a> {
    world: &'a mut World,
    package: ObjectId,
    module: &'a str,
    command: usize,
    effects: Effects,
}

impl Execution<'_> {
    fn struct_type(&self, name: &str) -> String {
        format!("{}::{}::{}", self.package, self.module, name)
    }

    fn abort(&self, function: &str, code: u64) -> Failure {
        Failure::abort(self.module, function, code, self.command)
    }

    fn fresh_id(&mut self) -> ObjectId {
        self.world.next_id += 1;
        let mut bytes = [0u8; 32];
        bytes[0] = 0x5e;
        bytes[24..].copy_from_slice(&self.world.next_id.to_be_bytes());
        ObjectId::new(bytes)
    }

    fn emit(&mut self, name: &str, parsed_json: Value) {
        let event_type = self.struct_type(name);
        self.effects.events.push(LedgerEvent {
            event_type,
            sender: Some(self.effects.sender),
            parsed_json,
        });
    }

    fn create(&mut self, name: &'static str, owner: Owner, fields: Value) -> ObjectId {
        let id = self.fresh_id();
        let object_type = self.struct_type(name);
        let mut fields = fields;
        if let Value::Object(map) = &mut fields {
            map.insert("id".into(), json!({ "id": id.to_string() }));
        }
        self.effects.changes.push(ObjectChange {
            kind: ChangeKind::Created,
            object_id: id,
            object_type: Some(object_type),
            owner: Some(owner.clone()),
            version: Some(1),
        });
        self.world.objects.insert(
            id,
            SimObject {
                version: 1,
                name,
                owner,
                fields,
            },
        );
        id
    }

    fn touch(&mut self, id: ObjectId, kind: ChangeKind) {
        let object_type = self.world.objects.get(&id).map(|o| self.struct_type(o.name));
        if let Some(object) = self.world.objects.get_mut(&id) {
            object.version += 1;
            self.effects.changes.push(ObjectChange {
                kind,
                object_id: id,
                object_type,
                owner: Some(object.owner.clone()),
                version: Some(object.version),
            });
        }
    }

    fn delete(&mut self, id: ObjectId) {
        if let Some(object) = self.world.objects.remove(&id) {
            let object_type = self.struct_type(object.name);
            self.effects.changes.push(ObjectChange {
                kind: ChangeKind::Deleted,
                object_id: id,
                object_type: Some(object_type),
                owner: None,
                version: Some(object.version + 1),
            });
        }
    }

    fn object(&self, slot: &Slot, expected: &str) -> Result<ObjectId, Failure> {
        let Slot::Object(id) = slot else {
            return Err(Failure(format!(
                "TypeMismatch in command {}: expected {expected} object",
                self.command
            )));
        };
        match self.world.objects.get(id) {
            Some(object) if object.name == expected => Ok(*id),
            Some(object) => Err(Failure(format!(
                "TypeMismatch in command {}: object {id} is {}, expected {expected}",
                self.command, object.name
            ))),
            None => Err(Failure(format!("object {id} does not exist"))),
        }
    }

    fn fields(&self, id: ObjectId) -> &Value {
        &self.world.objects[&id].fields
    }

    fn fields_mut(&mut self, id: ObjectId) -> &mut Value {
        match self.world.objects.get_mut(&id) {
            Some(object) => &mut object.fields,
            None => unreachable!("object {id} checked before mutation"),
        }
    }

    fn run(&mut self, unit: &TransactionUnit) -> Result<(), Failure> {
        let mut results: Vec<Vec<Slot>> = Vec::with_capacity(unit.commands.len());
        for (index, command) in unit.commands.iter().enumerate() {
            self.command = index;
            let produced = match command {
                Command::SplitCoins { coin, amounts } => {
                    if !matches!(self.slot(unit, &results, *coin)?, Slot::Coin(_)) {
                        return Err(Failure(format!("command {index} splits a non-coin value")));
                    }
                    amounts
                        .iter()
                        .map(|amount| match self.slot(unit, &results, *amount)? {
                            Slot::Pure(PureValue::U64(value)) => Ok(Slot::Coin(value)),
                            _ => Err(Failure(format!("command {index} has a non-u64 split amount"))),
                        })
                        .collect::<Result<Vec<_>, _>>()?
                }
                Command::TransferObjects { objects, recipient } => {
                    let recipient = match self.slot(unit, &results, *recipient)? {
                        Slot::Pure(PureValue::Address(address)) => address,
                        _ => return Err(Failure(format!("command {index} has no address recipient"))),
                    };
                    for (position, argument) in objects.iter().enumerate() {
                        match self.slot(unit, &results, *argument)? {
                            Slot::Object(id) => self.transfer(id, recipient, position)?,
                            Slot::Coin(amount) => self.effects.sender_delta -= amount as i128,
                            Slot::Pure(_) => {
                                return Err(Failure(format!("command {index} transfers a pure value")))
                            }
                        }
                    }
                    Vec::new()
                }
                Command::MoveCall {
                    target, arguments, ..
                } => {
                    let args = arguments
                        .iter()
                        .map(|argument| self.slot(unit, &results, *argument))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.call(target, &args)?
                }
            };
            results.push(produced);
        }
        Ok(())
    }

    fn slot(&self, unit: &TransactionUnit, results: &[Vec<Slot>], argument: Argument) -> Result<Slot, Failure> {
        let missing = || Failure(format!("command {} references a missing value", self.command));
        match argument {
            Argument::GasCoin => Ok(Slot::Coin(u64::MAX)),
            Argument::Input(_) => match unit.input(argument).ok_or_else(missing)? {
                CallInput::Pure(value) => Ok(Slot::Pure(value.clone())),
                CallInput::Object(id) => Ok(Slot::Object(*id)),
            },
            Argument::Result(command) => results
                .get(command as usize)
                .and_then(|values| values.first())
                .cloned()
                .ok_or_else(missing),
            Argument::NestedResult(command, index) => results
                .get(command as usize)
                .and_then(|values| values.get(index as usize))
                .cloned()
                .ok_or_else(missing),
        }
    }

    fn transfer(&mut self, id: ObjectId, recipient: Address, position: usize) -> Result<(), Failure> {
        let command = self.command;
        let object = self
            .world
            .objects
            .get_mut(&id)
            .ok_or_else(|| Failure(format!("object {id} does not exist")))?;
        if !matches!(object.owner, Owner::Address(_)) {
            return Err(Failure(format!(
                "InvalidTransferObject: object {id} is not an address-owned object"
            )));
        }
        // Structs without `store` can only leave their owner through the module.
        if !TRANSFERABLE.contains(&object.name) {
            return Err(Failure(format!(
                "CommandArgumentError {{ arg_idx: {position}, kind: InvalidTransferObject }} in command {command}"
            )));
        }
        object.owner = Owner::Address(recipient);
        self.touch(id, ChangeKind::Transferred);
        Ok(())
    }

    fn call(&mut self, target: &MoveTarget, args: &[Slot]) -> Result<Vec<Slot>, Failure> {
        if target.package != self.package || target.module != self.module {
            return Err(Failure(format!("FunctionNotFound: {target}")));
        }
        let call = ContractCall::from_function_name(&target.function)
            .ok_or_else(|| Failure(format!("FunctionNotFound: {target}")))?;
        if args.len() != call.params().len() {
            return Err(Failure(format!(
                "ArityMismatch in command {}: {} expects {} arguments",
                self.command,
                target.function,
                call.params().len()
            )));
        }
        let string = |slot: &Slot| match slot {
            Slot::Pure(PureValue::String(text)) => Ok(text.clone()),
            _ => Err(Failure(format!("TypeMismatch in command {}: expected string", self.command))),
        };

        match call {
            ContractCall::CreateEvent => {
                let Slot::Pure(PureValue::U64(price)) = args[0] else {
                    return Err(Failure("TypeMismatch: create_event expects a u64 price".into()));
                };
                self.create_event(price)
            }
            ContractCall::BuyTicket => {
                let machine = self.object(&args[0], "TicketMachine")?;
                let Slot::Coin(paid) = args[1] else {
                    return Err(Failure("TypeMismatch: buy_ticket expects a coin".into()));
                };
                self.buy_ticket(machine, paid)
            }
            ContractCall::CreateBooth => {
                let cap = self.object(&args[0], "OrganizerCap")?;
                let name = string(&args[1])?;
                let records = matches!(args[2], Slot::Pure(PureValue::Bool(true)));
                self.create_booth(cap, name, records)
            }
            ContractCall::StampTicket => {
                let booth = self.object(&args[0], "Booth")?;
                let ticket = self.object(&args[1], "Ticket")?;
                self.stamp_ticket(booth, ticket)
            }
            ContractCall::EvolveToSouvenir => {
                let ticket = self.object(&args[0], "Ticket")?;
                let config = self.object(&args[1], "RewardConfig")?;
                self.evolve(ticket, config)
            }
            ContractCall::RefundTicket => {
                let machine = self.object(&args[0], "TicketMachine")?;
                let ticket = self.object(&args[1], "Ticket")?;
                self.refund(machine, ticket)
            }
            ContractCall::WithdrawFunds => {
                let cap = self.object(&args[0], "OrganizerCap")?;
                let machine = self.object(&args[1], "TicketMachine")?;
                self.withdraw(cap, machine)
            }
            ContractCall::UpdateRewardRule => {
                let cap = self.object(&args[0], "OrganizerCap")?;
                let config = self.object(&args[1], "RewardConfig")?;
                let (badge, perk, image_url) = (string(&args[2])?, string(&args[3])?, string(&args[4])?);
                self.update_rule(cap, config, badge, perk, image_url)
            }
        }
    }

    fn create_event(&mut self, price: u64) -> Result<Vec<Slot>, Failure> {
        let machine = self.create(
            "TicketMachine",
            Owner::Shared {
                initial_shared_version: 1,
            },
            json!({ "price": price.to_string(), "balance": "0" }),
        );
        let (badge, perk, image_url) = DEFAULT_RULE;
        self.create(
            "RewardConfig",
            Owner::Shared {
                initial_shared_version: 1,
            },
            json!({
                "machine_id": machine.to_string(),
                "rules": [{ "badge": badge, "perk": perk, "image_url": image_url }],
            }),
        );
        self.create(
            "OrganizerCap",
            Owner::Address(self.effects.sender),
            json!({ "machine_id": machine.to_string() }),
        );
        self.emit("EventCreated", json!({ "machine_id": machine.to_string(), "price": price.to_string() }));
        Ok(Vec::new())
    }

    fn buy_ticket(&mut self, machine: ObjectId, paid: u64) -> Result<Vec<Slot>, Failure> {
        let price = u64_string(&self.fields(machine)["price"]);
        if paid != price {
            return Err(self.abort("buy_ticket", abort::INCORRECT_PAYMENT));
        }
        let share = organizer_share(price);
        let balance = u64_string(&self.fields(machine)["balance"])
            .checked_add(share)
            .ok_or_else(|| Failure("ArithmeticError: machine balance overflow in buy_ticket".into()))?;
        self.fields_mut(machine)["balance"] = json!(balance.to_string());
        self.touch(machine, ChangeKind::Mutated);
        self.effects.sender_delta -= price as i128;

        let ticket = self.create(
            "Ticket",
            Owner::Address(self.effects.sender),
            json!({ "name": TICKET_NAME, "url": TICKET_URL, "badges": [], "machine_id": machine.to_string() }),
        );
        self.emit(
            "TicketPurchased",
            json!({ "ticket_id": ticket.to_string(), "machine_id": machine.to_string(), "price": price.to_string() }),
        );
        Ok(Vec::new())
    }

    fn create_booth(&mut self, cap: ObjectId, name: String, records: bool) -> Result<Vec<Slot>, Failure> {
        let machine = self.fields(cap)["machine_id"].clone();
        let booth = self.create(
            "Booth",
            Owner::Shared {
                initial_shared_version: 1,
            },
            json!({ "name": name, "machine_id": machine, "records_achievement": records }),
        );
        self.emit("BoothCreated", json!({ "booth_id": booth.to_string(), "name": name }));
        Ok(Vec::new())
    }

    fn stamp_ticket(&mut self, booth: ObjectId, ticket: ObjectId) -> Result<Vec<Slot>, Failure> {
        let badge = self.fields(booth)["name"].as_str().unwrap_or_default().to_string();
        let badges = badge_list(self.fields(ticket));
        if badges.contains(&badge) {
            return Err(self.abort("stamp_ticket", abort::ALREADY_STAMPED));
        }
        if let Some(Value::Array(list)) = self.fields_mut(ticket).get_mut("badges") {
            list.push(json!(badge));
        }
        self.touch(ticket, ChangeKind::Mutated);
        self.emit(
            "TicketStamped",
            json!({ "ticket_id": ticket.to_string(), "booth_id": booth.to_string(), "badge": badge }),
        );
        Ok(Vec::new())
    }

    fn evolve(&mut self, ticket: ObjectId, config: ObjectId) -> Result<Vec<Slot>, Failure> {
        let badges = badge_list(self.fields(ticket));
        if badges.is_empty() {
            return Err(self.abort("evolve_to_souvenir", abort::NO_BADGES));
        }
        let rules = self.fields(config)["rules"].as_array().cloned().unwrap_or_default();
        let matched: Vec<&Value> = badges
            .iter()
            .filter_map(|badge| rules.iter().find(|rule| rule["badge"] == json!(badge)))
            .collect();
        let perks: Vec<Value> = matched.iter().map(|rule| rule["perk"].clone()).collect();
        let url = matched
            .first()
            .and_then(|rule| rule["image_url"].as_str())
            .unwrap_or(TICKET_URL)
            .to_string();

        self.delete(ticket);
        let souvenir = self.create(
            "Souvenir",
            Owner::Address(self.effects.sender),
            json!({ "name": SOUVENIR_NAME, "url": url, "perks": perks, "badges": badges }),
        );
        self.emit(
            "SouvenirMinted",
            json!({ "ticket_id": ticket.to_string(), "souvenir_id": souvenir.to_string() }),
        );
        Ok(Vec::new())
    }

    fn refund(&mut self, machine: ObjectId, ticket: ObjectId) -> Result<Vec<Slot>, Failure> {
        if !badge_list(self.fields(ticket)).is_empty() {
            return Err(self.abort("refund_ticket", abort::ALREADY_STAMPED_BEFORE_REFUND));
        }
        let price = u64_string(&self.fields(machine)["price"]);
        let share = organizer_share(price);
        let balance = u64_string(&self.fields(machine)["balance"]);
        if balance < share {
            return Err(self.abort("refund_ticket", abort::INSUFFICIENT_BALANCE));
        }
        self.fields_mut(machine)["balance"] = json!((balance - share).to_string());
        self.touch(machine, ChangeKind::Mutated);
        self.delete(ticket);
        self.effects.sender_delta += share as i128;
        self.emit(
            "TicketRefunded",
            json!({ "ticket_id": ticket.to_string(), "amount": share.to_string() }),
        );
        Ok(Vec::new())
    }

    fn withdraw(&mut self, cap: ObjectId, machine: ObjectId) -> Result<Vec<Slot>, Failure> {
        if self.fields(cap)["machine_id"] != json!(machine.to_string()) {
            return Err(self.abort("withdraw_funds", abort::NOT_ORGANIZER));
        }
        let balance = u64_string(&self.fields(machine)["balance"]);
        self.fields_mut(machine)["balance"] = json!("0");
        self.touch(machine, ChangeKind::Mutated);
        self.effects.sender_delta += balance as i128;
        self.emit(
            "FundsWithdrawn",
            json!({ "machine_id": machine.to_string(), "amount": balance.to_string() }),
        );
        Ok(Vec::new())
    }

    fn update_rule(
        &mut self,
        cap: ObjectId,
        config: ObjectId,
        badge: String,
        perk: String,
        image_url: String,
    ) -> Result<Vec<Slot>, Failure> {
        if self.fields(cap)["machine_id"] != self.fields(config)["machine_id"] {
            return Err(self.abort("update_reward_rule", abort::NOT_ORGANIZER));
        }
        let rule = json!({ "badge": badge, "perk": perk, "image_url": image_url });
        if let Some(Value::Array(rules)) = self.fields_mut(config).get_mut("rules") {
            match rules.iter_mut().find(|existing| existing["badge"] == rule["badge"]) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
        }
        self.touch(config, ChangeKind::Mutated);
        self.emit("RewardRuleUpdated", json!({ "badge": badge, "perk": perk }));
        Ok(Vec::new())
    }
}

fn u64_string(value: &Value) -> u64 {
    value.as_str().and_then(|text| text.parse().ok()).unwrap_or(0)
}

fn badge_list(fields: &Value) -> Vec<String> {
    fields["badges"]
        .as_array()
        .map(|badges| {
            badges
                .iter()
                .filter_map(|badge| badge.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Simulated ledger hosting one deployment of the contract.
pub struct SimulatedLedger {
    package: ObjectId,
    module: String,
    world: RwLock<World>,
    events: RwLock<Vec<LedgerEvent>>,
    /// Remaining owned-object reads each new object stays hidden from.
    pending_index: Mutex<HashMap<ObjectId, u32>>,
    index_lag: u32,
    submissions: AtomicUsize,
}

impl SimulatedLedger {
    pub fn new(package: ObjectId) -> Self {
        Self {
            package,
            module: DEFAULT_MODULE.to_string(),
            world: RwLock::new(World::default()),
            events: RwLock::new(Vec::new()),
            pending_index: Mutex::new(HashMap::new()),
            index_lag: 0,
            submissions: AtomicUsize::new(0),
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Hide newly created owned objects from the next `reads` owned-object queries.
    pub fn with_index_lag(mut self, reads: u32) -> Self {
        self.index_lag = reads;
        self
    }

    pub fn package(&self) -> ObjectId {
        self.package
    }

    /// Number of units submitted, successful or not.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.world.read().objects.len()
    }

    fn snapshot(&self, id: ObjectId, object: &SimObject, query: ObjectQuery) -> ObjectSnapshot {
        ObjectSnapshot {
            object_id: id,
            version: object.version,
            digest: object_digest(id, object.version),
            object_type: Some(format!("{}::{}::{}", self.package, self.module, object.name)),
            owner: (query.with_owner || query.with_content).then(|| object.owner.clone()),
            fields: if query.with_content {
                object.fields.clone()
            } else {
                Value::Null
            },
        }
    }

    /// Check inputs the way a full node does before execution.
    fn check_inputs(world: &World, unit: &TransactionUnit, sender: Address) -> Result<(), Failure> {
        for id in unit.object_inputs() {
            let object = world
                .objects
                .get(id)
                .ok_or_else(|| Failure(format!("Could not find the referenced object {id}")))?;
            match &object.owner {
                Owner::Address(owner) if *owner != sender => {
                    return Err(Failure(format!(
                        "Transaction was not signed by the correct sender: object {id} is not owned by {sender}"
                    )))
                }
                Owner::Object(parent) => {
                    return Err(Failure(format!(
                        "InvalidObjectOwner: object {id} is owned by object {parent}"
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Execute `unit` on a copy of the table; commit only when `commit` is set and it succeeds.
    fn execute(&self, unit: &TransactionUnit, sender: Address, commit: bool) -> TransactionOutcome {
        let sequence = self.submissions.load(Ordering::SeqCst) as u64;
        let digest = transaction_digest(sequence, commit);
        let mut world = self.world.write();
        let mut draft = world.clone();

        let result = Self::check_inputs(&draft, unit, sender).and_then(|()| {
            let mut execution = Execution {
                world: &mut draft,
                package: self.package,
                module: &self.module,
                command: 0,
                effects: Effects {
                    sender,
                    changes: Vec::new(),
                    events: Vec::new(),
                    sender_delta: 0,
                },
            };
            execution.run(unit).map(|()| execution.effects)
        });

        let gas = BalanceChange {
            owner: Owner::Address(sender),
            coin_type: SUI_COIN_TYPE.to_string(),
            amount: -(SIMULATED_GAS_FEE as i128),
        };
        match result {
            Ok(effects) => {
                if commit {
                    *world = draft;
                    self.events.write().extend(effects.events.iter().cloned());
                    if self.index_lag > 0 {
                        let mut pending = self.pending_index.lock();
                        for change in &effects.changes {
                            if change.kind == ChangeKind::Created
                                && matches!(change.owner, Some(Owner::Address(_)))
                            {
                                pending.insert(change.object_id, self.index_lag);
                            }
                        }
                    }
                }
                TransactionOutcome {
                    digest,
                    status: ExecutionStatus::Success,
                    object_changes: effects.changes,
                    events: effects.events,
                    balance_changes: vec![BalanceChange {
                        amount: effects.sender_delta - SIMULATED_GAS_FEE as i128,
                        ..gas
                    }],
                }
            }
            Err(Failure(error)) => TransactionOutcome {
                digest,
                status: ExecutionStatus::Failure { error },
                object_changes: Vec::new(),
                events: Vec::new(),
                balance_changes: vec![gas],
            },
        }
    }
}

fn transaction_digest(sequence: u64, committed: bool) -> String {
    let mut bytes = [0u8; 32];
    bytes[0] = if committed { 0xd1 } else { 0xd7 };
    bytes[24..].copy_from_slice(&sequence.to_be_bytes());
    bs58::encode(bytes).into_string()
}

fn object_digest(id: ObjectId, version: u64) -> String {
    let mut bytes = id.into_bytes();
    for (byte, v) in bytes.iter_mut().zip(version.to_le_bytes()) {
        *byte ^= v;
    }
    bs58::encode(bytes).into_string()
}

#[async_trait]
impl Ledger for SimulatedLedger {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn submit(&self, unit: &TransactionUnit, signer: &Keypair) -> StashResult<TransactionOutcome> {
        let outcome = self.execute(unit, signer.address(), true);
        self.submissions.fetch_add(1, Ordering::SeqCst);
        debug!(
            function = unit.primary_function(),
            digest = %outcome.digest,
            success = outcome.is_success(),
            "simulated execution"
        );
        Ok(outcome)
    }

    async fn get_object(&self, id: ObjectId, query: ObjectQuery) -> StashResult<Option<ObjectSnapshot>> {
        let world = self.world.read();
        Ok(world
            .objects
            .get(&id)
            .map(|object| self.snapshot(id, object, query)))
    }

    async fn get_owned_objects(
        &self,
        owner: Address,
        type_filter: Option<&str>,
    ) -> StashResult<Vec<ObjectSnapshot>> {
        let world = self.world.read();
        let mut pending = self.pending_index.lock();
        let owned = world
            .objects
            .iter()
            .filter(|(id, object)| object.owner.is_owned_by(&owner) && !pending.contains_key(*id))
            .map(|(id, object)| self.snapshot(*id, object, ObjectQuery::content()))
            .filter(|snapshot| type_filter.map_or(true, |t| snapshot.object_type.as_deref() == Some(t)))
            .collect();

        pending.retain(|_, reads| {
            *reads -= 1;
            *reads > 0
        });
        Ok(owned)
    }

    async fn query_events(&self, package: ObjectId, module: &str) -> StashResult<Vec<LedgerEvent>> {
        if package != self.package || module != self.module {
            return Ok(Vec::new());
        }
        Ok(self.events.read().clone())
    }

    async fn dry_run(&self, unit: &TransactionUnit, sender: Address) -> StashResult<TransactionOutcome> {
        Ok(self.execute(unit, sender, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashpass_core::TransactionBuilder;

    fn ledger() -> SimulatedLedger {
        SimulatedLedger::new("0xd847".parse().unwrap())
    }

    fn signer(seed: u8) -> Keypair {
        Keypair::from_secret_bytes(&[seed; 32])
    }

    fn builder(ledger: &SimulatedLedger) -> TransactionBuilder {
        TransactionBuilder::new(ledger.package(), DEFAULT_MODULE)
    }

    fn created_named(outcome: &TransactionOutcome, name: &str) -> ObjectId {
        outcome
            .object_changes
            .iter()
            .find(|change| {
                change.kind == ChangeKind::Created
                    && change.object_type.as_deref().is_some_and(|t| t.ends_with(&format!("::{name}")))
            })
            .map(|change| change.object_id)
            .unwrap()
    }

    async fn create_event(ledger: &SimulatedLedger, organizer: &Keypair) -> TransactionOutcome {
        let mut tx = builder(ledger);
        tx.call(ContractCall::CreateEvent, vec![stashpass_core::CallArg::u64(100_000_000)])
            .unwrap();
        ledger.submit(&tx.build().unwrap(), organizer).await.unwrap()
    }

    #[tokio::test]
    async fn create_event_shares_machine_and_hands_cap_to_sender() {
        let ledger = ledger();
        let organizer = signer(1);
        let outcome = create_event(&ledger, &organizer).await;
        assert!(outcome.is_success());

        let machine = created_named(&outcome, "TicketMachine");
        let cap = created_named(&outcome, "OrganizerCap");
        let machine = ledger.get_object(machine, ObjectQuery::content()).await.unwrap().unwrap();
        assert!(machine.owner.unwrap().is_shared());
        let cap = ledger.get_object(cap, ObjectQuery::content()).await.unwrap().unwrap();
        assert!(cap.owner.unwrap().is_owned_by(&organizer.address()));
    }

    #[tokio::test]
    async fn wrong_payment_aborts_without_side_effects() {
        let ledger = ledger();
        let organizer = signer(1);
        let machine = created_named(&create_event(&ledger, &organizer).await, "TicketMachine");
        let objects = ledger.object_count();

        let mut tx = builder(&ledger);
        let coin = tx.split_coins(Argument::GasCoin, &[5]).unwrap();
        tx.call(
            ContractCall::BuyTicket,
            vec![stashpass_core::CallArg::Object(machine), stashpass_core::CallArg::Produced(coin[0])],
        )
        .unwrap();
        let outcome = ledger.submit(&tx.build().unwrap(), &organizer).await.unwrap();

        let reason = outcome.failure_reason().unwrap();
        assert!(reason.contains("function_name: Some(\"buy_ticket\") }, 0)"));
        assert_eq!(ledger.object_count(), objects);
    }

    #[tokio::test]
    async fn foreign_owned_inputs_are_rejected_before_execution() {
        let ledger = ledger();
        let organizer = signer(1);
        let cap = created_named(&create_event(&ledger, &organizer).await, "OrganizerCap");

        let mut tx = builder(&ledger);
        tx.call(
            ContractCall::CreateBooth,
            vec![
                stashpass_core::CallArg::Object(cap),
                stashpass_core::CallArg::string("Main Gate"),
                stashpass_core::CallArg::bool(true),
            ],
        )
        .unwrap();
        let outcome = ledger.submit(&tx.build().unwrap(), &signer(2)).await.unwrap();
        assert!(outcome.failure_reason().unwrap().contains("not owned by"));
    }

    #[tokio::test]
    async fn index_lag_hides_new_owned_objects_for_a_few_reads() {
        let ledger = ledger().with_index_lag(2);
        let organizer = signer(1);
        create_event(&ledger, &organizer).await;

        let owner = organizer.address();
        assert!(ledger.get_owned_objects(owner, None).await.unwrap().is_empty());
        assert!(ledger.get_owned_objects(owner, None).await.unwrap().is_empty());
        assert_eq!(ledger.get_owned_objects(owner, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tickets_are_soulbound_but_caps_move() {
        let ledger = ledger();
        let organizer = signer(1);
        let attendee = signer(2);
        let event = create_event(&ledger, &organizer).await;
        let machine = created_named(&event, "TicketMachine");
        let cap = created_named(&event, "OrganizerCap");

        let mut tx = builder(&ledger);
        let coin = tx.split_coins(Argument::GasCoin, &[100_000_000]).unwrap();
        tx.call(
            ContractCall::BuyTicket,
            vec![stashpass_core::CallArg::Object(machine), stashpass_core::CallArg::Produced(coin[0])],
        )
        .unwrap();
        let bought = ledger.submit(&tx.build().unwrap(), &attendee).await.unwrap();
        let ticket = created_named(&bought, "Ticket");

        let mut tx = builder(&ledger);
        tx.transfer_objects(vec![stashpass_core::CallArg::Object(ticket)], signer(3).address())
            .unwrap();
        let outcome = ledger.submit(&tx.build().unwrap(), &attendee).await.unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.failure_reason().unwrap().contains("InvalidTransferObject"));
        let held = ledger.get_object(ticket, ObjectQuery::content()).await.unwrap().unwrap();
        assert!(held.owner.unwrap().is_owned_by(&attendee.address()));

        let mut tx = builder(&ledger);
        tx.transfer_objects(vec![stashpass_core::CallArg::Object(cap)], signer(3).address())
            .unwrap();
        let outcome = ledger.submit(&tx.build().unwrap(), &organizer).await.unwrap();
        assert!(outcome.is_success());
        let moved = ledger.get_object(cap, ObjectQuery::content()).await.unwrap().unwrap();
        assert!(moved.owner.unwrap().is_owned_by(&signer(3).address()));
    }

    #[tokio::test]
    async fn dry_run_does_not_commit() {
        let ledger = ledger();
        let mut tx = builder(&ledger);
        tx.call(ContractCall::CreateEvent, vec![stashpass_core::CallArg::u64(1)])
            .unwrap();
        let outcome = ledger.dry_run(&tx.build().unwrap(), signer(1).address()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(ledger.object_count(), 0);
        assert_eq!(ledger.submissions(), 0);
    }
}

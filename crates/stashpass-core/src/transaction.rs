//! Programmable transaction assembly.
//!
//! A [`TransactionUnit`] is an ordered list of commands over a shared input
//! table. Every command in a unit executes atomically on the ledger. Results of
//! earlier commands (for example coins split off the gas coin) can be consumed
//! by later commands in the same unit.

use crate::config::{NetworkConfig, DEFAULT_GAS_BUDGET};
use crate::types::{Address, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hard limit on inputs and commands per unit.
pub const MAX_ENTRIES: usize = 1024;

/// Plain value encoded directly into the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PureValue {
    U64(u64),
    Bool(bool),
    String(String),
    Address(Address),
}

impl PureValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::U64(_) => ParamKind::U64,
            Self::Bool(_) => ParamKind::Bool,
            Self::String(_) => ParamKind::String,
            Self::Address(_) => ParamKind::Address,
        }
    }
}

/// Entry of the input table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallInput {
    Pure(PureValue),
    /// Ledger object; whether it is owned or shared is resolved at submission.
    Object(ObjectId),
}

/// Reference to a value available to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

/// Fully qualified Move function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    MoveCall {
        target: MoveTarget,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    TransferObjects {
        objects: Vec<Argument>,
        recipient: Argument,
    },
}

/// One atomic submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionUnit {
    pub inputs: Vec<CallInput>,
    pub commands: Vec<Command>,
    pub gas_budget: u64,
}

impl TransactionUnit {
    /// Move functions called by this unit, in command order.
    pub fn move_calls(&self) -> impl Iterator<Item = &MoveTarget> {
        self.commands.iter().filter_map(|command| match command {
            Command::MoveCall { target, .. } => Some(target),
            _ => None,
        })
    }

    pub fn object_inputs(&self) -> impl Iterator<Item = &ObjectId> {
        self.inputs.iter().filter_map(|input| match input {
            CallInput::Object(id) => Some(id),
            CallInput::Pure(_) => None,
        })
    }

    /// Name of the last Move function called, used to label errors.
    pub fn primary_function(&self) -> &str {
        self.move_calls()
            .last()
            .map(|target| target.function.as_str())
            .unwrap_or("transfer_objects")
    }

    pub fn input(&self, argument: Argument) -> Option<&CallInput> {
        match argument {
            Argument::Input(index) => self.inputs.get(index as usize),
            _ => None,
        }
    }
}

/// Declared parameter kind of a contract function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Object,
    Coin,
    U64,
    Bool,
    String,
    Address,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Coin => "coin",
            Self::U64 => "u64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Address => "address",
        };
        f.write_str(name)
    }
}

/// Entry points of the ticketing module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractCall {
    CreateEvent,
    BuyTicket,
    CreateBooth,
    StampTicket,
    EvolveToSouvenir,
    RefundTicket,
    WithdrawFunds,
    UpdateRewardRule,
}

impl ContractCall {
    pub const ALL: [ContractCall; 8] = [
        Self::CreateEvent,
        Self::BuyTicket,
        Self::CreateBooth,
        Self::StampTicket,
        Self::EvolveToSouvenir,
        Self::RefundTicket,
        Self::WithdrawFunds,
        Self::UpdateRewardRule,
    ];

    pub fn function_name(self) -> &'static str {
        match self {
            Self::CreateEvent => "create_event",
            Self::BuyTicket => "buy_ticket",
            Self::CreateBooth => "create_booth",
            Self::StampTicket => "stamp_ticket",
            Self::EvolveToSouvenir => "evolve_to_souvenir",
            Self::RefundTicket => "refund_ticket",
            Self::WithdrawFunds => "withdraw_funds",
            Self::UpdateRewardRule => "update_reward_rule",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|call| call.function_name() == name)
    }

    /// Declared parameters, excluding the implicit transaction context.
    pub fn params(self) -> &'static [ParamKind] {
        use ParamKind::*;
        match self {
            Self::CreateEvent => &[U64],
            Self::BuyTicket => &[Object, Coin],
            Self::CreateBooth => &[Object, String, Bool],
            Self::StampTicket => &[Object, Object],
            Self::EvolveToSouvenir => &[Object, Object],
            Self::RefundTicket => &[Object, Object],
            Self::WithdrawFunds => &[Object, Object],
            Self::UpdateRewardRule => &[Object, Object, String, String, String],
        }
    }
}

/// Argument supplied to [`TransactionBuilder::call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Object(ObjectId),
    Pure(PureValue),
    /// Value produced earlier in the same unit, or the gas coin.
    Produced(Argument),
}

impl CallArg {
    pub fn u64(value: u64) -> Self {
        Self::Pure(PureValue::U64(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Pure(PureValue::Bool(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Pure(PureValue::String(value.into()))
    }

    fn describe(&self) -> String {
        match self {
            Self::Object(_) => "object".to_string(),
            Self::Pure(value) => value.kind().to_string(),
            Self::Produced(Argument::GasCoin) => "gas coin".to_string(),
            Self::Produced(argument) => format!("{argument:?}"),
        }
    }
}

/// Client-side rejection of a malformed unit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{function} takes {expected} arguments, {actual} supplied")]
    ArityMismatch {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("argument {index} of {function} must be {expected}, got {actual}")]
    ArgumentKind {
        function: &'static str,
        index: usize,
        expected: ParamKind,
        actual: String,
    },

    #[error("reference to result of command {command}, but only {available} commands precede it")]
    DanglingResult { command: u16, available: usize },

    #[error("reference to input {input}, but the unit has {available} inputs")]
    DanglingInput { input: u16, available: usize },

    #[error("nested result {index} of command {command} does not exist")]
    NestedResultOutOfRange { command: u16, index: u16 },

    #[error("split amounts must be non-empty and positive")]
    InvalidSplit,

    #[error("transfer needs at least one object")]
    NothingToTransfer,

    #[error("transaction has no commands")]
    Empty,

    #[error("transaction exceeds 1024 inputs or commands")]
    TooLarge,
}

/// What a command yields, tracked so later references can be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Produces {
    Coins(u16),
    Value,
    Nothing,
}

/// Incremental builder for a [`TransactionUnit`].
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    package: ObjectId,
    module: String,
    gas_budget: u64,
    inputs: Vec<CallInput>,
    commands: Vec<Command>,
    produces: Vec<Produces>,
}

impl TransactionBuilder {
    pub fn new(package: ObjectId, module: impl Into<String>) -> Self {
        Self {
            package,
            module: module.into(),
            gas_budget: DEFAULT_GAS_BUDGET,
            inputs: Vec::new(),
            commands: Vec::new(),
            produces: Vec::new(),
        }
    }

    pub fn for_config(config: &NetworkConfig) -> Self {
        Self::new(config.package_id, config.module.clone()).gas_budget(config.gas_budget)
    }

    pub fn gas_budget(mut self, budget: u64) -> Self {
        self.gas_budget = budget;
        self
    }

    fn push_input(&mut self, input: CallInput) -> Result<Argument, BuildError> {
        if let Some(position) = self.inputs.iter().position(|existing| *existing == input) {
            return Ok(Argument::Input(position as u16));
        }
        if self.inputs.len() >= MAX_ENTRIES {
            return Err(BuildError::TooLarge);
        }
        self.inputs.push(input);
        Ok(Argument::Input((self.inputs.len() - 1) as u16))
    }

    /// Add (or reuse) an object input.
    pub fn object(&mut self, id: ObjectId) -> Result<Argument, BuildError> {
        self.push_input(CallInput::Object(id))
    }

    pub fn pure(&mut self, value: PureValue) -> Result<Argument, BuildError> {
        self.push_input(CallInput::Pure(value))
    }

    fn check_argument(&self, argument: Argument) -> Result<(), BuildError> {
        let available = self.commands.len();
        match argument {
            Argument::GasCoin => Ok(()),
            Argument::Input(input) if (input as usize) < self.inputs.len() => Ok(()),
            Argument::Input(input) => Err(BuildError::DanglingInput {
                input,
                available: self.inputs.len(),
            }),
            Argument::Result(command) | Argument::NestedResult(command, _)
                if command as usize >= available =>
            {
                Err(BuildError::DanglingResult { command, available })
            }
            Argument::Result(_) => Ok(()),
            Argument::NestedResult(command, index) => match self.produces[command as usize] {
                Produces::Coins(count) if index < count => Ok(()),
                Produces::Value if index == 0 => Ok(()),
                _ => Err(BuildError::NestedResultOutOfRange { command, index }),
            },
        }
    }

    fn is_coin(&self, argument: Argument) -> bool {
        match argument {
            Argument::GasCoin => true,
            Argument::NestedResult(command, _) | Argument::Result(command) => matches!(
                self.produces.get(command as usize),
                Some(Produces::Coins(_))
            ),
            Argument::Input(input) => {
                matches!(self.inputs.get(input as usize), Some(CallInput::Object(_)))
            }
        }
    }

    fn push_command(&mut self, command: Command, produces: Produces) -> Result<u16, BuildError> {
        if self.commands.len() >= MAX_ENTRIES {
            return Err(BuildError::TooLarge);
        }
        self.commands.push(command);
        self.produces.push(produces);
        Ok((self.commands.len() - 1) as u16)
    }

    /// Split `amounts` off `coin`; returns one coin argument per amount.
    pub fn split_coins(
        &mut self,
        coin: Argument,
        amounts: &[u64],
    ) -> Result<Vec<Argument>, BuildError> {
        if amounts.is_empty() || amounts.contains(&0) {
            return Err(BuildError::InvalidSplit);
        }
        self.check_argument(coin)?;
        let amounts = amounts
            .iter()
            .map(|amount| self.pure(PureValue::U64(*amount)))
            .collect::<Result<Vec<_>, _>>()?;
        let count = amounts.len() as u16;
        let command = self.push_command(Command::SplitCoins { coin, amounts }, Produces::Coins(count))?;
        Ok((0..count)
            .map(|index| Argument::NestedResult(command, index))
            .collect())
    }

    /// Call a ticketing entry point, checking arity and argument kinds.
    pub fn call(&mut self, call: ContractCall, args: Vec<CallArg>) -> Result<Argument, BuildError> {
        let function = call.function_name();
        let params = call.params();
        if params.len() != args.len() {
            return Err(BuildError::ArityMismatch {
                function,
                expected: params.len(),
                actual: args.len(),
            });
        }

        let mut arguments = Vec::with_capacity(args.len());
        for (index, (param, arg)) in params.iter().zip(args).enumerate() {
            let kind_error = |arg: &CallArg| BuildError::ArgumentKind {
                function,
                index,
                expected: *param,
                actual: arg.describe(),
            };
            let argument = match (param, &arg) {
                (ParamKind::Object | ParamKind::Coin, CallArg::Object(id)) => self.object(*id)?,
                (ParamKind::Object, CallArg::Produced(argument)) if *argument != Argument::GasCoin => {
                    self.check_argument(*argument)?;
                    *argument
                }
                (ParamKind::Coin, CallArg::Produced(argument)) => {
                    self.check_argument(*argument)?;
                    if !self.is_coin(*argument) {
                        return Err(kind_error(&arg));
                    }
                    *argument
                }
                (expected, CallArg::Pure(value)) if value.kind() == *expected => {
                    self.pure(value.clone())?
                }
                _ => return Err(kind_error(&arg)),
            };
            arguments.push(argument);
        }

        let target = MoveTarget {
            package: self.package,
            module: self.module.clone(),
            function: function.to_string(),
        };
        let command = self.push_command(
            Command::MoveCall {
                target,
                type_arguments: Vec::new(),
                arguments,
            },
            Produces::Value,
        )?;
        Ok(Argument::Result(command))
    }

    /// Transfer owned objects (or produced values) to `recipient`.
    pub fn transfer_objects(
        &mut self,
        objects: Vec<CallArg>,
        recipient: Address,
    ) -> Result<(), BuildError> {
        if objects.is_empty() {
            return Err(BuildError::NothingToTransfer);
        }
        let mut arguments = Vec::with_capacity(objects.len());
        for (index, object) in objects.into_iter().enumerate() {
            let argument = match object {
                CallArg::Object(id) => self.object(id)?,
                CallArg::Produced(argument) => {
                    self.check_argument(argument)?;
                    argument
                }
                CallArg::Pure(value) => {
                    return Err(BuildError::ArgumentKind {
                        function: "transfer_objects",
                        index,
                        expected: ParamKind::Object,
                        actual: value.kind().to_string(),
                    })
                }
            };
            arguments.push(argument);
        }
        let recipient = self.pure(PureValue::Address(recipient))?;
        self.push_command(
            Command::TransferObjects {
                objects: arguments,
                recipient,
            },
            Produces::Nothing,
        )?;
        Ok(())
    }

    pub fn build(self) -> Result<TransactionUnit, BuildError> {
        if self.commands.is_empty() {
            return Err(BuildError::Empty);
        }
        Ok(TransactionUnit {
            inputs: self.inputs,
            commands: self.commands,
            gas_budget: self.gas_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TransactionBuilder {
        TransactionBuilder::new("0xd847".parse().unwrap(), "event_manager")
    }

    fn id(raw: &str) -> ObjectId {
        raw.parse().unwrap()
    }

    #[test]
    fn buy_ticket_splits_exact_payment_from_gas() {
        let mut tx = builder();
        let coins = tx.split_coins(Argument::GasCoin, &[100_000_000]).unwrap();
        assert_eq!(coins, vec![Argument::NestedResult(0, 0)]);
        tx.call(
            ContractCall::BuyTicket,
            vec![CallArg::Object(id("0xa1")), CallArg::Produced(coins[0])],
        )
        .unwrap();
        let unit = tx.build().unwrap();

        assert_eq!(unit.commands.len(), 2);
        assert_eq!(
            unit.inputs,
            vec![
                CallInput::Pure(PureValue::U64(100_000_000)),
                CallInput::Object(id("0xa1")),
            ]
        );
        match &unit.commands[1] {
            Command::MoveCall {
                target, arguments, ..
            } => {
                assert_eq!(target.function, "buy_ticket");
                assert_eq!(
                    arguments,
                    &vec![Argument::Input(1), Argument::NestedResult(0, 0)]
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(unit.primary_function(), "buy_ticket");
        assert_eq!(unit.gas_budget, DEFAULT_GAS_BUDGET);
    }

    #[test]
    fn repeated_objects_share_one_input() {
        let mut tx = builder();
        let machine = id("0xa1");
        tx.call(
            ContractCall::WithdrawFunds,
            vec![CallArg::Object(id("0xc1")), CallArg::Object(machine)],
        )
        .unwrap();
        tx.call(
            ContractCall::WithdrawFunds,
            vec![CallArg::Object(id("0xc1")), CallArg::Object(machine)],
        )
        .unwrap();
        assert_eq!(tx.build().unwrap().inputs.len(), 2);
    }

    #[test]
    fn stamp_takes_booth_and_ticket_only() {
        let mut tx = builder();
        let err = tx
            .call(
                ContractCall::StampTicket,
                vec![
                    CallArg::Object(id("0xb1")),
                    CallArg::Object(id("0x71")),
                    CallArg::Object(id("0x6")),
                ],
            )
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::ArityMismatch {
                function: "stamp_ticket",
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn argument_kinds_are_checked_before_submission() {
        let mut tx = builder();
        let err = tx
            .call(
                ContractCall::CreateBooth,
                vec![
                    CallArg::Object(id("0xc1")),
                    CallArg::u64(7),
                    CallArg::bool(true),
                ],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::ArgumentKind {
                index: 1,
                expected: ParamKind::String,
                ..
            }
        ));
    }

    #[test]
    fn coin_params_reject_non_coin_results() {
        let mut tx = builder();
        let produced = tx
            .call(ContractCall::CreateEvent, vec![CallArg::u64(5)])
            .unwrap();
        let err = tx
            .call(
                ContractCall::BuyTicket,
                vec![CallArg::Object(id("0xa1")), CallArg::Produced(produced)],
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::ArgumentKind { index: 1, .. }));
    }

    #[test]
    fn dangling_results_are_rejected() {
        let mut tx = builder();
        let err = tx
            .call(
                ContractCall::BuyTicket,
                vec![
                    CallArg::Object(id("0xa1")),
                    CallArg::Produced(Argument::NestedResult(3, 0)),
                ],
            )
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::DanglingResult {
                command: 3,
                available: 0
            }
        );

        let coins = tx.split_coins(Argument::GasCoin, &[10]).unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(
            tx.split_coins(Argument::NestedResult(0, 1), &[1]),
            Err(BuildError::NestedResultOutOfRange {
                command: 0,
                index: 1
            })
        );
    }

    #[test]
    fn empty_units_and_zero_splits_fail() {
        assert_eq!(builder().build(), Err(BuildError::Empty));
        assert_eq!(
            builder().split_coins(Argument::GasCoin, &[0]),
            Err(BuildError::InvalidSplit)
        );
        assert_eq!(
            builder().transfer_objects(vec![], "0x1".parse().unwrap()),
            Err(BuildError::NothingToTransfer)
        );
    }

    #[test]
    fn every_contract_call_round_trips_its_name() {
        for call in ContractCall::ALL {
            assert_eq!(ContractCall::from_function_name(call.function_name()), Some(call));
        }
        assert_eq!(ContractCall::from_function_name("mint"), None);
    }
}

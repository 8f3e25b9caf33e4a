//! StashPass core: ticket lifecycle orchestration against the Sui ledger.
//!
//! The crate decodes operator keys, assembles programmable transactions for the
//! `event_manager` contract, recovers ledger-assigned ids from effect lists and
//! waits, with explicit bounds, for reads to catch up with writes.

#![deny(unsafe_code)]

pub mod config;
pub mod deployment;
pub mod error;
pub mod guards;
pub mod keys;
pub mod ledger;
pub mod lifecycle;
pub mod poller;
pub mod resolver;
pub mod transaction;
pub mod types;
pub mod views;

pub use config::{Network, NetworkConfig, DEFAULT_GAS_BUDGET, DEFAULT_MODULE};
pub use deployment::{BoothRecord, DeploymentRecord, DEFAULT_DEPLOYMENT_FILE};
pub use error::{AbortInfo, ContractErrorCodes, StashError, StashResult};
pub use guards::GuardViolation;
pub use keys::{KeyDecodeError, KeyEncoding, Keypair, SignatureScheme};
pub use ledger::Ledger;
pub use lifecycle::{
    BoothCreated, CapTransferred, Confirmation, EventCreated, FundsWithdrawn, LifecycleController,
    RewardRuleUpdated, SetupReport, SouvenirMinted, TicketPurchased, TicketRefunded, TicketStamped,
    TransferCheck,
};
pub use poller::{ConsistencyPoller, Delay, NoDelay, PollConfig, PollOutcome, TokioDelay};
pub use resolver::{ObjectPredicate, ResolveError};
pub use transaction::{
    Argument, BuildError, CallArg, CallInput, Command, ContractCall, MoveTarget, ParamKind,
    PureValue, TransactionBuilder, TransactionUnit,
};
pub use types::{
    Address, BalanceChange, ChangeKind, ExecutionStatus, LedgerEvent, ObjectChange, ObjectId,
    ObjectQuery, ObjectRef, ObjectSnapshot, Owner, TransactionOutcome, SUI_COIN_TYPE,
};
pub use views::{MachineView, OrganizerStats, SouvenirView, TicketState, TicketView};

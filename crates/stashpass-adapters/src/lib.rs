//! Ledger adapters for StashPass.
//!
//! [`SuiRpcLedger`] talks to a Sui full node over JSON-RPC and encodes
//! programmable transactions as BCS. [`SimulatedLedger`] executes the same
//! contract rules in process.

#![deny(unsafe_code)]

pub mod response;
pub mod rpc;
pub mod simulated;
pub mod sui;
pub mod wire;

pub use rpc::{RpcClient, RpcError};
pub use simulated::{SimulatedLedger, SIMULATED_GAS_FEE};
pub use sui::SuiRpcLedger;
pub use wire::{encode_transaction, GasPlan, ResolvedObject, WireError};

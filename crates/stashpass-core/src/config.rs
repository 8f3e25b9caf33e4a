//! Explicit configuration handed to every component constructor.

use crate::error::{ContractErrorCodes, StashError, StashResult};
use crate::poller::PollConfig;
use crate::types::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Move module holding the ticketing entry points.
pub const DEFAULT_MODULE: &str = "event_manager";

/// Default gas budget per submission, in MIST.
pub const DEFAULT_GAS_BUDGET: u64 = 50_000_000;

/// Ledger network the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        }
    }

    /// Public full node endpoint for the network.
    pub fn fullnode_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Self::Testnet => "https://fullnode.testnet.sui.io:443",
            Self::Devnet => "https://fullnode.devnet.sui.io:443",
            Self::Localnet => "http://127.0.0.1:9000",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = StashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            "localnet" | "local" => Ok(Self::Localnet),
            other => Err(StashError::Config(format!("unknown network '{other}'"))),
        }
    }
}

/// Network and contract coordinates of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network: Network,

    /// JSON-RPC endpoint; defaults to the network's public full node.
    pub rpc_url: String,

    /// Published package holding the ticketing module.
    pub package_id: ObjectId,

    #[serde(default = "default_module")]
    pub module: String,

    /// Protocol treasury receiving the purchase fee.
    #[serde(default)]
    pub treasury_id: Option<ObjectId>,

    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,

    #[serde(default)]
    pub error_codes: ContractErrorCodes,

    #[serde(default)]
    pub poll: PollConfig,
}

fn default_module() -> String {
    DEFAULT_MODULE.to_string()
}

fn default_gas_budget() -> u64 {
    DEFAULT_GAS_BUDGET
}

impl NetworkConfig {
    pub fn new(network: Network, package_id: ObjectId) -> Self {
        Self {
            network,
            rpc_url: network.fullnode_url().to_string(),
            package_id,
            module: default_module(),
            treasury_id: None,
            gas_budget: DEFAULT_GAS_BUDGET,
            error_codes: ContractErrorCodes::default(),
            poll: PollConfig::default(),
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_treasury(mut self, treasury_id: Option<ObjectId>) -> Self {
        self.treasury_id = treasury_id;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Fully qualified struct type in the ticketing module, e.g. `0x…::event_manager::Ticket`.
    pub fn struct_type(&self, name: &str) -> String {
        format!("{}::{}::{}", self.package_id, self.module, name)
    }

    pub fn validate(&self) -> StashResult<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(StashError::Config("rpc url is empty".into()));
        }
        if self.module.trim().is_empty() {
            return Err(StashError::Config("module name is empty".into()));
        }
        if self.gas_budget == 0 {
            return Err(StashError::Config("gas budget must be positive".into()));
        }
        self.poll.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_urls_and_parsing() {
        assert_eq!(
            "TestNet".parse::<Network>().unwrap().fullnode_url(),
            "https://fullnode.testnet.sui.io:443"
        );
        assert_eq!("local".parse::<Network>().unwrap(), Network::Localnet);
        assert!("moon".parse::<Network>().is_err());
    }

    #[test]
    fn struct_types_are_fully_qualified() {
        let config = NetworkConfig::new(Network::Testnet, "0xabc".parse().unwrap());
        let ticket = config.struct_type("Ticket");
        assert!(ticket.starts_with("0x0000"));
        assert!(ticket.ends_with("abc::event_manager::Ticket"));
    }

    #[test]
    fn validation_rejects_zero_budget() {
        let mut config = NetworkConfig::new(Network::Devnet, "0x1".parse().unwrap());
        assert!(config.validate().is_ok());
        config.gas_budget = 0;
        assert!(matches!(config.validate(), Err(StashError::Config(_))));
    }
}

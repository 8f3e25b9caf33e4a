//! Layered CLI configuration: TOML file, then environment and flags.

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use stashpass_core::{
    ContractErrorCodes, DeploymentRecord, Keypair, Network, NetworkConfig, ObjectId, PollConfig,
    DEFAULT_DEPLOYMENT_FILE,
};
use std::path::{Path, PathBuf};

/// Package id used by `--simulate` when nothing else is configured.
pub const SIMULATED_PACKAGE: &str = "0x5747";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub network: Option<String>,
    pub rpc_url: Option<String>,
    pub package_id: Option<String>,
    pub module: Option<String>,
    pub treasury_id: Option<String>,
    pub gas_budget: Option<u64>,
    pub private_key: Option<String>,
    pub deployment: Option<PathBuf>,
    pub poll: Option<PollConfig>,
    pub error_codes: Option<ContractErrorCodes>,
}

impl FileConfig {
    /// Default location: `<config_dir>/stashpass/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stashpass").join("config.toml"))
    }

    /// Load an explicit file (which must exist) or the default file if present.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Values from flags and their environment variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub network: Option<String>,
    pub rpc_url: Option<String>,
    pub package_id: Option<String>,
    pub private_key: Option<String>,
    pub treasury_id: Option<String>,
    pub deployment: Option<PathBuf>,
    pub simulate: bool,
}

/// Fully resolved settings for one invocation. Not `Debug`: it holds the raw key.
#[derive(Clone)]
pub struct Settings {
    pub network: Network,
    pub rpc_url: Option<String>,
    pub package_id: Option<ObjectId>,
    pub module: Option<String>,
    pub treasury_id: Option<ObjectId>,
    pub gas_budget: Option<u64>,
    pub poll: Option<PollConfig>,
    pub error_codes: Option<ContractErrorCodes>,
    private_key: Option<String>,
    pub deployment_path: PathBuf,
    pub deployment: Option<DeploymentRecord>,
    pub simulate: bool,
}

fn parse_id(what: &str, raw: &str) -> CliResult<ObjectId> {
    raw.parse()
        .map_err(|e| CliError::InvalidInput(format!("{what}: {e}")))
}

impl Settings {
    /// Later layers win: file < environment < flags. The deployment record
    /// only fills the package id when nothing else set it.
    pub fn resolve(file: FileConfig, flags: Overrides) -> CliResult<Self> {
        let network = match flags.network.as_deref().or(file.network.as_deref()) {
            Some(raw) => raw.parse()?,
            None => Network::default(),
        };

        let deployment_path = flags
            .deployment
            .or(file.deployment)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOYMENT_FILE));
        let deployment = DeploymentRecord::load_optional(&deployment_path)?;

        let package_id = match flags.package_id.as_deref().or(file.package_id.as_deref()) {
            Some(raw) => Some(parse_id("package id", raw)?),
            None => deployment.as_ref().map(|record| record.package_id),
        };
        let package_id = match (package_id, flags.simulate) {
            (None, true) => Some(parse_id("package id", SIMULATED_PACKAGE)?),
            (package_id, _) => package_id,
        };

        let treasury_id = match flags.treasury_id.as_deref().or(file.treasury_id.as_deref()) {
            Some(raw) => Some(parse_id("treasury id", raw)?),
            None => deployment.as_ref().and_then(|record| record.treasury_id),
        };

        let private_key = flags
            .private_key
            .or_else(|| std::env::var("PRIVATE_KEY").ok())
            .or(file.private_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Self {
            network,
            rpc_url: flags.rpc_url.or(file.rpc_url),
            package_id,
            module: file.module,
            treasury_id,
            gas_budget: file.gas_budget,
            poll: file.poll,
            error_codes: file.error_codes,
            private_key,
            deployment_path,
            deployment,
            simulate: flags.simulate,
        })
    }

    /// Decode the configured key. Runs before any ledger is constructed.
    pub fn keypair(&self) -> CliResult<Option<Keypair>> {
        match &self.private_key {
            Some(raw) => Ok(Some(Keypair::decode(raw).map_err(stashpass_core::StashError::from)?)),
            None => Ok(None),
        }
    }

    pub fn network_config(&self) -> CliResult<NetworkConfig> {
        let package_id = self.package_id.ok_or_else(|| {
            CliError::Config("package id not configured (SUI_PACKAGE_ID or --package-id)".into())
        })?;
        let mut config = NetworkConfig::new(self.network, package_id).with_treasury(self.treasury_id);
        if let Some(url) = &self.rpc_url {
            config = config.with_rpc_url(url.clone());
        }
        if let Some(module) = &self.module {
            config.module = module.clone();
        }
        if let Some(budget) = self.gas_budget {
            config.gas_budget = budget;
        }
        if let Some(poll) = self.poll {
            config = config.with_poll(poll);
        }
        if let Some(codes) = &self.error_codes {
            config.error_codes = codes.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(dir: &Path) -> Overrides {
        Overrides {
            deployment: Some(dir.join("deployment.json")),
            ..Overrides::default()
        }
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig {
            network: Some("devnet".into()),
            package_id: Some("0xaa".into()),
            gas_budget: Some(10_000_000),
            ..FileConfig::default()
        };
        let flags = Overrides {
            package_id: Some("0xbb".into()),
            ..overrides(dir.path())
        };
        let settings = Settings::resolve(file, flags).unwrap();
        assert_eq!(settings.network, Network::Devnet);
        assert_eq!(settings.package_id, Some("0xbb".parse().unwrap()));

        let config = settings.network_config().unwrap();
        assert_eq!(config.gas_budget, 10_000_000);
        assert_eq!(config.rpc_url, Network::Devnet.fullnode_url());
    }

    #[test]
    fn deployment_record_fills_the_package_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.json");
        let mut record = DeploymentRecord::new(Network::Testnet, "0xd847".parse().unwrap());
        record.save(&path).unwrap();

        let settings = Settings::resolve(FileConfig::default(), overrides(dir.path())).unwrap();
        assert_eq!(settings.package_id, Some("0xd847".parse().unwrap()));
        assert!(settings.deployment.is_some());
    }

    #[test]
    fn missing_package_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::resolve(FileConfig::default(), overrides(dir.path())).unwrap();
        assert!(matches!(settings.network_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn simulate_supplies_a_package() {
        let dir = tempfile::tempdir().unwrap();
        let flags = Overrides {
            simulate: true,
            ..overrides(dir.path())
        };
        let settings = Settings::resolve(FileConfig::default(), flags).unwrap();
        assert!(settings.network_config().is_ok());
    }

    #[test]
    fn file_config_parses_nested_tables() {
        let file: FileConfig = toml::from_str(
            r#"
            network = "localnet"
            package_id = "0xd847"

            [poll]
            interval_ms = 500
            max_attempts = 10

            [error_codes]
            already_stamped = 5
            unauthorized = [1]
            "#,
        )
        .unwrap();
        assert_eq!(file.poll.unwrap().max_attempts, 10);
        assert_eq!(file.error_codes.unwrap().unauthorized, vec![1]);
    }

    #[test]
    fn malformed_keys_fail_before_any_ledger_exists() {
        let dir = tempfile::tempdir().unwrap();
        let flags = Overrides {
            private_key: Some("definitely-not-a-key".into()),
            ..overrides(dir.path())
        };
        let settings = Settings::resolve(FileConfig::default(), flags).unwrap();
        assert!(matches!(
            settings.keypair(),
            Err(CliError::Stash(stashpass_core::StashError::KeyDecode(_)))
        ));
    }
}

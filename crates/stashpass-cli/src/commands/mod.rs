//! CLI command implementations

pub mod attendee;
pub mod event;
pub mod inspect;
pub mod organizer;

use crate::config::Settings;
use crate::error::{CliError, CliResult, EXIT_UNCONFIRMED};
use crate::output::OutputFormat;
use stashpass_adapters::{SimulatedLedger, SuiRpcLedger};
use stashpass_core::{DeploymentRecord, Ledger, LifecycleController, ObjectId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub type Controller = LifecycleController<Arc<dyn Ledger>>;

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Done,
    /// Submitted, but a dependent read never caught up.
    Pending,
}

impl Completion {
    pub fn from_pending(pending: bool) -> Self {
        if pending {
            Self::Pending
        } else {
            Self::Done
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Self::Done => 0,
            Self::Pending => EXIT_UNCONFIRMED,
        }
    }
}

/// Everything a command needs: the controller plus defaults from the deployment record.
pub struct Context {
    pub controller: Controller,
    pub deployment: Option<DeploymentRecord>,
    pub deployment_path: PathBuf,
    pub simulate: bool,
    pub format: OutputFormat,
}

impl Context {
    /// Decode the key, then build the ledger. Nothing touches the network here.
    pub fn build(settings: &Settings, format: OutputFormat) -> CliResult<Self> {
        let signer = settings.keypair()?;
        let config = settings.network_config()?;

        let ledger: Arc<dyn Ledger> = if settings.simulate {
            Arc::new(SimulatedLedger::new(config.package_id).with_module(config.module.clone()))
        } else {
            Arc::new(SuiRpcLedger::from_config(&config)?)
        };
        debug!(
            ledger = ledger.name(),
            network = %config.network,
            package = %config.package_id,
            signer = ?signer.as_ref().map(|key| key.address()),
            "context ready"
        );

        // A fresh simulated ledger knows none of the recorded ids.
        let deployment = if settings.simulate {
            None
        } else {
            settings.deployment.clone()
        };
        Ok(Self {
            controller: LifecycleController::new(ledger, config, signer),
            deployment,
            deployment_path: settings.deployment_path.clone(),
            simulate: settings.simulate,
            format,
        })
    }

    fn recorded(&self, pick: impl Fn(&DeploymentRecord) -> Option<ObjectId>) -> Option<ObjectId> {
        self.deployment.as_ref().and_then(pick)
    }

    pub fn machine(&self, explicit: Option<ObjectId>) -> CliResult<ObjectId> {
        explicit
            .or_else(|| self.recorded(|record| record.test_event_id))
            .ok_or_else(|| {
                CliError::InvalidInput("no ticket machine; pass --machine or run `stashpass setup`".into())
            })
    }

    pub fn reward_config(&self, explicit: Option<ObjectId>) -> CliResult<ObjectId> {
        explicit
            .or_else(|| self.recorded(|record| record.reward_config_id))
            .ok_or_else(|| {
                CliError::InvalidInput("no reward config; pass --reward-config".into())
            })
    }

    /// Explicit id, then the recorded booth (by name, or the demo booth).
    pub fn booth(&self, explicit: Option<ObjectId>, name: Option<&str>) -> CliResult<ObjectId> {
        if let Some(id) = explicit {
            return Ok(id);
        }
        let found = match name {
            Some(name) => self.recorded(|record| record.booth_named(name)),
            None => self.recorded(|record| record.demo_booth_id),
        };
        found.ok_or_else(|| match name {
            Some(name) => CliError::InvalidInput(format!("no recorded booth named '{name}'")),
            None => CliError::InvalidInput("no booth; pass --booth or --booth-name".into()),
        })
    }

    /// Explicit id, then the recorded cap, then the first cap the signer owns.
    pub async fn organizer_cap(&self, explicit: Option<ObjectId>) -> CliResult<ObjectId> {
        if let Some(id) = explicit.or_else(|| self.recorded(|record| record.organizer_cap_id)) {
            return Ok(id);
        }
        self.controller
            .find_organizer_cap(None)
            .await?
            .ok_or_else(|| CliError::InvalidInput("signer holds no OrganizerCap; pass --cap".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, Overrides};

    fn context(dir: &std::path::Path) -> Context {
        let path = dir.join("deployment.json");
        let mut record = DeploymentRecord::new(stashpass_core::Network::Testnet, "0xd847".parse().unwrap());
        record.test_event_id = Some("0xa1".parse().unwrap());
        record.add_booth("Main Gate", "0xb1".parse().unwrap());
        record.add_booth("Workshop", "0xb2".parse().unwrap());
        record.save(&path).unwrap();

        let settings = Settings::resolve(
            FileConfig::default(),
            Overrides {
                deployment: Some(path),
                ..Overrides::default()
            },
        )
        .unwrap();
        Context::build(&settings, OutputFormat::Json).unwrap()
    }

    #[test]
    fn recorded_ids_fill_missing_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert_eq!(ctx.machine(None).unwrap(), "0xa1".parse().unwrap());
        assert_eq!(ctx.booth(None, None).unwrap(), "0xb1".parse().unwrap());
        assert_eq!(ctx.booth(None, Some("workshop")).unwrap(), "0xb2".parse().unwrap());
        assert!(ctx.booth(None, Some("VIP")).is_err());
        assert!(ctx.reward_config(None).is_err());
    }

    #[test]
    fn explicit_ids_win() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let id: ObjectId = "0xff".parse().unwrap();
        assert_eq!(ctx.machine(Some(id)).unwrap(), id);
    }

    #[test]
    fn pending_completion_uses_the_unconfirmed_exit_code() {
        assert_eq!(Completion::from_pending(true).exit_code(), EXIT_UNCONFIRMED);
        assert_eq!(Completion::from_pending(false).exit_code(), 0);
    }
}

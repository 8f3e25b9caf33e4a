use crate::guards::GuardViolation;
use crate::keys::KeyDecodeError;
use crate::resolver::ResolveError;
use crate::transaction::BuildError;
use crate::types::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle orchestration errors.
#[derive(Debug, Error)]
pub enum StashError {
    #[error("Key decode error: {0}")]
    KeyDecode(#[from] KeyDecodeError),

    #[error("Transaction build rejected: {0}")]
    Build(#[from] BuildError),

    #[error("Guard rejected {operation}: {violation}")]
    Guard {
        operation: &'static str,
        violation: GuardViolation,
    },

    #[error("Object resolution failed after '{operation}': {source}")]
    ObjectResolutionFailed {
        operation: &'static str,
        digest: String,
        #[source]
        source: ResolveError,
    },

    #[error("Remote call '{function}' rejected: {reason}")]
    RemoteCallRejected {
        function: String,
        reason: String,
        abort: Option<AbortInfo>,
    },

    #[error("Badge already collected: ticket {ticket} was already stamped at booth {booth}")]
    AlreadyCollected { booth: ObjectId, ticket: ObjectId },

    #[error("Not authorized for '{function}': {reason}")]
    Unauthorized { function: String, reason: String },

    #[error("Consistency timeout: {what} not visible after {attempts} attempts")]
    ConsistencyTimeout { what: String, attempts: u32 },

    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    #[error("Unexpected object shape for {object}: {message}")]
    ObjectShape { object: ObjectId, message: String },

    #[error("Ledger transport error: {0}")]
    Transport(String),

    #[error("Ledger protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for lifecycle operations.
pub type StashResult<T> = Result<T, StashError>;

impl StashError {
    /// Errors a read may be retried on. Writes are never retried.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Errors raised locally before anything reached the ledger.
    pub fn is_pre_submission(&self) -> bool {
        matches!(
            self,
            Self::KeyDecode(_) | Self::Build(_) | Self::Guard { .. } | Self::Config(_)
        )
    }

    pub fn guard(operation: &'static str, violation: GuardViolation) -> Self {
        Self::Guard {
            operation,
            violation,
        }
    }
}

impl From<serde_json::Error> for StashError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Structured view of a Move abort embedded in a rejection reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortInfo {
    pub code: u64,
    pub module: Option<String>,
    pub function: Option<String>,
}

impl AbortInfo {
    /// Extract abort details from a ledger failure string.
    ///
    /// Recognizes the execution-status form
    /// `MoveAbort(MoveLocation { module: ModuleId { .., name: Identifier("m") }, .., function_name: Some("f") }, 5) in command 0`
    /// and the wallet form `... Error Code 5 ...`.
    pub fn parse(reason: &str) -> Option<Self> {
        if let Some(start) = reason.find("MoveAbort(") {
            let body = &reason[start..];
            let close = body.find(") in command").or_else(|| body.rfind(')'))?;
            let head = &body[..close];
            let code_text = head.rsplit(',').next()?.trim();
            let code = code_text.parse().ok()?;
            return Some(Self {
                code,
                module: quoted_after(head, "name: Identifier("),
                function: quoted_after(head, "function_name: Some("),
            });
        }

        let marker = "Error Code ";
        let start = reason.find(marker)? + marker.len();
        let digits: String = reason[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        Some(Self {
            code: digits.parse().ok()?,
            module: None,
            function: None,
        })
    }
}

fn quoted_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = text[start..].strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Contract abort codes the client gives a distinct meaning to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractErrorCodes {
    /// Raised by `stamp_ticket` when the ticket already holds the booth's badge.
    #[serde(default = "default_already_stamped")]
    pub already_stamped: u64,

    /// Codes the contract raises for capability mismatches.
    #[serde(default)]
    pub unauthorized: Vec<u64>,
}

fn default_already_stamped() -> u64 {
    5
}

impl Default for ContractErrorCodes {
    fn default() -> Self {
        Self {
            already_stamped: default_already_stamped(),
            unauthorized: Vec::new(),
        }
    }
}

/// Ownership and signature failures the ledger reports when a capability is not held.
const UNAUTHORIZED_MARKERS: &[&str] = &[
    "not owned by",
    "IncorrectUserSignature",
    "InvalidObjectOwner",
    "does not own",
];

impl ContractErrorCodes {
    /// Map a rejected call onto the error taxonomy.
    pub fn classify(&self, function: &str, reason: &str) -> StashError {
        let abort = AbortInfo::parse(reason);
        if let Some(info) = &abort {
            if self.unauthorized.contains(&info.code) {
                return StashError::Unauthorized {
                    function: function.to_string(),
                    reason: reason.to_string(),
                };
            }
        } else if UNAUTHORIZED_MARKERS.iter().any(|m| reason.contains(m)) {
            return StashError::Unauthorized {
                function: function.to_string(),
                reason: reason.to_string(),
            };
        }
        StashError::RemoteCallRejected {
            function: function.to_string(),
            reason: reason.to_string(),
            abort,
        }
    }

    pub fn is_already_stamped(&self, abort: Option<&AbortInfo>) -> bool {
        abort.is_some_and(|info| info.code == self.already_stamped)
    }
}

use crate::{
    action::ActionKind,
    phase::MintPhase,
};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    NetworkMismatch,
    UserRejected,
    Unauthorized,
    NotConnected,
    WrongPhase,
    ActionInFlight,
    ContractReverted,
    ProviderUnavailable,
    Timeout,
    Unknown,
}

/// Every failure the mint client can surface. None of them is fatal: the
/// caller can always retry the same or a different operation afterwards.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MintError {
    #[error("wallet is on chain {actual}; switch to Sepolia ({expected})")]
    NetworkMismatch { expected: u64, actual: u64 },
    #[error("request was rejected in the wallet")]
    UserRejected,
    #[error("only the contract owner can {0}")]
    Unauthorized(ActionKind),
    #[error("connect a wallet before trying to {0}")]
    NotConnected(ActionKind),
    #[error("{action} needs phase {required}, current phase is {}", phase_label(.current))]
    WrongPhase {
        action: ActionKind,
        required: MintPhase,
        current: Option<MintPhase>,
    },
    #[error("{0} is already waiting for confirmation")]
    ActionInFlight(ActionKind),
    #[error("transaction reverted: {0}")]
    ContractReverted(String),
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("no confirmation after {0:?}; the transaction may still land")]
    Timeout(Duration),
    #[error("{0}")]
    Unknown(String),
}

impl MintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MintError::NetworkMismatch { .. } => ErrorKind::NetworkMismatch,
            MintError::UserRejected => ErrorKind::UserRejected,
            MintError::Unauthorized(_) => ErrorKind::Unauthorized,
            MintError::NotConnected(_) => ErrorKind::NotConnected,
            MintError::WrongPhase { .. } => ErrorKind::WrongPhase,
            MintError::ActionInFlight(_) => ErrorKind::ActionInFlight,
            MintError::ContractReverted(_) => ErrorKind::ContractReverted,
            MintError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            MintError::Timeout(_) => ErrorKind::Timeout,
            MintError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

fn phase_label(phase: &Option<MintPhase>) -> String {
    match phase {
        Some(phase) => phase.to_string(),
        None => String::from("unknown"),
    }
}

use crate::{
    COLLECTION_SIZE,
    MintError,
    action::ActionKind,
    phase::MintPhase,
};
use alloy::primitives::{
    Address,
    TxHash,
};
use tokio::sync::watch;

const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected {
        account: Address,
        chain_id: u64,
    },
    Failed(MintError),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ActionStatus {
    #[default]
    Idle,
    Loading(ActionKind),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
    Confirmed { kind: ActionKind, tx_hash: TxHash },
    Failed { kind: ActionKind, error: MintError },
}

/// What the presentation layer should offer the user right now.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Affordance {
    Connect,
    Loading(ActionKind),
    /// Connected, but the first phase poll has not come back yet.
    AwaitingPhase,
    StartPresale,
    PresaleNotStarted,
    PresaleMint,
    PublicMint,
}

/// Everything the UI shows. Only the connection, phase and action components
/// write to it, through [`StateStore`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MintState {
    pub connection: ConnectionStatus,
    pub is_owner: bool,
    pub phase: Option<MintPhase>,
    pub presale_ends_at: Option<u64>,
    pub minted: Option<u64>,
    pub action: ActionStatus,
    pub last_outcome: Option<ActionOutcome>,
    pub status: String,
    pub errors: Vec<String>,
}

impl MintState {
    pub fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionStatus::Connected { .. })
    }

    pub fn account(&self) -> Option<Address> {
        match self.connection {
            ConnectionStatus::Connected { account, .. } => Some(account),
            _ => None,
        }
    }

    pub fn minted_display(&self) -> String {
        format!("{}/{}", self.minted.unwrap_or(0), COLLECTION_SIZE)
    }

    pub fn affordance(&self) -> Affordance {
        if !self.is_connected() {
            return Affordance::Connect;
        }
        if let ActionStatus::Loading(kind) = self.action {
            return Affordance::Loading(kind);
        }
        match self.phase {
            None => Affordance::AwaitingPhase,
            Some(MintPhase::NotStarted) if self.is_owner => Affordance::StartPresale,
            Some(MintPhase::NotStarted) => Affordance::PresaleNotStarted,
            Some(MintPhase::PresaleActive) => Affordance::PresaleMint,
            Some(MintPhase::PresaleEnded) => Affordance::PublicMint,
        }
    }

    pub fn recent_errors(&self, n: usize) -> impl Iterator<Item = &String> {
        self.errors.iter().rev().take(n)
    }
}

/// Owner of the published [`MintState`]. Observers subscribe and are woken on
/// every change.
#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<MintState>,
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MintState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<MintState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> MintState {
        self.tx.borrow().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut MintState)) {
        self.tx.send_modify(f);
    }

    pub fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.status = message);
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| {
            state.errors.push(message);
            if state.errors.len() > MAX_ERRORS {
                let drain = state.errors.len() - MAX_ERRORS;
                state.errors.drain(0..drain);
            }
        });
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

use crate::{
    DEFAULT_GAS_LIMIT,
    MINT_PRICE,
    MintError,
    Result,
    chain::{
        Confirmation,
        ContractCall,
        ContractWriter,
        TxOverrides,
    },
    phase::MintPhase,
    state::{
        ActionOutcome,
        MintState,
    },
};
use alloy::primitives::U256;
use std::{
    fmt,
    time::Duration,
};
use tokio::time;
use tracing::{
    debug,
    error,
    info,
};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ActionKind {
    StartPresale,
    PresaleMint,
    PublicMint,
}

impl ActionKind {
    pub fn contract_call(self) -> ContractCall {
        match self {
            ActionKind::StartPresale => ContractCall::StartPresale,
            ActionKind::PresaleMint => ContractCall::PresaleMint,
            ActionKind::PublicMint => ContractCall::Mint,
        }
    }

    pub fn required_phase(self) -> MintPhase {
        match self {
            ActionKind::StartPresale => MintPhase::NotStarted,
            ActionKind::PresaleMint => MintPhase::PresaleActive,
            ActionKind::PublicMint => MintPhase::PresaleEnded,
        }
    }

    pub fn requires_owner(self) -> bool {
        self == ActionKind::StartPresale
    }

    pub fn payment(self) -> U256 {
        match self {
            ActionKind::StartPresale => U256::ZERO,
            ActionKind::PresaleMint | ActionKind::PublicMint => MINT_PRICE,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::StartPresale => "start presale",
            ActionKind::PresaleMint => "presale mint",
            ActionKind::PublicMint => "public mint",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PendingStatus {
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub status: PendingStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutorConfig {
    pub gas_limit: u64,
    pub confirmation_timeout: Duration,
    /// Role and phase checks before submitting. The contract enforces both
    /// anyway; turning these off only skips the fast local rejection.
    pub client_guards: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            client_guards: true,
        }
    }
}

/// Everything needed to send one write, detached from the executor so the
/// confirmation wait can run while polling continues.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxRequest {
    pub kind: ActionKind,
    pub call: ContractCall,
    pub overrides: TxOverrides,
    pub timeout: Duration,
}

#[derive(Debug, Default)]
pub struct ActionExecutor {
    config: ExecutorConfig,
    pending: Option<PendingAction>,
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending
            .is_some_and(|pending| pending.status == PendingStatus::Submitted)
    }

    /// Validates preconditions against the published state without touching
    /// anything.
    pub fn check(&self, kind: ActionKind, state: &MintState) -> Result<()> {
        if let Some(pending) = self.pending
            && pending.status == PendingStatus::Submitted
        {
            return Err(MintError::ActionInFlight(pending.kind));
        }
        // not a contract rule, so it holds with guards off too
        if !state.is_connected() {
            return Err(MintError::NotConnected(kind));
        }
        if !self.config.client_guards {
            return Ok(());
        }
        if kind.requires_owner() && !state.is_owner {
            return Err(MintError::Unauthorized(kind));
        }
        let required = kind.required_phase();
        if state.phase != Some(required) {
            return Err(MintError::WrongPhase {
                action: kind,
                required,
                current: state.phase,
            });
        }
        Ok(())
    }

    /// Check-and-set in one synchronous step: either the action becomes the
    /// single pending one or it is rejected before anything is sent.
    pub fn begin(&mut self, kind: ActionKind, state: &MintState) -> Result<TxRequest> {
        self.check(kind, state)?;
        self.pending = Some(PendingAction {
            kind,
            status: PendingStatus::Submitted,
        });
        Ok(TxRequest {
            kind,
            call: kind.contract_call(),
            overrides: TxOverrides {
                value: kind.payment(),
                gas_limit: self.config.gas_limit,
            },
            timeout: self.config.confirmation_timeout,
        })
    }

    /// Moves the pending action to its terminal status and releases the slot.
    pub fn finish(
        &mut self,
        kind: ActionKind,
        result: &Result<Confirmation>,
    ) -> ActionOutcome {
        let status = match result {
            Ok(_) => PendingStatus::Confirmed,
            Err(_) => PendingStatus::Failed,
        };
        if let Some(pending) = self.pending.take() {
            debug!(action = %pending.kind, ?status, "pending action closed");
        }
        match result {
            Ok(confirmation) => {
                info!(
                    action = %kind,
                    tx_hash = %confirmation.tx_hash,
                    block = ?confirmation.block_number,
                    "transaction confirmed"
                );
                ActionOutcome::Confirmed {
                    kind,
                    tx_hash: confirmation.tx_hash,
                }
            }
            Err(err) => {
                error!(action = %kind, error = %err, error_kind = ?err.kind(), "action failed");
                ActionOutcome::Failed {
                    kind,
                    error: err.clone(),
                }
            }
        }
    }
}

/// Sends the write and waits for it to be mined. A timeout does not cancel or
/// resend anything; the transaction may still land and show up on a later poll.
pub async fn execute<S: ContractWriter>(signer: S, request: TxRequest) -> Result<Confirmation> {
    let tx_hash = signer.send(request.call, request.overrides).await?;
    info!(
        action = %request.kind,
        function = request.call.function_name(),
        %tx_hash,
        "transaction submitted"
    );
    let confirmation = time::timeout(request.timeout, signer.confirmation(tx_hash))
        .await
        .map_err(|_| MintError::Timeout(request.timeout))??;
    if !confirmation.success {
        return Err(MintError::ContractReverted(format!(
            "{} reverted in transaction {tx_hash}",
            request.call.function_name()
        )));
    }
    Ok(confirmation)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::state::ConnectionStatus;
    use alloy::primitives::{
        Address,
        TxHash,
    };

    fn state(phase: MintPhase, is_owner: bool) -> MintState {
        MintState {
            connection: ConnectionStatus::Connected {
                account: Address::repeat_byte(1),
                chain_id: crate::SEPOLIA_CHAIN_ID,
            },
            is_owner,
            phase: Some(phase),
            ..MintState::default()
        }
    }

    #[test]
    fn begin__while_submitted__rejects_second_action() {
        // given
        let mut executor = ActionExecutor::default();
        let state = state(MintPhase::PresaleActive, false);
        executor.begin(ActionKind::PresaleMint, &state).unwrap();

        // when
        let second = executor.begin(ActionKind::PresaleMint, &state);

        // then
        assert_eq!(
            second,
            Err(MintError::ActionInFlight(ActionKind::PresaleMint))
        );
        assert!(executor.is_busy());
    }

    #[test]
    fn begin__non_owner_start_presale__is_unauthorized() {
        let mut executor = ActionExecutor::default();
        let result =
            executor.begin(ActionKind::StartPresale, &state(MintPhase::NotStarted, false));
        assert_eq!(result, Err(MintError::Unauthorized(ActionKind::StartPresale)));
        assert!(executor.pending().is_none());
    }

    #[test]
    fn begin__public_mint_during_presale__is_wrong_phase() {
        let mut executor = ActionExecutor::default();
        let result =
            executor.begin(ActionKind::PublicMint, &state(MintPhase::PresaleActive, true));
        assert_eq!(
            result,
            Err(MintError::WrongPhase {
                action: ActionKind::PublicMint,
                required: MintPhase::PresaleEnded,
                current: Some(MintPhase::PresaleActive),
            })
        );
    }

    #[test]
    fn begin__guards_disabled__lets_non_owner_through() {
        let mut executor = ActionExecutor::new(ExecutorConfig {
            client_guards: false,
            ..ExecutorConfig::default()
        });
        let result =
            executor.begin(ActionKind::StartPresale, &state(MintPhase::PresaleEnded, false));
        assert!(result.is_ok());
    }

    #[test]
    fn begin__disconnected__rejected_even_without_client_guards() {
        // given
        let mut executor = ActionExecutor::new(ExecutorConfig {
            client_guards: false,
            ..ExecutorConfig::default()
        });
        let state = MintState {
            phase: Some(MintPhase::PresaleEnded),
            ..MintState::default()
        };

        // when
        let result = executor.begin(ActionKind::PublicMint, &state);

        // then
        assert_eq!(result, Err(MintError::NotConnected(ActionKind::PublicMint)));
        assert!(executor.pending().is_none());
    }

    #[test]
    fn begin__mint__carries_price_and_fixed_gas_limit() {
        // given
        let mut executor = ActionExecutor::default();

        // when
        let request = executor
            .begin(ActionKind::PublicMint, &state(MintPhase::PresaleEnded, false))
            .unwrap();

        // then
        assert_eq!(request.call, ContractCall::Mint);
        assert_eq!(request.overrides.value, U256::from(10_000_000_000_000_000u64));
        assert_eq!(request.overrides.gas_limit, 1_000_000);
    }

    #[test]
    fn finish__failure__releases_slot_and_reports_kind() {
        // given
        let mut executor = ActionExecutor::default();
        let state = state(MintPhase::PresaleActive, false);
        executor.begin(ActionKind::PresaleMint, &state).unwrap();

        // when
        let outcome = executor.finish(ActionKind::PresaleMint, &Err(MintError::UserRejected));

        // then
        assert_eq!(
            outcome,
            ActionOutcome::Failed {
                kind: ActionKind::PresaleMint,
                error: MintError::UserRejected,
            }
        );
        assert!(!executor.is_busy());
        assert!(executor.begin(ActionKind::PresaleMint, &state).is_ok());
    }

    #[test]
    fn finish__success__reports_tx_hash() {
        let mut executor = ActionExecutor::default();
        executor
            .begin(ActionKind::StartPresale, &state(MintPhase::NotStarted, true))
            .unwrap();
        let confirmation = Confirmation {
            tx_hash: TxHash::repeat_byte(9),
            block_number: Some(12),
            success: true,
        };

        let outcome = executor.finish(ActionKind::StartPresale, &Ok(confirmation));

        assert_eq!(
            outcome,
            ActionOutcome::Confirmed {
                kind: ActionKind::StartPresale,
                tx_hash: TxHash::repeat_byte(9),
            }
        );
        assert!(executor.pending().is_none());
    }
}

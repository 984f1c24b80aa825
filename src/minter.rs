use crate::{
    Result,
    action::{
        self,
        ActionExecutor,
        ActionKind,
        ExecutorConfig,
        TxRequest,
    },
    chain::{
        Clock,
        Confirmation,
        SystemClock,
        WalletProvider,
    },
    connection::{
        ConnectionManager,
        SessionInfo,
        WalletEvent,
    },
    phase::PhaseResolver,
    poller::Poller,
    state::{
        ActionOutcome,
        ActionStatus,
        ConnectionStatus,
        MintState,
        StateStore,
    },
};
use tokio::sync::watch;
use tracing::warn;

/// Ties the connection manager, the phase poller and the action executor
/// together around one published [`MintState`].
pub struct Minter<P: WalletProvider, C = SystemClock> {
    connection: ConnectionManager<P>,
    poller: Poller<C>,
    executor: ActionExecutor,
    store: StateStore,
    ownership_resolved: bool,
}

impl<P: WalletProvider> Minter<P, SystemClock> {
    pub fn new(provider: P, config: ExecutorConfig) -> Self {
        Self::with_clock(provider, config, SystemClock)
    }
}

impl<P: WalletProvider, C: Clock> Minter<P, C> {
    pub fn with_clock(provider: P, config: ExecutorConfig, clock: C) -> Self {
        Self::from_parts(
            ConnectionManager::new(provider),
            Poller::new(PhaseResolver::with_clock(clock)),
            ActionExecutor::new(config),
        )
    }

    pub fn from_parts(
        connection: ConnectionManager<P>,
        poller: Poller<C>,
        executor: ActionExecutor,
    ) -> Self {
        Self {
            connection,
            poller,
            executor,
            store: StateStore::new(),
            ownership_resolved: false,
        }
    }

    pub fn state(&self) -> MintState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<MintState> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager<P> {
        &self.connection
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Connects (or reuses the session) and, on a new session, resolves
    /// ownership once. The published connection always ends up matching the
    /// live session.
    pub async fn connect(&mut self) -> Result<SessionInfo> {
        let is_new = self.connection.session().is_none();
        let info = match self.connection.connect().await {
            Ok(info) => info,
            Err(err) => {
                self.store.update(|state| {
                    state.connection = ConnectionStatus::Failed(err.clone());
                    state.is_owner = false;
                });
                self.store.push_error(format!("Connect failed: {err}"));
                return Err(err);
            }
        };
        let published = ConnectionStatus::Connected {
            account: info.account,
            chain_id: info.chain_id,
        };
        if is_new || self.store.snapshot().connection != published {
            self.ownership_resolved = false;
            self.store.update(|state| {
                state.connection = published;
                state.is_owner = false;
            });
            self.store.set_status("Wallet connected");
        }
        if !self.ownership_resolved {
            let reader = self.connection.read_handle().await?;
            self.ownership_resolved = self
                .poller
                .refresh_ownership(&reader, info.account, &self.store)
                .await;
        }
        Ok(info)
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.reset_session_state();
    }

    pub fn handle_wallet_event(&mut self, event: WalletEvent) {
        if self.connection.handle_wallet_event(event) {
            self.reset_session_state();
        }
    }

    /// Re-checks the wallet's chain for an open session and drops the session
    /// when it moved. Returns whether it was dropped.
    pub async fn watch_chain(&mut self) -> bool {
        match self.connection.poll_chain().await {
            Ok(Some(event)) => {
                if let WalletEvent::ChainChanged(chain_id) = &event {
                    self.store
                        .push_error(format!("Wallet moved to chain {chain_id}; connect again"));
                }
                self.handle_wallet_event(event);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "chain check failed");
                false
            }
        }
    }

    pub async fn read_handle(&mut self) -> Result<P::Reader> {
        self.connect().await?;
        self.connection.read_handle().await
    }

    pub async fn poll_phase(&mut self) -> bool {
        match self.read_handle().await {
            Ok(reader) => self.poller.poll_phase(&reader, &self.store).await,
            Err(err) => {
                warn!(error = %err, "no read handle for phase poll");
                false
            }
        }
    }

    pub async fn poll_minted(&mut self) -> bool {
        match self.read_handle().await {
            Ok(reader) => self.poller.poll_minted(&reader, &self.store).await,
            Err(err) => {
                warn!(error = %err, "no read handle for minted count poll");
                false
            }
        }
    }

    pub async fn refresh(&mut self) {
        self.poll_phase().await;
        self.poll_minted().await;
    }

    pub async fn start_presale(&mut self) -> Result<Confirmation> {
        self.run_action(ActionKind::StartPresale).await
    }

    pub async fn presale_mint(&mut self) -> Result<Confirmation> {
        self.run_action(ActionKind::PresaleMint).await
    }

    pub async fn public_mint(&mut self) -> Result<Confirmation> {
        self.run_action(ActionKind::PublicMint).await
    }

    /// First half of an action: claims the single pending slot against the
    /// published state. Rejections never reach the network.
    pub fn begin(&mut self, kind: ActionKind) -> Result<TxRequest> {
        let state = self.store.snapshot();
        match self.executor.begin(kind, &state) {
            Ok(request) => {
                self.store.update(|state| {
                    state.action = ActionStatus::Loading(kind);
                    state.status = format!("Submitting {kind}...");
                });
                Ok(request)
            }
            Err(err) => {
                warn!(action = %kind, error = %err, "action rejected before submission");
                self.store.push_error(format!("Cannot {kind}: {err}"));
                Err(err)
            }
        }
    }

    /// Signing handle for an action that has begun. On failure the action is
    /// closed right away.
    pub async fn signer_for(&mut self, kind: ActionKind) -> Result<P::Signer> {
        let signer = match self.connect().await {
            Ok(_) => self.connection.signing_handle().await,
            Err(err) => Err(err),
        };
        match signer {
            Ok(signer) => Ok(signer),
            Err(err) => {
                self.complete(kind, Err(err.clone())).await;
                Err(err)
            }
        }
    }

    /// Last half of an action: terminal status, published outcome, and a
    /// forced re-poll after a confirmed write.
    pub async fn complete(
        &mut self,
        kind: ActionKind,
        result: Result<Confirmation>,
    ) -> ActionOutcome {
        let outcome = self.executor.finish(kind, &result);
        let status = match &outcome {
            ActionOutcome::Confirmed { kind, .. } => success_message(*kind),
            ActionOutcome::Failed { kind, error } => format!("{kind} failed: {error}"),
        };
        self.store.update(|state| {
            state.action = ActionStatus::Idle;
            state.last_outcome = Some(outcome.clone());
            state.status = status.clone();
        });
        if let ActionOutcome::Failed { .. } = &outcome {
            self.store.push_error(status);
        }
        if result.is_ok() {
            self.refresh().await;
        }
        outcome
    }

    async fn run_action(&mut self, kind: ActionKind) -> Result<Confirmation> {
        let request = self.begin(kind)?;
        let signer = self.signer_for(kind).await?;
        let result = action::execute(signer, request).await;
        self.complete(kind, result.clone()).await;
        result
    }

    fn reset_session_state(&mut self) {
        self.ownership_resolved = false;
        self.store.update(|state| {
            state.connection = ConnectionStatus::Disconnected;
            state.is_owner = false;
        });
    }
}

fn success_message(kind: ActionKind) -> String {
    match kind {
        ActionKind::StartPresale => String::from("Presale started!"),
        ActionKind::PresaleMint | ActionKind::PublicMint => {
            String::from("You successfully minted a Crypto Dev!")
        }
    }
}

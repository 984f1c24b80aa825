use crate::ui;
use alloy::primitives::Address;
use color_eyre::eyre::Result;
use cryptodevs_mint::{
    action::{
        self,
        ActionKind,
        ExecutorConfig,
    },
    chain::{
        Clock,
        Confirmation,
        SystemClock,
    },
    deployment::DeploymentRecord,
    evm::EvmWallet,
    minter::Minter,
    poller::PollSchedule,
    wallets::WalletDescriptor,
};
use futures::{
    FutureExt,
    future::{
        LocalBoxFuture,
        OptionFuture,
    },
};
use std::time::Duration;
use tokio::time;
use tracing::{
    info,
    warn,
};
use url::Url;

pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub rpc_url: Url,
    pub contract: Address,
    pub wallet: Option<WalletDescriptor>,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    /// Registry entry for `contract`, if it was recorded.
    pub deployment: Option<DeploymentRecord>,
}

type InFlight = LocalBoxFuture<'static, (ActionKind, cryptodevs_mint::Result<Confirmation>)>;

pub struct AppController {
    minter: Minter<EvmWallet>,
    schedule: PollSchedule,
    in_flight: Option<InFlight>,
    deployment: Option<DeploymentRecord>,
}

impl AppController {
    pub fn new(config: AppConfig) -> Self {
        info!(
            rpc_url = %config.rpc_url,
            contract = %config.contract,
            wallet = ?config.wallet.as_ref().map(|w| w.name.as_str()),
            "configuring client"
        );
        let wallet = EvmWallet::new(config.rpc_url, config.contract, config.wallet);
        let executor = ExecutorConfig {
            confirmation_timeout: config.confirmation_timeout,
            ..ExecutorConfig::default()
        };
        Self {
            minter: Minter::new(wallet, executor),
            schedule: PollSchedule::every(config.poll_interval),
            in_flight: None,
            deployment: config.deployment,
        }
    }

    fn is_connected(&self) -> bool {
        self.minter.connection().session().is_some()
    }

    async fn connect(&mut self) {
        let was_connected = self.is_connected();
        if self.minter.connect().await.is_err() || was_connected {
            return;
        }
        self.check_deployed_code().await;
        self.minter.refresh().await;
    }

    /// Warns when the code at the contract address differs from the recorded
    /// deployment.
    async fn check_deployed_code(&mut self) {
        let Some(record) = self.deployment.as_ref().filter(|r| r.code_hash.is_some()) else {
            return;
        };
        let reader = match self.minter.read_handle().await {
            Ok(reader) => reader,
            Err(err) => {
                warn!(error = %err, "cannot read deployed code");
                return;
            }
        };
        match reader.deployed_code_hash().await {
            Ok(actual) if record.is_compatible_with_hash(&actual) => {
                info!("deployed code matches recorded deployment");
            }
            Ok(actual) => {
                warn!(
                    expected = ?record.code_hash,
                    %actual,
                    "deployed code differs from recorded deployment"
                );
                self.minter.store().push_error(format!(
                    "Contract code hash {actual} does not match the recorded deployment"
                ));
            }
            Err(err) => warn!(error = %err, "cannot hash deployed code"),
        }
    }

    /// Claims the pending slot and hands the send/confirm wait to the run
    /// loop. Unlocking the keystore happens outside the alternate screen.
    async fn start_action(&mut self, kind: ActionKind, ui_state: &mut ui::UiState) -> Result<()> {
        let Ok(request) = self.minter.begin(kind) else {
            return Ok(());
        };
        let prompts = !self.minter.connection().is_escalated();
        if prompts {
            ui::terminal_exit(ui_state)?;
        }
        let signer = self.minter.signer_for(kind).await;
        if prompts {
            ui::terminal_enter(ui_state)?;
        }
        if let Ok(signer) = signer {
            let send = async move { (kind, action::execute(signer, request).await) };
            self.in_flight = Some(send.boxed_local());
        }
        Ok(())
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let connect_on_start = config.wallet.is_some();
    let mut controller = AppController::new(config);
    let mut ui_state = ui::UiState::default();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    if connect_on_start {
        controller.connect().await;
    }
    let res = run_loop(&mut controller, &mut ui_state).await;
    ui::terminal_exit(&mut ui_state)?;
    res
}

async fn run_loop(controller: &mut AppController, ui_state: &mut ui::UiState) -> Result<()> {
    let clock = SystemClock;
    let (mut phase_ticker, mut minted_ticker) = controller.schedule.tickers();
    let mut redraw_ticker = time::interval(REDRAW_INTERVAL);
    let mut state_rx = controller.minter.subscribe();
    ui::draw(ui_state, &state_rx.borrow_and_update(), clock.now())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            _ = phase_ticker.tick() => {
                if controller.is_connected() && !controller.minter.watch_chain().await {
                    controller.minter.poll_phase().await;
                }
            }
            _ = minted_ticker.tick() => {
                if controller.is_connected() {
                    controller.minter.poll_minted().await;
                }
            }
            Some((kind, result)) = OptionFuture::from(controller.in_flight.as_mut()) => {
                controller.in_flight = None;
                controller.minter.complete(kind, result).await;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                ui::draw(ui_state, &state_rx.borrow_and_update(), clock.now())?;
            }
            _ = redraw_ticker.tick() => {
                ui::draw(ui_state, &state_rx.borrow(), clock.now())?;
            }
            ev = ui::next_event(ui_state) => {
                match ev? {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Connect => controller.connect().await,
                    ui::UserEvent::Disconnect => controller.minter.disconnect(),
                    ui::UserEvent::StartPresale => controller.start_action(ActionKind::StartPresale, ui_state).await?,
                    ui::UserEvent::PresaleMint => controller.start_action(ActionKind::PresaleMint, ui_state).await?,
                    ui::UserEvent::PublicMint => controller.start_action(ActionKind::PublicMint, ui_state).await?,
                    ui::UserEvent::Refresh => {
                        if controller.is_connected() {
                            controller.minter.refresh().await;
                        }
                    }
                    ui::UserEvent::Redraw => {}
                }
                ui::draw(ui_state, &state_rx.borrow(), clock.now())?;
            }
        }
    }
    if controller.in_flight.is_some() {
        warn!("quitting with a transaction still unconfirmed");
    }
    Ok(())
}

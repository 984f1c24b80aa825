use alloy::primitives::Address;
use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use cryptodevs_mint::{
    SEPOLIA_CHAIN_ID,
    deployment::DeploymentStore,
    wallets,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
    time::Duration,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};
use url::Url;

mod client;
mod ui;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "cryptodevs-mint",
    about = "Mint Crypto Devs NFTs on Sepolia from the terminal",
    version
)]
struct Args {
    /// JSON-RPC endpoint of a Sepolia node
    #[arg(long, env = "MINT_RPC_URL", default_value = client::DEFAULT_SEPOLIA_RPC_URL)]
    rpc_url: String,

    /// Sale contract address (defaults to the latest recorded deployment)
    #[arg(long, env = "MINT_CONTRACT")]
    contract: Option<String>,

    /// Keystore name to connect and sign with
    #[arg(long, env = "MINT_WALLET")]
    wallet: Option<String>,

    /// Keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long, env = "MINT_WALLET_DIR")]
    wallet_dir: Option<String>,

    /// Seconds between phase and minted-count polls
    #[arg(long, env = "MINT_POLL_INTERVAL", default_value_t = 5)]
    poll_interval_secs: u64,

    /// Seconds to wait for a transaction to be mined
    #[arg(long, env = "MINT_CONFIRMATION_TIMEOUT", default_value_t = 120)]
    confirmation_timeout_secs: u64,

    /// Directory for the rolling log file
    #[arg(long, env = "MINT_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,
}

impl Args {
    fn into_config(self) -> Result<client::AppConfig> {
        if self.poll_interval_secs == 0 {
            return Err(eyre!("--poll-interval-secs must be greater than zero"));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(eyre!("--confirmation-timeout-secs must be greater than zero"));
        }
        let rpc_url = Url::parse(&self.rpc_url)
            .wrap_err_with(|| format!("Invalid RPC URL {}", self.rpc_url))?;

        let store = DeploymentStore::for_chain(SEPOLIA_CHAIN_ID)
            .wrap_err("opening deployment store")?;
        let contract = match self.contract.as_deref() {
            Some(raw) => {
                let address = parse_address(raw)?;
                store.remember(address, SEPOLIA_CHAIN_ID, rpc_url.as_str())?;
                address
            }
            None => {
                store
                    .latest()?
                    .ok_or_else(|| {
                        eyre!(
                            "No contract address; pass --contract or add a record to {}",
                            store.path().display()
                        )
                    })?
                    .contract_address
            }
        };
        let deployment = store.find(contract)?;

        let wallet = match self.wallet.as_deref() {
            Some(name) => {
                let dir = wallets::resolve_wallet_dir(self.wallet_dir.as_deref())?;
                Some(wallets::find_wallet(&dir, name).wrap_err("locating requested wallet")?)
            }
            None => None,
        };

        Ok(client::AppConfig {
            rpc_url,
            contract,
            wallet,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            deployment,
        })
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| eyre!("Invalid contract address {raw}: {e}"))
}

fn init_tracing(log_dir: &Path) {
    let appender = rolling::daily(log_dir, "cryptodevs-mint.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let initialized = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .is_ok();
    if initialized {
        let _ = LOG_GUARD.set(guard);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(&args.log_dir);
    tracing::info!("starting cryptodevs-mint");
    let config = args.into_config()?;
    client::run_app(config).await
}

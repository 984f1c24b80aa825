use crate::{
    MintError,
    Result,
    SEPOLIA_CHAIN_ID,
    chain::WalletProvider,
};
use alloy::primitives::Address;
use tracing::{
    info,
    warn,
};

/// A connected account. Only ever stored when its chain matched the required
/// network at connect time.
#[derive(Clone, Debug)]
pub struct WalletSession<R, S> {
    account: Address,
    chain_id: u64,
    reader: R,
    signer: Option<S>,
}

impl<R, S> WalletSession<R, S> {
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn is_escalated(&self) -> bool {
        self.signer.is_some()
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            account: self.account,
            chain_id: self.chain_id,
            can_sign: self.signer.is_some(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionInfo {
    pub account: Address,
    pub chain_id: u64,
    pub can_sign: bool,
}

/// Changes pushed by the wallet outside of any request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

pub struct ConnectionManager<P: WalletProvider> {
    provider: P,
    required_chain_id: u64,
    session: Option<WalletSession<P::Reader, P::Signer>>,
}

impl<P: WalletProvider> ConnectionManager<P> {
    pub fn new(provider: P) -> Self {
        Self::with_required_chain(provider, SEPOLIA_CHAIN_ID)
    }

    pub fn with_required_chain(provider: P, required_chain_id: u64) -> Self {
        Self {
            provider,
            required_chain_id,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&WalletSession<P::Reader, P::Signer>> {
        self.session.as_ref()
    }

    pub fn is_escalated(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(WalletSession::is_escalated)
    }

    /// Returns the cached session when there is one, otherwise asks the
    /// wallet. A wallet on the wrong chain leaves no session behind.
    pub async fn connect(&mut self) -> Result<SessionInfo> {
        if let Some(session) = &self.session {
            return Ok(session.info());
        }
        let connected = self.provider.connect().await?;
        if connected.chain_id != self.required_chain_id {
            warn!(
                chain_id = connected.chain_id,
                required = self.required_chain_id,
                "wallet is on the wrong network"
            );
            return Err(MintError::NetworkMismatch {
                expected: self.required_chain_id,
                actual: connected.chain_id,
            });
        }
        info!(account = %connected.account, chain_id = connected.chain_id, "wallet connected");
        let session = WalletSession {
            account: connected.account,
            chain_id: connected.chain_id,
            reader: connected.reader,
            signer: None,
        };
        let info = session.info();
        self.session = Some(session);
        Ok(info)
    }

    pub async fn read_handle(&mut self) -> Result<P::Reader> {
        self.connect().await?;
        let session = self.checked_session()?;
        Ok(session.reader.clone())
    }

    /// Escalates the session to signing on first use; later calls reuse the
    /// cached signer without prompting again.
    pub async fn signing_handle(&mut self) -> Result<P::Signer> {
        self.connect().await?;
        self.checked_session()?;
        let Some(session) = self.session.as_mut() else {
            return Err(MintError::ProviderUnavailable(String::from(
                "no wallet session",
            )));
        };
        if let Some(signer) = &session.signer {
            return Ok(signer.clone());
        }
        let signer = self.provider.escalate(session.account).await?;
        info!(account = %session.account, "wallet unlocked for signing");
        session.signer = Some(signer.clone());
        Ok(signer)
    }

    /// Asks the wallet for its current chain and reports a change against the
    /// session as a [`WalletEvent::ChainChanged`]. Without a session nothing is
    /// asked.
    pub async fn poll_chain(&mut self) -> Result<Option<WalletEvent>> {
        let Some(session_chain) = self.session.as_ref().map(WalletSession::chain_id) else {
            return Ok(None);
        };
        let chain_id = self.provider.chain_id().await?;
        Ok((chain_id != session_chain).then_some(WalletEvent::ChainChanged(chain_id)))
    }

    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            info!(account = %session.account, "wallet disconnected");
        }
    }

    /// Any account or chain change drops the session, so the next access runs
    /// a fresh `connect()` and re-checks the network. Returns whether a
    /// session was dropped.
    pub fn handle_wallet_event(&mut self, event: WalletEvent) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let stale = match &event {
            WalletEvent::AccountsChanged(accounts) => {
                accounts.first() != Some(&session.account)
            }
            WalletEvent::ChainChanged(chain_id) => *chain_id != session.chain_id,
            WalletEvent::Disconnected => true,
        };
        if stale {
            info!(?event, "wallet changed; dropping session");
            self.session = None;
        }
        stale
    }

    fn checked_session(&self) -> Result<&WalletSession<P::Reader, P::Signer>> {
        let session = self.session.as_ref().ok_or_else(|| {
            MintError::ProviderUnavailable(String::from("no wallet session"))
        })?;
        if session.chain_id != self.required_chain_id {
            return Err(MintError::NetworkMismatch {
                expected: self.required_chain_id,
                actual: session.chain_id,
            });
        }
        Ok(session)
    }
}

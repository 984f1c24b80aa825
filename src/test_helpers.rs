//! In-memory sale contract and wallet for exercising the client without a
//! node. The contract rules mirror the deployed CryptoDevs contract.

use crate::{
    COLLECTION_SIZE,
    MINT_PRICE,
    MintError,
    Result,
    SEPOLIA_CHAIN_ID,
    chain::{
        Clock,
        Confirmation,
        Connected,
        ContractCall,
        ContractReader,
        ContractWriter,
        TxOverrides,
        WalletProvider,
    },
};
use alloy::primitives::{
    Address,
    TxHash,
};
use std::{
    cell::RefCell,
    collections::{
        HashMap,
        HashSet,
    },
    rc::Rc,
};

/// Presale window opened by `startPresale`, in seconds.
pub const PRESALE_DURATION: u64 = 5 * 60;

const GENESIS_TIME: u64 = 1_700_000_000;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    pub connects: usize,
    pub escalations: usize,
    pub reads: usize,
    pub writes: usize,
}

#[derive(Debug)]
struct ChainState {
    chain_id: u64,
    owner: Address,
    presale_started: bool,
    presale_ended: u64,
    token_ids: u64,
    allowlist: HashSet<Address>,
    now: u64,
    stats: Stats,
    fail_reads: bool,
    reject_sends: bool,
    hold_confirmations: bool,
    receipts: HashMap<TxHash, Confirmation>,
    nonce: u64,
}

#[derive(Clone, Debug)]
pub struct FakeChain {
    state: Rc<RefCell<ChainState>>,
}

impl FakeChain {
    pub fn sepolia() -> Self {
        Self::with_chain_id(SEPOLIA_CHAIN_ID)
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        let state = ChainState {
            chain_id,
            owner: Address::repeat_byte(0x0a),
            presale_started: false,
            presale_ended: 0,
            token_ids: 0,
            allowlist: HashSet::new(),
            now: GENESIS_TIME,
            stats: Stats::default(),
            fail_reads: false,
            reject_sends: false,
            hold_confirmations: false,
            receipts: HashMap::new(),
            nonce: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn owner(&self) -> Address {
        self.state.borrow().owner
    }

    /// The wallet moves to another network, as a user would from the wallet.
    pub fn set_chain_id(&self, chain_id: u64) {
        self.state.borrow_mut().chain_id = chain_id;
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    pub fn set_now(&self, now: u64) {
        self.state.borrow_mut().now = now;
    }

    pub fn advance(&self, secs: u64) {
        self.state.borrow_mut().now += secs;
    }

    pub fn clock(&self) -> FakeClock {
        FakeClock {
            state: Rc::clone(&self.state),
        }
    }

    pub fn reader(&self) -> FakeReader {
        FakeReader {
            state: Rc::clone(&self.state),
        }
    }

    pub fn signer(&self, from: Address) -> FakeSigner {
        FakeSigner {
            state: Rc::clone(&self.state),
            from,
        }
    }

    /// Puts the contract straight into the presale, as if the owner had
    /// started it with the window closing at `ends_at`.
    pub fn start_presale_at(&self, ends_at: u64) {
        let mut state = self.state.borrow_mut();
        state.presale_started = true;
        state.presale_ended = ends_at;
    }

    pub fn presale_started(&self) -> bool {
        self.state.borrow().presale_started
    }

    pub fn presale_ended(&self) -> u64 {
        self.state.borrow().presale_ended
    }

    pub fn token_ids(&self) -> u64 {
        self.state.borrow().token_ids
    }

    pub fn set_token_ids(&self, token_ids: u64) {
        self.state.borrow_mut().token_ids = token_ids;
    }

    pub fn allow(&self, account: Address) {
        self.state.borrow_mut().allowlist.insert(account);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    pub fn reject_sends(&self, reject: bool) {
        self.state.borrow_mut().reject_sends = reject;
    }

    /// Mined transactions stay pending forever while set.
    pub fn hold_confirmations(&self, hold: bool) {
        self.state.borrow_mut().hold_confirmations = hold;
    }

    pub fn stats(&self) -> Stats {
        self.state.borrow().stats
    }
}

impl ChainState {
    fn read(&mut self) -> Result<()> {
        self.stats.reads += 1;
        if self.fail_reads {
            return Err(MintError::ProviderUnavailable(String::from(
                "fake node is down",
            )));
        }
        Ok(())
    }

    fn next_hash(&mut self) -> TxHash {
        self.nonce += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&self.nonce.to_be_bytes());
        TxHash::from(bytes)
    }

    /// Applies the call with the contract's rules; `Err` carries the revert
    /// reason and leaves the state untouched.
    fn apply(
        &mut self,
        from: Address,
        call: ContractCall,
        overrides: TxOverrides,
    ) -> std::result::Result<(), &'static str> {
        match call {
            ContractCall::StartPresale => {
                if from != self.owner {
                    return Err("Ownable: caller is not the owner");
                }
                self.presale_started = true;
                self.presale_ended = self.now + PRESALE_DURATION;
            }
            ContractCall::PresaleMint => {
                if !self.presale_started || self.now >= self.presale_ended {
                    return Err("Presale is not running");
                }
                if !self.allowlist.contains(&from) {
                    return Err("You are not whitelisted");
                }
                self.mint_one(overrides)?;
            }
            ContractCall::Mint => {
                if !self.presale_started || self.now < self.presale_ended {
                    return Err("Presale has not ended yet");
                }
                self.mint_one(overrides)?;
            }
        }
        Ok(())
    }

    fn mint_one(&mut self, overrides: TxOverrides) -> std::result::Result<(), &'static str> {
        if self.token_ids >= COLLECTION_SIZE {
            return Err("Exceeded maximum Crypto Devs supply");
        }
        if overrides.value < MINT_PRICE {
            return Err("Ether sent is not correct");
        }
        self.token_ids += 1;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FakeClock {
    state: Rc<RefCell<ChainState>>,
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.state.borrow().now
    }
}

#[derive(Clone, Debug)]
pub struct FakeReader {
    state: Rc<RefCell<ChainState>>,
}

impl ContractReader for FakeReader {
    async fn owner(&self) -> Result<Address> {
        let mut state = self.state.borrow_mut();
        state.read()?;
        Ok(state.owner)
    }

    async fn presale_started(&self) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.read()?;
        Ok(state.presale_started)
    }

    async fn presale_ended(&self) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        state.read()?;
        Ok(state.presale_ended)
    }

    async fn token_ids(&self) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        state.read()?;
        Ok(state.token_ids)
    }
}

#[derive(Clone, Debug)]
pub struct FakeSigner {
    state: Rc<RefCell<ChainState>>,
    from: Address,
}

impl FakeSigner {
    pub fn sender(&self) -> Address {
        self.from
    }
}

impl ContractWriter for FakeSigner {
    async fn send(&self, call: ContractCall, overrides: TxOverrides) -> Result<TxHash> {
        let mut state = self.state.borrow_mut();
        if state.reject_sends {
            return Err(MintError::UserRejected);
        }
        state.stats.writes += 1;
        let success = state.apply(self.from, call, overrides).is_ok();
        let tx_hash = state.next_hash();
        let block_number = Some(state.nonce);
        state.receipts.insert(
            tx_hash,
            Confirmation {
                tx_hash,
                block_number,
                success,
            },
        );
        Ok(tx_hash)
    }

    async fn confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        let (held, receipt) = {
            let state = self.state.borrow();
            (state.hold_confirmations, state.receipts.get(&tx_hash).cloned())
        };
        if held {
            std::future::pending::<()>().await;
        }
        receipt.ok_or_else(|| MintError::Unknown(format!("no receipt for {tx_hash}")))
    }
}

/// A wallet holding one account on whatever chain the [`FakeChain`] reports.
#[derive(Clone, Debug)]
pub struct FakeWallet {
    chain: FakeChain,
    account: Address,
    reject_signature: bool,
}

impl FakeWallet {
    pub fn new(chain: &FakeChain, account: Address) -> Self {
        Self {
            chain: chain.clone(),
            account,
            reject_signature: false,
        }
    }

    /// The user declines every unlock prompt.
    pub fn rejecting_signature(mut self) -> Self {
        self.reject_signature = true;
        self
    }

    pub fn switch_account(&mut self, account: Address) {
        self.account = account;
    }
}

impl WalletProvider for FakeWallet {
    type Reader = FakeReader;
    type Signer = FakeSigner;

    async fn connect(&mut self) -> Result<Connected<FakeReader>> {
        let chain_id = {
            let mut state = self.chain.state.borrow_mut();
            state.stats.connects += 1;
            state.chain_id
        };
        Ok(Connected {
            account: self.account,
            chain_id,
            reader: self.chain.reader(),
        })
    }

    async fn chain_id(&mut self) -> Result<u64> {
        Ok(self.chain.state.borrow().chain_id)
    }

    async fn escalate(&mut self, account: Address) -> Result<FakeSigner> {
        self.chain.state.borrow_mut().stats.escalations += 1;
        if self.reject_signature {
            return Err(MintError::UserRejected);
        }
        Ok(self.chain.signer(account))
    }
}

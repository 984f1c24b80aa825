//! The boundary between the mint client and the outside world: the wallet
//! that connects and signs, and the sale contract that is read and written.

use crate::Result;
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use std::future::Future;

/// The three state-changing functions of the sale contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ContractCall {
    StartPresale,
    PresaleMint,
    Mint,
}

impl ContractCall {
    pub fn function_name(self) -> &'static str {
        match self {
            ContractCall::StartPresale => "startPresale",
            ContractCall::PresaleMint => "presaleMint",
            ContractCall::Mint => "mint",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxOverrides {
    pub value: U256,
    pub gas_limit: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// What a wallet reports when it connects.
#[derive(Clone, Debug)]
pub struct Connected<R> {
    pub account: Address,
    pub chain_id: u64,
    pub reader: R,
}

pub trait ContractReader {
    fn owner(&self) -> impl Future<Output = Result<Address>>;

    fn presale_started(&self) -> impl Future<Output = Result<bool>>;

    /// Unix timestamp (seconds) at which the presale window closes.
    fn presale_ended(&self) -> impl Future<Output = Result<u64>>;

    fn token_ids(&self) -> impl Future<Output = Result<u64>>;
}

pub trait ContractWriter {
    /// Broadcasts the call and returns as soon as the wallet hands back a hash.
    fn send(
        &self,
        call: ContractCall,
        overrides: TxOverrides,
    ) -> impl Future<Output = Result<TxHash>>;

    /// Resolves once the transaction is included, whether it succeeded or reverted.
    fn confirmation(&self, tx_hash: TxHash) -> impl Future<Output = Result<Confirmation>>;
}

pub trait WalletProvider {
    type Reader: ContractReader + Clone;
    type Signer: ContractWriter + Clone;

    fn connect(&mut self) -> impl Future<Output = Result<Connected<Self::Reader>>>;

    /// Chain the wallet is pointed at right now.
    fn chain_id(&mut self) -> impl Future<Output = Result<u64>>;

    /// Obtains signing capability for `account`. May prompt the user.
    fn escalate(&mut self, account: Address) -> impl Future<Output = Result<Self::Signer>>;
}

pub trait Clock {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

use alloy::primitives::U256;

pub mod action;
pub mod chain;
pub mod connection;
pub mod deployment;
pub mod error;
pub mod evm;
pub mod minter;
pub mod phase;
pub mod poller;
pub mod state;
pub mod test_helpers;
pub mod wallets;

pub use error::{
    ErrorKind,
    MintError,
};

pub type Result<T, E = MintError> = std::result::Result<T, E>;

pub mod crypto_devs_types {
    use alloy::sol;

    sol! {
        #[sol(rpc)]
        contract CryptoDevs {
            function owner() external view returns (address);
            function presaleStarted() external view returns (bool);
            function presaleEnded() external view returns (uint256);
            function tokenIds() external view returns (uint256);
            function startPresale() external;
            function presaleMint() external payable;
            function mint() external payable;
        }
    }
}

/// Sepolia, the only network the client will talk to.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Size of the collection as shown to the user. The contract enforces the real cap.
pub const COLLECTION_SIZE: u64 = 20;

pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// 0.01 ether in wei.
pub const MINT_PRICE: U256 = U256::from_limbs([10_000_000_000_000_000, 0, 0, 0]);

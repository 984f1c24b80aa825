//! JSON-RPC backed wallet and contract handles for a live node.

use crate::{
    MintError,
    Result,
    chain::{
        Confirmation,
        Connected,
        ContractCall,
        ContractReader,
        ContractWriter,
        TxOverrides,
        WalletProvider,
    },
    crypto_devs_types::CryptoDevs,
    deployment,
    wallets::{
        self,
        WalletDescriptor,
    },
};
use alloy::{
    network::{
        EthereumWallet,
        ReceiptResponse,
    },
    primitives::{
        Address,
        TxHash,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    transports::{
        RpcError,
        TransportErrorKind,
    },
};
use std::time::Duration;
use tokio::time;
use tracing::{
    debug,
    info,
};
use url::Url;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// EIP-1193 code for a request the user turned down.
const USER_REJECTED_CODE: i64 = 4001;
/// Geth's code for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// A local keystore wallet in front of an HTTP node. Reads need only the
/// address recorded in the keystore; signing unlocks it.
pub struct EvmWallet {
    rpc_url: Url,
    contract: Address,
    wallet: Option<WalletDescriptor>,
    receipt_poll: Duration,
}

impl EvmWallet {
    pub fn new(rpc_url: Url, contract: Address, wallet: Option<WalletDescriptor>) -> Self {
        Self {
            rpc_url,
            contract,
            wallet,
            receipt_poll: RECEIPT_POLL_INTERVAL,
        }
    }

    fn read_provider(&self) -> DynProvider {
        ProviderBuilder::new()
            .connect_http(self.rpc_url.clone())
            .erased()
    }

    fn descriptor(&self) -> Result<&WalletDescriptor> {
        self.wallet.as_ref().ok_or_else(|| {
            MintError::ProviderUnavailable(String::from(
                "no wallet selected; pass --wallet <name>",
            ))
        })
    }
}

impl WalletProvider for EvmWallet {
    type Reader = EvmReader;
    type Signer = EvmSigner;

    async fn connect(&mut self) -> Result<Connected<EvmReader>> {
        let descriptor = self.descriptor()?;
        let account = descriptor.address.ok_or_else(|| {
            MintError::ProviderUnavailable(format!(
                "keystore '{}' does not record its address",
                descriptor.name
            ))
        })?;
        let provider = self.read_provider();
        let chain_id = provider.get_chain_id().await.map_err(classify_rpc_error)?;
        debug!(%account, chain_id, url = %self.rpc_url, "node reachable");
        Ok(Connected {
            account,
            chain_id,
            reader: EvmReader {
                address: self.contract,
                provider,
            },
        })
    }

    async fn chain_id(&mut self) -> Result<u64> {
        self.read_provider()
            .get_chain_id()
            .await
            .map_err(classify_rpc_error)
    }

    async fn escalate(&mut self, account: Address) -> Result<EvmSigner> {
        let descriptor = self.descriptor()?;
        let signer = wallets::unlock_wallet(descriptor)?;
        if signer.address() != account {
            return Err(MintError::Unknown(format!(
                "keystore '{}' unlocked {} but the session account is {account}",
                descriptor.name,
                signer.address()
            )));
        }
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(self.rpc_url.clone())
            .erased();
        Ok(EvmSigner {
            address: self.contract,
            provider,
            receipt_poll: self.receipt_poll,
        })
    }
}

#[derive(Clone)]
pub struct EvmReader {
    address: Address,
    provider: DynProvider,
}

impl EvmReader {
    fn contract(&self) -> CryptoDevs::CryptoDevsInstance<DynProvider> {
        CryptoDevs::new(self.address, self.provider.clone())
    }

    /// sha256 of the runtime bytecode at the contract address, hex encoded.
    pub async fn deployed_code_hash(&self) -> Result<String> {
        let code = self
            .provider
            .get_code_at(self.address)
            .await
            .map_err(classify_rpc_error)?;
        if code.is_empty() {
            return Err(MintError::ProviderUnavailable(format!(
                "no contract deployed at {}",
                self.address
            )));
        }
        Ok(deployment::compute_code_hash(&code))
    }
}

impl ContractReader for EvmReader {
    async fn owner(&self) -> Result<Address> {
        self.contract()
            .owner()
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn presale_started(&self) -> Result<bool> {
        self.contract()
            .presaleStarted()
            .call()
            .await
            .map_err(classify_contract_error)
    }

    async fn presale_ended(&self) -> Result<u64> {
        let ends_at = self
            .contract()
            .presaleEnded()
            .call()
            .await
            .map_err(classify_contract_error)?;
        Ok(ends_at.saturating_to::<u64>())
    }

    async fn token_ids(&self) -> Result<u64> {
        let minted = self
            .contract()
            .tokenIds()
            .call()
            .await
            .map_err(classify_contract_error)?;
        Ok(minted.saturating_to::<u64>())
    }
}

#[derive(Clone)]
pub struct EvmSigner {
    address: Address,
    provider: DynProvider,
    receipt_poll: Duration,
}

impl ContractWriter for EvmSigner {
    async fn send(&self, call: ContractCall, overrides: TxOverrides) -> Result<TxHash> {
        let contract = CryptoDevs::new(self.address, self.provider.clone());
        let pending = match call {
            ContractCall::StartPresale => {
                contract
                    .startPresale()
                    .gas(overrides.gas_limit)
                    .send()
                    .await
            }
            ContractCall::PresaleMint => {
                contract
                    .presaleMint()
                    .value(overrides.value)
                    .gas(overrides.gas_limit)
                    .send()
                    .await
            }
            ContractCall::Mint => {
                contract
                    .mint()
                    .value(overrides.value)
                    .gas(overrides.gas_limit)
                    .send()
                    .await
            }
        }
        .map_err(classify_contract_error)?;
        Ok(*pending.tx_hash())
    }

    /// Polls for the receipt until it shows up. The caller bounds the wait.
    async fn confirmation(&self, tx_hash: TxHash) -> Result<Confirmation> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(classify_rpc_error)?;
            if let Some(receipt) = receipt {
                info!(%tx_hash, block = ?receipt.block_number, status = receipt.status(), "receipt");
                return Ok(Confirmation {
                    tx_hash,
                    block_number: receipt.block_number,
                    success: receipt.status(),
                });
            }
            time::sleep(self.receipt_poll).await;
        }
    }
}

/// Maps a JSON-RPC error payload onto the client's error kinds.
pub fn classify_error_payload(code: i64, message: &str) -> MintError {
    let lower = message.to_lowercase();
    if code == USER_REJECTED_CODE
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        return MintError::UserRejected;
    }
    if code == EXECUTION_REVERTED_CODE || lower.contains("revert") {
        return MintError::ContractReverted(message.to_owned());
    }
    MintError::Unknown(format!("rpc error {code}: {message}"))
}

pub fn classify_rpc_error(err: RpcError<TransportErrorKind>) -> MintError {
    if let Some(payload) = err.as_error_resp() {
        return classify_error_payload(payload.code, &payload.message);
    }
    match err {
        RpcError::Transport(kind) => MintError::ProviderUnavailable(kind.to_string()),
        other => MintError::Unknown(other.to_string()),
    }
}

pub fn classify_contract_error(err: alloy::contract::Error) -> MintError {
    match err {
        alloy::contract::Error::TransportError(rpc) => classify_rpc_error(rpc),
        other => MintError::Unknown(other.to_string()),
    }
}

//! Known sale contract deployments, kept per network under `.deployments/`.

use alloy::primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub fn network_name(chain_id: u64) -> &'static str {
    match chain_id {
        crate::SEPOLIA_CHAIN_ID => "sepolia",
        1 => "mainnet",
        31_337 => "local",
        _ => "unknown",
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_address: Address,
    pub chain_id: u64,
    pub network_url: String,
    #[serde(default)]
    pub code_hash: Option<String>,
}

impl DeploymentRecord {
    pub fn new(contract_address: Address, chain_id: u64, network_url: impl Into<String>) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            contract_address,
            chain_id,
            network_url: network_url.into(),
            code_hash: None,
        }
    }

    /// Records without a hash were added by hand and are trusted as-is.
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.code_hash
            .as_deref()
            .is_none_or(|expected| expected.eq_ignore_ascii_case(hash))
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    /// Opens `<root>/<network>/deployments.json`, creating it as an empty
    /// list when missing.
    pub fn open(root: impl AsRef<Path>, network: &str) -> Result<Self> {
        let path = ensure_store(root.as_ref(), network)?;
        Ok(Self { path })
    }

    pub fn for_chain(chain_id: u64) -> Result<Self> {
        Self::open(DEPLOYMENTS_ROOT, network_name(chain_id))
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    /// Most recently appended record.
    pub fn latest(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self.load()?.pop())
    }

    pub fn find(&self, address: Address) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .rev()
            .find(|record| record.contract_address == address))
    }

    /// Adds `address` unless it is already known.
    pub fn remember(
        &self,
        address: Address,
        chain_id: u64,
        network_url: &str,
    ) -> Result<DeploymentRecord> {
        if let Some(existing) = self.find(address)? {
            return Ok(existing);
        }
        let record = DeploymentRecord::new(address, chain_id, network_url);
        self.append(record.clone())?;
        Ok(record)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn compute_code_hash(code: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_ref());
    format!("{:x}", hasher.finalize())
}

fn ensure_store(root: &Path, network: &str) -> Result<PathBuf> {
    if network.is_empty() || network.contains(['/', '\\']) {
        return Err(eyre!("Invalid network name {network:?}"));
    }
    let network_dir = root.join(network);
    if !network_dir.exists() {
        fs::create_dir_all(&network_dir).wrap_err_with(|| {
            format!("Failed to create deployments directory {}", network_dir.display())
        })?;
    }

    let file_path = network_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"[]").wrap_err_with(|| {
            format!(
                "Failed to initialize deployment record file for {network} at {:?}",
                file_path
            )
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open__fresh_root__creates_empty_store() {
        // given
        let root = TempDir::new().unwrap();

        // when
        let store = DeploymentStore::open(root.path(), "sepolia").unwrap();

        // then
        assert!(store.path().ends_with("sepolia/deployments.json"));
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.latest().unwrap(), None);
    }

    #[test]
    fn latest__after_two_appends__is_the_second() {
        // given
        let root = TempDir::new().unwrap();
        let store = DeploymentStore::open(root.path(), "sepolia").unwrap();
        let first = DeploymentRecord::new(Address::repeat_byte(1), 11_155_111, "http://a");
        let second = DeploymentRecord::new(Address::repeat_byte(2), 11_155_111, "http://b");

        // when
        store.append(first).unwrap();
        store.append(second.clone()).unwrap();

        // then
        assert_eq!(store.latest().unwrap(), Some(second));
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn remember__known_address__does_not_duplicate() {
        let root = TempDir::new().unwrap();
        let store = DeploymentStore::open(root.path(), "sepolia").unwrap();
        let address = Address::repeat_byte(3);

        store.remember(address, 11_155_111, "http://node").unwrap();
        store.remember(address, 11_155_111, "http://node").unwrap();

        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn open__network_with_separator__is_rejected() {
        let root = TempDir::new().unwrap();
        assert!(DeploymentStore::open(root.path(), "../etc").is_err());
    }

    #[test]
    fn is_compatible_with_hash__missing_or_matching_hash__is_compatible() {
        // given
        let code = [0x60u8, 0x80, 0x60, 0x40];
        let hash = compute_code_hash(code);
        let mut record = DeploymentRecord::new(Address::ZERO, 11_155_111, "http://node");

        // then
        assert!(record.is_compatible_with_hash(&hash));
        record.code_hash = Some(hash.to_uppercase());
        assert!(record.is_compatible_with_hash(&hash));
        record.code_hash = Some(compute_code_hash([0x00u8]));
        assert!(!record.is_compatible_with_hash(&hash));
    }

    #[test]
    fn compute_code_hash__empty_input__is_sha256_of_nothing() {
        assert_eq!(
            compute_code_hash([0u8; 0]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

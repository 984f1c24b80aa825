use crate::MintError;
use alloy::{
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::{
    KeystoreError,
    decrypt_key,
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
    /// Account recorded in the keystore, readable without the password.
    pub address: Option<Address>,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf, address: Option<Address>) -> Self {
        Self {
            name: name.into(),
            path,
            address,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// Every encrypted JSON keystore in `dir`, sorted by name. Files that are not
/// keystores are skipped.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(address) = read_keystore_address(&path) else {
            debug!(path = %path.display(), "skipping non-keystore file");
            continue;
        };
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path, address));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// Prompts on the terminal for the keystore password and decrypts it.
pub fn unlock_wallet(descriptor: &WalletDescriptor) -> crate::Result<PrivateKeySigner> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt)
        .map_err(|e| MintError::ProviderUnavailable(format!("password prompt failed: {e}")))?;
    unlock_with_password(descriptor, &password)
}

/// An empty password or a wrong one count as the user declining to sign.
pub fn unlock_with_password(
    descriptor: &WalletDescriptor,
    password: &str,
) -> crate::Result<PrivateKeySigner> {
    if password.is_empty() {
        return Err(MintError::UserRejected);
    }
    let secret = decrypt_key(&descriptor.path, password.as_bytes()).map_err(|e| match e {
        KeystoreError::MacMismatch => {
            warn!(wallet = %descriptor.name, "wrong keystore password");
            MintError::UserRejected
        }
        other => MintError::ProviderUnavailable(format!(
            "cannot decrypt wallet '{}': {other}",
            descriptor.name
        )),
    })?;
    PrivateKeySigner::from_slice(&secret).map_err(|_| {
        MintError::ProviderUnavailable(format!(
            "Wallet '{}' contained unsupported key material",
            descriptor.name
        ))
    })
}

/// `None` when the file is not a keystore at all, `Some(None)` when it is one
/// but carries no address.
fn read_keystore_address(path: &Path) -> Option<Option<Address>> {
    let data = fs::read(path).ok()?;
    let json: serde_json::Value = serde_json::from_slice(&data).ok()?;
    let object = json.as_object()?;
    if !object.contains_key("crypto") && !object.contains_key("Crypto") {
        return None;
    }
    let address = object
        .get("address")
        .and_then(|value| value.as_str())
        .and_then(|raw| {
            let hex = raw.strip_prefix("0x").unwrap_or(raw);
            format!("0x{hex}").parse::<Address>().ok()
        });
    Some(address)
}

use anyhow::{Context, Result};
use keyring::Entry;

const APP_NAME: &str = "maildesk";
const API_KEY_ENTRY: &str = "directory_api_key";

fn entry() -> Result<Entry> {
    Entry::new(APP_NAME, API_KEY_ENTRY).map_err(|e| anyhow::anyhow!("Keyring error: {}", e))
}

/// Stored API key, `None` when nothing was saved yet.
pub fn load_api_key() -> Result<Option<String>> {
    match entry()?.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("Keyring error: {}", e)),
    }
}

pub fn store_api_key(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Refusing to store an empty API key");
    }
    entry()?
        .set_password(key)
        .context("Failed to store API key in keyring")
}

pub fn clear_api_key() -> Result<()> {
    match entry()?.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Keyring error: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_rejected_before_touching_keyring() {
        assert!(store_api_key("   ").is_err());
    }
}

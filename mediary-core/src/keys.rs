//! Storage key derivation.
//!
//! Key layout: `{type}/{category}/{name}.{ext}`. The public URL is the configured
//! base URL joined with the key. Identical inputs always produce the identical key,
//! so two uploads with the same attributes land on the same blob.

use crate::asset::AssetKind;
use crate::error::{MediaError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct KeyDeriver {
    public_base_url: String,
}

impl KeyDeriver {
    pub fn new(public_base_url: impl Into<String>) -> Result<Self> {
        let base: String = public_base_url.into();
        let base = base.trim().trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(MediaError::Config(
                "public base url cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            public_base_url: base,
        })
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn derive(
        &self,
        kind: AssetKind,
        category: &str,
        name: &str,
        extension: &str,
    ) -> Result<DerivedKey> {
        validate_component("category", category)?;
        validate_component("name", name)?;
        validate_component("extension", extension)?;
        if extension.contains('.') {
            return Err(MediaError::InvalidInput(format!(
                "extension cannot contain '.': {}",
                extension
            )));
        }

        let key = format!("{}/{}/{}.{}", kind.as_str(), category, name, extension);
        let url = format!("{}/{}", self.public_base_url, key);
        Ok(DerivedKey { key, url })
    }

    /// Recover the storage key from a URL produced by [`KeyDeriver::derive`].
    pub fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

fn validate_component(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(MediaError::InvalidInput(format!("{} cannot be empty", field)));
    }

    if value == "." || value == ".." {
        return Err(MediaError::InvalidInput(format!(
            "invalid {}: {}",
            field, value
        )));
    }

    if value
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(MediaError::InvalidInput(format!(
            "{} contains a path separator or control character: {:?}",
            field, value
        )));
    }

    Ok(())
}

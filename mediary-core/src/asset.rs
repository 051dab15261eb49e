use crate::error::{MediaError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media an asset holds. Also the first segment of its storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Icon,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Image, AssetKind::Icon];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Icon => "icon",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = MediaError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "image" => Ok(AssetKind::Image),
            "icon" => Ok(AssetKind::Icon),
            other => Err(MediaError::InvalidInput(format!(
                "invalid asset type '{}', expected image or icon",
                other
            ))),
        }
    }
}

/// Asset record as stored in the metadata index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub category: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Asset attributes before the index has assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub name: String,
    pub kind: AssetKind,
    pub category: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl NewAsset {
    pub fn into_asset(self, id: String) -> Asset {
        Asset {
            id,
            name: self.name,
            kind: self.kind,
            category: self.category,
            url: self.url,
            created_at: self.created_at,
        }
    }
}

/// Creation timestamp at the precision the index persists.
pub fn creation_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

//! Typed filter, sort and pagination for asset queries.

use crate::asset::{Asset, AssetKind};
use crate::error::{MediaError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter over the metadata index.
///
/// `kinds` and `categories` are set-membership matches; an empty set means no
/// constraint. `search` matches `name` or `category` as a case-insensitive
/// substring and is AND-ed with the other two.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub kinds: Vec<AssetKind>,
    pub categories: Vec<String>,
    pub search: Option<String>,
}

impl AssetFilter {
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = AssetKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_categories<S: Into<String>>(
        mut self,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Drop duplicate set members and blank search text.
    pub fn normalized(mut self) -> Self {
        self.kinds.sort();
        self.kinds.dedup();
        self.categories.sort();
        self.categories.dedup();
        self.search = self.search.filter(|term| !term.is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    Name,
    Category,
    #[serde(rename = "type")]
    Kind,
}

impl SortField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Name => "name",
            SortField::Category => "category",
            SortField::Kind => "kind",
        }
    }
}

impl FromStr for SortField {
    type Err = MediaError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "createdAt" => Ok(SortField::CreatedAt),
            "name" => Ok(SortField::Name),
            "category" => Ok(SortField::Category),
            "type" => Ok(SortField::Kind),
            other => Err(MediaError::InvalidInput(format!(
                "unsupported sort field '{}', expected createdAt, name, category or type",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = MediaError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(MediaError::InvalidInput(format!(
                "unsupported sort order '{}', expected asc or desc",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl AssetSort {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Requested page, normalized on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// `page` below 1 becomes 1; `page_size` is clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        let pages = total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPage {
    pub items: Vec<Asset>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

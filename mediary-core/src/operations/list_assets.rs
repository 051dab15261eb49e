use crate::{
    Asset, AssetFilter, AssetSort, CategoryCount, MetadataIndex, PageRequest, Result,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct ListAssetsOperation {
    index: Arc<dyn MetadataIndex>,
}

#[derive(Debug, Clone, Default)]
pub struct ListAssetsOperationRequest {
    pub filter: AssetFilter,
    pub sort: AssetSort,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone)]
pub struct ListAssetsOperationResult {
    pub items: Vec<Asset>,
    pub pagination: Pagination,
    /// Per-category counts restricted by the type filter only.
    pub category_stats: Vec<CategoryCount>,
}

impl ListAssetsOperation {
    pub fn new(index: Arc<dyn MetadataIndex>) -> Self {
        Self { index }
    }

    pub async fn run(
        &self,
        request: ListAssetsOperationRequest,
    ) -> Result<ListAssetsOperationResult> {
        let ListAssetsOperationRequest { filter, sort, page } = request;
        let filter = filter.normalized();

        let result = self.index.query(&filter, sort, page)?;
        let category_stats = self.index.aggregate_by_category(&filter.kinds)?;

        tracing::debug!(
            "listed assets page={} limit={} returned={} total={}",
            page.page(),
            page.page_size(),
            result.items.len(),
            result.total
        );

        Ok(ListAssetsOperationResult {
            items: result.items,
            pagination: Pagination {
                total: result.total,
                page: page.page(),
                limit: page.page_size(),
                total_pages: page.total_pages(result.total),
            },
            category_stats,
        })
    }
}

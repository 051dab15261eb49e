pub mod create_asset;
pub mod delete_asset;
pub mod list_assets;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod test_support;

pub use create_asset::{
    CreateAssetOperation, CreateAssetOperationRequest, CreateAssetOperationResult,
};
pub use delete_asset::{
    DeleteAssetOperation, DeleteAssetOperationRequest, DeleteAssetOperationResult,
};
pub use list_assets::{
    ListAssetsOperation, ListAssetsOperationRequest, ListAssetsOperationResult, Pagination,
};
pub use reconcile::{
    DanglingRecord, ReconcileOperation, ReconcileOperationRequest, ReconcileReport,
};

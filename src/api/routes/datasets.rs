//! Dataset Routes
//!
//! - GET /api/v1/datasets - List registered datasets
//! - PUT /api/v1/datasets/:id/:kind - Register a dataset from a course zip archive or a JSON array of records
//! - DELETE /api/v1/datasets/:id - Remove a dataset

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::ResultResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::dataset::{parse_upload, DatasetInfo, DatasetKind, DatasetProvider};

/// GET /api/v1/datasets
pub async fn list_datasets(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ResultResponse<Vec<DatasetInfo>>>> {
    let datasets = state.store.list_datasets().await;
    Ok(Json(ResultResponse::new(datasets)))
}

/// PUT /api/v1/datasets/:id/:kind
///
/// The body is either a zip archive of course section exports or a JSON array of records.
/// Returns the ids of every registered dataset, including the new one.
pub async fn add_dataset(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<ResultResponse<Vec<String>>>> {
    let kind: DatasetKind = kind.parse()?;
    let records = parse_upload(kind, &body)?;

    state.store.add_dataset(&id, records).await?;

    let ids = state
        .store
        .list_datasets()
        .await
        .into_iter()
        .map(|info| info.id)
        .collect();
    Ok(Json(ResultResponse::new(ids)))
}

/// DELETE /api/v1/datasets/:id
pub async fn remove_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResultResponse<String>>> {
    state.store.remove_dataset(&id).await?;
    Ok(Json(ResultResponse::new(id)))
}

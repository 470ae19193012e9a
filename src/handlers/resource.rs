//! Resource handlers: list, read, traverse an edge, update.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::error::AppError;
use crate::extractors::Caller;
use crate::response::{ListResponse, Pretty};
use crate::service::{ListParams, QueryService};
use crate::state::AppState;
use crate::store::Row;

pub async fn list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Caller(caller): Caller,
) -> Result<Pretty<ListResponse>, AppError> {
    let params = ListParams::from_query(&params)?;
    QueryService::list(&state.registry, state.store.as_ref(), &kind, &params, caller)
        .await
        .map(Pretty)
}

pub async fn read(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Caller(caller): Caller,
) -> Result<Pretty<Row>, AppError> {
    let fields = params.get("fields").map(String::as_str);
    QueryService::read(&state.registry, state.store.as_ref(), &kind, &id, caller, fields)
        .await
        .map(Pretty)
}

pub async fn related(
    State(state): State<AppState>,
    Path((kind, id, edge)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Caller(caller): Caller,
) -> Result<Pretty<ListResponse>, AppError> {
    let params = ListParams::from_query(&params)?;
    QueryService::list_related(&state.registry, state.store.as_ref(), &kind, &id, &edge, &params, caller)
        .await
        .map(Pretty)
}

pub async fn update(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Caller(caller): Caller,
    Json(body): Json<Value>,
) -> Result<Pretty<Row>, AppError> {
    QueryService::update(&state.registry, state.store.as_ref(), &kind, &id, &body, caller)
        .await
        .map(Pretty)
}

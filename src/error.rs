//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::expr::ParseError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate kind: {0}")]
    DuplicateKind(String),
    #[error("reserved kind: {0}")]
    ReservedKind(String),
    #[error("invalid identifier in {kind}: '{name}'")]
    InvalidIdentifier { kind: String, name: String },
    #[error("duplicate field in {kind}: '{name}'")]
    DuplicateField { kind: String, name: String },
    #[error("invalid primary key for {kind}: {detail}")]
    InvalidPrimaryKey { kind: String, detail: String },
    #[error("missing reference from {kind}.{field}: {target}")]
    MissingReference { kind: String, field: String, target: String },
    #[error("duplicate relation on {kind}: '{name}'")]
    DuplicateRelation { kind: String, name: String },
    #[error("invalid permission '{0}': expected owner/group/other such as rw/--/r-")]
    InvalidPermission(String),
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("unknown field '{field}' on {kind}")]
    UnknownField { kind: String, field: String },
    #[error("unknown kind '{0}'")]
    UnknownKind(String),
    #[error("unknown relation '{edge}' on {kind}")]
    UnknownRelation { kind: String, edge: String },
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(String),
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
    #[error("invalid value {value} for {field}: expected {expected}")]
    InvalidLiteral {
        field: String,
        value: String,
        expected: &'static str,
    },
    #[error("{0}")]
    Validation(String),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },
    #[error("Failed {0} is not writeable for user")]
    NotWritable(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("store: {0}")]
    Store(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Detail of a failed request, picked up by the failure envelope middleware
/// which knows the request method and URL.
#[derive(Clone, Debug)]
pub struct FailureDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let mut response = (StatusCode::BAD_REQUEST, detail.clone()).into_response();
        response.extensions_mut().insert(FailureDetail(detail));
        response
    }
}

//! Extract the caller id from the `user_id` query parameter.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};

use crate::error::AppError;
use crate::permission::UserId;

/// Query parameter naming the caller. Absent means anonymous (`0`).
pub const USER_ID_PARAM: &str = "user_id";

/// Caller identity, trusted as given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let id = match params.get(USER_ID_PARAM).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => 0,
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Validation(format!("{} must be an integer", USER_ID_PARAM)))?,
        };
        Ok(Caller(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(uri: &str) -> Result<Caller, AppError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_user_id() {
        assert_eq!(extract("/employees/1?user_id=1").await.unwrap(), Caller(1));
        assert_eq!(extract("/employees?page=2").await.unwrap(), Caller(0));
        assert_eq!(extract("/employees?user_id=").await.unwrap(), Caller(0));
        assert!(extract("/employees?user_id=me").await.is_err());
    }
}

//! Response bodies and the pretty-printed JSON responder.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::store::Row;

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<Row>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub count: u64,
    pub page: u32,
    pub size: u32,
}

/// JSON body indented with four spaces.
pub struct Pretty<T>(pub T);

pub fn to_pretty_vec<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}

impl<T: Serialize> IntoResponse for Pretty<T> {
    fn into_response(self) -> Response {
        match to_pretty_vec(&self.0) {
            Ok(body) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                body,
            )
                .into_response(),
            Err(err) => {
                tracing::error!(error = %err, "response serialization failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indents_with_four_spaces() {
        let body = to_pretty_vec(&json!({"data": [1]})).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "{\n    \"data\": [\n        1\n    ]\n}");
    }

    #[test]
    fn sets_json_content_type() {
        let response = Pretty(json!({})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }
}

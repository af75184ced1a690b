// Response envelopes shared across handlers.

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::query::Pagination;

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<Value>,
    pub pagination: Pagination,
}

pub fn list_response(data: Vec<Value>, pagination: Pagination) -> Json<ListResponse> {
    Json(ListResponse { data, pagination })
}

pub fn deleted() -> Json<Value> {
    Json(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_envelope_uses_camel_case_pagination() {
        let body = ListResponse {
            data: vec![json!({"id": 1})],
            pagination: Pagination::new(25, 2, 10),
        };
        let rendered = serde_json::to_value(&body).unwrap();
        assert_eq!(
            rendered,
            json!({
                "data": [{"id": 1}],
                "pagination": {
                    "totalItems": 25,
                    "pageIndex": 2,
                    "pageSize": 10,
                    "totalPages": 3
                }
            })
        );
    }
}

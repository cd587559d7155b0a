use lambda_http::http::Error as HttpError;
use lambda_http::{Body, Response};
use serde_json::{json, Value};

use crate::error::RecordError;

/// A JSON reply with the given status.
pub fn json_response(status: u16, body: &Value) -> Result<Response<Body>, HttpError> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
}

/// `{"error": ...}` with the status and caller-safe message of `err`.
pub fn error_response(err: &RecordError) -> Result<Response<Body>, HttpError> {
    json_response(err.status_code(), &json!({ "error": err.public_message() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_reply_carries_content_type() {
        let response = json_response(200, &json!({ "inserted_id": "abc" })).unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.body(), &Body::from(r#"{"inserted_id":"abc"}"#));
    }

    #[test]
    fn errors_map_to_status_and_public_message() {
        let response =
            error_response(&RecordError::Execution("password=secret".into())).unwrap();
        assert_eq!(response.status().as_u16(), 500);
        assert_eq!(
            response.body(),
            &Body::from(r#"{"error":"Internal server error"}"#)
        );

        let response = error_response(&RecordError::ClientInput("Missing ?id=")).unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }
}

use chrono::{SecondsFormat, Utc};
use lambda_http::{Body, Error, Request, RequestExt, Response};
use records_core::response::json_response;
use serde_json::json;

/// Health check. Never touches the database.
pub(crate) async fn function_handler(event: Request) -> Result<Response<Body>, Error> {
    let name = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("name"))
        .unwrap_or("World");

    Ok(json_response(
        200,
        &json!({
            "message": format!("Hello, {name}!"),
            "invoked_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    )?)
}

use lambda_http::{Body, Error, Request, RequestExt, Response};
use records_core::{handlers, Executor};
use std::sync::Arc;

/// GET /records?id=<uuid>
pub(crate) async fn function_handler(
    executor: Arc<dyn Executor>,
    event: Request,
) -> Result<Response<Body>, Error> {
    let id = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("id"));
    Ok(handlers::read_record(executor.as_ref(), id).await?)
}

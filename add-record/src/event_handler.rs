use lambda_http::{Body, Error, Request, Response};
use records_core::{handlers, Executor};
use std::sync::Arc;

/// POST /records. The request body is ignored; id and timestamp are generated here.
pub(crate) async fn function_handler(
    executor: Arc<dyn Executor>,
    _event: Request,
) -> Result<Response<Body>, Error> {
    Ok(handlers::create_record(executor.as_ref()).await?)
}

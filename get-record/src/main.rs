use lambda_http::{run, service_fn, tracing, Error, Request};
use records_core::{executor, Settings};
use std::sync::Arc;

mod event_handler;
use event_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let settings = Settings::from_env()?;
    let executor = executor::from_settings(&settings).await?;

    run(service_fn(move |event: Request| {
        let executor = Arc::clone(&executor);
        async move { function_handler(executor, event).await }
    }))
    .await
}

use aws_config::BehaviorVersion;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::Client;
use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Default)]
struct Stats {
    success_count: usize,
    error_count: usize,
    total_latency_ms: f64,
}

/// The parts of an HTTP API proxy response the checks look at.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    status_code: u16,
    body: String,
}

#[derive(Parser, Debug)]
#[command(name = "invoke-test")]
#[command(about = "Create records and read them back through the deployed functions")]
struct Args {
    /// Name of the insert-record function
    #[arg(long)]
    create_function: String,

    /// Name of the fetch-record function
    #[arg(long)]
    read_function: String,

    /// Number of create/read rounds to run
    #[arg(long, default_value = "100")]
    iters: usize,

    /// Number of parallel threads
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Fraction of rounds that also read an id that was never inserted
    #[arg(long, default_value = "0.1")]
    miss_ratio: f64,
}

async fn invoke(
    client: &Client,
    function_name: &str,
    payload: Value,
) -> Result<ProxyResponse, String> {
    let response = client
        .invoke()
        .function_name(function_name)
        .payload(Blob::new(payload.to_string()))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if let Some(error) = response.function_error() {
        return Err(format!("function error: {error}"));
    }

    let bytes = response.payload().map(|b| b.as_ref()).unwrap_or_default();
    serde_json::from_slice(bytes).map_err(|e| {
        format!(
            "unexpected response {}: {e}",
            String::from_utf8_lossy(bytes)
        )
    })
}

/// An HTTP API (payload format 2.0) event, the shape the functions receive
/// behind the gateway.
fn http_event(method: &str, query: Option<(&str, &str)>) -> Value {
    let route = format!("{method} /records");
    let mut event = json!({
        "version": "2.0",
        "routeKey": route,
        "rawPath": "/records",
        "rawQueryString": "",
        "headers": { "content-type": "application/json" },
        "requestContext": {
            "accountId": "123456789012",
            "apiId": "invoke-test",
            "domainName": "invoke-test.local",
            "domainPrefix": "invoke-test",
            "http": {
                "method": method,
                "path": "/records",
                "protocol": "HTTP/1.1",
                "sourceIp": "127.0.0.1",
                "userAgent": "invoke-test"
            },
            "requestId": Uuid::new_v4().to_string(),
            "routeKey": route,
            "stage": "$default",
            "time": "01/Jan/2024:00:00:00 +0000",
            "timeEpoch": 1704067200000u64
        },
        "isBase64Encoded": false
    });
    if let Some((name, value)) = query {
        event["rawQueryString"] = json!(format!("{name}={value}"));
        event["queryStringParameters"] = json!({ name: value });
    }
    event
}

/// One create followed by a read of the returned id.
async fn round_trip(client: &Client, args: &Args) -> Result<String, String> {
    let created = invoke(client, &args.create_function, http_event("POST", None)).await?;
    if created.status_code != 200 {
        return Err(format!("create returned {}: {}", created.status_code, created.body));
    }
    let body: Value = serde_json::from_str(&created.body).map_err(|e| e.to_string())?;
    let id = body["inserted_id"]
        .as_str()
        .ok_or_else(|| format!("create body has no inserted_id: {}", created.body))?
        .to_string();

    let read = invoke(
        client,
        &args.read_function,
        http_event("GET", Some(("id", id.as_str()))),
    )
    .await?;
    if read.status_code != 200 {
        return Err(format!("read of {id} returned {}: {}", read.status_code, read.body));
    }
    let body: Value = serde_json::from_str(&read.body).map_err(|e| e.to_string())?;
    if body["id"].as_str() != Some(id.as_str()) {
        return Err(format!("read of {id} returned a different record: {}", read.body));
    }

    Ok(id)
}

async fn expect_miss(client: &Client, args: &Args, id: &str) -> Result<(), String> {
    let read = invoke(
        client,
        &args.read_function,
        http_event("GET", Some(("id", id))),
    )
    .await?;
    if read.status_code != 404 {
        return Err(format!("read of unknown {id} returned {}: {}", read.status_code, read.body));
    }
    Ok(())
}

async fn run_invocations(
    client: Arc<Client>,
    args: Arc<Args>,
    thread_id: usize,
    start: usize,
    end: usize,
    stats: Arc<Mutex<Stats>>,
) {
    let mut rng = StdRng::from_entropy();

    for i in start..=end {
        let begin = Instant::now();
        let mut result = round_trip(&client, &args).await;

        if result.is_ok() && rng.gen_bool(args.miss_ratio.clamp(0.0, 1.0)) {
            let unknown = Uuid::new_v4().to_string();
            if let Err(e) = expect_miss(&client, &args, &unknown).await {
                result = Err(e);
            }
        }
        let latency_ms = begin.elapsed().as_secs_f64() * 1000.0;

        {
            let mut stats = stats.lock().await;
            match &result {
                Ok(_) => {
                    stats.success_count += 1;
                    stats.total_latency_ms += latency_ms;
                }
                Err(_) => stats.error_count += 1,
            }
        }

        match result {
            Ok(id) => println!(
                "[Thread {}: {}/{}] Created and read {} in {:.3}ms",
                thread_id, i, args.iters, id, latency_ms
            ),
            Err(e) => eprintln!("[Thread {}: {}/{}] Error: {}", thread_id, i, args.iters, e),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Arc::new(Args::parse());

    println!(
        "Running {} create/read rounds across {} thread(s)",
        args.iters, args.threads
    );

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = Arc::new(Client::new(&config));

    let stats = Arc::new(Mutex::new(Stats::default()));

    let threads = args.threads.max(1);
    let iters_per_thread = args.iters / threads;
    let remainder = args.iters % threads;

    let mut tasks = JoinSet::new();

    let mut start = 1;
    for t in 1..=threads {
        let end = if t == threads {
            start + iters_per_thread - 1 + remainder
        } else {
            start + iters_per_thread - 1
        };

        let client = Arc::clone(&client);
        let args = Arc::clone(&args);
        let stats = Arc::clone(&stats);

        tasks.spawn(async move {
            run_invocations(client, args, t, start, end, stats).await;
        });

        start = end + 1;
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            eprintln!("Task failed: {}", e);
        }
    }

    let stats = stats.lock().await;
    println!("Completed {} rounds", args.iters);
    println!();
    println!("Results:");
    println!("  Success: {}", stats.success_count);
    println!("  Errors:  {}", stats.error_count);
    if stats.success_count > 0 {
        let avg_latency = stats.total_latency_ms / stats.success_count as f64;
        println!("  Avg round trip: {:.3}ms", avg_latency);
    }
}

use clap::Parser;
use relay_xhr::config::{ENV_BASE_URL, ENV_ENDPOINT, ENV_TIMEOUT_MS};
use relay_xhr::{ReadyState, RelayConfig, Runtime, run_event_loop};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Send one request through a relay and print the response
#[derive(Parser, Debug)]
#[command(name = "relay-xhr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Target URL, resolved against the base URL when relative
    url: String,

    /// HTTP method
    #[arg(default_value = "GET")]
    method: String,

    /// Request body
    body: Option<String>,

    /// Relay endpoint the request descriptor is appended to
    #[arg(long, env = ENV_ENDPOINT)]
    endpoint: Option<String>,

    /// Milliseconds of relay silence before failing with 504; zero or less waits forever
    #[arg(long, env = ENV_TIMEOUT_MS, allow_negative_numbers = true)]
    timeout_ms: Option<String>,

    /// Base location for relative URLs
    #[arg(long, env = ENV_BASE_URL)]
    base_url: Option<String>,
}

impl Args {
    fn config(&self) -> Result<RelayConfig, relay_xhr::ConfigError> {
        RelayConfig::from_lookup(|name| match name {
            ENV_ENDPOINT => self.endpoint.clone(),
            ENV_TIMEOUT_MS => self.timeout_ms.clone(),
            ENV_BASE_URL => self.base_url.clone(),
            _ => None,
        })
    }
}

#[tokio::main]
async fn main() {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    // Create runtime and event loop
    let (mut runtime, scheduler_rx, callback_tx) = Runtime::new(config);

    log::info!(
        "Relaying {} {} through {}",
        args.method,
        args.url,
        runtime.config().endpoint
    );

    let event_loop_handle = tokio::spawn(async move {
        run_event_loop(scheduler_rx, callback_tx).await;
    });

    let finished = Rc::new(Cell::new(false));
    let request = runtime.request();

    let done = finished.clone();
    request.set_onreadystatechange(move |req| {
        log::debug!("readyState {:?}", req.ready_state());
        if req.ready_state() == ReadyState::Done {
            done.set(true);
        }
    });

    let sent = request.open(&args.method, &args.url).and_then(|_| match &args.body {
        Some(body) => request.send_body(body.as_str()),
        None => request.send(),
    });

    if let Err(e) = sent {
        eprintln!("Request failed: {}", e);
        std::process::exit(1);
    }

    while !finished.get() {
        runtime.process_callbacks();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!(
        "{} {}",
        request.status().unwrap_or_default(),
        request.status_text().unwrap_or_default()
    );
    if let Some(headers) = request.get_all_response_headers() {
        print!("{}", headers);
    }
    println!();
    if let Some(text) = request.response_text() {
        println!("{}", text);
    }

    // Cleanup: runtime will be dropped, sending shutdown message
    drop(runtime);

    let _ = tokio::time::timeout(Duration::from_secs(1), event_loop_handle).await;
}

//! feedhook demo
//!
//! Opens a feed on an in-memory `orders` collection, publishes a few change
//! events and prints what the delivery session receives.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use http::Method;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use feedhook::{
    ChangeEvent, Exchange, FeedGateway, FeedHookConfig, HookCatalog, InMemoryChangeStore,
    RequestContext, ResourceConfig, ResourcePath,
};

/// Demo configuration
struct Args {
    /// Optional JSON config file
    config: Option<PathBuf>,
    /// Events to publish
    events: usize,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        events: 5,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(1);
                }
            }
            "--events" | "-n" => {
                if i + 1 < args.len() {
                    parsed.events = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("error: invalid event count: {}", args[i + 1]);
                        std::process::exit(1);
                    });
                    i += 2;
                } else {
                    eprintln!("error: --events requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("feedhook-demo - in-memory change feed walkthrough");
                println!();
                println!("USAGE:");
                println!("    feedhook-demo [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <FILE>      JSON configuration file");
                println!("    -n, --events <N>         Events to publish [default: 5]");
                println!("    -h, --help               Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    parsed
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();
    let config = match &args.config {
        Some(path) => FeedHookConfig::from_path(path)?,
        None => FeedHookConfig::from_json_str(
            r#"{"singletons": [{"name": "snoop", "kind": "snooper"}]}"#,
        )?,
    };

    let store = InMemoryChangeStore::with_config(config.store.clone());
    let gateway = FeedGateway::from_config(&config, Arc::new(store.clone()), &HookCatalog::with_builtins())?;

    let orders = ResourcePath::new("db", "orders");
    let resource = ResourceConfig::from_value(
        orders.clone(),
        json!({
            "feeds": [{"uri": "new-orders",
                       "stages": [{"$match": {"fullDocument.status": {"$var": ["status", "new"]}}}]}],
            "hooks": [{"name": "snoop", "args": {"demo": true}}]
        }),
    );

    let mut exchange = Exchange::new("/db/orders/_feeds/new-orders");
    let mut ctx = RequestContext::new(Method::POST, Some(resource)).with_feed("new-orders", None);
    let Some(opened) = gateway.open_feed(&mut exchange, &mut ctx) else {
        return Err(format!("open failed: {:?}", exchange.response().body()).into());
    };
    println!("{}", serde_json::to_string_pretty(&exchange.response().body())?);

    let session = gateway
        .attach(&opened.uri)
        .ok_or("subscription vanished before attach")?;

    let events = args.events;
    let publisher = thread::spawn(move || {
        for i in 0..events {
            let status = if i % 2 == 0 { "new" } else { "shipped" };
            store.publish(&ChangeEvent::insert(orders.clone(), json!({"_id": i, "status": status})));
            thread::sleep(Duration::from_millis(50));
        }
    });

    let expected = events.div_ceil(2);
    let mut received = 0;
    if expected > 0 {
        session.forward(|event| {
            println!("{}", event.to_document());
            received += 1;
            received < expected
        });
    }
    publisher.join().map_err(|_| "publisher panicked")?;

    println!("received {received} event(s)");
    session.detach();
    gateway.shutdown();
    Ok(())
}

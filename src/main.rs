//! store-session binary entry point.
//!
//! Runs a session against an in-process network: creates or opens a store,
//! seeds sample data, loads it and prints every status update as a JSON line.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use store_session::cli::{self, Args};
use store_session::engine::OpenOptions;
use store_session::memory::{MemoryNetwork, MemoryStore};
use store_session::{
    logging, Config, SessionManager, StatusSink, StatusUpdate, StoreSessionError, StoreVariant,
};

/// Extra time granted to background reports before the session closes.
const SETTLE_TIME: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> store_session::Result<()> {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            std::process::exit(2);
        }
    };

    if args.help {
        cli::print_help();
        return Ok(());
    }
    if args.version {
        cli::print_version();
        return Ok(());
    }

    let config = Config::load(&args)?;
    logging::try_init_with_filter(config.log_filter()).ok();
    info!("store-session v{}", env!("CARGO_PKG_VERSION"));

    run(&args, &config).await
}

async fn run(args: &Args, config: &Config) -> store_session::Result<()> {
    let network = MemoryNetwork::new();
    let manager = SessionManager::new(config.to_session_options());
    manager
        .connect(&network.connector("alice"), &config.node)
        .await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<StatusUpdate>();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match serde_json::to_string(&update) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "failed to encode status update"),
            }
        }
    });
    let sink: Arc<dyn StatusSink> = Arc::new(tx);

    let mut session = match args.open {
        Some(ref address) => manager.open_database(address, sink).await?,
        None => {
            manager
                .create_database(&args.name, args.variant, args.public, sink)
                .await?
        }
    };
    let address = session
        .store_address()
        .ok_or(StoreSessionError::NoStore)?;
    let variant = session.store_variant().ok_or(StoreSessionError::NoStore)?;
    info!(%address, %variant, "session ready");

    // A second handle with the session's identity acts as the local writer.
    let writer = network
        .join("alice")
        .engine
        .open_handle(&address.to_string(), &OpenOptions::sync())?;
    let key = manager
        .options()
        .query
        .key_for(variant)
        .map(str::to_string);

    for i in 1..=3 {
        seed(&writer, variant, key.as_deref(), i)?;
    }
    session.load_store().await?;
    seed(&writer, variant, key.as_deref(), 4)?;

    tokio::time::sleep(manager.options().ready_delay + SETTLE_TIME).await;
    session.query_and_render().await?;
    session.reset_store().await?;

    drop(session);
    drop(manager);
    if tokio::time::timeout(SETTLE_TIME, printer).await.is_err() {
        warn!("status printer did not drain in time");
    }
    Ok(())
}

fn seed(
    store: &MemoryStore,
    variant: StoreVariant,
    key: Option<&str>,
    n: u64,
) -> store_session::Result<()> {
    let key = key.unwrap_or("demo");
    match variant {
        StoreVariant::EventLog | StoreVariant::Feed => {
            store.add(json!(format!("entry {}", n)))?;
        }
        StoreVariant::DocStore => {
            store.put_doc(json!({ "_id": key, "revision": n }))?;
        }
        StoreVariant::KeyValue => {
            store.put(key, json!(n))?;
        }
        StoreVariant::Counter => {
            store.inc(n)?;
        }
    }
    Ok(())
}

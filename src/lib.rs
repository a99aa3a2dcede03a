pub mod alert;
pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod listing;
pub mod notifier;
pub mod tgtg;
pub mod utils;
pub mod watcher;

use alert::SystemClock;
use config::AppConfig;
use error::RunError;
use history::HistoryStore;
use watcher::{LiveConnector, RunSummary, Watcher};

use tracing::info;

/// Runs one polling pass against the live marketplace and Telegram.
pub async fn run() -> Result<RunSummary, RunError> {
    let config = AppConfig::from_env();
    let store = HistoryStore::new(&config.history_file);
    info!("🗂️  Alert history file: {:?}", store.path());

    let mut watcher = Watcher::new(config, store, LiveConnector, SystemClock);
    watcher.run().await
}

#![cfg(not(tarpaulin_include))]

use intern_uploader::app;
use intern_uploader::config::AppConfig;
use intern_uploader::store::FirestoreStore;

/// Main entry point for the upload server
///
/// Reads configuration from the environment, constructs the Firestore
/// client, and serves the upload page until killed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::from_env()?;
    let store = FirestoreStore::new(config.project_id.clone(), config.api_key.clone());

    app::run(store, &config.bind_addr).await
}

pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod http;
pub mod infrastructure;

use application::auth_service::{AuthService, AuthServiceImpl};
use application::item_service::ItemServiceImpl;
use config::SessionConfig;
use http::types::AppState;
use infrastructure::sqlite_repo::SqliteStore;

/// Opens the database, creates the schema, drops idle sessions and wires
/// the services into router state.
pub async fn bootstrap(database_url: &str, session: SessionConfig) -> anyhow::Result<AppState> {
    let store = SqliteStore::connect(database_url).await?;
    store.init().await?;
    let auth = AuthServiceImpl::new(store.clone(), store.clone(), session.lifetime());
    let purged = auth.purge_expired().await?;
    if purged > 0 {
        tracing::info!(purged, "dropped idle sessions");
    }
    Ok(AppState::new(ItemServiceImpl::new(store), auth, session))
}

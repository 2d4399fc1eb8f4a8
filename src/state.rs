use std::sync::Arc;

use sqlx::SqlitePool;

use crate::hub::Hub;
use crate::store::Store;

/// Shared application state passed to every handler and extractor.
///
/// `Hub` is cheaply cloneable (it wraps an `Arc` internally), so cloning
/// `AppState` for each request is inexpensive.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt_secret: Arc<str>,
    pub store: Store,
    pub hub: Hub,
}

// FICHIER : backend/src/utils/mod.rs

// =========================================================================
//  WEBSEMBLE UTILS - Foundation Layer
// =========================================================================

pub mod config;
pub mod error;
pub mod fs;
pub mod json;
pub mod logger;
pub mod macros;

/// **Le Prélude** : À utiliser via `use crate::utils::prelude::*;`
pub mod prelude {
    pub use super::config::AppConfig;
    pub use super::error::{AppError, ErrorKind, Result};
    pub use super::json::{json, Map, Value};
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, warn};
}

// --> Config & Erreurs
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use logger::init_logging;

// --> Async Runtime & Sync
pub use async_trait::async_trait;
pub use std::sync::Arc;
pub use tokio::sync::{Mutex as AsyncMutex, OnceCell, RwLock as AsyncRwLock};

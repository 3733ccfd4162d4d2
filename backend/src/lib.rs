pub mod commands;
pub mod json_db;
pub mod utils;

use crate::commands::RestService;
use crate::json_db::catalog::Catalog;
use crate::utils::{AppConfig, Arc, Result};

// Cette structure rend l'état accessible partout via crate::AppState
#[derive(Debug, Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub rest: RestService,
}

impl AppState {
    /// Initialise le catalogue déclaré dans la configuration et le service de requêtes.
    pub async fn bootstrap(config: &AppConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::new());
        catalog.init(Some(&config.catalog_config())).await?;
        tracing::info!(
            data_root = ?config.data_root,
            collections = catalog.collection_names().len(),
            "Backend prêt"
        );
        Ok(Self {
            rest: RestService::new(catalog.clone()),
            catalog,
        })
    }
}

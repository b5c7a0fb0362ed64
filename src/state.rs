use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::cart::{memory::MemoryCartStore, repo::CartStore, repo::PgCartStore};
use crate::catalog::{memory::MemoryCatalogStore, repo::CatalogStore, repo::PgCatalogStore};
use crate::config::AppConfig;
use crate::locks::KeyedLocks;
use crate::orders::commit::{CheckoutCommit, CompensatingCommit, PgCheckoutCommit};
use crate::orders::{memory::MemoryOrderStore, repo::OrderStore, repo::PgOrderStore};

/// Store handles shared by every request. Built once in `main`, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn CatalogStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    /// Final write step of checkout.
    pub checkout: Arc<dyn CheckoutCommit>,
    /// Serializes cart mutation and checkout per user.
    pub user_locks: Arc<KeyedLocks>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            return Ok(Self::in_memory(config));
        };

        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let state = Self::from_parts(
            Arc::clone(&config),
            Arc::new(PgCatalogStore::new(db.clone())),
            Arc::new(PgCartStore::new(db.clone())),
            Arc::new(PgOrderStore::new(db.clone())),
        );
        Ok(state.with_checkout(Arc::new(PgCheckoutCommit::new(db))))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        catalog: Arc<dyn CatalogStore>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        let checkout = Arc::new(CompensatingCommit::new(
            Arc::clone(&catalog),
            Arc::clone(&carts),
            Arc::clone(&orders),
        ));
        Self {
            config,
            catalog,
            carts,
            orders,
            checkout,
            user_locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn with_checkout(mut self, checkout: Arc<dyn CheckoutCommit>) -> Self {
        self.checkout = checkout;
        self
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryCatalogStore::new()),
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryOrderStore::new()),
        )
    }

    /// Empty in-memory state for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            db_max_connections: 1,
            server: crate::config::ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            seed_sample_data: false,
        });
        Self::in_memory(config)
    }
}

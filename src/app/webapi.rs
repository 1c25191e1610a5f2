use crate::app::health::health_report;
use crate::core::host::HostContext;
use crate::domain::model::{HealthReport, Product};
use crate::domain::ports::{MigrationContext, Startup};
use crate::utils::error::{BootcampError, Result};
use crate::utils::monitor::ProcessMonitor;
use crate::utils::validation::validate_non_empty_string;
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::migrate::{Migrate, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

pub const APPLICATION_NAME: &str = "bootcamp-webapi";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://bootcamp.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed product store.
#[derive(Debug, Clone)]
pub struct ProductContext {
    pool: SqlitePool,
}

impl ProductContext {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if url.contains(":memory:") {
            // An in-memory database lives only as long as its connection.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        tracing::debug!("connected to {}", url);
        Ok(Self { pool })
    }

    pub async fn from_settings(settings: &crate::config::Settings) -> Result<Self> {
        let url = settings.get_or("database:url", DEFAULT_DATABASE_URL);
        let max_connections = settings
            .get_parsed::<u32>("database:maxConnections")?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Self::connect(url, max_connections).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT id, name FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT id, name FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn add_product(&self, name: &str) -> Result<Product> {
        validate_non_empty_string("name", name)?;
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (name) VALUES (?) RETURNING id, name",
        )
        .bind(name.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MigrationContext for ProductContext {
    fn name(&self) -> &str {
        "ProductContext"
    }

    async fn pending_migrations(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        conn.ensure_migrations_table().await?;
        let applied: HashSet<i64> = conn
            .list_applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect();

        Ok(MIGRATOR
            .iter()
            .filter(|m| !m.migration_type.is_down_migration() && !applied.contains(&m.version))
            .map(|m| format!("{}_{}", m.version, m.description))
            .collect())
    }

    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct WebApiServices {
    pub products: ProductContext,
    pub host: HostContext,
    pub monitor: ProcessMonitor,
}

impl AsRef<ProductContext> for WebApiServices {
    fn as_ref(&self) -> &ProductContext {
        &self.products
    }
}

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebApiStartup;

#[async_trait]
impl Startup for WebApiStartup {
    type Services = WebApiServices;

    async fn configure_services(&self, context: &HostContext) -> Result<Self::Services> {
        Ok(WebApiServices {
            products: ProductContext::from_settings(&context.settings).await?,
            host: context.clone(),
            monitor: ProcessMonitor::new(),
        })
    }

    fn configure(&self, services: Self::Services) -> Router {
        Router::new()
            .route("/api/products", get(list_products).post(create_product))
            .route("/api/products/:id", get(get_product))
            .route("/api/config", get(externalized_config))
            .route("/health", get(health))
            .with_state(services)
    }
}

async fn list_products(State(services): State<WebApiServices>) -> Result<Json<Vec<Product>>> {
    Ok(Json(services.products.list_products().await?))
}

async fn get_product(
    State(services): State<WebApiServices>,
    Path(id): Path<i64>,
) -> Result<Json<Product>> {
    services
        .products
        .find_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| BootcampError::NotFound {
            resource: format!("product {}", id),
        })
}

async fn create_product(
    State(services): State<WebApiServices>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = services.products.add_product(&body.name).await?;
    tracing::info!("created product {} ({})", product.id, product.name);
    Ok((StatusCode::CREATED, Json(product)))
}

/// The `bootcamp:*` section, as resolved through every configuration layer.
async fn externalized_config(
    State(services): State<WebApiServices>,
) -> Json<BTreeMap<String, String>> {
    let section = services.host.settings.section("bootcamp");
    Json(
        section
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

async fn health(State(services): State<WebApiServices>) -> Json<HealthReport> {
    services.monitor.log_stats("health");
    Json(health_report(&services.host, &services.monitor, BTreeMap::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::migration::{ensure_migrated, MigrationOutcome};

    async fn memory_context() -> ProductContext {
        ProductContext::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let ctx = memory_context().await;

        let pending = ctx.pending_migrations().await.unwrap();
        assert_eq!(pending, vec!["20240101000000_create products".to_string()]);

        assert!(matches!(
            ensure_migrated(&ctx, true).await.unwrap(),
            MigrationOutcome::Applied(_)
        ));
        assert_eq!(ensure_migrated(&ctx, true).await.unwrap(), MigrationOutcome::UpToDate);
    }

    #[tokio::test]
    async fn test_product_queries() {
        let ctx = memory_context().await;
        ctx.migrate().await.unwrap();

        let first = ctx.add_product("Widget").await.unwrap();
        let second = ctx.add_product("  Gadget ").await.unwrap();
        assert_eq!(second.name, "Gadget");

        let all = ctx.list_products().await.unwrap();
        assert_eq!(all, vec![first.clone(), second]);
        assert_eq!(ctx.find_product(first.id).await.unwrap(), Some(first));
        assert_eq!(ctx.find_product(999).await.unwrap(), None);
        assert!(ctx.add_product("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_queries_fail_before_migration() {
        let ctx = memory_context().await;
        assert!(matches!(
            ctx.list_products().await,
            Err(BootcampError::DatabaseError(_))
        ));
    }
}

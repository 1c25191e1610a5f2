use crate::app::health::health_report;
use crate::config::Settings;
use crate::core::host::HostContext;
use crate::core::resilience::ProtectedCommand;
use crate::domain::model::{HealthReport, Product};
use crate::domain::ports::Startup;
use crate::utils::error::{BootcampError, Result};
use crate::utils::monitor::ProcessMonitor;
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

pub const APPLICATION_NAME: &str = "bootcamp-store";
pub const RUN_LOCAL_PORT: u16 = 5555;
pub const PRODUCT_COMMAND: &str = "ProductService";
pub const DEFAULT_PRODUCTS_URL: &str = "http://localhost:5000/api/products";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Upstream,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub source: CatalogSource,
    pub products: Vec<Product>,
}

/// Reads the product list from the web API through the `ProductService` command.
pub struct ProductCatalogClient {
    http: Client,
    url: String,
    command: ProtectedCommand,
    last_good: RwLock<Option<Vec<Product>>>,
}

impl ProductCatalogClient {
    pub fn new(url: impl Into<String>, command: ProtectedCommand) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            command,
            last_good: RwLock::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.get_or("store:productsUrl", DEFAULT_PRODUCTS_URL);
        validate_url("store:productsUrl", url)?;
        let command = ProtectedCommand::from_settings(settings, PRODUCT_COMMAND)?;
        Ok(Self::new(url, command))
    }

    pub fn command(&self) -> &ProtectedCommand {
        &self.command
    }

    pub async fn products(&self) -> Result<CatalogResponse> {
        self.command
            .execute_with_fallback(|| self.fetch_upstream(), |_| Ok(self.fallback()))
            .await
    }

    async fn fetch_upstream(&self) -> Result<CatalogResponse> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(BootcampError::UpstreamError {
                message: format!("{} returned {}", self.url, response.status()),
            });
        }

        let products: Vec<Product> = response.json().await?;
        match self.last_good.write() {
            Ok(mut cache) => *cache = Some(products.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(products.clone()),
        }

        Ok(CatalogResponse {
            source: CatalogSource::Upstream,
            products,
        })
    }

    /// Last list fetched successfully, or nothing.
    fn fallback(&self) -> CatalogResponse {
        let cached = match self.last_good.read() {
            Ok(cache) => cache.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        CatalogResponse {
            source: CatalogSource::Fallback,
            products: cached.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct StoreServices {
    pub catalog: Arc<ProductCatalogClient>,
    pub host: HostContext,
    pub monitor: ProcessMonitor,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStartup;

#[async_trait]
impl Startup for StoreStartup {
    type Services = StoreServices;

    async fn configure_services(&self, context: &HostContext) -> Result<Self::Services> {
        let catalog = ProductCatalogClient::from_settings(&context.settings)?;
        tracing::info!("product catalog at {}", catalog.url);
        Ok(StoreServices {
            catalog: Arc::new(catalog),
            host: context.clone(),
            monitor: ProcessMonitor::new(),
        })
    }

    fn configure(&self, services: Self::Services) -> Router {
        Router::new()
            .route("/products", get(products))
            .route("/health", get(health))
            .with_state(services)
    }
}

async fn products(State(services): State<StoreServices>) -> Result<Json<CatalogResponse>> {
    Ok(Json(services.catalog.products().await?))
}

async fn health(State(services): State<StoreServices>) -> Json<HealthReport> {
    let command = services.catalog.command();
    let state = if command.is_open() { "open" } else { "closed" };
    let circuits = BTreeMap::from([(command.key().to_string(), state.to_string())]);
    Json(health_report(&services.host, &services.monitor, circuits))
}

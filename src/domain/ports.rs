use crate::config::settings::Settings;
use crate::core::host::HostContext;
use crate::utils::error::Result;
use async_trait::async_trait;
use axum::Router;

/// One layer of configuration. `current` holds everything loaded by earlier layers.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &str;
    async fn load(&self, current: &Settings) -> Result<Settings>;
}

/// A persistence context whose schema can be brought up to date at startup.
#[async_trait]
pub trait MigrationContext: Send + Sync {
    fn name(&self) -> &str;
    async fn pending_migrations(&self) -> Result<Vec<String>>;
    async fn migrate(&self) -> Result<()>;
}

/// Registers a service's dependencies and routes with the web host.
#[async_trait]
pub trait Startup: Send + Sync + 'static {
    type Services: Clone + Send + Sync + 'static;

    async fn configure_services(&self, context: &HostContext) -> Result<Self::Services>;

    fn configure(&self, services: Self::Services) -> Router;
}

pub mod host;
pub mod hosting;
pub mod migration;
pub mod resilience;

pub use crate::domain::model::{HealthReport, Product};
pub use crate::domain::ports::{ConfigSource, MigrationContext, Startup};
pub use crate::utils::error::Result;
pub use host::{HostContext, WebHost, WebHostBuilder};

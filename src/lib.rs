pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::LauncherArgs;

pub use app::store::StoreStartup;
pub use app::webapi::{ProductContext, WebApiStartup};
pub use config::{ConfigurationBuilder, Settings};
pub use core::host::{WebHost, WebHostBuilder};
pub use utils::error::{BootcampError, Result};

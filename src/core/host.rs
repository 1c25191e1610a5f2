use crate::config::cloud_foundry::CloudFoundrySource;
use crate::config::config_server::ConfigServerSource;
use crate::config::settings::Settings;
use crate::config::ConfigurationBuilder;
use crate::core::hosting::{resolve_listen_addr, HostingOptions};
use crate::core::migration::{ensure_migrated, MigrationOutcome};
use crate::domain::ports::{ConfigSource, MigrationContext, Startup};
use crate::utils::error::Result;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub const APPLICATION_NAME_KEY: &str = "spring:application:name";
pub const PLATFORM_PORT_VAR: &str = "PORT";

/// What a [`Startup`] sees while registering services.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub settings: Arc<Settings>,
    pub application_name: String,
    pub environment: String,
}

pub struct WebHostBuilder {
    application_name: String,
    environment: String,
    configuration: ConfigurationBuilder,
    cloud_hosting: bool,
    run_local_port: Option<u16>,
    platform_port: Option<String>,
}

impl WebHostBuilder {
    /// A builder without any configuration sources.
    pub fn new(application_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            environment: environment.into(),
            configuration: ConfigurationBuilder::new(),
            cloud_hosting: false,
            run_local_port: None,
            platform_port: None,
        }
    }

    /// Settings files, environment variables and command line overrides, in that order.
    #[cfg(feature = "cli")]
    pub fn create_default(
        application_name: impl Into<String>,
        args: &crate::config::cli::LauncherArgs,
    ) -> Self {
        use crate::config::sources::{CommandLineSource, EnvironmentSource};
        use crate::config::toml_config::TomlFileSource;

        let dir = std::path::Path::new(&args.config_dir);
        let mut overrides = args.overrides.clone();
        if let Some(urls) = &args.urls {
            overrides.push(format!("urls={}", urls));
        }

        Self::new(application_name, args.environment.clone())
            .add_source(TomlFileSource::new(dir.join("appsettings.toml"), true))
            .add_source(TomlFileSource::new(
                dir.join(format!("appsettings.{}.toml", args.environment)),
                true,
            ))
            .add_source(EnvironmentSource::from_process(None))
            .add_source(CommandLineSource::new(overrides))
    }

    pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.configuration.add_source(source);
        self
    }

    /// Listen on the platform-assigned `PORT`, or on `run_local_port` when off-platform.
    pub fn use_cloud_foundry_hosting(mut self, run_local_port: Option<u16>) -> Self {
        self.cloud_hosting = true;
        self.run_local_port = run_local_port;
        if self.platform_port.is_none() {
            self.platform_port = std::env::var(PLATFORM_PORT_VAR).ok();
        }
        self
    }

    pub fn with_platform_port(mut self, port: Option<String>) -> Self {
        self.platform_port = port;
        self
    }

    pub fn add_cloud_foundry(self) -> Self {
        if self.configuration.has_source("cloud-foundry") {
            return self;
        }
        self.add_source(CloudFoundrySource::from_process())
    }

    pub fn add_config_server(self) -> Self {
        let name = self.application_name.clone();
        let environment = self.environment.clone();
        self.add_cloud_foundry()
            .add_source(ConfigServerSource::new(name, environment))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.configuration.source_names()
    }

    pub fn use_startup<S: Startup>(self, startup: S) -> WebHostFactory<S> {
        WebHostFactory {
            builder: self,
            startup,
        }
    }
}

pub struct WebHostFactory<S: Startup> {
    builder: WebHostBuilder,
    startup: S,
}

impl<S: Startup> WebHostFactory<S> {
    pub async fn build(self) -> Result<WebHost<S>> {
        let WebHostFactory { builder, startup } = self;
        tracing::debug!(
            "building {} ({}) from sources: {}",
            builder.application_name,
            builder.environment,
            builder.configuration.source_names().join(", ")
        );

        let settings = builder.configuration.build().await?;
        let application_name = settings
            .get(APPLICATION_NAME_KEY)
            .unwrap_or(builder.application_name.as_str())
            .to_string();

        let listen_addr = resolve_listen_addr(&HostingOptions {
            cloud_hosting: builder.cloud_hosting,
            platform_port: builder.platform_port.clone(),
            run_local_port: builder.run_local_port,
            urls: settings.get("urls").map(str::to_string),
        })?;

        let context = HostContext {
            settings: Arc::new(settings),
            application_name,
            environment: builder.environment,
        };

        let services = startup.configure_services(&context).await?;
        let router = startup
            .configure(services.clone())
            .layer(TraceLayer::new_for_http());

        Ok(WebHost {
            context,
            listen_addr,
            services,
            router,
        })
    }
}

pub struct WebHost<S: Startup> {
    context: HostContext,
    listen_addr: SocketAddr,
    services: S::Services,
    router: Router,
}

impl<S: Startup> WebHost<S> {
    pub fn context(&self) -> &HostContext {
        &self.context
    }

    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    pub fn services(&self) -> &S::Services {
        &self.services
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Applies pending migrations of the context registered by the startup.
    pub async fn ensure_migration_of_context<C>(&self) -> Result<MigrationOutcome>
    where
        C: MigrationContext + 'static,
        S::Services: AsRef<C>,
    {
        let fail_on_error = self
            .settings()
            .get_bool("database:failOnMigrationError")?
            .unwrap_or(false);
        ensure_migrated(AsRef::<C>::as_ref(&self.services), fail_on_error).await
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.listen_addr).await?;
        self.serve(listener, signal).await
    }

    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            "{} ({}) listening on http://{}",
            self.context.application_name,
            self.context.environment,
            addr
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("{} shut down", self.context.application_name);
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

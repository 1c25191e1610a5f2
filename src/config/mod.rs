#[cfg(feature = "cli")]
pub mod cli;
pub mod cloud_foundry;
pub mod config_server;
pub mod settings;
pub mod sources;
pub mod toml_config;

use crate::domain::ports::ConfigSource;
use crate::utils::error::Result;
pub use settings::Settings;

#[cfg(feature = "cli")]
pub use cli::LauncherArgs;

/// Ordered configuration layers; each layer overrides the ones before it.
#[derive(Default)]
pub struct ConfigurationBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source<S: ConfigSource + 'static>(&mut self, source: S) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.name() == name)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn build(&self) -> Result<Settings> {
        let mut settings = Settings::new();
        for source in &self.sources {
            let layer = source.load(&settings).await?;
            tracing::trace!("configuration source {} supplied {} keys", source.name(), layer.len());
            settings.merge(layer);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::InMemorySource;
    use crate::utils::error::BootcampError;
    use async_trait::async_trait;

    struct EchoSource;

    #[async_trait]
    impl ConfigSource for EchoSource {
        fn name(&self) -> &str {
            "echo"
        }

        async fn load(&self, current: &Settings) -> Result<Settings> {
            let seen = current.get("greeting").unwrap_or("nothing");
            Ok(Settings::new().with("echo", format!("saw {}", seen)))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ConfigSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn load(&self, _current: &Settings) -> Result<Settings> {
            Err(BootcampError::config("boom"))
        }
    }

    #[tokio::test]
    async fn test_later_sources_win_and_see_earlier_layers() {
        let mut builder = ConfigurationBuilder::new();
        builder
            .add_source(InMemorySource::new(Settings::new().with("greeting", "hello").with("a", "1")))
            .add_source(EchoSource)
            .add_source(InMemorySource::new(Settings::new().with("greeting", "override")));

        let settings = builder.build().await.unwrap();
        assert_eq!(settings.get("greeting"), Some("override"));
        assert_eq!(settings.get("echo"), Some("saw hello"));
        assert_eq!(settings.get("a"), Some("1"));
        assert!(builder.has_source("echo"));
    }

    #[tokio::test]
    async fn test_source_error_stops_build() {
        let mut builder = ConfigurationBuilder::new();
        builder.add_source(FailingSource);
        assert!(builder.build().await.is_err());
    }
}

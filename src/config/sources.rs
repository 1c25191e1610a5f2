use crate::config::settings::Settings;
use crate::domain::ports::ConfigSource;
use crate::utils::error::{BootcampError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Process environment variables. `__` in a name maps to the key delimiter.
#[derive(Debug, Clone)]
pub struct EnvironmentSource {
    prefix: Option<String>,
    vars: HashMap<String, String>,
}

impl EnvironmentSource {
    pub fn from_process(prefix: Option<&str>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    pub fn from_vars<I>(prefix: Option<&str>, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            prefix: prefix.map(str::to_string),
            vars: vars.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ConfigSource for EnvironmentSource {
    fn name(&self) -> &str {
        "environment"
    }

    async fn load(&self, _current: &Settings) -> Result<Settings> {
        let settings = self
            .vars
            .iter()
            .filter_map(|(key, value)| match &self.prefix {
                Some(prefix) => key
                    .strip_prefix(prefix.as_str())
                    .map(|rest| (rest.to_string(), value.clone())),
                None => Some((key.clone(), value.clone())),
            })
            .filter(|(key, _)| !key.is_empty())
            .collect::<Settings>();
        Ok(settings)
    }
}

/// `key=value` overrides passed with `--set`.
#[derive(Debug, Clone, Default)]
pub struct CommandLineSource {
    pairs: Vec<String>,
}

impl CommandLineSource {
    pub fn new(pairs: Vec<String>) -> Self {
        Self { pairs }
    }

    fn parse_pair(pair: &str) -> Result<(&str, &str)> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
            _ => Err(BootcampError::config(format!(
                "command line override '{}' must have the form key=value",
                pair
            ))),
        }
    }
}

#[async_trait]
impl ConfigSource for CommandLineSource {
    fn name(&self) -> &str {
        "command-line"
    }

    async fn load(&self, _current: &Settings) -> Result<Settings> {
        let mut settings = Settings::new();
        for pair in &self.pairs {
            let (key, value) = Self::parse_pair(pair)?;
            settings.insert(key, value);
        }
        Ok(settings)
    }
}

/// Settings supplied directly in code.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    settings: Settings,
}

impl InMemorySource {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ConfigSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn load(&self, _current: &Settings) -> Result<Settings> {
        Ok(self.settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_environment_double_underscore() {
        let source = EnvironmentSource::from_vars(
            None,
            vars(&[("SPRING__CLOUD__CONFIG__URI", "http://config:8888"), ("PORT", "8080")]),
        );
        let settings = source.load(&Settings::new()).await.unwrap();
        assert_eq!(settings.get("spring:cloud:config:uri"), Some("http://config:8888"));
        assert_eq!(settings.get("port"), Some("8080"));
    }

    #[tokio::test]
    async fn test_environment_prefix_is_stripped() {
        let source = EnvironmentSource::from_vars(
            Some("BOOTCAMP_"),
            vars(&[("BOOTCAMP_STORE__PRODUCTSURL", "http://api/products"), ("HOME", "/root")]),
        );
        let settings = source.load(&Settings::new()).await.unwrap();
        assert_eq!(settings.get("store:productsUrl"), Some("http://api/products"));
        assert!(!settings.contains_key("home"));
    }

    #[tokio::test]
    async fn test_command_line_pairs() {
        let source = CommandLineSource::new(vec![
            "database:url=sqlite::memory:".to_string(),
            "bootcamp.greeting=hi=there".to_string(),
        ]);
        let settings = source.load(&Settings::new()).await.unwrap();
        assert_eq!(settings.get("database:url"), Some("sqlite::memory:"));
        assert_eq!(settings.get("bootcamp:greeting"), Some("hi=there"));
    }

    #[tokio::test]
    async fn test_command_line_rejects_bare_key() {
        let source = CommandLineSource::new(vec!["verbose".to_string()]);
        assert!(matches!(
            source.load(&Settings::new()).await,
            Err(BootcampError::ConfigError { .. })
        ));
    }
}

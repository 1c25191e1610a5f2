use crate::config::settings::Settings;
use crate::domain::ports::ConfigSource;
use crate::utils::error::{BootcampError, Result};
use crate::utils::validation::{self, Validate};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const PREFIX: &str = "spring:cloud:config";
pub const DEFAULT_URI: &str = "http://localhost:8888";
pub const DEFAULT_TIMEOUT_MS: u64 = 6000;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 6,
            initial_interval: Duration::from_millis(1000),
            multiplier: 1.1,
            max_interval: Duration::from_millis(2000),
        }
    }
}

impl RetrySettings {
    /// Sleep before the `retry`-th retry (1-based), capped at `max_interval`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powf(f64::from(retry.saturating_sub(1)));
        Duration::try_from_secs_f64(self.initial_interval.as_secs_f64() * factor)
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token_uri: String,
}

/// Client settings for a Spring Cloud Config server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigServerSettings {
    pub enabled: bool,
    pub uris: Vec<String>,
    pub name: String,
    pub environment: String,
    pub label: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub fail_fast: bool,
    pub timeout: Duration,
    pub validate_certificates: bool,
    pub retry: RetrySettings,
    pub oauth: Option<OAuthCredentials>,
}

fn key(suffix: &str) -> String {
    format!("{}:{}", PREFIX, suffix)
}

impl ConfigServerSettings {
    pub fn from_settings(settings: &Settings, default_name: &str, environment: &str) -> Result<Self> {
        let name = settings
            .get(&key("name"))
            .or_else(|| settings.get("spring:application:name"))
            .or_else(|| settings.get("vcap:application:application_name"))
            .or_else(|| settings.get("vcap:application:name"))
            .unwrap_or(default_name)
            .to_string();

        let retry_defaults = RetrySettings::default();
        let retry = RetrySettings {
            enabled: settings.get_bool(&key("retry:enabled"))?.unwrap_or(false),
            max_attempts: settings
                .get_parsed(&key("retry:maxAttempts"))?
                .unwrap_or(retry_defaults.max_attempts),
            initial_interval: settings
                .get_parsed(&key("retry:initialInterval"))?
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.initial_interval),
            multiplier: settings
                .get_parsed(&key("retry:multiplier"))?
                .unwrap_or(retry_defaults.multiplier),
            max_interval: settings
                .get_parsed(&key("retry:maxInterval"))?
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.max_interval),
        };

        let mut config = Self {
            enabled: settings.get_bool(&key("enabled"))?.unwrap_or(true),
            uris: split_uris(settings.get_or(&key("uri"), DEFAULT_URI)),
            name,
            environment: settings.get_or(&key("env"), environment).to_string(),
            label: settings
                .get(&key("label"))
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string),
            username: settings.get(&key("username")).map(str::to_string),
            password: settings.get(&key("password")).map(str::to_string),
            fail_fast: settings.get_bool(&key("failFast"))?.unwrap_or(false),
            timeout: Duration::from_millis(
                settings
                    .get_parsed(&key("timeout"))?
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            validate_certificates: settings
                .get_bool(&key("validate_certificates"))?
                .unwrap_or(true),
            retry,
            oauth: None,
        };

        config.apply_service_binding(settings);
        Ok(config)
    }

    /// A bound config-server service overrides the URI and supplies OAuth credentials.
    fn apply_service_binding(&mut self, settings: &Settings) {
        let Some(label) = settings
            .child_keys("vcap:services")
            .into_iter()
            .find(|label| label.contains("config-server"))
        else {
            return;
        };

        let credentials = settings.section(&format!("vcap:services:{}:0:credentials", label));
        if let Some(uri) = credentials.get("uri") {
            tracing::debug!("using config server bound as '{}'", label);
            self.uris = split_uris(uri);
        }

        if let (Some(client_id), Some(client_secret), Some(access_token_uri)) = (
            credentials.get("client_id"),
            credentials.get("client_secret"),
            credentials.get("access_token_uri"),
        ) {
            self.oauth = Some(OAuthCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                access_token_uri: access_token_uri.to_string(),
            });
        }
    }

    /// `{uri}/{name}/{environment}[/{label}]`; a `/` in the label is sent as `(_)`.
    pub fn request_url(&self, base: &str) -> Result<Url> {
        let mut url = Url::parse(base).map_err(|e| BootcampError::InvalidConfigValueError {
            field: key("uri"),
            value: base.to_string(),
            reason: e.to_string(),
        })?;

        {
            let mut segments =
                url.path_segments_mut()
                    .map_err(|_| BootcampError::InvalidConfigValueError {
                        field: key("uri"),
                        value: base.to_string(),
                        reason: "URI cannot be a base".to_string(),
                    })?;
            segments.pop_if_empty().push(&self.name).push(&self.environment);
            if let Some(label) = &self.label {
                segments.push(&label.replace('/', "(_)"));
            }
        }

        Ok(url)
    }
}

fn split_uris(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

impl Validate for ConfigServerSettings {
    fn validate(&self) -> Result<()> {
        if self.uris.is_empty() {
            return Err(BootcampError::MissingConfigError { field: key("uri") });
        }
        for uri in &self.uris {
            validation::validate_url(&key("uri"), uri)?;
        }
        validation::validate_non_empty_string(&key("name"), &self.name)?;
        validation::validate_positive_number(&key("timeout"), self.timeout.as_millis() as u64, 1)?;
        validation::validate_positive_number(
            &key("retry:maxAttempts"),
            u64::from(self.retry.max_attempts),
            1,
        )?;
        let multiplier = self.retry.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(BootcampError::InvalidConfigValueError {
                field: key("retry:multiplier"),
                value: multiplier.to_string(),
                reason: "must be a finite number of at least 1".to_string(),
            });
        }
        if let Some(oauth) = &self.oauth {
            validation::validate_url("access_token_uri", &oauth.access_token_uri)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertySource {
    pub name: String,
    #[serde(default)]
    pub source: serde_json::Map<String, serde_json::Value>,
}

/// Body returned by `GET /{name}/{profile}[/{label}]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEnvironment {
    pub name: String,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, rename = "propertySources")]
    pub property_sources: Vec<PropertySource>,
}

impl ConfigEnvironment {
    /// Sources arrive highest precedence first, so they are applied in reverse.
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::new();
        for source in self.property_sources.iter().rev() {
            for (name, value) in &source.source {
                settings.merge(Settings::from_json(name, value));
            }
        }
        settings
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct ConfigServerClient {
    settings: ConfigServerSettings,
    http: Client,
}

impl ConfigServerClient {
    pub fn new(settings: ConfigServerSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.validate_certificates)
            .build()?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &ConfigServerSettings {
        &self.settings
    }

    /// Loads remote configuration, honoring fail-fast and retry settings.
    pub async fn fetch(&self) -> Result<Settings> {
        let attempts = if self.settings.fail_fast && self.settings.retry.enabled {
            self.settings.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        let error = loop {
            match self.fetch_once().await {
                Ok(Some(environment)) => {
                    let settings = environment.to_settings();
                    tracing::info!(
                        "loaded {} settings for {}/{} from config server (version {})",
                        settings.len(),
                        self.settings.name,
                        self.settings.environment,
                        environment.version.as_deref().unwrap_or("-")
                    );
                    return Ok(settings);
                }
                Ok(None) => {
                    tracing::warn!(
                        "config server has no configuration for {}/{}",
                        self.settings.name,
                        self.settings.environment
                    );
                    return Ok(Settings::new());
                }
                Err(e) if attempt < attempts => {
                    let delay = self.settings.retry.delay(attempt);
                    tracing::warn!(
                        "config server attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => break e,
            }
        };

        if self.settings.fail_fast {
            tracing::error!("could not locate configuration: {}", error);
            Err(error)
        } else {
            tracing::warn!("could not locate configuration, continuing without it: {}", error);
            Ok(Settings::new())
        }
    }

    async fn fetch_once(&self) -> Result<Option<ConfigEnvironment>> {
        let token = match &self.settings.oauth {
            Some(oauth) => Some(self.access_token(oauth).await?),
            None => None,
        };

        let mut last_error = None;
        for base in &self.settings.uris {
            let url = self.settings.request_url(base)?;
            tracing::debug!("fetching configuration from {}", url);

            let mut request = self
                .http
                .get(url.clone())
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(username) = &self.settings.username {
                request = request.basic_auth(username, self.settings.password.as_deref());
            }
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(response) if response.status().is_success() => {
                    return Ok(Some(response.json::<ConfigEnvironment>().await?));
                }
                Ok(response) => {
                    last_error = Some(BootcampError::ConfigServerError {
                        uri: base.clone(),
                        message: format!("unexpected status {}", response.status()),
                    });
                }
                Err(e) => {
                    last_error = Some(BootcampError::ConfigServerError {
                        uri: base.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BootcampError::MissingConfigError { field: key("uri") }))
    }

    async fn access_token(&self, oauth: &OAuthCredentials) -> Result<String> {
        let response = self
            .http
            .post(&oauth.access_token_uri)
            .basic_auth(&oauth.client_id, Some(&oauth.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BootcampError::ConfigServerError {
                uri: oauth.access_token_uri.clone(),
                message: format!("token request returned {}", response.status()),
            });
        }
        Ok(response.json::<TokenResponse>().await?.access_token)
    }
}

/// Externalized configuration from a config server, resolved against earlier layers.
#[derive(Debug, Clone)]
pub struct ConfigServerSource {
    default_name: String,
    environment: String,
}

impl ConfigServerSource {
    pub fn new(default_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
            environment: environment.into(),
        }
    }
}

#[async_trait]
impl ConfigSource for ConfigServerSource {
    fn name(&self) -> &str {
        "config-server"
    }

    async fn load(&self, current: &Settings) -> Result<Settings> {
        let settings =
            ConfigServerSettings::from_settings(current, &self.default_name, &self.environment)?;
        if !settings.enabled {
            tracing::debug!("config server client disabled");
            return Ok(Settings::new());
        }
        settings.validate()?;
        ConfigServerClient::new(settings)?.fetch().await
    }
}

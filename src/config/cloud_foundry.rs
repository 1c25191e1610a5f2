use crate::config::settings::Settings;
use crate::domain::ports::ConfigSource;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const VCAP_APPLICATION: &str = "VCAP_APPLICATION";
pub const VCAP_SERVICES: &str = "VCAP_SERVICES";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VcapApplication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub space_name: Option<String>,
    #[serde(default)]
    pub uris: Vec<String>,
    #[serde(default)]
    pub application_uris: Vec<String>,
    #[serde(default)]
    pub instance_index: Option<u32>,
}

impl VcapApplication {
    pub fn app_name(&self) -> Option<&str> {
        self.application_name.as_deref().or(self.name.as_deref())
    }

    pub fn routes(&self) -> &[String] {
        if self.application_uris.is_empty() {
            &self.uris
        } else {
            &self.application_uris
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub credentials: serde_json::Value,
}

/// Cloud platform discovery from the VCAP environment.
#[derive(Debug, Clone, Default)]
pub struct CloudFoundrySource {
    vcap_application: Option<String>,
    vcap_services: Option<String>,
}

impl CloudFoundrySource {
    pub fn from_process() -> Self {
        Self {
            vcap_application: std::env::var(VCAP_APPLICATION).ok(),
            vcap_services: std::env::var(VCAP_SERVICES).ok(),
        }
    }

    pub fn from_env(vars: &HashMap<String, String>) -> Self {
        Self {
            vcap_application: vars.get(VCAP_APPLICATION).cloned(),
            vcap_services: vars.get(VCAP_SERVICES).cloned(),
        }
    }

    pub fn is_running_on_cloud_foundry(&self) -> bool {
        self.vcap_application.is_some()
    }

    pub fn application(&self) -> Result<Option<VcapApplication>> {
        match self.vcap_application.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(serde_json::from_str(raw)?)),
            _ => Ok(None),
        }
    }

    /// Bindings grouped by service label.
    pub fn services(&self) -> Result<HashMap<String, Vec<ServiceBinding>>> {
        match self.vcap_services.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(raw)?),
            _ => Ok(HashMap::new()),
        }
    }
}

#[async_trait]
impl ConfigSource for CloudFoundrySource {
    fn name(&self) -> &str {
        "cloud-foundry"
    }

    async fn load(&self, _current: &Settings) -> Result<Settings> {
        let mut settings = Settings::new();

        if let Some(raw) = self.vcap_application.as_deref().filter(|r| !r.trim().is_empty()) {
            let value: serde_json::Value = serde_json::from_str(raw)?;
            settings.merge(Settings::from_json("vcap:application", &value));
        }

        if let Some(raw) = self.vcap_services.as_deref().filter(|r| !r.trim().is_empty()) {
            let value: serde_json::Value = serde_json::from_str(raw)?;
            settings.merge(Settings::from_json("vcap:services", &value));
        }

        if !settings.is_empty() {
            tracing::info!("discovered {} cloud platform settings", settings.len());
        }
        Ok(settings)
    }
}

use crate::config::settings::Settings;
use crate::domain::ports::ConfigSource;
use crate::utils::error::{BootcampError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Local settings file (`appsettings.toml` and friends).
#[derive(Debug, Clone)]
pub struct TomlFileSource {
    path: PathBuf,
    optional: bool,
    name: String,
}

impl TomlFileSource {
    pub fn new<P: AsRef<Path>>(path: P, optional: bool) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("toml:{}", path.display());
        Self {
            path,
            optional,
            name,
        }
    }

    /// Loads settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let content = std::fs::read_to_string(&path).map_err(BootcampError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Settings> {
        let processed_content = Self::substitute_env_vars(content);
        let value: toml::Value = toml::from_str(&processed_content)?;
        Ok(Settings::from_toml("", &value))
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }
}

#[async_trait]
impl ConfigSource for TomlFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, _current: &Settings) -> Result<Settings> {
        if self.optional && !self.path.exists() {
            tracing::debug!("optional settings file {} not found", self.path.display());
            return Ok(Settings::new());
        }
        let settings = Self::from_file(&self.path)?;
        tracing::debug!(
            "loaded {} settings from {}",
            settings.len(),
            self.path.display()
        );
        Ok(settings)
    }
}

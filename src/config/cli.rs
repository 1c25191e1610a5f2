use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENVIRONMENT: &str = "Production";

/// Arguments shared by both launchers.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
pub struct LauncherArgs {
    /// Directory holding appsettings.toml and appsettings.{environment}.toml
    #[arg(long, default_value = ".")]
    pub config_dir: String,

    /// Hosting environment name (Development, Staging, Production)
    #[arg(long, env = "BOOTCAMP_ENVIRONMENT", default_value = DEFAULT_ENVIRONMENT)]
    pub environment: String,

    /// Address to listen on when the platform does not assign a port
    #[arg(long)]
    pub urls: Option<String>,

    /// Configuration override in key=value form; may be repeated
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Default for LauncherArgs {
    fn default() -> Self {
        Self {
            config_dir: ".".to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            urls: None,
            overrides: Vec::new(),
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_overrides() {
        let args = LauncherArgs::parse_from([
            "bootcamp-webapi",
            "--environment",
            "Development",
            "--set",
            "database:url=sqlite::memory:",
            "--set",
            "spring:cloud:config:failFast=true",
            "--urls",
            "http://127.0.0.1:7000",
        ]);
        assert_eq!(args.environment, "Development");
        assert_eq!(args.overrides.len(), 2);
        assert_eq!(args.urls.as_deref(), Some("http://127.0.0.1:7000"));
        assert_eq!(args.config_dir, ".");
    }
}

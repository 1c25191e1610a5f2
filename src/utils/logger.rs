use crate::utils::error::{BootcampError, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Sinks and level for the process-wide subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerOptions {
    pub level: String,
    pub console: bool,
    pub debug_output: bool,
    pub json: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            debug_output: true,
            json: false,
        }
    }
}

impl LoggerOptions {
    /// Trace level with console and debug sinks, used before any configuration is loaded.
    pub fn trace() -> Self {
        Self {
            level: "trace".to_string(),
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose && self.level != "trace" {
            self.level = "debug".to_string();
        }
        self
    }

    /// Level the debug sink records at; unparseable levels fall back to info.
    pub fn sink_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "bootcamp_services={lvl},bootcamp_webapi={lvl},bootcamp_store={lvl},tower_http={lvl},info",
                lvl = self.level
            ))
        })
    }
}

pub fn init_logger(options: &LoggerOptions) -> Result<()> {
    let console = options.console.then(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false);
        if options.json {
            layer.json().boxed()
        } else {
            layer.compact().boxed()
        }
    });

    // Debug sink only exists in debug builds.
    let debug = (options.debug_output && cfg!(debug_assertions)).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(options.sink_level())
    });

    tracing_subscriber::registry()
        .with(options.filter())
        .with(console)
        .with(debug)
        .try_init()
        .map_err(|e| BootcampError::config(format!("logger already initialized: {}", e)))
}

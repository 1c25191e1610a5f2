use crate::config::settings::Settings;
use crate::utils::error::{BootcampError, Result};
use crate::utils::validation::{self, Validate};
use failsafe::failure_policy::FailurePolicy;
use failsafe::futures::CircuitBreaker;
use failsafe::{Config, StateMachine};
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

pub const DEFAULT_COMMAND: &str = "default";

pub type CommandCircuitBreaker = StateMachine<ErrorPercentageWindow, ()>;

/// Trips once at least `volume_threshold` calls were seen in the rolling window
/// and the failing share reaches `error_threshold_percentage`.
#[derive(Debug, Clone)]
pub struct ErrorPercentageWindow {
    window: Duration,
    volume_threshold: u32,
    error_threshold_percentage: u32,
    sleep_window: Duration,
    outcomes: VecDeque<(Instant, bool)>,
}

impl ErrorPercentageWindow {
    pub fn new(settings: &CommandSettings) -> Self {
        Self {
            window: settings.rolling_window,
            volume_threshold: settings.request_volume_threshold,
            error_threshold_percentage: settings.error_threshold_percentage,
            sleep_window: settings.sleep_window,
            outcomes: VecDeque::new(),
        }
    }

    fn record(&mut self, success: bool) {
        let now = Instant::now();
        while let Some((at, _)) = self.outcomes.front() {
            if now.duration_since(*at) > self.window {
                self.outcomes.pop_front();
            } else {
                break;
            }
        }
        self.outcomes.push_back((now, success));
    }

    fn should_trip(&self) -> bool {
        let total = self.outcomes.len() as u64;
        if total < u64::from(self.volume_threshold) {
            return false;
        }
        let failures = self.outcomes.iter().filter(|(_, ok)| !ok).count() as u64;
        failures * 100 >= u64::from(self.error_threshold_percentage) * total
    }
}

impl FailurePolicy for ErrorPercentageWindow {
    fn record_success(&mut self) {
        self.record(true);
    }

    fn mark_dead_on_failure(&mut self) -> Option<Duration> {
        self.record(false);
        self.should_trip().then_some(self.sleep_window)
    }

    fn revived(&mut self) {
        self.outcomes.clear();
    }
}

/// Per-command policy, read from `hystrix:command:{key}:*` with `default` as fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSettings {
    pub key: String,
    pub timeout_enabled: bool,
    pub timeout: Duration,
    pub circuit_enabled: bool,
    pub request_volume_threshold: u32,
    pub error_threshold_percentage: u32,
    pub sleep_window: Duration,
    pub force_open: bool,
    pub rolling_window: Duration,
}

impl CommandSettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout_enabled: true,
            timeout: Duration::from_millis(1000),
            circuit_enabled: true,
            request_volume_threshold: 20,
            error_threshold_percentage: 50,
            sleep_window: Duration::from_millis(5000),
            force_open: false,
            rolling_window: Duration::from_millis(10_000),
        }
    }

    pub fn from_settings(settings: &Settings, command_key: &str) -> Result<Self> {
        let lookup = CommandLookup {
            key: command_key,
            command: settings.section(&format!("hystrix:command:{}", command_key)),
            defaults: settings.section(&format!("hystrix:command:{}", DEFAULT_COMMAND)),
        };
        let base = Self::new(command_key);
        let parsed_u64 = |path: &str| lookup.parsed::<u64>(path);
        let parsed_bool = |path: &str| lookup.flag(path);

        let settings = Self {
            key: command_key.to_string(),
            timeout_enabled: parsed_bool("execution:timeout:enabled")?
                .unwrap_or(base.timeout_enabled),
            timeout: parsed_u64("execution:isolation:thread:timeoutInMilliseconds")?
                .map(Duration::from_millis)
                .unwrap_or(base.timeout),
            circuit_enabled: parsed_bool("circuitBreaker:enabled")?.unwrap_or(base.circuit_enabled),
            request_volume_threshold: parsed_u64("circuitBreaker:requestVolumeThreshold")?
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(base.request_volume_threshold),
            error_threshold_percentage: parsed_u64("circuitBreaker:errorThresholdPercentage")?
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(base.error_threshold_percentage),
            sleep_window: parsed_u64("circuitBreaker:sleepWindowInMilliseconds")?
                .map(Duration::from_millis)
                .unwrap_or(base.sleep_window),
            force_open: parsed_bool("circuitBreaker:forceOpen")?.unwrap_or(base.force_open),
            rolling_window: parsed_u64("metrics:rollingStats:timeInMilliseconds")?
                .map(Duration::from_millis)
                .unwrap_or(base.rolling_window),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for CommandSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_range(
            "circuitBreaker:errorThresholdPercentage",
            self.error_threshold_percentage,
            0,
            100,
        )?;
        validation::validate_positive_number(
            "circuitBreaker:requestVolumeThreshold",
            u64::from(self.request_volume_threshold),
            1,
        )?;
        validation::validate_positive_number(
            "metrics:rollingStats:timeInMilliseconds",
            self.rolling_window.as_millis() as u64,
            1,
        )?;
        if self.timeout_enabled {
            validation::validate_positive_number(
                "execution:isolation:thread:timeoutInMilliseconds",
                self.timeout.as_millis() as u64,
                1,
            )?;
        }
        Ok(())
    }
}

struct CommandLookup<'a> {
    key: &'a str,
    command: Settings,
    defaults: Settings,
}

impl CommandLookup<'_> {
    fn field(&self, path: &str) -> String {
        format!("hystrix:command:{}:{}", self.key, path)
    }

    fn parsed<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.command.get_parsed(path) {
            Ok(None) => self.defaults.get_parsed(path),
            other => other,
        }
        .map_err(|e| match e {
            BootcampError::InvalidConfigValueError { value, reason, .. } => {
                BootcampError::InvalidConfigValueError {
                    field: self.field(path),
                    value,
                    reason,
                }
            }
            other => other,
        })
    }

    fn flag(&self, path: &str) -> Result<Option<bool>> {
        match self.command.get_bool(path)? {
            Some(value) => Ok(Some(value)),
            None => self.defaults.get_bool(path),
        }
    }
}

/// A named operation guarded by a timeout and a circuit breaker.
pub struct ProtectedCommand {
    settings: CommandSettings,
    breaker: CommandCircuitBreaker,
}

impl ProtectedCommand {
    pub fn new(settings: CommandSettings) -> Self {
        let breaker = Config::new()
            .failure_policy(ErrorPercentageWindow::new(&settings))
            .build();
        Self { settings, breaker }
    }

    pub fn from_settings(settings: &Settings, command_key: &str) -> Result<Self> {
        Ok(Self::new(CommandSettings::from_settings(settings, command_key)?))
    }

    pub fn key(&self) -> &str {
        &self.settings.key
    }

    pub fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.settings.force_open || (self.settings.circuit_enabled && !self.breaker.is_call_permitted())
    }

    pub async fn execute<T, F, Fut>(&self, run: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.settings.force_open {
            return Err(self.rejected());
        }

        let timed = self.with_timeout(run());
        if !self.settings.circuit_enabled {
            return timed.await;
        }

        match self.breaker.call(timed).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(self.rejected()),
        }
    }

    /// Runs the command; any failure, rejection or timeout is replaced by `fallback`.
    pub async fn execute_with_fallback<T, F, Fut, FB>(&self, run: F, fallback: FB) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce(BootcampError) -> Result<T>,
    {
        match self.execute(run).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!("{} failed, serving fallback: {}", self.settings.key, e);
                fallback(e)
            }
        }
    }

    async fn with_timeout<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if !self.settings.timeout_enabled {
            return fut.await;
        }
        match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BootcampError::CommandTimeout {
                command: self.settings.key.clone(),
                timeout_ms: self.settings.timeout.as_millis() as u64,
            }),
        }
    }

    fn rejected(&self) -> BootcampError {
        BootcampError::CircuitOpen {
            command: self.settings.key.clone(),
        }
    }
}

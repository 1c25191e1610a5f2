use crate::core::host::HostContext;
use crate::domain::model::HealthReport;
use crate::utils::monitor::ProcessMonitor;
use std::collections::BTreeMap;

pub fn health_report(
    context: &HostContext,
    monitor: &ProcessMonitor,
    circuits: BTreeMap<String, String>,
) -> HealthReport {
    let stats = monitor.stats();
    let status = if circuits.values().any(|state| state == "open") {
        "DEGRADED"
    } else {
        "UP"
    };

    HealthReport {
        status: status.to_string(),
        application: context.application_name.clone(),
        environment: context.environment.clone(),
        started_at: monitor.started_at(),
        uptime_seconds: stats.uptime.as_secs(),
        memory_mb: stats.memory_usage_mb,
        circuits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;
    use std::sync::Arc;

    fn context() -> HostContext {
        HostContext {
            settings: Arc::new(Settings::new()),
            application_name: "bootcamp-store".to_string(),
            environment: "Development".to_string(),
        }
    }

    #[test]
    fn test_open_circuit_degrades_status() {
        let monitor = ProcessMonitor::new();
        let report = health_report(&context(), &monitor, BTreeMap::new());
        assert_eq!(report.status, "UP");

        let circuits = BTreeMap::from([("ProductService".to_string(), "open".to_string())]);
        let report = health_report(&context(), &monitor, circuits);
        assert_eq!(report.status, "DEGRADED");
        assert_eq!(report.application, "bootcamp-store");
    }
}

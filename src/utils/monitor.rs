use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct ProcessStats {
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub uptime: Duration,
}

/// Tracks process memory and uptime for the health endpoints.
#[derive(Clone)]
pub struct ProcessMonitor {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
    started: Instant,
    started_at: DateTime<Utc>,
    peak_memory: Arc<Mutex<u64>>,
}

impl ProcessMonitor {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("process stats unavailable: {}", e);
                None
            }
        };

        Self {
            system: Arc::new(Mutex::new(System::new())),
            pid,
            started: Instant::now(),
            started_at: Utc::now(),
            peak_memory: Arc::new(Mutex::new(0)),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stats(&self) -> ProcessStats {
        let memory_mb = self.current_memory_mb().unwrap_or(0);

        let peak_memory_mb = match self.peak_memory.lock() {
            Ok(mut peak) => {
                if memory_mb > *peak {
                    *peak = memory_mb;
                }
                *peak
            }
            Err(_) => memory_mb,
        };

        ProcessStats {
            memory_usage_mb: memory_mb,
            peak_memory_mb,
            uptime: self.started.elapsed(),
        }
    }

    fn current_memory_mb(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = system.process(pid)?;
        Some(process.memory() / 1024 / 1024)
    }

    pub fn log_stats(&self, phase: &str) {
        let stats = self.stats();
        tracing::debug!(
            "{} - Memory: {}MB, Peak: {}MB, Uptime: {:?}",
            phase,
            stats.memory_usage_mb,
            stats.peak_memory_mb,
            stats.uptime
        );
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_never_below_current() {
        let monitor = ProcessMonitor::new();
        let stats = monitor.stats();
        assert!(stats.peak_memory_mb >= stats.memory_usage_mb);
        assert!(monitor.started_at() <= Utc::now());
    }
}

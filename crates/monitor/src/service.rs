//! [`MonitorService`]: load the registry, sleep until the next daily check
//! time, sweep every active alarm, repeat.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use loggerwatch_rules::{AlarmOutcome, AlarmRegistry, DailySchedule, LoadReport};
use loggerwatch_telemetry::Reading;

use crate::check::{AlarmChecker, TestReport};
use crate::error::MonitorError;

/// Display format for check instants.
pub const NEXT_CHECK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    Loaded,
    Sleeping,
    Sweeping,
    Terminated,
}

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub checked: usize,
    pub triggered: usize,
    pub stale: usize,
    pub no_data: usize,
    pub normal: usize,
    pub notified: usize,
    pub failed: usize,
    /// Stopped early at an alarm boundary because shutdown was requested.
    pub interrupted: bool,
}

impl SweepReport {
    fn record(&mut self, outcome: &AlarmOutcome, notified: bool) {
        self.checked += 1;
        match outcome {
            AlarmOutcome::Triggered { .. } => self.triggered += 1,
            AlarmOutcome::Stale { .. } => self.stale += 1,
            AlarmOutcome::NoData => self.no_data += 1,
            AlarmOutcome::Normal { .. } => self.normal += 1,
        }
        if notified {
            self.notified += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestFailure {
    pub alarm_id: String,
    pub error: String,
}

/// Dry run over every active alarm.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestAllReport {
    pub results: Vec<TestReport>,
    pub failed: Vec<TestFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub phase: MonitorPhase,
    pub next_check: Option<String>,
    pub check_times: Vec<String>,
    pub last_sweep: Option<SweepReport>,
}

struct State {
    phase: MonitorPhase,
    next_check: Option<DateTime<Local>>,
    last_sweep: Option<SweepReport>,
}

/// The scheduled monitor.
///
/// Owns no alarms: it reads the shared [`AlarmRegistry`] at sweep time.
/// Alarms are checked one at a time; a failing alarm is logged and the
/// sweep moves on.
pub struct MonitorService {
    registry: Arc<AlarmRegistry>,
    checker: AlarmChecker,
    schedule: DailySchedule,
    /// Re-read the store before each sweep (when another process owns writes).
    reload_before_sweep: bool,
    state: RwLock<State>,
    logger_names: RwLock<HashMap<String, String>>,
    shutdown: watch::Sender<bool>,
}

impl MonitorService {
    pub fn new(registry: Arc<AlarmRegistry>, checker: AlarmChecker, schedule: DailySchedule) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            checker,
            schedule,
            reload_before_sweep: false,
            state: RwLock::new(State {
                phase: MonitorPhase::Idle,
                next_check: None,
                last_sweep: None,
            }),
            logger_names: RwLock::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn with_reload_before_sweep(mut self, reload: bool) -> Self {
        self.reload_before_sweep = reload;
        self
    }

    pub fn registry(&self) -> &Arc<AlarmRegistry> {
        &self.registry
    }

    fn set_phase(&self, phase: MonitorPhase) {
        self.state.write().expect("monitor state lock poisoned").phase = phase;
    }

    pub fn phase(&self) -> MonitorPhase {
        self.state.read().expect("monitor state lock poisoned").phase
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load the registry from its store. `Idle -> Loaded`.
    pub fn load(&self) -> Result<LoadReport, MonitorError> {
        let report = self.registry.load()?;
        self.set_phase(MonitorPhase::Loaded);
        Ok(report)
    }

    /// Mark the registry as already loaded by the caller.
    pub fn mark_loaded(&self) {
        self.set_phase(MonitorPhase::Loaded);
    }

    /// Ask [`run`](Self::run) to stop. A sleeping monitor exits at once; a
    /// sweeping one finishes the alarm in hand first.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called, at once
    /// if it already was.
    pub async fn wait_for_shutdown(&self) {
        let mut shutdown = self.shutdown.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    /// Run until [`shutdown`](Self::shutdown). Loads the registry first if
    /// nobody has.
    ///
    /// Each wake target is computed strictly after the previous one, so a
    /// slot is never swept twice even if the clock steps backwards.
    pub async fn run(&self) -> Result<(), MonitorError> {
        let mut shutdown = self.shutdown.subscribe();

        if self.phase() == MonitorPhase::Idle {
            self.load()?;
        }
        if let Err(e) = self.refresh_logger_names().await {
            warn!(error = %e, "could not resolve logger names, using serials");
        }
        info!(check_times = ?self.check_times(), "monitor started");

        let mut last_target: Option<DateTime<Local>> = None;
        while !self.is_shutting_down() {
            let now = Local::now();
            let from = match last_target {
                Some(t) if t > now => t,
                _ => now,
            };
            let next = self.schedule.next_after(&from)?;
            {
                let mut state = self.state.write().expect("monitor state lock poisoned");
                state.phase = MonitorPhase::Sleeping;
                state.next_check = Some(next);
            }
            let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
            info!(next_check = %next.format(NEXT_CHECK_FORMAT), wait_secs = wait.as_secs(), "sleeping until next check");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {
                    info!("shutdown requested while sleeping");
                    break;
                }
            }

            last_target = Some(next);
            self.sweep().await;
        }

        self.set_phase(MonitorPhase::Terminated);
        info!("monitor terminated");
        Ok(())
    }

    /// Check every active alarm once, sequentially.
    ///
    /// Per-alarm errors are logged and counted. Shutdown is honoured
    /// between alarms. A registry left dirty by an earlier failed flush is
    /// retried at the end.
    pub async fn sweep(&self) -> SweepReport {
        self.set_phase(MonitorPhase::Sweeping);
        let mut report = SweepReport {
            started_at: Some(Local::now().naive_local()),
            ..SweepReport::default()
        };

        if self.reload_before_sweep {
            match self.registry.load() {
                Ok(_) => self.apply_logger_names(),
                Err(e) => warn!(error = %e, "could not reload alarm store, sweeping the previous set"),
            }
        }

        let alarms = self.registry.active_alarms();
        info!(alarms = alarms.len(), "sweep started");

        for alarm in &alarms {
            if self.is_shutting_down() {
                info!(remaining = alarms.len() - report.checked - report.failed, "shutdown requested, ending sweep early");
                report.interrupted = true;
                break;
            }
            match self.checker.check(alarm, Local::now().naive_local()).await {
                Ok(result) => report.record(&result.outcome, result.notified),
                Err(e) => {
                    warn!(alarm_id = %alarm.id(), error = %e, "alarm check failed, skipped this cycle");
                    report.failed += 1;
                }
            }
        }

        if let Err(e) = self.registry.persist_if_dirty() {
            error!(error = %e, "alarm store still not flushed");
        }

        report.finished_at = Some(Local::now().naive_local());
        info!(
            checked = report.checked,
            triggered = report.triggered,
            stale = report.stale,
            no_data = report.no_data,
            notified = report.notified,
            failed = report.failed,
            "sweep finished"
        );
        self.state.write().expect("monitor state lock poisoned").last_sweep = Some(report.clone());
        report
    }

    // ── Logger names ────────────────────────────────────────────────

    /// Refetch serial to name from the vendor API and attach them to the
    /// alarms. Returns how many names are known.
    pub async fn refresh_logger_names(&self) -> Result<usize, MonitorError> {
        let names = self.checker.telemetry().logger_names().await?;
        let count = names.len();
        *self.logger_names.write().expect("logger names lock poisoned") = names;
        self.apply_logger_names();
        debug!(count, "logger names refreshed");
        Ok(count)
    }

    fn apply_logger_names(&self) {
        let names = self.logger_names.read().expect("logger names lock poisoned");
        self.registry.set_logger_names(&names);
    }

    /// Name of every logger that has an alarm, falling back to the serial.
    pub fn alarmed_logger_names(&self) -> BTreeMap<String, String> {
        let names = self.logger_names.read().expect("logger names lock poisoned");
        self.registry
            .serials()
            .into_iter()
            .map(|serial| {
                let name = names.get(&serial).cloned().unwrap_or_else(|| serial.clone());
                (serial, name)
            })
            .collect()
    }

    pub fn logger_name(&self, serial: &str) -> Option<String> {
        self.logger_names
            .read()
            .expect("logger names lock poisoned")
            .get(serial)
            .cloned()
    }

    // ── Operator queries ────────────────────────────────────────────

    pub async fn test_alarm(&self, id: &str) -> Result<TestReport, MonitorError> {
        let alarm = self
            .registry
            .get(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        Ok(self.checker.test(&alarm).await?)
    }

    pub async fn test_all(&self) -> TestAllReport {
        let mut report = TestAllReport::default();
        for alarm in self.registry.active_alarms() {
            match self.checker.test(&alarm).await {
                Ok(result) => report.results.push(result),
                Err(e) => report.failed.push(TestFailure {
                    alarm_id: alarm.id().to_string(),
                    error: e.to_string(),
                }),
            }
        }
        report
    }

    pub async fn current_value(&self, id: &str) -> Result<Option<Reading>, MonitorError> {
        let alarm = self
            .registry
            .get(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        Ok(self.checker.current_value(&alarm).await?)
    }

    /// The pending wake target, or the next slot after now when the loop
    /// is not sleeping.
    pub fn next_check(&self) -> Result<DateTime<Local>, MonitorError> {
        let now = Local::now();
        let pending = self.state.read().expect("monitor state lock poisoned").next_check;
        match pending {
            Some(next) if next > now => Ok(next),
            _ => Ok(self.schedule.next_after(&now)?),
        }
    }

    pub fn check_times(&self) -> Vec<String> {
        self.schedule.times().iter().map(ToString::to_string).collect()
    }

    pub fn status(&self) -> MonitorStatus {
        let next_check = self
            .next_check()
            .ok()
            .map(|t| t.format(NEXT_CHECK_FORMAT).to_string());
        let state = self.state.read().expect("monitor state lock poisoned");
        MonitorStatus {
            phase: state.phase,
            next_check,
            check_times: self.check_times(),
            last_sweep: state.last_sweep.clone(),
        }
    }
}

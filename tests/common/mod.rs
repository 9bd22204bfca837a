//! Fakes for the driver and OS seams shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use scanfleet::escalation::{ProcessError, ProcessInfo, Signal};
use scanfleet::{
    BrowserController, BrowserLauncher, DriverError, FleetConfig, ProcessControl, ScanError,
    ScanStrategy, SiteBatch, Surface, SurfaceMetrics,
};
use serde_json::{Value, json};

// =============================================================================
// Process table
// =============================================================================

#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub parent: Option<u32>,
    pub command_line: String,
    pub alive: bool,
    /// Survives SIGTERM, dies only to SIGKILL
    pub ignores_term: bool,
    /// Survives every signal
    pub immortal: bool,
    pub rss: u64,
}

#[derive(Default)]
pub struct FakeProcesses {
    table: Mutex<HashMap<u32, FakeProcess>>,
    signals: Mutex<Vec<(u32, Signal)>>,
    pattern_kills: Mutex<Vec<String>>,
    pub enumeration_fails: AtomicBool,
    /// Pattern kill reports success without killing anything
    pub pattern_kill_ineffective: AtomicBool,
}

impl FakeProcesses {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spawn(&self, pid: u32, parent: Option<u32>, command_line: &str) {
        self.table.lock().insert(
            pid,
            FakeProcess {
                parent,
                command_line: command_line.to_string(),
                alive: true,
                ignores_term: false,
                immortal: false,
                rss: 100 * 1024 * 1024,
            },
        );
    }

    pub fn update(&self, pid: u32, f: impl FnOnce(&mut FakeProcess)) {
        if let Some(process) = self.table.lock().get_mut(&pid) {
            f(process);
        }
    }

    pub fn exit(&self, pid: u32) {
        self.update(pid, |p| p.alive = false);
    }

    /// Kill `pid` and everything below it, as a browser exit would.
    pub fn exit_tree(&self, root: u32) {
        let mut table = self.table.lock();
        let mut stack = vec![root];
        while let Some(pid) = stack.pop() {
            if let Some(process) = table.get_mut(&pid) {
                process.alive = false;
            }
            stack.extend(
                table
                    .iter()
                    .filter(|(_, p)| p.parent == Some(pid) && p.alive)
                    .map(|(child, _)| *child),
            );
        }
    }

    pub fn alive_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .table
            .lock()
            .iter()
            .filter(|(_, p)| p.alive)
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();
        pids
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.signals.lock().clone()
    }

    pub fn pattern_kills(&self) -> Vec<String> {
        self.pattern_kills.lock().clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, ProcessError> {
        if self.enumeration_fails.load(Ordering::SeqCst) {
            return Err(ProcessError::EnumerationFailed("fake table offline".into()));
        }
        Ok(self
            .table
            .lock()
            .iter()
            .filter(|(_, p)| p.alive)
            .map(|(pid, p)| ProcessInfo {
                pid: *pid,
                parent: p.parent,
                command_line: p.command_line.clone(),
            })
            .collect())
    }

    fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        self.signals.lock().push((pid, signal));
        self.update(pid, |p| {
            if !p.immortal && (signal == Signal::Kill || !p.ignores_term) {
                p.alive = false;
            }
        });
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.table.lock().get(&pid).is_some_and(|p| p.alive)
    }

    fn resident_memory(&self, pid: u32) -> Option<u64> {
        self.table.lock().get(&pid).filter(|p| p.alive).map(|p| p.rss)
    }

    fn kill_matching(&self, pattern: &str) -> Result<(), ProcessError> {
        self.pattern_kills.lock().push(pattern.to_string());
        if self.pattern_kill_ineffective.load(Ordering::SeqCst) {
            return Ok(());
        }
        let regex = Regex::new(pattern).map_err(|e| ProcessError::PatternKillFailed(e.to_string()))?;
        for process in self.table.lock().values_mut() {
            if !process.immortal && regex.is_match(&process.command_line) {
                process.alive = false;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Surfaces
// =============================================================================

#[derive(Default)]
pub struct MockSurface {
    pub id: String,
    pub closed: AtomicBool,
    pub close_attempts: AtomicUsize,
    pub close_error: Mutex<Option<DriverError>>,
    /// Close attempts that fail before closes start working
    pub failing_closes: AtomicUsize,
    pub navigate_error: Mutex<Option<DriverError>>,
    pub interception_error: Mutex<Option<DriverError>>,
    pub metrics: Mutex<Option<SurfaceMetrics>>,
}

impl MockSurface {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            ..Self::default()
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.close_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Surface for MockSurface {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        if let Some(err) = self.navigate_error.lock().clone() {
            return Err(err);
        }
        if url.contains("hang") {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value, DriverError> {
        Ok(json!({ "final_url": "https://example.test/", "title": "Example" }))
    }

    async fn set_request_interception(&self, _enabled: bool) -> Result<(), DriverError> {
        match self.interception_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn metrics(&self) -> Result<SurfaceMetrics, DriverError> {
        self.metrics
            .lock()
            .ok_or_else(|| DriverError::from_cdp("Performance.getMetrics not supported"))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.close_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.close_error.lock().clone() {
            return Err(err);
        }
        if self
            .failing_closes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DriverError::from_cdp("Target.closeTarget: request timed out"));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Controller and launcher
// =============================================================================

/// Failure knobs applied to every surface a controller opens
#[derive(Default, Clone)]
pub struct Faults {
    pub version_error: Option<DriverError>,
    pub version_delay: Option<Duration>,
    pub navigate_error: Option<DriverError>,
    pub interception_error: Option<DriverError>,
    pub open_error: Option<DriverError>,
    /// `close()` never returns
    pub close_hangs: bool,
    /// First close of each opened surface fails, leaking it
    pub leak_surfaces: bool,
}

pub struct MockController {
    pub pid: Option<u32>,
    pub connected: AtomicBool,
    pub profile_dir: Option<PathBuf>,
    pub surfaces: Mutex<Vec<Arc<MockSurface>>>,
    pub faults: Mutex<Faults>,
    pub opened: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub disconnects: AtomicUsize,
    processes: Arc<FakeProcesses>,
    next_surface: AtomicUsize,
}

impl MockController {
    /// Controller with a main surface, a browser pid and one renderer child.
    pub fn spawn(processes: &Arc<FakeProcesses>, pid: u32) -> Arc<Self> {
        let controller = Self::build(processes, Some(pid));
        let profile = controller
            .profile_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        let marker = format!("--user-data-dir={profile}");
        processes.spawn(pid, Some(1), &format!("chrome {marker}"));
        processes.spawn(pid + 1, Some(pid), &format!("chrome --type=renderer {marker}"));
        Arc::new(controller)
    }

    /// Connected controller that never reported a process id.
    pub fn without_pid(processes: &Arc<FakeProcesses>) -> Arc<Self> {
        Arc::new(Self::build(processes, None))
    }

    fn build(processes: &Arc<FakeProcesses>, pid: Option<u32>) -> Self {
        let tag = pid.map_or_else(|| "nopid".to_string(), |p| p.to_string());
        Self {
            pid,
            connected: AtomicBool::new(true),
            profile_dir: Some(std::env::temp_dir().join(format!("scanfleet_chrome_mock_{tag}"))),
            surfaces: Mutex::new(vec![MockSurface::new(format!("{tag}-main"))]),
            faults: Mutex::new(Faults::default()),
            opened: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            processes: Arc::clone(processes),
            next_surface: AtomicUsize::new(1),
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock() = faults;
    }

    pub fn add_surface(&self) -> Arc<MockSurface> {
        let n = self.next_surface.fetch_add(1, Ordering::SeqCst);
        let surface = MockSurface::new(format!("{}-{n}", self.pid.unwrap_or(0)));
        self.surfaces.lock().push(Arc::clone(&surface));
        surface
    }

    pub fn open_surface_count(&self) -> usize {
        self.surfaces.lock().iter().filter(|s| !s.is_closed()).count()
    }
}

#[async_trait]
impl BrowserController for MockController {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn profile_dir(&self) -> Option<&Path> {
        self.profile_dir.as_deref()
    }

    async fn version(&self) -> Result<String, DriverError> {
        let faults = self.faults.lock().clone();
        if let Some(delay) = faults.version_delay {
            tokio::time::sleep(delay).await;
        }
        match faults.version_error {
            Some(err) => Err(err),
            None => Ok("HeadlessChrome/130.0.0.0".to_string()),
        }
    }

    async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>, DriverError> {
        Ok(self
            .surfaces
            .lock()
            .iter()
            .filter(|s| !s.is_closed())
            .map(|s| Arc::clone(s) as Arc<dyn Surface>)
            .collect())
    }

    async fn open_surface(&self) -> Result<Arc<dyn Surface>, DriverError> {
        let faults = self.faults.lock().clone();
        if let Some(err) = faults.open_error {
            return Err(err);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let surface = self.add_surface();
        *surface.navigate_error.lock() = faults.navigate_error;
        *surface.interception_error.lock() = faults.interception_error;
        if faults.leak_surfaces {
            surface.failing_closes.store(1, Ordering::SeqCst);
        }
        Ok(surface)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.lock().close_hangs {
            std::future::pending::<()>().await;
        }
        if let Some(pid) = self.pid {
            self.processes.exit_tree(pid);
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

pub struct MockLauncher {
    pub processes: Arc<FakeProcesses>,
    pub launched: Mutex<Vec<Arc<MockController>>>,
    /// Launches that fail before the next one succeeds
    pub failures_remaining: AtomicUsize,
    /// Faults applied to every new controller
    pub faults: Mutex<Faults>,
    next_pid: AtomicU32,
}

impl MockLauncher {
    pub fn new(processes: &Arc<FakeProcesses>) -> Arc<Self> {
        Arc::new(Self {
            processes: Arc::clone(processes),
            launched: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(0),
            faults: Mutex::new(Faults::default()),
            next_pid: AtomicU32::new(1000),
        })
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().len()
    }

    pub fn controller(&self, index: usize) -> Arc<MockController> {
        Arc::clone(&self.launched.lock()[index])
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserController>, DriverError> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DriverError::Launch("no executable".into()));
        }
        let pid = self.next_pid.fetch_add(10, Ordering::SeqCst);
        let controller = MockController::spawn(&self.processes, pid);
        controller.set_faults(self.faults.lock().clone());
        self.launched.lock().push(Arc::clone(&controller));
        Ok(controller)
    }
}

// =============================================================================
// Strategy
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// Records task order and concurrency. URLs containing `fail` fail, URLs
/// containing `crash` fail with a fatal driver error.
pub struct RecordingStrategy {
    pub delay: Duration,
    pub events: Mutex<Vec<Event>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl RecordingStrategy {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn peak(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Marks a scan as finished when it returns or when its future is dropped
/// by the task deadline.
struct InFlight<'a> {
    strategy: &'a RecordingStrategy,
    url: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.strategy.events.lock().push(Event::End(std::mem::take(&mut self.url)));
        self.strategy.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScanStrategy for RecordingStrategy {
    async fn scan(&self, surface: &dyn Surface, url: &str, _batch: &SiteBatch) -> Result<Value, ScanError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events.lock().push(Event::Start(url.to_string()));
        let _in_flight = InFlight {
            strategy: self,
            url: url.to_string(),
        };

        tokio::time::sleep(self.delay).await;
        if url.contains("crash") {
            Err(ScanError::Driver(DriverError::from_cdp("Target closed")))
        } else if url.contains("fail") {
            Err(ScanError::Failed {
                message: "no matching requests".into(),
                partial: json!({ "domains": ["cdn.example.test"] }),
            })
        } else {
            surface.navigate(url).await.map_err(ScanError::from).map(|()| json!({ "url": url }))
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn batch(label: &str, urls: &[&str]) -> SiteBatch {
    SiteBatch::new(label, urls.iter().map(|u| (*u).to_string()).collect())
}

pub fn urls(site: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("https://{site}/page/{i}")).collect()
}

/// Config with short delays and window cleanup off
pub fn test_config() -> FleetConfig {
    FleetConfig::builder()
        .window_cleanup(false)
        .window_settle_delay_secs(0)
        .launch_retries(3, 10)
        .purge_stale_profiles(false)
        .build()
        .expect("test config is valid")
}

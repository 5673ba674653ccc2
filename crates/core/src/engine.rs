use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::channel::{Event, EventSender};
use crate::logger;
use crate::matcher::Matcher;
use crate::platform::Platform;
use crate::region::compute_region;
use crate::settings::Settings;
use crate::template::Template;
use crate::types::*;

const LOG_PREFIX: &str = "engine";

/// Tuning the engine runs with, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    pub interval: Duration,
    pub region_scale: f64,
    pub match_threshold: f32,
    pub max_misses_before_expand: u32,
}

impl From<&Settings> for ScanConfig {
    fn from(s: &Settings) -> Self {
        Self {
            interval: s.scan_interval(),
            region_scale: s.region_scale,
            match_threshold: s.match_threshold,
            max_misses_before_expand: s.max_misses_before_expand,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Mutable scan bookkeeping. Only the engine thread touches it.
#[derive(Debug, Default)]
pub struct ScanState {
    pub last_frame: Option<Frame>,
    pub last_region: Option<ScanRegion>,
    pub button_visible: bool,
    pub miss_streak: u32,
    pub click_count: u64,
}

/// What one call to [`Scanner::scan_once`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Iteration {
    /// Frame and region identical to the previous capture; nothing matched.
    Skipped,
    Matched { score: f32, clicked: bool },
    Missed { score: f32, fallback_announced: bool },
}

/// The capture -> match -> decide -> act step and the state it carries
/// between iterations.
pub struct Scanner {
    template: Template,
    platform: Box<dyn Platform>,
    matcher: Box<dyn Matcher>,
    events: EventSender,
    config: ScanConfig,
    screen: ScreenSize,
    region: ScanRegion,
    state: ScanState,
}

impl Scanner {
    pub fn new(
        template: Template,
        platform: Box<dyn Platform>,
        matcher: Box<dyn Matcher>,
        events: EventSender,
        config: ScanConfig,
    ) -> Result<Self> {
        let screen = platform.screen_size()?;
        if template.width() > screen.width || template.height() > screen.height {
            bail!(
                "template {}x{} does not fit on the {}x{} screen",
                template.width(),
                template.height(),
                screen.width,
                screen.height
            );
        }
        logger::register_prefix(LOG_PREFIX, logger::COLOR_GREEN);
        let region =
            compute_region(screen, config.region_scale, template.width(), template.height(), None);
        Ok(Self {
            template,
            platform,
            matcher,
            events,
            config,
            screen,
            region,
            state: ScanState::default(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn region(&self) -> ScanRegion {
        self.region
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn click_count(&self) -> u64 {
        self.state.click_count
    }

    /// Initial narration for a freshly attached dashboard.
    pub fn announce(&self) {
        self.emit_status("Dashboard ready. Press Start to begin scanning.".to_string());
        self.emit_region();
        self.events.send(Event::click_count(self.state.click_count));
    }

    /// Forget what the previous session saw. The click count survives.
    pub fn reset_tracking(&mut self) {
        self.state.last_frame = None;
        self.state.last_region = None;
        self.state.button_visible = false;
        self.state.miss_streak = 0;
    }

    pub fn report_error(&self, err: &anyhow::Error) {
        logger::error_p(LOG_PREFIX, &format!("{:#}", err));
        self.events.send(Event::status(format!("Scanner error: {:#}", err)));
    }

    pub fn scan_once(&mut self) -> Result<Iteration> {
        let max_misses = self.config.max_misses_before_expand;
        let area = if self.state.miss_streak >= max_misses { None } else { Some(self.region) };

        let frame = self.platform.capture(area)?;
        if self.state.last_region == area && self.state.last_frame.as_ref() == Some(&frame) {
            return Ok(Iteration::Skipped);
        }

        let found = self.matcher.best_match(&frame, &self.template)?;
        let outcome = if found.score >= self.config.match_threshold {
            let origin = area.map(|r| r.origin()).unwrap_or_default();
            let (hx, hy) = self.template.half_extent();
            let target = Point::new(
                origin.x + found.location.x + hx,
                origin.y + found.location.y + hy,
            );

            let clicked = !self.state.button_visible;
            if clicked {
                self.emit_status(format!(
                    "'Afspelen' button detected (confidence {:.2}) at ({}, {}). Clicking once.",
                    found.score, target.x, target.y
                ));
                // only clicks that went through are counted
                self.platform.click(target)?;
                self.state.click_count += 1;
                self.events.send(Event::click_count(self.state.click_count));
            }
            self.state.button_visible = true;
            self.state.miss_streak = 0;

            if area.is_none() {
                self.region = compute_region(
                    self.screen,
                    self.config.region_scale,
                    self.template.width(),
                    self.template.height(),
                    Some(target),
                );
                self.emit_region();
            }
            Iteration::Matched { score: found.score, clicked }
        } else {
            if self.state.button_visible {
                self.emit_status("'Afspelen' button no longer detected.".to_string());
            }
            self.state.button_visible = false;
            let previous = self.state.miss_streak;
            self.state.miss_streak = previous.saturating_add(1);

            let fallback_announced = previous < max_misses && self.state.miss_streak == max_misses;
            if fallback_announced {
                self.emit_status("Button not found; expanding search to the entire screen.".to_string());
            }
            Iteration::Missed { score: found.score, fallback_announced }
        };

        self.state.last_frame = Some(frame);
        self.state.last_region = area;
        Ok(outcome)
    }

    fn emit_status(&self, text: String) {
        logger::info_p(LOG_PREFIX, &text);
        self.events.send(Event::Status(text));
    }

    fn emit_region(&self) {
        let r = self.region;
        self.emit_status(format!(
            "Search region: left={}, top={}, width={}, height={}",
            r.left, r.top, r.width, r.height
        ));
    }
}

#[derive(Debug, Default)]
struct Flags {
    running: bool,
    stop_requested: bool,
    /// Bumped on every effective start so the engine thread knows to reset.
    session: u64,
}

/// Flags shared between the engine thread and its controller.
#[derive(Debug, Default)]
pub struct Control {
    flags: Mutex<Flags>,
    wake: Condvar,
}

impl Control {
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Idle -> Scanning. False when already scanning or shut down.
    pub fn start(&self) -> bool {
        let mut f = self.lock();
        if f.running || f.stop_requested {
            return false;
        }
        f.running = true;
        f.session += 1;
        self.wake.notify_all();
        true
    }

    /// Scanning -> Idle. False when not scanning.
    pub fn stop(&self) -> bool {
        let mut f = self.lock();
        if !f.running || f.stop_requested {
            return false;
        }
        f.running = false;
        self.wake.notify_all();
        true
    }

    pub fn request_shutdown(&self) {
        let mut f = self.lock();
        f.stop_requested = true;
        f.running = false;
        self.wake.notify_all();
    }

    pub fn state(&self) -> EngineState {
        let f = self.lock();
        if f.stop_requested {
            EngineState::Terminated
        } else if f.running {
            EngineState::Scanning
        } else {
            EngineState::Idle
        }
    }

    /// Drop back to Idle after a failed iteration, unless the operator has
    /// already started a new session in the meantime.
    fn fail(&self, session: u64) {
        let mut f = self.lock();
        if f.session == session && f.running {
            f.running = false;
            self.wake.notify_all();
        }
    }

    /// Park until scanning is enabled. `None` means shut down.
    fn wait_for_work(&self) -> Option<u64> {
        let guard = self.lock();
        let f = self
            .wake
            .wait_while(guard, |f| !f.running && !f.stop_requested)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if f.stop_requested {
            None
        } else {
            Some(f.session)
        }
    }

    /// Sleep up to `interval`, returning early on stop, restart or shutdown.
    fn wait_interval(&self, session: u64, interval: Duration) {
        let guard = self.lock();
        let _ = self
            .wake
            .wait_timeout_while(guard, interval, |f| {
                f.running && !f.stop_requested && f.session == session
            })
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }
}

/// Owner-side handle of the background scan thread.
pub struct EngineHandle {
    control: Arc<Control>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EngineHandle {
    /// Move `scanner` onto a dedicated thread. The thread starts Idle.
    pub fn spawn(scanner: Scanner) -> Result<Self> {
        let control = Arc::new(Control::default());
        let thread_control = Arc::clone(&control);
        let thread = thread::Builder::new()
            .name("scan-engine".into())
            .spawn(move || run(scanner, &thread_control))?;
        Ok(Self { control, thread: Mutex::new(Some(thread)) })
    }

    pub fn start(&self) -> bool {
        let started = self.control.start();
        if started {
            logger::info_p(LOG_PREFIX, "scanning started");
        }
        started
    }

    pub fn stop(&self) -> bool {
        let stopped = self.control.stop();
        if stopped {
            logger::info_p(LOG_PREFIX, "scanning paused");
        }
        stopped
    }

    pub fn state(&self) -> EngineState {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Scanning
    }

    /// Stop the thread for good and wait for it. Once this returns no
    /// further capture or click happens. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.control.request_shutdown();
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                logger::error_p(LOG_PREFIX, "scan thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut scanner: Scanner, control: &Control) {
    scanner.announce();
    let interval = scanner.config().interval;
    let mut session = 0;

    while let Some(current) = control.wait_for_work() {
        if current != session {
            scanner.reset_tracking();
            session = current;
        }
        match scanner.scan_once() {
            Ok(_) => control.wait_interval(session, interval),
            Err(e) => {
                scanner.report_error(&e);
                control.fail(session);
            }
        }
    }
    logger::info_p(LOG_PREFIX, "scan thread exited");
}

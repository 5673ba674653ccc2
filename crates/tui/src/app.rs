use std::sync::mpsc;

use afspelen_core::channel::{EventReceiver, Snapshot};
use afspelen_core::engine::EngineHandle;
use afspelen_core::types::EngineState;

use crate::confirm::ConfirmDialog;

pub struct App {
    engine: EngineHandle,
    events: EventReceiver,
    pub snapshot: Snapshot,
    /// Engine state as last observed, updated eagerly by start/stop.
    pub state: EngineState,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(engine: EngineHandle, events: EventReceiver, log_rx: mpsc::Receiver<String>) -> Self {
        let state = engine.state();
        Self {
            engine,
            events,
            snapshot: Snapshot::default(),
            state,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            confirm: None,
            should_quit: false,
        }
    }

    /// Pull whatever the engine and the logger queued since the last tick.
    pub fn tick(&mut self) {
        let events = self.events.drain();
        self.snapshot.apply_all(&events);
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
        self.state = self.engine.state();
    }

    pub fn can_start(&self) -> bool {
        self.state == EngineState::Idle
    }

    pub fn can_stop(&self) -> bool {
        self.state == EngineState::Scanning
    }

    pub fn on_start(&mut self) {
        if self.can_start() && self.engine.start() {
            self.state = EngineState::Scanning;
        }
    }

    pub fn on_stop(&mut self) {
        if self.can_stop() && self.engine.stop() {
            self.state = EngineState::Idle;
        }
    }

    /// Quit right away when idle; ask first while scanning.
    pub fn request_quit(&mut self) {
        if self.state == EngineState::Scanning {
            self.confirm = Some(ConfirmDialog::new("Scanning is active. Stop and quit?"));
        } else {
            self.on_close();
        }
    }

    pub fn answer_confirm(&mut self, yes: bool) {
        if self.confirm.take().is_some() && yes {
            self.on_close();
        }
    }

    pub fn on_close(&mut self) {
        self.engine.shutdown();
        self.state = EngineState::Terminated;
        self.should_quit = true;
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }
}

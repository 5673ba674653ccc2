use std::io;
use std::sync::mpsc;

use anyhow::{Context, Result};
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use afspelen_core::channel::event_channel;
use afspelen_core::engine::{EngineHandle, ScanConfig, Scanner};
use afspelen_core::matcher::NccMatcher;
use afspelen_core::platform::{create_platform, probe_screen};
use afspelen_core::preflight::{self, Check};
use afspelen_core::settings::Settings;
use afspelen_core::template::Template;
use afspelen_core::{logger, paths};

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let logs_dir = paths::logs_dir();
    if let Err(e) = logger::init(&logs_dir) {
        eprintln!("warning: file logging disabled ({}): {}", logs_dir.display(), e);
    }
    // Buffer log lines until the dashboard starts draining them
    let (log_tx, log_rx) = mpsc::channel::<String>();
    logger::set_tui_sender(log_tx);
    logger::info("afspelen starting");

    let settings_path = paths::settings_path();
    let settings = Settings::load(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = settings.save(&settings_path) {
            logger::warn(&format!("could not write default settings: {:#}", e));
        }
    }
    settings.validate().with_context(|| format!("invalid {}", settings_path.display()))?;

    let checks = [
        Check::file_exists("template", paths::template_path()),
        Check::new("screen", move || match probe_screen(force_stub) {
            Ok(size) if size.width > 0 && size.height > 0 => None,
            Ok(_) => Some("the screen reports a zero size".to_string()),
            Err(e) => Some(format!("no screen available: {:#}", e)),
        }),
        Check::dir_writable("logs", logs_dir),
    ];
    if let Err(failure) = preflight::run(&checks, |k| std::env::var(k).ok()) {
        eprintln!("{}", failure.report());
        std::process::exit(1);
    }

    let template = Template::load(&paths::template_path())?;
    logger::info(&format!("template loaded, {}x{}", template.width(), template.height()));

    let platform = create_platform(force_stub, &template)?;
    let (events_tx, events_rx) = event_channel();
    let scanner = Scanner::new(
        template,
        platform,
        Box::new(NccMatcher),
        events_tx,
        ScanConfig::from(&settings),
    )?;
    let engine = EngineHandle::spawn(scanner)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = afspelen_tui::App::new(engine, events_rx, log_rx);
    let result = afspelen_tui::event::run(&mut terminal, &mut app);

    // No-op when the dashboard already closed the engine
    app.on_close();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    logger::info("afspelen stopped");
    result
}

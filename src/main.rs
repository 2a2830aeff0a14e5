use std::io;
use std::process::ExitCode;

use arbor::cli::{self, CliCommand};
use arbor::config::Config;
use arbor::protocol::{spawn_client, LocalRoom, ProtocolEvent};
use arbor::room::RoomView;
use arbor::ui;
use arbor::ui::theme::Theme;
use color_eyre::Result;
use crossterm::{
    cursor::Show,
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let command = match cli::parse_args(std::env::args()) {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("{usage}");
            return ExitCode::from(1);
        }
    };

    match command {
        CliCommand::Version => {
            println!("arbor {}", cli::VERSION);
            ExitCode::SUCCESS
        }
        CliCommand::ExportDefaults { path } => match Config::export_defaults(&path) {
            Ok(()) => {
                println!("Exported default configuration to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(error) => {
                eprintln!("{error}");
                ExitCode::from(1)
            }
        },
        CliCommand::Run { config } => {
            let config = match Config::load(config.as_deref()) {
                Ok(config) => config,
                Err(error) => {
                    eprintln!("{error}");
                    return ExitCode::from(1);
                }
            };
            let theme = match Theme::from_config(&config) {
                Ok(theme) => theme,
                Err(error) => {
                    eprintln!("{error}");
                    return ExitCode::from(1);
                }
            };

            init_tracing();
            match run_tui(config, theme) {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    eprintln!("Error: {error:?}");
                    ExitCode::from(2)
                }
            }
        }
    }
}

/// Log to a file when `ARBOR_LOG` names one; the TUI owns the terminal, so
/// there is nowhere else to write.
fn init_tracing() {
    let Ok(path) = std::env::var("ARBOR_LOG") else {
        return;
    };
    let Ok(file) = std::fs::File::create(path) else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(file)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn run_tui(config: Config, theme: Theme) -> Result<()> {
    color_eyre::install()?;
    setup_panic_hook();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, config, theme).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    config: Config,
    theme: Theme,
) -> Result<()>
where
    <B as ratatui::backend::Backend>::Error: std::marker::Send + Sync + 'static,
{
    let (event_tx, mut event_rx) = mpsc::channel::<ProtocolEvent>(256);
    let client = LocalRoom::new(config.room.nick.clone());
    let commands = spawn_client(client, event_tx);

    let mut room = RoomView::new(config, theme, commands);
    let mut input_events = EventStream::new();
    let vertical_step = room.config().scroll.vertical as i64;

    loop {
        terminal.draw(|frame| ui::draw(&mut room, frame))?;
        room.maybe_request_logs();

        if room.should_quit() {
            break;
        }

        // Apply protocol events one at a time between renders; a render
        // never observes a half-applied event.
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => room.apply_event(event),
                    None => break,
                }
            }
            input = input_events.next() => {
                match input {
                    Some(Ok(Event::Key(key))) => room.handle_key(key),
                    Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                        MouseEventKind::ScrollUp => room.scroll(-vertical_step),
                        MouseEventKind::ScrollDown => room.scroll(vertical_step),
                        _ => {}
                    },
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return Err(error.into()),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

/// Restore the terminal even when the application panics.
fn setup_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        let _ = execute!(io::stdout(), Show);
        original_hook(panic_info);
    }));
}

fn restore_terminal<B: ratatui::backend::Backend + io::Write>(
    terminal: &mut Terminal<B>,
) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        Show
    )?;
    Ok(())
}

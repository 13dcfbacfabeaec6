// cw-monitor
//
// Full-screen matrix of chain heights by source, with per-cell alert
// toggles and a feed connection log.
//
// Keys: arrows move the selection, space/a toggles alerts for the
// selected cell, q / Esc / Ctrl-C quits.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use crossbeam::channel;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{cursor, event, style, terminal, ExecutableCommand, QueueableCommand};

use chainwatch::alert::{Bell, FileStore, Notifier, PreferenceSet, Silent};
use chainwatch::engine::Dashboard;
use chainwatch::feed::conn::Status;
use chainwatch::feed::{Conn, FeedEvent, Frame};
use chainwatch::state::Health;
use chainwatch::util::unix_now;
use chainwatch_tools::{cw_opts, cw_parseopts};

#[derive(Debug)]
struct Cli {
    fps: u64,
    event_log_size: usize,
    silent: bool,
    quiet: bool,
}

fn print_help_and_exit(opts: &getopts::Options, program: &str, code: i32) -> ! {
    let brief = format!(
        "Usage: {program} [options]\n\n\
         Live matrix of chain heights by source."
    );
    let usage = opts.usage(&brief);
    eprintln!("{usage}");
    std::process::exit(code)
}

fn parse_cli() -> (String, PathBuf, Cli) {
    let mut opts = cw_opts();
    opts.optflag("h", "help", "Show help");
    opts.optopt("", "fps", "UI refresh rate (default 4)", "n");
    opts.optopt(
        "",
        "event-log-size",
        "Max events to show in log (default 8)",
        "n",
    );
    opts.optflag("", "silent", "Never ring the terminal bell");
    opts.optflag("", "quiet", "Suppress footer hint");

    let args: Vec<String> = std::env::args().collect();
    let (matches, origin, prefs_path) = cw_parseopts(&opts, &args);
    if matches.opt_present("help") {
        print_help_and_exit(
            &opts,
            args.first().map(String::as_str).unwrap_or("cw-monitor"),
            0,
        );
    }

    let fps = matches
        .opt_str("fps")
        .as_deref()
        .unwrap_or("4")
        .parse()
        .unwrap_or(4);
    let event_log_size = matches
        .opt_str("event-log-size")
        .as_deref()
        .unwrap_or("8")
        .parse()
        .unwrap_or(8);
    let silent = matches.opt_present("silent");
    let quiet = matches.opt_present("quiet");

    (
        origin,
        prefs_path,
        Cli {
            fps,
            event_log_size,
            silent,
            quiet,
        },
    )
}

#[derive(Clone)]
struct LoggedEvent {
    timestamp: SystemTime,
    event: String,
    color: Color,
}

struct EventLog {
    events: VecDeque<LoggedEvent>,
    size: usize,
}

impl EventLog {
    fn new(size: usize) -> EventLog {
        EventLog {
            events: VecDeque::new(),
            size,
        }
    }

    fn push(&mut self, event: String, color: Color) {
        self.events.push_front(LoggedEvent {
            timestamp: SystemTime::now(),
            event,
            color,
        });
        if self.events.len() > self.size {
            self.events.pop_back();
        }
    }
}

/// One rendered cell of the matrix.
struct CellView {
    text: String,
    color: Color,
    selected: bool,
}

struct Row {
    chain: String,
    best: u64,
    cells: Vec<CellView>,
}

struct Tui {
    stdout: io::Stdout,
}

impl Tui {
    fn setup() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    fn draw(
        &mut self,
        header: &str,
        columns: &[String],
        chain_width: usize,
        cell_width: usize,
        rows: &[Row],
        event_log: &EventLog,
        quiet: bool,
    ) -> io::Result<()> {
        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?;

        // Header
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(header))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(2))?;

        // Column header: chain, best, one column per source.
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        let mut line = format!("{:<chain_width$}  {:>10}", "chain", "best");
        for column in columns {
            line.push_str(&format!("  {:>cell_width$}", column));
        }
        self.stdout.queue(style::Print(line))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;

        for row in rows {
            self.stdout.queue(style::Print(format!(
                "{:<chain_width$}  {:>10}",
                row.chain, row.best
            )))?;
            for cell in &row.cells {
                self.stdout.queue(style::Print("  "))?;
                self.stdout.queue(SetForegroundColor(cell.color))?;
                if cell.selected {
                    self.stdout.queue(SetAttribute(Attribute::Reverse))?;
                }
                self.stdout
                    .queue(style::Print(format!("{:>cell_width$}", cell.text)))?;
                if cell.selected {
                    self.stdout.queue(SetAttribute(Attribute::NoReverse))?;
                }
                self.stdout.queue(ResetColor)?;
            }
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }

        if !event_log.events.is_empty() {
            self.stdout.queue(cursor::MoveToNextLine(1))?;
            self.stdout.queue(SetAttribute(Attribute::Bold))?;
            self.stdout.queue(style::Print("Recent Events:"))?;
            self.stdout.queue(SetAttribute(Attribute::Reset))?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;

            for logged in &event_log.events {
                let datetime: DateTime<Local> = logged.timestamp.into();
                self.stdout.queue(SetForegroundColor(logged.color))?;
                self.stdout.queue(style::Print(format!(
                    "[{}] {}",
                    datetime.format("%H:%M:%S%.3f"),
                    logged.event
                )))?;
                self.stdout.queue(ResetColor)?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
        }

        if !quiet {
            self.stdout.queue(cursor::MoveToNextLine(1))?;
            self.stdout
                .queue(style::Print("arrows select, space toggles alert, q quits"))?;
        }

        self.stdout.flush()
    }
}

fn cell_view(health: &Health, observation_height: Option<u64>, alerts: bool, selected: bool) -> CellView {
    let (text, color) = match health {
        Health::Missing => ("-".to_string(), Color::DarkGrey),
        Health::Known {
            at_head,
            fresh,
            stale,
            ..
        } => {
            let text = observation_height
                .map(|height| height.to_string())
                .unwrap_or_else(|| "?".to_string());
            let color = if *stale {
                Color::DarkGrey
            } else if !*at_head {
                Color::Red
            } else if *fresh {
                Color::Green
            } else {
                Color::White
            };
            (text, color)
        }
    };
    let text = if alerts { format!("{}*", text) } else { text };
    CellView {
        text,
        color,
        selected,
    }
}

fn status_line(status: &Status) -> (String, Color) {
    match status {
        Status::Connected => ("connected".to_string(), Color::Green),
        Status::Disconnected => ("feed lost".to_string(), Color::Red),
        Status::FailedToConnect => ("connect failed".to_string(), Color::Red),
        Status::Retrying { attempt, delay } => (
            format!("retrying in {:.1}s (attempt {})", delay.as_secs_f64(), attempt),
            Color::Yellow,
        ),
        Status::FrameError(err) => (format!("bad frame dropped: {:?}", err), Color::Red),
        Status::Exiting => ("feed task exited".to_string(), Color::Red),
    }
}

fn main() {
    let (origin, prefs_path, cli) = parse_cli();

    let mut tui = Tui::setup().expect("TUI setup failed");
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let mut t = Tui {
            stdout: io::stdout(),
        };
        t.teardown();
        original_hook(panic_info);
    }));

    let conn = match Conn::new(&origin) {
        Ok(conn) => conn,
        Err(err) => {
            tui.teardown();
            eprintln!("Bad origin {:?}: {:?}", origin, err);
            std::process::exit(1);
        }
    };

    let notifier: Box<dyn Notifier> = if cli.silent {
        Box::new(Silent)
    } else {
        Box::new(Bell)
    };
    let mut board = Dashboard::new(
        PreferenceSet::load(FileStore::new(prefs_path)),
        notifier,
    );

    let mut event_log = EventLog::new(cli.event_log_size);
    let mut conn_state = "connecting".to_string();
    // Selected (chain row, source column).
    let mut selected = (0usize, 0usize);

    // Keyboard handler
    let (key_tx, key_rx) = channel::unbounded();
    std::thread::spawn(move || loop {
        if let Ok(ev) = event::read() {
            if key_tx.send(ev).is_err() {
                break;
            }
        }
    });

    let frame = Duration::from_millis(1000 / cli.fps.max(1));
    let tick = channel::tick(frame);

    'main: loop {
        crossbeam::select! {
            recv(conn.receiver()) -> feed_event => {
                match feed_event {
                    Ok(FeedEvent::Frame(frame)) => {
                        let alert_check = match &frame {
                            Frame::Update(update) => {
                                Some((update.source.clone(), update.chain.clone()))
                            }
                            _ => None,
                        };
                        match board.handle_frame(frame) {
                            Ok(Some(delta)) => {
                                if let Some((source, chain)) = alert_check {
                                    if delta.changed && board.alerts_enabled(&source, &chain) {
                                        event_log.push(
                                            format!("[{}/{}] new block {}", source, chain, delta.current.height),
                                            Color::Green,
                                        );
                                    }
                                }
                            }
                            Ok(None) => {}
                            Err(err) => {
                                event_log.push(format!("dropped update: {:?}", err), Color::Yellow);
                            }
                        }
                    }
                    Ok(FeedEvent::Status(status)) => {
                        let (line, color) = status_line(&status);
                        conn_state = line.clone();
                        event_log.push(line, color);
                        if let Status::Exiting = status {
                            break 'main;
                        }
                    }
                    Err(_) => break 'main,
                }
            }

            recv(key_rx) -> ev => {
                if let Ok(event::Event::Key(k)) = ev {
                    use event::{KeyCode, KeyModifiers};
                    // Release/repeat events arrive on some terminals.
                    if k.kind == event::KeyEventKind::Press {
                        let n_chains = board.registry().chains().len();
                        let n_sources = board.registry().sources().len();
                        match k.code {
                            KeyCode::Char('q') | KeyCode::Esc => break 'main,
                            KeyCode::Char('c') if k.modifiers == KeyModifiers::CONTROL => {
                                break 'main
                            }
                            KeyCode::Up => selected.0 = selected.0.saturating_sub(1),
                            KeyCode::Down => {
                                if selected.0 + 1 < n_chains {
                                    selected.0 += 1;
                                }
                            }
                            KeyCode::Left => selected.1 = selected.1.saturating_sub(1),
                            KeyCode::Right => {
                                if selected.1 + 1 < n_sources {
                                    selected.1 += 1;
                                }
                            }
                            KeyCode::Char(' ') | KeyCode::Char('a') => {
                                let pair = {
                                    let registry = board.registry();
                                    match (
                                        registry.chains().get(selected.0),
                                        registry.sources().get(selected.1),
                                    ) {
                                        (Some(chain), Some(source)) => {
                                            Some((source.id.clone(), chain.id.clone()))
                                        }
                                        _ => None,
                                    }
                                };
                                if let Some((source, chain)) = pair {
                                    let enabled = board.toggle_alert(&source, &chain);
                                    event_log.push(
                                        format!(
                                            "[{}/{}] alerts {}",
                                            source,
                                            chain,
                                            if enabled { "on" } else { "off" }
                                        ),
                                        Color::Blue,
                                    );
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }

            recv(tick) -> _ => {
                let snapshot = board.snapshot(unix_now());

                let columns: Vec<String> = snapshot
                    .sources
                    .iter()
                    .map(|source| source.short_name.clone())
                    .collect();
                let cell_width = columns.iter().map(String::len).max().unwrap_or(4).max(10);
                let chain_width = snapshot
                    .chains
                    .iter()
                    .map(|chain| chain.full_name.len())
                    .max()
                    .unwrap_or(5)
                    .max(5);

                let mut rows = Vec::new();
                for (row_index, chain) in snapshot.chains.iter().enumerate() {
                    let mut cells = Vec::new();
                    for (col_index, source) in snapshot.sources.iter().enumerate() {
                        let cell = snapshot.cell(&source.id, &chain.id);
                        let (health, height, alerts) = match cell {
                            Some(cell) => (
                                cell.health,
                                cell.observation.as_ref().map(|o| o.height),
                                cell.alerts_enabled,
                            ),
                            None => (Health::Missing, None, false),
                        };
                        cells.push(cell_view(
                            &health,
                            height,
                            alerts,
                            (row_index, col_index) == selected,
                        ));
                    }
                    rows.push(Row {
                        chain: chain.full_name.clone(),
                        best: snapshot.best_height.get(&chain.id).copied().unwrap_or(0),
                        cells,
                    });
                }

                let header = format!("cw-monitor — {}  [{}]", origin, conn_state);
                if tui
                    .draw(&header, &columns, chain_width, cell_width, &rows, &event_log, cli.quiet)
                    .is_err()
                {
                    break 'main;
                }
            }
        }
    }

    tui.teardown();
}

use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::App;
use crate::net::{FetchBatch, FetchMessage};
use crate::ui;

pub fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
    batch_tx: Sender<FetchBatch>,
    rx: Receiver<FetchMessage>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    app.start(Local::now());
    loop {
        while let Ok(message) = rx.try_recv() {
            match message {
                FetchMessage::Reply(reply) => app.apply_reply(reply, Local::now()),
                FetchMessage::Error(err) => app.apply_error(err),
            }
        }

        if let Some(batch) = app.poll(Local::now()) {
            debug!("dispatching batch {}", batch.seq);
            if batch_tx.send(batch).is_err() {
                warn!("fetch worker is gone");
                app.apply_error("fetch worker stopped".to_string());
            }
        }

        terminal.draw(|f| ui::ui(f, &app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    KeyCode::Char('p') => app.toggle_suspend(Local::now()),
                    KeyCode::Char('r') => app.refresh_now(Local::now()),
                    KeyCode::Char('t') => app.toggle_theme(),
                    KeyCode::Char('?') => app.toggle_help(),
                    KeyCode::Esc => app.show_help = false,
                    _ => {}
                }
            }
        }
    }
}

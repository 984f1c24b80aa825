use color_eyre::eyre::Result;
use crossterm::event::{
    Event,
    EventStream,
    KeyCode,
    KeyEvent,
    KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{
    disable_raw_mode,
    enable_raw_mode,
};
use cryptodevs_mint::{
    action::ActionKind,
    state::{
        ActionOutcome,
        Affordance,
        ConnectionStatus,
        MintState,
    },
};
use futures::StreamExt;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;

const VISIBLE_ERRORS: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Connect,
    Disconnect,
    StartPresale,
    PresaleMint,
    PublicMint,
    Refresh,
    Redraw,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Normal,
    QuitModal,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    events: Option<EventStream>,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    state.events = Some(EventStream::new());
    Ok(())
}

/// Restores the normal terminal. The event stream is dropped too so nothing
/// competes with a password prompt for stdin.
pub fn terminal_exit(state: &mut UiState) -> Result<()> {
    state.events = None;
    state.terminal = None;
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &MintState, now: u64) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let mode = state.mode;
        term.draw(|f| ui(f, mode, snap, now))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub async fn next_event(state: &mut UiState) -> Result<UserEvent> {
    loop {
        let Some(events) = state.events.as_mut() else {
            return std::future::pending().await;
        };
        match events.next().await {
            Some(Ok(Event::Key(key))) => {
                if let Some(ev) = handle_key(&mut state.mode, key) {
                    return Ok(ev);
                }
            }
            Some(Ok(Event::Resize(..))) => return Ok(UserEvent::Redraw),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(UserEvent::Quit),
        }
    }
}

/// Maps a key press to an event, updating the modal state on the way.
pub fn handle_key(mode: &mut Mode, key: KeyEvent) -> Option<UserEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    // raw mode swallows SIGINT
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }
    if *mode == Mode::QuitModal {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                *mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            *mode = Mode::QuitModal;
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('c') => Some(UserEvent::Connect),
        KeyCode::Char('d') => Some(UserEvent::Disconnect),
        KeyCode::Char('s') => Some(UserEvent::StartPresale),
        KeyCode::Char('p') => Some(UserEvent::PresaleMint),
        KeyCode::Char('m') => Some(UserEvent::PublicMint),
        KeyCode::Char('r') => Some(UserEvent::Refresh),
        _ => None,
    }
}

fn ui(f: &mut Frame, mode: Mode, snap: &MintState, now: u64) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // title + minted count
            Constraint::Length(4), // wallet
            Constraint::Min(5),    // mint panel
            Constraint::Length(5), // errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_title(f, chunks[0], snap);
    draw_wallet(f, chunks[1], snap);
    draw_mint(f, chunks[2], snap, now);
    draw_errors(f, chunks[3], snap);
    draw_help(f, chunks[4]);
    if mode == Mode::QuitModal {
        let area = centered_rect(40, 20, f.area());
        let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
        f.render_widget(Clear, area);
        f.render_widget(block.clone(), area);
        f.render_widget(Paragraph::new("Quit? (Y/N)"), block.inner(area));
    }
}

fn draw_title(f: &mut Frame, area: Rect, snap: &MintState) {
    let lines = vec![
        Line::styled(
            "Welcome to Crypto Devs!",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::from("It's an NFT collection for developers in Crypto."),
        Line::from(format!("{} have been minted", snap.minted_display())),
    ];
    let title = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn draw_wallet(f: &mut Frame, area: Rect, snap: &MintState) {
    let (text, color) = match &snap.connection {
        ConnectionStatus::Disconnected => (String::from("Not connected"), Color::DarkGray),
        ConnectionStatus::Connected { account, chain_id } => {
            let badge = if snap.is_owner { "  [owner]" } else { "" };
            (
                format!("{account} on chain {chain_id}{badge}"),
                Color::Green,
            )
        }
        ConnectionStatus::Failed(err) => (format!("Connection failed: {err}"), Color::Red),
    };
    let wallet = Paragraph::new(vec![Line::from(text), Line::from(snap.status.clone())])
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(wallet, area);
}

fn draw_mint(f: &mut Frame, area: Rect, snap: &MintState, now: u64) {
    let mut lines: Vec<Line> = mint_prompt(snap).into_iter().map(Line::from).collect();
    if let Some(remaining) = snap
        .presale_ends_at
        .filter(|_| snap.affordance() == Affordance::PresaleMint)
        .and_then(|ends_at| format_remaining(ends_at, now))
    {
        lines.push(Line::from(format!("Presale ends in {remaining}")));
    }
    if let Some(outcome) = &snap.last_outcome {
        lines.push(Line::from(""));
        lines.push(match outcome {
            ActionOutcome::Confirmed { tx_hash, .. } => {
                Line::styled(format!("Last tx {tx_hash}"), Style::default().fg(Color::Green))
            }
            ActionOutcome::Failed { kind, error } => Line::styled(
                format!("{kind} failed: {error}"),
                Style::default().fg(Color::Red),
            ),
        });
    }
    let mint = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Mint"));
    f.render_widget(mint, area);
}

fn draw_errors(f: &mut Frame, area: Rect, snap: &MintState) {
    let mut lines: Vec<Line> = snap
        .recent_errors(VISIBLE_ERRORS)
        .map(|e| Line::from(e.clone()))
        .collect();
    let color = if lines.is_empty() {
        lines.push(Line::from("No errors"));
        Color::DarkGray
    } else {
        Color::Red
    };
    let errors = Paragraph::new(lines)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title("Errors"));
    f.render_widget(errors, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "c connect | d disconnect | s start presale | p presale mint | m public mint | r refresh | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

/// Text for the mint panel, following what the current state allows.
pub fn mint_prompt(snap: &MintState) -> Vec<String> {
    let lines: &[&str] = match snap.affordance() {
        Affordance::Connect => &["Press c to connect your wallet"],
        Affordance::Loading(ActionKind::StartPresale) => &["Starting presale..."],
        Affordance::Loading(_) => &["Minting..."],
        Affordance::AwaitingPhase => &["Checking presale status..."],
        Affordance::StartPresale => &["Press s to start the presale"],
        Affordance::PresaleNotStarted => &["Presale hasn't started!"],
        Affordance::PresaleMint => &[
            "Presale has started!!! If your address is allowlisted, mint a Crypto Dev",
            "Press p for a presale mint (0.01 ETH)",
        ],
        Affordance::PublicMint => &["Press m for a public mint (0.01 ETH)"],
    };
    lines.iter().map(|line| (*line).to_owned()).collect()
}

/// `None` once the end has passed.
pub fn format_remaining(ends_at: u64, now: u64) -> Option<String> {
    let left = ends_at.checked_sub(now).filter(|left| *left > 0)?;
    let (hours, minutes, seconds) = (left / 3600, (left % 3600) / 60, left % 60);
    Some(if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else {
        format!("{minutes}m {seconds:02}s")
    })
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::models::{Application, ApplicationStatus};
use crate::store::ApplicationStore;
use crate::workflow::{Board, BoardSession, MoveOutcome, MoveRequest};

/// Cursor over the board plus the last message shown in the footer.
#[derive(Debug, Default)]
struct BoardView {
    column: usize,
    row: usize,
    message: Option<String>,
}

/// Real columns in display order, plus a trailing one for stray statuses.
fn visible_columns(board: &Board) -> Vec<ApplicationStatus> {
    let mut columns = ApplicationStatus::ALL.to_vec();
    if !board.unrecognized().is_empty() {
        columns.push(ApplicationStatus::Unrecognized);
    }
    columns
}

fn cards(board: &Board, status: ApplicationStatus) -> &[Application] {
    match status {
        ApplicationStatus::Unrecognized => board.unrecognized(),
        _ => board.column(status),
    }
}

impl BoardView {
    fn current_status(&self, board: &Board) -> ApplicationStatus {
        let columns = visible_columns(board);
        columns[self.column.min(columns.len() - 1)]
    }

    fn current<'b>(&self, board: &'b Board) -> Option<&'b Application> {
        cards(board, self.current_status(board)).get(self.row)
    }

    fn clamp(&mut self, board: &Board) {
        let columns = visible_columns(board);
        self.column = self.column.min(columns.len() - 1);
        let len = cards(board, columns[self.column]).len();
        self.row = self.row.min(len.saturating_sub(1));
    }

    fn step_column(&mut self, board: &Board, delta: isize) {
        let last = visible_columns(board).len() - 1;
        self.column = self.column.saturating_add_signed(delta).min(last);
        self.clamp(board);
    }

    fn step_row(&mut self, board: &Board, delta: isize) {
        self.row = self.row.saturating_add_signed(delta);
        self.clamp(board);
    }

    /// Drag to the neighbouring real column, dropping the card on top.
    fn shift_request(&self, board: &Board, delta: isize) -> Option<MoveRequest> {
        let app = self.current(board)?;
        let from = self.current_status(board);
        let target = self.column.checked_add_signed(delta)?;
        let to = *ApplicationStatus::ALL.get(target)?;
        (to != from).then(|| MoveRequest {
            id: app.id.clone(),
            from,
            to,
            to_index: 0,
        })
    }

    fn reorder_request(&self, board: &Board, delta: isize) -> Option<MoveRequest> {
        let app = self.current(board)?;
        let status = self.current_status(board);
        Some(MoveRequest {
            id: app.id.clone(),
            from: status,
            to: status,
            to_index: self.row.checked_add_signed(delta)?,
        })
    }

    fn follow(&mut self, board: &Board, id: &str) {
        if let Some((status, index)) = board.position(id) {
            if let Some(column) = visible_columns(board).iter().position(|s| *s == status) {
                self.column = column;
                self.row = index;
            }
        }
        self.clamp(board);
    }

    fn apply<S: ApplicationStore>(&mut self, session: &mut BoardSession<S>, request: MoveRequest) {
        match session.drag(&request, None) {
            Ok(MoveOutcome::StatusChanged { to, .. }) => {
                self.message = Some(format!("Moved to {}", to.label()));
            }
            Ok(MoveOutcome::Reordered) => self.message = None,
            Ok(MoveOutcome::Unchanged) => {}
            Err(e) => self.message = Some(format!("Move failed, board reloaded: {}", e)),
        }
        self.follow(session.board(), &request.id);
    }

    /// Returns false when the user asked to quit.
    fn handle_key<S: ApplicationStore>(&mut self, session: &mut BoardSession<S>, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Left | KeyCode::Char('h') => self.step_column(session.board(), -1),
            KeyCode::Right | KeyCode::Char('l') => self.step_column(session.board(), 1),
            KeyCode::Down | KeyCode::Char('j') => self.step_row(session.board(), 1),
            KeyCode::Up | KeyCode::Char('k') => self.step_row(session.board(), -1),
            KeyCode::Char('H') | KeyCode::Char('L') => {
                let delta = if code == KeyCode::Char('H') { -1 } else { 1 };
                if let Some(request) = self.shift_request(session.board(), delta) {
                    self.apply(session, request);
                }
            }
            KeyCode::Char('J') | KeyCode::Char('K') => {
                let delta = if code == KeyCode::Char('K') { -1 } else { 1 };
                if let Some(request) = self.reorder_request(session.board(), delta) {
                    self.apply(session, request);
                }
            }
            KeyCode::Char('r') => {
                self.message = match session.refresh() {
                    Ok(()) => Some("Reloaded".to_string()),
                    Err(e) => Some(format!("Reload failed: {}", e)),
                };
                self.clamp(session.board());
            }
            _ => {}
        }
        true
    }
}

pub fn run_board<S: ApplicationStore>(mut session: BoardSession<S>) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut session);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop<S: ApplicationStore>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    session: &mut BoardSession<S>,
) -> Result<()> {
    let mut view = BoardView::default();
    view.clamp(session.board());

    loop {
        terminal.draw(|frame| draw(frame, session.board(), &view))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if !view.handle_key(session, key.code) {
                break;
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn status_color(status: ApplicationStatus) -> Color {
    match status {
        ApplicationStatus::Saved => Color::Gray,
        ApplicationStatus::Applied => Color::Cyan,
        ApplicationStatus::PhoneScreen | ApplicationStatus::Interview | ApplicationStatus::Technical => Color::Yellow,
        ApplicationStatus::Offer => Color::Green,
        ApplicationStatus::Rejected => Color::Red,
        ApplicationStatus::Withdrawn | ApplicationStatus::Archived => Color::DarkGray,
        ApplicationStatus::Unrecognized => Color::Magenta,
    }
}

fn draw(frame: &mut Frame, board: &Board, view: &BoardView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(7), Constraint::Length(1)])
        .split(frame.area());

    let columns = visible_columns(board);
    let widths: Vec<Constraint> = columns
        .iter()
        .map(|_| Constraint::Ratio(1, columns.len() as u32))
        .collect();
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(rows[0]);

    for (index, (status, area)) in columns.iter().zip(areas.iter()).enumerate() {
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = cards(board, *status)
            .iter()
            .map(|app| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        truncate(&app.job_title, width),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(truncate(&app.company, width)),
                ])
            })
            .collect();

        let focused = index == view.column;
        let border = if focused {
            Style::default().fg(status_color(*status))
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(format!(" {} ({}) ", status.label(), cards(board, *status).len())),
            )
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

        let mut state = ListState::default();
        if focused {
            state.select(Some(view.row));
        }
        frame.render_stateful_widget(list, *area, &mut state);
    }

    let detail = Paragraph::new(build_detail(view.current(board)))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, rows[1]);

    let footer = match &view.message {
        Some(message) => Paragraph::new(format!(" {}", message)).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(" h/l:column  j/k:card  H/L:move card  J/K:reorder  r:reload  q:quit")
            .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[2]);
}

fn build_detail(app: Option<&Application>) -> Text<'_> {
    let Some(app) = app else {
        return Text::raw("No application selected");
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} at {}", app.job_title, app.company),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("Status: {}  Priority: {}", app.status.label(), app.priority),
            Style::default().fg(status_color(app.status)),
        )),
    ];

    if !app.location.is_empty() || app.is_remote {
        let remote = if app.is_remote { " (remote)" } else { "" };
        lines.push(Line::from(format!("Location: {}{}", app.location, remote)));
    }
    if !app.salary.is_empty() {
        lines.push(Line::from(format!("Salary: {}", app.salary)));
    }
    if let Some(url) = &app.job_url {
        lines.push(Line::from(format!("URL: {}", url)));
    }
    if let Some(event) = app.timeline.last() {
        lines.push(Line::from(Span::styled(
            format!("{}  {}", event.timestamp.format("%Y-%m-%d"), event.description),
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApplication;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn app(company: &str, status: ApplicationStatus, minutes: i64) -> Application {
        let created = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes);
        let mut app = Application::create("owner", NewApplication::new("Engineer", company), created).unwrap();
        app.status = status;
        app
    }

    fn session(store: &MemoryStore) -> BoardSession<&MemoryStore> {
        BoardSession::open(store, "owner").unwrap()
    }

    #[test]
    fn test_shift_right_moves_card_and_cursor_follows() {
        let store = MemoryStore::with(vec![app("Acme", ApplicationStatus::Saved, 0)]);
        let mut session = session(&store);
        let mut view = BoardView::default();

        assert!(view.handle_key(&mut session, KeyCode::Char('L')));

        assert_eq!(session.board().column(ApplicationStatus::Applied).len(), 1);
        assert_eq!(view.current_status(session.board()), ApplicationStatus::Applied);
        assert_eq!(view.current(session.board()).unwrap().company, "Acme");
        assert_eq!(view.message.as_deref(), Some("Moved to Applied"));
        assert_eq!(store.patch_calls.get(), 1);
    }

    #[test]
    fn test_shift_left_from_first_column_does_nothing() {
        let store = MemoryStore::with(vec![app("Acme", ApplicationStatus::Saved, 0)]);
        let mut session = session(&store);
        let mut view = BoardView::default();

        view.handle_key(&mut session, KeyCode::Char('H'));
        assert_eq!(session.board().column(ApplicationStatus::Saved).len(), 1);
        assert_eq!(store.patch_calls.get(), 0);
    }

    #[test]
    fn test_failed_commit_shows_message_and_keeps_store_state() {
        let store = MemoryStore::with(vec![app("Acme", ApplicationStatus::Saved, 0)]);
        store.fail_patches(true);
        let mut session = session(&store);
        let mut view = BoardView::default();

        view.handle_key(&mut session, KeyCode::Char('L'));
        assert!(view.message.as_deref().unwrap().starts_with("Move failed"));
        assert_eq!(session.board().column(ApplicationStatus::Saved).len(), 1);
        assert_eq!(view.current_status(session.board()), ApplicationStatus::Saved);
    }

    #[test]
    fn test_reorder_within_column_skips_store() {
        let store = MemoryStore::with(vec![
            app("Older", ApplicationStatus::Applied, 0),
            app("Newer", ApplicationStatus::Applied, 5),
        ]);
        let mut session = session(&store);
        let mut view = BoardView::default();

        view.handle_key(&mut session, KeyCode::Char('l'));
        assert_eq!(view.current(session.board()).unwrap().company, "Newer");

        view.handle_key(&mut session, KeyCode::Char('J'));
        let order: Vec<_> = session
            .board()
            .column(ApplicationStatus::Applied)
            .iter()
            .map(|a| a.company.as_str())
            .collect();
        assert_eq!(order, vec!["Older", "Newer"]);
        assert_eq!(view.row, 1);
        assert_eq!(store.patch_calls.get(), 0);
    }

    #[test]
    fn test_cursor_clamps_to_board() {
        let store = MemoryStore::with(vec![app("Acme", ApplicationStatus::Saved, 0)]);
        let mut session = session(&store);
        let mut view = BoardView::default();

        view.handle_key(&mut session, KeyCode::Char('k'));
        view.handle_key(&mut session, KeyCode::Char('j'));
        assert_eq!(view.row, 0);

        for _ in 0..20 {
            view.handle_key(&mut session, KeyCode::Char('l'));
        }
        assert_eq!(view.current_status(session.board()), ApplicationStatus::Archived);
        assert!(view.current(session.board()).is_none());
        assert!(!view.handle_key(&mut session, KeyCode::Char('q')));
    }

    #[test]
    fn test_stray_status_gets_its_own_column() {
        let store = MemoryStore::with(vec![app("Odd", ApplicationStatus::Unrecognized, 0)]);
        let session = session(&store);
        let columns = visible_columns(session.board());
        assert_eq!(columns.len(), ApplicationStatus::ALL.len() + 1);
        assert_eq!(columns.last(), Some(&ApplicationStatus::Unrecognized));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Engineer", 20), "Engineer");
        assert_eq!(truncate("Principal Engineer", 6), "Princ…");
    }
}

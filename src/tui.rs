use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame,
    prelude::*,
    widgets::*,
};
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::workspace::WorkspaceEntry;

struct App {
    entries: Vec<WorkspaceEntry>,
    selected: usize,
}

impl App {
    fn new(entries: Vec<WorkspaceEntry>) -> Self {
        Self {
            selected: 0,
            entries,
        }
    }

    fn next(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1) % self.entries.len();
        }
    }

    fn previous(&mut self) {
        if !self.entries.is_empty() {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.entries.len() - 1);
        }
    }

    fn selected_path(&self) -> Option<PathBuf> {
        self.entries.get(self.selected).map(|e| e.path.clone())
    }
}

pub fn format_time_ago(time: Option<SystemTime>) -> String {
    let Some(time) = time else {
        return "unknown".to_string();
    };
    let Ok(duration) = time.elapsed() else {
        return "unknown".to_string();
    };
    let secs = duration.as_secs();
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m ago", mins);
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = hours / 24;
    if days < 30 {
        return format!("{}d ago", days);
    }
    let months = days / 30;
    format!("{}mo ago", months)
}

fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let header_cells = ["Project", "Workspace", "Branch", "Origin", "Modified", "Changes"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::White).bold()));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let branch_text = entry
                .branch
                .clone()
                .unwrap_or_else(|| "(detached)".to_string());
            let (origin_text, origin_color) = if entry.tracks_origin {
                ("linked", Color::Green)
            } else {
                ("other", Color::Red)
            };

            let (changes_text, changes_color) = match entry.changes {
                Some(0) => ("clean".to_string(), Color::DarkGray),
                Some(n) => (format!("{n} changed"), Color::Green),
                None => ("?".to_string(), Color::DarkGray),
            };

            let style = if i == app.selected {
                Style::default().bg(Color::Rgb(40, 40, 60))
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(entry.project.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(entry.name.clone()).style(Style::default().fg(Color::White)),
                Cell::from(branch_text).style(Style::default().fg(Color::Magenta)),
                Cell::from(origin_text).style(Style::default().fg(origin_color)),
                Cell::from(format_time_ago(entry.last_modified))
                    .style(Style::default().fg(Color::Yellow)),
                Cell::from(changes_text).style(Style::default().fg(changes_color)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(20),
        Constraint::Percentage(20),
        Constraint::Percentage(22),
        Constraint::Percentage(10),
        Constraint::Percentage(14),
        Constraint::Percentage(14),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" lgm workspaces ")
                .title_alignment(Alignment::Center),
        )
        .row_highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)));

    frame.render_widget(table, area);

    if area.height > 3 {
        let help = Paragraph::new(" j/k: navigate  Enter: select  q: quit")
            .style(Style::default().fg(Color::DarkGray));
        let help_area = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
        frame.render_widget(help, help_area);
    }
}

/// Show the table on stderr and return the chosen workspace path.
pub fn run_picker(entries: Vec<WorkspaceEntry>) -> Result<Option<PathBuf>> {
    if entries.is_empty() {
        eprintln!("no workspaces found");
        return Ok(None);
    }

    enable_raw_mode()?;
    let mut stderr = io::stderr();
    crossterm::execute!(stderr, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stderr);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(entries);
    let result = event_loop(&mut terminal, &mut app);

    // Restore the terminal even when the loop failed.
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<Option<PathBuf>> {
    loop {
        terminal.draw(|f| render(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(None),
                KeyCode::Char('j') | KeyCode::Down => app.next(),
                KeyCode::Char('k') | KeyCode::Up => app.previous(),
                KeyCode::Enter => return Ok(app.selected_path()),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    fn entry(project: &str, name: &str) -> WorkspaceEntry {
        WorkspaceEntry {
            project: project.to_string(),
            name: name.to_string(),
            path: PathBuf::from(format!("/r/{project}/workspaces/{name}")),
            branch: Some(name.to_string()),
            tracks_origin: true,
            changes: Some(0),
            last_modified: None,
        }
    }

    #[test]
    fn navigation_wraps_around() {
        let mut app = App::new(vec![entry("a", "main"), entry("a", "dev"), entry("b", "main")]);
        app.previous();
        assert_eq!(app.selected, 2);
        app.next();
        assert_eq!(app.selected, 0);
        app.next();
        assert_eq!(app.selected_path(), Some(PathBuf::from("/r/a/workspaces/dev")));
    }

    #[test]
    fn navigation_on_empty_list_is_a_no_op() {
        let mut app = App::new(Vec::new());
        app.next();
        app.previous();
        assert_eq!(app.selected, 0);
        assert_eq!(app.selected_path(), None);
    }

    #[test]
    fn time_ago_buckets() {
        let now = SystemTime::now();
        assert_eq!(format_time_ago(None), "unknown");
        assert_eq!(format_time_ago(Some(now)), "just now");
        assert_eq!(format_time_ago(Some(now - Duration::from_secs(5 * 60))), "5m ago");
        assert_eq!(format_time_ago(Some(now - Duration::from_secs(3 * 3600))), "3h ago");
        assert_eq!(format_time_ago(Some(now - Duration::from_secs(2 * 86400))), "2d ago");
        assert_eq!(format_time_ago(Some(now - Duration::from_secs(65 * 86400))), "2mo ago");
        assert_eq!(format_time_ago(Some(now + Duration::from_secs(3600))), "unknown");
    }

    #[test]
    fn render_shows_projects_and_branches() {
        let mut detached = entry("beta", "scratch");
        detached.branch = None;
        detached.tracks_origin = false;
        detached.changes = Some(3);
        let app = App::new(vec![entry("alpha", "main"), detached]);

        let mut terminal = Terminal::new(TestBackend::new(100, 8)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();

        assert!(text.contains("lgm workspaces"));
        assert!(text.contains("alpha"));
        assert!(text.contains("(detached)"));
        assert!(text.contains("linked"));
        assert!(text.contains("3 changed"));
    }
}

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs},
    Frame,
};

use crate::actions::Action;
use crate::collector::HostSnapshot;

/// Dashboard colors
pub struct Theme {
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87),
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Ssh,
    Tmux,
    Git,
    Zombies,
    Recent,
    Connections,
}

impl Tab {
    const ALL: [Tab; 7] = [
        Tab::Overview,
        Tab::Ssh,
        Tab::Tmux,
        Tab::Git,
        Tab::Zombies,
        Tab::Recent,
        Tab::Connections,
    ];

    fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Ssh => "SSH",
            Tab::Tmux => "Tmux",
            Tab::Git => "Git",
            Tab::Zombies => "Zombies",
            Tab::Recent => "Recent",
            Tab::Connections => "Connections",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Main application state
pub struct App {
    /// Latest host snapshot, if one has arrived
    pub snapshot: Option<HostSnapshot>,
    pub tab: Tab,
    /// Vertical scroll offset of the current tab
    pub scroll: u16,
    /// Transient footer message, cleared on the next key press
    pub status_message: Option<String>,
    pub theme: Theme,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
}

impl App {
    pub fn new() -> Self {
        Self {
            snapshot: None,
            tab: Tab::Overview,
            scroll: 0,
            status_message: None,
            theme: Theme::default(),
            pending_actions: Vec::new(),
        }
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::KeyPress(key) => self.handle_key(key),
            Action::SnapshotUpdated(snapshot) => {
                self.snapshot = Some(*snapshot);
                Ok(false)
            }
            Action::Refresh => Ok(false),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        self.status_message = None;

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.switch_tab(self.tab.next()),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                self.switch_tab(self.tab.previous())
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Char('r') => {
                self.pending_actions.push(Action::Refresh);
                self.status_message = Some("Refreshing...".to_string());
            }
            _ => {}
        }
        Ok(false)
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.scroll = 0;
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Tabs
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer/status
            ])
            .split(frame.area());

        self.render_tabs(frame, chunks[0]);
        match &self.snapshot {
            None => self.render_lines(
                frame,
                chunks[1],
                vec![Line::from(Span::styled(
                    "Collecting host snapshot...",
                    Style::default().fg(self.theme.dim),
                ))],
            ),
            Some(snapshot) => match self.tab {
                Tab::Git => self.render_git(frame, chunks[1], snapshot),
                Tab::Connections => self.render_connections(frame, chunks[1], snapshot),
                tab => {
                    let lines = self.tab_lines(tab, snapshot);
                    self.render_lines(frame, chunks[1], lines)
                }
            },
        }
        self.render_footer(frame, chunks[2]);
    }

    fn block(&self, title: &str) -> Block<'static> {
        Block::default()
            .title(format!(" {} ", title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.dim))
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .style(Style::default().fg(self.theme.dim))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )
            .block(self.block("hostwatch"));
        frame.render_widget(tabs, area);
    }

    fn render_lines(&self, frame: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
        let paragraph = Paragraph::new(lines)
            .scroll((self.scroll, 0))
            .block(self.block(self.tab.title()));
        frame.render_widget(paragraph, area);
    }

    fn field(&self, label: &str, value: String) -> Line<'static> {
        Line::from(vec![
            Span::styled(format!("{}: ", label), Style::default().fg(self.theme.dim)),
            Span::styled(value, Style::default().fg(self.theme.fg)),
        ])
    }

    fn flag(&self, label: &str, on: bool) -> Line<'static> {
        let (text, color) = if on {
            ("yes", self.theme.success)
        } else {
            ("no", self.theme.error)
        };
        Line::from(vec![
            Span::styled(format!("{}: ", label), Style::default().fg(self.theme.dim)),
            Span::styled(text, Style::default().fg(color)),
        ])
    }

    fn tab_lines(&self, tab: Tab, snap: &HostSnapshot) -> Vec<Line<'static>> {
        match tab {
            Tab::Overview => self.overview_lines(snap),
            Tab::Ssh => self.ssh_lines(snap),
            Tab::Tmux => self.tmux_lines(snap),
            Tab::Zombies => self.zombie_lines(snap),
            Tab::Recent => self.recent_lines(snap),
            Tab::Git | Tab::Connections => Vec::new(),
        }
    }

    fn overview_lines(&self, snap: &HostSnapshot) -> Vec<Line<'static>> {
        let uptime = snap
            .uptime
            .as_ref()
            .map(|u| format!("{} (since {})", u.uptime_formatted, u.boot_time))
            .unwrap_or_else(|| "unavailable".to_string());
        let dirty = snap.git.iter().filter(|g| !g.is_clean).count();
        vec![
            self.field("Uptime", uptime),
            self.flag("SSH active", snap.ssh.is_active),
            self.field(
                "SSH sessions",
                snap.ssh.active_connections.len().to_string(),
            ),
            self.flag("Tmux running", snap.tmux.running),
            self.field("Tmux sessions", snap.tmux.sessions.len().to_string()),
            self.field(
                "Git repositories",
                format!("{} ({} dirty)", snap.git.len(), dirty),
            ),
            self.field("Zombies", snap.zombies.len().to_string()),
            self.field("Sockets", snap.connections.len().to_string()),
            Line::from(""),
            self.field(
                "Collected",
                format!(
                    "{} in {} ms",
                    snap.collected_at.format("%H:%M:%S"),
                    snap.elapsed_ms
                ),
            ),
        ]
    }

    fn ssh_lines(&self, snap: &HostSnapshot) -> Vec<Line<'static>> {
        let ssh = &snap.ssh;
        let mut lines = vec![
            self.flag("Daemon running", ssh.is_active),
            self.field(
                "PID",
                ssh.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
            ),
            self.field(
                "Port",
                ssh.port
                    .map_or_else(|| "not detected".to_string(), |p| p.to_string()),
            ),
        ];
        if let Some(err) = &ssh.error_message {
            lines.push(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(self.theme.error),
            )));
        }
        lines.push(Line::from(""));
        lines.push(self.field(
            "Established sessions",
            ssh.active_connections.len().to_string(),
        ));
        for (key, conn) in &ssh.active_connections {
            let remote = conn
                .remote
                .map_or_else(|| "?".to_string(), |r| r.to_string());
            lines.push(Line::from(format!("  {}. {} <- {}", key, conn.local, remote)));
        }
        lines
    }

    fn tmux_lines(&self, snap: &HostSnapshot) -> Vec<Line<'static>> {
        let tmux = &snap.tmux;
        if !tmux.installed {
            return vec![Line::from(Span::styled(
                "tmux is not installed",
                Style::default().fg(self.theme.dim),
            ))];
        }
        let mut lines = vec![
            self.flag("Server running", tmux.running),
            self.field(
                "Server PID",
                tmux.server_pid
                    .map_or_else(|| "-".to_string(), |p| p.to_string()),
            ),
            self.field("Clients", tmux.total_clients.to_string()),
            Line::from(""),
        ];
        for session in &tmux.sessions {
            let marker = if session.attached {
                Span::styled("● ", Style::default().fg(self.theme.success))
            } else {
                Span::styled("○ ", Style::default().fg(self.theme.dim))
            };
            lines.push(Line::from(vec![
                marker,
                Span::styled(
                    session.name.clone(),
                    Style::default().fg(self.theme.fg).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(
                        "  {} window{}, up {}",
                        session.windows,
                        if session.windows == 1 { "" } else { "s" },
                        session.created
                    ),
                    Style::default().fg(self.theme.dim),
                ),
            ]));
            for client in &session.clients {
                lines.push(Line::from(format!(
                    "    {} ({}) window {} pane {}",
                    client.client_name, client.terminal, client.window_index, client.pane_index
                )));
            }
        }
        lines
    }

    fn zombie_lines(&self, snap: &HostSnapshot) -> Vec<Line<'static>> {
        if snap.zombies.is_empty() {
            return vec![Line::from(Span::styled(
                "No zombie processes",
                Style::default().fg(self.theme.success),
            ))];
        }
        snap.zombies
            .iter()
            .map(|z| {
                Line::from(vec![
                    Span::styled(
                        format!("{:>7} ", z.pid),
                        Style::default().fg(self.theme.warning),
                    ),
                    Span::styled(z.name.clone(), Style::default().fg(self.theme.fg)),
                    Span::styled(
                        format!("  user {}  since {}", z.user, z.create_time),
                        Style::default().fg(self.theme.dim),
                    ),
                ])
            })
            .collect()
    }

    fn recent_lines(&self, snap: &HostSnapshot) -> Vec<Line<'static>> {
        snap.recent
            .iter()
            .map(|f| {
                Line::from(vec![
                    Span::styled(
                        format!("{}  ", f.modified_str()),
                        Style::default().fg(self.theme.dim),
                    ),
                    Span::styled(
                        f.path.display().to_string(),
                        Style::default().fg(self.theme.fg),
                    ),
                ])
            })
            .collect()
    }

    fn render_git(&self, frame: &mut Frame, area: Rect, snap: &HostSnapshot) {
        let header = Row::new(["Repository", "Branch", "↑", "↓", "Staged", "Mod", "New", "State"])
            .style(Style::default().fg(self.theme.dim));
        let rows = snap.git.iter().skip(self.scroll as usize).map(|g| {
            let (state, color) = match (&g.error, g.is_clean) {
                (Some(_), _) => ("error", self.theme.error),
                (None, true) => ("clean", self.theme.success),
                (None, false) => ("dirty", self.theme.warning),
            };
            Row::new(vec![
                Cell::from(g.repo_path.display().to_string()),
                Cell::from(g.branch.clone()),
                Cell::from(g.ahead.to_string()),
                Cell::from(g.behind.to_string()),
                Cell::from(g.staged.to_string()),
                Cell::from(g.modified.to_string()),
                Cell::from(g.untracked.to_string()),
                Cell::from(state).style(Style::default().fg(color)),
            ])
        });
        let widths = [
            Constraint::Min(30),
            Constraint::Length(20),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(6),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(self.block("Git"));
        frame.render_widget(table, area);
    }

    fn render_connections(&self, frame: &mut Frame, area: Rect, snap: &HostSnapshot) {
        let header = Row::new(["Local", "Remote", "Status", "PID", "Process"])
            .style(Style::default().fg(self.theme.dim));
        let rows = snap.connections.iter().skip(self.scroll as usize).map(|c| {
            let mut name = c.process_name.clone().unwrap_or_default();
            if name.chars().count() > 18 {
                name = format!("{}...", name.chars().take(18).collect::<String>());
            }
            Row::new(vec![
                c.local.to_string(),
                c.remote.map(|r| r.to_string()).unwrap_or_default(),
                c.status.to_string(),
                c.pid.map(|p| p.to_string()).unwrap_or_default(),
                name,
            ])
        });
        let widths = [
            Constraint::Length(28),
            Constraint::Length(28),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Min(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(self.block("Connections"));
        frame.render_widget(table, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help_text = " q: Quit │ Tab/←/→: Switch view │ j/k: Scroll │ r: Refresh ";

        let content = if let Some(ref msg) = self.status_message {
            Line::from(Span::styled(
                format!(" {} ", msg),
                Style::default().fg(self.theme.success),
            ))
        } else {
            Line::from(Span::styled(help_text, Style::default().fg(self.theme.dim)))
        };

        let footer = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.dim)),
        );
        frame.render_widget(footer, area);
    }
}

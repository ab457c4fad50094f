use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::{
    Axis, Block, Borders, Chart, Clear, Dataset as Series, Gauge, GraphType, Paragraph,
};

use fpl_dashboard::config::{self, Settings};
use fpl_dashboard::html;
use fpl_dashboard::logging;
use fpl_dashboard::pipeline::PipelineOptions;
use fpl_dashboard::provider::{ProviderHandle, spawn_provider};
use fpl_dashboard::snapshot::SnapshotStore;
use fpl_dashboard::source::FplApi;
use fpl_dashboard::state::{AppState, Delta, LoadStatus, ProviderCommand, apply_delta};
use fpl_dashboard::{chart::ChartSpec, export};

const LINE_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
];

struct App {
    state: AppState,
    should_quit: bool,
    provider: Option<ProviderHandle>,
    html_path: PathBuf,
    export_path: PathBuf,
}

impl App {
    fn new(provider: Option<ProviderHandle>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            provider,
            html_path: PathBuf::from("index.html"),
            export_path: PathBuf::from("fpl_dataset.xlsx"),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('s') => self.state.cycle_statistic(),
            KeyCode::Char('a') => self.state.cycle_aggregation(),
            KeyCode::Char('p') => self.state.cycle_position(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char(' ') | KeyCode::Enter => self.state.toggle_cursor_player(),
            KeyCode::Char('c') => self.state.clear_selection(),
            KeyCode::Char('r') => self.request_load(true),
            KeyCode::Char('x') | KeyCode::Esc => self.cancel_load(),
            KeyCode::Char('h') => self.write_html(),
            KeyCode::Char('e') => self.write_export(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn request_load(&mut self, force_refresh: bool) {
        if self.state.is_loading() {
            self.state.push_log("[INFO] Load already in progress");
            return;
        }
        let Some(provider) = &self.provider else {
            self.state.push_log("[WARN] Loader unavailable");
            return;
        };
        if provider.send(ProviderCommand::Load { force_refresh }) {
            self.state.status = LoadStatus::Loading(Default::default());
            if force_refresh {
                self.state.push_log("[INFO] Refresh requested");
            }
        } else {
            self.state.push_log("[WARN] Load request failed");
        }
    }

    fn cancel_load(&mut self) {
        if !self.state.is_loading() {
            return;
        }
        if let Some(provider) = &self.provider {
            provider.cancel();
            self.state.push_log("[INFO] Cancelling refresh");
        }
    }

    fn write_html(&mut self) {
        let Some(spec) = self.state.chart.as_ref() else {
            self.state.push_log("[INFO] No data to chart yet");
            return;
        };
        match html::write_page(&self.html_path, spec, html::DEFAULT_TITLE) {
            Ok(()) => {
                let msg = format!("[INFO] Wrote {}", self.html_path.display());
                self.state.push_log(msg);
            }
            Err(err) => self.state.push_log(format!("[WARN] HTML write failed: {err:#}")),
        }
    }

    fn write_export(&mut self) {
        let Some(dataset) = self.state.dataset.as_ref() else {
            self.state.push_log("[INFO] No data to export yet");
            return;
        };
        match export::export_dataset(&self.export_path, dataset) {
            Ok(report) => {
                let msg = format!(
                    "[INFO] Exported {} players / {} rows to {}",
                    report.players,
                    report.player_matches,
                    self.export_path.display()
                );
                self.state.push_log(msg);
            }
            Err(err) => self.state.push_log(format!("[WARN] Export failed: {err:#}")),
        }
    }
}

fn main() -> io::Result<()> {
    let settings = Settings::from_env();
    if let Err(err) = logging::init_file(&config::default_log_path(), "info") {
        eprintln!("logging disabled: {err:#}");
    }

    let (tx, rx) = mpsc::channel();
    let provider = match FplApi::new(&settings) {
        Ok(source) => Some(spawn_provider(
            Box::new(source),
            SnapshotStore::new(settings.snapshot_path.clone()),
            PipelineOptions::from_settings(&settings),
            tx,
        )),
        Err(err) => {
            log::error!("{err}");
            None
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(provider);
    app.request_load(false);
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(provider) = app.provider.take() {
        provider.shutdown();
    }
    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match &app.state.status {
        LoadStatus::Idle => {
            frame.render_widget(Paragraph::new("Starting..."), chunks[1]);
        }
        LoadStatus::Loading(progress) if app.state.dataset.is_none() => {
            render_loading(frame, chunks[1], progress.current, progress.total, &progress.message);
        }
        LoadStatus::Unavailable(reason) => render_unavailable(frame, chunks[1], reason),
        _ => render_dashboard(frame, chunks[1], &app.state),
    }

    render_console(frame, chunks[2], &app.state);

    let footer = Paragraph::new(
        "s Stat | a Aggregate | p Position | j/k Move | Space Select | c Clear | r Refresh | x Cancel | h HTML | e Export | ? Help | q Quit",
    );
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let position = state.position_filter.as_deref().unwrap_or("All positions");
    let mut line = format!(
        "FANTASY EPL | {} | {} | {} | {} selected",
        state.statistic.title(),
        state.aggregation.label(),
        position,
        state.selection.len()
    );
    if let LoadStatus::Loading(progress) = &state.status {
        if state.dataset.is_some() {
            line.push_str(&format!(
                " | refreshing {}/{}",
                progress.current, progress.total
            ));
        }
    }
    line
}

fn render_loading(frame: &mut Frame, area: Rect, current: usize, total: usize, message: &str) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    let ratio = if total == 0 {
        0.0
    } else {
        (current as f64 / total as f64).clamp(0.0, 1.0)
    };
    let gauge = Gauge::default()
        .block(Block::default().title("Loading").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{message} ({current}/{total})"));
    frame.render_widget(gauge, rows[0]);
}

fn render_unavailable(frame: &mut Frame, area: Rect, reason: &str) {
    let text = format!("Data not found.\n\n{reason}\n\nPress r to retry.");
    let para = Paragraph::new(text)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().title("Unavailable").borders(Borders::ALL));
    frame.render_widget(para, area);
}

fn render_dashboard(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(spec) = state.chart.as_ref() else {
        return;
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(34)])
        .split(rows[0]);

    render_facets(frame, top[0], spec, state);
    render_player_list(frame, top[1], state);
    render_lines(frame, rows[1], spec, state);
}

fn render_facets(frame: &mut Frame, area: Rect, spec: &ChartSpec, state: &AppState) {
    if spec.facets.is_empty() {
        return;
    }
    let constraints: Vec<Constraint> = spec
        .facets
        .iter()
        .map(|_| Constraint::Ratio(1, spec.facets.len() as u32))
        .collect();
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let x_max = spec.points.iter().map(|p| p.sum).fold(1.0_f64, f64::max);
    let x_min = spec.points.iter().map(|p| p.sum).fold(0.0_f64, f64::min);
    let y_max = spec.points.iter().map(|p| p.variance).fold(1.0_f64, f64::max);

    for (facet, cell) in spec.facets.iter().zip(cells.iter()) {
        let (picked, rest): (Vec<(f64, f64)>, Vec<(f64, f64)>) = {
            let mut picked = Vec::new();
            let mut rest = Vec::new();
            for p in spec.points_for_position(facet) {
                if state.selection.contains(p.player_id) {
                    picked.push((p.sum, p.variance));
                } else {
                    rest.push((p.sum, p.variance));
                }
            }
            (picked, rest)
        };
        let series = vec![
            Series::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Gray))
                .data(&rest),
            Series::default()
                .marker(Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&picked),
        ];
        let chart = Chart::new(series)
            .block(Block::default().title(facet.as_str()).borders(Borders::ALL))
            .x_axis(
                Axis::default()
                    .title(spec.stat_title())
                    .bounds([x_min, x_max])
                    .labels(axis_labels(x_min, x_max)),
            )
            .y_axis(
                Axis::default()
                    .title("Variance")
                    .bounds([0.0, y_max])
                    .labels(axis_labels(0.0, y_max)),
            );
        frame.render_widget(chart, *cell);
    }
}

fn render_player_list(frame: &mut Frame, area: Rect, state: &AppState) {
    let players = state.visible_players();
    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(state.cursor, players.len(), visible);

    let lines: Vec<Line> = players[start..end]
        .iter()
        .enumerate()
        .map(|(offset, p)| {
            let idx = start + offset;
            let mark = if state.selection.contains(p.player_id) { "*" } else { " " };
            let text = format!("{mark} {:<18} {:>6.1} {:>5.1}", truncate(&p.name, 18), p.sum, p.value);
            let mut style = Style::default();
            if idx == state.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            if state.selection.contains(p.player_id) {
                style = style.fg(Color::Red);
            }
            Line::styled(text, style)
        })
        .collect();

    let title = format!("Players ({})", players.len());
    let para = Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(para, area);
}

fn render_lines(frame: &mut Frame, area: Rect, spec: &ChartSpec, state: &AppState) {
    let series_data = spec.selected_series(&state.selection);
    let block = Block::default()
        .title(spec.line_title())
        .borders(Borders::ALL);
    if series_data.is_empty() {
        let hint = Paragraph::new("Select players with Space to compare them round by round.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let series: Vec<Series> = series_data
        .iter()
        .enumerate()
        .map(|(idx, (_, name, points))| {
            Series::default()
                .name(name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(LINE_COLORS[idx % LINE_COLORS.len()]))
                .data(points)
        })
        .collect();

    let (x_lo, x_hi) = (spec.x_domain.0 as f64, spec.x_domain.1 as f64);
    let (y_lo, y_hi) = spec.y_domain;
    let y_hi = if y_hi > y_lo { y_hi } else { y_lo + 1.0 };
    let chart = Chart::new(series)
        .block(block)
        .x_axis(
            Axis::default()
                .title("Round")
                .bounds([x_lo, x_hi])
                .labels(axis_labels(x_lo, x_hi)),
        )
        .y_axis(
            Axis::default()
                .bounds([y_lo, y_hi])
                .labels(axis_labels(y_lo, y_hi)),
        );
    frame.render_widget(chart, area);
}

fn render_console(frame: &mut Frame, area: Rect, state: &AppState) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = state.logs.len().saturating_sub(visible);
    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(skip)
        .map(|msg| {
            let style = if msg.starts_with("[WARN]") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::styled(msg.clone(), style)
        })
        .collect();
    let para = Paragraph::new(lines).block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(para, area);
}

fn axis_labels(lo: f64, hi: f64) -> Vec<Span<'static>> {
    let mid = (lo + hi) / 2.0;
    vec![
        Span::raw(format!("{lo:.0}")),
        Span::raw(format!("{mid:.0}")),
        Span::raw(format!("{hi:.0}")),
    ]
}

fn truncate(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        raw.to_string()
    } else {
        raw.chars().take(max.saturating_sub(1)).chain(['.']).collect()
    }
}

/// Window of `visible` list rows that keeps `cursor` roughly centred.
fn visible_range(cursor: usize, total: usize, visible: usize) -> (usize, usize) {
    let visible = visible.min(total);
    let start = cursor
        .saturating_sub(visible / 2)
        .min(total - visible);
    (start, start + visible)
}

const HELP_KEYS: [(&str, &[(&str, &str)]); 3] = [
    (
        "Chart",
        &[
            ("s", "Cycle statistic"),
            ("a", "Weekly / Cumulative / Form"),
            ("p", "Cycle position filter (line view)"),
        ],
    ),
    (
        "Players",
        &[
            ("j/k, Up/Down", "Move cursor"),
            ("Space, Enter", "Toggle selection"),
            ("c", "Clear selection"),
        ],
    ),
    (
        "Data",
        &[
            ("r", "Refresh from the API"),
            ("x, Esc", "Cancel refresh"),
            ("h", "Write index.html"),
            ("e", "Export workbook"),
            ("?", "Toggle help"),
            ("q", "Quit"),
        ],
    ),
];

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup = popup_rect(area, 60, 70);
    frame.render_widget(Clear, popup);

    let mut lines = vec![Line::styled(
        "Fantasy EPL keys",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for (section, keys) in HELP_KEYS {
        lines.push(Line::raw(""));
        lines.push(Line::styled(section, Style::default().fg(Color::Yellow)));
        for (key, action) in keys {
            lines.push(Line::raw(format!("  {key:<14}{action}")));
        }
    }

    let help = Paragraph::new(lines).block(Block::default().title("Help").borders(Borders::ALL));
    frame.render_widget(help, popup);
}

/// `pct_w` x `pct_h` percent of `area`, centred.
fn popup_rect(area: Rect, pct_w: u16, pct_h: u16) -> Rect {
    let scale = |len: u16, pct: u16| (u32::from(len) * u32::from(pct.min(100)) / 100) as u16;
    let width = scale(area.width, pct_w);
    let height = scale(area.height, pct_h);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

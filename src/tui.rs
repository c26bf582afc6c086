use crate::api::PortfolioApi;
use crate::chart::{series_points, value_bounds, ChartRow, LineSpec, Metric, MetricVisibility, SeriesKey};
use crate::error::MutationError;
use crate::format::{format_currency, format_percent, format_with_commas};
use crate::manager::{ListState, PortfolioList};
use crate::overview::{load_overview, OverviewData};
use crate::portfolio::{Portfolio, PortfolioDraft, PortfolioId};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table, Tabs,
        Wrap,
    },
    Frame, Terminal,
};
use std::collections::HashSet;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use tui_big_text::{BigText, PixelSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    TabBar,
    TotalValue,
    HistoryChart,
    MetricToggles,
    PortfolioTable,
    Help,
}

impl Component {
    /// Returns all available components
    pub fn all() -> Vec<Component> {
        vec![
            Component::TabBar,
            Component::TotalValue,
            Component::HistoryChart,
            Component::MetricToggles,
            Component::PortfolioTable,
            Component::Help,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::TabBar => "tab_bar",
            Component::TotalValue => "total_value",
            Component::HistoryChart => "history_chart",
            Component::MetricToggles => "metric_toggles",
            Component::PortfolioTable => "portfolio_table",
            Component::Help => "help",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Component::TabBar => "Top navigation bar showing active tab",
            Component::TotalValue => "Total value, gain and performance",
            Component::HistoryChart => "Value/cost history line chart",
            Component::MetricToggles => "Which chart metrics are shown",
            Component::PortfolioTable => "Per-portfolio table on the overview",
            Component::Help => "Keyboard shortcuts",
        }
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::all()
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown component: '{s}'"))
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisabledComponents {
    disabled: HashSet<Component>,
}

impl DisabledComponents {
    pub fn new(disabled_list: &[String]) -> Self {
        let mut disabled = HashSet::new();

        for component_str in disabled_list {
            match Component::from_str(component_str) {
                Ok(component) => {
                    disabled.insert(component);
                }
                Err(err) => tracing::warn!("{err}"),
            }
        }

        DisabledComponents { disabled }
    }

    pub fn is_disabled(&self, component: Component) -> bool {
        self.disabled.contains(&component)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Overview,
    Portfolios,
}

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Portfolios => "Portfolios",
        }
    }

    fn all() -> &'static [Tab] {
        &[Tab::Overview, Tab::Portfolios]
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "overview" => Some(Tab::Overview),
            "portfolios" => Some(Tab::Portfolios),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverviewState {
    Loading,
    Failed(String),
    Loaded {
        data: OverviewData,
        rows: Vec<ChartRow>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormField {
    Name,
    Description,
    Exclude,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Name => FormField::Description,
            FormField::Description => FormField::Exclude,
            FormField::Exclude => FormField::Name,
        }
    }

    fn previous(self) -> Self {
        match self {
            FormField::Name => FormField::Exclude,
            FormField::Description => FormField::Name,
            FormField::Exclude => FormField::Description,
        }
    }
}

/// Create/edit modal.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioForm {
    /// `None` when creating.
    pub editing: Option<PortfolioId>,
    pub draft: PortfolioDraft,
    pub field: FormField,
    pub error: Option<String>,
}

impl PortfolioForm {
    fn create() -> Self {
        PortfolioForm {
            editing: None,
            draft: PortfolioDraft::default(),
            field: FormField::Name,
            error: None,
        }
    }

    fn edit(portfolio: &Portfolio) -> Self {
        PortfolioForm {
            editing: Some(portfolio.id.clone()),
            draft: PortfolioDraft::from_portfolio(portfolio),
            field: FormField::Name,
            error: None,
        }
    }

    fn text_field(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Name => Some(&mut self.draft.name),
            FormField::Description => Some(&mut self.draft.description),
            FormField::Exclude => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Normal,
    Detail(PortfolioId),
    Form(PortfolioForm),
    ConfirmDelete,
}

pub struct App<A: PortfolioApi> {
    pub current_tab: Tab,
    pub should_quit: bool,
    pub currency: String,
    pub date_format: String,
    pub overview: OverviewState,
    pub visibility: MetricVisibility,
    pub selected_overview: usize,
    pub selected_portfolio: usize,
    pub mode: AppMode,
    pub list: PortfolioList<A>,
    pub error_message: Option<String>,
    pub disabled_components: DisabledComponents,
}

impl<A: PortfolioApi> App<A> {
    pub fn new(
        api: A,
        currency: String,
        date_format: String,
        disabled_components: DisabledComponents,
    ) -> App<A> {
        App {
            current_tab: Tab::Overview,
            should_quit: false,
            currency,
            date_format,
            overview: OverviewState::Loading,
            visibility: MetricVisibility::default(),
            selected_overview: 0,
            selected_portfolio: 0,
            mode: AppMode::Normal,
            list: PortfolioList::new(api),
            error_message: None,
            disabled_components,
        }
    }

    pub async fn refresh_overview(&mut self) {
        self.overview = OverviewState::Loading;
        self.overview = match load_overview(self.list.api()).await {
            Ok(data) => {
                let rows = data.chart_rows(&self.date_format);
                self.selected_overview = self
                    .selected_overview
                    .min(data.portfolios.len().saturating_sub(1));
                OverviewState::Loaded { data, rows }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load overview");
                OverviewState::Failed(e.user_message().to_string())
            }
        };
    }

    pub async fn refresh_list(&mut self) {
        // A failure is shown through the list state.
        let _ = self.list.load().await;
        self.clamp_portfolio_selection();
    }

    pub async fn reload_all(&mut self) {
        self.refresh_overview().await;
        self.refresh_list().await;
    }

    fn overview_portfolios(&self) -> &[Portfolio] {
        match &self.overview {
            OverviewState::Loaded { data, .. } => data.portfolios.as_slice(),
            _ => &[],
        }
    }

    fn selected_list_portfolio(&self) -> Option<&Portfolio> {
        self.list.portfolios().get(self.selected_portfolio)
    }

    fn clamp_portfolio_selection(&mut self) {
        self.selected_portfolio = self
            .selected_portfolio
            .min(self.list.portfolios().len().saturating_sub(1));
    }

    pub fn next_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + 1) % tabs.len()];
    }

    pub fn previous_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + tabs.len() - 1) % tabs.len()];
    }

    pub fn select_next(&mut self) {
        match self.current_tab {
            Tab::Overview => {
                if self.selected_overview + 1 < self.overview_portfolios().len() {
                    self.selected_overview += 1;
                }
            }
            Tab::Portfolios => {
                if self.selected_portfolio + 1 < self.list.portfolios().len() {
                    self.selected_portfolio += 1;
                }
            }
        }
    }

    pub fn select_previous(&mut self) {
        match self.current_tab {
            Tab::Overview => self.selected_overview = self.selected_overview.saturating_sub(1),
            Tab::Portfolios => self.selected_portfolio = self.selected_portfolio.saturating_sub(1),
        }
    }

    /// Applies one key press. Requests triggered by the key are awaited
    /// before returning.
    pub async fn handle_key(&mut self, code: KeyCode) {
        if self.error_message.take().is_some() {
            self.list.clear_error();
            return;
        }

        match self.mode.clone() {
            AppMode::Normal => self.handle_normal_key(code).await,
            AppMode::Detail(_) => {
                if matches!(code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                    self.mode = AppMode::Normal;
                }
            }
            AppMode::ConfirmDelete => match code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.mode = AppMode::Normal;
                    match self.list.confirm_delete().await {
                        Ok(_) => {
                            self.clamp_portfolio_selection();
                            self.refresh_overview().await;
                        }
                        Err(e) => self.error_message = Some(e.to_string()),
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.list.cancel_delete();
                    self.mode = AppMode::Normal;
                }
                _ => {}
            },
            AppMode::Form(form) => self.handle_form_key(form, code).await,
        }
    }

    async fn handle_normal_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.previous_tab(),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => self.next_tab(),
            KeyCode::Char('1') => self.current_tab = Tab::Overview,
            KeyCode::Char('2') | KeyCode::Char('p') => self.current_tab = Tab::Portfolios,
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
            _ => match self.current_tab {
                Tab::Overview => self.handle_overview_key(code).await,
                Tab::Portfolios => self.handle_portfolios_key(code).await,
            },
        }
    }

    async fn handle_overview_key(&mut self, code: KeyCode) {
        if let OverviewState::Failed(_) = self.overview {
            if code == KeyCode::Char('r') {
                self.refresh_overview().await;
            }
            return;
        }

        match code {
            KeyCode::Enter => {
                if let Some(p) = self.overview_portfolios().get(self.selected_overview) {
                    self.mode = AppMode::Detail(p.id.clone());
                }
            }
            KeyCode::Char(c) => {
                if let Some(metric) = Metric::from_key(c) {
                    self.visibility.toggle(metric);
                }
            }
            _ => {}
        }
    }

    async fn handle_portfolios_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('r') => self.refresh_list().await,
            KeyCode::Char('n') => self.mode = AppMode::Form(PortfolioForm::create()),
            KeyCode::Char('e') => {
                if let Some(p) = self.selected_list_portfolio() {
                    self.mode = AppMode::Form(PortfolioForm::edit(p));
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_list_portfolio().map(|p| p.id.clone()) {
                    if self.list.request_delete(&id).is_ok() {
                        self.mode = AppMode::ConfirmDelete;
                    }
                }
            }
            KeyCode::Char('a') => {
                if let Some(id) = self.selected_list_portfolio().map(|p| p.id.clone()) {
                    match self.list.toggle_archived(&id).await {
                        Ok(()) => {
                            self.clamp_portfolio_selection();
                            self.refresh_overview().await;
                        }
                        Err(e) => self.error_message = Some(e.to_string()),
                    }
                }
            }
            _ => {}
        }
    }

    async fn handle_form_key(&mut self, mut form: PortfolioForm, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                return;
            }
            KeyCode::Tab | KeyCode::Down => form.field = form.field.next(),
            KeyCode::BackTab | KeyCode::Up => form.field = form.field.previous(),
            KeyCode::Enter => {
                self.submit_form(form).await;
                return;
            }
            KeyCode::Backspace => {
                if let Some(text) = form.text_field() {
                    text.pop();
                }
            }
            KeyCode::Char(' ') if form.field == FormField::Exclude => {
                form.draft.exclude_from_overview = !form.draft.exclude_from_overview;
            }
            KeyCode::Char(c) => {
                if let Some(text) = form.text_field() {
                    text.push(c);
                }
            }
            _ => {}
        }
        self.mode = AppMode::Form(form);
    }

    async fn submit_form(&mut self, mut form: PortfolioForm) {
        let draft = form.draft.clone();
        let result = match &form.editing {
            Some(id) => self.list.update(id, draft).await.map(|_| ()),
            None => self.list.create(draft).await.map(|_| ()),
        };

        match result {
            Ok(()) => {
                self.mode = AppMode::Normal;
                if form.editing.is_none() {
                    self.selected_portfolio = self.list.portfolios().len().saturating_sub(1);
                }
                self.refresh_overview().await;
            }
            Err(MutationError::Invalid(e)) => {
                form.error = Some(e.to_string());
                self.mode = AppMode::Form(form);
            }
            Err(e) => {
                self.mode = AppMode::Normal;
                self.error_message = Some(e.to_string());
            }
        }
    }
}

pub async fn run_tui<A: PortfolioApi>(
    api: A,
    currency: String,
    date_format: String,
    tab: Option<Tab>,
    disabled_components: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let disabled = DisabledComponents::new(disabled_components);
    let mut app = App::new(api, currency, date_format, disabled);
    if let Some(tab) = tab {
        app.current_tab = tab;
    }

    let res = run_app(&mut terminal, &mut app).await;
    let restored = restore_terminal(&mut terminal);

    session_outcome(res, restored).map_err(Into::into)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()
}

/// A failed dashboard loop wins over a failed terminal restore.
fn session_outcome(res: io::Result<()>, restored: io::Result<()>) -> io::Result<()> {
    res.and(restored)
}

async fn run_app<B: Backend, A: PortfolioApi>(
    terminal: &mut Terminal<B>,
    app: &mut App<A>,
) -> io::Result<()> {
    // Show the loading state while the initial fetches run.
    draw(terminal, app)?;
    app.reload_all().await;

    loop {
        draw(terminal, app)?;

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code).await;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn draw<B: Backend, A: PortfolioApi>(terminal: &mut Terminal<B>, app: &App<A>) -> io::Result<()> {
    terminal
        .draw(|f| ui(f, app))
        .map(|_| ())
        .map_err(|e| io::Error::other(e.to_string()))
}

fn ui<A: PortfolioApi>(f: &mut Frame, app: &App<A>) {
    let chunks = if app.disabled_components.is_disabled(Component::TabBar) {
        vec![f.area()]
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(f.area())
            .to_vec()
    };

    if !app.disabled_components.is_disabled(Component::TabBar) {
        let tab_titles: Vec<Line> = Tab::all()
            .iter()
            .map(|t| {
                let style = if *t == app.current_tab {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                Line::from(Span::styled(t.title(), style))
            })
            .collect();

        let tabs = Tabs::new(tab_titles)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Portfolio Dashboard"),
            )
            .style(Style::default().fg(Color::White))
            .highlight_style(Style::default().fg(Color::Yellow))
            .select(
                Tab::all()
                    .iter()
                    .position(|&t| t == app.current_tab)
                    .unwrap_or(0),
            );

        f.render_widget(tabs, chunks[0]);
    }

    let content_area = chunks[chunks.len() - 1];

    match app.current_tab {
        Tab::Overview => render_overview(f, content_area, app),
        Tab::Portfolios => render_portfolios(f, content_area, app),
    }

    match &app.mode {
        AppMode::Normal => {}
        AppMode::Detail(id) => render_detail(f, app, id),
        AppMode::Form(form) => render_form(f, form),
        AppMode::ConfirmDelete => {
            if let Some(p) = app.list.pending_delete() {
                render_confirm_delete(f, p);
            }
        }
    }

    if let Some(error) = &app.error_message {
        render_error_popup(f, error);
    }
}

fn render_overview<A: PortfolioApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let (data, rows) = match &app.overview {
        OverviewState::Loading => {
            render_loading(f, area);
            return;
        }
        OverviewState::Failed(message) => {
            render_error_banner(f, area, message);
            return;
        }
        OverviewState::Loaded { data, rows } => (data, rows),
    };

    if data.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from("No portfolios yet."),
            Line::from(""),
            Line::from(Span::styled(
                "Press p to manage portfolios",
                Style::default().fg(Color::Yellow),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title("Overview"))
        .alignment(Alignment::Center);
        f.render_widget(empty, area);
        return;
    }

    let shown = |c| !app.disabled_components.is_disabled(c);
    let mut constraints = Vec::new();
    if shown(Component::TotalValue) {
        constraints.push(Constraint::Length(7));
    }
    if shown(Component::HistoryChart) {
        constraints.push(Constraint::Min(10));
    }
    if shown(Component::MetricToggles) {
        constraints.push(Constraint::Length(3));
    }
    if shown(Component::PortfolioTable) {
        let rows = u16::try_from(data.portfolios.len()).unwrap_or(u16::MAX);
        constraints.push(Constraint::Length(rows.saturating_add(4)));
    }
    if shown(Component::Help) {
        constraints.push(Constraint::Length(3));
    }

    if constraints.is_empty() {
        let placeholder = Paragraph::new("All overview components are disabled")
            .block(Block::default().borders(Borders::ALL).title("Overview"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(placeholder, area);
        return;
    }

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);
    let mut chunk_index = 0;

    if shown(Component::TotalValue) {
        render_total_value(f, main_chunks[chunk_index], data, &app.currency);
        chunk_index += 1;
    }

    if shown(Component::HistoryChart) {
        let lines = app.visibility.visible_lines(&data.portfolios);
        render_history_chart(f, main_chunks[chunk_index], rows, &lines, "Portfolio History");
        chunk_index += 1;
    }

    if shown(Component::MetricToggles) {
        render_metric_toggles(f, main_chunks[chunk_index], &app.visibility);
        chunk_index += 1;
    }

    if shown(Component::PortfolioTable) {
        render_overview_table(f, main_chunks[chunk_index], app, &data.portfolios);
        chunk_index += 1;
    }

    if shown(Component::Help) {
        let help_text = Paragraph::new(
            "h/l (tabs) | j/k (select) | Enter (details) | v/c/r/u/g (toggle lines) | p (manage) | q (quit)",
        )
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
        f.render_widget(help_text, main_chunks[chunk_index]);
    }
}

fn render_total_value(f: &mut Frame, area: Rect, data: &OverviewData, currency: &str) {
    let totals = data.totals();
    let big_text_value = format!("{} {currency}", format_with_commas(totals.total_value));

    let big_text = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .lines(vec![big_text_value.clone().into()])
        .build();

    let gain_color = if totals.gain() >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };
    let title = Line::from(vec![
        Span::raw(" Total Value | Gain "),
        Span::styled(
            format_currency(totals.gain(), currency),
            Style::default().fg(gain_color),
        ),
        Span::raw(" | Performance "),
        Span::styled(
            format_percent(totals.performance()),
            Style::default().fg(gain_color),
        ),
        Span::raw(" "),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_alignment(Alignment::Center);
    f.render_widget(block, area);

    let inner = area.inner(ratatui::layout::Margin {
        horizontal: 1,
        vertical: 1,
    });
    // Quadrant pixels are four cells wide per character.
    let big_text_width = big_text_value.chars().count() as u16 * 4;
    let centered_area = if big_text_width < inner.width {
        let margin = (inner.width - big_text_width) / 2;
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(margin),
                Constraint::Min(0),
                Constraint::Length(margin),
            ])
            .split(inner)[1]
    } else {
        inner
    };
    f.render_widget(big_text, centered_area);
}

fn line_style(line: &LineSpec) -> Style {
    let mut style = Style::default().fg(line.color);
    if line.stroke_width > 1 {
        style = style.add_modifier(Modifier::BOLD);
    }
    if line.opacity < 1.0 {
        style = style.add_modifier(Modifier::DIM);
    }
    style
}

fn render_history_chart(f: &mut Frame, area: Rect, rows: &[ChartRow], lines: &[LineSpec], title: &str) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());

    let Some((min_y, max_y)) = value_bounds(rows, lines) else {
        let placeholder = Paragraph::new("No history to chart")
            .block(block)
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(placeholder, area);
        return;
    };
    let (min_y, max_y) = if max_y > min_y {
        (min_y, max_y)
    } else {
        (min_y - 1.0, max_y + 1.0)
    };

    let points: Vec<Vec<(f64, f64)>> = lines
        .iter()
        .map(|line| series_points(rows, &line.key))
        .collect();

    let datasets: Vec<Dataset> = lines
        .iter()
        .zip(&points)
        .map(|(line, data)| {
            let marker = if line.dashed {
                symbols::Marker::Dot
            } else {
                symbols::Marker::Braille
            };
            Dataset::default()
                .name(line.name.clone())
                .marker(marker)
                .graph_type(GraphType::Line)
                .style(line_style(line))
                .data(data)
        })
        .collect();

    let max_x = rows.len().saturating_sub(1).max(1) as f64;
    let first = rows.first().map(|r| r.label.clone()).unwrap_or_default();
    let last = rows.last().map(|r| r.label.clone()).unwrap_or_default();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, max_x])
                .labels(vec![Span::raw(first), Span::raw(last)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y, max_y])
                .labels(vec![
                    Span::raw(format!("{min_y:.0}")),
                    Span::raw(format!("{max_y:.0}")),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_metric_toggles(f: &mut Frame, area: Rect, visibility: &MetricVisibility) {
    let mut spans = Vec::new();
    for metric in Metric::all() {
        let (mark, style) = if visibility.is_visible(metric) {
            ("[x]", Style::default().fg(Color::Yellow))
        } else {
            ("[ ]", Style::default().fg(Color::DarkGray))
        };
        spans.push(Span::styled(
            format!("{mark} {} ({})   ", metric.label(), metric.key()),
            style,
        ));
    }
    let toggles = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Lines"))
        .alignment(Alignment::Center);
    f.render_widget(toggles, area);
}

fn gain_cell(value: f64, currency: &str) -> Cell<'static> {
    let color = if value >= 0.0 { Color::Green } else { Color::Red };
    Cell::from(format_currency(value, currency)).style(Style::default().fg(color))
}

fn render_overview_table<A: PortfolioApi>(
    f: &mut Frame,
    area: Rect,
    app: &App<A>,
    portfolios: &[Portfolio],
) {
    let header = Row::new(
        ["Name", "Value", "Cost", "Gain", "Performance"].map(|h| {
            Cell::from(h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        }),
    )
    .height(1)
    .bottom_margin(1);

    let rows = portfolios.iter().enumerate().map(|(i, p)| {
        let row_style = if i == app.selected_overview {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(p.name.clone()),
            Cell::from(format_currency(p.total_value, &app.currency)),
            Cell::from(format_currency(p.total_cost, &app.currency)),
            gain_cell(p.total_gain_loss, &app.currency),
            Cell::from(format_percent(p.performance())),
        ])
        .style(row_style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(18),
            Constraint::Percentage(18),
            Constraint::Percentage(18),
            Constraint::Percentage(16),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Portfolios"))
    .style(Style::default().fg(Color::White));

    f.render_widget(table, area);
}

fn render_portfolios<A: PortfolioApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    if app.list.portfolios().is_empty() {
        match app.list.state() {
            ListState::Loading | ListState::Submitting => {
                render_loading(f, area);
                return;
            }
            ListState::Failed(message) => {
                render_error_banner(f, area, message);
                return;
            }
            ListState::Idle => {}
        }
    }

    let header = Row::new(["ID", "Name", "Description", "Status"].map(|h| {
        Cell::from(h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .height(1)
    .bottom_margin(1);

    let rows = app.list.portfolios().iter().enumerate().map(|(i, p)| {
        let row_style = if i == app.selected_portfolio {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let mut badges = Vec::new();
        if p.is_archived {
            badges.push(Span::styled("archived ", Style::default().fg(Color::Red)));
        } else {
            badges.push(Span::styled("active ", Style::default().fg(Color::Green)));
        }
        if p.exclude_from_overview {
            badges.push(Span::styled("excluded", Style::default().fg(Color::Gray)));
        }
        let name_style = if p.is_archived {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(p.id.to_string()),
            Cell::from(p.name.clone()).style(name_style),
            Cell::from(p.description().to_string()),
            Cell::from(Line::from(badges)),
        ])
        .style(row_style)
    });

    let mut title = "Manage Portfolios - n (new) | e (edit) | d (delete) | a (archive/unarchive) | r (reload)".to_string();
    if let ListState::Failed(message) = app.list.state() {
        title = format!("{title} - {message}");
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(20),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .style(Style::default().fg(Color::White));

    f.render_widget(table, area);
}

fn render_loading(f: &mut Frame, area: Rect) {
    let loading_text = Paragraph::new("Loading portfolio data...")
        .block(Block::default().borders(Borders::ALL).title("Loading"))
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center);

    f.render_widget(loading_text, area);
}

fn render_error_banner(f: &mut Frame, area: Rect, message: &str) {
    let banner = Paragraph::new(vec![
        Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(Span::styled("Press r to retry", Style::default().fg(Color::Yellow))),
    ])
    .block(Block::default().borders(Borders::ALL).title("Error"))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(banner, area);
}

fn render_detail<A: PortfolioApi>(f: &mut Frame, app: &App<A>, id: &PortfolioId) {
    let OverviewState::Loaded { data, rows } = &app.overview else {
        return;
    };
    let Some((index, portfolio)) = data.portfolios.iter().enumerate().find(|(_, p)| &p.id == id)
    else {
        return;
    };

    let popup_area = centered_rect(80, 70, f.area());
    f.render_widget(Clear, popup_area);

    let main_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", portfolio.name))
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(Color::Black));
    f.render_widget(main_block, popup_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0), Constraint::Length(1)])
        .margin(1)
        .split(popup_area);

    let currency = &app.currency;
    let info = vec![
        Line::from(portfolio.description().to_string()),
        Line::from(format!(
            "Value {} | Cost {}",
            format_currency(portfolio.total_value, currency),
            format_currency(portfolio.total_cost, currency)
        )),
        Line::from(format!(
            "Unrealized {} | Realized {}",
            format_currency(portfolio.total_unrealized_gain_loss, currency),
            format_currency(portfolio.total_realized_gain_loss, currency)
        )),
        Line::from(format!(
            "Total gain {} | Performance {}",
            format_currency(portfolio.total_gain_loss, currency),
            format_percent(portfolio.performance())
        )),
    ];
    f.render_widget(Paragraph::new(info).alignment(Alignment::Center), layout[0]);

    let color = crate::chart::portfolio_color(index);
    let lines = [
        LineSpec {
            key: SeriesKey::PortfolioValue(portfolio.id.clone()),
            name: "Value".to_string(),
            color,
            stroke_width: 2,
            dashed: false,
            opacity: 1.0,
        },
        LineSpec {
            key: SeriesKey::PortfolioCost(portfolio.id.clone()),
            name: "Cost".to_string(),
            color,
            stroke_width: 1,
            dashed: true,
            opacity: 0.5,
        },
    ];
    render_history_chart(f, layout[1], rows, &lines, "History");

    let instructions = Paragraph::new("Esc / Enter: Close")
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);
    f.render_widget(instructions, layout[2]);
}

fn render_form(f: &mut Frame, form: &PortfolioForm) {
    let popup_area = centered_rect(60, 50, f.area());
    f.render_widget(Clear, popup_area);

    let title = if form.editing.is_some() {
        " Edit Portfolio "
    } else {
        " New Portfolio "
    };
    let main_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(Color::Black));
    f.render_widget(main_block, popup_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .margin(1)
        .split(popup_area);

    let field_block = |label: &'static str, field: FormField| {
        let color = if form.field == field {
            Color::Yellow
        } else {
            Color::Gray
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(label)
    };
    let cursor = |field: FormField| if form.field == field { "█" } else { "" };

    let name = Paragraph::new(format!("{}{}", form.draft.name, cursor(FormField::Name)))
        .block(field_block(" Name (required) ", FormField::Name));
    f.render_widget(name, layout[0]);

    let description = Paragraph::new(format!(
        "{}{}",
        form.draft.description,
        cursor(FormField::Description)
    ))
    .block(field_block(" Description ", FormField::Description));
    f.render_widget(description, layout[1]);

    let mark = if form.draft.exclude_from_overview { "[x]" } else { "[ ]" };
    let exclude = Paragraph::new(format!("{mark} Exclude from overview (Space)"))
        .block(field_block(" Options ", FormField::Exclude));
    f.render_widget(exclude, layout[2]);

    if let Some(error) = &form.error {
        let error = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        f.render_widget(error, layout[3]);
    }

    let instructions = Paragraph::new("Tab: Next field | Enter: Save | Esc: Cancel")
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);
    f.render_widget(instructions, layout[4]);
}

fn render_confirm_delete(f: &mut Frame, portfolio: &Portfolio) {
    let popup_area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, popup_area);

    let text = vec![
        Line::from(format!("Delete portfolio \"{}\"?", portfolio.name)),
        Line::from("This cannot be undone."),
        Line::from(""),
        Line::from(Span::styled("y: Delete | n: Cancel", Style::default().fg(Color::Cyan))),
    ];
    let confirm = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm")
                .style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center);
    f.render_widget(confirm, popup_area);
}

fn render_error_popup(f: &mut Frame, error: &str) {
    let popup_area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, popup_area);

    let error_paragraph = Paragraph::new(error)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(error_paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{PortfolioHistoryDay, PortfolioSnapshot};
    use crate::manager::tests::FakeApi;
    use crate::portfolio::sample;
    use ratatui::backend::TestBackend;

    fn api() -> FakeApi {
        let api = FakeApi::with(vec![
            sample("1", "Core", 150.0, 100.0, 0.0),
            sample("2", "Satellite", 40.0, 50.0, 0.0),
        ]);
        *api.history.lock().unwrap() = vec![
            PortfolioHistoryDay {
                date: "2024-01-01".parse().unwrap(),
                portfolios: vec![PortfolioSnapshot {
                    id: PortfolioId::from("1"),
                    value: Some(100.0),
                    cost: Some(100.0),
                    realized_gain: None,
                }],
            },
            PortfolioHistoryDay {
                date: "2024-01-02".parse().unwrap(),
                portfolios: vec![
                    PortfolioSnapshot {
                        id: PortfolioId::from("1"),
                        value: Some(150.0),
                        cost: Some(100.0),
                        realized_gain: None,
                    },
                    PortfolioSnapshot {
                        id: PortfolioId::from("2"),
                        value: Some(40.0),
                        cost: Some(50.0),
                        realized_gain: None,
                    },
                ],
            },
        ];
        api
    }

    async fn app() -> App<FakeApi> {
        let mut app = App::new(
            api(),
            "USD".to_string(),
            "%Y-%m-%d".to_string(),
            DisabledComponents::default(),
        );
        app.reload_all().await;
        app
    }

    fn screen(app: &App<FakeApi>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 50)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn component_names_parse() {
        for component in Component::all() {
            assert_eq!(Component::from_str(component.as_str()), Ok(component));
        }
        assert_eq!(Component::from_str(" Help "), Ok(Component::Help));
        assert!(Component::from_str("bogus").is_err());

        let disabled = DisabledComponents::new(&["help".to_string(), "nope".to_string()]);
        assert!(disabled.is_disabled(Component::Help));
        assert!(!disabled.is_disabled(Component::TabBar));
    }

    #[test]
    fn tab_names() {
        assert_eq!(Tab::from_name("Portfolios"), Some(Tab::Portfolios));
        assert_eq!(Tab::from_name("balances"), None);
    }

    #[tokio::test]
    async fn overview_renders_portfolios() {
        let app = app().await;
        assert!(matches!(app.overview, OverviewState::Loaded { .. }));
        let text = screen(&app);
        assert!(text.contains("Portfolio History"));
        assert!(text.contains("Satellite"));
        assert!(text.contains("[x] Value (v)"));
    }

    #[tokio::test]
    async fn empty_overview_points_to_management() {
        let mut app = App::new(
            FakeApi::with(vec![]),
            "USD".to_string(),
            "%Y-%m-%d".to_string(),
            DisabledComponents::default(),
        );
        app.reload_all().await;
        assert!(screen(&app).contains("Press p to manage portfolios"));

        app.handle_key(KeyCode::Char('p')).await;
        assert_eq!(app.current_tab, Tab::Portfolios);
    }

    #[tokio::test]
    async fn failed_overview_retries_with_r() {
        let mut app = app().await;
        *app.list.api().fail_history.lock().unwrap() = true;
        app.refresh_overview().await;
        assert!(matches!(app.overview, OverviewState::Failed(_)));
        assert!(screen(&app).contains("Press r to retry"));

        *app.list.api().fail_history.lock().unwrap() = false;
        app.handle_key(KeyCode::Char('r')).await;
        assert!(matches!(app.overview, OverviewState::Loaded { .. }));
        // the retry key did not toggle the realized line
        assert!(!app.visibility.realized_gain);
    }

    #[tokio::test]
    async fn metric_keys_toggle_lines() {
        let mut app = app().await;
        app.handle_key(KeyCode::Char('g')).await;
        assert!(app.visibility.total_gain);
        app.handle_key(KeyCode::Char('g')).await;
        assert_eq!(app.visibility, MetricVisibility::default());
    }

    #[tokio::test]
    async fn enter_opens_detail() {
        let mut app = app().await;
        app.handle_key(KeyCode::Char('j')).await;
        app.handle_key(KeyCode::Enter).await;
        assert_eq!(app.mode, AppMode::Detail(PortfolioId::from("2")));
        assert!(screen(&app).contains("Esc / Enter: Close"));
        app.handle_key(KeyCode::Esc).await;
        assert_eq!(app.mode, AppMode::Normal);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn create_through_form() {
        let mut app = app().await;
        app.handle_key(KeyCode::Char('2')).await;
        app.handle_key(KeyCode::Char('n')).await;

        // empty name is rejected inline
        app.handle_key(KeyCode::Enter).await;
        match &app.mode {
            AppMode::Form(form) => assert_eq!(form.error.as_deref(), Some("Name is required")),
            other => panic!("expected form, got {other:?}"),
        }

        for c in "Bonds".chars() {
            app.handle_key(KeyCode::Char(c)).await;
        }
        app.handle_key(KeyCode::Tab).await;
        app.handle_key(KeyCode::Tab).await;
        app.handle_key(KeyCode::Char(' ')).await;
        app.handle_key(KeyCode::Enter).await;

        assert_eq!(app.mode, AppMode::Normal);
        let created = app.list.portfolios().last().unwrap();
        assert_eq!(created.name, "Bonds");
        assert!(created.exclude_from_overview);
        assert_eq!(app.selected_portfolio, 2);
    }

    #[tokio::test]
    async fn delete_asks_first() {
        let mut app = app().await;
        app.current_tab = Tab::Portfolios;
        app.handle_key(KeyCode::Char('d')).await;
        assert_eq!(app.mode, AppMode::ConfirmDelete);
        assert!(screen(&app).contains("Delete portfolio \"Core\"?"));

        app.handle_key(KeyCode::Char('n')).await;
        assert_eq!(app.list.portfolios().len(), 2);

        app.handle_key(KeyCode::Char('d')).await;
        app.handle_key(KeyCode::Char('y')).await;
        let names: Vec<&str> = app.list.portfolios().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Satellite"]);
    }

    #[tokio::test]
    async fn failed_mutation_shows_popup() {
        let mut app = app().await;
        app.current_tab = Tab::Portfolios;
        app.list.api().set_failing(true);
        app.handle_key(KeyCode::Char('a')).await;
        assert!(app
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Archive failed"));
        assert!(!app.list.portfolios()[0].is_archived);

        // any key dismisses the popup without acting
        app.handle_key(KeyCode::Char('q')).await;
        assert!(app.error_message.is_none());
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn archive_badge_follows_backend() {
        let mut app = app().await;
        app.current_tab = Tab::Portfolios;
        app.handle_key(KeyCode::Char('a')).await;
        assert!(app.list.portfolios()[0].is_archived);
        assert!(screen(&app).contains("archived"));
    }

    #[tokio::test]
    async fn long_portfolio_list_renders() {
        let portfolios = (0..70_000)
            .map(|i| sample(&i.to_string(), &format!("P{i}"), 1.0, 1.0, 0.0))
            .collect();
        let mut app = App::new(
            FakeApi::with(portfolios),
            "USD".to_string(),
            "%Y-%m-%d".to_string(),
            DisabledComponents::new(&["history_chart".to_string(), "metric_toggles".to_string()]),
        );
        app.refresh_overview().await;
        assert!(screen(&app).contains("Total Value"));
    }

    #[test]
    fn loop_error_is_reported_after_restore() {
        let failed = session_outcome(Err(io::Error::other("draw failed")), Ok(()));
        assert_eq!(failed.unwrap_err().to_string(), "draw failed");

        let both = session_outcome(
            Err(io::Error::other("draw failed")),
            Err(io::Error::other("restore failed")),
        );
        assert_eq!(both.unwrap_err().to_string(), "draw failed");

        let restore = session_outcome(Ok(()), Err(io::Error::other("restore failed")));
        assert_eq!(restore.unwrap_err().to_string(), "restore failed");
        assert!(session_outcome(Ok(()), Ok(())).is_ok());
    }
}

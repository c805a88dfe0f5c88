pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use typemaster::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    corpus::RandomPicker,
    engine::{SessionPorts, TickOutcome, TypingSession},
    error::SessionError,
    metrics::OverflowPolicy,
    prefs::{FilePreferenceCache, Identity},
    runtime::{
        spawn_terminal_reader, AppEvent, ChannelEventSource, EventSource, FixedTicker, Runner,
        ThreadScheduler, Ticker,
    },
    scores::{
        export_csv_file, load_listing, ScoreListing, ScoreScope, ScoreStore, ScoreUploader,
        SqliteScoreStore,
    },
    session::Phase,
    tier::{Catalog, TierId, DURATION_OPTIONS},
};

const REDRAW_MS: u64 = 100;

/// timed typing trainer with live wpm, accuracy and a shared leaderboard
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A timed typing trainer for the terminal. Pick a difficulty tier and a duration, type the prompt before the countdown runs out, and compare your results on a shared leaderboard."
)]
pub struct Cli {
    /// difficulty tier to start on (defaults to the last one used)
    #[clap(short, long, value_enum)]
    tier: Option<TierId>,

    /// number of seconds to run the test: 30, 60, 90, 120, 150 or 180
    #[clap(short, long, value_parser = parse_secs)]
    secs: Option<u32>,

    /// name to record scores under
    #[clap(short, long, requires = "email")]
    name: Option<String>,

    /// email to record scores under
    #[clap(short, long, requires = "name")]
    email: Option<String>,

    /// ignore characters typed past the end of the prompt when scoring accuracy
    #[clap(long)]
    clamp_overflow: bool,

    /// open on the score table
    #[clap(long)]
    scores: bool,

    /// write every stored score to this file as csv and exit
    #[clap(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// location of the score database
    #[clap(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

fn parse_secs(s: &str) -> Result<u32, String> {
    let secs: u32 = s.parse().map_err(|e| format!("{e}"))?;
    if DURATION_OPTIONS.contains(&secs) {
        Ok(secs)
    } else {
        Err(format!("must be one of {DURATION_OPTIONS:?}"))
    }
}

impl Cli {
    /// Flags override the stored config for this run
    fn apply_to(&self, config: &mut Config) {
        if let Some(tier) = self.tier {
            config.tier = tier;
        }
        if let Some(secs) = self.secs {
            config.duration_secs = Some(secs);
        }
        if self.clamp_overflow {
            config.overflow = OverflowPolicy::Clamp;
        }
    }

    fn identity(&self) -> Option<Identity> {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => Some(Identity::new(name.as_str(), email.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Identity,
    Setup,
    Typing,
    Results,
    Scores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityField {
    #[default]
    Name,
    Email,
}

#[derive(Debug, Default)]
pub struct IdentityForm {
    pub name: String,
    pub email: String,
    pub focus: IdentityField,
    pub error: Option<String>,
}

impl IdentityForm {
    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            IdentityField::Name => &mut self.name,
            IdentityField::Email => &mut self.email,
        }
    }

    fn switch_field(&mut self) {
        self.focus = match self.focus {
            IdentityField::Name => IdentityField::Email,
            IdentityField::Email => IdentityField::Name,
        };
    }
}

#[derive(Debug)]
pub struct ScoresView {
    pub scope: ScoreScope,
    pub listing: ScoreListing,
    pub scroll_offset: usize,
    pub return_to: AppState,
}

impl Default for ScoresView {
    fn default() -> Self {
        Self {
            scope: ScoreScope::Everyone,
            listing: ScoreListing::default(),
            scroll_offset: 0,
            return_to: AppState::Setup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitType {
    Continue,
    Quit,
}

pub struct App {
    pub engine: TypingSession,
    pub state: AppState,
    pub identity_form: IdentityForm,
    pub scores: ScoresView,
    pub config: Config,
    pub notice: Option<String>,
    config_store: Box<dyn ConfigStore>,
}

impl App {
    pub fn new(engine: TypingSession, config: Config, config_store: Box<dyn ConfigStore>) -> Self {
        let state = if engine.identity().is_some() {
            AppState::Setup
        } else {
            AppState::Identity
        };
        Self {
            engine,
            state,
            identity_form: IdentityForm::default(),
            scores: ScoresView::default(),
            config,
            notice: None,
            config_store,
        }
    }

    fn handle_event(&mut self, event: AppEvent) -> ExitType {
        match event {
            AppEvent::Key(key) => return self.handle_key(key),
            AppEvent::Tick(generation) => {
                if let TickOutcome::Completed(_, record) = self.engine.tick(generation) {
                    info!(wpm = record.wpm, accuracy = record.accuracy, "showing results");
                }
            }
            AppEvent::Saved(report) => self.engine.apply_save_report(&report),
            AppEvent::Resize | AppEvent::Redraw => {}
        }
        self.follow_engine();
        ExitType::Continue
    }

    fn handle_key(&mut self, key: KeyEvent) -> ExitType {
        if key.kind == KeyEventKind::Release {
            return ExitType::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ExitType::Quit;
        }

        let exit = match self.state {
            AppState::Identity => self.on_identity_key(key),
            AppState::Setup => self.on_setup_key(key),
            AppState::Typing => self.on_typing_key(key),
            AppState::Results => self.on_results_key(key),
            AppState::Scores => self.on_scores_key(key),
        };
        self.follow_engine();
        exit
    }

    /// Keep the session screens in step with the engine phase
    fn follow_engine(&mut self) {
        if matches!(
            self.state,
            AppState::Setup | AppState::Typing | AppState::Results
        ) {
            self.state = match self.engine.phase() {
                Phase::Idle => AppState::Setup,
                Phase::Running => AppState::Typing,
                Phase::Completed => AppState::Results,
            };
        }
    }

    fn on_identity_key(&mut self, key: KeyEvent) -> ExitType {
        let form = &mut self.identity_form;
        match key.code {
            KeyCode::Esc => self.state = AppState::Setup,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.switch_field(),
            KeyCode::Backspace => {
                form.field_mut().pop();
            }
            KeyCode::Enter => {
                let identity = Identity::new(form.name.as_str(), form.email.as_str());
                match self.engine.set_identity(identity) {
                    Ok(()) => {
                        self.identity_form = IdentityForm::default();
                        self.state = AppState::Setup;
                    }
                    Err(SessionError::Persist(reason)) => {
                        warn!(%reason, "identity not remembered");
                        self.notice = Some(format!("identity not remembered: {reason}"));
                        self.identity_form = IdentityForm::default();
                        self.state = AppState::Setup;
                    }
                    Err(e) => form.error = Some(e.to_string()),
                }
            }
            KeyCode::Char(c) => {
                form.error = None;
                form.field_mut().push(c);
            }
            _ => {}
        }
        ExitType::Continue
    }

    fn on_setup_key(&mut self, key: KeyEvent) -> ExitType {
        let tier = self.engine.config().tier;
        let secs = self.engine.config().duration_secs;
        let catalog = self.engine.catalog();
        match key.code {
            KeyCode::Esc => return ExitType::Quit,
            KeyCode::Up | KeyCode::Down => {
                let next = catalog.cycle_tier(tier, key.code == KeyCode::Down);
                self.reconfigure(next, secs);
            }
            KeyCode::Left | KeyCode::Right => {
                let next = catalog.cycle_duration(secs, key.code == KeyCode::Right);
                self.reconfigure(tier, next);
            }
            KeyCode::Tab => self.open_scores(),
            KeyCode::Enter => {
                self.engine.start();
            }
            KeyCode::Char(c) => {
                self.notice = None;
                self.engine.type_character(c);
            }
            _ => {}
        }
        ExitType::Continue
    }

    fn on_typing_key(&mut self, key: KeyEvent) -> ExitType {
        match key.code {
            KeyCode::Esc => self.engine.reset(),
            KeyCode::Backspace => self.engine.backspace(),
            KeyCode::Char(c) => self.engine.type_character(c),
            _ => {}
        }
        ExitType::Continue
    }

    fn on_results_key(&mut self, key: KeyEvent) -> ExitType {
        match key.code {
            KeyCode::Esc => return ExitType::Quit,
            KeyCode::Char('r') | KeyCode::Enter => self.engine.reset(),
            KeyCode::Char('s') => self.open_scores(),
            _ => {}
        }
        ExitType::Continue
    }

    fn on_scores_key(&mut self, key: KeyEvent) -> ExitType {
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
                self.state = self.scores.return_to;
            }
            KeyCode::Char('m') => {
                self.scores.scope = match (&self.scores.scope, self.engine.identity()) {
                    (ScoreScope::Everyone, Some(identity)) => ScoreScope::Mine(identity.email.clone()),
                    _ => ScoreScope::Everyone,
                };
                self.reload_scores();
            }
            KeyCode::Char('r') => self.reload_scores(),
            KeyCode::Up => {
                self.scores.scroll_offset = self.scores.scroll_offset.saturating_sub(1);
            }
            KeyCode::Down => {
                let max = self.scores.listing.records.len().saturating_sub(1);
                self.scores.scroll_offset = (self.scores.scroll_offset + 1).min(max);
            }
            KeyCode::Home => self.scores.scroll_offset = 0,
            _ => {}
        }
        ExitType::Continue
    }

    fn reconfigure(&mut self, tier: TierId, secs: u32) {
        if let Err(e) = self.engine.configure(tier, secs) {
            warn!(error = %e, "configuration rejected");
            self.notice = Some(e.to_string());
            return;
        }
        self.config.tier = tier;
        self.config.duration_secs = Some(secs);
        if let Err(e) = self.config_store.save(&self.config) {
            warn!(error = %e, "failed to save config");
        }
    }

    pub fn open_scores(&mut self) {
        let return_to = match self.state {
            AppState::Scores => self.scores.return_to,
            AppState::Identity => AppState::Setup,
            other => other,
        };
        let scope = match self.engine.identity() {
            Some(identity) => ScoreScope::Mine(identity.email.clone()),
            None => ScoreScope::Everyone,
        };
        self.scores = ScoresView {
            scope,
            listing: ScoreListing::default(),
            scroll_offset: 0,
            return_to,
        };
        self.reload_scores();
        self.state = AppState::Scores;
    }

    fn reload_scores(&mut self) {
        let store = self.engine.uploader().store();
        self.scores.listing = load_listing(store.as_ref(), &self.scores.scope);
        self.scores.scroll_offset = 0;
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(dir) = path.parent() {
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();
    info!("typemaster starting");

    let db_path = match cli.db.clone().or_else(AppDirs::db_path) {
        Some(path) => path,
        None => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::Io, "could not determine where to keep the score database, pass --db")
                .exit();
        }
    };
    let store: Arc<dyn ScoreStore> = Arc::new(SqliteScoreStore::open(&db_path)?);

    if let Some(path) = &cli.export {
        let records = store.list_all()?;
        export_csv_file(&records, path)?;
        println!("exported {} scores to {}", records.len(), path.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);

    let catalog = Catalog::default();
    let session_config = config.session_config(&catalog);
    let prefs_path = AppDirs::prefs_path().unwrap_or_else(|| PathBuf::from("typemaster_prefs.json"));

    let (tx, rx) = mpsc::channel();
    let ports = SessionPorts {
        picker: Box::new(RandomPicker::new()?),
        scheduler: Box::new(ThreadScheduler::new(tx.clone())),
        prefs: Box::new(FilePreferenceCache::with_path(prefs_path)),
        uploader: ScoreUploader::background(Arc::clone(&store), tx.clone()),
    };
    let mut engine = TypingSession::new(catalog, session_config, ports)?;
    engine.set_sessions_target(config.sessions_target);

    if let Some(identity) = cli.identity() {
        match engine.set_identity(identity) {
            Ok(()) => {}
            Err(SessionError::Persist(reason)) => warn!(%reason, "identity not remembered"),
            Err(e) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::ValueValidation, e.to_string()).exit();
            }
        }
    }

    let mut app = App::new(engine, config, Box::new(config_store));
    if cli.scores {
        app.open_scores();
    }

    spawn_terminal_reader(tx);
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(REDRAW_MS)),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!(error = %e, "tui exited with an error");
    }
    info!("typemaster exiting");
    result
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;
        if app.handle_event(runner.step()) == ExitType::Quit {
            break;
        }
    }
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

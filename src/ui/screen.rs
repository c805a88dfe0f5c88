use ratatui::{buffer::Buffer, layout::Rect};

use crate::{ui, App, AppState};

/// A UI Screen boundary: draws one app state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

/// Name and email entry shown before the first attempt
pub struct IdentityScreen;

impl Screen for IdentityScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ui::render_identity(app, area, buf);
    }
}

/// Tier and duration selection with the stats panel
pub struct SetupScreen;

impl Screen for SetupScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ui::render_setup(app, area, buf);
    }
}

pub struct TypingScreen;

impl Screen for TypingScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ui::render_typing(app, area, buf);
    }
}

pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ui::render_results(app, area, buf);
    }
}

/// Leaderboard table
pub struct ScoresScreen;

impl Screen for ScoresScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ui::render_scores(app, area, buf);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Identity => Box::new(IdentityScreen),
        AppState::Setup => Box::new(SetupScreen),
        AppState::Typing => Box::new(TypingScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::Scores => Box::new(ScoresScreen),
    }
}

pub mod charting;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, Gauge, GraphType, Paragraph, Row, Table,
        Widget, Wrap,
    },
};
use typemaster::{scores::ScoreScope, session::SyncStatus, time_series, util};
use unicode_width::UnicodeWidthStr;

use crate::{App, IdentityField};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold_style() -> Style {
    bold_style().add_modifier(Modifier::DIM)
}

fn italic_style() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(&self.state).render(self, area, buf);
    }
}

fn legend(text: &str, area: Rect, buf: &mut Buffer) {
    Paragraph::new(Span::styled(text.to_string(), italic_style()))
        .alignment(Alignment::Center)
        .render(area, buf);
}

pub(crate) fn render_identity(app: &App, area: Rect, buf: &mut Buffer) {
    let form = &app.identity_form;
    let width = area.width.min(60);
    let column = Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(2), // heading
            Constraint::Length(3), // name
            Constraint::Length(3), // email
            Constraint::Length(1), // validation error
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
            Constraint::Min(0),
        ])
        .split(column);

    Paragraph::new(vec![
        Line::from(Span::styled("who is typing?", bold_style())),
        Line::from(Span::styled(
            "scores go on the shared leaderboard under this name",
            dim_bold_style(),
        )),
    ])
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let fields = [
        ("name", &form.name, IdentityField::Name, chunks[2]),
        ("email", &form.email, IdentityField::Email, chunks[3]),
    ];
    for (title, value, field, rect) in fields {
        let focused = form.focus == field;
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        let text = if focused {
            format!("{value}_")
        } else {
            value.to_string()
        };
        Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(title),
            )
            .render(rect, buf);
    }

    if let Some(error) = &form.error {
        Paragraph::new(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        ))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
    }

    legend(
        "(tab) switch field / (enter) save / (esc) skip",
        chunks[6],
        buf,
    );
}

pub(crate) fn render_setup(app: &App, area: Rect, buf: &mut Buffer) {
    let engine = &app.engine;
    let tiers = engine.catalog().tiers();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),                      // title
            Constraint::Length(1),                      // padding
            Constraint::Length(tiers.len() as u16 + 2), // tier list
            Constraint::Length(1),                      // duration
            Constraint::Length(3),                      // stats gauge
            Constraint::Length(1),                      // identity
            Constraint::Min(1),                         // prompt preview
            Constraint::Length(1),                      // notice
            Constraint::Length(1),                      // legend
        ])
        .split(area);

    Paragraph::new(Span::styled("typemaster", bold_style()))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let selected = engine.config().tier;
    let tier_lines: Vec<Line> = tiers
        .iter()
        .map(|tier| {
            if tier.id == selected {
                Line::from(vec![
                    Span::styled(
                        format!("> {:<14}", tier.display_name),
                        bold_style().fg(Color::Green),
                    ),
                    Span::raw(tier.description.clone()),
                ])
            } else {
                Line::from(Span::styled(
                    format!("  {:<14}{}", tier.display_name, tier.description),
                    dim_bold_style(),
                ))
            }
        })
        .collect();
    Paragraph::new(tier_lines)
        .block(Block::default().borders(Borders::ALL).title("difficulty"))
        .render(chunks[2], buf);

    Paragraph::new(Line::from(vec![
        Span::styled("duration  ", dim_bold_style()),
        Span::styled(
            format!("< {} >", util::clock(engine.config().duration_secs)),
            bold_style(),
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    let stats = engine.stats();
    Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("your stats"))
        .gauge_style(Style::default().fg(Color::Magenta))
        .ratio(stats.progress())
        .label(format!(
            "avg {} wpm / avg {}% acc / {} of {} sessions",
            stats.average_wpm,
            stats.average_accuracy,
            stats.sessions_completed,
            stats.sessions_target
        ))
        .render(chunks[4], buf);

    let who = match engine.identity() {
        Some(identity) => format!("typing as {} <{}>", identity.name, identity.email),
        None => "typing anonymously, scores stay on this machine".to_string(),
    };
    Paragraph::new(Span::styled(who, italic_style()))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

    Paragraph::new(Span::styled(
        engine.state().prompt.clone(),
        dim_bold_style(),
    ))
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::TOP).title("prompt"))
    .render(chunks[6], buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Yellow),
        ))
        .alignment(Alignment::Center)
        .render(chunks[7], buf);
    }

    legend(
        "(↑/↓) tier / (←/→) duration / type or (enter) to start / (tab) scores / (esc)ape",
        chunks[8],
        buf,
    );
}

pub(crate) fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let state = app.engine.state();
    let prompt = &state.prompt;

    let green_bold_style = bold_style().fg(Color::Green);
    let red_bold_style = bold_style().fg(Color::Red);
    let underlined_dim_bold_style = dim_bold_style().add_modifier(Modifier::UNDERLINED);

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_occupied_lines = if prompt.width() <= max_chars_per_line as usize {
        1
    } else {
        ((prompt.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };
    let gap = area.height.saturating_sub(prompt_occupied_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(gap),
            Constraint::Length(2), // timer and live metrics
            Constraint::Length(prompt_occupied_lines),
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let typed: Vec<char> = state.typed.chars().collect();
    let mut spans: Vec<Span> = prompt
        .chars()
        .enumerate()
        .map(|(idx, expected)| match typed.get(idx) {
            Some(&c) if c == expected => Span::styled(expected.to_string(), green_bold_style),
            Some(&c) => Span::styled(
                match c {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                },
                red_bold_style,
            ),
            None if idx == typed.len() => {
                Span::styled(expected.to_string(), underlined_dim_bold_style)
            }
            None => Span::styled(expected.to_string(), dim_bold_style()),
        })
        .collect();

    // characters typed past the end of the prompt
    spans.extend(
        typed
            .iter()
            .skip(prompt.chars().count())
            .map(|c| Span::styled(c.to_string(), red_bold_style)),
    );

    Paragraph::new(Line::from(spans))
        .alignment(if prompt_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        format!(
            "{}   {} wpm   {}% acc",
            util::clock(state.remaining_secs),
            state.live.wpm,
            state.live.accuracy
        ),
        dim_bold_style(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    legend("(esc) abandon attempt", chunks[4], buf);
}

fn sync_style(sync: &SyncStatus) -> Style {
    match sync {
        SyncStatus::Saved => Style::default().fg(Color::Green),
        SyncStatus::Pending => Style::default().fg(Color::Yellow),
        SyncStatus::Failed(_) => bold_style().fg(Color::Red),
        SyncStatus::Idle | SyncStatus::Skipped => dim_bold_style(),
    }
}

pub(crate) fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let engine = &app.engine;
    let state = engine.state();
    let duration_secs = engine.config().duration_secs;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),    // chart
            Constraint::Length(1), // stats
            Constraint::Length(1), // leaderboard status
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    let points = time_series::to_points(&state.wpm_samples);
    let (overall_duration, highest_wpm) = charting::compute_chart_params(&points, duration_secs);

    let datasets = vec![Dataset::default()
        .marker(ratatui::symbols::Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(&points)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("seconds")
                .bounds([1.0, overall_duration])
                .labels(vec![
                    Span::styled("1", bold_style()),
                    Span::styled(charting::format_label(overall_duration), bold_style()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold_style()),
                    Span::styled(charting::format_label(highest_wpm), bold_style()),
                ]),
        )
        .render(chunks[0], buf);

    let (wpm, accuracy) = engine
        .last_record()
        .map(|r| (r.wpm, r.accuracy))
        .unwrap_or((state.live.wpm, state.live.accuracy));
    Paragraph::new(Span::styled(
        format!(
            "{} wpm   {}% acc   {:.2} sd   {} / {}s",
            wpm,
            accuracy,
            state.wpm_spread().unwrap_or(0.0),
            engine.tier().display_name,
            duration_secs
        ),
        bold_style(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(engine.sync().label(), sync_style(engine.sync())))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    legend("(r)etry / (s)cores / (esc)ape", chunks[4], buf);
}

pub(crate) fn render_scores(app: &App, area: Rect, buf: &mut Buffer) {
    let view = &app.scores;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(3),    // table
            Constraint::Length(1), // best per tier
            Constraint::Length(1), // legend
        ])
        .split(area);

    let title = match &view.scope {
        ScoreScope::Mine(email) => format!("scores: mine ({email})"),
        ScoreScope::Everyone => "scores: everyone".to_string(),
    };
    Paragraph::new(Span::styled(title, bold_style().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let block = Block::default().borders(Borders::ALL);
    if view.listing.load_failed {
        Paragraph::new(Span::styled(
            "failed to load scores, press (r) to try again",
            bold_style().fg(Color::Red),
        ))
        .alignment(Alignment::Center)
        .block(block)
        .render(chunks[1], buf);
    } else if view.listing.records.is_empty() {
        Paragraph::new(Span::styled("no scores yet", dim_bold_style()))
            .alignment(Alignment::Center)
            .block(block)
            .render(chunks[1], buf);
    } else {
        // borders and header
        let visible = chunks[1].height.saturating_sub(3) as usize;
        let rows: Vec<Row> = view
            .listing
            .records
            .iter()
            .skip(view.scroll_offset)
            .take(visible)
            .map(|r| {
                Row::new(vec![
                    Cell::from(r.completed_on()),
                    Cell::from(r.name.clone()),
                    Cell::from(r.difficulty.clone()),
                    Cell::from(format!("{}s", r.duration_secs)),
                    Cell::from(r.wpm.to_string()),
                    Cell::from(format!("{}%", r.accuracy)),
                ])
            })
            .collect();

        let header = Row::new(vec!["date", "name", "tier", "time", "wpm", "acc"])
            .style(bold_style().fg(Color::Yellow));

        Table::new(
            rows,
            [
                Constraint::Length(11),
                Constraint::Min(10),
                Constraint::Length(13),
                Constraint::Length(5),
                Constraint::Length(5),
                Constraint::Length(5),
            ],
        )
        .header(header)
        .block(block.title(format!("{} attempts", view.listing.records.len())))
        .render(chunks[1], buf);
    }

    let best = view
        .listing
        .best_per_tier()
        .into_iter()
        .map(|(tier, wpm)| format!("{tier} {wpm} wpm"))
        .collect::<Vec<_>>()
        .join(" / ");
    if !best.is_empty() {
        Paragraph::new(Span::styled(format!("best: {best}"), italic_style()))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }

    legend(
        "(m)ine or everyone / (r)eload / (↑/↓) scroll / (b)ack",
        chunks[3],
        buf,
    );
}

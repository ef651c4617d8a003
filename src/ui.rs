use chrono::{DateTime, Local};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{App, ThemeMode};
use crate::delay::DelayStatus;
use crate::destination::Icon;
use crate::prediction::{Outcome, Prediction, Route};

struct Theme {
    accent: Color,
    good: Color,
    warn: Color,
    danger: Color,
    dim: Color,
    text: Color,
    header_bg: Color,
    panel_bg: Color,
}

pub fn ui(f: &mut Frame, app: &App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let now = Local::now();
    render_header(f, chunks[0], app);
    render_body(f, chunks[1], app, now);
    render_footer(f, chunks[2], app);

    if app.show_help {
        render_help(f, area, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let (status, status_color) = if app.suspended {
        (app.strings.suspended.to_string(), theme.warn)
    } else if let Some(err) = &app.last_error {
        (format!("ERR: {err}"), theme.danger)
    } else {
        ("OK".to_string(), theme.good)
    };
    let next_poll = app
        .next_poll()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string());

    let line = Line::from(vec![
        Span::styled(
            "COMMUTE",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("FROM {}", app.origin), Style::default().fg(theme.text)),
        Span::raw("  "),
        Span::styled(
            format!("DEST {}", app.destinations().len()),
            Style::default().fg(theme.dim),
        ),
        Span::raw("  "),
        Span::styled(format!("NEXT {next_poll}"), Style::default().fg(theme.dim)),
        Span::raw("  "),
        Span::styled(
            status,
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.dim))
        .style(Style::default().bg(theme.header_bg));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_body(f: &mut Frame, area: Rect, app: &App, now: DateTime<Local>) {
    let theme = theme(app.theme_mode);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.dim))
        .title(Span::styled(
            format!(" {} ", app.instance_id),
            Style::default().fg(theme.accent),
        ))
        .style(Style::default().bg(theme.panel_bg));

    let lines = if app.loading {
        vec![Line::from(Span::styled(
            app.strings.loading,
            Style::default().fg(theme.dim),
        ))]
    } else if !app.in_window || app.state.predictions.is_empty() {
        vec![Line::from(Span::styled(
            app.strings.no_destinations,
            Style::default().fg(theme.dim),
        ))]
    } else {
        app.state
            .predictions
            .iter()
            .flat_map(|p| prediction_lines(app, p, now, &theme))
            .collect()
    };

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn prediction_lines(
    app: &App,
    prediction: &Prediction,
    now: DateTime<Local>,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let dest = &prediction.destination;
    let icon_color = dest
        .color
        .as_deref()
        .and_then(parse_color)
        .unwrap_or(theme.accent);
    let mut head = vec![
        Span::styled(
            format!("{} ", glyph(prediction.icon())),
            Style::default().fg(icon_color),
        ),
        Span::styled(
            dest.label.clone(),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        ),
    ];

    let routes = match &prediction.outcome {
        Outcome::Error(message) => {
            head.push(Span::raw("  "));
            head.push(Span::styled(
                format!("⚠ {}: {message}", app.strings.error),
                Style::default().fg(theme.danger),
            ));
            return vec![Line::from(head)];
        }
        Outcome::Routes(routes) => routes,
    };

    let Some(first) = routes.first() else {
        return vec![Line::from(head)];
    };

    if routes.len() > 1 && app.display.show_summary {
        let mut lines = vec![Line::from(head)];
        for route in routes {
            let mut spans = vec![Span::raw("    ")];
            spans.extend(route_description(app, route, theme));
            spans.push(Span::raw("  "));
            spans.push(travel_time_span(app, prediction, route, now, theme));
            lines.push(Line::from(spans));
        }
        return lines;
    }

    head.push(Span::raw("  "));
    head.push(travel_time_span(app, prediction, first, now, theme));
    let mut lines = vec![Line::from(head)];
    let description = route_description(app, first, theme);
    if (!first.transit.is_empty() || app.display.show_summary) && !description.is_empty() {
        let mut spans = vec![Span::raw("    ")];
        spans.extend(description);
        lines.push(Line::from(spans));
    }
    lines
}

/// Transit legs with the next departure, or the route summary.
fn route_description(app: &App, route: &Route, theme: &Theme) -> Vec<Span<'static>> {
    if route.transit.is_empty() {
        if route.summary.trim().is_empty() {
            return Vec::new();
        }
        return vec![Span::styled(
            format!("via {}", route.summary.trim()),
            Style::default().fg(theme.dim),
        )];
    }

    let mut spans = Vec::new();
    for (idx, leg) in route.transit.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(theme.dim)));
        }
        spans.push(Span::raw(format!("{} ", glyph(leg.vehicle.icon()))));
        spans.push(Span::styled(leg.line.clone(), Style::default().fg(theme.text)));
    }
    if let Some(departure) = app.next_departure_text(route) {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(departure, Style::default().fg(theme.dim)));
    }
    spans
}

fn travel_time_span(
    app: &App,
    prediction: &Prediction,
    route: &Route,
    now: DateTime<Local>,
    theme: &Theme,
) -> Span<'static> {
    let text = app.travel_time_text(prediction, route, now);
    let color = if app.display.color_code_travel_time {
        status_color(app.delay_status(route), theme)
    } else {
        theme.text
    };
    Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn status_color(status: DelayStatus, theme: &Theme) -> Color {
    match status {
        DelayStatus::Good => theme.good,
        DelayStatus::Moderate => theme.warn,
        DelayStatus::Poor => theme.danger,
    }
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let mut spans = Vec::new();
    if app.display.show_updated {
        if let Some(at) = app.state.last_updated {
            spans.push(Span::styled(
                format!("{}{}", app.strings.last_refreshed, at.format("%H:%M")),
                Style::default().fg(theme.text),
            ));
            spans.push(Span::raw("  "));
        }
    }
    spans.push(Span::styled(
        format!(
            "q quit  p pause  r refresh  t theme ({})  ? help  REF {}s",
            app.theme_mode.label(),
            app.poll_interval.as_secs()
        ),
        Style::default().fg(theme.dim),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let popup = centered_rect(50, 10, area);
    f.render_widget(Clear, popup);

    let lines = vec![
        Line::from(Span::styled(
            "HELP",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from("  q          Quit"),
        Line::from("  p          Pause / resume polling"),
        Line::from("  r          Refresh now"),
        Line::from("  t          Cycle theme"),
        Line::from("  ?          Toggle this help"),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent))
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(Paragraph::new(lines).block(block), popup);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height.saturating_sub(2)).max(3);
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(height),
            Constraint::Min(1),
        ])
        .split(area);
    let vertical = popup_layout[1];
    let width = (vertical.width * percent_x / 100).max(20);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(width),
            Constraint::Min(1),
        ])
        .split(vertical);
    horizontal[1]
}

fn glyph(icon: Icon) -> &'static str {
    match icon {
        Icon::Car => "🚗",
        Icon::Walk => "🚶",
        Icon::Bike => "🚲",
        Icon::Streetcar => "🚋",
        Icon::Bus => "🚌",
        Icon::Subway => "🚇",
        Icon::Train => "🚆",
        Icon::Taxi => "🚕",
        Icon::Boat => "⛴",
        Icon::Gondola => "🚡",
    }
}

/// `#rrggbb`, `#rgb` or a named terminal color.
fn parse_color(value: &str) -> Option<Color> {
    let trimmed = value.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        if hex.len() == 3 {
            let mut channels = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            let r = channels.next()??;
            let g = channels.next()??;
            let b = channels.next()??;
            return Some(Color::Rgb(r, g, b));
        }
    }
    trimmed.parse::<Color>().ok()
}

fn theme(mode: ThemeMode) -> Theme {
    match mode {
        ThemeMode::Default => Theme {
            accent: Color::Yellow,
            good: Color::Green,
            warn: Color::Yellow,
            danger: Color::Red,
            dim: Color::DarkGray,
            text: Color::White,
            header_bg: Color::Rgb(24, 24, 28),
            panel_bg: Color::Rgb(18, 18, 22),
        },
        ThemeMode::ColorBlind => Theme {
            accent: Color::Cyan,
            good: Color::LightBlue,
            warn: Color::LightYellow,
            danger: Color::LightMagenta,
            dim: Color::DarkGray,
            text: Color::White,
            header_bg: Color::Rgb(20, 26, 30),
            panel_bg: Color::Rgb(14, 20, 24),
        },
        ThemeMode::Amber => Theme {
            accent: Color::Rgb(255, 191, 0),
            good: Color::Rgb(200, 220, 120),
            warn: Color::Rgb(255, 220, 120),
            danger: Color::LightRed,
            dim: Color::Rgb(140, 110, 40),
            text: Color::Rgb(255, 230, 180),
            header_bg: Color::Rgb(32, 24, 14),
            panel_bg: Color::Rgb(24, 18, 10),
        },
        ThemeMode::Ocean => Theme {
            accent: Color::Rgb(0, 200, 220),
            good: Color::Rgb(80, 220, 160),
            warn: Color::LightYellow,
            danger: Color::LightRed,
            dim: Color::Rgb(80, 120, 130),
            text: Color::Rgb(210, 235, 240),
            header_bg: Color::Rgb(12, 24, 30),
            panel_bg: Color::Rgb(10, 18, 24),
        },
        ThemeMode::Monochrome => Theme {
            accent: Color::White,
            good: Color::Gray,
            warn: Color::White,
            danger: Color::White,
            dim: Color::DarkGray,
            text: Color::Gray,
            header_bg: Color::Black,
            panel_bg: Color::Black,
        },
    }
}

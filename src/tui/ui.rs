use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{cards, dashboard, topics};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let selected = match app.view {
        View::Dashboard => 0,
        View::Topics => 1,
        View::Cards => 2,
    };

    let tabs = Tabs::new(vec!["Dashboard", "Topics", "Cards"])
        .block(Block::default().borders(Borders::ALL).title(" Adept "))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Topics => topics::draw(f, app, area),
        View::Cards => cards::draw(f, app, area),
    }
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let key = Style::default().fg(Color::Cyan);
    let mut spans = vec![Span::styled("h/l", key), Span::raw(" Views  ")];

    if app.view != View::Dashboard {
        spans.extend(vec![
            Span::styled("j/k", key),
            Span::raw(" Nav  "),
            Span::styled("g/G", key),
            Span::raw(" Top/Bot  "),
        ]);
    }

    spans.extend(vec![
        Span::styled("^r", key),
        Span::raw(" Refresh  "),
        Span::styled("q", key),
        Span::raw(" Quit"),
    ]);

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(help, area);
}

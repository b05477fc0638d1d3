use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::truncate;
use crate::models::FlashcardProgress;
use crate::scheduler::{format_interval, preview_all};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    draw_list(f, app, chunks[0]);
    draw_detail(f, app, chunks[1]);
}

fn draw_list(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .cards
        .items
        .iter()
        .map(|card| {
            let (date_color, date_text) = if card.next_review_date < app.today {
                (Color::Red, format!("{} !", card.next_review_date.format("%b %d")))
            } else if card.next_review_date == app.today {
                (Color::Yellow, "today".to_string())
            } else {
                (Color::White, card.next_review_date.format("%b %d").to_string())
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<22}", truncate(&card.card_id, 20)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<18}", truncate(&card.topic_id, 16)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:>5.2} {:>5}  ", card.ease_factor, format_interval(card.interval)),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(date_text, Style::default().fg(date_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Cards ")
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.cards.selected);
    f.render_stateful_widget(list, area, &mut state);
}

fn detail_lines(card: &FlashcardProgress) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            card.card_id.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("{} / {}", card.subject_id, card.topic_id)),
        Line::from(format!(
            "Repetitions {}  Ease {:.2}  Interval {}",
            card.repetitions,
            card.ease_factor,
            format_interval(card.interval)
        )),
        Line::from(""),
        Line::from(Span::styled("If reviewed now:", Style::default().fg(Color::Gray))),
    ];

    for (q, days) in preview_all(card) {
        lines.push(Line::from(vec![
            Span::styled(format!("  [{}] ", q.value()), Style::default().fg(Color::Cyan)),
            Span::raw(format!("{:<11}", q.label())),
            Span::styled(format_interval(days), Style::default().fg(Color::Green)),
        ]));
    }

    if !card.review_history.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "History:",
            Style::default().fg(Color::Gray),
        )));
        for r in card.review_history.iter().rev().take(8) {
            lines.push(Line::from(format!(
                "  {}  q{}  after {}",
                r.date,
                r.quality,
                format_interval(r.interval)
            )));
        }
    }

    lines
}

fn draw_detail(f: &mut Frame, app: &App, area: Rect) {
    let lines = app
        .cards
        .selected
        .and_then(|i| app.cards.items.get(i))
        .map(detail_lines)
        .unwrap_or_else(|| vec![Line::from("No cards reviewed yet.")]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Detail ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

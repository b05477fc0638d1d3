use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{mastery_color, score_bar, truncate};
use crate::scheduler::format_interval;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10), // Stats + due cards row
            Constraint::Min(0),     // Weak topics
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_due_cards(f, app, top_chunks[1]);
    draw_weak_topics(f, app, chunks[1]);
}

fn stat_line(label: &'static str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let deck = &app.deck;

    let diagnostic = match &app.diagnostic {
        Some((subject, answered, true)) => format!("{} done ({} answers)", subject, answered),
        Some((subject, answered, false)) => format!("{} paused at {}", subject, answered),
        None => "none".to_string(),
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Mastery: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}% {}", app.overall.score, app.overall.level.label()),
                Style::default()
                    .fg(mastery_color(app.overall.level))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line("Topics: ", app.topics.items.len().to_string(), Color::White),
        stat_line("Cards: ", deck.total.to_string(), Color::White),
        stat_line("New: ", deck.new_cards.to_string(), Color::Cyan),
        stat_line("Mastered: ", deck.mastered.to_string(), Color::Green),
        stat_line(
            "Due: ",
            deck.due_today.to_string(),
            if deck.due_today > 0 {
                Color::Yellow
            } else {
                Color::White
            },
        ),
        stat_line(
            "Avg Ease: ",
            format!("{:.2}", deck.average_ease_factor),
            Color::Cyan,
        ),
        stat_line("Diagnostic: ", diagnostic, Color::White),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_due_cards(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .due_cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let style = if card.next_review_date < app.today {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Yellow)
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{:<20}", truncate(&card.card_id, 18)), style),
                Span::styled(
                    format!("EF {:.2}  {}", card.ease_factor, format_interval(card.interval)),
                    Style::default().fg(Color::Cyan),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due Cards ")
        .title_style(Style::default().fg(Color::Yellow));

    f.render_widget(List::new(items).block(block), area);
}

fn draw_weak_topics(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .weak_topics
        .iter()
        .map(|k| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&k.topic_id, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(score_bar(k.score), Style::default().fg(Color::Red)),
                Span::styled(
                    format!(" {:>3}%  {}/{}", k.score, k.correct_answers, k.total_answers),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Needs Work ")
        .title_style(Style::default().fg(Color::Red));

    f.render_widget(List::new(items).block(block), area);
}

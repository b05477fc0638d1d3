use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{mastery_color, score_bar, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .topics
        .items
        .iter()
        .map(|k| {
            let last = k
                .last_attempt_at
                .map(|t| t.format("%b %d").to_string())
                .unwrap_or_else(|| "-".to_string());

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&k.topic_id, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    score_bar(k.score),
                    Style::default().fg(mastery_color(k.mastery_level)),
                ),
                Span::styled(format!(" {:>3}% ", k.score), Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!("{:<12}", k.mastery_level.label()),
                    Style::default().fg(mastery_color(k.mastery_level)),
                ),
                Span::styled(
                    format!("{:>4}/{:<4} ", k.correct_answers, k.total_answers),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(last, Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Topics ")
        .title_style(Style::default().fg(Color::Cyan));

    let heading = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<32}", "Topic"), heading),
        Span::styled(format!("{:<17}", "Score"), heading),
        Span::styled(format!("{:<12}", "Level"), heading),
        Span::styled(format!("{:<10}", "Answers"), heading),
        Span::styled("Last", heading),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.topics.selected);

    // Header sits on the block's top row, list starts one line lower
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };
    f.render_stateful_widget(list, list_area, &mut state);
}

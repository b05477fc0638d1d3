pub mod cards;
pub mod dashboard;
pub mod topics;

use ratatui::style::Color;

use crate::models::MasteryLevel;

fn mastery_color(level: MasteryLevel) -> Color {
    match level {
        MasteryLevel::Unknown => Color::DarkGray,
        MasteryLevel::Struggling => Color::Red,
        MasteryLevel::Learning => Color::Yellow,
        MasteryLevel::Mastered => Color::Green,
    }
}

/// Ten-cell bar for a 0-100 score.
fn score_bar(score: u32) -> String {
    let filled = (score.min(100) as usize + 5) / 10;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bar_rounds_to_tenths() {
        assert_eq!(score_bar(0), "░░░░░░░░░░");
        assert_eq!(score_bar(75), "████████░░");
        assert_eq!(score_bar(100), "██████████");
    }
}

//! Line-oriented sessions over any reader and writer.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rand::Rng;

use crate::diagnostic::{DiagnosticReport, DiagnosticSelector};
use crate::error::Result;
use crate::models::{DiagnosticSession, Flashcard, FlashcardProgress};
use crate::scheduler::{format_interval, preview_all, Quality, ReviewSession};
use crate::state::LearnerState;

pub enum DiagnosticExit {
    Finished(DiagnosticReport),
    /// The learner stopped early; the session can be resumed later.
    Paused(DiagnosticSession),
}

/// Read one trimmed line. `None` on end of input or a quit command.
fn read_line<I: BufRead>(input: &mut I) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim().to_string();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Ok(None);
    }
    Ok(Some(line))
}

pub fn run_diagnostic<G, I, O>(
    mut selector: DiagnosticSelector<G>,
    input: &mut I,
    output: &mut O,
) -> Result<DiagnosticExit>
where
    G: Rng,
    I: BufRead,
    O: Write,
{
    writeln!(
        output,
        "Diagnostic over {} sections, {} answered so far.",
        selector.sections().len(),
        selector.answered()
    )?;

    loop {
        let question = match selector.next_question() {
            Some(q) => q.clone(),
            None => break,
        };

        writeln!(
            output,
            "\n[{}] Question {} ({}, {})",
            question.section_id,
            selector.answered() + 1,
            question.topic_id,
            question.difficulty.as_str()
        )?;
        for (i, option) in question.options.iter().enumerate() {
            writeln!(output, "  {}. {}", i + 1, option.text)?;
        }

        let started = Instant::now();
        let answer = loop {
            write!(output, "Answer (number, or q to pause): ")?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(DiagnosticExit::Paused(selector.session().clone()));
            };
            let picked = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| question.options.get(i));
            match picked {
                Some(option) => break option.id.clone(),
                None => writeln!(output, "Pick 1-{}", question.options.len())?,
            }
        };

        let elapsed = started.elapsed().as_secs().min(u32::MAX as u64) as u32;
        let outcome = selector.submit_answer(&question.id, &answer, elapsed)?;
        writeln!(
            output,
            "{}",
            if outcome.is_correct { "Correct." } else { "Incorrect." }
        )?;
    }

    let report = selector.finish(Utc::now());
    writeln!(output, "\nDiagnostic complete.")?;
    Ok(DiagnosticExit::Finished(report))
}

/// Walk a review queue card by card until it empties or the learner quits.
pub fn run_study<I, O>(
    session: &mut ReviewSession,
    state: &mut LearnerState,
    cards: &HashMap<String, Flashcard>,
    input: &mut I,
    output: &mut O,
    today: NaiveDate,
) -> Result<()>
where
    I: BufRead,
    O: Write,
{
    while let Some(card_id) = session.current().map(str::to_string) {
        let Some(card) = cards.get(&card_id) else {
            session.skip();
            continue;
        };

        writeln!(output, "\n({} left) {}", session.remaining(), card.front)?;
        write!(output, "Press enter to reveal: ")?;
        output.flush()?;
        if read_line(input)?.is_none() {
            return Ok(());
        }
        writeln!(output, "{}", card.back)?;

        let progress = state
            .flashcard_progress
            .get(&card_id)
            .cloned()
            .unwrap_or_else(|| FlashcardProgress::new(&card_id, "", "", today));
        let buttons: Vec<String> = preview_all(&progress)
            .iter()
            .map(|(q, days)| format!("[{}] {} ({})", q.value(), q.label(), format_interval(*days)))
            .collect();
        writeln!(output, "{}", buttons.join("  "))?;

        let quality = loop {
            write!(output, "Grade: ")?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(());
            };
            match Quality::from_str(&line) {
                Some(q) => break q,
                None => writeln!(output, "Enter 0, 1, 4 or 5")?,
            }
        };

        if let Some(updated) = session.grade(state, quality, today) {
            writeln!(output, "Next review: {}", updated.next_review_date)?;
        }
    }

    writeln!(
        output,
        "\nSession done: {} reviews, {} repeated.",
        session.reviewed(),
        session.requeued()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, Question, QuestionOption};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Cursor;

    fn question(id: &str, section: &str) -> Question {
        Question {
            id: id.to_string(),
            topic_id: format!("{}-topic", section),
            section_id: section.to_string(),
            difficulty: Difficulty::Intermediate,
            options: vec![
                QuestionOption {
                    id: "a".into(),
                    text: "right".into(),
                    is_correct: true,
                },
                QuestionOption {
                    id: "b".into(),
                    text: "wrong".into(),
                    is_correct: false,
                },
            ],
            correct_answer: "a".into(),
        }
    }

    fn selector(pool: Vec<Question>) -> DiagnosticSelector<ChaCha8Rng> {
        DiagnosticSelector::new("math", pool, ChaCha8Rng::seed_from_u64(3), Utc::now())
    }

    fn card(id: &str) -> Flashcard {
        Flashcard {
            id: id.to_string(),
            front: format!("front {}", id),
            back: format!("back {}", id),
            tags: Vec::new(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    mod diagnostic_tests {
        use super::*;

        #[test]
        fn finishes_when_every_section_is_covered() {
            let pool = vec![question("q1", "s1"), question("q2", "s1")];
            let mut input = Cursor::new("1\n2\n");
            let mut output = Vec::new();

            match run_diagnostic(selector(pool), &mut input, &mut output).unwrap() {
                DiagnosticExit::Finished(report) => {
                    assert!(report.session.is_completed());
                    assert_eq!(report.sections[0].correct_answers, 1);
                    assert_eq!(report.sections[0].total_answers, 2);
                }
                DiagnosticExit::Paused(_) => panic!("Expected a finished diagnostic"),
            }
            let text = String::from_utf8(output).unwrap();
            assert!(text.contains("Correct."));
            assert!(text.contains("Incorrect."));
        }

        #[test]
        fn quitting_pauses_with_answers_kept() {
            let pool = vec![question("q1", "s1"), question("q2", "s1")];
            let mut input = Cursor::new("1\nq\n");
            let mut output = Vec::new();

            match run_diagnostic(selector(pool), &mut input, &mut output).unwrap() {
                DiagnosticExit::Paused(session) => {
                    assert!(!session.is_completed());
                    assert_eq!(session.answers.len(), 1);
                }
                DiagnosticExit::Finished(_) => panic!("Expected a paused diagnostic"),
            }
        }

        #[test]
        fn out_of_range_choice_is_asked_again() {
            let pool = vec![question("q1", "s1")];
            let mut input = Cursor::new("7\nabc\n1\n");
            let mut output = Vec::new();

            let exit = run_diagnostic(selector(pool), &mut input, &mut output).unwrap();
            assert!(matches!(exit, DiagnosticExit::Finished(_)));
            assert_eq!(String::from_utf8(output).unwrap().matches("Pick 1-2").count(), 2);
        }

        #[test]
        fn empty_pool_finishes_immediately() {
            let mut input = Cursor::new("");
            let mut output = Vec::new();
            match run_diagnostic(selector(Vec::new()), &mut input, &mut output).unwrap() {
                DiagnosticExit::Finished(report) => assert!(report.session.answers.is_empty()),
                DiagnosticExit::Paused(_) => panic!("Expected a finished diagnostic"),
            }
        }
    }

    mod study_tests {
        use super::*;

        fn deck(ids: &[&str]) -> HashMap<String, Flashcard> {
            ids.iter().map(|id| (id.to_string(), card(id))).collect()
        }

        #[test]
        fn dont_know_brings_the_card_back() {
            let mut state = LearnerState::new();
            let mut session = ReviewSession::new("t", "s", vec!["c1".to_string()]);
            let mut input = Cursor::new("\n0\n\n4\n");
            let mut output = Vec::new();

            run_study(&mut session, &mut state, &deck(&["c1"]), &mut input, &mut output, today())
                .unwrap();

            assert!(session.is_finished());
            assert_eq!(session.reviewed(), 2);
            assert_eq!(session.requeued(), 1);
            let progress = &state.flashcard_progress["c1"];
            assert_eq!(progress.repetitions, 1);
            assert_eq!(progress.interval, 1);
            assert_eq!(progress.topic_id, "t");
        }

        #[test]
        fn named_grades_are_accepted() {
            let mut state = LearnerState::new();
            let mut session =
                ReviewSession::new("t", "s", vec!["c1".to_string(), "c2".to_string()]);
            let mut input = Cursor::new("\neasy\n\nforgot\n");
            let mut output = Vec::new();

            run_study(
                &mut session,
                &mut state,
                &deck(&["c1", "c2"]),
                &mut input,
                &mut output,
                today(),
            )
            .unwrap();

            assert_eq!(state.flashcard_progress["c1"].interval, 4);
            assert_eq!(state.flashcard_progress["c2"].interval, 1);
            let text = String::from_utf8(output).unwrap();
            assert!(text.contains("[5] Easy (4d)"));
            assert!(text.contains("Session done: 2 reviews, 0 repeated."));
        }

        #[test]
        fn quitting_leaves_the_rest_unreviewed() {
            let mut state = LearnerState::new();
            let mut session =
                ReviewSession::new("t", "s", vec!["c1".to_string(), "c2".to_string()]);
            let mut input = Cursor::new("\n4\nq\n");
            let mut output = Vec::new();

            run_study(
                &mut session,
                &mut state,
                &deck(&["c1", "c2"]),
                &mut input,
                &mut output,
                today(),
            )
            .unwrap();

            assert!(state.flashcard_progress.contains_key("c1"));
            assert!(!state.flashcard_progress.contains_key("c2"));
            assert_eq!(session.remaining(), 1);
        }

        #[test]
        fn cards_missing_from_the_deck_are_skipped() {
            let mut state = LearnerState::new();
            let mut session =
                ReviewSession::new("t", "s", vec!["gone".to_string(), "c1".to_string()]);
            let mut input = Cursor::new("\n4\n");
            let mut output = Vec::new();

            run_study(&mut session, &mut state, &deck(&["c1"]), &mut input, &mut output, today())
                .unwrap();

            assert!(!state.flashcard_progress.contains_key("gone"));
            assert_eq!(session.reviewed(), 1);
        }

        #[test]
        fn invalid_grade_is_asked_again() {
            let mut state = LearnerState::new();
            let mut session = ReviewSession::new("t", "s", vec!["c1".to_string()]);
            let mut input = Cursor::new("\n9\nmaybe\n4\n");
            let mut output = Vec::new();

            run_study(&mut session, &mut state, &deck(&["c1"]), &mut input, &mut output, today())
                .unwrap();

            assert_eq!(
                String::from_utf8(output).unwrap().matches("Enter 0, 1, 4 or 5").count(),
                2
            );
            assert_eq!(state.flashcard_progress["c1"].interval, 1);
        }
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{AdeptError, Result};
use crate::models::{KnowledgeState, MasteryLevel};
use crate::state::LearnerState;

/// Minimum score for `Mastered`.
pub const MASTERED_THRESHOLD: u32 = 80;
/// Minimum score for `Learning`; anything below is `Struggling`.
pub const LEARNING_THRESHOLD: u32 = 50;

/// Map a score and attempt count to a mastery level.
///
/// Every caller (diagnostics, quizzes, final tests and the section/global
/// roll-ups) goes through this one function so badges never disagree.
pub fn classify(score: u32, attempts: u32) -> MasteryLevel {
    if attempts == 0 {
        MasteryLevel::Unknown
    } else if score >= MASTERED_THRESHOLD {
        MasteryLevel::Mastered
    } else if score >= LEARNING_THRESHOLD {
        MasteryLevel::Learning
    } else {
        MasteryLevel::Struggling
    }
}

/// Rounded percentage, 0 when nothing was answered.
pub fn percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        0
    } else {
        ((correct as f64 / total as f64) * 100.0).round() as u32
    }
}

impl KnowledgeState {
    pub fn new(topic_id: &str) -> Self {
        Self {
            topic_id: topic_id.to_string(),
            score: 0,
            attempts: 0,
            correct_answers: 0,
            total_answers: 0,
            mastery_level: MasteryLevel::Unknown,
            last_attempt_at: None,
        }
    }

    /// The state after one more answer, accumulated onto history.
    pub fn with_answer(&self, is_correct: bool, now: DateTime<Utc>) -> Self {
        let correct_answers = self.correct_answers + u32::from(is_correct);
        let total_answers = self.total_answers + 1;
        let attempts = self.attempts + 1;
        let score = percent(correct_answers, total_answers);

        Self {
            topic_id: self.topic_id.clone(),
            score,
            attempts,
            correct_answers,
            total_answers,
            mastery_level: classify(score, attempts),
            last_attempt_at: Some(now),
        }
    }

    /// The state after a definitive quiz result that replaces history.
    pub fn with_score(&self, correct: u32, total: u32, now: DateTime<Utc>) -> Result<Self> {
        if total == 0 || correct > total {
            return Err(AdeptError::InvalidScore { correct, total });
        }

        let score = percent(correct, total);
        let attempts = self.attempts + 1;

        Ok(Self {
            topic_id: self.topic_id.clone(),
            score,
            attempts,
            correct_answers: correct,
            total_answers: total,
            mastery_level: classify(score, attempts),
            last_attempt_at: Some(now),
        })
    }
}

/// Roll-up of several topics into one badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMastery {
    pub level: MasteryLevel,
    pub score: u32,
}

/// Average the scores of the attempted topics among `topic_ids`.
///
/// Untouched topics are left out entirely; a section with nothing attempted
/// reports `(Unknown, 0)`.
pub fn section_mastery<'a, I>(states: I) -> SectionMastery
where
    I: IntoIterator<Item = &'a KnowledgeState>,
{
    let scores: Vec<u32> = states
        .into_iter()
        .filter(|s| s.attempts > 0)
        .map(|s| s.score)
        .collect();

    if scores.is_empty() {
        return SectionMastery {
            level: MasteryLevel::Unknown,
            score: 0,
        };
    }

    let sum: u32 = scores.iter().sum();
    let score = (sum as f64 / scores.len() as f64).round() as u32;
    SectionMastery {
        level: classify(score, scores.len() as u32),
        score,
    }
}

impl LearnerState {
    pub fn knowledge(&self, topic_id: &str) -> Option<&KnowledgeState> {
        self.knowledge_states.get(topic_id)
    }

    /// Accumulate one answer onto a topic, creating it on first contact.
    pub fn record_answer(
        &mut self,
        topic_id: &str,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> &KnowledgeState {
        let current = self
            .knowledge_states
            .get(topic_id)
            .cloned()
            .unwrap_or_else(|| KnowledgeState::new(topic_id));
        let next = current.with_answer(is_correct, now);

        debug!(
            topic = topic_id,
            is_correct,
            score = next.score,
            level = next.mastery_level.as_str(),
            "recorded answer"
        );

        self.knowledge_states.insert(topic_id.to_string(), next);
        &self.knowledge_states[topic_id]
    }

    /// Final-test path: every answer accumulates in order.
    pub fn record_answers<'a, I>(&mut self, answers: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        for (topic_id, is_correct) in answers {
            self.record_answer(topic_id, is_correct, now);
        }
    }

    /// Replace a topic's correct/total with a quiz result.
    pub fn set_topic_score(
        &mut self,
        topic_id: &str,
        correct: u32,
        total: u32,
        now: DateTime<Utc>,
    ) -> Result<&KnowledgeState> {
        let current = self
            .knowledge_states
            .get(topic_id)
            .cloned()
            .unwrap_or_else(|| KnowledgeState::new(topic_id));
        let next = current.with_score(correct, total, now)?;

        debug!(
            topic = topic_id,
            correct,
            total,
            level = next.mastery_level.as_str(),
            "set topic score"
        );

        self.knowledge_states.insert(topic_id.to_string(), next);
        Ok(&self.knowledge_states[topic_id])
    }

    /// Lesson-quiz path: one quiz's answers become the topic's definitive score.
    pub fn record_quiz(
        &mut self,
        topic_id: &str,
        answers: &[bool],
        now: DateTime<Utc>,
    ) -> Result<&KnowledgeState> {
        let correct = answers.iter().filter(|&&c| c).count() as u32;
        self.set_topic_score(topic_id, correct, answers.len() as u32, now)
    }

    pub fn section_mastery<S: AsRef<str>>(&self, topic_ids: &[S]) -> SectionMastery {
        section_mastery(
            topic_ids
                .iter()
                .filter_map(|id| self.knowledge_states.get(id.as_ref())),
        )
    }

    pub fn overall_mastery(&self) -> SectionMastery {
        section_mastery(self.knowledge_states.values())
    }

    /// Struggling topics, weakest first.
    pub fn weak_topics(&self) -> Vec<&KnowledgeState> {
        let mut weak: Vec<&KnowledgeState> = self
            .knowledge_states
            .values()
            .filter(|s| s.mastery_level == MasteryLevel::Struggling)
            .collect();
        weak.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.topic_id.cmp(&b.topic_id)));
        weak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    mod classify_tests {
        use super::*;

        #[test]
        fn zero_attempts_is_unknown_regardless_of_score() {
            assert_eq!(classify(0, 0), MasteryLevel::Unknown);
            assert_eq!(classify(100, 0), MasteryLevel::Unknown);
        }

        #[test]
        fn thresholds_are_inclusive() {
            assert_eq!(classify(80, 1), MasteryLevel::Mastered);
            assert_eq!(classify(79, 1), MasteryLevel::Learning);
            assert_eq!(classify(50, 1), MasteryLevel::Learning);
            assert_eq!(classify(49, 1), MasteryLevel::Struggling);
            assert_eq!(classify(0, 3), MasteryLevel::Struggling);
        }
    }

    mod percent_tests {
        use super::*;

        #[test]
        fn rounds_half_up() {
            assert_eq!(percent(1, 3), 33);
            assert_eq!(percent(2, 3), 67);
            assert_eq!(percent(1, 8), 13);
        }

        #[test]
        fn empty_total_is_zero() {
            assert_eq!(percent(0, 0), 0);
        }
    }

    mod record_answer_tests {
        use super::*;

        #[test]
        fn three_of_four_is_learning_at_75() {
            let mut state = LearnerState::new();
            for correct in [true, true, true, false] {
                state.record_answer("t1", correct, now());
            }
            let k = state.knowledge("t1").unwrap();
            assert_eq!(k.score, 75);
            assert_eq!(k.mastery_level, MasteryLevel::Learning);
            assert_eq!(k.attempts, 4);
            assert_eq!(k.correct_answers, 3);
            assert_eq!(k.total_answers, 4);
        }

        #[test]
        fn creates_topic_lazily_and_stamps_time() {
            let mut state = LearnerState::new();
            assert!(state.knowledge("fresh").is_none());
            let at = now();
            let k = state.record_answer("fresh", false, at);
            assert_eq!(k.score, 0);
            assert_eq!(k.mastery_level, MasteryLevel::Struggling);
            assert_eq!(k.last_attempt_at, Some(at));
        }

        #[test]
        fn accumulates_without_reset() {
            let mut state = LearnerState::new();
            state.record_answers([("t", true), ("t", true), ("u", false)], now());
            state.record_answer("t", false, now());
            let t = state.knowledge("t").unwrap();
            assert_eq!(t.total_answers, 3);
            assert_eq!(t.score, 67);
            assert_eq!(state.knowledge("u").unwrap().total_answers, 1);
        }
    }

    mod set_topic_score_tests {
        use super::*;

        #[test]
        fn replaces_history_and_steps_attempts_once() {
            let mut state = LearnerState::new();
            for _ in 0..5 {
                state.record_answer("t", false, now());
            }
            let k = state.set_topic_score("t", 9, 10, now()).unwrap();
            assert_eq!(k.correct_answers, 9);
            assert_eq!(k.total_answers, 10);
            assert_eq!(k.score, 90);
            assert_eq!(k.attempts, 6);
            assert_eq!(k.mastery_level, MasteryLevel::Mastered);
        }

        #[test]
        fn rejects_more_correct_than_total() {
            let mut state = LearnerState::new();
            let err = state.set_topic_score("t", 4, 3, now()).unwrap_err();
            assert!(matches!(
                err,
                AdeptError::InvalidScore {
                    correct: 4,
                    total: 3
                }
            ));
            assert!(state.knowledge("t").is_none());
        }

        #[test]
        fn rejects_empty_quiz() {
            let mut state = LearnerState::new();
            assert!(state.set_topic_score("t", 0, 0, now()).is_err());
        }

        #[test]
        fn record_quiz_counts_answers() {
            let mut state = LearnerState::new();
            let k = state
                .record_quiz("t", &[true, false, true, true, true], now())
                .unwrap();
            assert_eq!(k.score, 80);
            assert_eq!(k.attempts, 1);
        }
    }

    mod section_mastery_tests {
        use super::*;

        #[test]
        fn untouched_topics_are_excluded() {
            let mut state = LearnerState::new();
            state.set_topic_score("t2", 9, 10, now()).unwrap();
            let rollup = state.section_mastery(&["t1", "t2"]);
            assert_eq!(rollup.level, MasteryLevel::Mastered);
            assert_eq!(rollup.score, 90);
        }

        #[test]
        fn nothing_attempted_is_unknown_zero() {
            let mut state = LearnerState::new();
            state
                .knowledge_states
                .insert("t1".into(), KnowledgeState::new("t1"));
            let rollup = state.section_mastery(&["t1", "missing"]);
            assert_eq!(rollup.level, MasteryLevel::Unknown);
            assert_eq!(rollup.score, 0);
        }

        #[test]
        fn averages_attempted_scores() {
            let mut state = LearnerState::new();
            state.set_topic_score("a", 1, 2, now()).unwrap();
            state.set_topic_score("b", 1, 1, now()).unwrap();
            let rollup = state.section_mastery(&["a", "b"]);
            assert_eq!(rollup.score, 75);
            assert_eq!(rollup.level, MasteryLevel::Learning);
        }

        #[test]
        fn overall_covers_every_topic() {
            let mut state = LearnerState::new();
            state.set_topic_score("a", 0, 2, now()).unwrap();
            state.set_topic_score("b", 1, 2, now()).unwrap();
            let rollup = state.overall_mastery();
            assert_eq!(rollup.score, 25);
            assert_eq!(rollup.level, MasteryLevel::Struggling);
        }
    }

    mod weak_topics_tests {
        use super::*;

        #[test]
        fn lists_struggling_weakest_first() {
            let mut state = LearnerState::new();
            state.set_topic_score("a", 2, 5, now()).unwrap();
            state.set_topic_score("b", 0, 5, now()).unwrap();
            state.set_topic_score("c", 5, 5, now()).unwrap();
            let weak: Vec<&str> = state
                .weak_topics()
                .iter()
                .map(|k| k.topic_id.as_str())
                .collect();
            assert_eq!(weak, vec!["b", "a"]);
        }
    }
}

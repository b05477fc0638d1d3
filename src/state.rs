use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AdeptError, Result};
use crate::knowledge::{classify, percent};
use crate::models::{DiagnosticSession, FlashcardProgress, KnowledgeState};
use crate::scheduler::{clamp_ease, Quality};

/// Everything the core knows about one learner.
///
/// This is the snapshot handed to the persistence layer: knowledge states keyed
/// by topic id, flashcard progress keyed by card id, and the optional
/// in-flight diagnostic session. Every core operation takes it by `&mut` and
/// completes before returning, so a single owner is the only writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    #[serde(default)]
    pub knowledge_states: BTreeMap<String, KnowledgeState>,
    #[serde(default)]
    pub flashcard_progress: BTreeMap<String, FlashcardProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_session: Option<DiagnosticSession>,
}

impl LearnerState {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut state: LearnerState = serde_json::from_str(json)?;
        state.normalize()?;
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Re-derive values that must never be trusted from storage: the score
    /// follows the answer counts, mastery follows score and attempts, and the
    /// ease factor has a hard floor. Impossible counts and review grades are
    /// rejected.
    pub fn normalize(&mut self) -> Result<()> {
        for state in self.knowledge_states.values_mut() {
            if state.correct_answers > state.total_answers {
                return Err(AdeptError::InvalidScore {
                    correct: state.correct_answers,
                    total: state.total_answers,
                });
            }
            if state.total_answers > 0 {
                state.score = percent(state.correct_answers, state.total_answers);
            }
            state.mastery_level = classify(state.score, state.attempts);
        }
        for progress in self.flashcard_progress.values_mut() {
            for record in &progress.review_history {
                Quality::new(record.quality)?;
            }
            progress.ease_factor = clamp_ease(progress.ease_factor);
        }
        Ok(())
    }

    pub fn abandon_diagnostic(&mut self) -> Option<DiagnosticSession> {
        self.diagnostic_session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MasteryLevel;

    #[test]
    fn empty_snapshot_round_trips() {
        let state = LearnerState::new();
        let json = state.to_json().unwrap();
        assert!(json.contains("knowledgeStates"));
        assert!(json.contains("flashcardProgress"));
        assert!(!json.contains("diagnosticSession"));
        assert_eq!(LearnerState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn load_recomputes_stored_mastery() {
        let json = r#"{
            "knowledgeStates": {
                "t1": {
                    "topicId": "t1",
                    "score": 90,
                    "attempts": 2,
                    "correctAnswers": 9,
                    "totalAnswers": 10,
                    "masteryLevel": "struggling",
                    "lastAttemptAt": null
                }
            },
            "flashcardProgress": {}
        }"#;
        let state = LearnerState::from_json(json).unwrap();
        assert_eq!(
            state.knowledge_states["t1"].mastery_level,
            MasteryLevel::Mastered
        );
    }

    #[test]
    fn load_rederives_score_from_answer_counts() {
        let json = r#"{
            "knowledgeStates": {
                "t1": {
                    "topicId": "t1",
                    "score": 90,
                    "attempts": 1,
                    "correctAnswers": 1,
                    "totalAnswers": 10,
                    "masteryLevel": "mastered",
                    "lastAttemptAt": null
                }
            }
        }"#;
        let state = LearnerState::from_json(json).unwrap();
        let k = &state.knowledge_states["t1"];
        assert_eq!(k.score, 10);
        assert_eq!(k.mastery_level, MasteryLevel::Struggling);
    }

    #[test]
    fn load_rejects_more_correct_than_total() {
        let json = r#"{
            "knowledgeStates": {
                "t1": {
                    "topicId": "t1",
                    "score": 100,
                    "attempts": 1,
                    "correctAnswers": 4,
                    "totalAnswers": 3,
                    "masteryLevel": "mastered",
                    "lastAttemptAt": null
                }
            }
        }"#;
        assert!(matches!(
            LearnerState::from_json(json),
            Err(AdeptError::InvalidScore { correct: 4, total: 3 })
        ));
    }

    #[test]
    fn load_rejects_out_of_range_review_quality() {
        let json = r#"{
            "flashcardProgress": {
                "c1": {
                    "cardId": "c1",
                    "topicId": "t1",
                    "subjectId": "s1",
                    "easeFactor": 2.5,
                    "interval": 1,
                    "repetitions": 1,
                    "nextReviewDate": "2024-05-02",
                    "lastReviewDate": "2024-05-01",
                    "reviewHistory": [
                        { "date": "2024-05-01", "quality": 7, "interval": 0 }
                    ]
                }
            }
        }"#;
        assert!(matches!(
            LearnerState::from_json(json),
            Err(AdeptError::InvalidQuality(7))
        ));
    }

    #[test]
    fn load_clamps_ease_factor_floor() {
        let json = r#"{
            "flashcardProgress": {
                "c1": {
                    "cardId": "c1",
                    "topicId": "t1",
                    "subjectId": "s1",
                    "easeFactor": 0.9,
                    "interval": 3,
                    "repetitions": 1,
                    "nextReviewDate": "2024-05-01",
                    "lastReviewDate": null,
                    "reviewHistory": []
                }
            }
        }"#;
        let state = LearnerState::from_json(json).unwrap();
        assert_eq!(state.flashcard_progress["c1"].ease_factor, 1.3);
    }

    #[test]
    fn abandon_discards_session() {
        let mut state = LearnerState::new();
        state.diagnostic_session = Some(DiagnosticSession::new("math", chrono::Utc::now()));
        assert!(state.abandon_diagnostic().is_some());
        assert!(state.diagnostic_session.is_none());
    }
}

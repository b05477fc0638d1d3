// Part of the data model is only consumed by the snapshot/JSON surface, not the CLI
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// Mastery classification shared by every scoring path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    Unknown,
    Struggling,
    Learning,
    Mastered,
}

impl MasteryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryLevel::Unknown => "unknown",
            MasteryLevel::Struggling => "struggling",
            MasteryLevel::Learning => "learning",
            MasteryLevel::Mastered => "mastered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(MasteryLevel::Unknown),
            "struggling" => Some(MasteryLevel::Struggling),
            "learning" => Some(MasteryLevel::Learning),
            "mastered" => Some(MasteryLevel::Mastered),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MasteryLevel::Unknown => "Not started",
            MasteryLevel::Struggling => "Struggling",
            MasteryLevel::Learning => "Learning",
            MasteryLevel::Mastered => "Mastered",
        }
    }
}

// Per-topic aggregate of every answer the learner gave on that topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeState {
    pub topic_id: String,
    pub score: u32,
    pub attempts: u32,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub mastery_level: MasteryLevel,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

// Diagnostic-session-scoped estimate of how well a section has been measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionConfidence {
    pub section_id: String,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub confidence: f64,
}

impl SectionConfidence {
    pub fn new(section_id: &str) -> Self {
        Self {
            section_id: section_id.to_string(),
            correct_answers: 0,
            total_answers: 0,
            confidence: 0.0,
        }
    }

    pub fn recent_performance(&self) -> f64 {
        if self.total_answers == 0 {
            0.5
        } else {
            self.correct_answers as f64 / self.total_answers as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticStatus {
    InProgress,
    Completed,
}

impl DiagnosticStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticStatus::InProgress => "in-progress",
            DiagnosticStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in-progress" | "in_progress" => Some(DiagnosticStatus::InProgress),
            "completed" => Some(DiagnosticStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticAnswer {
    pub question_id: String,
    pub topic_id: String,
    pub section_id: String,
    pub user_answer: String,
    pub is_correct: bool,
    pub time_spent_seconds: u32,
}

// One bounded run of adaptively selected questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSession {
    pub id: String,
    pub subject_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub answers: Vec<DiagnosticAnswer>,
    pub status: DiagnosticStatus,
}

impl DiagnosticSession {
    pub fn new(subject_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}-{}", subject_id, now.timestamp_millis()),
            subject_id: subject_id.to_string(),
            started_at: now,
            completed_at: None,
            answers: Vec::new(),
            status: DiagnosticStatus::InProgress,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == DiagnosticStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub date: NaiveDate,
    pub quality: u8,
    pub interval: u32,
}

// SM-2 scheduling state for one flashcard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardProgress {
    pub card_id: String,
    pub topic_id: String,
    pub subject_id: String,
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review_date: NaiveDate,
    pub last_review_date: Option<NaiveDate>,
    pub review_history: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }

    // Difficulty to aim for given the share of correct answers in a section
    pub fn for_performance(performance: f64) -> Self {
        if performance >= 0.7 {
            Difficulty::Advanced
        } else if performance >= 0.4 {
            Difficulty::Intermediate
        } else {
            Difficulty::Beginner
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

// A validated multiple-choice question from the content pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub topic_id: String,
    pub section_id: String,
    pub difficulty: Difficulty,
    pub options: Vec<QuestionOption>,
    pub correct_answer: String,
}

impl Question {
    pub fn is_correct(&self, answer: &str) -> bool {
        let answer = answer.trim();
        if answer == self.correct_answer {
            return true;
        }
        self.options
            .iter()
            .any(|o| o.is_correct && o.id.eq_ignore_ascii_case(answer))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod mastery_level_tests {
        use super::*;

        #[test]
        fn as_str_round_trips_through_from_str() {
            for level in [
                MasteryLevel::Unknown,
                MasteryLevel::Struggling,
                MasteryLevel::Learning,
                MasteryLevel::Mastered,
            ] {
                assert_eq!(MasteryLevel::from_str(level.as_str()), Some(level));
            }
        }

        #[test]
        fn from_str_is_case_insensitive() {
            assert_eq!(
                MasteryLevel::from_str("MASTERED"),
                Some(MasteryLevel::Mastered)
            );
            assert_eq!(MasteryLevel::from_str("nope"), None);
        }

        #[test]
        fn serializes_lowercase() {
            let json = serde_json::to_string(&MasteryLevel::Struggling).unwrap();
            assert_eq!(json, "\"struggling\"");
        }
    }

    mod field_name_tests {
        use super::*;

        #[test]
        fn knowledge_state_uses_camel_case() {
            let state = KnowledgeState {
                topic_id: "t1".into(),
                score: 75,
                attempts: 4,
                correct_answers: 3,
                total_answers: 4,
                mastery_level: MasteryLevel::Learning,
                last_attempt_at: None,
            };
            let json = serde_json::to_value(&state).unwrap();
            assert_eq!(json["topicId"], "t1");
            assert_eq!(json["correctAnswers"], 3);
            assert_eq!(json["totalAnswers"], 4);
            assert_eq!(json["masteryLevel"], "learning");
            assert!(json["lastAttemptAt"].is_null());
        }

        #[test]
        fn flashcard_progress_uses_camel_case() {
            let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
            let progress = FlashcardProgress {
                card_id: "c1".into(),
                topic_id: "t1".into(),
                subject_id: "s1".into(),
                ease_factor: 2.5,
                interval: 0,
                repetitions: 0,
                next_review_date: day,
                last_review_date: None,
                review_history: vec![ReviewRecord {
                    date: day,
                    quality: 4,
                    interval: 0,
                }],
            };
            let json = serde_json::to_value(&progress).unwrap();
            assert_eq!(json["cardId"], "c1");
            assert_eq!(json["easeFactor"], 2.5);
            assert_eq!(json["nextReviewDate"], "2024-03-01");
            assert_eq!(json["reviewHistory"][0]["quality"], 4);
        }

        #[test]
        fn diagnostic_status_is_kebab_case() {
            let json = serde_json::to_string(&DiagnosticStatus::InProgress).unwrap();
            assert_eq!(json, "\"in-progress\"");
            assert_eq!(
                DiagnosticStatus::from_str("completed"),
                Some(DiagnosticStatus::Completed)
            );
        }
    }

    mod difficulty_tests {
        use super::*;

        #[test]
        fn performance_thresholds() {
            assert_eq!(Difficulty::for_performance(0.0), Difficulty::Beginner);
            assert_eq!(Difficulty::for_performance(0.39), Difficulty::Beginner);
            assert_eq!(Difficulty::for_performance(0.4), Difficulty::Intermediate);
            assert_eq!(Difficulty::for_performance(0.5), Difficulty::Intermediate);
            assert_eq!(Difficulty::for_performance(0.7), Difficulty::Advanced);
            assert_eq!(Difficulty::for_performance(1.0), Difficulty::Advanced);
        }

        #[test]
        fn from_str_trims_and_ignores_case() {
            assert_eq!(
                Difficulty::from_str(" Advanced "),
                Some(Difficulty::Advanced)
            );
            assert_eq!(Difficulty::from_str("expert"), None);
        }
    }

    mod section_confidence_tests {
        use super::*;

        #[test]
        fn untouched_section_assumes_even_performance() {
            assert_eq!(SectionConfidence::new("s").recent_performance(), 0.5);
        }

        #[test]
        fn performance_is_share_of_correct() {
            let mut s = SectionConfidence::new("s");
            s.correct_answers = 1;
            s.total_answers = 4;
            assert_eq!(s.recent_performance(), 0.25);
        }
    }

    mod question_tests {
        use super::*;

        fn question() -> Question {
            Question {
                id: "q1".into(),
                topic_id: "t".into(),
                section_id: "s".into(),
                difficulty: Difficulty::Beginner,
                options: vec![
                    QuestionOption {
                        id: "a".into(),
                        text: "one".into(),
                        is_correct: false,
                    },
                    QuestionOption {
                        id: "b".into(),
                        text: "two".into(),
                        is_correct: true,
                    },
                ],
                correct_answer: "b".into(),
            }
        }

        #[test]
        fn correct_option_id_is_correct() {
            assert!(question().is_correct("b"));
            assert!(question().is_correct(" B "));
        }

        #[test]
        fn wrong_option_id_is_incorrect() {
            assert!(!question().is_correct("a"));
            assert!(!question().is_correct(""));
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn serializes_ok_correctly() {
            let output = JsonOutput::ok("test");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}

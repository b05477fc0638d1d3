//! Adaptive diagnostic.
//!
//! The selector walks `idle -> selecting -> awaiting answer -> selecting ... -> done`,
//! spending questions on the sections whose mastery is least well estimated
//! and aiming each question at the difficulty the learner's recent answers in
//! that section suggest.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AdeptError, Result};
use crate::knowledge::{classify, percent};
use crate::models::{
    DiagnosticAnswer, DiagnosticSession, DiagnosticStatus, Difficulty, MasteryLevel, Question,
    SectionConfidence,
};
use crate::state::LearnerState;

/// Hard cap on questions in one diagnostic
pub const MAX_QUESTIONS: usize = 12;
/// Answers every section needs before the diagnostic can end early
pub const MIN_SECTION_ANSWERS: u32 = 2;
/// Confidence at which a section with enough answers stops being asked
pub const SETTLED_CONFIDENCE: f64 = 0.7;

const CORRECT_GAIN: f64 = 0.35;
const INCORRECT_GAIN: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Selecting,
    AwaitingAnswer(String),
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Selecting => "selecting",
            Phase::AwaitingAnswer(_) => "awaiting an answer",
            Phase::Done => "done",
        }
    }
}

/// Section confidence after one more answer. Any answer makes the estimate
/// better, a correct one slightly more so.
pub fn update_confidence(section: &SectionConfidence, is_correct: bool) -> SectionConfidence {
    let gain = if is_correct { CORRECT_GAIN } else { INCORRECT_GAIN };
    SectionConfidence {
        section_id: section.section_id.clone(),
        correct_answers: section.correct_answers + u32::from(is_correct),
        total_answers: section.total_answers + 1,
        confidence: (section.confidence + gain).min(1.0),
    }
}

pub fn is_settled(section: &SectionConfidence) -> bool {
    section.confidence >= SETTLED_CONFIDENCE && section.total_answers >= MIN_SECTION_ANSWERS
}

/// Fewest answers first, then lowest confidence. Ties keep pool order.
pub fn rank_sections(sections: &[SectionConfidence]) -> Vec<&SectionConfidence> {
    let mut ranked: Vec<&SectionConfidence> = sections.iter().collect();
    ranked.sort_by(|a, b| {
        a.total_answers
            .cmp(&b.total_answers)
            .then_with(|| a.confidence.total_cmp(&b.confidence))
    });
    ranked
}

fn pick<R: Rng + ?Sized>(candidates: &[usize], rng: &mut R) -> Option<usize> {
    candidates.choose(rng).copied()
}

/// Opening question: any beginner question, or any question at all.
fn select_first<R: Rng + ?Sized>(pool: &[Question], rng: &mut R) -> Option<usize> {
    let beginner: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, q)| q.difficulty == Difficulty::Beginner)
        .map(|(i, _)| i)
        .collect();
    if !beginner.is_empty() {
        return pick(&beginner, rng);
    }
    let all: Vec<usize> = (0..pool.len()).collect();
    pick(&all, rng)
}

fn select_next<R: Rng + ?Sized>(
    pool: &[Question],
    sections: &[SectionConfidence],
    asked: &HashSet<String>,
    rng: &mut R,
) -> Option<usize> {
    for section in rank_sections(sections) {
        if is_settled(section) {
            debug!(section = %section.section_id, "section settled, skipping");
            continue;
        }

        let remaining: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter(|(_, q)| q.section_id == section.section_id && !asked.contains(&q.id))
            .map(|(i, _)| i)
            .collect();
        if remaining.is_empty() {
            debug!(section = %section.section_id, "section exhausted");
            continue;
        }

        let target = Difficulty::for_performance(section.recent_performance());
        let targeted: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| pool[i].difficulty == target)
            .collect();
        let candidates = if targeted.is_empty() {
            &remaining
        } else {
            &targeted
        };

        debug!(
            section = %section.section_id,
            target = target.as_str(),
            candidates = candidates.len(),
            "selecting question"
        );
        return pick(candidates, rng);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub section: SectionConfidence,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub section_id: String,
    pub correct_answers: u32,
    pub total_answers: u32,
    pub confidence: f64,
    pub score: u32,
    pub mastery_level: MasteryLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub session: DiagnosticSession,
    pub sections: Vec<SectionResult>,
}

pub struct DiagnosticSelector<R: Rng> {
    pool: Vec<Question>,
    sections: Vec<SectionConfidence>,
    asked: HashSet<String>,
    phase: Phase,
    session: DiagnosticSession,
    rng: R,
}

impl<R: Rng> DiagnosticSelector<R> {
    /// Start a fresh diagnostic over a validated question pool.
    pub fn new(subject_id: &str, pool: Vec<Question>, rng: R, now: DateTime<Utc>) -> Self {
        let session = DiagnosticSession::new(subject_id, now);
        info!(session = %session.id, questions = pool.len(), "diagnostic started");
        Self::build(session, pool, rng)
    }

    /// Continue an in-progress session by replaying its answers.
    pub fn resume(session: DiagnosticSession, pool: Vec<Question>, rng: R) -> Result<Self> {
        if session.status == DiagnosticStatus::Completed {
            return Err(AdeptError::InvalidTransition {
                state: "done",
                action: "resume",
            });
        }

        let answers = session.answers.clone();
        let mut selector = Self::build(
            DiagnosticSession {
                answers: Vec::new(),
                ..session
            },
            pool,
            rng,
        );
        for answer in answers {
            selector.asked.insert(answer.question_id.clone());
            selector.apply(answer);
        }
        selector.phase = if selector.session.answers.is_empty() {
            Phase::Idle
        } else if selector.should_stop() {
            Phase::Done
        } else {
            Phase::Selecting
        };
        info!(
            session = %selector.session.id,
            answered = selector.answered(),
            "diagnostic resumed"
        );
        Ok(selector)
    }

    fn build(session: DiagnosticSession, pool: Vec<Question>, rng: R) -> Self {
        let mut seen = HashSet::new();
        let pool: Vec<Question> = pool
            .into_iter()
            .filter(|q| seen.insert(q.id.clone()))
            .collect();

        let mut sections: Vec<SectionConfidence> = Vec::new();
        for q in &pool {
            if !sections.iter().any(|s| s.section_id == q.section_id) {
                sections.push(SectionConfidence::new(&q.section_id));
            }
        }

        Self {
            pool,
            sections,
            asked: HashSet::new(),
            phase: Phase::Idle,
            session,
            rng,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[cfg(test)]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn session(&self) -> &DiagnosticSession {
        &self.session
    }

    pub fn sections(&self) -> &[SectionConfidence] {
        &self.sections
    }

    pub fn answered(&self) -> usize {
        self.session.answers.len()
    }

    fn question(&self, id: &str) -> Option<&Question> {
        self.pool.iter().find(|q| q.id == id)
    }

    fn should_stop(&self) -> bool {
        self.answered() >= MAX_QUESTIONS
            || self
                .sections
                .iter()
                .all(|s| s.total_answers >= MIN_SECTION_ANSWERS)
    }

    /// The question to show next, or `None` once the diagnostic is over.
    ///
    /// Asking again while an answer is pending returns the same question.
    pub fn next_question(&mut self) -> Option<&Question> {
        if self.phase == Phase::Done {
            return None;
        }
        if let Phase::AwaitingAnswer(id) = &self.phase {
            let id = id.clone();
            return self.question(&id);
        }

        let opening = self.phase == Phase::Idle && self.asked.is_empty();
        self.phase = Phase::Selecting;
        let index = if opening {
            select_first(&self.pool, &mut self.rng)
        } else {
            select_next(&self.pool, &self.sections, &self.asked, &mut self.rng)
        };

        match index {
            Some(i) => {
                let id = self.pool[i].id.clone();
                self.asked.insert(id.clone());
                self.phase = Phase::AwaitingAnswer(id);
                Some(&self.pool[i])
            }
            None => {
                info!(session = %self.session.id, answered = self.answered(), "no question left");
                self.phase = Phase::Done;
                None
            }
        }
    }

    fn apply(&mut self, answer: DiagnosticAnswer) -> SectionConfidence {
        let updated = match self
            .sections
            .iter_mut()
            .find(|s| s.section_id == answer.section_id)
        {
            Some(section) => {
                *section = update_confidence(section, answer.is_correct);
                section.clone()
            }
            None => {
                let section =
                    update_confidence(&SectionConfidence::new(&answer.section_id), answer.is_correct);
                self.sections.push(section.clone());
                section
            }
        };
        self.session.answers.push(answer);
        updated
    }

    /// Record the learner's answer to the pending question.
    pub fn submit_answer(
        &mut self,
        question_id: &str,
        user_answer: &str,
        time_spent_seconds: u32,
    ) -> Result<AnswerOutcome> {
        let pending = match &self.phase {
            Phase::AwaitingAnswer(id) => id.clone(),
            other => {
                return Err(AdeptError::InvalidTransition {
                    state: other.as_str(),
                    action: "submit an answer",
                })
            }
        };

        let question = self
            .question(question_id)
            .ok_or_else(|| AdeptError::UnknownQuestion(question_id.to_string()))?;
        if pending != question_id {
            return Err(AdeptError::InvalidTransition {
                state: "awaiting an answer",
                action: "answer a question that is not pending",
            });
        }

        let is_correct = question.is_correct(user_answer);
        let answer = DiagnosticAnswer {
            question_id: question.id.clone(),
            topic_id: question.topic_id.clone(),
            section_id: question.section_id.clone(),
            user_answer: user_answer.to_string(),
            is_correct,
            time_spent_seconds,
        };

        let section = self.apply(answer);
        let done = self.should_stop();
        self.phase = if done { Phase::Done } else { Phase::Selecting };

        debug!(
            question = question_id,
            is_correct,
            section = %section.section_id,
            confidence = section.confidence,
            done,
            "answer recorded"
        );

        Ok(AnswerOutcome {
            is_correct,
            section,
            done,
        })
    }

    /// Close the session. Completion is final: the selector is consumed.
    pub fn finish(mut self, now: DateTime<Utc>) -> DiagnosticReport {
        self.phase = Phase::Done;
        self.session.status = DiagnosticStatus::Completed;
        self.session.completed_at = Some(now);

        let sections = self
            .sections
            .iter()
            .map(|s| {
                let score = percent(s.correct_answers, s.total_answers);
                SectionResult {
                    section_id: s.section_id.clone(),
                    correct_answers: s.correct_answers,
                    total_answers: s.total_answers,
                    confidence: s.confidence,
                    score,
                    mastery_level: classify(score, s.total_answers),
                }
            })
            .collect();

        info!(
            session = %self.session.id,
            answered = self.session.answers.len(),
            "diagnostic completed"
        );

        DiagnosticReport {
            session: self.session,
            sections,
        }
    }
}

impl LearnerState {
    /// Fold a completed diagnostic's answers into the knowledge states and
    /// keep the session as the latest one.
    pub fn apply_diagnostic(&mut self, report: &DiagnosticReport, now: DateTime<Utc>) {
        for answer in &report.session.answers {
            self.record_answer(&answer.topic_id, answer.is_correct, now);
        }
        self.diagnostic_session = Some(report.session.clone());
    }
}

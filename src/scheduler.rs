//! SM-2 spaced repetition.
//!
//! Quality ratings (0-5):
//! - 0: Don't know, card stays due today and is re-queued within the session
//! - 1: Forgot, see it again tomorrow
//! - 2-3: Recalled with serious difficulty (not offered by the UI)
//! - 4: Good
//! - 5: Easy
//!
//! Intervals are whole days and dates are calendar dates; time of day is never
//! consulted. Intermediate day counts are rounded at each step.

use std::cmp::Ordering;
use std::collections::VecDeque;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::error::{AdeptError, Result};
use crate::models::{FlashcardProgress, ReviewRecord};
use crate::state::LearnerState;

/// Floor applied to the ease factor on every update
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Cards at or beyond this interval count as mastered
pub const MASTERED_INTERVAL: u32 = 21;
/// Upper bound on a scheduled interval (100 years)
pub const MAX_INTERVAL: u32 = 36_500;

const EASY_BONUS: f64 = 1.5;

/// A review grade in 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Quality(u8);

impl Quality {
    pub const DONT_KNOW: Quality = Quality(0);
    pub const FORGOT: Quality = Quality(1);
    pub const GOOD: Quality = Quality(4);
    pub const EASY: Quality = Quality(5);

    /// The four grades offered to the learner.
    pub const BUTTONS: [Quality; 4] = [
        Quality::DONT_KNOW,
        Quality::FORGOT,
        Quality::GOOD,
        Quality::EASY,
    ];

    pub fn new(value: u8) -> Result<Self> {
        if value > 5 {
            return Err(AdeptError::InvalidQuality(value));
        }
        Ok(Quality(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Don't know",
            1 => "Forgot",
            2 => "Hard",
            3 => "Difficult",
            4 => "Good",
            _ => "Easy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dont-know" | "dont_know" | "d" => Some(Quality::DONT_KNOW),
            "forgot" | "f" => Some(Quality::FORGOT),
            "good" | "g" => Some(Quality::GOOD),
            "easy" | "e" => Some(Quality::EASY),
            other => other.parse::<u8>().ok().and_then(|v| Quality::new(v).ok()),
        }
    }
}

impl TryFrom<u8> for Quality {
    type Error = AdeptError;

    fn try_from(value: u8) -> Result<Self> {
        Quality::new(value)
    }
}

pub fn clamp_ease(ease_factor: f64) -> f64 {
    ease_factor.max(MIN_EASE_FACTOR)
}

/// Scheduling parameters after one review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
}

/// One SM-2 step. Both real reviews and previews go through here.
pub fn next_step(ease_factor: f64, interval: u32, repetitions: u32, quality: Quality) -> Step {
    let q = quality.value() as f64;
    let ease_factor = clamp_ease(ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)));
    let easy = quality == Quality::EASY;

    let (interval, repetitions) = match quality.value() {
        0 => (0, 0),
        1 => (1, 0),
        _ => {
            let repetitions = repetitions + 1;
            let interval = match repetitions {
                1 => {
                    if easy {
                        4
                    } else {
                        1
                    }
                }
                2 => {
                    if easy {
                        10
                    } else {
                        6
                    }
                }
                _ => {
                    let base = (interval as f64 * ease_factor).round();
                    let days = if easy { (base * EASY_BONUS).round() } else { base };
                    days as u32
                }
            };
            (interval, repetitions)
        }
    };

    Step {
        ease_factor,
        interval: interval.min(MAX_INTERVAL),
        repetitions,
    }
}

/// Interval a review of `quality` would produce, without touching the card.
pub fn preview_interval(progress: &FlashcardProgress, quality: Quality) -> u32 {
    next_step(
        progress.ease_factor,
        progress.interval,
        progress.repetitions,
        quality,
    )
    .interval
}

/// Previews for each button the learner is shown.
pub fn preview_all(progress: &FlashcardProgress) -> [(Quality, u32); 4] {
    Quality::BUTTONS.map(|q| (q, preview_interval(progress, q)))
}

/// Format an interval in days to a short label
pub fn format_interval(days: u32) -> String {
    if days == 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

impl FlashcardProgress {
    /// A card that has never been reviewed, due today.
    pub fn new(card_id: &str, topic_id: &str, subject_id: &str, today: NaiveDate) -> Self {
        Self {
            card_id: card_id.to_string(),
            topic_id: topic_id.to_string(),
            subject_id: subject_id.to_string(),
            ease_factor: DEFAULT_EASE_FACTOR,
            interval: 0,
            repetitions: 0,
            next_review_date: today,
            last_review_date: None,
            review_history: Vec::new(),
        }
    }

    /// The card after being reviewed with `quality` on `today`.
    pub fn reviewed(&self, quality: Quality, today: NaiveDate) -> Self {
        let step = next_step(self.ease_factor, self.interval, self.repetitions, quality);

        let mut review_history = self.review_history.clone();
        review_history.push(ReviewRecord {
            date: today,
            quality: quality.value(),
            interval: self.interval,
        });

        Self {
            card_id: self.card_id.clone(),
            topic_id: self.topic_id.clone(),
            subject_id: self.subject_id.clone(),
            ease_factor: step.ease_factor,
            interval: step.interval,
            repetitions: step.repetitions,
            next_review_date: today + Duration::days(step.interval as i64),
            last_review_date: Some(today),
            review_history,
        }
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }

    pub fn is_new(&self) -> bool {
        self.repetitions == 0
    }

    pub fn is_mastered(&self) -> bool {
        self.interval >= MASTERED_INTERVAL
    }
}

/// Presentation order: due cards first (lowest ease first), then upcoming
/// cards by date.
pub fn priority_cmp(a: &FlashcardProgress, b: &FlashcardProgress, today: NaiveDate) -> Ordering {
    match (a.is_due(today), b.is_due(today)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .ease_factor
            .total_cmp(&b.ease_factor)
            .then_with(|| a.next_review_date.cmp(&b.next_review_date))
            .then_with(|| a.card_id.cmp(&b.card_id)),
        (false, false) => a
            .next_review_date
            .cmp(&b.next_review_date)
            .then_with(|| a.card_id.cmp(&b.card_id)),
    }
}

pub fn prioritize(cards: &mut [&FlashcardProgress], today: NaiveDate) {
    cards.sort_by(|a, b| priority_cmp(a, b, today));
}

pub fn due_cards<'a, I>(cards: I, today: NaiveDate) -> Vec<&'a FlashcardProgress>
where
    I: IntoIterator<Item = &'a FlashcardProgress>,
{
    let mut due: Vec<&FlashcardProgress> = cards.into_iter().filter(|c| c.is_due(today)).collect();
    prioritize(&mut due, today);
    due
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub total: usize,
    pub new_cards: usize,
    pub learning: usize,
    pub mastered: usize,
    pub due_today: usize,
    pub average_ease_factor: f64,
}

pub fn deck_stats<'a, I>(cards: I, today: NaiveDate) -> DeckStats
where
    I: IntoIterator<Item = &'a FlashcardProgress>,
{
    let mut stats = DeckStats {
        total: 0,
        new_cards: 0,
        learning: 0,
        mastered: 0,
        due_today: 0,
        average_ease_factor: DEFAULT_EASE_FACTOR,
    };
    let mut ease_sum = 0.0;

    for card in cards {
        stats.total += 1;
        ease_sum += card.ease_factor;
        if card.is_new() {
            stats.new_cards += 1;
        } else if card.is_mastered() {
            stats.mastered += 1;
        } else {
            stats.learning += 1;
        }
        if card.is_due(today) {
            stats.due_today += 1;
        }
    }

    if stats.total > 0 {
        stats.average_ease_factor = ease_sum / stats.total as f64;
    }
    stats
}

impl LearnerState {
    /// Apply one review, creating the card's progress on first review.
    pub fn review_card(
        &mut self,
        card_id: &str,
        topic_id: &str,
        subject_id: &str,
        quality: Quality,
        today: NaiveDate,
    ) -> &FlashcardProgress {
        let current = self
            .flashcard_progress
            .get(card_id)
            .cloned()
            .unwrap_or_else(|| FlashcardProgress::new(card_id, topic_id, subject_id, today));
        let next = current.reviewed(quality, today);

        debug!(
            card = card_id,
            quality = quality.value(),
            ease_factor = next.ease_factor,
            interval = next.interval,
            repetitions = next.repetitions,
            "reviewed card"
        );

        self.flashcard_progress.insert(card_id.to_string(), next);
        &self.flashcard_progress[card_id]
    }

    pub fn due_cards(&self, today: NaiveDate) -> Vec<&FlashcardProgress> {
        due_cards(self.flashcard_progress.values(), today)
    }

    /// Cards not yet due, soonest first.
    pub fn upcoming_cards(&self, today: NaiveDate) -> Vec<&FlashcardProgress> {
        let mut upcoming: Vec<&FlashcardProgress> = self
            .flashcard_progress
            .values()
            .filter(|c| !c.is_due(today))
            .collect();
        prioritize(&mut upcoming, today);
        upcoming
    }

    pub fn card_stats(&self, today: NaiveDate) -> DeckStats {
        deck_stats(self.flashcard_progress.values(), today)
    }
}

/// One sitting of flashcard review.
///
/// Cards graded "don't know" go to the back of the queue and come around
/// again before the sitting ends.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    topic_id: String,
    subject_id: String,
    queue: VecDeque<String>,
    reviewed: usize,
    requeued: usize,
}

impl ReviewSession {
    pub fn new<I>(topic_id: &str, subject_id: &str, card_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            topic_id: topic_id.to_string(),
            subject_id: subject_id.to_string(),
            queue: card_ids.into_iter().collect(),
            reviewed: 0,
            requeued: 0,
        }
    }

    /// Queue for a card pool: due cards by priority, then never-reviewed cards
    /// in pool order. Cards scheduled for a later day are left out.
    pub fn for_pool(
        state: &LearnerState,
        pool_ids: &[String],
        topic_id: &str,
        subject_id: &str,
        today: NaiveDate,
    ) -> Self {
        let known: Vec<&FlashcardProgress> = pool_ids
            .iter()
            .filter_map(|id| state.flashcard_progress.get(id))
            .collect();
        let due = due_cards(known, today);

        let fresh = pool_ids
            .iter()
            .filter(|id| !state.flashcard_progress.contains_key(id.as_str()))
            .cloned();

        let ids: Vec<String> = due
            .into_iter()
            .map(|c| c.card_id.clone())
            .chain(fresh)
            .collect();
        Self::new(topic_id, subject_id, ids)
    }

    pub fn current(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn reviewed(&self) -> usize {
        self.reviewed
    }

    pub fn requeued(&self) -> usize {
        self.requeued
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop the current card without reviewing it.
    pub fn skip(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Grade the current card. Returns its updated progress, or `None` when
    /// the queue is empty.
    pub fn grade(
        &mut self,
        state: &mut LearnerState,
        quality: Quality,
        today: NaiveDate,
    ) -> Option<FlashcardProgress> {
        let card_id = self.queue.pop_front()?;
        let progress = state
            .review_card(&card_id, &self.topic_id, &self.subject_id, quality, today)
            .clone();
        self.reviewed += 1;

        if quality == Quality::DONT_KNOW {
            self.requeued += 1;
            self.queue.push_back(card_id);
        }
        Some(progress)
    }
}

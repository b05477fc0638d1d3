//! Validation boundary for generated content.
//!
//! Question and flashcard pools arrive as loosely shaped JSON. Each item is
//! checked on its own and comes out either `Valid` or `Invalid` with a reason;
//! only valid items are handed to the selector or scheduler.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{AdeptError, Result};
use crate::models::{Difficulty, Flashcard, Question, QuestionOption};

/// Fewest options a multiple-choice question may have
pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    Valid(T),
    Invalid { id: Option<String>, reason: String },
}

impl<T> Validated<T> {
    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        matches!(self, Validated::Valid(_))
    }

    #[cfg(test)]
    pub fn into_result(self, item: &str) -> Result<T> {
        match self {
            Validated::Valid(v) => Ok(v),
            Validated::Invalid { id, reason } => Err(AdeptError::MalformedInput {
                item: match id {
                    Some(id) => format!("{} '{}'", item, id),
                    None => item.to_string(),
                },
                reason,
            }),
        }
    }
}

/// An item that failed validation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Rejected {
    pub id: Option<String>,
    pub reason: String,
}

/// Partition validated items into accepted values and rejections.
pub fn split<T>(items: Vec<Validated<T>>) -> (Vec<T>, Vec<Rejected>) {
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for item in items {
        match item {
            Validated::Valid(v) => valid.push(v),
            Validated::Invalid { id, reason } => rejected.push(Rejected { id, reason }),
        }
    }
    (valid, rejected)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawOption {
    id: Option<String>,
    text: Option<String>,
    is_correct: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawQuestion {
    id: Option<String>,
    topic_id: Option<String>,
    section_id: Option<String>,
    difficulty: Option<String>,
    options: Option<Vec<RawOption>>,
    correct_answer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFlashcard {
    id: Option<String>,
    front: Option<String>,
    back: Option<String>,
    tags: Option<Vec<String>>,
}

fn required(field: Option<String>, name: &str) -> std::result::Result<String, String> {
    match field.map(|s| s.trim().to_string()) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(format!("missing {}", name)),
    }
}

fn non_blank(id: &Option<String>) -> Option<String> {
    id.as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn build_question(raw: RawQuestion) -> std::result::Result<Question, String> {
    let id = required(raw.id, "id")?;
    let topic_id = required(raw.topic_id, "topicId")?;
    let section_id = required(raw.section_id, "sectionId")?;

    let difficulty_str = required(raw.difficulty, "difficulty")?;
    let difficulty = Difficulty::from_str(&difficulty_str)
        .ok_or_else(|| format!("unknown difficulty '{}'", difficulty_str))?;

    let raw_options = raw.options.unwrap_or_default();
    if raw_options.len() < MIN_OPTIONS {
        return Err(format!(
            "expected at least {} options, got {}",
            MIN_OPTIONS,
            raw_options.len()
        ));
    }

    let mut seen = HashSet::new();
    let mut options = Vec::with_capacity(raw_options.len());
    for (i, raw) in raw_options.into_iter().enumerate() {
        let option_id = required(raw.id, &format!("option {} id", i + 1))?;
        let text = required(raw.text, &format!("option {} text", i + 1))?;
        if !seen.insert(option_id.clone()) {
            return Err(format!("duplicate option id '{}'", option_id));
        }
        options.push(QuestionOption {
            id: option_id,
            text,
            is_correct: raw.is_correct.unwrap_or(false),
        });
    }

    if !options.iter().any(|o| o.is_correct) {
        return Err("no option marked correct".to_string());
    }

    let correct_answer = required(raw.correct_answer, "correctAnswer")?;
    if !options
        .iter()
        .any(|o| o.is_correct && o.id == correct_answer)
    {
        return Err(format!(
            "correctAnswer '{}' does not name a correct option",
            correct_answer
        ));
    }

    Ok(Question {
        id,
        topic_id,
        section_id,
        difficulty,
        options,
        correct_answer,
    })
}

fn build_flashcard(raw: RawFlashcard) -> std::result::Result<Flashcard, String> {
    Ok(Flashcard {
        id: required(raw.id, "id")?,
        front: required(raw.front, "front")?,
        back: required(raw.back, "back")?,
        tags: raw
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

/// Accept either a bare array or an object wrapping the array under `key`.
fn items(json: &str, key: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(AdeptError::MalformedInput {
                item: "pool".to_string(),
                reason: format!("expected an array or an object with '{}'", key),
            }),
        },
        _ => Err(AdeptError::MalformedInput {
            item: "pool".to_string(),
            reason: "expected a JSON array".to_string(),
        }),
    }
}

fn validate_each<R, T>(
    values: Vec<Value>,
    kind: &str,
    build: fn(R) -> std::result::Result<T, String>,
    id_of: fn(&R) -> Option<String>,
) -> Vec<Validated<T>>
where
    R: for<'de> Deserialize<'de>,
{
    values
        .into_iter()
        .map(|value| {
            let result = match serde_json::from_value::<R>(value) {
                Ok(raw) => {
                    let id = id_of(&raw);
                    build(raw).map_err(|reason| (id, reason))
                }
                Err(e) => Err((None, e.to_string())),
            };
            match result {
                Ok(v) => Validated::Valid(v),
                Err((id, reason)) => {
                    warn!(kind, id = id.as_deref().unwrap_or("?"), %reason, "rejected pool item");
                    Validated::Invalid { id, reason }
                }
            }
        })
        .collect()
}

pub fn parse_questions(json: &str) -> Result<Vec<Validated<Question>>> {
    Ok(validate_each(
        items(json, "questions")?,
        "question",
        build_question,
        |raw: &RawQuestion| non_blank(&raw.id),
    ))
}

pub fn parse_flashcards(json: &str) -> Result<Vec<Validated<Flashcard>>> {
    Ok(validate_each(
        items(json, "flashcards")?,
        "flashcard",
        build_flashcard,
        |raw: &RawFlashcard| non_blank(&raw.id),
    ))
}

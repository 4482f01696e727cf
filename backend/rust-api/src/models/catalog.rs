//! Typed catalog documents as the client layer sees them.
//!
//! The store enforces no schema, so every optional column stays optional.
//! Older documents use different key names (`title`, `question`, `answer`,
//! `is_right`, `sort`), sometimes next to the current ones; each type reads
//! both through a raw record and keeps the current key when both are set.
//! The answer correctness flag accepts its native boolean form and the
//! legacy `"0"`/`"1"` string encoding.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

lazy_static! {
    static ref INLINE_IMAGE_REGEX: Regex =
        Regex::new(r#"(?i)<img[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CategoryRecord")]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_hy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
struct CategoryRecord {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name_hy: Option<String>,
    #[serde(default)]
    title_hy: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    order_index: Option<i64>,
    #[serde(default, deserialize_with = "optional_legacy_flag")]
    is_active: Option<bool>,
}

impl TryFrom<CategoryRecord> for Category {
    type Error = String;

    fn try_from(record: CategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            name: record
                .name
                .or(record.title)
                .ok_or("missing field `name`")?,
            name_hy: record.name_hy.or(record.title_hy),
            description: record.description,
            icon: record.icon.or(record.image),
            order_index: record.order_index,
            is_active: record.is_active,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord")]
pub struct Question {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub question_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_text_hy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation_hy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Filled by the composite operations; never stored on the question.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<Answer>,
}

#[derive(Deserialize)]
struct QuestionRecord {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    question_text: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    question_text_hy: Option<String>,
    #[serde(default)]
    question_image: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    explanation_hy: Option<String>,
    #[serde(default)]
    difficulty_level: Option<i64>,
    #[serde(default, deserialize_with = "optional_legacy_flag")]
    is_active: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    answers: Option<Vec<Answer>>,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = String;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            category_id: record.category_id,
            question_text: record
                .question_text
                .or(record.question)
                .ok_or("missing field `question_text`")?,
            question_text_hy: record.question_text_hy,
            question_image: record.question_image,
            explanation: record.explanation,
            explanation_hy: record.explanation_hy,
            difficulty_level: record.difficulty_level,
            is_active: record.is_active,
            created_at: record.created_at,
            answers: record.answers.unwrap_or_default(),
        })
    }
}

impl Question {
    /// Image for the question: the dedicated column, or the first `<img src>`
    /// embedded in the question body.
    pub fn image(&self) -> Option<&str> {
        self.question_image
            .as_deref()
            .filter(|src| !src.is_empty())
            .or_else(|| {
                INLINE_IMAGE_REGEX
                    .captures(&self.question_text)
                    .and_then(|captures| captures.get(1))
                    .map(|src| src.as_str())
            })
    }

    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|answer| answer.is_correct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnswerRecord")]
pub struct Answer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub answer_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_text_hy: Option<String>,
    pub is_correct: bool,
    pub order_index: i64,
}

#[derive(Deserialize)]
struct AnswerRecord {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    question_id: Option<String>,
    #[serde(default)]
    answer_text: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    answer_text_hy: Option<String>,
    #[serde(default, deserialize_with = "optional_legacy_flag")]
    is_correct: Option<bool>,
    #[serde(default, deserialize_with = "optional_legacy_flag")]
    is_right: Option<bool>,
    #[serde(default)]
    order_index: Option<i64>,
    #[serde(default)]
    sort: Option<i64>,
}

impl TryFrom<AnswerRecord> for Answer {
    type Error = String;

    fn try_from(record: AnswerRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            question_id: record.question_id,
            answer_text: record
                .answer_text
                .or(record.answer)
                .ok_or("missing field `answer_text`")?,
            answer_text_hy: record.answer_text_hy,
            is_correct: record.is_correct.or(record.is_right).unwrap_or(false),
            order_index: record.order_index.or(record.sort).unwrap_or(0),
        })
    }
}

/// One finished test run, stored in `test_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttempt {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub time_spent_seconds: u64,
    #[serde(default, deserialize_with = "legacy_flag")]
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyFlag {
    Native(bool),
    Number(i64),
    Text(String),
}

impl LegacyFlag {
    fn into_bool(self) -> Option<bool> {
        match self {
            LegacyFlag::Native(value) => Some(value),
            LegacyFlag::Number(value) => Some(value != 0),
            LegacyFlag::Text(text) => parse_flag_text(&text),
        }
    }
}

/// Legacy text encodings of a boolean flag.
pub fn parse_flag_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" | "" => Some(false),
        _ => None,
    }
}

fn optional_legacy_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<LegacyFlag>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(flag) => flag
            .into_bool()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a boolean flag")),
    }
}

fn legacy_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    optional_legacy_flag(deserializer).map(|flag| flag.unwrap_or(false))
}

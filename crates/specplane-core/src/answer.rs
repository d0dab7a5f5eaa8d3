//! Typed answer values and their validation against a question's shape.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::bank::{AnswerShape, Question};
use crate::error::ValidationError;

/// A value supplied for a question, tagged by shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Free-form text response
    Text(String),
    /// Single selection
    Choice(String),
    /// Multiple selections, in the order given
    MultiChoice(Vec<String>),
    /// Yes/no confirmation
    Boolean(bool),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    pub fn choice(value: impl Into<String>) -> Self {
        AnswerValue::Choice(value.into())
    }

    pub fn multi_choice<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::MultiChoice(values.into_iter().map(Into::into).collect())
    }

    pub fn shape(&self) -> AnswerShape {
        match self {
            AnswerValue::Text(_) => AnswerShape::Text,
            AnswerValue::Choice(_) => AnswerShape::Choice,
            AnswerValue::MultiChoice(_) => AnswerShape::MultiChoice,
            AnswerValue::Boolean(_) => AnswerShape::Boolean,
        }
    }

    /// Human-readable rendering used in spec sections
    pub fn render(&self) -> String {
        match self {
            AnswerValue::Text(s) => s.trim().to_string(),
            AnswerValue::Choice(s) => s.clone(),
            AnswerValue::MultiChoice(v) => v.join(", "),
            AnswerValue::Boolean(b) => if *b { "yes" } else { "no" }.to_string(),
        }
    }

    /// Keys compared against a dependent question's `when` list
    pub(crate) fn trigger_keys(&self) -> Vec<String> {
        match self {
            AnswerValue::Text(s) => vec![s.trim().to_string()],
            AnswerValue::Choice(s) => vec![s.clone()],
            AnswerValue::MultiChoice(v) => v.clone(),
            AnswerValue::Boolean(b) => vec![b.to_string()],
        }
    }

    /// Check that this value satisfies the question's shape and choices.
    pub fn validate_for(&self, question: &Question) -> Result<(), ValidationError> {
        if self.shape() != question.answer_shape {
            return Err(ValidationError::ShapeMismatch {
                question_id: question.id.clone(),
                expected: question.answer_shape,
                actual: self.shape(),
            });
        }

        match self {
            AnswerValue::Text(s) => {
                if s.trim().is_empty() {
                    return Err(ValidationError::EmptyAnswer(question.id.clone()));
                }
            }
            AnswerValue::Choice(value) => check_choice(question, value)?,
            AnswerValue::MultiChoice(values) => {
                if values.is_empty() {
                    return Err(ValidationError::EmptyAnswer(question.id.clone()));
                }
                let mut seen = HashSet::new();
                for value in values {
                    check_choice(question, value)?;
                    if !seen.insert(value.as_str()) {
                        return Err(ValidationError::DuplicateSelection {
                            question_id: question.id.clone(),
                            value: value.clone(),
                        });
                    }
                }
            }
            AnswerValue::Boolean(_) => {}
        }

        Ok(())
    }

    /// Parse raw user input into a value of the question's shape.
    ///
    /// Multi-choice input is comma separated. Booleans accept
    /// `yes/no`, `y/n`, `true/false` and `1/0`. The result is not yet
    /// validated against the question's choices.
    pub fn parse_input(question: &Question, input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let unparseable = || ValidationError::Unparseable {
            question_id: question.id.clone(),
            input: input.to_string(),
            expected: question.answer_shape,
        };

        match question.answer_shape {
            AnswerShape::Text => Ok(AnswerValue::Text(trimmed.to_string())),
            AnswerShape::Choice => Ok(AnswerValue::Choice(trimmed.to_string())),
            AnswerShape::MultiChoice => Ok(AnswerValue::MultiChoice(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            AnswerShape::Boolean => match trimmed.to_lowercase().as_str() {
                "yes" | "y" | "true" | "1" => Ok(AnswerValue::Boolean(true)),
                "no" | "n" | "false" | "0" => Ok(AnswerValue::Boolean(false)),
                _ => Err(unparseable()),
            },
        }
    }
}

fn check_choice(question: &Question, value: &str) -> Result<(), ValidationError> {
    if question.choices.iter().any(|c| c == value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidChoice {
            question_id: question.id.clone(),
            value: value.to_string(),
            allowed: question.choices.clone(),
        })
    }
}

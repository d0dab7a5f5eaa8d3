//! The question catalog.
//!
//! A [`QuestionBank`] is loaded once, validated, and then shared read-only by
//! every session. Bank order matters: it is the order questions are asked in,
//! the order sections are rendered in, and dependencies may only point
//! backwards in it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;
use crate::error::{BankLoadError, UnresolvedDependency};

/// The shape an answer must take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    /// Free-form text
    #[default]
    Text,
    /// Exactly one of the question's choices
    Choice,
    /// One or more of the question's choices
    MultiChoice,
    /// Yes/no
    Boolean,
}

impl AnswerShape {
    /// Whether questions of this shape carry a list of choices
    pub fn has_choices(self) -> bool {
        matches!(self, AnswerShape::Choice | AnswerShape::MultiChoice)
    }
}

impl std::fmt::Display for AnswerShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerShape::Text => write!(f, "text"),
            AnswerShape::Choice => write!(f, "choice"),
            AnswerShape::MultiChoice => write!(f, "multi_choice"),
            AnswerShape::Boolean => write!(f, "boolean"),
        }
    }
}

/// A single interview question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier, unique within the bank
    pub id: String,
    /// Design concern this question contributes coverage to
    pub category: String,
    /// The text shown to the user
    #[serde(alias = "prompt")]
    pub prompt_text: String,
    /// Whether the question counts towards coverage and completion
    #[serde(default)]
    pub required: bool,
    #[serde(default, alias = "shape")]
    pub answer_shape: AnswerShape,
    /// Allowed values for choice and multi_choice questions, in display order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Earlier question that must be answered before this one is asked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    /// Answers to `depends_on` that enable this question (any answer if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Vec<String>>,
    /// Optional explanation shown next to the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        prompt_text: impl Into<String>,
        answer_shape: AnswerShape,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            prompt_text: prompt_text.into(),
            required: false,
            answer_shape,
            choices: Vec::new(),
            depends_on: None,
            when: None,
            help: None,
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependency(mut self, question_id: impl Into<String>) -> Self {
        self.depends_on = Some(question_id.into());
        self
    }

    pub fn with_trigger<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.when = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether an answer to this question's dependency enables it.
    pub fn is_triggered_by(&self, dependency_answer: &AnswerValue) -> bool {
        match &self.when {
            None => true,
            Some(triggers) => dependency_answer
                .trigger_keys()
                .iter()
                .any(|key| triggers.iter().any(|t| t == key)),
        }
    }

    fn check_structure(&self) -> Result<(), BankLoadError> {
        let invalid = |reason: &str| BankLoadError::InvalidQuestion {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(invalid("category cannot be empty"));
        }
        if self.prompt_text.trim().is_empty() {
            return Err(invalid("prompt text cannot be empty"));
        }

        if self.answer_shape.has_choices() {
            if self.choices.is_empty() {
                return Err(invalid("choice questions need at least one choice"));
            }
            let mut seen = HashSet::new();
            for choice in &self.choices {
                if choice.trim().is_empty() {
                    return Err(invalid("choices cannot be empty"));
                }
                if !seen.insert(choice.as_str()) {
                    return Err(invalid(&format!("choice '{}' is listed twice", choice)));
                }
            }
        } else if !self.choices.is_empty() {
            return Err(invalid(&format!(
                "{} questions cannot declare choices",
                self.answer_shape
            )));
        }

        match (&self.depends_on, &self.when) {
            (None, Some(_)) => Err(invalid("'when' requires 'depends_on'")),
            (Some(_), Some(triggers)) if triggers.is_empty() => {
                Err(invalid("'when' needs at least one value"))
            }
            _ => Ok(()),
        }
    }
}

/// Immutable, validated, ordered catalog of questions.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionBank {
    questions: Vec<Question>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// On-disk layout: a list of `[[questions]]` tables (TOML) or a `questions`
/// array (JSON).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BankFile {
    #[serde(default)]
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank, rejecting duplicate ids, dangling or forward
    /// dependencies, and malformed questions.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankLoadError> {
        if questions.is_empty() {
            return Err(BankLoadError::Empty);
        }

        for question in &questions {
            question.check_structure()?;
        }

        let mut index = HashMap::with_capacity(questions.len());
        let mut duplicates: Vec<String> = Vec::new();
        for (position, question) in questions.iter().enumerate() {
            if index.contains_key(&question.id) {
                if !duplicates.contains(&question.id) {
                    duplicates.push(question.id.clone());
                }
            } else {
                index.insert(question.id.clone(), position);
            }
        }
        if !duplicates.is_empty() {
            return Err(BankLoadError::DuplicateIds(duplicates));
        }

        let unresolved: Vec<UnresolvedDependency> = questions
            .iter()
            .enumerate()
            .filter_map(|(position, question)| {
                let dependency = question.depends_on.as_ref()?;
                match index.get(dependency) {
                    Some(&dep_position) if dep_position < position => None,
                    _ => Some(UnresolvedDependency {
                        question_id: question.id.clone(),
                        depends_on: dependency.clone(),
                    }),
                }
            })
            .collect();
        if !unresolved.is_empty() {
            return Err(BankLoadError::UnresolvedDependencies(unresolved));
        }

        let bank = Self { questions, index };
        bank.check_triggers()?;

        tracing::debug!(
            questions = bank.questions.len(),
            categories = bank.categories().len(),
            "Question bank loaded"
        );

        Ok(bank)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BankLoadError> {
        let file: BankFile =
            toml::from_str(content).map_err(|e| BankLoadError::Parse(e.to_string()))?;
        Self::new(file.questions)
    }

    pub fn from_json_str(content: &str) -> Result<Self, BankLoadError> {
        let file: BankFile =
            serde_json::from_str(content).map_err(|e| BankLoadError::Parse(e.to_string()))?;
        Self::new(file.questions)
    }

    /// Trigger values must be answers the dependency can actually produce.
    fn check_triggers(&self) -> Result<(), BankLoadError> {
        for question in &self.questions {
            let (Some(dependency_id), Some(triggers)) = (&question.depends_on, &question.when)
            else {
                continue;
            };
            let Some(dependency) = self.get(dependency_id) else {
                continue;
            };

            for trigger in triggers {
                let possible = match dependency.answer_shape {
                    AnswerShape::Choice | AnswerShape::MultiChoice => {
                        dependency.choices.contains(trigger)
                    }
                    AnswerShape::Boolean => trigger == "true" || trigger == "false",
                    AnswerShape::Text => !trigger.trim().is_empty(),
                };
                if !possible {
                    return Err(BankLoadError::InvalidQuestion {
                        id: question.id.clone(),
                        reason: format!(
                            "'{}' can never be an answer to '{}'",
                            trigger, dependency.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.index.get(id).map(|&position| &self.questions[position])
    }

    /// Position of a question in bank order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Categories in order of first appearance
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for question in &self.questions {
            if !categories.contains(&question.category.as_str()) {
                categories.push(question.category.as_str());
            }
        }
        categories
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.questions.iter().any(|q| q.category == category)
    }

    /// Questions of one category, in bank order
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.category == category)
    }

    pub fn required_count(&self) -> usize {
        self.questions.iter().filter(|q| q.required).count()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

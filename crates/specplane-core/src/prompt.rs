//! Natural-language generation prompt derived from a [`SpecDocument`].

use crate::answer::AnswerValue;
use crate::generator::{SectionEntry, SpecDocument};

impl SpecDocument {
    /// Render the prompt handed to a downstream code generator.
    ///
    /// Uses nothing but the document, so a stored document can be
    /// re-rendered without the session or the bank.
    pub fn generation_prompt(&self) -> String {
        let mut parts = Vec::new();
        let roles = &self.roles;

        parts.push(format!(
            "# Build the {} `{}`\n",
            self.component_type, self.component_name
        ));

        if let Some(section) = self.section(&roles.purpose) {
            parts.push("## PURPOSE\n".to_string());
            for entry in &section.entries {
                parts.push(format!("{}\n", statement(entry)));
            }
            parts.push("\n".to_string());
        }

        if let Some(section) = self.section(&roles.failure_handling) {
            parts.push("## CRITICAL EDGE CASES\n".to_string());
            let items = section.entries.iter().flat_map(list_items);
            for (i, item) in items.enumerate() {
                parts.push(format!("{}. {}\n", i + 1, item));
            }
            parts.push("\n".to_string());
        }

        if let Some(section) = self.section(&roles.state_management) {
            parts.push("## STATES\n".to_string());
            for item in section.entries.iter().flat_map(list_items) {
                parts.push(format!("- {}\n", item));
            }
            parts.push("\n".to_string());
        }

        for section in self
            .sections
            .iter()
            .filter(|s| !roles.is_designated(&s.name))
        {
            parts.push(format!("## {}\n", section_title(&section.name)));
            for entry in &section.entries {
                parts.push(format!("- {}\n", statement(entry)));
            }
            parts.push("\n".to_string());
        }

        let coverage = &self.coverage;
        parts.push(format!(
            "Coverage: {:.0}% ({} risk)\n",
            coverage.aggregate_score * 100.0,
            coverage.risk_level
        ));
        if !coverage.at_risk_categories.is_empty() {
            let at_risk: Vec<&str> = coverage.at_risk_categories.iter().map(String::as_str).collect();
            parts.push(format!("At-risk categories: {}\n", at_risk.join(", ")));
        }

        parts.join("")
    }
}

/// Free text stands alone; selections need the question for context
fn statement(entry: &SectionEntry) -> String {
    match &entry.value {
        AnswerValue::Text(_) => entry.answer.clone(),
        _ => format!("{}: {}", entry.prompt, entry.answer),
    }
}

fn list_items(entry: &SectionEntry) -> Vec<String> {
    match &entry.value {
        AnswerValue::MultiChoice(values) => values.clone(),
        _ => vec![statement(entry)],
    }
}

fn section_title(name: &str) -> String {
    name.replace('_', " ").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{AnswerShape, Question, QuestionBank};
    use crate::engine::InterviewEngine;
    use crate::generator::SpecGenerator;
    use crate::session::{ComponentType, Session, SessionMode, SessionStatus};

    fn document() -> SpecDocument {
        let bank = QuestionBank::new(vec![
            Question::new("purpose.what", "purpose", "What does it do?", AnswerShape::Text)
                .with_required(true),
            Question::new("fail.modes", "failure_handling", "Failure modes?", AnswerShape::MultiChoice)
                .with_choices(["timeout", "overload", "bad_input"])
                .with_required(true),
            Question::new("fail.retry", "failure_handling", "Retries?", AnswerShape::Boolean),
            Question::new("state.list", "state_management", "States?", AnswerShape::MultiChoice)
                .with_choices(["idle", "active", "draining"]),
            Question::new("perf.latency", "performance_budget", "Latency target?", AnswerShape::Choice)
                .with_choices(["10ms", "100ms"]),
        ])
        .unwrap();

        let engine = InterviewEngine::new(&bank);
        let s = Session::new("rate-limiter", ComponentType::Service, SessionMode::Interactive);
        let s = engine
            .record_answer(&s, "purpose.what", AnswerValue::text("Throttles API calls per client"))
            .unwrap();
        let s = engine
            .record_answer(&s, "fail.modes", AnswerValue::multi_choice(["timeout", "overload"]))
            .unwrap();
        let s = engine
            .record_answer(&s, "fail.retry", AnswerValue::Boolean(true))
            .unwrap();
        let s = engine
            .record_answer(&s, "state.list", AnswerValue::multi_choice(["idle", "active"]))
            .unwrap();
        let mut s = engine
            .record_answer(&s, "perf.latency", AnswerValue::choice("10ms"))
            .unwrap();
        s.set_status(SessionStatus::Complete);

        SpecGenerator::default().generate(&s, &bank).unwrap()
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = document().generation_prompt();

        assert!(prompt.starts_with("# Build the service `rate-limiter`"));
        assert!(prompt.contains("## PURPOSE\nThrottles API calls per client\n"));
        assert!(prompt.contains(
            "## CRITICAL EDGE CASES\n1. timeout\n2. overload\n3. Retries?: yes\n"
        ));
        assert!(prompt.contains("## STATES\n- idle\n- active\n"));
        assert!(prompt.contains("## PERFORMANCE BUDGET\n- Latency target?: 10ms\n"));
        assert!(prompt.contains("Coverage: 100% (low risk)"));
        assert!(!prompt.contains("At-risk"));

        let purpose = prompt.find("## PURPOSE").unwrap();
        let edge = prompt.find("## CRITICAL EDGE CASES").unwrap();
        let states = prompt.find("## STATES").unwrap();
        let perf = prompt.find("## PERFORMANCE BUDGET").unwrap();
        assert!(purpose < edge && edge < states && states < perf);
    }

    #[test]
    fn test_prompt_survives_document_round_trip() {
        let doc = document();
        let json = serde_json::to_string(&doc).unwrap();
        let restored: SpecDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.generation_prompt(), doc.generation_prompt());
    }

    #[test]
    fn test_missing_designated_sections_are_omitted() {
        let mut doc = document();
        doc.sections.retain(|s| s.name == "performance_budget");
        let prompt = doc.generation_prompt();
        assert!(!prompt.contains("## PURPOSE"));
        assert!(!prompt.contains("## CRITICAL EDGE CASES"));
        assert!(prompt.contains("## PERFORMANCE BUDGET"));
    }
}

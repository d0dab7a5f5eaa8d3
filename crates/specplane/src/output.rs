//! Writing generated artifacts to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use specplane_core::{CoverageReport, SpecDocument};

pub const SPEC_JSON: &str = "spec.json";
pub const SPEC_YAML: &str = "spec.yaml";
pub const COVERAGE_JSON: &str = "coverage.json";
pub const PROMPT_MD: &str = "prompt.md";

/// Artifacts for one session live in `<output_dir>/<session_id>/`.
pub fn session_output_dir(output_dir: &Path, document: &SpecDocument) -> PathBuf {
    output_dir.join(&document.session_id)
}

/// Write the document (JSON and YAML), the coverage report and the
/// generation prompt. Returns the written paths.
pub fn write_artifacts(
    dir: &Path,
    document: &SpecDocument,
    coverage: &CoverageReport,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let files = [
        (SPEC_JSON, serde_json::to_string_pretty(document)?),
        (SPEC_YAML, serde_yaml::to_string(document)?),
        (COVERAGE_JSON, serde_json::to_string_pretty(coverage)?),
        (PROMPT_MD, document.generation_prompt()),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = dir.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use specplane_core::{
        AnswerShape, AnswerValue, ComponentType, Orchestrator, Question, QuestionBank,
    };
    use tempfile::TempDir;

    #[test]
    fn test_write_artifacts() {
        let bank = QuestionBank::new(vec![Question::new(
            "purpose",
            "purpose",
            "What is it for?",
            AnswerShape::Text,
        )
        .with_required(true)])
        .unwrap();
        let orchestrator = Orchestrator::new(&bank);
        let session = orchestrator.start("cache", ComponentType::Component).unwrap();
        let (session, _) = orchestrator
            .advance(&session, "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let (document, coverage) = orchestrator.finish(&session).unwrap();

        let dir = TempDir::new().unwrap();
        let out = session_output_dir(dir.path(), &document);
        let written = write_artifacts(&out, &document, &coverage).unwrap();
        assert_eq!(written.len(), 4);

        let json: SpecDocument =
            serde_json::from_str(&fs::read_to_string(out.join(SPEC_JSON)).unwrap()).unwrap();
        assert_eq!(json, document);

        let yaml: SpecDocument =
            serde_yaml::from_str(&fs::read_to_string(out.join(SPEC_YAML)).unwrap()).unwrap();
        assert_eq!(yaml.content_digest(), document.content_digest());

        let prompt = fs::read_to_string(out.join(PROMPT_MD)).unwrap();
        assert!(prompt.contains("## PURPOSE"));
        assert!(out.join(COVERAGE_JSON).exists());
    }
}

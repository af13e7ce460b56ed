use crate::DocumentContext;

/// Criteria applied to every document in addition to `context.criteria`
const BASE_CRITERIA: &[&str] = &[
    "Completeness: every section the document type calls for is present and substantive",
    "Accuracy: facts, names, dates and amounts are internally consistent",
    "Compliance: terms are appropriate for the stated jurisdiction",
    "Clarity: obligations, scope and fees are unambiguous to a lay reader",
    "Tone: professional and consistent throughout",
];

/// Prompt templates for the critic
pub struct CriticPrompts;

impl CriticPrompts {
    /// Build the critique prompt for one document version
    pub fn build_critique_prompt(text: &str, context: &DocumentContext) -> String {
        let criteria = BASE_CRITERIA
            .iter()
            .map(|c| c.to_string())
            .chain(context.criteria.iter().cloned())
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a meticulous reviewer of professional and legal documents. Score the document below and list every problem you find. Do NOT rewrite the document.

## Context
{brief}
## Review Criteria
{criteria}

## Document
<document>
{text}
</document>

---

## Scoring

- 1.0: ready to send without changes
- 0.85: minor polish only
- 0.6: usable after targeted fixes
- 0.3: major gaps or errors
- 0.0: unusable

## Required Response Format

Briefly explain your assessment, then end your response with a critique block containing a single JSON object:

<critique>
{{"overall_score": 0.72, "issues": [{{"category": "completeness", "description": "What is wrong and where", "severity": "high"}}], "missing_sections": ["Section Name"], "suggested_corrections": {{"exact text in the document": "replacement text"}}}}
</critique>

Rules:
- `overall_score` MUST be a number between 0.0 and 1.0.
- `severity` is one of: low, medium, high, critical.
- Keys of `suggested_corrections` MUST be copied verbatim from the document.
- Use empty lists/objects when there is nothing to report."#,
            brief = context.render_brief(),
            criteria = criteria,
            text = text,
        )
    }
}

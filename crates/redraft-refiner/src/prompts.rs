use std::fmt::Write;

use redraft_critic::{Critique, DocumentContext};

/// Prompt templates for the refiner
pub struct RefinerPrompts;

impl RefinerPrompts {
    /// Build the prompt asking for a revised document
    pub fn build_refine_prompt(text: &str, critique: &Critique, context: &DocumentContext) -> String {
        format!(
            r#"You are revising a professional document to address a reviewer's critique. Fix every issue listed below while keeping everything that is already correct.

## Context
{brief}
## Reviewer Score
{score:.2} / 1.00

## Issues To Fix
{issues}
## Missing Sections
{missing}
## Suggested Corrections
{corrections}
## Protected Content
The following values MUST appear in the revision exactly as written (same spelling, punctuation and formatting):
{protected}
## Current Document
<document>
{text}
</document>

---

## Required Response Format

Return the complete revised document inside a single block and nothing else after it:

<revised_document>
...full revised text...
</revised_document>"#,
            brief = context.render_brief(),
            score = critique.overall_score(),
            issues = render_issues(critique),
            missing = render_list(critique.missing_sections().iter()),
            corrections = render_corrections(critique),
            protected = or_none(context.render_protected_fields()),
            text = text,
        )
    }
}

fn render_issues(critique: &Critique) -> String {
    let mut issues: Vec<_> = critique.issues().iter().collect();
    // Most severe first
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut out = String::new();
    for issue in issues {
        let _ = writeln!(
            out,
            "- [{}] ({}) {}",
            issue.severity, issue.category, issue.description
        );
    }
    or_none(out)
}

fn render_corrections(critique: &Critique) -> String {
    let mut out = String::new();
    for (original, replacement) in critique.suggested_corrections() {
        let _ = writeln!(out, "- \"{}\" -> \"{}\"", original, replacement);
    }
    or_none(out)
}

fn render_list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
    or_none(out)
}

fn or_none(rendered: String) -> String {
    if rendered.is_empty() {
        "(none)\n".to_string()
    } else {
        rendered
    }
}

use async_trait::async_trait;
use tracing::debug;

use crate::{Critic, CriticError, Critique, DocumentContext, Issue, Severity};

/// Required sections with no matching heading line in `text`.
///
/// A line matches a section when, after stripping leading `#`, `*` and
/// whitespace and a trailing `:` or `*`, it equals the section name
/// case-insensitively. Order follows `required`.
pub fn find_missing_sections(text: &str, required: &[String]) -> Vec<String> {
    let headings: Vec<String> = text.lines().map(normalize_heading).collect();

    required
        .iter()
        .filter(|section| {
            let wanted = normalize_heading(section);
            !wanted.is_empty() && !headings.iter().any(|h| *h == wanted)
        })
        .cloned()
        .collect()
}

fn normalize_heading(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace())
        .trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace())
        .to_lowercase()
}

/// Wraps a critic and adds any required section it failed to report.
///
/// Each newly detected section becomes a `high` structure issue; the wrapped
/// critic's score is kept as-is.
pub struct SectionCheckingCritic<C> {
    inner: C,
}

impl<C: Critic> SectionCheckingCritic<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: Critic> Critic for SectionCheckingCritic<C> {
    async fn critique(
        &self,
        text: &str,
        context: &DocumentContext,
    ) -> Result<Critique, CriticError> {
        let mut critique = self.inner.critique(text, context).await?;

        let reported: Vec<String> = critique
            .missing_sections()
            .iter()
            .map(|s| normalize_heading(s))
            .collect();
        let missing = find_missing_sections(text, &context.required_sections);
        for section in missing {
            if reported.contains(&normalize_heading(&section)) {
                continue;
            }
            debug!(section = %section, "Required section missing");
            critique = critique
                .with_issue(Issue::new(
                    "structure",
                    format!("Missing required section: {}", section),
                    Severity::High,
                ))
                .with_missing_section(section);
        }

        Ok(critique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCritic(Critique);

    #[async_trait]
    impl Critic for FixedCritic {
        async fn critique(&self, _: &str, _: &DocumentContext) -> Result<Critique, CriticError> {
            Ok(self.0.clone())
        }
    }

    fn sections(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_missing_sections_heading_styles() {
        let text = "# Engagement Letter\n\n## Scope of Work\nWe will...\n**Fees:**\n$300/hr\nTermination\n";
        let required = sections(&["Scope of Work", "Fees", "Termination", "Signatures"]);
        assert_eq!(find_missing_sections(text, &required), vec!["Signatures"]);
    }

    #[test]
    fn test_section_name_inside_prose_does_not_count() {
        let text = "The fees are described below.";
        assert_eq!(
            find_missing_sections(text, &sections(&["Fees"])),
            vec!["Fees"]
        );
    }

    #[test]
    fn test_no_required_sections() {
        assert!(find_missing_sections("anything", &[]).is_empty());
    }

    #[tokio::test]
    async fn test_wrapper_adds_only_new_sections() {
        let inner = FixedCritic(
            Critique::new(0.6)
                .unwrap()
                .with_missing_section("Fees"),
        );
        let critic = SectionCheckingCritic::new(inner);
        let context = DocumentContext::new("retainer letter")
            .with_required_section("Fees")
            .with_required_section("Signatures");

        let critique = critic.critique("## Scope\n", &context).await.unwrap();

        assert_eq!(critique.overall_score(), 0.6);
        assert_eq!(critique.missing_sections().len(), 2);
        assert_eq!(critique.issues().len(), 1);
        assert_eq!(critique.issues()[0].severity, Severity::High);
        assert!(critique.issues()[0].description.contains("Signatures"));
    }

    #[tokio::test]
    async fn test_reported_section_matches_ignoring_case() {
        let inner = FixedCritic(
            Critique::new(0.6)
                .unwrap()
                .with_missing_section("fees:"),
        );
        let critic = SectionCheckingCritic::new(inner);
        let context = DocumentContext::new("retainer letter").with_required_section("Fees");

        let critique = critic.critique("## Scope\n", &context).await.unwrap();

        assert_eq!(critique.missing_sections().len(), 1);
        assert!(critique.missing_sections().contains("fees:"));
        assert!(critique.issues().is_empty());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Domain parameters for one document.
///
/// The loop never inspects these beyond handing them to the critic and
/// refiner, except for `protected_fields`, whose values must survive every
/// revision verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentContext {
    /// Kind of document, e.g. "retainer letter"
    pub document_type: String,
    pub jurisdiction: Option<String>,
    /// Short description of the matter the document concerns
    pub matter_description: Option<String>,
    /// Section headings the document must contain
    pub required_sections: Vec<String>,
    /// Name -> value pairs that must appear unchanged in every revision
    pub protected_fields: BTreeMap<String, String>,
    /// Additional review criteria
    pub criteria: Vec<String>,
    pub extra: BTreeMap<String, String>,
}

impl DocumentContext {
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            ..Default::default()
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    pub fn with_matter(mut self, description: impl Into<String>) -> Self {
        self.matter_description = Some(description.into());
        self
    }

    pub fn with_required_section(mut self, section: impl Into<String>) -> Self {
        self.required_sections.push(section.into());
        self
    }

    pub fn with_protected_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.protected_fields.insert(name.into(), value.into());
        self
    }

    pub fn with_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.criteria.push(criterion.into());
        self
    }

    /// Human label for logs
    pub fn label(&self) -> &str {
        if self.document_type.is_empty() {
            "document"
        } else {
            &self.document_type
        }
    }

    /// Markdown summary of the context, shared by critic and refiner prompts
    pub fn render_brief(&self) -> String {
        let mut brief = String::new();
        let _ = writeln!(brief, "- Document type: {}", self.label());
        if let Some(ref jurisdiction) = self.jurisdiction {
            let _ = writeln!(brief, "- Jurisdiction: {}", jurisdiction);
        }
        if let Some(ref matter) = self.matter_description {
            let _ = writeln!(brief, "- Matter: {}", matter);
        }
        if !self.required_sections.is_empty() {
            let _ = writeln!(
                brief,
                "- Required sections: {}",
                self.required_sections.join(", ")
            );
        }
        for (key, value) in &self.extra {
            let _ = writeln!(brief, "- {}: {}", key, value);
        }
        brief
    }

    /// Markdown list of protected fields, empty when there are none
    pub fn render_protected_fields(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.protected_fields {
            let _ = writeln!(out, "- {}: \"{}\"", name, value);
        }
        out
    }
}

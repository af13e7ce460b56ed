use thiserror::Error;
use tracing::{debug, warn};

use redraft_critic::{find_tagged_block, TaggedBlock};

#[derive(Error, Debug)]
pub enum RevisionParseError {
    #[error("Refiner returned an empty revision")]
    EmptyRevision,

    #[error("Invalid revision format: {0}")]
    InvalidFormat(String),
}

/// Extract the revised document from refiner output.
///
/// Prefers a `<revised_document>` block; without one the whole trimmed output
/// is taken as the revision.
pub fn extract_revision(output: &str) -> Result<String, RevisionParseError> {
    match find_tagged_block(output, "revised_document") {
        TaggedBlock::Found(block) if block.is_empty() => Err(RevisionParseError::EmptyRevision),
        TaggedBlock::Found(block) => {
            debug!(revision_len = block.len(), "Found revised_document block");
            Ok(block.to_string())
        }
        TaggedBlock::Unterminated => Err(RevisionParseError::InvalidFormat(
            "Unterminated revised_document block".to_string(),
        )),
        TaggedBlock::Absent => {
            let trimmed = output.trim();
            if trimmed.is_empty() {
                return Err(RevisionParseError::EmptyRevision);
            }
            warn!("No revised_document block; using full refiner output");
            Ok(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_block() {
        let output = "Here is the revision:\n<revised_document>\nDear Ms. Patel,\n\nThank you.\n</revised_document>\n";
        assert_eq!(
            extract_revision(output).unwrap(),
            "Dear Ms. Patel,\n\nThank you."
        );
    }

    #[test]
    fn test_fallback_to_whole_output() {
        assert_eq!(extract_revision("  Plain text reply \n").unwrap(), "Plain text reply");
    }

    #[test]
    fn test_empty_and_unterminated() {
        assert!(matches!(
            extract_revision("<revised_document>  </revised_document>"),
            Err(RevisionParseError::EmptyRevision)
        ));
        assert!(matches!(extract_revision("   "), Err(RevisionParseError::EmptyRevision)));
        assert!(matches!(
            extract_revision("<revised_document>partial"),
            Err(RevisionParseError::InvalidFormat(_))
        ));
    }
}

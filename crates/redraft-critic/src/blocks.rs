/// Result of looking for a `<tag>…</tag>` block in model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggedBlock<'a> {
    /// Trimmed contents of the last complete block
    Found(&'a str),
    /// Opening tag present without a closing tag after it
    Unterminated,
    Absent,
}

/// Find the last complete `<tag>…</tag>` block in `text`.
///
/// Anchors on the final closing tag and the nearest opening tag before it;
/// earlier mentions of the tag in prose are skipped.
pub fn find_tagged_block<'a>(text: &'a str, tag: &str) -> TaggedBlock<'a> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    if let Some(end) = text.rfind(&close) {
        if let Some(start) = text[..end].rfind(&open) {
            return TaggedBlock::Found(text[start + open.len()..end].trim());
        }
    }
    if text.contains(&open) {
        TaggedBlock::Unterminated
    } else {
        TaggedBlock::Absent
    }
}

/// Contents of the first ```json fenced block, if any
pub fn find_fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let len = text[start..].find("```")?;
    Some(text[start..start + len].trim())
}

/// The span from the first `{` to the last `}`
pub fn find_outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_block_found() {
        let text = "preamble\n<critique>\n {\"a\": 1} \n</critique>\ntrailer";
        assert_eq!(find_tagged_block(text, "critique"), TaggedBlock::Found("{\"a\": 1}"));
    }

    #[test]
    fn test_tagged_block_mentioned_in_prose_first() {
        let text = "I will answer in a <critique> block.\n<critique>{\"a\": 1}</critique>";
        assert_eq!(find_tagged_block(text, "critique"), TaggedBlock::Found("{\"a\": 1}"));
    }

    #[test]
    fn test_tagged_block_unterminated_and_absent() {
        assert_eq!(
            find_tagged_block("<critique>{}", "critique"),
            TaggedBlock::Unterminated
        );
        assert_eq!(find_tagged_block("nothing here", "critique"), TaggedBlock::Absent);
        // A closing tag before the opening one does not count
        assert_eq!(
            find_tagged_block("</critique> <critique>{}", "critique"),
            TaggedBlock::Unterminated
        );
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"x\": true}\n```\n";
        assert_eq!(find_fenced_json(text), Some("{\"x\": true}"));
        assert_eq!(find_fenced_json("```json\n{"), None);
    }

    #[test]
    fn test_outer_object() {
        assert_eq!(find_outer_object("a {b {c}} d"), Some("{b {c}}"));
        assert_eq!(find_outer_object("} {"), None);
    }
}

//! Machine-readable stack metadata embedded in pull-request bodies.
//!
//! Each reconciled pull request carries an HTML-comment block describing the
//! branch's position in its stack. The block is rewritten wholesale on every
//! reconcile; user-authored body text around it is preserved.

use serde::{Deserialize, Serialize};

const BLOCK_START: &str = "<!-- sx stack metadata";
const BLOCK_END: &str = "-->";

/// The stack position recorded in a pull-request body.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct StackMetadata {
    /// The branch's parent in the stack.
    pub parent: String,
    /// The parent tip observed at the last sync.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_head: String,
    /// The trunk branch of the stack.
    pub trunk: String,
}

/// Returns `body` with its stack-metadata block replaced (or appended).
pub(crate) fn with_stack_metadata(body: &str, metadata: &StackMetadata) -> String {
    let stripped = strip_stack_metadata(body);
    let json = serde_json::to_string(metadata).expect("stack metadata serializes to JSON");
    format!(
        "{}\n\n{BLOCK_START}\nThis section is used by the sx CLI to track this pull request's \
         position in its stack. Do not edit.\n```\n{json}\n```\n{BLOCK_END}\n",
        stripped.trim_end()
    )
}

/// Parses the stack-metadata block out of a body, if one is present.
pub(crate) fn read_stack_metadata(body: &str) -> Option<StackMetadata> {
    let start = body.find(BLOCK_START)?;
    let block = &body[start..];
    let end = block.find(BLOCK_END)?;
    let json = block[..end]
        .lines()
        .find(|line| line.trim_start().starts_with('{'))?;
    serde_json::from_str(json.trim()).ok()
}

/// Returns `body` without its stack-metadata block.
fn strip_stack_metadata(body: &str) -> &str {
    match body.find(BLOCK_START) {
        Some(start) => body[..start].trim_end(),
        None => body,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn metadata() -> StackMetadata {
        StackMetadata {
            parent: "stack-1".to_string(),
            parent_head: "0123456789abcdef0123456789abcdef01234567".to_string(),
            trunk: "main".to_string(),
        }
    }

    #[test]
    fn round_trips() {
        let body = with_stack_metadata("Fixes the frobnicator.", &metadata());
        assert!(body.starts_with("Fixes the frobnicator."));
        assert_eq!(read_stack_metadata(&body), Some(metadata()));
    }

    #[test]
    fn replaces_stale_block() {
        let body = with_stack_metadata("Original description.", &metadata());

        let updated = StackMetadata {
            parent: "main".to_string(),
            parent_head: String::new(),
            trunk: "main".to_string(),
        };
        let body = with_stack_metadata(&body, &updated);

        assert_eq!(body.matches(BLOCK_START).count(), 1);
        assert!(body.starts_with("Original description."));
        assert_eq!(read_stack_metadata(&body), Some(updated));
    }

    #[test]
    fn missing_block_reads_none() {
        assert_eq!(read_stack_metadata("Just a description."), None);
    }

    #[test]
    fn empty_body_gets_block() {
        let body = with_stack_metadata("", &metadata());
        assert_eq!(read_stack_metadata(&body), Some(metadata()));
    }
}

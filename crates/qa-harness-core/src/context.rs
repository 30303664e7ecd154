//! Merge retrieved passages into one source-tagged context string.
//!
//! Each passage becomes a block `[Source: <name>]\n<text>\n`; blocks are
//! separated by a blank line and kept in retrieval order, most relevant
//! first, so a length cap drops the least relevant material.

use crate::models::RetrievedPassage;

/// Builds the context string handed to feature mining and model prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder {
    /// Optional cap on the context length, in characters.
    pub max_chars: Option<usize>,
}

impl ContextBuilder {
    pub fn new(max_chars: Option<usize>) -> Self {
        Self { max_chars }
    }

    pub fn build(&self, passages: &[RetrievedPassage]) -> String {
        let context = passages
            .iter()
            .map(|p| format!("[Source: {}]\n{}\n", p.metadata.source, p.text))
            .collect::<Vec<_>>()
            .join("\n");

        match self.max_chars {
            Some(max) if context.chars().count() > max => context.chars().take(max).collect(),
            _ => context,
        }
    }
}

/// Build an uncapped context string.
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    ContextBuilder::default().build(passages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PassageMetadata;

    fn passage(source: &str, text: &str, distance: f32) -> RetrievedPassage {
        RetrievedPassage {
            text: text.to_string(),
            metadata: PassageMetadata {
                source: source.to_string(),
                chunk_index: 0,
            },
            distance,
        }
    }

    #[test]
    fn test_tags_and_order() {
        let ctx = build_context(&[
            passage("specs.md", "SAVE15 gives 15% off.", 0.1),
            passage("ui.txt", "Errors are red.", 0.4),
        ]);
        assert_eq!(
            ctx,
            "[Source: specs.md]\nSAVE15 gives 15% off.\n\n[Source: ui.txt]\nErrors are red.\n"
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_cap_drops_tail() {
        let builder = ContextBuilder::new(Some(30));
        let ctx = builder.build(&[
            passage("first.md", "most relevant", 0.1),
            passage("second.md", "least relevant", 0.9),
        ]);
        assert_eq!(ctx.chars().count(), 30);
        assert!(ctx.starts_with("[Source: first.md]"));
        assert!(!ctx.contains("second.md"));
    }
}

//! Code-region detection over a read-only syntax tree.

use comrak::nodes::NodeValue;
use comrak::{parse_document, Arena};
use std::ops::ControlFlow;

use crate::markdown::comrak_options;

/// A node as seen by the code-region walk. Positions are character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxNode<'a> {
    pub kind: &'a str,
    pub from: usize,
    pub to: usize,
}

/// Read-only access to a parsed document, owned by the host.
pub trait SyntaxTree {
    /// Visits nodes starting at or before `end` in document order until the
    /// visitor breaks.
    fn visit_until(&self, end: usize, visitor: &mut dyn FnMut(SyntaxNode<'_>) -> ControlFlow<()>);
}

/// Node kinds that denote code blocks across tree producers: ours
/// (`fenced_code_block`), lezer (`FencedCode`, `CodeBlock`) and
/// HyperMD (`HyperMD-codeblock`).
pub fn is_code_region_kind(kind: &str) -> bool {
    let kind = kind.to_ascii_lowercase();
    ["codeblock", "code_block", "fencedcode", "fenced_code"]
        .iter()
        .any(|marker| kind.contains(marker))
}

pub fn is_inside_code_region(tree: &dyn SyntaxTree, position: usize) -> bool {
    let mut inside = false;
    tree.visit_until(position, &mut |node| {
        // Inverted spans come from a confused producer; ignore them.
        if node.from > node.to {
            return ControlFlow::Continue(());
        }
        if is_code_region_kind(node.kind) && node.from <= position && position <= node.to {
            inside = true;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    inside
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockNode {
    kind: &'static str,
    from: usize,
    to: usize,
}

/// Block structure of a Markdown document parsed with comrak.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownTree {
    nodes: Vec<BlockNode>,
}

impl MarkdownTree {
    pub fn parse(text: &str) -> Self {
        let arena = Arena::new();
        let options = comrak_options();
        let root = parse_document(&arena, text, &options);
        let index = LineIndex::new(text);

        let mut nodes = Vec::new();
        for node in root.descendants() {
            let ast = node.data.borrow();
            if !ast.value.block() || matches!(ast.value, NodeValue::Document) {
                continue;
            }
            let start = ast.sourcepos.start;
            let end = ast.sourcepos.end;
            nodes.push(BlockNode {
                kind: block_kind(&ast.value),
                from: index.char_at(text, start.line, start.column),
                to: index.char_after(text, end.line, end.column),
            });
        }

        log::trace!("Parsed {} block nodes", nodes.len());
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = SyntaxNode<'_>> {
        self.nodes.iter().map(|n| SyntaxNode {
            kind: n.kind,
            from: n.from,
            to: n.to,
        })
    }
}

impl SyntaxTree for MarkdownTree {
    fn visit_until(&self, end: usize, visitor: &mut dyn FnMut(SyntaxNode<'_>) -> ControlFlow<()>) {
        // Pre-order keeps start positions non-decreasing.
        for node in self.nodes() {
            if node.from > end {
                break;
            }
            if visitor(node).is_break() {
                break;
            }
        }
    }
}

fn block_kind(value: &NodeValue) -> &'static str {
    match value {
        NodeValue::CodeBlock(block) if block.fenced => "fenced_code_block",
        NodeValue::CodeBlock(_) => "indented_code_block",
        NodeValue::HtmlBlock(_) => "html_block",
        NodeValue::Paragraph => "paragraph",
        NodeValue::Heading(_) => "heading",
        NodeValue::BlockQuote => "block_quote",
        NodeValue::List(_) => "list",
        NodeValue::Item(_) => "list_item",
        NodeValue::Table(_) => "table",
        NodeValue::ThematicBreak => "thematic_break",
        _ => "block",
    }
}

/// Maps comrak's 1-based line / byte-column positions to character offsets.
struct LineIndex {
    /// `(byte_start, char_start)` per line.
    lines: Vec<(usize, usize)>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut lines = vec![(0, 0)];
        let mut chars = 0;
        for (byte, c) in text.char_indices() {
            chars += 1;
            if c == '\n' {
                lines.push((byte + 1, chars));
            }
        }
        Self { lines }
    }

    /// Character offset of the character holding byte `column` of `line`.
    fn char_at(&self, text: &str, line: usize, column: usize) -> usize {
        self.char_offset(text, line, column.saturating_sub(1), false)
    }

    /// Character offset just past the character holding byte `column`.
    fn char_after(&self, text: &str, line: usize, column: usize) -> usize {
        self.char_offset(text, line, column, true)
    }

    fn char_offset(&self, text: &str, line: usize, byte_in_line: usize, round_up: bool) -> usize {
        let Some(&(line_byte, line_char)) = self.lines.get(line.saturating_sub(1)) else {
            return text.chars().count();
        };
        let mut byte = (line_byte + byte_in_line).min(text.len());
        while !text.is_char_boundary(byte) {
            if round_up {
                byte += 1;
            } else {
                byte -= 1;
            }
        }
        line_char + text[line_byte.min(byte)..byte].chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTree(Vec<(&'static str, usize, usize)>);

    impl SyntaxTree for StubTree {
        fn visit_until(&self, end: usize, visitor: &mut dyn FnMut(SyntaxNode<'_>) -> ControlFlow<()>) {
            for &(kind, from, to) in &self.0 {
                if from > end {
                    break;
                }
                if visitor(SyntaxNode { kind, from, to }).is_break() {
                    break;
                }
            }
        }
    }

    #[test]
    fn test_code_region_kinds() {
        assert!(is_code_region_kind("fenced_code_block"));
        assert!(is_code_region_kind("indented_code_block"));
        assert!(is_code_region_kind("FencedCode"));
        assert!(is_code_region_kind("CodeBlock"));
        assert!(is_code_region_kind("HyperMD-codeblock_HyperMD-codeblock-bg"));
        assert!(!is_code_region_kind("paragraph"));
        assert!(!is_code_region_kind("InlineCode"));
    }

    #[test]
    fn test_stub_tree_span_is_inclusive() {
        let tree = StubTree(vec![("Document", 0, 100), ("FencedCode", 10, 20)]);
        assert!(!is_inside_code_region(&tree, 9));
        assert!(is_inside_code_region(&tree, 10));
        assert!(is_inside_code_region(&tree, 20));
        assert!(!is_inside_code_region(&tree, 21));
    }

    #[test]
    fn test_inverted_nodes_are_ignored() {
        let tree = StubTree(vec![("CodeBlock", 30, 5)]);
        assert!(!is_inside_code_region(&tree, 10));
    }

    #[test]
    fn test_markdown_fenced_block_positions() {
        let text = "intro\n```\n! inside\n```\n! outside\n";
        let tree = MarkdownTree::parse(text);

        let inside = text.find("! inside").unwrap();
        let outside = text.find("! outside").unwrap();
        let fence = text.find("```").unwrap();

        assert!(is_inside_code_region(&tree, fence));
        assert!(is_inside_code_region(&tree, inside));
        assert!(!is_inside_code_region(&tree, outside));
        assert!(!is_inside_code_region(&tree, 0));
    }

    #[test]
    fn test_markdown_indented_block() {
        let text = "para\n\n    ! code\n\n! text\n";
        let tree = MarkdownTree::parse(text);

        assert!(tree.nodes().any(|n| n.kind == "indented_code_block"));
        assert!(!is_inside_code_region(&tree, text.find("! text").unwrap()));
    }

    #[test]
    fn test_markdown_positions_count_chars() {
        // Multi-byte text before the fence must not skew offsets.
        let text = "ünïcødé 🚨\n\n```\n? q\n```\n";
        let tree = MarkdownTree::parse(text);
        let fence_chars = text[..text.find("```").unwrap()].chars().count();

        let block = tree
            .nodes()
            .find(|n| n.kind == "fenced_code_block")
            .unwrap();
        assert_eq!(block.from, fence_chars);
        assert!(is_inside_code_region(&tree, fence_chars + 4));
    }
}

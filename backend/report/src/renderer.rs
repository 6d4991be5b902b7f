//! Renderers for the Markdown IR: plain text and ANSI terminal output.

use crate::ir::MarkdownNode;

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const HEADING: &str = "\x1b[1;33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub struct Renderer;

impl Renderer {
    /// Renders the tree to plain text, stripping all formatting.
    pub fn to_plain_text(nodes: &[MarkdownNode]) -> String {
        Self::render(nodes, false)
    }

    /// Renders the tree with ANSI styling for the terminal.
    pub fn to_ansi(nodes: &[MarkdownNode]) -> String {
        Self::render(nodes, true)
    }

    fn render(nodes: &[MarkdownNode], ansi: bool) -> String {
        let mut output = String::new();
        for node in nodes {
            Self::render_node(node, ansi, &mut output);
        }
        output
    }

    fn styled(out: &mut String, style: &str, body: &str, ansi: bool) {
        if ansi {
            out.push_str(style);
            out.push_str(body);
            out.push_str(RESET);
        } else {
            out.push_str(body);
        }
    }

    fn render_node(node: &MarkdownNode, ansi: bool, out: &mut String) {
        match node {
            MarkdownNode::Text(text) => out.push_str(text),
            MarkdownNode::Heading(_, children) => {
                Self::styled(out, HEADING, &Self::render(children, false), ansi);
                out.push_str("\n\n");
            }
            MarkdownNode::Paragraph(children) => {
                out.push_str(&Self::render(children, ansi));
                out.push_str("\n\n");
            }
            MarkdownNode::Strong(children) => {
                Self::styled(out, BOLD, &Self::render(children, false), ansi)
            }
            MarkdownNode::Emphasis(children) => {
                Self::styled(out, ITALIC, &Self::render(children, false), ansi)
            }
            MarkdownNode::CodeBlock(_, content) => {
                Self::styled(out, DIM, content, ansi);
                out.push('\n');
            }
            MarkdownNode::List(items) => {
                for item in items {
                    Self::render_node(item, ansi, out);
                }
                out.push('\n');
            }
            MarkdownNode::ListItem(children) => {
                out.push_str("• ");
                out.push_str(Self::render(children, ansi).trim_end());
                out.push('\n');
            }
            MarkdownNode::Blockquote(children) => {
                for line in Self::render(children, ansi).trim_end().lines() {
                    out.push_str("│ ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
            }
            MarkdownNode::Link(url, text) => {
                out.push_str(text);
                if text != url {
                    out.push_str(&format!(" ({url})"));
                }
            }
            MarkdownNode::Image(_, alt) => out.push_str(alt),
            MarkdownNode::Rule => out.push_str("────────\n\n"),
        }
    }
}

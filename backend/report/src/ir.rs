//! Markdown Intermediate Representation
//!
//! Parses model output into a small typed tree so it can be rendered for the
//! terminal as well as for reports.

use pulldown_cmark::{Event, Parser, Tag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MarkdownNode {
    Heading(u32, Vec<MarkdownNode>),
    Paragraph(Vec<MarkdownNode>),
    Text(String),
    Strong(Vec<MarkdownNode>),
    Emphasis(Vec<MarkdownNode>),
    CodeBlock(String, String), // language, content
    List(Vec<MarkdownNode>),
    ListItem(Vec<MarkdownNode>),
    Blockquote(Vec<MarkdownNode>),
    Link(String, String),  // url, text
    Image(String, String), // url, alt_text
    Rule,
}

impl MarkdownNode {
    /// Concatenated text of this node and its children.
    pub fn text(&self) -> String {
        match self {
            MarkdownNode::Text(t) => t.clone(),
            MarkdownNode::CodeBlock(_, content) => content.clone(),
            MarkdownNode::Link(_, text) | MarkdownNode::Image(_, text) => text.clone(),
            MarkdownNode::Rule => String::new(),
            MarkdownNode::Heading(_, children)
            | MarkdownNode::Paragraph(children)
            | MarkdownNode::Strong(children)
            | MarkdownNode::Emphasis(children)
            | MarkdownNode::List(children)
            | MarkdownNode::ListItem(children)
            | MarkdownNode::Blockquote(children) => children.iter().map(Self::text).collect(),
        }
    }
}

enum Frame {
    Heading(u32),
    Paragraph,
    Strong,
    Emphasis,
    CodeBlock(String),
    List,
    Item,
    Blockquote,
    Link(String),
    Image(String),
    /// Tables, footnotes and the like: children are spliced into the parent.
    Transparent,
}

pub struct IrParser;

impl IrParser {
    pub fn parse(markdown: &str) -> Vec<MarkdownNode> {
        let mut root: Vec<MarkdownNode> = Vec::new();
        let mut stack: Vec<(Frame, Vec<MarkdownNode>)> = Vec::new();

        for event in Parser::new(markdown) {
            match event {
                Event::Start(tag) => stack.push((Self::frame_for(tag), Vec::new())),
                Event::End(_) => {
                    let Some((frame, children)) = stack.pop() else { continue };
                    let parent = match stack.last_mut() {
                        Some((_, siblings)) => siblings,
                        None => &mut root,
                    };
                    Self::close(frame, children, parent);
                }
                Event::Text(text) | Event::Code(text) | Event::Html(text) => {
                    Self::push(&mut stack, &mut root, MarkdownNode::Text(text.into_string()));
                }
                Event::SoftBreak => {
                    Self::push(&mut stack, &mut root, MarkdownNode::Text(" ".into()));
                }
                Event::HardBreak => {
                    Self::push(&mut stack, &mut root, MarkdownNode::Text("\n".into()));
                }
                Event::Rule => Self::push(&mut stack, &mut root, MarkdownNode::Rule),
                _ => {}
            }
        }

        // Unbalanced input: flush whatever is still open.
        while let Some((frame, children)) = stack.pop() {
            let parent = match stack.last_mut() {
                Some((_, siblings)) => siblings,
                None => &mut root,
            };
            Self::close(frame, children, parent);
        }
        root
    }

    fn frame_for(tag: Tag<'_>) -> Frame {
        match tag {
            Tag::Heading(level, _, _) => Frame::Heading(level as u32),
            Tag::Paragraph => Frame::Paragraph,
            Tag::Strong => Frame::Strong,
            Tag::Emphasis => Frame::Emphasis,
            Tag::CodeBlock(kind) => Frame::CodeBlock(match kind {
                pulldown_cmark::CodeBlockKind::Fenced(lang) => lang.into_string(),
                pulldown_cmark::CodeBlockKind::Indented => String::new(),
            }),
            Tag::List(_) => Frame::List,
            Tag::Item => Frame::Item,
            Tag::BlockQuote => Frame::Blockquote,
            Tag::Link(_, url, _) => Frame::Link(url.into_string()),
            Tag::Image(_, url, _) => Frame::Image(url.into_string()),
            _ => Frame::Transparent,
        }
    }

    fn push(
        stack: &mut [(Frame, Vec<MarkdownNode>)],
        root: &mut Vec<MarkdownNode>,
        node: MarkdownNode,
    ) {
        match stack.last_mut() {
            Some((_, children)) => children.push(node),
            None => root.push(node),
        }
    }

    fn close(frame: Frame, children: Vec<MarkdownNode>, parent: &mut Vec<MarkdownNode>) {
        let node = match frame {
            Frame::Heading(level) => MarkdownNode::Heading(level, children),
            Frame::Paragraph => MarkdownNode::Paragraph(children),
            Frame::Strong => MarkdownNode::Strong(children),
            Frame::Emphasis => MarkdownNode::Emphasis(children),
            Frame::CodeBlock(lang) => {
                let content = children.iter().map(MarkdownNode::text).collect();
                MarkdownNode::CodeBlock(lang, content)
            }
            Frame::List => MarkdownNode::List(children),
            Frame::Item => MarkdownNode::ListItem(children),
            Frame::Blockquote => MarkdownNode::Blockquote(children),
            Frame::Link(url) => {
                MarkdownNode::Link(url, children.iter().map(MarkdownNode::text).collect())
            }
            Frame::Image(url) => {
                MarkdownNode::Image(url, children.iter().map(MarkdownNode::text).collect())
            }
            Frame::Transparent => {
                parent.extend(children);
                return;
            }
        };
        parent.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headings_and_lists() {
        let nodes = IrParser::parse("## Cung Mệnh\n\n- **Tử Vi** tọa thủ\n- Thiên Phủ\n");
        assert_eq!(
            nodes[0],
            MarkdownNode::Heading(2, vec![MarkdownNode::Text("Cung Mệnh".into())])
        );
        let MarkdownNode::List(items) = &nodes[1] else { panic!("expected list") };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text(), "Tử Vi tọa thủ");
    }

    #[test]
    fn raw_html_becomes_text() {
        let nodes = IrParser::parse("<script>x</script>\n");
        assert!(nodes.iter().any(|n| n.text().contains("<script>")));
    }

    #[test]
    fn code_blocks_keep_language() {
        let nodes = IrParser::parse("```json\n{\"a\":1}\n```\n");
        assert_eq!(nodes[0], MarkdownNode::CodeBlock("json".into(), "{\"a\":1}\n".into()));
    }
}

//! Block list ⇄ Markdown transcoding
//!
//! The forward direction formats one line-group per block and never fails;
//! unknown block types degrade to empty output. The reverse direction
//! parses the documented subset back into blocks (headings 1-3, paragraphs,
//! list items, fenced code, image-only paragraphs) and skips everything
//! else, mirroring the forward direction's lossy contract.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};

use crate::types::{Block, RemotePage};

/// Render a page as Markdown: a `# title` line followed by one formatted
/// group per block in traversal order. Deterministic for a fixed input.
pub fn page_to_markdown(page: &RemotePage) -> String {
    let mut out = format!("# {}\n\n", page.title);
    for block in &page.children {
        out.push_str(&block_to_markdown(block));
    }
    out
}

/// Render a single block. List items are newline-terminated; every other
/// text-bearing variant is followed by a blank line.
pub fn block_to_markdown(block: &Block) -> String {
    match block {
        Block::Paragraph { rich_text } => format!("{}\n\n", rich_text.concat()),
        Block::Heading { level, rich_text } => {
            let level = (*level).clamp(1, 3) as usize;
            format!("{} {}\n\n", "#".repeat(level), rich_text.concat())
        }
        Block::BulletedListItem { rich_text } => format!("- {}\n", rich_text.concat()),
        // The remote store renumbers on render; every item is `1.`
        Block::NumberedListItem { rich_text } => format!("1. {}\n", rich_text.concat()),
        Block::Code {
            language,
            rich_text,
        } => format!("```{}\n{}\n```\n\n", language, rich_text.concat()),
        Block::Image { caption, url } => format!("![{}]({})\n\n", caption.concat(), url),
        Block::ChildPage { .. } | Block::Unsupported { .. } => String::new(),
    }
}

/// Parse Markdown back into blocks.
///
/// Headings deeper than level 3 clamp to 3. Blockquote interiors, tables,
/// and raw HTML are skipped.
pub fn markdown_to_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut spans: Vec<String> = Vec::new();
    let mut caption: Vec<String> = Vec::new();
    let mut pending_image: Option<String> = None;
    let mut heading_level: u8 = 1;
    let mut code_language = String::new();
    // true = ordered, per nesting level
    let mut list_stack: Vec<bool> = Vec::new();
    let mut in_item = false;
    let mut in_image = false;
    let mut quote_depth = 0usize;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::BlockQuote) => quote_depth += 1,
            Event::End(TagEnd::BlockQuote) => quote_depth = quote_depth.saturating_sub(1),
            _ if quote_depth > 0 => {}

            Event::Start(Tag::Heading { level, .. }) => {
                heading_level = heading_level_to_u8(level).min(3);
                spans.clear();
            }
            Event::End(TagEnd::Heading(_)) => {
                blocks.push(Block::Heading {
                    level: heading_level,
                    rich_text: std::mem::take(&mut spans),
                });
            }

            Event::Start(Tag::Paragraph) => {
                if !in_item {
                    spans.clear();
                    caption.clear();
                    pending_image = None;
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if in_item {
                    // Loose list items keep accumulating into the item
                } else if let Some(url) = pending_image.take() {
                    if spans.concat().trim().is_empty() {
                        blocks.push(Block::Image {
                            caption: std::mem::take(&mut caption),
                            url,
                        });
                        spans.clear();
                    } else {
                        blocks.push(Block::Paragraph {
                            rich_text: std::mem::take(&mut spans),
                        });
                        caption.clear();
                    }
                } else if !spans.concat().is_empty() {
                    blocks.push(Block::Paragraph {
                        rich_text: std::mem::take(&mut spans),
                    });
                }
            }

            Event::Start(Tag::List(ordered)) => list_stack.push(ordered.is_some()),
            Event::End(TagEnd::List(_)) => {
                list_stack.pop();
            }
            Event::Start(Tag::Item) => {
                in_item = true;
                spans.clear();
            }
            Event::End(TagEnd::Item) => {
                in_item = false;
                let rich_text = std::mem::take(&mut spans);
                if !rich_text.concat().is_empty() {
                    if list_stack.last().copied().unwrap_or(false) {
                        blocks.push(Block::NumberedListItem { rich_text });
                    } else {
                        blocks.push(Block::BulletedListItem { rich_text });
                    }
                }
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                code_language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                spans.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                let mut code = std::mem::take(&mut spans).concat();
                if code.ends_with('\n') {
                    code.pop();
                }
                blocks.push(Block::Code {
                    language: std::mem::take(&mut code_language),
                    rich_text: vec![code],
                });
            }

            Event::Start(Tag::Image { dest_url, .. }) => {
                in_image = true;
                caption.clear();
                pending_image = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Image) => in_image = false,

            Event::Text(t) => {
                if in_image {
                    caption.push(t.to_string());
                } else {
                    spans.push(t.to_string());
                }
            }
            Event::Code(code) => spans.push(code.to_string()),
            Event::SoftBreak | Event::HardBreak => spans.push(" ".to_string()),

            _ => {}
        }
    }

    blocks
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

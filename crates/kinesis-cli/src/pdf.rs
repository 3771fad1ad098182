//! Markdown to PDF with the built-in PDF fonts

use kinesis_agent::ExportError;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockStyle {
    Heading(u8),
    Body,
    Code,
}

impl BlockStyle {
    fn font_size(&self) -> f32 {
        match self {
            BlockStyle::Heading(1) => 18.0,
            BlockStyle::Heading(2) => 15.0,
            BlockStyle::Heading(_) => 13.0,
            BlockStyle::Body => 11.0,
            BlockStyle::Code => 9.5,
        }
    }

    /// Average glyph width as a fraction of the font size
    fn glyph_width(&self) -> f32 {
        match self {
            BlockStyle::Code => 0.6,
            BlockStyle::Heading(_) => 0.56,
            BlockStyle::Body => 0.5,
        }
    }

    fn max_chars(&self) -> usize {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        (usable / (self.font_size() * PT_TO_MM * self.glyph_width())) as usize
    }

    fn line_height(&self) -> f32 {
        self.font_size() * PT_TO_MM * 1.4
    }
}

/// A laid-out paragraph, heading or code block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub style: BlockStyle,
    pub text: String,
}

/// Flatten Markdown into blocks of plain text
pub fn blocks(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut blocks = Vec::new();
    let mut style = BlockStyle::Body;
    let mut text = String::new();
    let mut list_depth = 0usize;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush(&mut blocks, style, &mut text);
                style = BlockStyle::Heading(match level {
                    HeadingLevel::H1 => 1,
                    HeadingLevel::H2 => 2,
                    _ => 3,
                });
            }
            Event::Start(Tag::CodeBlock(_)) => {
                flush(&mut blocks, style, &mut text);
                style = BlockStyle::Code;
            }
            Event::Start(Tag::List(_)) => list_depth += 1,
            Event::End(TagEnd::List(_)) => list_depth = list_depth.saturating_sub(1),
            Event::Start(Tag::Item) => {
                flush(&mut blocks, style, &mut text);
                style = BlockStyle::Body;
                text.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                text.push_str("- ");
            }
            Event::End(
                TagEnd::Heading(_)
                | TagEnd::Paragraph
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => {
                flush(&mut blocks, style, &mut text);
                style = BlockStyle::Body;
            }
            Event::End(TagEnd::TableCell) => text.push_str(" | "),
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::Rule => {
                flush(&mut blocks, style, &mut text);
                blocks.push(Block {
                    style: BlockStyle::Body,
                    text: "-".repeat(40),
                });
            }
            _ => {}
        }
    }
    flush(&mut blocks, style, &mut text);
    blocks
}

fn flush(blocks: &mut Vec<Block>, style: BlockStyle, text: &mut String) {
    let trimmed = text.trim_end();
    if !trimmed.trim().is_empty() {
        blocks.push(Block {
            style,
            text: trimmed.to_string(),
        });
    }
    text.clear();
}

/// Greedy word wrap. Explicit newlines are kept; over-long words are split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        let mut line = String::new();
        for word in raw.split(' ') {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }
    lines
}

/// Render Markdown as an A4 PDF
pub fn render_pdf(document: &str, title: &str) -> Result<Vec<u8>, ExportError> {
    let render_err = |e: printpdf::Error| ExportError::Render(e.to_string());

    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?;
    let mono = doc.add_builtin_font(BuiltinFont::Courier).map_err(render_err)?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for block in blocks(document) {
        let style = block.style;
        let font: &IndirectFontRef = match style {
            BlockStyle::Heading(_) => &bold,
            BlockStyle::Body => &regular,
            BlockStyle::Code => &mono,
        };
        if matches!(style, BlockStyle::Heading(_)) {
            y -= style.line_height() * 0.5;
        }
        for line in wrap(&block.text, style.max_chars()) {
            if y - style.line_height() < MARGIN {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                current = doc.get_page(page).get_layer(layer);
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= style.line_height();
            current.use_text(line, style.font_size(), Mm(MARGIN), Mm(y), font);
        }
        y -= style.line_height() * 0.4;
    }

    doc.save_to_bytes().map_err(render_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_from_markdown() {
        let blocks = blocks(
            "# System Requirements\n\nThe system\nshall log.\n\n## 1. Scope\n\n- one\n- two\n\n```\nfn main() {}\n```\n",
        );
        assert_eq!(
            blocks,
            vec![
                Block { style: BlockStyle::Heading(1), text: "System Requirements".into() },
                Block { style: BlockStyle::Body, text: "The system shall log.".into() },
                Block { style: BlockStyle::Heading(2), text: "1. Scope".into() },
                Block { style: BlockStyle::Body, text: "- one".into() },
                Block { style: BlockStyle::Body, text: "- two".into() },
                Block { style: BlockStyle::Code, text: "fn main() {}".into() },
            ]
        );
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
        assert_eq!(wrap("abcdefg", 3), vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_render_pdf_header() {
        let long = "The system shall respond within two seconds. ".repeat(400);
        let bytes = render_pdf(&format!("# Spec\n\n{}", long), "kinesis-srs").unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}

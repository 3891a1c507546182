//! Parser for the restricted markup dialect the report is written in.
//!
//! The document is cut into sections at every line starting with `## `.
//! Inside a section each line is classified on its own, in this order:
//! image, bullet, level-3 heading, line with bold runs, plain paragraph.
//! Blank lines are dropped and every section ends with a page break.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    Image { alt: String, path: String },
    Bullet { level: usize, runs: Vec<TextRun> },
    Paragraph { runs: Vec<TextRun> },
    PageBreak,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkupDocument {
    pub title: String,
    pub blocks: Vec<Block>,
}

impl MarkupDocument {
    pub fn count<F: Fn(&Block) -> bool>(&self, predicate: F) -> usize {
        self.blocks.iter().filter(|b| predicate(b)).count()
    }
}

pub fn parse_markup(content: &str) -> MarkupDocument {
    let mut sections = content.split("\n## ");
    let title = sections
        .next()
        .unwrap_or_default()
        .replace("# ", "")
        .trim()
        .to_string();

    let mut blocks = Vec::new();
    for section in sections {
        let mut lines = section.split('\n');
        let heading = lines.next().unwrap_or_default().trim().to_string();
        blocks.push(Block::Heading {
            level: 1,
            text: heading,
        });

        for raw in lines {
            if let Some(block) = parse_line(raw) {
                blocks.push(block);
            }
        }
        blocks.push(Block::PageBreak);
    }

    MarkupDocument { title, blocks }
}

fn parse_line(raw: &str) -> Option<Block> {
    let line = raw.trim();

    if line.starts_with("![") {
        if let Some((alt, path)) = parse_image(line) {
            return Some(Block::Image { alt, path });
        }
    }
    if let Some(rest) = line.strip_prefix("- ") {
        return Some(Block::Bullet {
            level: indent_level(raw),
            runs: parse_bold_runs(rest.trim()),
        });
    }
    if let Some(rest) = line.strip_prefix("### ") {
        return Some(Block::Heading {
            level: 3,
            text: rest.trim().to_string(),
        });
    }
    if line.contains("**") {
        return Some(Block::Paragraph {
            runs: parse_bold_runs(line),
        });
    }
    if !line.is_empty() {
        return Some(Block::Paragraph {
            runs: vec![TextRun::plain(line)],
        });
    }
    None
}

/// `![alt](path)` at the start of the line; anything after the closing
/// parenthesis is ignored.
fn parse_image(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("![")?;
    let alt_end = rest.find("](")?;
    let alt = &rest[..alt_end];
    let after = &rest[alt_end + 2..];
    let path_end = after.find(')')?;
    Some((alt.to_string(), after[..path_end].to_string()))
}

/// Two spaces (or one tab) of leading indentation per nesting level.
fn indent_level(raw: &str) -> usize {
    let width: usize = raw
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum();
    width / 2
}

/// Splits text into plain and bold runs at `**` pairs. An opening `**`
/// without a partner stays in the text.
pub fn parse_bold_runs(text: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("**") else {
            break;
        };

        plain.push_str(&rest[..open]);
        if !plain.is_empty() {
            runs.push(TextRun::plain(std::mem::take(&mut plain)));
        }
        let inner = &after_open[..close];
        if !inner.is_empty() {
            runs.push(TextRun::bold(inner));
        }
        rest = &after_open[close + 2..];
    }

    plain.push_str(rest);
    if !plain.is_empty() {
        runs.push(TextRun::plain(plain));
    }
    runs
}

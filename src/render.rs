//! Turns an [`AnswerPayload`] into a display structure.
//!
//! Markdown is parsed with pulldown-cmark (CommonMark plus tables,
//! strikethrough and task lists) into a flat list of [`Block`]s that the
//! view layer draws. Parsing never fails: anything the parser does not
//! understand arrives as literal text.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use tracing::debug;
use url::Url;

use crate::client::AnswerPayload;

pub const LABEL_SEPARATOR: &str = " › ";
pub const EMPTY_LINK_LABEL: &str = "(empty link)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub strong: bool,
    pub emphasis: bool,
    pub strikethrough: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: Style,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    ListItem {
        depth: usize,
        marker: String,
        /// The list sits inside a block quote.
        quoted: bool,
        spans: Vec<Span>,
    },
    Quote(Vec<Span>),
    Code(String),
    Table {
        header: Vec<Vec<Span>>,
        rows: Vec<Vec<Vec<Span>>>,
    },
    Rule,
}

/// One entry of the reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkItem {
    pub label: String,
    /// `None` when the link could not be parsed; the entry is shown as text.
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAnswer {
    pub blocks: Vec<Block>,
    /// Empty means the links region is not shown at all.
    pub links: Vec<LinkItem>,
}

pub fn render(payload: &AnswerPayload) -> RenderedAnswer {
    RenderedAnswer {
        blocks: markdown_blocks(&payload.answer),
        links: payload.relevant_links.iter().map(|link| link_item(link)).collect(),
    }
}

/// Non-empty path segments of `link`, joined with `LABEL_SEPARATOR`.
pub fn link_label(link: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(link)?;
    let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
    Ok(segments.join(LABEL_SEPARATOR))
}

fn link_item(link: &str) -> LinkItem {
    if link.trim().is_empty() {
        return LinkItem {
            label: EMPTY_LINK_LABEL.to_string(),
            href: None,
        };
    }

    match link_label(link) {
        Ok(label) if !label.is_empty() => LinkItem {
            label,
            href: Some(link.to_string()),
        },
        Ok(_) => LinkItem {
            label: link.to_string(),
            href: Some(link.to_string()),
        },
        Err(e) => {
            debug!(link, error = %e, "link is not a valid URL, showing it verbatim");
            LinkItem {
                label: link.to_string(),
                href: None,
            }
        }
    }
}

#[derive(Default)]
struct TableBuilder {
    header: Vec<Vec<Span>>,
    rows: Vec<Vec<Vec<Span>>>,
    row: Vec<Vec<Span>>,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    strong: usize,
    emphasis: usize,
    strikethrough: usize,
    link: Option<String>,
    heading: Option<u8>,
    quote_depth: usize,
    /// Next number per open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    marker: Option<String>,
    code: Option<String>,
    table: Option<TableBuilder>,
}

impl BlockBuilder {
    fn style(&self, code: bool) -> Style {
        Style {
            strong: self.strong > 0,
            emphasis: self.emphasis > 0,
            strikethrough: self.strikethrough > 0,
            code,
        }
    }

    fn push_text(&mut self, text: &str, code: bool) {
        if let Some(buffer) = self.code.as_mut() {
            buffer.push_str(text);
            return;
        }

        let style = self.style(code);
        if let Some(last) = self.spans.last_mut() {
            if last.style == style && last.link == self.link {
                last.text.push_str(text);
                return;
            }
        }
        self.spans.push(Span {
            text: text.to_string(),
            style,
            link: self.link.clone(),
        });
    }

    /// Close the current run of inline text into whatever block encloses it.
    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);

        if let Some(table) = self.table.as_mut() {
            table.row.push(spans);
        } else if self.heading.is_some() && self.item_pending() {
            // A heading that opens a list item keeps the item's marker.
            let spans = spans
                .into_iter()
                .map(|mut span| {
                    span.style.strong = true;
                    span
                })
                .collect();
            self.push_item(spans);
        } else if let Some(level) = self.heading {
            self.blocks.push(Block::Heading { level, spans });
        } else if !self.lists.is_empty() {
            self.push_item(spans);
        } else if self.quote_depth > 0 {
            self.blocks.push(Block::Quote(spans));
        } else {
            self.blocks.push(Block::Paragraph(spans));
        }
    }

    fn item_pending(&self) -> bool {
        !self.lists.is_empty() && self.marker.is_some()
    }

    fn push_item(&mut self, spans: Vec<Span>) {
        self.blocks.push(Block::ListItem {
            depth: self.lists.len().saturating_sub(1),
            marker: self.marker.take().unwrap_or_default(),
            quoted: self.quote_depth > 0,
            spans,
        });
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading(level, ..) => {
                self.flush();
                self.heading = Some(level as u8);
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                if self.item_pending() {
                    self.push_item(Vec::new());
                }
                if let CodeBlockKind::Fenced(lang) = kind {
                    debug!(lang = %lang, "code block");
                }
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{}.", next);
                        *next += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.marker = Some(marker);
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(TableBuilder::default());
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strong => self.strong += 1,
            Tag::Strikethrough => self.strikethrough += 1,
            Tag::Link(_, url, _) | Tag::Image(_, url, _) => {
                self.link = Some(url.to_string());
            }
            Tag::Paragraph => self.flush(),
            Tag::TableHead
            | Tag::TableCell
            | Tag::FootnoteDefinition(_) => {}
        }
    }

    fn end(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph | Tag::Item | Tag::FootnoteDefinition(_) => self.flush(),
            Tag::TableCell => {
                // Empty cells still take a column.
                let spans = std::mem::take(&mut self.spans);
                if let Some(table) = self.table.as_mut() {
                    table.row.push(spans);
                }
            }
            Tag::Heading(..) => {
                self.flush();
                self.heading = None;
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Tag::CodeBlock(_) => {
                if let Some(code) = self.code.take() {
                    self.blocks
                        .push(Block::Code(code.trim_end_matches('\n').to_string()));
                }
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            Tag::Table(_) => {
                self.flush();
                if let Some(table) = self.table.take() {
                    self.blocks.push(Block::Table {
                        header: table.header,
                        rows: table.rows,
                    });
                }
            }
            Tag::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            Tag::Strong => self.strong = self.strong.saturating_sub(1),
            Tag::Strikethrough => self.strikethrough = self.strikethrough.saturating_sub(1),
            Tag::Link(..) | Tag::Image(..) => self.link = None,
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if let Some(code) = self.code.take() {
            self.blocks.push(Block::Code(code));
        }
        self.table = None;
        self.heading = None;
        self.flush();
        self.blocks
    }
}

pub fn markdown_blocks(markdown: &str) -> Vec<Block> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut builder = BlockBuilder::default();

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(tag) => builder.end(tag),
            Event::Text(text) | Event::Html(text) => builder.push_text(&text, false),
            Event::Code(code) => builder.push_text(&code, true),
            Event::SoftBreak => builder.push_text(" ", false),
            Event::HardBreak => builder.push_text("\n", false),
            Event::Rule => {
                builder.flush();
                builder.blocks.push(Block::Rule);
            }
            Event::TaskListMarker(done) => {
                builder.push_text(if done { "[x] " } else { "[ ] " }, false)
            }
            Event::FootnoteReference(name) => builder.push_text(&format!("[^{}]", name), false),
        }
    }

    builder.finish()
}

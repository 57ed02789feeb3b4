use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};

use crate::document::model::{
    Block,
    BlockId,
    BlockQuote,
    CodeBlock,
    Document,
    DocumentModel,
    Heading,
    ImageBlock,
    ImageSource,
    List,
    ListItem,
    ListType,
    Paragraph,
    Run,
    RunStyle,
};

/// Structural walk over the pulldown-cmark event stream. Constructs the
/// block tree directly; there is no intermediate HTML and no regex pass.
pub fn markdown_to_model(source: &str) -> DocumentModel {
    let mut builder = ModelBuilder::new();
    for event in Parser::new_ext(source, super::parser_options()) {
        builder.handle(event);
    }
    builder.finish()
}

enum Container {
    Root { blocks: Vec<Block> },
    Quote { blocks: Vec<Block> },
    List { list_type: ListType, start_number: u64, items: Vec<ListItem> },
    Item { blocks: Vec<Block> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InlineKind {
    Paragraph,
    Heading(u8),
}

struct InlineState {
    kind: InlineKind,
    runs: Vec<Run>,
    bold: u32,
    italic: u32,
    links: Vec<String>,
}

impl InlineState {
    fn new(kind: InlineKind) -> Self {
        Self {
            kind,
            runs: Vec::new(),
            bold: 0,
            italic: 0,
            links: Vec::new(),
        }
    }

    fn style(&self, code: bool) -> RunStyle {
        RunStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            code,
            link: self.links.last().cloned(),
        }
    }
}

struct CodeBuilder {
    language: Option<String>,
    text: String,
}

struct ImageBuilder {
    dest: String,
    title: Option<String>,
    alt: String,
}

struct ModelBuilder {
    next_id: u64,
    containers: Vec<Container>,
    inline: Option<InlineState>,
    code: Option<CodeBuilder>,
    image: Option<ImageBuilder>,
}

impl ModelBuilder {
    fn new() -> Self {
        Self {
            next_id: 1,
            containers: vec![Container::Root { blocks: Vec::new() }],
            inline: None,
            code: None,
            image: None,
        }
    }

    fn finish(mut self) -> Document {
        self.flush_inline();
        // Unbalanced input cannot happen with pulldown-cmark, but a stray
        // container degrades to its inner blocks rather than being lost.
        while self.containers.len() > 1 {
            match self.containers.pop() {
                Some(Container::Quote { blocks }) | Some(Container::Item { blocks }) => {
                    for block in blocks {
                        self.push_block(block);
                    }
                }
                Some(Container::List { list_type, start_number, items }) => {
                    let id = self.take_id();
                    self.push_block(Block::List(List {
                        id,
                        list_type,
                        start_number,
                        items,
                    }));
                }
                Some(Container::Root { .. }) | None => break,
            }
        }
        match self.containers.pop() {
            Some(Container::Root { blocks }) => Document { blocks },
            _ => Document::default(),
        }
    }

    fn take_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.on_text(text.as_ref(), false),
            Event::Code(text) => self.on_text(text.as_ref(), true),
            Event::Html(html) | Event::InlineHtml(html) => {
                // Raw HTML is outside the supported node set; keep the source
                // text as a plain run so nothing is silently dropped.
                self.on_text(html.as_ref(), false);
            }
            Event::SoftBreak | Event::HardBreak => self.on_break(),
            Event::Rule => {
                self.flush_inline();
                self.push_block(Block::HorizontalRule);
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush_inline();
                self.inline = Some(InlineState::new(InlineKind::Paragraph));
            }
            Tag::Heading { level, .. } => {
                self.flush_inline();
                self.inline = Some(InlineState::new(InlineKind::Heading(heading_level_to_u8(level))));
            }
            Tag::List(start) => {
                self.flush_inline();
                self.containers.push(Container::List {
                    list_type: if start.is_some() {
                        ListType::Numbered
                    } else {
                        ListType::Bullet
                    },
                    start_number: start.unwrap_or(1),
                    items: Vec::new(),
                });
            }
            Tag::Item => {
                self.containers.push(Container::Item { blocks: Vec::new() });
            }
            Tag::BlockQuote(_) => {
                self.flush_inline();
                self.containers.push(Container::Quote { blocks: Vec::new() });
            }
            Tag::CodeBlock(kind) => {
                self.flush_inline();
                self.code = Some(CodeBuilder {
                    language: match kind {
                        CodeBlockKind::Indented => None,
                        CodeBlockKind::Fenced(lang) => {
                            let lang = lang.to_string();
                            if lang.is_empty() { None } else { Some(lang) }
                        }
                    },
                    text: String::new(),
                });
            }
            Tag::Strong => {
                if let Some(inline) = self.inline.as_mut() {
                    inline.bold += 1;
                }
            }
            Tag::Emphasis => {
                if let Some(inline) = self.inline.as_mut() {
                    inline.italic += 1;
                }
            }
            Tag::Link { dest_url, .. } => {
                self.ensure_inline();
                if let Some(inline) = self.inline.as_mut() {
                    inline.links.push(dest_url.to_string());
                }
            }
            Tag::Image { dest_url, title, .. } => {
                self.image = Some(ImageBuilder {
                    dest: dest_url.to_string(),
                    title: if title.is_empty() { None } else { Some(title.to_string()) },
                    alt: String::new(),
                });
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(..) => self.flush_inline(),
            TagEnd::Strong => {
                if let Some(inline) = self.inline.as_mut() {
                    inline.bold = inline.bold.saturating_sub(1);
                }
            }
            TagEnd::Emphasis => {
                if let Some(inline) = self.inline.as_mut() {
                    inline.italic = inline.italic.saturating_sub(1);
                }
            }
            TagEnd::Link => {
                if let Some(inline) = self.inline.as_mut() {
                    inline.links.pop();
                }
            }
            TagEnd::Image => {
                if let Some(image) = self.image.take() {
                    // An image splits the surrounding paragraph; it lives in
                    // the block tree, not in a run.
                    let resumed = self.flush_inline_resumable();
                    let id = self.take_id();
                    self.push_block(Block::Image(ImageBlock {
                        id,
                        source: ImageSource {
                            storage_path: if image.dest.is_empty() { None } else { Some(image.dest) },
                            display_url: None,
                        },
                        alt_text: image.alt,
                        title: image.title,
                    }));
                    self.inline = resumed;
                }
            }
            TagEnd::CodeBlock => {
                if let Some(mut code) = self.code.take() {
                    if code.text.ends_with('\n') {
                        code.text.pop();
                    }
                    let id = self.take_id();
                    self.push_block(Block::CodeBlock(CodeBlock {
                        id,
                        language: code.language,
                        code: code.text,
                    }));
                }
            }
            TagEnd::Item => {
                self.flush_inline();
                if let Some(Container::Item { blocks }) = self.containers.pop() {
                    let id = self.take_id();
                    if let Some(Container::List { items, .. }) = self.containers.last_mut() {
                        items.push(ListItem { id, blocks });
                    }
                }
            }
            TagEnd::List(_) => {
                if let Some(Container::List { list_type, start_number, items }) =
                    self.containers.pop()
                {
                    let id = self.take_id();
                    self.push_block(Block::List(List {
                        id,
                        list_type,
                        start_number,
                        items,
                    }));
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_inline();
                if let Some(Container::Quote { blocks }) = self.containers.pop() {
                    let id = self.take_id();
                    self.push_block(Block::BlockQuote(BlockQuote { id, blocks }));
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str, code: bool) {
        if let Some(image) = self.image.as_mut() {
            image.alt.push_str(text);
            return;
        }
        if let Some(block) = self.code.as_mut() {
            block.text.push_str(text);
            return;
        }
        self.ensure_inline();
        if let Some(inline) = self.inline.as_mut() {
            let style = inline.style(code);
            match inline.runs.last_mut() {
                Some(last) if last.style == style => last.text.push_str(text),
                _ => inline.runs.push(Run {
                    text: text.to_string(),
                    style,
                }),
            }
        }
    }

    fn on_break(&mut self) {
        if let Some(image) = self.image.as_mut() {
            image.alt.push(' ');
            return;
        }
        if let Some(block) = self.code.as_mut() {
            block.text.push('\n');
            return;
        }
        if let Some(inline) = self.inline.as_mut() {
            let style = inline.style(false);
            inline.runs.push(Run {
                text: "\n".to_string(),
                style,
            });
        }
    }

    /// Tight list items produce text without a wrapping paragraph event;
    /// open an implicit one so those runs still have a home.
    fn ensure_inline(&mut self) {
        if self.inline.is_none() {
            self.inline = Some(InlineState::new(InlineKind::Paragraph));
        }
    }

    fn flush_inline(&mut self) {
        if let Some(inline) = self.inline.take() {
            if inline.runs.is_empty() && matches!(inline.kind, InlineKind::Paragraph) {
                return;
            }
            let id = self.take_id();
            let block = match inline.kind {
                InlineKind::Paragraph => Block::Paragraph(Paragraph { id, runs: inline.runs }),
                InlineKind::Heading(level) => Block::Heading(Heading {
                    id,
                    level,
                    runs: inline.runs,
                }),
            };
            self.push_block(block);
        }
    }

    /// Flush the open inline but hand back a fresh one of the same kind and
    /// formatting depth, so text after an image continues in a new paragraph.
    fn flush_inline_resumable(&mut self) -> Option<InlineState> {
        let resumed = self.inline.as_ref().map(|inline| InlineState {
            kind: inline.kind,
            runs: Vec::new(),
            bold: inline.bold,
            italic: inline.italic,
            links: inline.links.clone(),
        });
        self.flush_inline();
        resumed
    }

    fn push_block(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(Container::Root { blocks })
            | Some(Container::Quote { blocks })
            | Some(Container::Item { blocks }) => blocks.push(block),
            // A block can only follow a list at the same level once the list
            // closed; reaching here means the event stream was unbalanced.
            Some(Container::List { .. }) | None => {}
        }
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Document {
        markdown_to_model(source)
    }

    #[test]
    fn parses_headings_with_levels() {
        let doc = parse("# One\n\n### Three\n");
        assert_eq!(doc.blocks.len(), 2);
        match (&doc.blocks[0], &doc.blocks[1]) {
            (Block::Heading(a), Block::Heading(b)) => {
                assert_eq!(a.level, 1);
                assert_eq!(b.level, 3);
                assert_eq!(a.runs[0].text, "One");
            }
            other => panic!("expected headings, got {other:?}"),
        }
    }

    #[test]
    fn parses_inline_styles_into_runs() {
        let doc = parse("plain **bold** and *italic* and `code`\n");
        let Block::Paragraph(p) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        let bold = p.runs.iter().find(|r| r.style.bold).expect("bold run");
        assert_eq!(bold.text, "bold");
        let italic = p.runs.iter().find(|r| r.style.italic).expect("italic run");
        assert_eq!(italic.text, "italic");
        let code = p.runs.iter().find(|r| r.style.code).expect("code run");
        assert_eq!(code.text, "code");
    }

    #[test]
    fn parses_links_with_nested_styling() {
        let doc = parse("[click **here**](https://example.com)\n");
        let Block::Paragraph(p) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(
            p.runs
                .iter()
                .all(|r| r.style.link.as_deref() == Some("https://example.com"))
        );
        assert!(p.runs.iter().any(|r| r.style.bold && r.text == "here"));
    }

    #[test]
    fn image_splits_its_paragraph() {
        let doc = parse("before ![alt text](.images/a1b2.png) after\n");
        let kinds: Vec<&str> = doc
            .blocks
            .iter()
            .map(|b| match b {
                Block::Paragraph(_) => "p",
                Block::Image(_) => "img",
                _ => "?",
            })
            .collect();
        assert_eq!(kinds, vec!["p", "img", "p"]);
        let Block::Image(img) = &doc.blocks[1] else {
            panic!("expected image");
        };
        assert_eq!(img.alt_text, "alt text");
        assert_eq!(img.source.storage_path.as_deref(), Some(".images/a1b2.png"));
        assert!(img.source.display_url.is_none());
    }

    #[test]
    fn parses_nested_list_structure() {
        let doc = parse("- a\n- b\n  - b1\n");
        let Block::List(list) = &doc.blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(list.list_type, ListType::Bullet);
        assert_eq!(list.items.len(), 2);
        let nested = list.items[1]
            .blocks
            .iter()
            .find_map(|b| match b {
                Block::List(inner) => Some(inner),
                _ => None,
            })
            .expect("nested list");
        assert_eq!(nested.items.len(), 1);
    }

    #[test]
    fn ordered_list_keeps_start_number() {
        let doc = parse("3. three\n4. four\n");
        let Block::List(list) = &doc.blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(list.list_type, ListType::Numbered);
        assert_eq!(list.start_number, 3);
    }

    #[test]
    fn fenced_code_keeps_language_and_body() {
        let doc = parse("```rust\nfn main() {}\n\nlet x = 1;\n```\n");
        let Block::CodeBlock(code) = &doc.blocks[0] else {
            panic!("expected code block");
        };
        assert_eq!(code.language.as_deref(), Some("rust"));
        assert_eq!(code.code, "fn main() {}\n\nlet x = 1;");
    }

    #[test]
    fn blockquote_nests_inner_blocks() {
        let doc = parse("> quoted line\n>\n> - item\n");
        let Block::BlockQuote(quote) = &doc.blocks[0] else {
            panic!("expected blockquote");
        };
        assert!(matches!(quote.blocks[0], Block::Paragraph(_)));
        assert!(matches!(quote.blocks[1], Block::List(_)));
    }

    #[test]
    fn unsupported_constructs_degrade_to_text() {
        // Tables are not enabled; the pipe rows come through as paragraphs.
        let doc = parse("| a | b |\n| - | - |\n");
        assert!(doc.blocks.iter().all(|b| matches!(b, Block::Paragraph(_))));
        assert!(doc.plain_text().contains("| a | b |"));

        // Raw HTML is preserved as plain text rather than dropped.
        let doc = parse("<div>hello</div>\n");
        assert!(doc.plain_text().contains("<div>hello</div>"));
    }

    #[test]
    fn arbitrary_garbage_never_panics() {
        for source in ["*", "[", "```", "> > >", "1.", "![](", "\u{0}\u{1}", "---\n***\n___"] {
            let _ = parse(source);
        }
    }
}

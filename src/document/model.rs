use serde::{Deserialize, Serialize};

pub type DocumentModel = Document;

/// In-memory rich representation of one note. Mirrors what the editor
/// surface manipulates; the Markdown codec is the only way in or out.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct BlockId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Heading(Heading),
    List(List),
    BlockQuote(BlockQuote),
    CodeBlock(CodeBlock),
    Image(ImageBlock),
    HorizontalRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Paragraph {
    pub id: BlockId,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Heading {
    pub id: BlockId,
    pub level: u8,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct List {
    pub id: BlockId,
    pub list_type: ListType,
    pub start_number: u64,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ListItem {
    pub id: BlockId,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BlockQuote {
    pub id: BlockId,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CodeBlock {
    pub id: BlockId,
    pub language: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ImageBlock {
    pub id: BlockId,
    pub source: ImageSource,
    pub alt_text: String,
    pub title: Option<String>,
}

/// An image node carries two candidate sources. The storage path is what may
/// be written to disk; the display URL exists only for the live preview and
/// must never leak into saved Markdown while a storage path is present.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ImageSource {
    pub storage_path: Option<String>,
    pub display_url: Option<String>,
}

impl ImageSource {
    /// The source to persist: storage path first, display URL as fallback.
    pub fn persisted(&self) -> &str {
        self.storage_path
            .as_deref()
            .or(self.display_url.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Run {
    pub text: String,
    pub style: RunStyle,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: RunStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListType {
    Bullet,
    Numbered,
}

impl Default for ListType {
    fn default() -> Self {
        Self::Bullet
    }
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Flattened text of every run, used by word counts and tests.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.blocks, &mut out);
        out
    }

    /// Every image node in document order, including nested ones.
    pub fn images(&self) -> Vec<&ImageBlock> {
        let mut out = Vec::new();
        collect_images(&self.blocks, &mut out);
        out
    }
}

fn collect_text(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                for run in &p.runs {
                    out.push_str(run.text.as_str());
                }
                out.push('\n');
            }
            Block::Heading(h) => {
                for run in &h.runs {
                    out.push_str(run.text.as_str());
                }
                out.push('\n');
            }
            Block::List(list) => {
                for item in &list.items {
                    collect_text(&item.blocks, out);
                }
            }
            Block::BlockQuote(quote) => collect_text(&quote.blocks, out),
            Block::CodeBlock(code) => {
                out.push_str(code.code.as_str());
                out.push('\n');
            }
            Block::Image(img) => {
                out.push_str(img.alt_text.as_str());
                out.push('\n');
            }
            Block::HorizontalRule => {}
        }
    }
}

fn collect_images<'a>(blocks: &'a [Block], out: &mut Vec<&'a ImageBlock>) {
    for block in blocks {
        match block {
            Block::Image(img) => out.push(img),
            Block::List(list) => {
                for item in &list.items {
                    collect_images(&item.blocks, out);
                }
            }
            Block::BlockQuote(quote) => collect_images(&quote.blocks, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_source_prefers_storage_path() {
        let source = ImageSource {
            storage_path: Some(".images/abc.png".to_string()),
            display_url: Some("http://localhost:3550/images/abc.png".to_string()),
        };
        assert_eq!(source.persisted(), ".images/abc.png");

        let transient = ImageSource {
            storage_path: None,
            display_url: Some("http://localhost:3550/images/abc.png".to_string()),
        };
        assert_eq!(transient.persisted(), "http://localhost:3550/images/abc.png");
    }

    #[test]
    fn images_are_collected_from_nested_blocks() {
        let doc = Document {
            blocks: vec![
                Block::Image(ImageBlock {
                    id: BlockId(1),
                    source: ImageSource::default(),
                    alt_text: "top".to_string(),
                    title: None,
                }),
                Block::BlockQuote(BlockQuote {
                    id: BlockId(2),
                    blocks: vec![Block::Image(ImageBlock {
                        id: BlockId(3),
                        source: ImageSource::default(),
                        alt_text: "quoted".to_string(),
                        title: None,
                    })],
                }),
            ],
        };

        let alts: Vec<&str> = doc.images().iter().map(|i| i.alt_text.as_str()).collect();
        assert_eq!(alts, vec!["top", "quoted"]);
    }
}

use pulldown_cmark::Options;

use crate::document::model::DocumentModel;

pub mod parser;
pub mod writer;

/// Options used when reading note files into the model. CommonMark core is
/// exactly the node set the editor supports; anything an extension would
/// recognize degrades to plain text instead.
pub fn parser_options() -> Options {
    Options::empty()
}

/// Markdown text -> rich document. Total: arbitrary input (including the
/// empty string) produces a model, never an error.
pub fn from_markdown(source: &str) -> DocumentModel {
    parser::markdown_to_model(source)
}

/// Rich document -> Markdown text. Deterministic; the same model always
/// serializes to byte-identical output.
pub fn to_markdown(model: &DocumentModel) -> String {
    writer::model_to_markdown(model)
}

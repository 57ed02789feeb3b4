use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

use crate::files::assets::{ASSET_DIR_NAME, display_url_for};

/// Preview rendering is delegated to pulldown-cmark's HTML emitter; the
/// richer option set here only affects the read-only preview, never what
/// the codec writes to disk.
fn preview_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Markdown source -> preview HTML.
///
/// Storage-relative image paths are rewritten to the local asset server so
/// the preview can actually load them; everything else passes through.
pub fn render_preview(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, preview_options());
    let events = parser.map(|event| match event {
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: rewrite_image_dest(dest_url.as_ref()),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, events);
    out
}

fn rewrite_image_dest(dest: &str) -> CowStr<'static> {
    let prefix = format!("{ASSET_DIR_NAME}/");
    match dest.strip_prefix(prefix.as_str()) {
        Some(name) => CowStr::from(display_url_for(name)),
        None => CowStr::from(dest.to_string()),
    }
}

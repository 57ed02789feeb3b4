use crate::document::model::{Block, DocumentModel, ListType, Run};

/// Serialize the block tree back to Markdown.
///
/// Output is deterministic and normalized: blocks separated by a single
/// blank line, runs of 3+ blank lines collapsed, whole document trimmed,
/// exactly one trailing newline on non-empty output.
pub fn model_to_markdown(model: &DocumentModel) -> String {
    let body = render_blocks(&model.blocks);
    let collapsed = collapse_blank_lines(body.as_str());
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Paragraph(p) => render_runs(&p.runs),
        Block::Heading(h) => {
            let hashes = "#".repeat(h.level.clamp(1, 6) as usize);
            let text = render_runs(&h.runs).replace('\n', " ");
            format!("{hashes} {text}").trim_end().to_string()
        }
        Block::CodeBlock(c) => {
            let fence = if c.code.contains("```") { "````" } else { "```" };
            let lang = c.language.as_deref().unwrap_or("");
            format!("{fence}{lang}\n{}\n{fence}", c.code)
        }
        Block::BlockQuote(q) => {
            let inner = render_blocks(&q.blocks);
            inner
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {line}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Block::List(list) => {
            let mut items = Vec::with_capacity(list.items.len());
            for (index, item) in list.items.iter().enumerate() {
                let marker = match list.list_type {
                    ListType::Bullet => "- ".to_string(),
                    ListType::Numbered => format!("{}. ", list.start_number + index as u64),
                };
                items.push(render_list_item(marker.as_str(), &item.blocks));
            }
            items.join("\n")
        }
        // The storage-relative path is what persists; the display URL only
        // stands in when no storage path was ever recorded.
        Block::Image(img) => match &img.title {
            Some(title) => format!("![{}]({} \"{title}\")", img.alt_text, img.source.persisted()),
            None => format!("![{}]({})", img.alt_text, img.source.persisted()),
        },
        Block::HorizontalRule => "---".to_string(),
    }
}

fn render_list_item(marker: &str, blocks: &[Block]) -> String {
    let inner = render_blocks(blocks);
    let indent = " ".repeat(marker.len());
    let mut out = String::new();
    let mut first = true;
    for line in inner.lines() {
        if first {
            out.push_str(marker);
            out.push_str(line);
            first = false;
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent.as_str());
                out.push_str(line);
            }
        }
    }
    if first {
        out.push_str(marker.trim_end());
    }
    out
}

fn render_runs(runs: &[Run]) -> String {
    let merged = merge_adjacent_runs(runs);
    let mut out = String::new();
    let mut index = 0;
    while index < merged.len() {
        match merged[index].style.link.clone() {
            Some(link) => {
                // Consecutive runs sharing a target collapse into one link.
                let mut inner = String::new();
                while index < merged.len()
                    && merged[index].style.link.as_deref() == Some(link.as_str())
                {
                    inner.push_str(wrap_run(&merged[index]).as_str());
                    index += 1;
                }
                out.push('[');
                out.push_str(inner.as_str());
                out.push_str("](");
                out.push_str(link.as_str());
                out.push(')');
            }
            None => {
                out.push_str(wrap_run(&merged[index]).as_str());
                index += 1;
            }
        }
    }
    out
}

fn merge_adjacent_runs(runs: &[Run]) -> Vec<Run> {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.style == run.style => last.text.push_str(run.text.as_str()),
            _ => merged.push(run.clone()),
        }
    }
    merged
}

fn wrap_run(run: &Run) -> String {
    if run.style.code {
        let fence = if run.text.contains('`') { "``" } else { "`" };
        return format!("{fence}{}{fence}", run.text);
    }
    if run.text == "\n" {
        return "\n".to_string();
    }

    let mut text = escape_inline(run.text.as_str());
    if run.style.bold {
        text = format!("**{text}**");
    }
    if run.style.italic {
        text = format!("*{text}*");
    }
    text
}

/// Backslash-escape the characters that would otherwise re-parse as
/// formatting. Kept minimal on purpose; pulldown unescapes these on read.
fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '`' | '*' | '_' | '[' | ']') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Collapse runs of 3+ blank lines to a single blank line, leaving fenced
/// code bodies untouched.
fn collapse_blank_lines(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut pending = 0usize;
    let mut in_fence = false;
    for line in text.lines() {
        if !in_fence && line.trim().is_empty() {
            pending += 1;
            continue;
        }
        if pending > 0 {
            let keep = if pending >= 3 { 1 } else { pending };
            for _ in 0..keep {
                kept.push("");
            }
            pending = 0;
        }
        kept.push(line);
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
    }
    kept.join("\n")
}

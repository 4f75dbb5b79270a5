//! Listing page template
//!
//! Templates are plain HTML with `$name` placeholders. Page variables:
//! `$file_rows`, `$file_count`, `$total_size`, `$server_name`. Row markup is
//! taken from a `<!-- row: ... -->` directive in the template, falling back
//! to [`DEFAULT_ROW`]. Row variables: `$name`, `$name_url`, `$size`,
//! `$size_human`.

use std::path::Path;
use tokio::fs;

use super::{human_size, FileEntry};
use crate::error::{AppError, AppResult};

const ROW_OPEN: &str = "<!-- row:";
const ROW_CLOSE: &str = "-->";

pub const DEFAULT_ROW: &str = r#"<li><a href="/stream?file=$name_url">$name</a> <span class="size">$size_human</span></li>"#;

/// A parsed listing template
#[derive(Debug, Clone)]
pub struct ListingTemplate {
    page: String,
    row: String,
}

impl ListingTemplate {
    /// Read the template from disk; called on every listing request
    pub async fn load(path: &Path) -> AppResult<Self> {
        let source = fs::read_to_string(path)
            .await
            .map_err(AppError::render("Error loading template"))?;
        Ok(Self::parse(&source))
    }

    pub fn parse(source: &str) -> Self {
        if let Some(open) = source.find(ROW_OPEN) {
            let after = &source[open + ROW_OPEN.len()..];
            if let Some(close) = after.find(ROW_CLOSE) {
                let row = after[..close].trim().to_string();
                let page = format!("{}{}", &source[..open], &after[close + ROW_CLOSE.len()..]);
                return Self { page, row };
            }
        }
        Self {
            page: source.to_string(),
            row: DEFAULT_ROW.to_string(),
        }
    }

    pub fn render(&self, entries: &[FileEntry], server_name: &str) -> String {
        let rows: String = entries
            .iter()
            .map(|entry| self.render_row(entry))
            .collect::<Vec<_>>()
            .join("\n");
        let total: u64 = entries.iter().map(|e| e.size).sum();

        substitute(
            &self.page,
            &[
                ("$file_rows", rows),
                ("$file_count", entries.len().to_string()),
                ("$total_size", human_size(total)),
                ("$server_name", escape_html(server_name)),
            ],
        )
    }

    fn render_row(&self, entry: &FileEntry) -> String {
        let name_url: String = form_urlencoded::byte_serialize(entry.name.as_bytes()).collect();
        substitute(
            &self.row,
            &[
                ("$name_url", name_url),
                ("$name", escape_html(&entry.name)),
                ("$size_human", human_size(entry.size)),
                ("$size", entry.size.to_string()),
            ],
        )
    }
}

/// Single-pass `$variable` substitution
///
/// Variables are tried in the given order at each `$`, so a longer name
/// must precede any name that is its prefix. Substituted values are never
/// rescanned, and unknown `$` sequences are copied through.
pub fn substitute<V: AsRef<str>>(pattern: &str, vars: &[(&str, V)]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match vars.iter().find(|(name, _)| tail.starts_with(name)) {
            Some((name, value)) => {
                out.push_str(value.as_ref());
                rest = &tail[name.len()..];
            }
            None => {
                out.push('$');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

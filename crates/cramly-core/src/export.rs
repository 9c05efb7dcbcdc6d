// Note export to Markdown and standalone HTML.

use std::path::{Path, PathBuf};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::info;

use crate::model::Note;

lazy_static! {
    static ref H1_REGEX: Regex = Regex::new(r"(?i)<h1>(.*?)</h1>")
        .expect("Failed to compile h1 regex");
    static ref H2_REGEX: Regex = Regex::new(r"(?i)<h2>(.*?)</h2>")
        .expect("Failed to compile h2 regex");
    static ref H3_REGEX: Regex = Regex::new(r"(?i)<h3>(.*?)</h3>")
        .expect("Failed to compile h3 regex");
    static ref P_REGEX: Regex = Regex::new(r"(?i)<p>(.*?)</p>")
        .expect("Failed to compile paragraph regex");
    static ref STRONG_REGEX: Regex = Regex::new(r"(?i)<strong>(.*?)</strong>")
        .expect("Failed to compile strong regex");
    static ref EM_REGEX: Regex = Regex::new(r"(?i)<em>(.*?)</em>")
        .expect("Failed to compile em regex");
    static ref UL_REGEX: Regex = Regex::new(r"(?i)<ul>(.*?)</ul>")
        .expect("Failed to compile ul regex");
    static ref OL_REGEX: Regex = Regex::new(r"(?i)<ol>(.*?)</ol>")
        .expect("Failed to compile ol regex");
    static ref LI_REGEX: Regex = Regex::new(r"(?i)<li>(.*?)</li>")
        .expect("Failed to compile li regex");
    static ref LINK_REGEX: Regex = Regex::new(r#"(?i)<a href="(.*?)">(.*?)</a>"#)
        .expect("Failed to compile link regex");
    static ref BLOCKQUOTE_REGEX: Regex = Regex::new(r"(?i)<blockquote>(.*?)</blockquote>")
        .expect("Failed to compile blockquote regex");
    static ref CODE_BLOCK_REGEX: Regex = Regex::new(r"(?i)<pre><code>(.*?)</code></pre>")
        .expect("Failed to compile code block regex");
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]*>")
        .expect("Failed to compile tag regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Html => "html",
        }
    }
}

/// Convert editor HTML to Markdown with a fixed sequence of substitutions.
///
/// Matching is case-insensitive, non-greedy and line-bound: elements spanning
/// several lines are left to the final tag strip.
pub fn to_markdown(title: &str, html: &str) -> String {
    let mut content = H1_REGEX.replace_all(html, "# $1\n\n").into_owned();
    content = H2_REGEX.replace_all(&content, "## $1\n\n").into_owned();
    content = H3_REGEX.replace_all(&content, "### $1\n\n").into_owned();

    content = P_REGEX.replace_all(&content, "$1\n\n").into_owned();

    content = STRONG_REGEX.replace_all(&content, "**$1**").into_owned();
    content = EM_REGEX.replace_all(&content, "*$1*").into_owned();

    content = UL_REGEX
        .replace_all(&content, |caps: &Captures| {
            LI_REGEX.replace_all(&caps[1], "- $1\n").into_owned()
        })
        .into_owned();

    content = OL_REGEX
        .replace_all(&content, |caps: &Captures| {
            let mut index = 0;
            LI_REGEX
                .replace_all(&caps[1], |item: &Captures| {
                    index += 1;
                    format!("{index}. {}\n", &item[1])
                })
                .into_owned()
        })
        .into_owned();

    content = LINK_REGEX.replace_all(&content, "[$2]($1)").into_owned();

    content = BLOCKQUOTE_REGEX.replace_all(&content, "> $1\n\n").into_owned();

    content = CODE_BLOCK_REGEX
        .replace_all(&content, "```\n$1\n```\n\n")
        .into_owned();

    content = TAG_REGEX.replace_all(&content, "").into_owned();

    format!("# {title}\n\n{content}")
}

const DOCUMENT_STYLE: &str = r#"    body {
      font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
      line-height: 1.6;
      color: #333;
      max-width: 800px;
      margin: 0 auto;
      padding: 2rem;
    }
    h1, h2, h3 {
      font-weight: 600;
      margin-top: 2rem;
      margin-bottom: 1rem;
    }
    h1 { font-size: 2rem; }
    h2 { font-size: 1.5rem; }
    h3 { font-size: 1.25rem; }
    p { margin-bottom: 1rem; }
    pre {
      background-color: #f5f5f5;
      padding: 1rem;
      border-radius: 4px;
      overflow-x: auto;
    }
    blockquote {
      border-left: 4px solid #ddd;
      padding-left: 1rem;
      font-style: italic;
      color: #666;
    }"#;

/// Wrap note content in a standalone, styled HTML document. The title is
/// escaped; the content is already HTML and is embedded as-is.
pub fn to_html_document(title: &str, html: &str) -> String {
    let title = html_escape::encode_text(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <title>{title}</title>\n  <meta charset=\"UTF-8\">\n  <style>\n{DOCUMENT_STYLE}\n  </style>\n</head>\n<body>\n  <h1>{title}</h1>\n  {html}\n</body>\n</html>"
    )
}

/// Render `note` in `format`.
pub fn render(note: &Note, format: ExportFormat) -> String {
    match format {
        ExportFormat::Markdown => to_markdown(&note.title, &note.content),
        ExportFormat::Html => to_html_document(&note.title, &note.content),
    }
}

/// File stem derived from a note title: alphanumerics, `-` and `_` are kept,
/// whitespace becomes `_`, everything else is dropped.
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();
    if stem.is_empty() {
        "note".to_string()
    } else {
        stem
    }
}

/// Write `note` to `dir` in `format`, creating the directory if needed.
/// An existing file with the same name is overwritten. Returns the path.
pub fn write_export(dir: &Path, note: &Note, format: ExportFormat) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let path = dir.join(format!("{}.{}", file_stem(&note.title), format.extension()));
    std::fs::write(&path, render(note, format))
        .with_context(|| format!("failed to write export {}", path.display()))?;

    info!("Exported note {} to {}", note.id, path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn heading_and_paragraph_become_separate_lines() {
        let md = to_markdown("T", "<h1>A</h1><p>B</p>");
        assert!(md.starts_with("# T\n\n"));
        let lines: Vec<&str> = md.lines().collect();
        assert!(lines.contains(&"# A"));
        assert!(lines.contains(&"B"));
        assert_eq!(md, "# T\n\n# A\n\nB\n\n");
    }

    #[test]
    fn inline_emphasis_and_links() {
        let md = to_markdown(
            "T",
            r#"<p>A <strong>bold</strong> and <EM>soft</EM> <a href="https://x.io">link</a></p>"#,
        );
        assert_eq!(md, "# T\n\nA **bold** and *soft* [link](https://x.io)\n\n");
    }

    #[test]
    fn lists_are_bulleted_and_numbered() {
        let md = to_markdown("T", "<ul><li>a</li><li>b</li></ul><ol><li>x</li><li>y</li></ol>");
        assert_eq!(md, "# T\n\n- a\n- b\n1. x\n2. y\n");
    }

    #[test]
    fn ordered_lists_number_independently() {
        let md = to_markdown("T", "<ol><li>a</li></ol><ol><li>b</li></ol>");
        assert_eq!(md, "# T\n\n1. a\n1. b\n");
    }

    #[test]
    fn blockquote_and_code_block() {
        let md = to_markdown(
            "T",
            "<blockquote>wise</blockquote><pre><code>let x = 1;</code></pre>",
        );
        assert_eq!(md, "# T\n\n> wise\n\n```\nlet x = 1;\n```\n\n");
    }

    #[test]
    fn unknown_tags_are_stripped() {
        let md = to_markdown("T", "<div><span>plain</span></div>");
        assert_eq!(md, "# T\n\nplain");
    }

    #[test]
    fn html_document_embeds_style_title_and_content() {
        let doc = to_html_document("Tom & Jerry", "<p>chase</p>");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<meta charset=\"UTF-8\">"));
        assert!(doc.contains("<title>Tom &amp; Jerry</title>"));
        assert!(doc.contains("<h1>Tom &amp; Jerry</h1>"));
        assert!(doc.contains("<p>chase</p>"));
        assert!(doc.contains("max-width: 800px;"));
        assert!(doc.contains("border-left: 4px solid #ddd;"));
        assert!(doc.contains("background-color: #f5f5f5;"));
    }

    #[test]
    fn file_stem_sanitizes_titles() {
        assert_eq!(file_stem("Cell Biology: Part 1/2"), "Cell_Biology_Part_12");
        assert_eq!(file_stem("  ???  "), "note");
    }

    #[test]
    fn write_export_creates_file_with_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/exports");
        let note = Note {
            id: "n1".into(),
            title: "Week 1".into(),
            content: "<h2>Intro</h2>".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_unsaved: false,
        };

        let md_path = write_export(&dir, &note, ExportFormat::Markdown).unwrap();
        assert_eq!(md_path, dir.join("Week_1.md"));
        assert_eq!(
            std::fs::read_to_string(&md_path).unwrap(),
            "# Week 1\n\n## Intro\n\n"
        );

        let html_path = write_export(&dir, &note, ExportFormat::Html).unwrap();
        assert_eq!(html_path, dir.join("Week_1.html"));
        assert!(std::fs::read_to_string(&html_path)
            .unwrap()
            .contains("<h2>Intro</h2>"));
    }
}

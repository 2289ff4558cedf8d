//! Answer formatting for the response surface.
//!
//! Providers answer in markdown; the response surface renders HTML. The
//! conversion keeps fenced code blocks intact (with a copy button per
//! block), converts inline markup, and groups list items. For plain-text
//! notification fallbacks the HTML can be flattened back to text and split
//! into notification-sized chunks.

use regex::Regex;
use std::sync::OnceLock;

/// Notification body size limit.
const CHUNK_SIZE: usize = 250;

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(\w+)?\n(.*?)\n```").unwrap())
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*|__(.*?)__").unwrap())
}

fn italic_star_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").unwrap())
}

fn italic_underscore_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_([^_]+)_").unwrap())
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+(.+)").unwrap())
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"__CODE_BLOCK_\d+__").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Markdown answer → HTML for the response surface.
pub fn to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Lift code blocks out first so inline markup never touches them.
    let mut code_blocks: Vec<String> = Vec::new();
    let formatted = code_block_re()
        .replace_all(text, |caps: &regex::Captures| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("text");
            let code_id = format!("code-block-{}", code_blocks.len());
            let placeholder = format!("__CODE_BLOCK_{}__", code_blocks.len());
            code_blocks.push(format!(
                "<pre><button class=\"copy-button\" data-code-id=\"{}\">[Copy]</button><code id=\"{}\" class=\"language-{}\">{}</code></pre>",
                code_id,
                code_id,
                lang,
                escape_html(&caps[2])
            ));
            placeholder
        })
        .into_owned();

    let formatted = inline_code_re()
        .replace_all(&formatted, "<code>$1</code>")
        .into_owned();

    let mut lines: Vec<String> = Vec::new();
    for line in formatted.split('\n') {
        if placeholder_re().is_match(line) {
            lines.push(line.to_string());
            continue;
        }

        let line = bold_re().replace_all(line, "<strong>${1}${2}</strong>");
        let line = italic_star_re().replace_all(&line, "<em>$1</em>");
        let line = italic_underscore_re().replace_all(&line, "<em>$1</em>");

        let line = if let Some(caps) = list_item_re().captures(&line) {
            format!("<li>{}</li>", &caps[1])
        } else if !line.trim().is_empty() {
            format!("<p>{}</p>", line)
        } else {
            continue;
        };
        lines.push(line);
    }

    // Wrap runs of list items; <br> joins everything else.
    let mut wrapped: Vec<String> = Vec::new();
    let mut in_list = false;
    for line in lines {
        let is_item = line.starts_with("<li>");
        if is_item && !in_list {
            wrapped.push("<ul>".to_string());
            in_list = true;
        } else if !is_item && in_list {
            wrapped.push("</ul>".to_string());
            in_list = false;
        }
        wrapped.push(line);
    }
    if in_list {
        wrapped.push("</ul>".to_string());
    }

    let mut html = wrapped.join("<br>");
    html = html.replace("<ul><br>", "<ul>").replace("<br></ul>", "</ul>");

    for (i, block) in code_blocks.iter().enumerate() {
        html = html.replace(&format!("__CODE_BLOCK_{}__", i), block);
    }

    while let Some(stripped) = html.strip_suffix("<br>") {
        html = stripped.to_string();
    }
    while let Some(stripped) = html.strip_prefix("<br>") {
        html = stripped.to_string();
    }
    html
}

/// Formatted HTML → plain text, for notification bodies.
pub fn to_plain_text(html: &str) -> String {
    let mut text = html.to_string();
    for tag in ["<br>", "<br/>", "<br />"] {
        text = text.replace(tag, "\n");
    }
    text = text.replace("</p>", "\n").replace("</li>", "\n");
    text = tag_re().replace_all(&text, "").into_owned();
    text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split plain text into notification-sized chunks, breaking long lines at
/// word boundaries.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.len() <= CHUNK_SIZE {
            chunks.push(line.to_string());
            continue;
        }

        let mut remaining = line;
        while !remaining.is_empty() {
            if remaining.len() <= CHUNK_SIZE {
                chunks.push(remaining.to_string());
                break;
            }
            let mut end = CHUNK_SIZE;
            while !remaining.is_char_boundary(end) {
                end -= 1;
            }
            let window = &remaining[..end];
            let cut = match window.rfind(' ') {
                Some(pos) if pos > 0 => pos,
                _ => end,
            };
            chunks.push(remaining[..cut].trim().to_string());
            remaining = remaining[cut..].trim_start();
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_emphasis() {
        let html = to_html("Hello **world**\nsecond *line*");
        assert_eq!(
            html,
            "<p>Hello <strong>world</strong></p><br><p>second <em>line</em></p>"
        );
    }

    #[test]
    fn code_blocks_are_escaped_and_buttoned() {
        let html = to_html("```rust\nlet x = 1 < 2;\n```");
        assert!(html.contains("class=\"language-rust\""));
        assert!(html.contains("let x = 1 &lt; 2;"));
        assert!(html.contains("copy-button"));
    }

    #[test]
    fn list_items_are_grouped() {
        let html = to_html("- one\n- two");
        assert!(html.starts_with("<ul><li>one</li>"));
        assert!(html.ends_with("</ul>"));
    }

    #[test]
    fn inline_code_survives() {
        let html = to_html("use `cargo build` here");
        assert!(html.contains("<code>cargo build</code>"));
    }

    #[test]
    fn plain_text_round_trip() {
        let html = to_html("Hello **world**\n- a\n- b");
        let text = to_plain_text(&html);
        assert_eq!(text, "Hello world\na\nb");
    }

    #[test]
    fn long_lines_chunk_at_word_boundaries() {
        let text = "word ".repeat(100);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 250));
        assert!(chunks.iter().all(|c| !c.starts_with(' ') && !c.ends_with(' ')));
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(to_html(""), "");
        assert!(chunk_text("").is_empty());
    }
}

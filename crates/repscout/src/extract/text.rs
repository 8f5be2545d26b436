//! Visible-text extraction for the model prompt.

use scraper::{Html, Node};

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Document text outside `script`/`style`, whitespace-collapsed and capped
/// at `max_chars` characters.
pub fn visible_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    truncate_chars(&words.join(" "), max_chars)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

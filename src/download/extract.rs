use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

/// Script assignments the page embeds its state in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    PlayInfo,
    InitialState,
}

impl Marker {
    pub const ALL: [Marker; 2] = [Marker::PlayInfo, Marker::InitialState];

    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::PlayInfo => "window.__playinfo__=",
            Marker::InitialState => "window.__INITIAL_STATE__=",
        }
    }
}

#[derive(Debug, Default)]
pub struct PageScripts {
    entries: HashMap<Marker, Value>,
}

impl PageScripts {
    pub fn take(&mut self, marker: Marker) -> Option<Value> {
        self.entries.remove(&marker)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects the JSON following every known marker in the page's `<script>` elements.
/// A marker keeps its first occurrence; one that is followed by malformed JSON is left out.
pub fn extract_state(html: &str) -> PageScripts {
    let document = Html::parse_document(html);
    let scripts = document
        .select(&SCRIPT_SELECTOR)
        .map(|script| script.text().collect::<String>())
        .collect::<Vec<_>>();

    let mut entries = HashMap::new();

    for marker in Marker::ALL {
        let Some(raw) = scripts.iter().find_map(|script| capture_after(script, marker.as_str())) else {
            continue;
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                debug!("Found {} ({} bytes)", marker.as_str(), raw.len());
                entries.insert(marker, value);
            }
            Err(err) => {
                warn!("Ignoring malformed JSON after {}: {}", marker.as_str(), err);
            }
        }
    }

    PageScripts { entries }
}

/// Text from the end of `marker` up to the statement that assigns it ends.
fn capture_after<'a>(script: &'a str, marker: &str) -> Option<&'a str> {
    let start = script.find(marker)? + marker.len();
    let rest = &script[start..];
    Some(rest[..statement_end(rest)].trim())
}

/// Index of the first `;` that sits outside every string and bracket, or the text length.
fn statement_end(text: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return i,
            _ => {}
        }
    }

    text.len()
}

//! Placeholder shown in place of an image that cannot be served

use serde::Serialize;

/// Gray block with explanatory text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder {
    pub text: String,
    pub background: &'static str,
    pub foreground: &'static str,
}

impl Placeholder {
    pub const UNAVAILABLE_TEXT: &'static str = "Image unavailable";

    /// The fixed placeholder for unresolvable or failed images
    pub fn unavailable() -> Self {
        Self::with_text(Self::UNAVAILABLE_TEXT)
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            background: "#e5e7eb",
            foreground: "#6b7280",
        }
    }

    /// Markup for embedding where the image element would go
    pub fn to_html(&self, alt: &str) -> String {
        format!(
            "<div class=\"image-placeholder\" role=\"img\" aria-label=\"{}\" \
             style=\"background:{};color:{};display:flex;align-items:center;justify-content:center\">{}</div>",
            escape_html(alt),
            self.background,
            self.foreground,
            escape_html(&self.text)
        )
    }
}

impl Default for Placeholder {
    fn default() -> Self {
        Self::unavailable()
    }
}

fn escape_html(s: &str) -> String {
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

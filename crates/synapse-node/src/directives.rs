use regex::Regex;
use std::sync::LazyLock;

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").expect("directive pattern is a valid regex"));

/// Generator reply split into embedded `[[command]]` directives and the text
/// left for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Directive bodies, trimmed, left to right.
    pub directives: Vec<String>,
    pub visible: String,
}

/// Pull every `[[...]]` directive out of `reply`.
pub fn extract(reply: &str) -> Extracted {
    let directives = DIRECTIVE
        .captures_iter(reply)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    let stripped = DIRECTIVE.replace_all(reply, "");
    let visible = stripped
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Extracted {
        directives,
        visible,
    }
}

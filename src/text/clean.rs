use regex::Regex;
use std::sync::OnceLock;

fn pictographic() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\p{Extended_Pictographic}").ok())
        .as_ref()
}

/// Characters that render as blank space but are not ASCII spaces.
fn is_space_like(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

/// Zero-width and invisible characters, including the emoji variation selector
/// that is left behind once a pictograph is stripped.
fn is_invisible(ch: char) -> bool {
    matches!(
        ch,
        '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{FE0F}'
    )
}

/// Normalizes text before it is tokenized or sent to the remote service.
///
/// Line endings become `\n`, exotic spaces become plain spaces, zero-width
/// characters and pictographic symbols are dropped, and whitespace runs are
/// collapsed to a single space.
pub fn clean_text(text: &str) -> String {
    let normalized: String = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|ch| !is_invisible(*ch))
        .map(|ch| if is_space_like(ch) { ' ' } else { ch })
        .collect();

    let stripped = match pictographic() {
        Some(re) => re.replace_all(&normalized, "").into_owned(),
        None => normalized,
    };

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

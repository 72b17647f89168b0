use serde::Serialize;

/// Display text split around the optimal recognition point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrpSplit {
    pub before: String,
    pub focal: String,
    pub after: String,
}

/// Character index of the fixation letter inside a single word.
pub fn orp_index(word: &str) -> usize {
    let clean_len = word.chars().filter(|c| c.is_ascii_alphanumeric()).count();
    match clean_len {
        0 | 1 => 0,
        2 | 3 => 1,
        n => (n as f64 * 0.3).floor() as usize,
    }
}

fn split_word(word: &str, orp: usize) -> (String, String, String) {
    let chars: Vec<char> = word.chars().collect();
    let before: String = chars.iter().take(orp).collect();
    let focal: String = chars.get(orp).map(|c| c.to_string()).unwrap_or_default();
    let after: String = chars.iter().skip(orp + 1).collect();
    (before, focal, after)
}

/// Splits a display step for rendering. Multi-word steps fixate on the middle
/// word; a middle word of two characters or fewer gets no focal letter.
pub fn split_orp(text: &str) -> OrpSplit {
    if text.is_empty() {
        return OrpSplit::default();
    }

    let parts: Vec<&str> = text.split(' ').collect();
    if parts.len() > 1 {
        let mid = parts.len() / 2;
        let target = parts[mid];
        if target.chars().count() <= 2 {
            return OrpSplit {
                before: text.to_string(),
                ..OrpSplit::default()
            };
        }

        let (head, focal, tail) = split_word(target, orp_index(target));
        let before_words = parts[..mid].join(" ");
        let after_words = parts[mid + 1..].join(" ");

        let before = if before_words.is_empty() {
            head
        } else {
            format!("{before_words} {head}")
        };
        let after = if after_words.is_empty() {
            tail
        } else {
            format!("{tail} {after_words}")
        };
        return OrpSplit {
            before,
            focal,
            after,
        };
    }

    let (before, focal, after) = split_word(text, orp_index(text));
    OrpSplit {
        before,
        focal,
        after,
    }
}

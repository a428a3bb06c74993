//! Small scanning helpers shared by the route, parameter and response extractors.
//!
//! None of these understand JavaScript. Delimiters are counted byte by byte, so a
//! brace inside a string or template literal can still throw the count off.

/// Find the byte index of the delimiter closing the one at `open_idx`.
///
/// Works for `(`, `[` and `{`. Returns `None` when `open_idx` is not an opening
/// delimiter or the text ends before the depth returns to zero.
pub fn find_matching(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let open = *bytes.get(open_idx)?;
    let close = match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };

    let mut depth = 0usize;
    for (offset, &byte) in bytes[open_idx..].iter().enumerate() {
        if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(open_idx + offset);
            }
        }
    }
    None
}

/// Split `text` on `separator` wherever it appears outside brackets and quotes.
pub fn split_top_level<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let sep = separator.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if let Some(q) = quote {
            if byte == b'\\' {
                i += 2;
                continue;
            }
            if byte == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match byte {
            b'\'' | b'"' | b'`' => quote = Some(byte),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(sep) => {
                parts.push(&text[start..i]);
                i += sep.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    parts.push(&text[start..]);
    parts
}

/// 1-based line number of the byte at `idx`.
pub fn line_at(text: &str, idx: usize) -> usize {
    text[..idx.min(text.len())].matches('\n').count() + 1
}

/// `name`, `_private`, `$scope`: no dots, no calls.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Strip one layer of matching quotes (`'`, `"` or backtick).
pub fn unquote(text: &str) -> Option<&str> {
    let text = text.trim();
    let first = text.chars().next()?;
    if text.len() >= 2 && matches!(first, '\'' | '"' | '`') && text.ends_with(first) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

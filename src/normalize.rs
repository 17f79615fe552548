//! Text normalization helpers.
//!
//! Everything here is pure string-in/string-out: HTML stripping and entity
//! decoding for email bodies, reference normalization for identity hashing,
//! and fingerprint keys for product-name comparison.

/// Decodes common HTML entities, including numeric (`&#8377;`) and hex
/// (`&#x20B9;`) forms. Unknown entities are left untouched.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        match after[1..].find(';') {
            // Entity bodies are short; a distant semicolon is not an entity.
            Some(semi) if semi <= 10 => {
                let body = &after[1..1 + semi];
                if let Some(decoded) = decode_entity(body) {
                    out.push_str(&decoded);
                    rest = &after[semi + 2..];
                } else {
                    out.push('&');
                    rest = &after[1..];
                }
            }
            _ => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            num.parse::<u32>().ok()?
        };
        return char::from_u32(code).map(String::from);
    }
    let replacement = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" | "mdash" => "-",
        "hellip" => "...",
        "lsquo" | "rsquo" => "'",
        "ldquo" | "rdquo" => "\"",
        "bull" | "middot" => "-",
        _ => return None,
    };
    Some(replacement.to_string())
}

/// Strips HTML down to readable text. Script and style blocks are removed
/// entirely, block-level tags become line breaks so that table cells and
/// paragraphs stay separable, and entities are decoded.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            // Unterminated tag: drop the remainder.
            rest = "";
            break;
        };
        let tag = &after[..end];
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        rest = &after[end + 1..];
        match name.as_str() {
            "script" | "style" if !tag.starts_with('/') => {
                let close = format!("</{name}");
                // ASCII lowercasing preserves byte offsets.
                if let Some(pos) = rest.to_ascii_lowercase().find(&close) {
                    let tail = &rest[pos..];
                    let skip = tail.find('>').map(|i| pos + i + 1).unwrap_or(rest.len());
                    rest = &rest[skip..];
                } else {
                    rest = "";
                }
            }
            "br" | "p" | "div" | "tr" | "td" | "th" | "li" | "table" | "ul" | "ol" | "h1"
            | "h2" | "h3" | "h4" => out.push('\n'),
            _ => out.push(' '),
        }
    }
    out.push_str(rest);
    collapse_whitespace(&decode_entities(&out))
}

/// Collapses runs of horizontal whitespace, trims every line, and drops
/// empty lines.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut wrote = false;
        for token in line.split_whitespace() {
            if wrote {
                out.push(' ');
            }
            out.push_str(token);
            wrote = true;
        }
        if wrote {
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// Collapses all whitespace to single spaces, yielding one line.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

/// Normalizes an order or tracking reference for identity hashing: strips
/// leading `#`/`:` markers and trailing punctuation, removes every
/// whitespace character, uppercases. Structural separators (hyphens,
/// slashes) are preserved, so cosmetic spellings of one reference all
/// yield the same key.
pub fn normalize_reference(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| c == '#' || c == ':' || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')'))
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Fingerprint key for product names: uppercased ASCII alphanumerics with
/// everything else collapsed to single spaces. Used for item de-duplication
/// and as the input to [`name_similarity`].
pub fn product_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_space = false;
    for character in name.trim().chars() {
        if character.is_ascii_alphanumeric() {
            out.push(character.to_ascii_uppercase());
            previous_space = false;
        } else if !previous_space && !out.is_empty() {
            out.push(' ');
            previous_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Similarity of two product names in [0, 1], computed over their
/// fingerprint keys so that case and punctuation differences do not count
/// against the score.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let key_a = product_key(a);
    let key_b = product_key(b);
    if key_a.is_empty() || key_b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&key_a, &key_b)
}

/// Truncates to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

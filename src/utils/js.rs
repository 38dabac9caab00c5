//! Permissive JavaScript object literal normalization
//!
//! Player pages embed their configuration as a JavaScript object literal:
//! unquoted keys, single-quoted strings, trailing commas and the odd comment.
//! [`js_to_json`] rewrites such a literal into strict JSON so it can be handed
//! to `serde_json`. Only object, array, string, number and keyword literals
//! are understood; anything else is reported as a parse error.

use crate::error::KvsError;

/// Characters of context shown around a parse failure
const FRAGMENT_LEN: usize = 40;

/// Rewrite a JavaScript object literal as JSON
pub fn js_to_json(source: &str) -> Result<String, KvsError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '"' | '\'' => {
                pos = read_string(&chars, pos, &mut out)?;
            }
            '/' if chars.get(pos + 1) == Some(&'/') => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '/' if chars.get(pos + 1) == Some(&'*') => {
                let start = pos;
                pos += 2;
                loop {
                    if pos + 1 >= chars.len() {
                        return Err(syntax_error(&chars, start, "unterminated comment"));
                    }
                    if chars[pos] == '*' && chars[pos + 1] == '/' {
                        pos += 2;
                        break;
                    }
                    pos += 1;
                }
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                out.push(c);
                pos += 1;
            }
            '{' | '[' | ':' | ',' => {
                out.push(c);
                pos += 1;
            }
            c if c.is_whitespace() => {
                out.push(c);
                pos += 1;
            }
            c if is_ident_start(c) => {
                let start = pos;
                while pos < chars.len() && is_ident_part(chars[pos]) {
                    pos += 1;
                }
                let ident: String = chars[start..pos].iter().collect();
                if next_significant(&chars, pos) == Some(':') {
                    push_json_string(&ident, &mut out);
                } else {
                    match ident.as_str() {
                        "true" | "false" | "null" => out.push_str(&ident),
                        "undefined" | "NaN" | "Infinity" => out.push_str("null"),
                        _ => push_json_string(&ident, &mut out),
                    }
                }
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let start = pos;
                pos += 1;
                while pos < chars.len() {
                    let part = chars[pos];
                    let exponent_sign =
                        (part == '-' || part == '+') && matches!(chars[pos - 1], 'e' | 'E');
                    if !(part.is_ascii_alphanumeric() || part == '.' || exponent_sign) {
                        break;
                    }
                    pos += 1;
                }
                let literal: String = chars[start..pos].iter().collect();
                let number = normalize_number(&literal)
                    .ok_or_else(|| syntax_error(&chars, start, "invalid number literal"))?;
                if next_significant(&chars, pos) == Some(':') {
                    push_json_string(&number, &mut out);
                } else {
                    out.push_str(&number);
                }
            }
            _ => return Err(syntax_error(&chars, pos, "unexpected character")),
        }
    }

    Ok(out)
}

/// Context around a character offset, for error messages
pub fn fragment_at(source: &str, char_offset: usize) -> String {
    source
        .chars()
        .skip(char_offset)
        .take(FRAGMENT_LEN)
        .collect()
}

fn syntax_error(chars: &[char], pos: usize, reason: &str) -> KvsError {
    KvsError::ConfigurationParseError {
        fragment: chars.iter().skip(pos).take(FRAGMENT_LEN).collect(),
        reason: format!("{} at offset {}", reason, pos),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn next_significant(chars: &[char], mut pos: usize) -> Option<char> {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    chars.get(pos).copied()
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

fn push_json_string(value: &str, out: &mut String) {
    out.push('"');
    for c in value.chars() {
        push_escaped(c, out);
    }
    out.push('"');
}

fn push_escaped(c: char, out: &mut String) {
    match c {
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

/// Copy a quoted string starting at `start`, returning the offset after it
fn read_string(chars: &[char], start: usize, out: &mut String) -> Result<usize, KvsError> {
    let quote = chars[start];
    let mut pos = start + 1;
    out.push('"');

    loop {
        let Some(&c) = chars.get(pos) else {
            return Err(syntax_error(chars, start, "unterminated string"));
        };
        pos += 1;

        if c == quote {
            break;
        }
        if c != '\\' {
            push_escaped(c, out);
            continue;
        }

        let Some(&escaped) = chars.get(pos) else {
            return Err(syntax_error(chars, start, "unterminated string"));
        };
        pos += 1;
        match escaped {
            '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' => {
                out.push('\\');
                out.push(escaped);
            }
            'u' => {
                let hex: String = chars.iter().skip(pos).take(4).collect();
                if hex.len() != 4 || !hex.chars().all(|h| h.is_ascii_hexdigit()) {
                    return Err(syntax_error(chars, pos - 2, "invalid unicode escape"));
                }
                out.push_str("\\u");
                out.push_str(&hex);
                pos += 4;
            }
            'x' => {
                let hex: String = chars.iter().skip(pos).take(2).collect();
                let value = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .ok_or_else(|| syntax_error(chars, pos - 2, "invalid hex escape"))?;
                out.push_str(&format!("\\u{:04x}", value));
                pos += 2;
            }
            '0' if !chars.get(pos).map_or(false, char::is_ascii_digit) => {
                out.push_str("\\u0000");
            }
            'v' => out.push_str("\\u000b"),
            // line continuation
            '\n' => {}
            '\r' => {
                if chars.get(pos) == Some(&'\n') {
                    pos += 1;
                }
            }
            other => push_escaped(other, out),
        }
    }

    out.push('"');
    Ok(pos)
}

fn normalize_number(literal: &str) -> Option<String> {
    let (negative, body) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal.strip_prefix('+').unwrap_or(literal)),
    };
    let sign = if negative { "-" } else { "" };

    let radix = match body.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let value = i64::from_str_radix(&body[2..], radix).ok()?;
        return Some(format!("{}{}", sign, value));
    }

    let value: f64 = body.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    if body.contains(['.', 'e', 'E']) {
        let mut text = body.to_string();
        if text.starts_with('.') {
            text.insert(0, '0');
        }
        if text.ends_with('.') {
            text.pop();
        }
        Some(format!("{}{}", sign, text))
    } else {
        let trimmed = body.trim_start_matches('0');
        Some(format!(
            "{}{}",
            sign,
            if trimmed.is_empty() { "0" } else { trimmed }
        ))
    }
}

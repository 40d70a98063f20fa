//! Structured-output extraction.
//!
//! Recovers a JSON object from free-form model text. Models wrap JSON in
//! markdown fences, surround it with prose, emit trailing commas, typographic
//! quotes, and raw newlines inside strings. Extraction runs a fixed ladder of
//! increasingly aggressive repairs and stops at the first strict parse that
//! succeeds:
//!
//! 1. strip the fence markers wrapping the object
//! 2. take the span from the first `{` to the last `}`
//! 3. first normalization pass, strict parse
//! 4. second normalization pass, strict parse
//!
//! Schema checks (required fields, types) belong to the caller; see
//! [`extract_as`].

use std::sync::LazyLock;

use ideaforge_types::extraction::{ExtractionFailure, ExtractionResult};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Opening or closing fence, with or without a language tag.
static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"```[A-Za-z0-9_+\-]*") {
    Ok(regex) => regex,
    Err(err) => panic!("fence regex is invalid: {err}"),
});

const LEFT_DOUBLE_QUOTE: char = '\u{201C}';
const RIGHT_DOUBLE_QUOTE: char = '\u{201D}';

/// Extract a JSON object record from raw model text.
///
/// Never panics. Returns `Failed(NoJsonFound)` when there is no `{ ... }`
/// span and `Failed(SyntaxInvalid)` when both repair passes fail to produce
/// a parseable object.
pub fn extract(raw: &str) -> ExtractionResult {
    let unfenced = strip_wrapping_fences(raw);

    let Some(span) = object_span(unfenced) else {
        return ExtractionResult::Failed(ExtractionFailure::NoJsonFound);
    };

    let first = normalize_first_pass(span);
    if let Ok(record) = parse_object(&first) {
        return ExtractionResult::Parsed(record);
    }

    let second = normalize_second_pass(&first);
    match parse_object(&second) {
        Ok(record) => ExtractionResult::Parsed(record),
        Err(reason) => {
            tracing::debug!(error = %reason, "JSON repair exhausted");
            ExtractionResult::Failed(ExtractionFailure::SyntaxInvalid(reason))
        }
    }
}

/// Extract and deserialize into `T`.
///
/// A record that parses but does not match `T` (missing required field,
/// wrong type) is reported as `SchemaInvalid`.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractionFailure> {
    let record = extract(raw).into_result()?;
    serde_json::from_value(Value::Object(record))
        .map_err(|e| ExtractionFailure::SchemaInvalid(e.to_string()))
}

/// Drop an opening fence before the first `{` and a closing fence after the
/// last `}`. Fences between the two belong to string content and stay.
fn strip_wrapping_fences(raw: &str) -> &str {
    let mut text = raw;

    if let Some(open) = FENCE_REGEX.find(text) {
        let opens_before_object = text.find('{').is_none_or(|brace| open.start() < brace);
        if opens_before_object {
            text = &text[open.end()..];
        }
    }

    let tail_start = text.rfind('}').unwrap_or(0);
    if let Some(close) = text[tail_start..].find("```") {
        text = &text[..tail_start + close];
    }
    text
}

/// First `{` through last `}`, inclusive. Not a balanced-brace scan.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, found {}", kind_of(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Normalization passes
// ---------------------------------------------------------------------------

/// Trailing commas, smart quotes, raw control characters inside strings.
///
/// Valid JSON passes through unchanged: smart quotes are only treated as
/// delimiters outside string literals, and a string opened with a smart quote
/// is closed by one.
fn normalize_first_pass(span: &str) -> String {
    let chars: Vec<char> = span.chars().collect();
    let mut out = String::with_capacity(span.len() + 16);

    let mut in_string = false;
    let mut smart_delimited = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' if !smart_delimited => {
                    out.push('"');
                    in_string = false;
                }
                '"' => out.push_str("\\\""),
                LEFT_DOUBLE_QUOTE | RIGHT_DOUBLE_QUOTE if smart_delimited => {
                    out.push('"');
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                out.push('"');
                in_string = true;
                smart_delimited = false;
            }
            LEFT_DOUBLE_QUOTE | RIGHT_DOUBLE_QUOTE => {
                out.push('"');
                in_string = true;
                smart_delimited = true;
            }
            ',' if closes_after_whitespace(&chars[i + 1..]) => {}
            c => out.push(c),
        }
    }

    out
}

/// Whitespace runs, escaped-newline artifacts, spacing around `:`, and any
/// trailing commas the first pass could not see.
///
/// String literal contents are left alone.
fn normalize_second_pass(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                out.push('"');
                in_string = true;
                i += 1;
            }
            // Literal backslash-n (and friends) outside a string is an
            // artifact of double-escaped output.
            '\\' if matches!(chars.get(i + 1), Some('n' | 't' | 'r')) => {
                push_space(&mut out);
                i += 2;
            }
            c if c.is_whitespace() => {
                push_space(&mut out);
                i += 1;
            }
            ':' => {
                trim_trailing_space(&mut out);
                out.push(':');
                i += 1;
                i += count_insignificant(&chars[i..]);
            }
            ',' => {
                let skip = count_insignificant(&chars[i + 1..]);
                if !matches!(chars.get(i + 1 + skip), Some('}' | ']')) {
                    trim_trailing_space(&mut out);
                    out.push(',');
                }
                i += 1;
            }
            '}' | ']' => {
                trim_trailing_space(&mut out);
                out.push(c);
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out.trim().to_string()
}

/// Whether the next non-whitespace character closes an object or array.
fn closes_after_whitespace(rest: &[char]) -> bool {
    rest.iter()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| matches!(c, '}' | ']'))
}

/// Number of leading whitespace chars and backslash-escape artifacts.
fn count_insignificant(rest: &[char]) -> usize {
    let mut n = 0;
    while n < rest.len() {
        if rest[n].is_whitespace() {
            n += 1;
        } else if rest[n] == '\\' && matches!(rest.get(n + 1), Some('n' | 't' | 'r')) {
            n += 2;
        } else {
            break;
        }
    }
    n
}

fn push_space(out: &mut String) {
    if !out.ends_with(' ') {
        out.push(' ');
    }
}

fn trim_trailing_space(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

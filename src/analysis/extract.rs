//! Pulling a JSON value out of free-form model output.
//!
//! Strategies run in [`Strategy::ORDER`]. Each one proposes a candidate
//! substring; the first candidate that parses (directly, or after
//! [`sanitize`]) wins.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref FENCE_RE: Regex = Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap();
    static ref TRAILING_COMMA_RE: Regex = Regex::new(r",\s*([}\]])").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Body of the first triple-backtick block, optionally tagged `json`.
    FencedBlock,
    /// First brace-balanced `{...}`.
    FirstObject,
    /// First bracket-balanced `[...]`.
    FirstArray,
    /// Everything from the first `{` to the last `}`.
    BraceSlice,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::FencedBlock,
        Strategy::FirstObject,
        Strategy::FirstArray,
        Strategy::BraceSlice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::FencedBlock => "fenced_block",
            Strategy::FirstObject => "first_object",
            Strategy::FirstArray => "first_array",
            Strategy::BraceSlice => "brace_slice",
        }
    }

    pub fn extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            Strategy::FencedBlock => fenced_block(text),
            Strategy::FirstObject => balanced(text, '{', '}'),
            Strategy::FirstArray => balanced(text, '[', ']'),
            Strategy::BraceSlice => brace_slice(text),
        }
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let body = FENCE_RE.captures(text)?.get(1)?.as_str().trim();
    (!body.is_empty()).then_some(body)
}

/// Scans from the first `open` to its matching `close`, skipping anything
/// inside double-quoted strings.
fn balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

fn brace_slice(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}

/// Replaces typographic quotes with ASCII ones and drops trailing commas.
pub fn sanitize(candidate: &str) -> String {
    let straightened: String = candidate
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();
    TRAILING_COMMA_RE.replace_all(&straightened, "$1").into_owned()
}

/// Parses `candidate` as-is, then once more after [`sanitize`].
pub fn parse_lenient(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&sanitize(candidate)).ok())
}

/// Runs every strategy in order and returns the first candidate that parses.
pub fn extract_json(text: &str) -> Option<(Strategy, Value)> {
    Strategy::ORDER.iter().find_map(|strategy| {
        let candidate = strategy.extract(text)?;
        parse_lenient(candidate).map(|v| (*strategy, v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_block_with_and_without_tag() {
        let tagged = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(Strategy::FencedBlock.extract(tagged), Some("{\"a\": 1}"));

        let bare = "```\n[1, 2]\n```";
        assert_eq!(Strategy::FencedBlock.extract(bare), Some("[1, 2]"));

        let upper = "```JSON\n{\"b\": 2}```";
        assert_eq!(Strategy::FencedBlock.extract(upper), Some("{\"b\": 2}"));

        assert_eq!(Strategy::FencedBlock.extract("no fences here"), None);
    }

    #[test]
    fn first_object_is_balanced_and_string_aware() {
        let text = r#"prefix {"reasoning": "use } carefully", "n": {"x": 1}} then {"other": 2}"#;
        assert_eq!(
            Strategy::FirstObject.extract(text),
            Some(r#"{"reasoning": "use } carefully", "n": {"x": 1}}"#)
        );
        assert_eq!(Strategy::FirstObject.extract("{ never closed"), None);
    }

    #[test]
    fn first_array_is_balanced() {
        let text = r#"tips: [{"content": "a"}, {"content": "b ]"}] and [9]"#;
        assert_eq!(
            Strategy::FirstArray.extract(text),
            Some(r#"[{"content": "a"}, {"content": "b ]"}]"#)
        );
    }

    #[test]
    fn brace_slice_spans_first_to_last() {
        assert_eq!(Strategy::BraceSlice.extract("x {a} y {b} z"), Some("{a} y {b}"));
        assert_eq!(Strategy::BraceSlice.extract("} backwards {"), None);
    }

    #[test]
    fn extract_json_recovers_fenced_object_exactly() {
        let text = "```\n{\"prediction\":\"Safe\",\"reasoning\":\"ok\"}\n```";
        let (strategy, value) = extract_json(text).unwrap();
        assert_eq!(strategy, Strategy::FencedBlock);
        assert_eq!(value, json!({"prediction": "Safe", "reasoning": "ok"}));
    }

    #[test]
    fn sanitizer_handles_smart_quotes_and_trailing_commas() {
        let text = "Result: {\u{201C}prediction\u{201D}: \u{201C}Safe\u{201D}, \u{201C}reasoning\u{201D}: \u{201C}ok\u{201D},}";
        let (strategy, value) = extract_json(text).unwrap();
        assert_eq!(strategy, Strategy::FirstObject);
        assert_eq!(value, json!({"prediction": "Safe", "reasoning": "ok"}));
    }

    #[test]
    fn falls_through_to_later_strategies() {
        // Fenced block holds prose, so the object outside it is used.
        let text = "```\nnot json\n```\n{\"prediction\": \"Risky\", \"reasoning\": \"x\"}";
        let (strategy, value) = extract_json(text).unwrap();
        assert_eq!(strategy, Strategy::FirstObject);
        assert_eq!(value["prediction"], "Risky");
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json("I would avoid this food.").is_none());
    }

    #[test]
    fn strategy_names_are_stable() {
        let names: Vec<_> = Strategy::ORDER.iter().map(Strategy::name).collect();
        assert_eq!(names, ["fenced_block", "first_object", "first_array", "brace_slice"]);
    }
}

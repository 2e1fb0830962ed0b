use super::DefinitionError;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Resolved placeholder (and trailing `key=value` extra) values for one match.
pub type PlaceholderValues = HashMap<String, String>;

/// Reserved capture that swallows the trailing `key=value` run wholesale; the
/// run is re-parsed by `EXTRA_PAIR` after a successful whole-utterance match.
const EXTRAS_GROUP: &str = "__extras";

/// value may be double-quoted, single-quoted, brace-delimited, or bare.
const EXTRA_PARAMS: &str =
    r#"(?P<__extras>(?:\s+[^\s=]+\s*=\s*(?:"[^"]*"|'[^']*'|\{[^{}]*\}|\S+))*)"#;

static EXTRA_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|(\{[^{}]*\})|(\S+))"#)
        .unwrap_or_else(|e| panic!("extra-pair regex is a compile-time constant: {e}"))
});

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Placeholder { name: String, default: Option<String> },
}

/// A compiled command format: recognizes utterances of one shape and extracts
/// placeholder values. Matching is case-insensitive, spans newlines, tolerates
/// leading/trailing whitespace, and accepts trailing `key=value` extensions.
#[derive(Debug, Clone)]
pub struct PlaceholderPattern {
    format: String,
    regex: Regex,
    placeholders: Vec<(String, Option<String>)>,
}

impl PlaceholderPattern {
    /// Compile one format string. Empty formats, malformed or duplicate
    /// placeholder names are definition errors (callers log and skip).
    pub fn compile(format: &str) -> Result<Self, DefinitionError> {
        if format.trim().is_empty() {
            return Err(DefinitionError::EmptyFormat);
        }

        let segments = parse_segments(format)?;
        let mut placeholders = Vec::new();
        for seg in &segments {
            if let Segment::Placeholder { name, default } = seg {
                if placeholders.iter().any(|(n, _)| n == name) {
                    return Err(DefinitionError::DuplicatePlaceholder { name: name.clone() });
                }
                placeholders.push((name.clone(), default.clone()));
            }
        }

        let pattern = build_pattern(&segments);
        let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;

        Ok(Self {
            format: format.to_string(),
            regex,
            placeholders,
        })
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn is_match(&self, utterance: &str) -> bool {
        self.regex.is_match(utterance)
    }

    /// Match the whole utterance; on success every placeholder resolves to its
    /// capture or its default, and trailing `key=value` extras are folded in.
    pub fn match_utterance(&self, utterance: &str) -> Option<PlaceholderValues> {
        let caps = self.regex.captures(utterance)?;

        let mut values = PlaceholderValues::new();
        for (name, default) in &self.placeholders {
            let value = caps
                .name(name)
                .map(|m| m.as_str().to_string())
                .or_else(|| default.clone());
            if let Some(value) = value {
                values.insert(name.clone(), value);
            }
        }

        if let Some(extras) = caps.name(EXTRAS_GROUP) {
            for pair in EXTRA_PAIR.captures_iter(extras.as_str()) {
                let key = pair[1].to_string();
                let value = pair
                    .get(2)
                    .or_else(|| pair.get(3))
                    .or_else(|| pair.get(4))
                    .or_else(|| pair.get(5))
                    .map(|m| m.as_str().to_string());
                if let Some(value) = value {
                    values.insert(key, value);
                }
            }
        }

        Some(values)
    }
}

fn valid_placeholder_name(name: &str) -> bool {
    if name == EXTRAS_GROUP {
        return false;
    }
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a format string into literal and placeholder segments. A `{{` with
/// no closing `}}` is kept as literal text, since chat formats may contain braces.
fn parse_segments(format: &str) -> Result<Vec<Segment>, DefinitionError> {
    let mut segments = Vec::new();
    let mut rest = format;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }

        let inner = &rest[open + 2..open + 2 + close];
        let (name, default) = match inner.split_once('=') {
            Some((n, d)) => (n.trim(), Some(d.trim().to_string())),
            None => (inner.trim(), None),
        };
        if !valid_placeholder_name(name) {
            return Err(DefinitionError::InvalidPlaceholder {
                name: name.to_string(),
            });
        }
        segments.push(Segment::Placeholder {
            name: name.to_string(),
            default,
        });

        rest = &rest[open + 2 + close + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(segments)
}

/// Assemble the anchored regex. Bare placeholders become non-greedy multi-line
/// captures; a defaulted placeholder and its adjacent whitespace become one
/// optional group, so the utterance may omit the whole span.
fn build_pattern(segments: &[Segment]) -> String {
    let ws_before = |i: usize| {
        i > 0
            && matches!(&segments[i - 1], Segment::Literal(t) if t.ends_with(char::is_whitespace))
    };
    let ws_after = |i: usize| {
        matches!(segments.get(i + 1), Some(Segment::Literal(t)) if t.starts_with(char::is_whitespace))
    };
    let next_is_defaulted = |i: usize| {
        matches!(
            segments.get(i + 1),
            Some(Segment::Placeholder {
                default: Some(_),
                ..
            })
        )
    };
    let prev_is_defaulted = |i: usize| {
        i > 0
            && matches!(
                &segments[i - 1],
                Segment::Placeholder {
                    default: Some(_),
                    ..
                }
            )
    };
    let literal_before = |i: usize| {
        i > 0 && matches!(&segments[i - 1], Segment::Literal(t) if !t.trim().is_empty())
    };
    let literal_after = |i: usize| {
        matches!(segments.get(i + 1), Some(Segment::Literal(t)) if !t.trim().is_empty())
    };

    let mut pattern = String::from(r"^\s*");
    for (i, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Literal(text) => {
                // Whitespace adjacent to a defaulted placeholder lives inside
                // its optional group, not in the literal.
                let mut t: &str = text;
                if next_is_defaulted(i) {
                    t = t.trim_end();
                }
                if prev_is_defaulted(i) {
                    t = t.trim_start();
                }
                pattern.push_str(&regex::escape(t));
            }
            Segment::Placeholder { name, default } => {
                if default.is_some() {
                    match (ws_before(i), ws_after(i)) {
                        // Whitespace on both sides: a separator survives an
                        // omitted span only when literal text actually sits
                        // on both sides; between consecutive optional spans
                        // a required gap would reject the bare form.
                        (true, true) => {
                            let sep = match (literal_before(i), literal_after(i)) {
                                (true, true) => r"\s+",
                                (false, true) => r"\s*",
                                _ => "",
                            };
                            pattern.push_str(&format!(r"(?:\s+(?P<{name}>[\s\S]+?))?{sep}"));
                        }
                        (true, false) => {
                            pattern.push_str(&format!(r"(?:\s+(?P<{name}>[\s\S]+?))?"));
                        }
                        (false, true) => {
                            pattern.push_str(&format!(r"(?:(?P<{name}>[\s\S]+?)\s+)?"));
                        }
                        (false, false) => {
                            pattern.push_str(&format!(r"(?:(?P<{name}>[\s\S]+?))?"));
                        }
                    }
                } else {
                    pattern.push_str(&format!(r"\s*(?P<{name}>[\s\S]+?)\s*"));
                }
            }
        }
    }
    pattern.push_str(EXTRA_PARAMS);
    pattern.push_str(r"\s*$");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(format: &str) -> PlaceholderPattern {
        PlaceholderPattern::compile(format).expect("format should compile")
    }

    // ── placeholder capture ───────────────────────────────────────

    #[test]
    fn bare_placeholders_capture_values() {
        let p = compile("deploy {{env}} to {{region}}");
        let values = p.match_utterance("deploy staging to eu-west").unwrap();
        assert_eq!(values["env"], "staging");
        assert_eq!(values["region"], "eu-west");
    }

    #[test]
    fn default_resolves_when_value_omitted() {
        let p = compile("deploy {{env}} to {{region=us-east}}");

        let values = p.match_utterance("deploy staging to").unwrap();
        assert_eq!(values["env"], "staging");
        assert_eq!(values["region"], "us-east");

        let values = p.match_utterance("deploy staging to eu-west").unwrap();
        assert_eq!(values["region"], "eu-west");
    }

    #[test]
    fn defaulted_placeholder_mid_format() {
        let p = compile("restart {{service=all}} now");
        let values = p.match_utterance("restart now").unwrap();
        assert_eq!(values["service"], "all");

        let values = p.match_utterance("restart nginx now").unwrap();
        assert_eq!(values["service"], "nginx");
    }

    #[test]
    fn defaulted_placeholder_at_start() {
        let p = compile("{{greeting=hey}} there");
        assert_eq!(p.match_utterance("there").unwrap()["greeting"], "hey");
        assert_eq!(p.match_utterance("yo there").unwrap()["greeting"], "yo");
    }

    #[test]
    fn consecutive_defaulted_placeholders_may_all_be_omitted() {
        let p = compile("restart {{service=all}} {{mode=safe}}");

        let values = p.match_utterance("restart").unwrap();
        assert_eq!(values["service"], "all");
        assert_eq!(values["mode"], "safe");

        let values = p.match_utterance("restart nginx").unwrap();
        assert_eq!(values["service"], "nginx");
        assert_eq!(values["mode"], "safe");

        let values = p.match_utterance("restart nginx fast").unwrap();
        assert_eq!(values["service"], "nginx");
        assert_eq!(values["mode"], "fast");
    }

    #[test]
    fn consecutive_defaulted_placeholders_before_literal() {
        let p = compile("page {{team=ops}} {{level=low}} now");

        let values = p.match_utterance("page now").unwrap();
        assert_eq!(values["team"], "ops");
        assert_eq!(values["level"], "low");

        let values = p.match_utterance("page net high now").unwrap();
        assert_eq!(values["team"], "net");
        assert_eq!(values["level"], "high");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let p = compile("deploy {{env}}");
        let values = p.match_utterance("DEPLOY Staging").unwrap();
        assert_eq!(values["env"], "Staging");
    }

    #[test]
    fn values_may_span_lines() {
        let p = compile("run {{cmd}}");
        let values = p.match_utterance("run ls\n-la /tmp").unwrap();
        assert_eq!(values["cmd"], "ls\n-la /tmp");
    }

    #[test]
    fn surrounding_whitespace_tolerated() {
        let p = compile("status {{svc}}");
        let values = p.match_utterance("  status  api  ").unwrap();
        assert_eq!(values["svc"], "api");
    }

    #[test]
    fn non_matching_utterance_returns_none() {
        let p = compile("deploy {{env}}");
        assert!(p.match_utterance("undeploy staging").is_none());
        assert!(p.match_utterance("deploy").is_none());
    }

    #[test]
    fn multiword_values_allowed() {
        let p = compile("say {{phrase}} loudly");
        let values = p.match_utterance("say hello old friend loudly").unwrap();
        assert_eq!(values["phrase"], "hello old friend");
    }

    // ── trailing key=value extras ─────────────────────────────────

    #[test]
    fn extras_parsed_after_format_content() {
        let p = compile("deploy {{env}}");
        let values = p
            .match_utterance(r#"deploy prod timeout=30 reason="hot fix" opts='a b' data={x: 1}"#)
            .unwrap();
        assert_eq!(values["env"], "prod");
        assert_eq!(values["timeout"], "30");
        assert_eq!(values["reason"], "hot fix");
        assert_eq!(values["opts"], "a b");
        assert_eq!(values["data"], "{x: 1}");
    }

    #[test]
    fn extras_work_with_defaulted_trailing_placeholder_present() {
        let p = compile("deploy {{env}} to {{region=us-east}}");
        let values = p
            .match_utterance("deploy prod to eu-west timeout=30")
            .unwrap();
        assert_eq!(values["region"], "eu-west");
        assert_eq!(values["timeout"], "30");
    }

    #[test]
    fn no_extras_is_fine() {
        let p = compile("deploy {{env}}");
        let values = p.match_utterance("deploy prod").unwrap();
        assert_eq!(values.len(), 1);
    }

    // ── definition errors ─────────────────────────────────────────

    #[test]
    fn empty_format_rejected() {
        assert!(matches!(
            PlaceholderPattern::compile(""),
            Err(DefinitionError::EmptyFormat)
        ));
        assert!(matches!(
            PlaceholderPattern::compile("   "),
            Err(DefinitionError::EmptyFormat)
        ));
    }

    #[test]
    fn duplicate_placeholder_rejected() {
        assert!(matches!(
            PlaceholderPattern::compile("copy {{src}} {{src}}"),
            Err(DefinitionError::DuplicatePlaceholder { name }) if name == "src"
        ));
    }

    #[test]
    fn invalid_placeholder_name_rejected() {
        assert!(matches!(
            PlaceholderPattern::compile("run {{my cmd}}"),
            Err(DefinitionError::InvalidPlaceholder { .. })
        ));
        assert!(matches!(
            PlaceholderPattern::compile("run {{1st}}"),
            Err(DefinitionError::InvalidPlaceholder { .. })
        ));
    }

    #[test]
    fn unterminated_braces_are_literal_text() {
        let p = compile("show {{ stats");
        assert!(p.is_match("show {{ stats"));
        assert!(!p.is_match("show stats"));
    }

    #[test]
    fn literal_regex_metacharacters_are_escaped() {
        let p = compile("calc (a+b)*c {{x}}");
        let values = p.match_utterance("calc (a+b)*c 42").unwrap();
        assert_eq!(values["x"], "42");
        assert!(p.match_utterance("calc aab)*c 42").is_none());
    }
}

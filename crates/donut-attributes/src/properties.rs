//! Line-oriented `key=value` property parsing.
//!
//! Custom attributes are authored as a small property block. Before the block
//! is parsed every unescaped run of spaces/tabs is turned into an escaped
//! space, so authors can write `title=Nightly Run` without escaping anything.

use std::collections::BTreeMap;

use crate::error::AttributeError;

/// Attribute name to value, sorted by name.
pub type Attributes = BTreeMap<String, String>;

/// Replace every unescaped run of spaces/tabs with a single `\ `.
///
/// A run preceded by an odd number of backslashes is already escaped and is
/// copied through untouched, so `escape_whitespace(escape_whitespace(s))`
/// equals `escape_whitespace(s)`. Runs at the start of a line are escaped
/// too, so an indented `# note` becomes the key `# note` rather than a
/// comment.
pub fn escape_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut chars = raw.chars().peekable();
    let mut backslashes = 0usize;

    while let Some(c) = chars.next() {
        if c == ' ' || c == '\t' {
            let mut run = String::from(c);
            while let Some(&next) = chars.peek() {
                if next != ' ' && next != '\t' {
                    break;
                }
                run.push(next);
                chars.next();
            }

            if backslashes % 2 == 1 {
                out.push_str(&run);
            } else {
                out.push_str("\\ ");
            }
            backslashes = 0;
            continue;
        }

        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
        out.push(c);
    }

    out
}

/// Parse a raw custom-attribute block.
///
/// Whitespace is escaped first (see [`escape_whitespace`]), then the text is
/// read with property-file rules: `#`/`!` comments, `\` continuations, `=`,
/// `:` or whitespace as the key/value separator, and the usual escapes.
pub fn parse(raw: &str) -> Result<Attributes, AttributeError> {
    parse_properties(&escape_whitespace(raw))
}

/// Parse property text as-is, without the whitespace escaping step.
pub fn parse_properties(text: &str) -> Result<Attributes, AttributeError> {
    let mut attributes = Attributes::new();

    for line in logical_lines(text)? {
        let (key, value) = split_entry(&line.text, line.number)?;
        attributes.insert(key, value);
    }

    Ok(attributes)
}

struct LogicalLine {
    /// 1-based number of the natural line the entry starts on.
    number: usize,
    text: String,
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\u{000C}'
}

/// Split on `\n`, `\r` and `\r\n`. Text ending in a terminator yields a
/// trailing empty line.
fn natural_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    lines.push(&text[start..]);

    lines
}

fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn logical_lines(text: &str) -> Result<Vec<LogicalLine>, AttributeError> {
    let naturals = natural_lines(text);
    let mut lines = Vec::new();
    let mut next = 0;

    while next < naturals.len() {
        let number = next + 1;
        let first = naturals[next].trim_start_matches(is_blank);
        next += 1;

        if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
            continue;
        }

        let mut joined = String::new();
        let mut current = first;
        while continues(current) {
            joined.push_str(&current[..current.len() - 1]);
            match naturals.get(next) {
                Some(following) => {
                    current = following.trim_start_matches(is_blank);
                    next += 1;
                }
                None => {
                    return Err(AttributeError::MalformedSpec {
                        line: next,
                        reason: "dangling escape at end of input".to_string(),
                    });
                }
            }
        }
        joined.push_str(current);

        lines.push(LogicalLine {
            number,
            text: joined,
        });
    }

    Ok(lines)
}

fn split_entry(line: &str, number: usize) -> Result<(String, String), AttributeError> {
    let chars: Vec<char> = line.chars().collect();
    let mut key_end = chars.len();
    let mut value_start = chars.len();
    let mut has_separator = false;
    let mut escaped = false;

    for (idx, &c) in chars.iter().enumerate() {
        if !escaped && (c == '=' || c == ':') {
            key_end = idx;
            value_start = idx + 1;
            has_separator = true;
            break;
        }
        if !escaped && is_blank(c) {
            key_end = idx;
            value_start = idx + 1;
            break;
        }
        escaped = c == '\\' && !escaped;
    }

    while let Some(&c) = chars.get(value_start) {
        if !is_blank(c) {
            if has_separator || (c != '=' && c != ':') {
                break;
            }
            has_separator = true;
        }
        value_start += 1;
    }

    let key = unescape(&chars[..key_end], number)?;
    let value = unescape(&chars[value_start..], number)?;

    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn malformed(line: usize, reason: &str) -> AttributeError {
    AttributeError::MalformedSpec {
        line,
        reason: reason.to_string(),
    }
}

fn read_code_unit(chars: &[char], at: usize, line: usize) -> Result<u32, AttributeError> {
    let digits = chars
        .get(at..at + 4)
        .ok_or_else(|| malformed(line, "malformed \\uxxxx encoding"))?;

    digits.iter().try_fold(0u32, |acc, c| {
        c.to_digit(16)
            .map(|d| acc * 16 + d)
            .ok_or_else(|| malformed(line, "malformed \\uxxxx encoding"))
    })
}

fn unescape(chars: &[char], line: usize) -> Result<String, AttributeError> {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(&next) = chars.get(i) else {
            return Err(malformed(line, "dangling escape at end of entry"));
        };
        i += 1;

        match next {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\u{000C}'),
            'u' => {
                let unit = read_code_unit(chars, i, line)?;
                i += 4;

                // High surrogate: pair it with a following `\uDCxx`.
                let scalar = if (0xD800..0xDC00).contains(&unit)
                    && chars.get(i) == Some(&'\\')
                    && chars.get(i + 1) == Some(&'u')
                {
                    let low = read_code_unit(chars, i + 2, line)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(malformed(line, "unpaired surrogate in \\uxxxx encoding"));
                    }
                    i += 6;
                    0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    unit
                };

                let decoded = char::from_u32(scalar)
                    .ok_or_else(|| malformed(line, "unpaired surrogate in \\uxxxx encoding"))?;
                out.push(decoded);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_replaces_runs_with_single_escaped_space() {
        assert_eq!(escape_whitespace("title=Nightly Run"), "title=Nightly\\ Run");
        assert_eq!(escape_whitespace("a=b \t  c"), "a=b\\ c");
    }

    #[test]
    fn test_escape_is_idempotent() {
        let once = escape_whitespace("owner=Platform Team   East");
        let twice = escape_whitespace(&once);
        assert_eq!(once, twice);
        assert_eq!(escape_whitespace("a=b\\ c"), "a=b\\ c");
    }

    #[test]
    fn test_escape_after_escaped_backslash() {
        // `\\` is a literal backslash, so the space after it is not escaped yet.
        assert_eq!(escape_whitespace("dir=C:\\\\ x"), "dir=C:\\\\\\ x");
    }

    #[test]
    fn test_escape_covers_indentation() {
        assert_eq!(
            escape_whitespace("  # note\n   \nk=v"),
            "\\ #\\ note\n\\ \nk=v"
        );
        assert_eq!(
            escape_whitespace("\towner=a b"),
            "\\ owner=a\\ b"
        );
    }

    #[test]
    fn test_parse_simple_entries() {
        let attrs = parse("owner=platform\ntitle=Nightly Run").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["owner"], "platform");
        assert_eq!(attrs["title"], "Nightly Run");
    }

    #[test]
    fn test_parse_skips_comments_and_empty_lines() {
        let raw = "# comment\n! bang comment\n\nenv=staging\n";
        let attrs = parse(raw).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["env"], "staging");
    }

    #[test]
    fn test_parse_keeps_indented_and_whitespace_only_lines() {
        let attrs = parse("  # note\n   \nk=v").unwrap();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["# note"], "");
        assert_eq!(attrs[""], "");
        assert_eq!(attrs["k"], "v");
    }

    #[test]
    fn test_parse_colon_separator_and_crlf() {
        let attrs = parse("team:qa\r\nregion:eu\rtier:gold").unwrap();
        assert_eq!(attrs["team"], "qa");
        assert_eq!(attrs["region"], "eu");
        assert_eq!(attrs["tier"], "gold");
    }

    #[test]
    fn test_parse_spaced_separator_is_trimmed() {
        let attrs = parse("owner = platform").unwrap();
        assert_eq!(attrs["owner"], "platform");
    }

    #[test]
    fn test_parse_continuation_lines() {
        let attrs = parse("description=first \\\n    second").unwrap();
        // Both the run before the `\` and the continuation indent are escaped.
        assert_eq!(attrs["description"], "first  second");
    }

    #[test]
    fn test_parse_key_without_value() {
        let attrs = parse("flag").unwrap();
        assert_eq!(attrs["flag"], "");
    }

    #[test]
    fn test_parse_duplicate_key_last_wins() {
        let attrs = parse("env=dev\nenv=prod").unwrap();
        assert_eq!(attrs["env"], "prod");
    }

    #[test]
    fn test_parse_escapes() {
        let attrs = parse("path=a\\=b\nsym=\\u00e9t\\u00e9\nemoji=\\uD83D\\uDE00").unwrap();
        assert_eq!(attrs["path"], "a=b");
        assert_eq!(attrs["sym"], "été");
        assert_eq!(attrs["emoji"], "😀");
    }

    #[test]
    fn test_parse_keeps_placeholders_verbatim() {
        let attrs = parse("owner=${TEAM}").unwrap();
        assert_eq!(attrs["owner"], "${TEAM}");
    }

    #[test]
    fn test_parse_dangling_escape_is_malformed() {
        let err = parse("owner=${TEAM\\").unwrap_err();
        assert!(matches!(err, AttributeError::MalformedSpec { line: 1, .. }));
    }

    #[test]
    fn test_parse_bad_unicode_escape_is_malformed() {
        let err = parse("a=1\nowner=${TEAM\\u12").unwrap_err();
        match err {
            AttributeError::MalformedSpec { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("\\uxxxx"));
            }
        }
        assert!(parse("x=\\uZZZZ").is_err());
    }

    #[test]
    fn test_parse_trailing_continuation_before_newline_is_fine() {
        let attrs = parse("a=b\\\n").unwrap();
        assert_eq!(attrs["a"], "b");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").unwrap().is_empty());
    }
}

//! POSIX-style shell quoting for argv display and for values that are
//! embedded textually (e.g. the Ollama `env KEY=value` prefix).

const SPECIAL_CHARS: &[char] = &[
    ' ', '\t', '\n', '\r', '\'', '"', '\\', '$', '&', ';', '|', '>', '<', '(', ')', '*', '?', '[',
    ']', '{', '}', '!', '#',
];

/// Returns true if `v` must be single-quoted to survive a shell round-trip.
pub fn needs_quoting(v: &str) -> bool {
    v.is_empty() || v.chars().any(|c| SPECIAL_CHARS.contains(&c))
}

/// Single-quotes `v`, escaping embedded single quotes via the standard
/// `'"'"'` sequence. The empty string quotes to `''`.
pub fn shell_quote(v: &str) -> String {
    if v.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(v.len() + 2);
    out.push('\'');
    for c in v.chars() {
        if c == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Quotes `v` only if needed (§4.1); otherwise returns it unchanged.
pub fn maybe_quote(v: &str) -> String {
    if needs_quoting(v) {
        shell_quote(v)
    } else {
        v.to_string()
    }
}

/// Display-quoting for dry-run output (§4.2): double-quote with `\"`/`\\`
/// escapes, used only when printing an assembled command line for humans,
/// never for building the real argv.
pub fn display_quote(v: &str) -> String {
    if v.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        let mut out = String::with_capacity(v.len() + 2);
        out.push('"');
        for c in v.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_quotes_to_empty_quotes() {
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
    }

    #[test]
    fn plain_tokens_need_no_quoting() {
        assert!(!needs_quoting("gpt-4"));
        assert!(needs_quoting("hello world"));
        assert!(needs_quoting(""));
    }

    #[test]
    fn display_quote_escapes_quotes_and_backslashes() {
        assert_eq!(display_quote(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(display_quote("plain"), "plain");
    }

    /// Reverses [`shell_quote`] exactly, standing in for a POSIX shell
    /// parser for the purpose of P3 (shell-safety round-trip).
    fn unquote(quoted: &str) -> String {
        let inner = quoted
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .expect("well-formed single-quoted string");
        inner.replace("'\"'\"'", "'")
    }

    #[test]
    fn shell_round_trip_for_special_characters() {
        // P3: a POSIX shell parser reconstructs the original value.
        for original in [
            "value with spaces & \"quotes\"",
            "it's got an apostrophe",
            "semi;colon|pipe>redirect",
            "",
        ] {
            let quoted = shell_quote(original);
            assert_eq!(unquote(&quoted), original);
        }
    }
}

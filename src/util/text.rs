use std::borrow::Cow;

/// Removes control characters and ANSI escape sequences from untrusted text.
///
/// Catalog names and feed metadata come from third parties and end up in
/// log lines, so escape sequences are dropped entirely. Tab, newline and
/// carriage return are kept.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s.chars().any(is_stripped);
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                // CSI: ESC [ params... final byte in 0x40..=0x7e
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: ESC ] ... terminated by BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                // Two-byte escape
                Some(_) => {
                    chars.next();
                }
                None => {}
            }
            continue;
        }

        if !is_stripped(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

fn is_stripped(c: char) -> bool {
    (c.is_control() && c != '\t' && c != '\n' && c != '\r') || c == '\x1b'
}

/// Normalizes an optional free-text value.
///
/// Trims, strips control characters, and maps blank results to `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    let cleaned = strip_control_chars(value?.trim());
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "Hello, world! This is clean text.";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_preserves_tabs_newlines_cr() {
        let input = "line1\nline2\ttabbed\r\nwindows";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_removes_c0_and_del() {
        assert_eq!(strip_control_chars("he\x00ll\x07o\x7f"), "hello");
    }

    #[test]
    fn test_strip_ansi_sequences() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
    }

    #[test]
    fn test_strip_keeps_unicode() {
        assert_eq!(strip_control_chars("Zażółć 世界"), "Zażółć 世界");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("")), None);
        assert_eq!(non_blank(Some("  \t ")), None);
        assert_eq!(non_blank(Some("\x07")), None);
        assert_eq!(non_blank(Some("  @ann ")), Some("@ann".to_string()));
    }
}

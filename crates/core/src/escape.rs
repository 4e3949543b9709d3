//! Backslash escape expansion for literal send-text arguments
//!
//! Lets users write control codes on the command line: `\x1b[A`, `\u21fa`,
//! `\r`, `\e`. Every escape yields the code point it names; everything else
//! is copied through untouched, including unknown escapes.

use crate::error::{CoreError, Result};

/// Expand escapes in `input`
pub fn expand_escapes(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            // Trailing lone backslash
            out.push('\\');
            break;
        };
        match esc {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            'x' => out.push(hex_escape(&mut chars, 'x', 2)?),
            'u' => out.push(hex_escape(&mut chars, 'u', 4)?),
            'U' => out.push(hex_escape(&mut chars, 'U', 8)?),
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(to_char(value, 'o')?);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    kind: char,
    digits: usize,
) -> Result<char> {
    let mut value: u32 = 0;
    for _ in 0..digits {
        let d = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| CoreError::InvalidEscape(format!("truncated \\{}XX escape", kind)))?;
        value = value * 16 + d;
    }
    to_char(value, kind)
}

fn to_char(value: u32, kind: char) -> Result<char> {
    char::from_u32(value)
        .ok_or_else(|| CoreError::InvalidEscape(format!("\\{} escape out of range: {:#x}", kind, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(expand_escapes("hello wörld").unwrap(), "hello wörld");
    }

    #[test]
    fn test_control_escapes() {
        assert_eq!(expand_escapes(r"ls\r").unwrap(), "ls\r");
        assert_eq!(expand_escapes(r"\x1b[A").unwrap(), "\x1b[A");
        assert_eq!(expand_escapes(r"\e\t\n").unwrap(), "\x1b\t\n");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(expand_escapes(r"\u21fa").unwrap(), "\u{21fa}");
        assert_eq!(expand_escapes(r"\U0001f600").unwrap(), "\u{1f600}");
    }

    #[test]
    fn test_hex_escape_is_code_point() {
        // \xe9 is U+00E9, two bytes once UTF-8 encoded
        let expanded = expand_escapes(r"caf\xe9").unwrap();
        assert_eq!(expanded, "café");
        assert_eq!(expanded.len(), 5);
    }

    #[test]
    fn test_octal_escapes() {
        assert_eq!(expand_escapes(r"\0").unwrap(), "\0");
        assert_eq!(expand_escapes(r"\033[0m").unwrap(), "\x1b[0m");
        assert_eq!(expand_escapes(r"\1018").unwrap(), "A8");
    }

    #[test]
    fn test_unknown_escape_kept() {
        assert_eq!(expand_escapes(r"C:\path\q").unwrap(), r"C:\path\q");
        assert_eq!(expand_escapes("end\\").unwrap(), "end\\");
    }

    #[test]
    fn test_truncated_escape_fails() {
        assert!(matches!(expand_escapes(r"\x1"), Err(CoreError::InvalidEscape(_))));
        assert!(matches!(expand_escapes(r"\u12g4"), Err(CoreError::InvalidEscape(_))));
    }

    #[test]
    fn test_surrogate_rejected() {
        assert!(matches!(expand_escapes(r"\ud800"), Err(CoreError::InvalidEscape(_))));
    }
}

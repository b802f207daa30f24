use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of a string in terminal columns.
///
/// ```
/// use appcast_reader::util::display_width;
///
/// assert_eq!(display_width("Update"), 6);
/// assert_eq!(display_width("更新"), 4);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn is_stripped_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Appcast titles and descriptions are attacker-controlled text that ends up
/// on a terminal. Removes CSI sequences (`ESC [` ... final byte), OSC
/// sequences (`ESC ]` ... BEL or `ESC \`), bare ESC and every other control
/// character except tab, newline and carriage return.
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes up to the final byte
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
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
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Collapses all whitespace runs, newlines included, into single spaces and
/// trims the ends. Used for table cells.
pub fn one_line(s: &str) -> Cow<'_, str> {
    if s.split_whitespace().eq(s.split(' ')) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Cuts `s` so it fits in `max_width` columns, marking the cut with `...`.
///
/// Widths of three or less have no room for the ellipsis and get a plain cut.
/// Never splits a character; wide characters that would straddle the limit
/// are dropped.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let (budget, suffix) = if max_width > ELLIPSIS_WIDTH {
        (max_width - ELLIPSIS_WIDTH, ELLIPSIS)
    } else {
        (max_width, "")
    };

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{suffix}", &s[..end]))
}

/// Right-pads `s` with spaces to `width` columns. Longer input is returned
/// unchanged.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_width_wide_chars() {
        assert_eq!(display_width("v2.0"), 4);
        assert_eq!(display_width("版本"), 4);
    }

    #[test]
    fn test_truncate_fits_is_borrowed() {
        let result = truncate_to_width("Version 2.0", 20);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "Version 2.0");
        assert_eq!(truncate_to_width("12345", 5), "12345");
    }

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_to_width("Version 2.0 released", 10), "Version...");
        assert_eq!(truncate_to_width("Testing", 4), "T...");
    }

    #[test]
    fn test_truncate_wide_chars() {
        // 版本更新 is 8 columns; budget 7 - 3 = 4 fits two characters
        assert_eq!(truncate_to_width("版本更新", 7), "版本...");
        // budget 6 - 3 = 3 fits one, the second would straddle
        assert_eq!(truncate_to_width("版本更新", 6), "版...");
    }

    #[test]
    fn test_truncate_narrow_widths_without_ellipsis() {
        assert_eq!(truncate_to_width("Test", 0), "");
        assert_eq!(truncate_to_width("Test", 1), "T");
        assert_eq!(truncate_to_width("Test", 3), "Tes");
        assert_eq!(truncate_to_width("版本", 1), "");
        assert_eq!(truncate_to_width("版本", 3), "版");
    }

    #[test]
    fn test_pad_to_width() {
        assert_eq!(pad_to_width("2.0", 5), "2.0  ");
        assert_eq!(pad_to_width("版本", 5), "版本 ");
        assert_eq!(pad_to_width("too long", 3), "too long");
    }

    #[test]
    fn test_one_line() {
        assert!(matches!(one_line("already one line"), Cow::Borrowed(_)));
        assert_eq!(one_line("  Version 2.0\n\n  Bug fixes\t"), "Version 2.0 Bug fixes");
        assert_eq!(one_line("double  space"), "double space");
        assert_eq!(one_line(""), "");
    }

    #[test]
    fn test_strip_clean_text_is_borrowed() {
        let input = "Version 2.0\twith\nnotes\r\n";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_c0_and_del() {
        assert_eq!(strip_control_chars("up\x00da\x07te\x7f!"), "update!");
    }

    #[test]
    fn test_strip_csi_sequences() {
        assert_eq!(strip_control_chars("\x1b[1;31mCritical\x1b[0m fix"), "Critical fix");
        assert_eq!(strip_control_chars("a\x1b[2Ab"), "ab");
    }

    #[test]
    fn test_strip_osc_sequences() {
        assert_eq!(strip_control_chars("\x1b]0;pwned\x07Title"), "Title");
        assert_eq!(strip_control_chars("\x1b]8;;https://evil\x1b\\Title"), "Title");
    }

    #[test]
    fn test_strip_bare_esc() {
        assert_eq!(strip_control_chars("before\x1bafter"), "beforeafter");
    }

    #[test]
    fn test_strip_keeps_unicode() {
        assert_eq!(strip_control_chars("版本 \x1b[32m2.0\x1b[0m"), "版本 2.0");
    }
}

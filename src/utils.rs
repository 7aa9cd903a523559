/// Parses an unsigned integer the way board descriptors write them:
/// `0x`/`$` hex, `0b`/`%` binary, `0o` octal, otherwise decimal.
/// Anything unparseable (including overflow) yields 0.
pub fn numeral(text: &str) -> u32 {
    let text = text.trim();
    let (digits, radix) = if let Some(rest) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
    {
        (rest, 16)
    } else if let Some(rest) = text
        .strip_prefix("0b")
        .or_else(|| text.strip_prefix("0B"))
        .or_else(|| text.strip_prefix('%'))
    {
        (rest, 2)
    } else if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        (rest, 8)
    } else {
        (text, 10)
    };

    u32::from_str_radix(digits, radix).unwrap_or(0)
}

/// Decimal-only counterpart of [`numeral`].
pub fn decimal(text: &str) -> u32 {
    text.trim().parse().unwrap_or(0)
}

/// Splits `text` at the first occurrence of `separator`: one part when the
/// separator is absent, two otherwise.
pub fn split_once_parts<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    match text.split_once(separator) {
        Some((head, tail)) => vec![head, tail],
        None => vec![text],
    }
}

pub fn hexdump(buffer: &[u8], start: usize, end: usize) -> String {
    let end = end.min(buffer.len());
    let mut str = String::new();
    let mut addr = start;
    while addr < end {
        let mut line = format!("{:06x}: ", addr);
        let mut chars = String::new();
        for _ in 0..16 {
            if addr < end {
                let byte = buffer[addr];
                line.push_str(&format!("{:02x} ", byte));
                let c = byte as char;
                chars.push(if c.is_ascii_graphic() || c == ' ' {
                    c
                } else {
                    '.'
                });
                addr += 1;
            }
        }

        let dump_line = format!("{:<56} {}\n", line, chars);
        str.push_str(&dump_line);
    }

    str
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeral_prefixes() {
        assert_eq!(numeral("0x8000"), 0x8000);
        assert_eq!(numeral("$ff"), 0xff);
        assert_eq!(numeral("%1010"), 10);
        assert_eq!(numeral("0b11"), 3);
        assert_eq!(numeral("0o17"), 15);
        assert_eq!(numeral("4096"), 4096);
    }

    #[test]
    fn test_numeral_garbage_is_zero() {
        assert_eq!(numeral(""), 0);
        assert_eq!(numeral("0xzz"), 0);
        assert_eq!(numeral("12k"), 0);
        assert_eq!(numeral("99999999999"), 0);
    }

    #[test]
    fn test_decimal() {
        assert_eq!(decimal("45"), 45);
        assert_eq!(decimal(" 9999 "), 9999);
        assert_eq!(decimal("0x10"), 0);
    }

    #[test]
    fn test_split_once_parts() {
        assert_eq!(split_once_parts("1:30", ":"), vec!["1", "30"]);
        assert_eq!(split_once_parts("45", ":"), vec!["45"]);
        assert_eq!(split_once_parts("a:b:c", ":"), vec!["a", "b:c"]);
    }

    #[test]
    fn test_hexdump() {
        let dump = hexdump(b"AB\x00", 0, 3);
        assert!(dump.starts_with("000000: 41 42 00"));
        assert!(dump.trim_end().ends_with("AB."));
    }
}

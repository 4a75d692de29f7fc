use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Two spaces per nesting level
pub fn get_spaces(level: usize) -> String {
    "  ".repeat(level)
}

/// Parse the leading integer of a string, ignoring whatever follows it.
/// Returns 0 when the string does not start with a number ("0.3048" -> 0,
/// "1.0" -> 1, "meter" -> 0).
pub fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<i64>()
        .map(|v| sign * v)
        .unwrap_or(0)
}

/// "s" when `count` calls for a plural noun
pub fn plural_suffix(count: usize) -> &'static str {
    if count > 1 {
        "s"
    } else {
        ""
    }
}

/// Append `suffix` to a base name without touching its extension:
/// `with_suffix("out", "-reversed.asc")` gives `out-reversed.asc`.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_spaces() {
        assert_eq!(get_spaces(0), "");
        assert_eq!(get_spaces(2), "    ");
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("1"), 1);
        assert_eq!(leading_int("1.0"), 1);
        assert_eq!(leading_int("0.3048006096012192"), 0);
        assert_eq!(leading_int(" -12abc"), -12);
        assert_eq!(leading_int("Meter"), 0);
        assert_eq!(leading_int(""), 0);
    }

    #[test]
    fn test_plural_suffix() {
        assert_eq!(plural_suffix(1), "");
        assert_eq!(plural_suffix(3), "s");
    }

    #[test]
    fn test_with_suffix_keeps_dots() {
        let path = with_suffix(Path::new("dir/grand.canyon"), ".asc");
        assert_eq!(path, PathBuf::from("dir/grand.canyon.asc"));
    }
}

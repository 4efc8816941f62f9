//! Obfuscation decoding for command strings.
//!
//! Decodes a command to its plain form before pattern evaluation so that
//! encoding tricks (`rm%20-rf%20/`, `\x72\x6d -rf /`, `r"m" -rf /`) cannot
//! bypass the blocked-pattern sets. Decoding runs iteratively until a fixed
//! point because obfuscation can nest (e.g. percent-encoded hex escapes).

/// Upper bound on decode rounds. Real commands converge in one or two
/// rounds; the cap keeps adversarial input from looping.
const MAX_DECODE_ROUNDS: usize = 8;

/// Decodes a raw command string to its normalized plain form.
///
/// Applies, per round: percent-decoding, `\xNN` hex-escape decoding,
/// `\NNN` octal-escape decoding, quote stripping, and whitespace
/// collapsing. Rounds repeat until the string stops changing.
pub fn normalize_command(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = decode_once(&current);
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

fn decode_once(input: &str) -> String {
    let step = percent_decode(input);
    let step = hex_unescape(&step);
    let step = octal_unescape(&step);
    let step = strip_quotes(&step);
    collapse_whitespace(&step)
}

/// Decodes `%XX` sequences. Malformed sequences are left as-is.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| hex_value(*b)),
                bytes.get(i + 2).and_then(|b| hex_value(*b)),
            ) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decodes `\xNN` sequences.
fn hex_unescape(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 2).and_then(|b| hex_value(*b)),
                bytes.get(i + 3).and_then(|b| hex_value(*b)),
            ) {
                out.push(hi * 16 + lo);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Decodes `\NNN` octal sequences (one to three octal digits).
fn octal_unescape(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let mut value: u32 = 0;
            let mut digits = 0;
            while digits < 3 {
                match bytes.get(i + 1 + digits) {
                    Some(b @ b'0'..=b'7') => {
                        value = value * 8 + u32::from(b - b'0');
                        digits += 1;
                    }
                    _ => break,
                }
            }
            if digits > 0 && value <= 0xFF {
                out.push(value as u8);
                i += 1 + digits;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Removes unescaped single and double quotes.
///
/// Shell quoting concatenates adjacent pieces (`r"m" -rf` runs `rm -rf`),
/// so quotes carry no meaning for pattern matching. Backslash-escaped
/// quote characters are kept as literal quotes.
fn strip_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(q @ ('"' | '\'')) => out.push(q),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '"' | '\'' => {}
            other => out.push(other),
        }
    }
    out
}

/// Collapses runs of whitespace to single spaces and trims the ends.
fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decoding() {
        assert_eq!(normalize_command("rm%20-rf%20/"), "rm -rf /");
    }

    #[test]
    fn test_hex_escape_decoding() {
        assert_eq!(normalize_command(r"\x72\x6d -rf /"), "rm -rf /");
    }

    #[test]
    fn test_octal_escape_decoding() {
        assert_eq!(normalize_command(r"\162\155 -rf /"), "rm -rf /");
    }

    #[test]
    fn test_quote_stripping() {
        assert_eq!(normalize_command(r#"r"m" -rf /"#), "rm -rf /");
        assert_eq!(normalize_command("r'm' '-rf' /"), "rm -rf /");
    }

    #[test]
    fn test_escaped_quotes_reduce_to_plain_text_at_fixed_point() {
        // Round one unescapes to `echo "hi"`, round two strips the quotes.
        assert_eq!(normalize_command(r#"echo \"hi\""#), "echo hi");
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize_command("rm   -rf\t\t/"), "rm -rf /");
    }

    #[test]
    fn test_nested_percent_encoded_hex() {
        // %5Cx72 decodes to \x72 in round one, then to 'r' in round two.
        assert_eq!(normalize_command(r"%5Cx72m -rf /"), "rm -rf /");
    }

    #[test]
    fn test_double_percent_encoding() {
        // %2520 -> %20 -> space
        assert_eq!(normalize_command("rm%2520-rf%2520/"), "rm -rf /");
    }

    #[test]
    fn test_plain_command_unchanged() {
        assert_eq!(normalize_command("cargo test --workspace"), "cargo test --workspace");
    }

    #[test]
    fn test_malformed_percent_left_alone() {
        assert_eq!(normalize_command("100%zz done"), "100%zz done");
    }

    #[test]
    fn test_decoding_terminates() {
        // A long run of percent signs must not loop or panic.
        let input = "%".repeat(1000);
        let _ = normalize_command(&input);
    }
}

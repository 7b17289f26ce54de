//! MainDictionary line codec (spec.md §4.2).
//!
//! Line format: `<token> <payload>\n`. The exact textual grammar for the
//! serialized payload is left unspecified by the original design (an
//! acknowledged Open Question — see DESIGN.md); this crate defines its own,
//! grounded on the one concrete hint the original source offers:
//! `Indexer._build_version` runs every version string through
//! `urllib.unquote`, i.e. the legacy format already relied on percent-
//! encoding for fields that can't otherwise be embedded verbatim. We use
//! the same scheme for every string field here (token, action_type,
//! attr_subtype, attr_value): bytes outside an unreserved set are escaped
//! as `%XX`. Structure is then delimited with ASCII punctuation that never
//! appears unescaped: `[ ] ( ) ; ,` and the line separator itself, a single
//! space between token and payload.

use super::payload::{ActionEntry, PackageEntry, Payload, PackageId, Position, SubtypeEntry, Token, ValueEntry};
use crate::error::{IndexError, Result};

/// Serialize one main-dictionary line. Panics (debug-only) if `token`
/// contains a raw newline, which can never happen for a token produced by
/// the external manifest parser; callers never write attacker-controlled
/// tokens into this codec directly.
pub fn serialize_line(token: &Token, payload: &Payload) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(encode_field(token).as_bytes());
    out.push(b' ');
    out.extend_from_slice(encode_payload(payload).as_bytes());
    out.push(b'\n');
    out
}

/// Parse one main-dictionary line (without its trailing newline, though a
/// trailing `\n` or `\r\n` is tolerated and stripped).
pub fn parse_line(line: &[u8]) -> Result<(Token, Payload)> {
    let line = strip_eol(line);
    let sep = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| IndexError::CorruptIndex("main-dict line missing token/payload separator".into()))?;
    let token_field = std::str::from_utf8(&line[..sep])
        .map_err(|e| IndexError::CorruptIndex(format!("non-utf8 token field: {e}")))?;
    let token = decode_field(token_field)?;
    if token.is_empty() {
        return Err(IndexError::CorruptIndex("empty token".into()));
    }
    let payload_field = std::str::from_utf8(&line[sep + 1..])
        .map_err(|e| IndexError::CorruptIndex(format!("non-utf8 payload field: {e}")))?;
    let (payload, rest) = parse_payload(payload_field)?;
    if !rest.is_empty() {
        return Err(IndexError::CorruptIndex(format!("trailing bytes after payload: {rest:?}")));
    }
    Ok((token, payload))
}

fn strip_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':' | b'/' | b'@' | b'+')
}

fn encode_field(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_field(s: &str) -> Result<Vec<u8>> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| IndexError::CorruptIndex(format!("truncated escape in {s:?}")))?;
            let hex = std::str::from_utf8(hex)
                .map_err(|_| IndexError::CorruptIndex(format!("invalid escape in {s:?}")))?;
            let value = u8::from_str_radix(hex, 16)
                .map_err(|_| IndexError::CorruptIndex(format!("invalid escape in {s:?}")))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn encode_payload(payload: &Payload) -> String {
    encode_assoc_list(payload, |subtypes| encode_subtypes(subtypes))
}

fn encode_subtypes(subtypes: &[SubtypeEntry]) -> String {
    encode_assoc_list(subtypes, |values| encode_values(values))
}

fn encode_values(values: &[ValueEntry]) -> String {
    encode_assoc_list(values, |packages| encode_packages(packages))
}

fn encode_packages(packages: &[PackageEntry]) -> String {
    let mut out = String::from("[");
    for (i, (pid, positions)) in packages.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push('(');
        out.push_str(&pid.to_string());
        out.push(',');
        out.push('[');
        for (j, pos) in positions.iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            out.push_str(&pos.to_string());
        }
        out.push(']');
        out.push(')');
    }
    out.push(']');
    out
}

fn encode_assoc_list<V>(entries: &[(Vec<u8>, V)], encode_value: impl Fn(&V) -> String) -> String {
    let mut out = String::from("[");
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push('(');
        out.push_str(&encode_field(key));
        out.push(',');
        out.push_str(&encode_value(value));
        out.push(')');
    }
    out.push(']');
    out
}

fn expect(s: &str, ch: char) -> Result<&str> {
    s.strip_prefix(ch)
        .ok_or_else(|| IndexError::CorruptIndex(format!("expected {ch:?} in {s:?}")))
}

fn parse_payload(s: &str) -> Result<(Payload, &str)> {
    parse_assoc_list(s, parse_subtypes)
}

fn parse_subtypes(s: &str) -> Result<(Vec<SubtypeEntry>, &str)> {
    parse_assoc_list(s, parse_values)
}

fn parse_values(s: &str) -> Result<(Vec<ValueEntry>, &str)> {
    parse_assoc_list(s, parse_packages)
}

fn parse_packages(s: &str) -> Result<(Vec<PackageEntry>, &str)> {
    let mut s = expect(s, '[')?;
    let mut out = Vec::new();
    if let Some(rest) = s.strip_prefix(']') {
        return Ok((out, rest));
    }
    loop {
        s = expect(s, '(')?;
        let end = s
            .find(',')
            .ok_or_else(|| IndexError::CorruptIndex(format!("missing package_id separator in {s:?}")))?;
        let pid: PackageId = s[..end]
            .parse()
            .map_err(|e| IndexError::CorruptIndex(format!("invalid package id: {e}")))?;
        s = &s[end + 1..];
        let (positions, rest) = parse_positions(s)?;
        s = expect(rest, ')')?;
        out.push((pid, positions));
        match s.chars().next() {
            Some(';') => {
                s = &s[1..];
            }
            Some(']') => {
                s = &s[1..];
                break;
            }
            _ => return Err(IndexError::CorruptIndex(format!("malformed package list at {s:?}"))),
        }
    }
    Ok((out, s))
}

fn parse_positions(s: &str) -> Result<(Vec<Position>, &str)> {
    let mut s = expect(s, '[')?;
    let mut out = Vec::new();
    if let Some(rest) = s.strip_prefix(']') {
        return Ok((out, rest));
    }
    loop {
        let end = s
            .find(|c| c == ',' || c == ']')
            .ok_or_else(|| IndexError::CorruptIndex(format!("unterminated position list in {s:?}")))?;
        let pos: Position = s[..end]
            .parse()
            .map_err(|e| IndexError::CorruptIndex(format!("invalid position: {e}")))?;
        out.push(pos);
        let (sep, rest) = s.split_at(end);
        let _ = sep;
        if let Some(stripped) = rest.strip_prefix(']') {
            s = stripped;
            break;
        }
        s = rest.strip_prefix(',').expect("checked above");
    }
    Ok((out, s))
}

fn parse_assoc_list<'a, V>(
    s: &'a str,
    parse_value: impl Fn(&'a str) -> Result<(V, &'a str)>,
) -> Result<(Vec<(Vec<u8>, V)>, &'a str)> {
    let mut s = expect(s, '[')?;
    let mut out = Vec::new();
    if let Some(rest) = s.strip_prefix(']') {
        return Ok((out, rest));
    }
    loop {
        s = expect(s, '(')?;
        let end = s
            .find(',')
            .ok_or_else(|| IndexError::CorruptIndex(format!("missing key separator in {s:?}")))?;
        let key = decode_field(&s[..end])?;
        s = &s[end + 1..];
        let (value, rest) = parse_value(s)?;
        s = expect(rest, ')')?;
        out.push((key, value));
        match s.chars().next() {
            Some(';') => {
                s = &s[1..];
            }
            Some(']') => {
                s = &s[1..];
                break;
            }
            _ => return Err(IndexError::CorruptIndex(format!("malformed assoc list at {s:?}"))),
        }
    }
    Ok((out, s))
}

/// Convenience: the `token` an `ActionEntry`'s caller never sees directly,
/// exposed for doctest-style callers who want to build an empty payload.
pub fn empty_payload() -> Payload {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_dict::payload::singleton_payload;

    fn tok(s: &str) -> Token {
        s.as_bytes().to_vec()
    }

    #[test]
    fn round_trips_simple_line() {
        let token = tok("foo");
        let payload = singleton_payload(tok("file"), tok("basename"), tok("/bin/foo"), 1, vec![42]);
        let line = serialize_line(&token, &payload);
        let (parsed_token, parsed_payload) = parse_line(&line).unwrap();
        assert_eq!(parsed_token, token);
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn round_trips_reserved_bytes_in_fields() {
        let token = tok("weird token; with (parens) and spaces");
        let payload = singleton_payload(tok("file"), tok("path"), tok("a,b;c"), 7, vec![1, 2, 3]);
        let line = serialize_line(&token, &payload);
        let (parsed_token, parsed_payload) = parse_line(&line).unwrap();
        assert_eq!(parsed_token, token);
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn round_trips_empty_payload() {
        let token = tok("bar");
        let payload = empty_payload();
        let line = serialize_line(&token, &payload);
        let (parsed_token, parsed_payload) = parse_line(&line).unwrap();
        assert_eq!(parsed_token, token);
        assert_eq!(parsed_payload, payload);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(parse_line(b"notoken-no-separator\n").is_err());
    }

    #[test]
    fn rejects_malformed_payload() {
        assert!(parse_line(b"foo [(file,not-closed\n").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_line(b"foo []garbage\n").is_err());
    }

    #[test]
    fn tolerates_crlf() {
        let token = tok("foo");
        let payload = empty_payload();
        let mut line = serialize_line(&token, &payload);
        line.truncate(line.len() - 1);
        line.extend_from_slice(b"\r\n");
        let (parsed_token, _) = parse_line(&line).unwrap();
        assert_eq!(parsed_token, token);
    }
}

//! Optional-field accessors for ADX documents.
//!
//! Each accessor owns one field and its default, so a missing or garbled
//! value in a definition file never fails a compile.

use std::sync::LazyLock;

use regex::Regex;

use super::markup::Element;

/// Baud rate used when the definition does not declare one
pub const DEFAULT_BAUD_RATE: u32 = 8192;

/// Mode 1 data request sent when no command node qualifies
pub const DEFAULT_REQUEST_COMMAND: [u8; 5] = [0xF4, 0x57, 0x01, 0x00, 0xB4];

/// Mask reported when the root element has none
pub const DEFAULT_MASK: &str = "Unknown";

/// Command titles that identify the streaming data request
pub const DATA_REQUEST_KEYWORDS: [&str; 3] = ["DATA", "REQUEST", "MODE 1"];

static PAYLOAD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("separator pattern is valid"));

/// Text of the first descendant named `name`
pub fn text_field<'a>(node: &'a Element, name: &str) -> Option<&'a str> {
    node.first(name).map(Element::text)
}

/// Parse the leading decimal integer of `text`, ignoring trailing junk
/// (`"8192 baud"` reads as 8192).
pub fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| v * sign)
}

/// Non-negative integer sub-field, `None` when absent or unparseable
pub fn index_field(node: &Element, name: &str) -> Option<usize> {
    text_field(node, name)
        .and_then(parse_leading_int)
        .and_then(|v| usize::try_from(v).ok())
}

/// First present sub-field among `names` parsed as a float.
/// Absent or non-numeric values yield `default`.
pub fn float_field(node: &Element, names: &[&str], default: f64) -> f64 {
    names
        .iter()
        .find_map(|name| node.first(name))
        .and_then(|field| field.text().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Declared baud rate, or [`DEFAULT_BAUD_RATE`]
pub fn baud_rate(doc: &Element) -> u32 {
    text_field(doc, "baud")
        .and_then(parse_leading_int)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_BAUD_RATE)
}

/// Echo-cancel flag from `<echocancel>` or `<echo>`. Defaults to true,
/// which matches how ALDL interfaces are usually wired.
pub fn echo_cancel(doc: &Element) -> bool {
    match doc.first("echocancel").or_else(|| doc.first("echo")) {
        Some(node) => {
            let value = node.text();
            value.eq_ignore_ascii_case("true") || value == "1"
        }
        None => true,
    }
}

/// Parse a command payload such as `"F4 57 01 00 B4"` or `"0xF4,0x57"`.
///
/// Returns `None` for an empty list or any token that is not a single
/// hex byte.
pub fn parse_hex_payload(text: &str) -> Option<Vec<u8>> {
    let bytes = PAYLOAD_SEPARATOR
        .split(text.trim())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(digits, 16).ok()
        })
        .collect::<Option<Vec<u8>>>()?;

    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}

/// Whether a command title names the streaming data request
pub fn is_data_request_title(title: &str) -> bool {
    let upper = title.to_uppercase();
    DATA_REQUEST_KEYWORDS.iter().any(|k| upper.contains(k))
}

/// Request command from the first qualifying `<ADXCOMMAND>` node
pub fn request_command(doc: &Element) -> Vec<u8> {
    doc.descendants("ADXCOMMAND")
        .filter(|cmd| is_data_request_title(cmd.attribute("title").unwrap_or_default()))
        .find_map(|cmd| text_field(cmd, "sendcommanddata").and_then(parse_hex_payload))
        .unwrap_or_else(|| DEFAULT_REQUEST_COMMAND.to_vec())
}

//! Message decoding: subject, date and a best-effort plain-text body.
//!
//! Decoding never fails upward. Missing headers become empty strings and a
//! body that cannot be decoded becomes empty text.

use std::sync::OnceLock;

use mail_parser::decoders::charsets::map::charset_decoder;
use mail_parser::{HeaderName, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use regex::{Captures, Regex};

/// The decoded form of the message matched for an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedMessage {
    pub subject: String,
    pub date: String,
    pub body: String,
}

/// Parse a raw RFC 822 message.
///
/// Returns `None` only when the bytes are not a message at all.
pub fn decode_message(raw: &[u8]) -> Option<MatchedMessage> {
    let parsed = MessageParser::default().parse(raw)?;
    Some(MatchedMessage {
        subject: parsed.subject().unwrap_or_default().to_string(),
        date: header_date(&parsed),
        body: extract_body(&parsed),
    })
}

/// The Date header as written, with encoded words decoded and folding
/// whitespace collapsed.
fn header_date(parsed: &Message<'_>) -> String {
    if let Some(raw) = parsed.header_raw(HeaderName::Date) {
        let collapsed = collapse_whitespace(raw);
        let decoded = if collapsed.contains("=?") {
            rfc2047_decoder::decode(collapsed.as_bytes())
                .map(|text| collapse_whitespace(&text))
                .unwrap_or(collapsed)
        } else {
            collapsed
        };
        if !decoded.is_empty() {
            return decoded;
        }
    }
    parsed.date().map(|d| d.to_rfc822()).unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract body text.
///
/// Multipart messages yield the first cleanly decoded `text/plain` part,
/// else the first cleanly decoded `text/html` part converted to text.
/// Single-part messages yield their payload as-is.
pub fn extract_body(parsed: &Message<'_>) -> String {
    let Some(root) = parsed.parts.first() else {
        return String::new();
    };

    if matches!(root.body, PartType::Multipart(_)) {
        let decoded = |want_html: bool| {
            parsed
                .parts
                .iter()
                .filter(|part| decoded_cleanly(part))
                .find_map(|part| match (&part.body, want_html) {
                    (PartType::Text(text), false) if is_text_plain(part) => Some(text),
                    (PartType::Html(text), true) => Some(text),
                    _ => None,
                })
        };

        if let Some(text) = decoded(false) {
            return text.to_string();
        }
        if let Some(html) = decoded(true) {
            return html_to_text(html);
        }
        return String::new();
    }

    if !decoded_cleanly(root) {
        return String::new();
    }
    match &root.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        _ => String::new(),
    }
}

/// Charset labels the parser decodes natively as UTF-8.
const UTF8_CHARSETS: [&str; 6] = [
    "utf-8",
    "utf8",
    "unicode-1-1-utf-8",
    "unicode11utf8",
    "unicode20utf8",
    "x-unicode20utf8",
];

/// False if the parser flagged the part, or its declared charset has no
/// decoder and the text is a lossy UTF-8 guess.
fn decoded_cleanly(part: &MessagePart<'_>) -> bool {
    if part.is_encoding_problem {
        return false;
    }
    let Some(charset) = MimeHeaders::content_type(part)
        .and_then(|ct| ct.attribute("charset"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
    else {
        return true;
    };
    UTF8_CHARSETS.iter().any(|c| charset.eq_ignore_ascii_case(c))
        || charset_decoder(charset.as_bytes()).is_some()
}

/// True for `text/plain` parts, including parts with no declared type.
fn is_text_plain(part: &MessagePart<'_>) -> bool {
    match MimeHeaders::content_type(part) {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().is_none_or(|s| s.eq_ignore_ascii_case("plain"))
        }
        None => true,
    }
}

/// Convert HTML to plain text: strip tags, collapse whitespace, then decode entities.
pub fn html_to_text(html: &str) -> String {
    let without_tags = html_tag_regex().replace_all(html, " ");
    decode_html_entities(&collapse_whitespace(&without_tags))
}

/// Names for U+00A0..=U+00FF, in code point order.
const LATIN1_ENTITIES: [&str; 96] = [
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect", "uml", "copy", "ordf",
    "laquo", "not", "shy", "reg", "macr", "deg", "plusmn", "sup2", "sup3", "acute", "micro",
    "para", "middot", "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest",
    "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil", "Egrave", "Eacute",
    "Ecirc", "Euml", "Igrave", "Iacute", "Icirc", "Iuml", "ETH", "Ntilde", "Ograve", "Oacute",
    "Ocirc", "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute",
    "THORN", "szlig", "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil",
    "egrave", "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml", "eth", "ntilde",
    "ograve", "oacute", "ocirc", "otilde", "ouml", "divide", "oslash", "ugrave", "uacute",
    "ucirc", "uuml", "yacute", "thorn", "yuml",
];

/// HTML 4 entities that are recognized even without a trailing `;`.
fn legacy_entity(name: &str) -> Option<char> {
    match name {
        "amp" | "AMP" => Some('&'),
        "lt" | "LT" => Some('<'),
        "gt" | "GT" => Some('>'),
        "quot" | "QUOT" => Some('"'),
        "COPY" => Some('\u{a9}'),
        "REG" => Some('\u{ae}'),
        _ => LATIN1_ENTITIES
            .iter()
            .position(|&n| n == name)
            .and_then(|i| char::from_u32(0xa0 + i as u32)),
    }
}

fn named_entity(name: &str) -> Option<char> {
    if let Some(c) = legacy_entity(name) {
        return Some(c);
    }
    let c = match name {
        "apos" => '\'',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "sbquo" => '\u{201a}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "bdquo" => '\u{201e}',
        "lsaquo" => '\u{2039}',
        "rsaquo" => '\u{203a}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "prime" => '\u{2032}',
        "Prime" => '\u{2033}',
        "dagger" => '\u{2020}',
        "Dagger" => '\u{2021}',
        "permil" => '\u{2030}',
        "trade" => '\u{2122}',
        "euro" => '\u{20ac}',
        "ensp" => '\u{2002}',
        "emsp" => '\u{2003}',
        "thinsp" => '\u{2009}',
        "zwnj" => '\u{200c}',
        "zwj" => '\u{200d}',
        "lrm" => '\u{200e}',
        "rlm" => '\u{200f}',
        "OElig" => '\u{152}',
        "oelig" => '\u{153}',
        "Scaron" => '\u{160}',
        "scaron" => '\u{161}',
        "Yuml" => '\u{178}',
        "fnof" => '\u{192}',
        "circ" => '\u{2c6}',
        "tilde" => '\u{2dc}',
        "larr" => '\u{2190}',
        "uarr" => '\u{2191}',
        "rarr" => '\u{2192}',
        "darr" => '\u{2193}',
        "harr" => '\u{2194}',
        "minus" => '\u{2212}',
        "check" => '\u{2713}',
        _ => return None,
    };
    Some(c)
}

/// Decode a numeric reference body (`#123` or `#x7b`).
fn numeric_entity(entity: &str) -> char {
    let code = match entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => entity[1..].parse::<u32>().ok(),
    };
    code.filter(|&c| c != 0)
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Decode named entities and numeric character references in one pass.
///
/// Unknown names are left untouched. Without `;`, only legacy names are
/// decoded, matched by longest prefix.
fn decode_html_entities(text: &str) -> String {
    html_entity_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let entity = &caps[1];
            let terminated = !caps[2].is_empty();
            if entity.starts_with('#') {
                return numeric_entity(entity).to_string();
            }
            if terminated && let Some(c) = named_entity(entity) {
                return c.to_string();
            }
            (2..=entity.len())
                .rev()
                .find_map(|end| {
                    legacy_entity(&entity[..end]).map(|c| format!("{c}{}{}", &entity[end..], &caps[2]))
                })
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn html_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("valid HTML tag regex"))
}

fn html_entity_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*)(;?)")
            .expect("valid entity regex")
    })
}

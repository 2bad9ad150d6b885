use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::FetchedPage;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty response body")]
    Empty,
    #[error("failed to decode bytes with {encoding}")]
    Malformed { encoding: String },
}

/// Decode a fetched page into UTF-8 text.
///
/// Precedence: BOM, then the Content-Type charset, then chardetng detection.
pub fn decode_page(page: &FetchedPage) -> Result<String, DecodeError> {
    decode_html(&page.bytes, page.content_type.as_deref())
}

pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Result<String, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    let declared = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    if let Some(encoding) = declared {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<String, DecodeError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: encoding.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_parameter_is_case_insensitive() {
        assert_eq!(
            charset_label("text/html; Charset=\"ISO-8859-1\"").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(charset_label("text/html"), None);
    }

    #[test]
    fn header_charset_is_respected() {
        let text = decode_html(b"caf\xe9", Some("text/html; charset=ISO-8859-1")).unwrap();
        assert_eq!(text, "caf\u{e9}");
    }

    #[test]
    fn bom_wins_over_header() {
        let text = decode_html(b"\xEF\xBB\xBFhello", Some("text/html; charset=ISO-8859-1")).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn invalid_utf8_under_declared_utf8_is_an_error() {
        let err = decode_html(b"ab\xffcd", Some("text/html; charset=utf-8")).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn empty_body_is_an_error() {
        assert_eq!(decode_html(b"", None), Err(DecodeError::Empty));
    }
}

//! The only two ways a value is allowed to be interpolated into generated
//! markup. Every renderer goes through these so that a role title or a
//! permission name can never break out of its attribute or element.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;

/// Characters that must be replaced by an entity in HTML text and attribute
/// values. XML uses the same set, so this doubles for the sitemap.
const SPECIAL_CHARS: &[char] = &['&', '<', '>', '"', '\''];

/// Everything outside of the RFC 3986 unreserved set is encoded, including
/// `/`, so that a value always stays a single path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Escapes a value for use in HTML (or XML) text or a quoted attribute
pub fn html(input: &str) -> Cow<'_, str> {
    // Optimization when no escaping is needed
    if !input.contains(SPECIAL_CHARS) {
        return input.into();
    }

    let mut escaped = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }

    escaped.into()
}

/// Percent-encodes a value so that it can be used as one URL path segment
pub fn path_segment(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, PATH_SEGMENT).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn html_passthrough_borrows() {
        assert!(matches!(html("compute.instances.get"), Cow::Borrowed(_)));
    }

    #[test]
    fn html_escapes_markup() {
        assert_eq!(
            html(r#"<script>alert("x" & 'y')</script>"#),
            "&lt;script&gt;alert(&quot;x&quot; &amp; &#x27;y&#x27;)&lt;/script&gt;"
        );
    }

    #[test]
    fn segment_keeps_unreserved() {
        assert_eq!(path_segment("compute.instances.get"), "compute.instances.get");
        assert_eq!(path_segment("a-b_c~d"), "a-b_c~d");
    }

    #[test]
    fn segment_encodes_separators_and_unicode() {
        assert_eq!(path_segment("a/b c"), "a%2Fb%20c");
        assert_eq!(path_segment("x?y#z"), "x%3Fy%23z");
        assert_eq!(path_segment("é"), "%C3%A9");
    }
}

//! Shared helpers for locating problems inside JSON payloads.
//!
//! `serde_json` reports syntax errors by line and column and does not track
//! value positions, so content diagnostics locate the offending value by
//! searching the source text forward from a known anchor.

use crate::{
    error::{Diagnostic, ErrorCode},
    span::Span,
};

/// Builds an E001 diagnostic from a `serde_json` error.
///
/// `base` is the byte offset of the parsed text inside `source`, used when
/// only a slice of the source was handed to `serde_json`.
pub(crate) fn syntax_diagnostic(
    source: &str,
    base: usize,
    err: &serde_json::Error,
    what: &str,
) -> Diagnostic {
    let offset = base + line_column_offset(&source[base..], err.line(), err.column());
    let end = next_char_boundary(source, offset);
    let help = if err.is_data() {
        format!("the JSON is well-formed but does not match the {what} layout")
    } else {
        "check the JSON syntax near the marked position".to_string()
    };

    Diagnostic::error(format!("malformed {what}: {err}"))
        .with_code(ErrorCode::E001)
        .with_label(Span::new(offset..end), error_label(err))
        .with_help(help)
}

fn error_label(err: &serde_json::Error) -> &'static str {
    if err.is_eof() {
        "input ends here"
    } else if err.is_data() {
        "unexpected value"
    } else {
        "syntax error"
    }
}

/// Converts a 1-based line and column into a byte offset, clamped to the text.
pub(crate) fn line_column_offset(text: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    let mut offset = (line_start + column.saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn next_char_boundary(text: &str, offset: usize) -> usize {
    text[offset..]
        .chars()
        .next()
        .map_or(offset, |c| offset + c.len_utf8())
}

/// Finds the next occurrence of a quoted JSON string at or after `from`.
///
/// The returned span covers the quotes.
pub(crate) fn locate_string(source: &str, value: &str, from: usize) -> Option<Span> {
    let needle = format!("\"{value}\"");
    let from = from.min(source.len());
    source
        .get(from..)?
        .find(&needle)
        .map(|pos| Span::new(from + pos..from + pos + needle.len()))
}

/// Returns the span of a located string, or an empty span at `from`.
pub(crate) fn locate_or_anchor(source: &str, value: &str, from: usize) -> Span {
    locate_string(source, value, from).unwrap_or_else(|| {
        let anchor = from.min(source.len());
        Span::new(anchor..anchor)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_offset() {
        let text = "{\n  \"a\": 1,\n  oops\n}";
        assert_eq!(line_column_offset(text, 1, 1), 0);
        assert_eq!(line_column_offset(text, 3, 3), 14);
        assert_eq!(&text[14..18], "oops");
        assert_eq!(line_column_offset(text, 99, 99), text.len());
    }

    #[test]
    fn test_locate_string_from_anchor() {
        let source = r#"{"id": "C1", "next": "C1"}"#;
        let first = locate_string(source, "C1", 0).unwrap();
        assert_eq!(first, Span::new(7..11));

        let second = locate_string(source, "C1", first.end()).unwrap();
        assert_eq!(&source[second.start()..second.end()], "\"C1\"");
        assert!(second.start() > first.start());

        assert!(locate_string(source, "M1", 0).is_none());
        assert_eq!(locate_or_anchor(source, "M1", 5), Span::new(5..5));
    }

    #[test]
    fn test_syntax_diagnostic_points_at_error() {
        let source = "{\"components\": [}";
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        let diag = syntax_diagnostic(source, 0, &err, "detection document");

        assert_eq!(diag.code(), Some(ErrorCode::E001));
        let span = diag.labels()[0].span();
        assert!(span.start() <= source.len());
    }
}

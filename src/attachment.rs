use axum::http::HeaderValue;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// characters most filesystems (or shells) refuse in a file name
const UNSAFE_CHARS: &[char] =
  &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

// RFC 5987 attr-char
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'!')
  .remove(b'#')
  .remove(b'$')
  .remove(b'&')
  .remove(b'+')
  .remove(b'-')
  .remove(b'.')
  .remove(b'^')
  .remove(b'_')
  .remove(b'`')
  .remove(b'|')
  .remove(b'~');

/// Turns a video title into a file stem: unsafe characters become `-`,
/// control characters are dropped. Returns `fallback` when nothing is left.
pub fn sanitize_filename(title: &str, fallback: &str) -> String {
  let name: String = title
    .chars()
    .filter(|c| !c.is_control())
    .map(|c| if UNSAFE_CHARS.contains(&c) { '-' } else { c })
    .collect();

  match name.trim() {
    "" => fallback.to_string(),
    name => name.to_string(),
  }
}

/// `attachment` disposition carrying both an ASCII `filename` and the
/// UTF-8 `filename*`.
pub fn content_disposition(stem: &str, extension: &str) -> HeaderValue {
  let filename = format!("{stem}.{extension}");
  let ascii: String = filename
    .chars()
    .map(|c| if c.is_ascii() { c } else { '_' })
    .collect();

  let value = format!(
    "attachment; filename=\"{}\"; filename*=UTF-8''{}",
    ascii,
    utf8_percent_encode(&filename, ATTR_CHAR)
  );

  HeaderValue::from_str(&value)
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sanitize_filename() {
    assert_eq!(sanitize_filename("A/B?C", "video"), "A-B-C");
    assert_eq!(
      sanitize_filename(r#"a/b\c?d%e*f:g|h"i<j>k"#, "video"),
      "a-b-c-d-e-f-g-h-i-j-k"
    );
    assert_eq!(
      sanitize_filename("  tabs\tand\nnewlines ", "video"),
      "tabsandnewlines"
    );
    assert_eq!(sanitize_filename("日本語 title", "video"), "日本語 title");
    assert_eq!(sanitize_filename("", "audio"), "audio");
    assert_eq!(sanitize_filename(" \u{7} ", "audio"), "audio");
  }

  #[test]
  fn test_content_disposition() {
    let value = content_disposition("A-B-C", "mp4");
    assert_eq!(
      value.to_str().unwrap(),
      "attachment; filename=\"A-B-C.mp4\"; filename*=UTF-8''A-B-C.mp4"
    );

    let value = content_disposition("Café ☕", "mp3");
    assert_eq!(
      value.to_str().unwrap(),
      "attachment; filename=\"Caf_ _.mp3\"; \
       filename*=UTF-8''Caf%C3%A9%20%E2%98%95.mp3"
    );
  }
}

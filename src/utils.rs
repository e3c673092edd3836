pub use teloxide::utils::html::escape;

use crate::prelude::*;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// Public download link; spaces in version keys travel as underscores.
pub fn download_url(host: &str, id: i32, version: &str) -> String {
  format!(
    "{}/download?id={}&version={}",
    host.trim_end_matches('/'),
    id,
    version.replace(' ', "_")
  )
}

/// Makes a user supplied name safe to use as a single path component.
pub fn path_segment(name: &str) -> String {
  let segment: String = name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
        c
      } else {
        '_'
      }
    })
    .collect();

  match segment.trim_matches('.') {
    "" => "_".into(),
    trimmed => trimmed.into(),
  }
}

/// Telegram rejects messages above 4096 characters; leave room for entities.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4000;

/// Splits `text` into messages no longer than `max_len` bytes, preferring
/// line boundaries. `0` selects the Telegram limit.
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
  let max_len =
    if max_len == 0 { TELEGRAM_MAX_MESSAGE_LENGTH } else { max_len };

  let mut chunks = Vec::new();
  let mut current = String::new();

  for line in text.lines() {
    let mut rest = line;

    while rest.len() > max_len {
      if !current.is_empty() {
        chunks.push(std::mem::take(&mut current));
      }
      let mut cut = max_len;
      while !rest.is_char_boundary(cut) {
        cut -= 1;
      }
      if cut == 0 {
        cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
      }
      chunks.push(rest[..cut].to_string());
      rest = &rest[cut..];
    }

    if !current.is_empty() && current.len() + 1 + rest.len() > max_len {
      chunks.push(std::mem::take(&mut current));
    }
    if !current.is_empty() {
      current.push('\n');
    }
    current.push_str(rest);
  }

  if !current.is_empty() || chunks.is_empty() {
    chunks.push(current);
  }
  chunks
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_download_url_replaces_spaces() {
    assert_eq!(
      download_url("https://dl.example.org/", 7, "1.0 beta"),
      "https://dl.example.org/download?id=7&version=1.0_beta"
    );
  }

  #[test]
  fn test_escape() {
    assert_eq!(escape("<b>a & b</b>"), "&lt;b&gt;a &amp; b&lt;/b&gt;");
  }

  #[test]
  fn test_path_segment() {
    assert_eq!(path_segment("1.0 beta"), "1.0_beta");
    assert_eq!(path_segment("../../etc"), "_.._etc");
    assert_eq!(path_segment(".."), "_");
    assert_eq!(path_segment("plugin-1.2.jar"), "plugin-1.2.jar");
  }

  #[test]
  fn test_chunk_message() {
    assert_eq!(chunk_message("short", 0), ["short"]);
    assert_eq!(chunk_message("aaa\nbbb\nccc", 7), ["aaa\nbbb", "ccc"]);
    assert_eq!(chunk_message("abcdefghij", 4), ["abcd", "efgh", "ij"]);
  }
}

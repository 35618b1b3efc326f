//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings (char-boundary safe).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

/// Lowercase ASCII slug: runs of non-alphanumerics collapse to one '-'.
/// `"Volcanoes & Lava!"` → `"volcanoes-lava"`.
pub fn slugify(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut pending_dash = false;
  for ch in s.chars() {
    if ch.is_alphanumeric() {
      if pending_dash && !out.is_empty() {
        out.push('-');
      }
      pending_dash = false;
      out.extend(ch.to_lowercase());
    } else {
      pending_dash = true;
    }
  }
  out
}

/// Finds the first balanced span that starts with `open` and ends with the matching `close`.
///
/// Brackets inside JSON string literals (including escaped quotes) are ignored, so model
/// prose like "here is your lesson: {...}" or fenced ```json blocks are handled.
/// Returns `None` when no `open` exists or it is never closed.
pub fn first_balanced_span(text: &str, open: char, close: char) -> Option<&str> {
  let start = text.find(open)?;
  let mut depth = 0usize;
  let mut in_string = false;
  let mut escaped = false;

  for (off, ch) in text[start..].char_indices() {
    if in_string {
      if escaped {
        escaped = false;
      } else if ch == '\\' {
        escaped = true;
      } else if ch == '"' {
        in_string = false;
      }
      continue;
    }
    match ch {
      '"' => in_string = true,
      c if c == open => depth += 1,
      c if c == close => {
        depth -= 1;
        if depth == 0 {
          let end = start + off + ch.len_utf8();
          return Some(&text[start..end]);
        }
      }
      _ => {}
    }
  }
  None
}

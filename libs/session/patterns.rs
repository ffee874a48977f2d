// Copyright 2025-2026 the Headlamp authors. MIT license.

//! The one URL pattern language shared by the fetch rule engine and the
//! network/script queries.
//!
//! Three forms: `"*"` matches any URL, `"/…/"` is a regular expression,
//! anything else is a glob (`*` and `?` wildcards, everything else
//! literal). A regex that fails to compile matches nothing; patterns come
//! from agent input and must never poison a rule table with a panic or an
//! error path.
//!
//! Globs compile anchored (whole-URL match) for interception rules and
//! unanchored (substring match) for the query helpers. The difference is
//! deliberate: rules mirror Chrome's own URL patterns, queries behave
//! like a grep.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
  /// Glob must cover the whole URL. Used by interception rules.
  Anchored,
  /// Glob may match any substring of the URL. Used by queries.
  Substring,
}

#[derive(Debug, Clone)]
pub enum UrlPattern {
  Any,
  Regex(Regex),
  /// A `/…/` literal that failed to compile. Matches nothing.
  Never,
}

impl UrlPattern {
  pub fn compile(pattern: &str, mode: MatchMode) -> Self {
    if pattern == "*" {
      return UrlPattern::Any;
    }
    if let Some(inner) = regex_literal(pattern) {
      // A user regex keeps standard search semantics in both modes.
      return match Regex::new(inner) {
        Ok(regex) => UrlPattern::Regex(regex),
        Err(err) => {
          log::debug!("pattern {pattern:?} failed to compile: {err}");
          UrlPattern::Never
        }
      };
    }
    let mut source = String::with_capacity(pattern.len() + 4);
    if mode == MatchMode::Anchored {
      source.push('^');
    }
    for c in pattern.chars() {
      match c {
        '*' => source.push_str(".*"),
        '?' => source.push('.'),
        c => {
          if regex_syntax_char(c) {
            source.push('\\');
          }
          source.push(c);
        }
      }
    }
    if mode == MatchMode::Anchored {
      source.push('$');
    }
    match Regex::new(&source) {
      Ok(regex) => UrlPattern::Regex(regex),
      // The escaped glob source is always valid; kept as a safety net.
      Err(err) => {
        log::debug!("glob {pattern:?} produced invalid regex: {err}");
        UrlPattern::Never
      }
    }
  }

  pub fn matches(&self, url: &str) -> bool {
    match self {
      UrlPattern::Any => true,
      UrlPattern::Regex(regex) => regex.is_match(url),
      UrlPattern::Never => false,
    }
  }
}

/// One-shot helper for call sites that match a single URL.
pub fn url_matches(pattern: &str, mode: MatchMode, url: &str) -> bool {
  UrlPattern::compile(pattern, mode).matches(url)
}

fn regex_literal(pattern: &str) -> Option<&str> {
  if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
    Some(&pattern[1..pattern.len() - 1])
  } else {
    None
  }
}

fn regex_syntax_char(c: char) -> bool {
  matches!(
    c,
    '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\'
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn star_matches_every_url() {
    let pattern = UrlPattern::compile("*", MatchMode::Anchored);
    assert!(pattern.matches("http://example.com/a?b=c"));
    assert!(pattern.matches(""));
  }

  #[test]
  fn regex_literal_uses_search_semantics() {
    let pattern = UrlPattern::compile("/abc/", MatchMode::Anchored);
    assert!(pattern.matches("http://host/abc/page"));
    assert!(!pattern.matches("http://host/def"));
  }

  #[test]
  fn malformed_regex_matches_nothing() {
    let pattern = UrlPattern::compile("/[unclosed/", MatchMode::Anchored);
    assert!(!pattern.matches("http://host/[unclosed/"));
    assert!(!pattern.matches("anything"));
  }

  #[test]
  fn anchored_glob_covers_the_whole_url() {
    let pattern = UrlPattern::compile("*/api/mock-me", MatchMode::Anchored);
    assert!(pattern.matches("http://host/api/mock-me"));
    assert!(!pattern.matches("http://host/api/mock-me/extra"));
  }

  #[test]
  fn substring_glob_behaves_like_a_grep() {
    let pattern = UrlPattern::compile("api", MatchMode::Substring);
    assert!(pattern.matches("http://host/api/users"));
    assert!(!pattern.matches("http://host/static/app.js"));
  }

  #[test]
  fn question_mark_matches_one_character() {
    let pattern = UrlPattern::compile("http://host/p?.html", MatchMode::Anchored);
    assert!(pattern.matches("http://host/p1.html"));
    assert!(!pattern.matches("http://host/p12.html"));
  }

  #[test]
  fn glob_metacharacters_are_literal() {
    let pattern =
      UrlPattern::compile("http://host/a+b(c).html", MatchMode::Anchored);
    assert!(pattern.matches("http://host/a+b(c).html"));
    assert!(!pattern.matches("http://host/aab(c)xhtml"));
  }
}

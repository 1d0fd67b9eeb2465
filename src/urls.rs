//! URL equivalence
//!
//! Recorded URL values are compared semantically rather than textually:
//! protocol by equality, host by pattern match after percent-decoding, port
//! by equality. A subject that does not parse as an absolute URL cannot
//! navigate anywhere meaningful and is treated as harmless. The list form
//! pools every recorded alternative for an attribute, which gives recorded
//! origins a same-origin-like interpretation, and compares `javascript:`
//! URL payloads by script token streams.

use crate::pattern;
use crate::scanner::script_equals;
use percent_encoding::percent_decode_str;
use url::Url;

fn decode_url_escape_sequences(input: &str) -> String {
  percent_decode_str(input).decode_utf8_lossy().into_owned()
}

fn host(url: &Url) -> String {
  decode_url_escape_sequences(url.host_str().unwrap_or(""))
}

/// Everything after the scheme and its colon.
fn content(url: &Url) -> &str {
  &url.as_str()[url.scheme().len() + 1..]
}

/// Pairwise URL equivalence against a single recorded URL.
pub fn url_equals(url_constraint: &str, new_url: &str) -> bool {
  let Ok(new_url) = Url::parse(new_url) else {
    return true;
  };
  let Ok(url_constraint) = Url::parse(url_constraint) else {
    return false;
  };

  new_url.scheme() == url_constraint.scheme()
    && pattern::string_equals(&host(&url_constraint), &host(&new_url))
    && new_url.port() == url_constraint.port()
}

/// URL equivalence against the pooled list of recorded alternatives.
pub fn url_equals_list(url_constraints: &[String], new_url: &str) -> bool {
  let Ok(new_url) = Url::parse(new_url) else {
    return true;
  };
  if url_constraints.is_empty() {
    return false;
  }

  for constraint in url_constraints {
    let Ok(constraint) = Url::parse(constraint) else {
      continue;
    };
    if new_url.scheme() != constraint.scheme() {
      continue;
    }
    if new_url.scheme() == "javascript" {
      if script_equals(
        &decode_url_escape_sequences(content(&constraint)),
        &decode_url_escape_sequences(content(&new_url)),
      ) {
        return true;
      }
    } else if new_url.port() == constraint.port() && pattern::string_equals(&host(&constraint), &host(&new_url)) {
      return true;
    }
  }
  false
}

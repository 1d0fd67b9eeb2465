//! Attribute classification
//!
//! Decides which attributes the engine monitors and which semantic class an
//! attribute value belongs to when a stored pattern is evaluated. The
//! predicates mirror the host engine's per-element attribute knowledge as
//! fixed tables.

use crate::dom::Handle;

/// Trusted-type expectation for an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedType {
  Html,
  Script,
  ScriptUrl,
}

/// Event-handler content attributes: no namespace and an `on` prefix.
pub fn is_script_attribute(_element: &Handle, attribute_name: &str) -> bool {
  attribute_name.starts_with("on")
}

/// URL-valued attributes for the given element, including the `<a ping>`
/// and `<webview src>` cases the engine's own predicate does not cover.
pub fn is_url_attribute(element: &Handle, attribute_name: &str) -> bool {
  let Some(tag) = element.tag_name() else {
    return false;
  };
  if is_engine_url_attribute(tag, attribute_name) {
    return true;
  } else if tag == "A" && attribute_name == "ping" {
    return true;
  } else if tag == "WEBVIEW" && attribute_name == "src" {
    return true;
  }
  false
}

/// The engine's per-element URL attribute table.
fn is_engine_url_attribute(tag: &str, attribute_name: &str) -> bool {
  match attribute_name {
    "href" => matches!(tag, "A" | "AREA" | "BASE" | "LINK" | "IMAGE" | "USE"),
    "src" => matches!(
      tag,
      "AUDIO" | "EMBED" | "FRAME" | "IFRAME" | "IMG" | "INPUT" | "SCRIPT" | "SOURCE" | "TRACK" | "VIDEO"
    ),
    "action" => tag == "FORM",
    "formaction" => matches!(tag, "BUTTON" | "INPUT"),
    "poster" => tag == "VIDEO",
    "cite" => matches!(tag, "BLOCKQUOTE" | "DEL" | "INS" | "Q"),
    "data" => tag == "OBJECT",
    "background" => tag == "BODY",
    "longdesc" => matches!(tag, "FRAME" | "IFRAME" | "IMG"),
    _ => false,
  }
}

/// The trusted-type expectation the engine attaches to an attribute, if any.
pub fn expected_trusted_type(element: &Handle, attribute_name: &str) -> Option<TrustedType> {
  if attribute_name.starts_with("on") {
    return Some(TrustedType::Script);
  }
  let tag = element.tag_name()?;
  match (tag, attribute_name) {
    ("IFRAME", "srcdoc") => Some(TrustedType::Html),
    ("SCRIPT", "src") => Some(TrustedType::ScriptUrl),
    ("SCRIPT", "text") => Some(TrustedType::Script),
    ("EMBED", "src") => Some(TrustedType::ScriptUrl),
    ("OBJECT", "data") | ("OBJECT", "codebase") => Some(TrustedType::ScriptUrl),
    _ => None,
  }
}

/// Attributes whose value is parsed as HTML content.
pub fn is_html_content_attribute(element: &Handle, attribute_name: &str) -> bool {
  element.tag_name() == Some("IFRAME") && attribute_name == "srcdoc"
}

/// SVG animation attributes that can smuggle a `javascript:` URL into an
/// animated `href`.
pub fn is_svg_animation_attribute_setting_javascript_url(element: &Handle, attribute_name: &str) -> bool {
  let Some(tag) = element.tag_name() else {
    return false;
  };
  matches!(tag, "ANIMATE" | "ANIMATEMOTION" | "ANIMATETRANSFORM" | "SET")
    && matches!(attribute_name, "from" | "to" | "by" | "values")
}

/// Whether a change to this attribute is mediated by the engine.
pub fn should_monitor_attribute(element: &Handle, attribute_name: &str) -> bool {
  if attribute_name.starts_with("dtt-") {
    // "dtt-*" attributes are for internal use only, and should not be merged
    // or shadowed like regular attributes.
    return false;
  } else if attribute_name == "id" {
    // This changes an element's identifier.
    return true;
  } else if attribute_name == "name" {
    return true;
  } else if expected_trusted_type(element, attribute_name).is_some() {
    return true;
  } else if is_url_attribute(element, attribute_name) {
    return true;
  } else if is_html_content_attribute(element, attribute_name) {
    return true;
  } else if is_svg_animation_attribute_setting_javascript_url(element, attribute_name) {
    return true;
  } else if element.tag_name() == Some("FORM") {
    return attribute_name == "target" || attribute_name == "method";
  }
  false
}

//! Pattern evaluation over shadow attributes
//!
//! A shadow attribute stores a `|`-separated pattern of observed values.
//! Evaluation classifies the attribute (identifier, event handler, URL,
//! plain) and applies the matching predicate per alternative; URL
//! alternatives are pooled and evaluated together, which is what gives
//! recorded origins their same-origin-like reading. Merging appends a new
//! alternative only when the current pattern does not already cover the
//! value.

use crate::attributes;
use crate::css::registry::PropertyId;
use crate::css::value::css_value_equals_text;
use crate::css::value::CssValue;
use crate::dom::Handle;
use crate::guard;
use crate::pattern;
use crate::scanner::script_equals;
use crate::urls;

/// Whether a stored attribute pattern admits the subject value.
///
/// An absent pattern admits only an absent value; absence and the empty
/// string are deliberately distinct.
pub fn attribute_equals(
  element: &Handle,
  attribute_name: &str,
  shadow_attribute_value: Option<&str>,
  attribute_value: Option<&str>,
  id_prefixes: &[String],
) -> bool {
  let Some(shadow_attribute_value) = shadow_attribute_value else {
    return attribute_value.is_none();
  };
  let subject = attribute_value.unwrap_or("");
  let mut alternatives = pattern::Alternatives::new(shadow_attribute_value);

  if attribute_name == "dtt-id" || attribute_name == "id" {
    alternatives.any(|part| pattern::id_equals(&part, subject, id_prefixes))
  } else if attributes::is_script_attribute(element, attribute_name) {
    alternatives.any(|part| script_equals(&part, subject))
  } else if attributes::is_url_attribute(element, attribute_name) {
    let url_constraints: Vec<String> = alternatives.collect();
    urls::url_equals_list(&url_constraints, subject)
  } else {
    alternatives.any(|part| pattern::string_equals(&part, subject))
  }
}

/// Whether a stored `dtt-s-*` pattern admits the new computed value.
///
/// The three-state accumulator survives across alternatives, so two
/// recorded numeric endpoints bracketing the new value count as a match.
pub fn property_equals(property: PropertyId, current_value: Option<&str>, new_value: Option<&CssValue>) -> bool {
  let Some(current_value) = current_value else {
    return new_value.is_none();
  };
  let mut match_state = 0;
  for part in pattern::Alternatives::new(current_value) {
    css_value_equals_text(property, &part, new_value, &mut match_state);
    if match_state == -1 {
      return true;
    }
  }
  false
}

/// Records a newly observed attribute value into the stored pattern.
/// Returns the pattern unchanged when the value already matches.
pub fn merge_shadow_attribute(
  element: &Handle,
  attribute_name: &str,
  current_value: Option<&str>,
  new_value: Option<&str>,
  id_prefixes: &[String],
) -> Option<String> {
  if attribute_equals(element, attribute_name, current_value, new_value, id_prefixes) {
    return current_value.map(str::to_string);
  }

  guard::output_attribute_modification(element, attribute_name, new_value);

  Some(pattern::escape_and_add_to_attribute_value(current_value, new_value))
}

/// Records a newly observed computed-property value into the stored
/// `dtt-s-*` pattern. A first observation is stored verbatim.
pub fn merge_shadow_property(
  property: PropertyId,
  current_value: Option<&str>,
  new_value: Option<&CssValue>,
) -> Option<String> {
  if current_value.map_or(true, str::is_empty) {
    return new_value.map(|value| value.to_css_string());
  }

  if property_equals(property, current_value, new_value) {
    return current_value.map(str::to_string);
  }

  guard::output_property_modification(property, new_value);

  Some(pattern::escape_and_add_to_attribute_value(
    current_value,
    new_value.map(|value| value.to_css_string()).as_deref(),
  ))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::css::value::parse_single_value;
  use crate::dom::DomNode;

  fn no_prefixes() -> Vec<String> {
    Vec::new()
  }

  #[test]
  fn absent_pattern_matches_only_absent_value() {
    let div = DomNode::new_element("div");
    assert!(attribute_equals(&div, "name", None, None, &no_prefixes()));
    assert!(!attribute_equals(&div, "name", None, Some(""), &no_prefixes()));
    assert!(!attribute_equals(&div, "name", Some(""), None, &no_prefixes()));
    assert!(attribute_equals(&div, "name", Some(""), Some(""), &no_prefixes()));
  }

  #[test]
  fn plain_attributes_match_any_alternative() {
    let div = DomNode::new_element("div");
    assert!(attribute_equals(&div, "name", Some("a|b|c"), Some("b"), &no_prefixes()));
    assert!(!attribute_equals(&div, "name", Some("a|b|c"), Some("d"), &no_prefixes()));
    assert!(attribute_equals(&div, "name", Some("item-*"), Some("item-42"), &no_prefixes()));
  }

  #[test]
  fn id_attributes_use_prefix_whitelist() {
    let div = DomNode::new_element("div");
    let prefixes = vec!["gen-".to_string()];
    assert!(attribute_equals(&div, "id", Some("gen-aaa"), Some("gen-zzz"), &prefixes));
    assert!(!attribute_equals(&div, "id", Some("gen-aaa"), Some("other"), &prefixes));
    assert!(!attribute_equals(&div, "id", Some("gen-aaa"), Some("gen-zzz"), &no_prefixes()));
  }

  #[test]
  fn script_attributes_compare_token_streams() {
    let a = DomNode::new_element("a");
    assert!(attribute_equals(&a, "onclick", Some("f(1)"), Some("f ( 1 )"), &no_prefixes()));
    assert!(!attribute_equals(&a, "onclick", Some("f(1)"), Some("g(1)"), &no_prefixes()));
    assert!(attribute_equals(&a, "onclick", Some("f(1)|g(1)"), Some("g( 1 )"), &no_prefixes()));
  }

  #[test]
  fn url_attributes_pool_alternatives() {
    let img = DomNode::new_element("img");
    let stored = "https://x.test/a.png|https://y.test/b.png";
    assert!(attribute_equals(&img, "src", Some(stored), Some("https://x.test/other.png"), &no_prefixes()));
    assert!(attribute_equals(&img, "src", Some(stored), Some("https://y.test/"), &no_prefixes()));
    assert!(!attribute_equals(&img, "src", Some(stored), Some("https://z.test/a.png"), &no_prefixes()));
    // Unparsable subjects are harmless.
    assert!(attribute_equals(&img, "src", Some(stored), Some("not a url"), &no_prefixes()));
  }

  #[test]
  fn merge_is_idempotent_for_matching_values() {
    let div = DomNode::new_element("div");
    let merged = merge_shadow_attribute(&div, "name", Some("a|b"), Some("b"), &no_prefixes());
    assert_eq!(merged, Some("a|b".to_string()));
  }

  #[test]
  fn merge_appends_new_values() {
    let div = DomNode::new_element("div");
    let merged = merge_shadow_attribute(&div, "name", Some("a"), Some("b"), &no_prefixes());
    assert_eq!(merged, Some("a|b".to_string()));
    let merged = merge_shadow_attribute(&div, "name", merged.as_deref(), Some("c|d"), &no_prefixes());
    assert_eq!(merged, Some("a|b|c\\|d".to_string()));
  }

  #[test]
  fn merged_patterns_keep_matching_old_values() {
    let div = DomNode::new_element("div");
    let mut stored: Option<String> = None;
    for value in ["first", "se|cond", "thi*rd"] {
      stored = merge_shadow_attribute(&div, "name", stored.as_deref(), Some(value), &no_prefixes());
    }
    let stored = stored.unwrap();
    for value in ["first", "se|cond", "thi*rd"] {
      assert!(
        attribute_equals(&div, "name", Some(&stored), Some(value), &no_prefixes()),
        "{:?} must stay matched by {:?}",
        value,
        stored
      );
    }
  }

  #[test]
  fn property_patterns_widen_numerically() {
    let parse = |text: &str| parse_single_value(PropertyId::FontSize, text);
    let stored = "10px|20px";
    assert!(property_equals(PropertyId::FontSize, Some(stored), parse("15px").as_ref()));
    assert!(property_equals(PropertyId::FontSize, Some(stored), parse("10px").as_ref()));
    assert!(!property_equals(PropertyId::FontSize, Some(stored), parse("25px").as_ref()));
  }

  #[test]
  fn property_merge_stores_first_value_verbatim() {
    let new_value = parse_single_value(PropertyId::Color, "red");
    let merged = merge_shadow_property(PropertyId::Color, None, new_value.as_ref());
    assert_eq!(merged, Some("rgb(255, 0, 0)".to_string()));

    let merged = merge_shadow_property(PropertyId::Color, None, None);
    assert_eq!(merged, None);
  }

  #[test]
  fn property_merge_is_idempotent_on_match() {
    let new_value = parse_single_value(PropertyId::Color, "blue");
    // Any color matches the stored color structurally, so no growth.
    let merged = merge_shadow_property(PropertyId::Color, Some("rgb(255, 0, 0)"), new_value.as_ref());
    assert_eq!(merged, Some("rgb(255, 0, 0)".to_string()));
  }

  #[test]
  fn property_merge_appends_unmatched_values() {
    let new_value = parse_single_value(PropertyId::Display, "flex");
    let merged = merge_shadow_property(PropertyId::Display, Some("block"), new_value.as_ref());
    assert_eq!(merged, Some("block|flex".to_string()));
  }
}

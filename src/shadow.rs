//! Shadow-tree engine
//!
//! The shadow tree (the "DOM constraint") is a side document whose elements
//! describe the set of permitted live-DOM states. This module locates a
//! live node's counterpart in the shadow tree, extends the shadow tree with
//! newly observed structure, and checks pending mutations against it.
//!
//! Live ancestors are collected bottom-up into a vector and re-walked
//! top-down against shadow children; document fragments and shadow roots
//! are transparent. A shadow element carrying `dtt-whitelist` turns its
//! subtree into a trusted region matched positionally-free.

use crate::attributes;
use crate::dom;
use crate::dom::DomNode;
use crate::dom::Handle;
use crate::frame::Frame;
use crate::guard;
use crate::matching;
use log::info;
use std::rc::Rc;

/// Outcome of locating a live node in the shadow tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowTreeMatchResult {
  Found,
  NotFound,
  RootIsNotDocument,
  WhitelistMatch,
}

/// Locate-level equality: tags agree and the shadow's `dtt-id` pattern
/// admits the live element's id.
pub fn is_equal_in_shadow_tree(shadow: &Handle, actual: &Handle, id_prefixes: &[String]) -> bool {
  if shadow.tag_name() != actual.tag_name() {
    return false;
  }
  matching::attribute_equals(
    actual,
    "dtt-id",
    shadow.attribute("dtt-id").as_deref(),
    actual.id_attribute().as_deref(),
    id_prefixes,
  )
}

/// Full node matching: locate-level equality plus every monitored attribute
/// of the live element admitted by the shadow's same-named pattern.
pub fn matching_node(node: &Handle, shadow_node: &Handle, id_prefixes: &[String]) -> Option<Handle> {
  if !node.is_element() || !shadow_node.is_element() {
    return None;
  }
  if node.tag_name() != shadow_node.tag_name() {
    return None;
  }
  if !matching::attribute_equals(
    node,
    "dtt-id",
    shadow_node.attribute("dtt-id").as_deref(),
    node.id_attribute().as_deref(),
    id_prefixes,
  ) {
    return None;
  }

  for (name, value) in node.attributes() {
    if name == "id" {
      // Identity was already matched through the dtt-id pattern; authored
      // shadows carry only that.
      continue;
    }
    if !attributes::should_monitor_attribute(node, &name) {
      continue;
    }
    if !matching::attribute_equals(node, &name, shadow_node.attribute(&name).as_deref(), Some(&value), id_prefixes) {
      return None;
    }
  }

  Some(shadow_node.clone())
}

fn find_matching_shadow_child(shadow_ptr: &Handle, ancestor: &Handle, id_prefixes: &[String]) -> Option<Handle> {
  for child in shadow_ptr.children() {
    if !child.is_element() {
      continue;
    }
    if is_equal_in_shadow_tree(&child, ancestor, id_prefixes) {
      return Some(child);
    }
  }
  None
}

/// Read-only locate walk from the shadow root along the live ancestor
/// chain. Never mutates the shadow tree.
pub fn locate_node_in_shadow_tree(frame: &Frame, node: &Handle) -> (ShadowTreeMatchResult, Option<Handle>) {
  let ancestors = dom::collect_ancestors(node);
  let Some(root) = ancestors.last() else {
    return (ShadowTreeMatchResult::RootIsNotDocument, None);
  };
  if !root.is_document() {
    return (ShadowTreeMatchResult::RootIsNotDocument, None);
  }
  let ancestors = &ancestors[..ancestors.len() - 1];

  let id_prefixes = frame.id_prefixes();
  let mut shadow_ptr = frame.dom_constraint();

  let mut i = ancestors.len();
  while i > 0 {
    i -= 1;
    let ancestor = &ancestors[i];
    if ancestor.is_fragment_like() {
      continue;
    }
    debug_assert!(ancestor.is_element());

    match find_matching_shadow_child(&shadow_ptr, ancestor, &id_prefixes) {
      Some(found_child) => {
        shadow_ptr = found_child;
        if shadow_ptr.has_attribute("dtt-whitelist") {
          let result = if i > 0 {
            ShadowTreeMatchResult::WhitelistMatch
          } else {
            ShadowTreeMatchResult::Found
          };
          return (result, Some(shadow_ptr));
        }
      }
      None => return (ShadowTreeMatchResult::NotFound, None),
    }
  }
  (ShadowTreeMatchResult::Found, Some(shadow_ptr))
}

/// Record-mode locate walk that creates minimal shadow ancestors where the
/// walk stalls. Created ancestors mirror only the live id: their other
/// attributes predate observation and their state is unknown.
pub fn locate_node_and_create_ancestors_in_shadow_tree(
  frame: &Frame,
  node: &Handle,
) -> (ShadowTreeMatchResult, Option<Handle>) {
  let ancestors = dom::collect_ancestors(node);
  let Some(root) = ancestors.last() else {
    return (ShadowTreeMatchResult::RootIsNotDocument, None);
  };
  if !root.is_document() || !Rc::ptr_eq(root, &frame.document()) {
    return (ShadowTreeMatchResult::RootIsNotDocument, None);
  }
  let ancestors = &ancestors[..ancestors.len() - 1];

  let id_prefixes = frame.id_prefixes();
  let mut shadow_ptr = frame.dom_constraint();
  let mut shadow_ptr_is_root = true;
  let mut shadow_ptr_is_html = true;

  let mut i = ancestors.len();
  while i > 0 {
    let ancestor = &ancestors[i - 1];
    if ancestor.is_fragment_like() {
      i -= 1;
      continue;
    }
    debug_assert!(ancestor.is_element());

    match find_matching_shadow_child(&shadow_ptr, ancestor, &id_prefixes) {
      Some(found_child) => {
        shadow_ptr = found_child;
        if shadow_ptr_is_root {
          shadow_ptr_is_root = false;
        } else if shadow_ptr_is_html {
          shadow_ptr_is_html = false;
        }
        i -= 1;
      }
      None => break,
    }
  }

  // Add missing shadow ancestors down to the node itself.
  while i > 0 {
    i -= 1;
    let ancestor = &ancestors[i];
    if ancestor.is_fragment_like() {
      continue;
    }
    let Some(tag) = ancestor.tag_name() else {
      continue;
    };
    let shadow_element = DomNode::new_element(tag);
    if let Some(id) = ancestor.id_attribute() {
      shadow_element.set_attribute("dtt-id", &id);
    }

    if shadow_ptr_is_html && tag != "HEAD" && tag != "BODY" {
      shadow_element.set_attribute("dtt-dangling", "");
    }
    dom::append_child(&shadow_ptr, shadow_element.clone());
    shadow_ptr = shadow_element;
  }
  (ShadowTreeMatchResult::Found, Some(shadow_ptr))
}

/// Records an inserted subtree under the located shadow parent, merging
/// into existing shadow variants where one matches.
pub fn create_shadow_node(shadow_ptr: &Handle, node: &Handle, id_prefixes: &[String]) {
  if node.is_fragment_like() {
    for child in node.children() {
      create_shadow_node(shadow_ptr, &child, id_prefixes);
    }
    return;
  }

  // Non-element nodes get no shadow; they are flat and usually benign.
  let Some(tag) = node.tag_name() else {
    return;
  };

  let mut shadow_element: Option<Handle> = None;
  for sibling in shadow_ptr.children() {
    if !sibling.is_element() {
      continue;
    }
    if is_equal_in_shadow_tree(&sibling, node, id_prefixes) {
      shadow_element = Some(sibling);
      break;
    }
  }

  let shadow_element = match shadow_element {
    None => {
      let shadow_element = DomNode::new_element(tag);
      for (name, value) in node.attributes() {
        if name == "id" {
          shadow_element.set_attribute("dtt-id", &value);
        }
        if attributes::should_monitor_attribute(node, &name) {
          shadow_element.set_attribute(&name, &value);
        }
      }

      if shadow_ptr.tag_name() == Some("HTML") && tag != "HEAD" && tag != "BODY" {
        shadow_element.set_attribute("dtt-dangling", "");
      }

      dom::append_child(shadow_ptr, shadow_element.clone());
      guard::output_element_insertion(shadow_ptr, &shadow_element);
      shadow_element
    }
    Some(shadow_element) => {
      for (name, value) in node.attributes() {
        if attributes::should_monitor_attribute(node, &name) {
          let merged = matching::merge_shadow_attribute(
            node,
            &name,
            shadow_element.attribute(&name).as_deref(),
            Some(&value),
            id_prefixes,
          );
          if let Some(merged) = merged {
            shadow_element.set_attribute(&name, &merged);
          }
        }
      }
      shadow_element
    }
  };

  for child in node.children() {
    if child.is_shadow_root() {
      continue;
    }
    create_shadow_node(&shadow_element, &child, id_prefixes);
  }
}

/// Structural enforcement: every element under `node` needs a matching
/// shadow node at the corresponding position under `shadow_parent`.
pub fn has_matching_subtree_in_shadow_tree(node: &Handle, shadow_parent: &Handle, id_prefixes: &[String]) -> bool {
  if node.is_fragment_like() {
    for child in node.children() {
      if !has_matching_subtree_in_shadow_tree(&child, shadow_parent, id_prefixes) {
        return false;
      }
    }
    return true;
  }

  if !node.is_element() {
    return true;
  }

  let mut shadow_node: Option<Handle> = None;
  for child in shadow_parent.children() {
    if let Some(matched) = matching_node(node, &child, id_prefixes) {
      shadow_node = Some(matched);
      break;
    }
  }
  let Some(shadow_node) = shadow_node else {
    info!(
      "matching shadow node not found for {} under {}",
      dom::create_markup(node),
      dom::node_path(shadow_parent)
    );
    return false;
  };

  for child in node.children() {
    if child.is_shadow_root() {
      continue;
    }
    if !has_matching_subtree_in_shadow_tree(&child, &shadow_node, id_prefixes) {
      return false;
    }
  }
  true
}

/// Whether any shadow node anywhere under `shadow_parent` matches `node`.
pub fn has_matching_node_in_shadow_tree(node: &Handle, shadow_parent: &Handle, id_prefixes: &[String]) -> bool {
  for child in shadow_parent.children() {
    if matching_node(node, &child, id_prefixes).is_some()
      || has_matching_node_in_shadow_tree(node, &child, id_prefixes)
    {
      return true;
    }
  }
  false
}

/// Whitelist enforcement: every element of the inserted subtree must match
/// some shadow node in the trusted region, position-free.
pub fn matches_node_whitelist_in_shadow_tree(node: &Handle, shadow_parent: &Handle, id_prefixes: &[String]) -> bool {
  if node.is_fragment_like() {
    for child in node.children() {
      if !matches_node_whitelist_in_shadow_tree(&child, shadow_parent, id_prefixes) {
        return false;
      }
    }
    return true;
  }

  if !node.is_element() {
    return true;
  }

  if !has_matching_node_in_shadow_tree(node, shadow_parent, id_prefixes) {
    info!(
      "no whitelisted shadow node matches {} at {}",
      dom::create_markup(node),
      dom::node_path(node)
    );
    return false;
  }

  for child in node.children() {
    if child.is_shadow_root() {
      continue;
    }
    if !matches_node_whitelist_in_shadow_tree(&child, shadow_parent, id_prefixes) {
      return false;
    }
  }
  true
}

/// Attribute-whitelist enforcement: some shadow element in the trusted
/// region must carry a pattern admitting the new value.
pub fn matches_attribute_whitelist_in_shadow_tree(
  element: &Handle,
  attribute_name: &str,
  attribute_value: Option<&str>,
  shadow_parent: &Handle,
  id_prefixes: &[String],
) -> bool {
  for child in shadow_parent.children() {
    if !child.is_element() {
      continue;
    }
    if matching::attribute_equals(
      element,
      attribute_name,
      child.attribute(attribute_name).as_deref(),
      attribute_value,
      id_prefixes,
    ) || matches_attribute_whitelist_in_shadow_tree(element, attribute_name, attribute_value, &child, id_prefixes)
    {
      return true;
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dom::append_child;

  fn no_prefixes() -> Vec<String> {
    Vec::new()
  }

  fn frame_with_live_spine() -> (std::rc::Rc<Frame>, Handle) {
    let frame = Frame::new();
    let html = DomNode::new_element("html");
    let body = DomNode::new_element("body");
    append_child(&frame.document(), html.clone());
    append_child(&html, body.clone());
    (frame, body)
  }

  fn shadow_spine(frame: &Frame) -> (Handle, Handle) {
    let html = DomNode::new_element("html");
    let body = DomNode::new_element("body");
    append_child(&frame.dom_constraint(), html.clone());
    append_child(&html, body.clone());
    (html, body)
  }

  #[test]
  fn locate_finds_matching_chain() {
    let (frame, live_body) = frame_with_live_spine();
    let (_, shadow_body) = shadow_spine(&frame);

    let (result, located) = locate_node_in_shadow_tree(&frame, &live_body);
    assert_eq!(result, ShadowTreeMatchResult::Found);
    assert!(Rc::ptr_eq(&located.unwrap(), &shadow_body));
  }

  #[test]
  fn locate_reports_not_found_on_stall() {
    let (frame, live_body) = frame_with_live_spine();
    let div = DomNode::new_element("div");
    append_child(&live_body, div.clone());
    shadow_spine(&frame);

    let (result, located) = locate_node_in_shadow_tree(&frame, &div);
    assert_eq!(result, ShadowTreeMatchResult::NotFound);
    assert!(located.is_none());
  }

  #[test]
  fn locate_reports_disconnected_nodes() {
    let frame = Frame::new();
    let detached = DomNode::new_element("div");
    let (result, _) = locate_node_in_shadow_tree(&frame, &detached);
    assert_eq!(result, ShadowTreeMatchResult::RootIsNotDocument);
  }

  #[test]
  fn locate_distinguishes_whitelist_depth() {
    let (frame, live_body) = frame_with_live_spine();
    let live_region = DomNode::new_element("div");
    live_region.set_attribute("id", "trusted");
    append_child(&live_body, live_region.clone());
    let live_inner = DomNode::new_element("span");
    append_child(&live_region, live_inner.clone());

    let (_, shadow_body) = shadow_spine(&frame);
    let shadow_region = DomNode::new_element("div");
    shadow_region.set_attribute("dtt-id", "trusted");
    shadow_region.set_attribute("dtt-whitelist", "");
    append_child(&shadow_body, shadow_region.clone());

    // The whitelist node itself is Found; anything deeper is WhitelistMatch.
    let (result, _) = locate_node_in_shadow_tree(&frame, &live_region);
    assert_eq!(result, ShadowTreeMatchResult::Found);
    let (result, located) = locate_node_in_shadow_tree(&frame, &live_inner);
    assert_eq!(result, ShadowTreeMatchResult::WhitelistMatch);
    assert!(Rc::ptr_eq(&located.unwrap(), &shadow_region));
  }

  #[test]
  fn create_ancestors_mirrors_ids_only() {
    let (frame, live_body) = frame_with_live_spine();
    let div = DomNode::new_element("div");
    div.set_attribute("id", "a");
    div.set_attribute("name", "n");
    append_child(&live_body, div.clone());
    let span = DomNode::new_element("span");
    append_child(&div, span.clone());

    let (result, located) = locate_node_and_create_ancestors_in_shadow_tree(&frame, &span);
    assert_eq!(result, ShadowTreeMatchResult::Found);
    let shadow_span = located.unwrap();
    assert_eq!(shadow_span.tag_name(), Some("SPAN"));

    let shadow_div = shadow_span.parent().unwrap();
    assert_eq!(shadow_div.attribute("dtt-id"), Some("a".to_string()));
    // Monitored attributes are not cloned for pre-existing ancestors.
    assert_eq!(shadow_div.attribute("name"), None);
  }

  #[test]
  fn create_ancestors_rejects_foreign_documents() {
    let frame = Frame::new();
    let other_document = DomNode::new_document();
    let div = DomNode::new_element("div");
    append_child(&other_document, div.clone());

    let (result, _) = locate_node_and_create_ancestors_in_shadow_tree(&frame, &div);
    assert_eq!(result, ShadowTreeMatchResult::RootIsNotDocument);
  }

  #[test]
  fn create_shadow_node_mirrors_monitored_attributes() {
    let shadow_body = DomNode::new_element("body");
    let a = DomNode::new_element("a");
    a.set_attribute("id", "link");
    a.set_attribute("href", "https://x.test/");
    a.set_attribute("class", "big");

    create_shadow_node(&shadow_body, &a, &no_prefixes());
    let shadow_a = shadow_body.first_child().unwrap();
    assert_eq!(shadow_a.attribute("dtt-id"), Some("link".to_string()));
    assert_eq!(shadow_a.attribute("id"), Some("link".to_string()));
    assert_eq!(shadow_a.attribute("href"), Some("https://x.test/".to_string()));
    assert_eq!(shadow_a.attribute("class"), None);
  }

  #[test]
  fn create_shadow_node_merges_into_existing_variant() {
    let shadow_body = DomNode::new_element("body");
    let first = DomNode::new_element("a");
    first.set_attribute("href", "https://x.test/");
    create_shadow_node(&shadow_body, &first, &no_prefixes());

    let second = DomNode::new_element("a");
    second.set_attribute("href", "https://y.test/");
    create_shadow_node(&shadow_body, &second, &no_prefixes());

    assert_eq!(shadow_body.children().len(), 1);
    let shadow_a = shadow_body.first_child().unwrap();
    assert_eq!(shadow_a.attribute("href"), Some("https://x.test/|https://y.test/".to_string()));
  }

  #[test]
  fn create_shadow_node_flattens_fragments_and_marks_dangling() {
    let shadow_html = DomNode::new_element("html");
    let fragment = DomNode::new_fragment();
    let body = DomNode::new_element("body");
    let aside = DomNode::new_element("aside");
    append_child(&fragment, body.clone());
    append_child(&fragment, aside.clone());

    create_shadow_node(&shadow_html, &fragment, &no_prefixes());
    let children = shadow_html.children();
    assert_eq!(children.len(), 2);
    assert!(!children[0].has_attribute("dtt-dangling"));
    assert!(children[1].has_attribute("dtt-dangling"));
  }

  #[test]
  fn subtree_matching_recurses() {
    let shadow_body = DomNode::new_element("body");
    let recorded = DomNode::new_element("div");
    recorded.set_attribute("id", "a");
    let recorded_child = DomNode::new_element("span");
    append_child(&recorded, recorded_child.clone());
    create_shadow_node(&shadow_body, &recorded, &no_prefixes());

    let same = DomNode::new_element("div");
    same.set_attribute("id", "a");
    append_child(&same, DomNode::new_element("span"));
    assert!(has_matching_subtree_in_shadow_tree(&same, &shadow_body, &no_prefixes()));

    let different_id = DomNode::new_element("div");
    different_id.set_attribute("id", "b");
    assert!(!has_matching_subtree_in_shadow_tree(&different_id, &shadow_body, &no_prefixes()));

    let extra_child = DomNode::new_element("div");
    extra_child.set_attribute("id", "a");
    append_child(&extra_child, DomNode::new_element("table"));
    assert!(!has_matching_subtree_in_shadow_tree(&extra_child, &shadow_body, &no_prefixes()));
  }

  #[test]
  fn whitelist_matches_anywhere_in_region() {
    let shadow_region = DomNode::new_element("div");
    let shadow_wrapper = DomNode::new_element("section");
    let shadow_leaf = DomNode::new_element("span");
    shadow_leaf.set_attribute("dtt-id", "leaf");
    append_child(&shadow_region, shadow_wrapper.clone());
    append_child(&shadow_wrapper, shadow_leaf.clone());

    // The live node sits at a different depth than the recorded one.
    let live = DomNode::new_element("span");
    live.set_attribute("id", "leaf");
    assert!(matches_node_whitelist_in_shadow_tree(&live, &shadow_region, &no_prefixes()));

    let unknown = DomNode::new_element("table");
    assert!(!matches_node_whitelist_in_shadow_tree(&unknown, &shadow_region, &no_prefixes()));
  }

  #[test]
  fn attribute_whitelist_scans_descendants() {
    let shadow_region = DomNode::new_element("div");
    let shadow_inner = DomNode::new_element("p");
    shadow_inner.set_attribute("name", "a|b");
    append_child(&shadow_region, shadow_inner.clone());

    let live = DomNode::new_element("p");
    assert!(matches_attribute_whitelist_in_shadow_tree(
      &live,
      "name",
      Some("b"),
      &shadow_region,
      &no_prefixes()
    ));
    assert!(!matches_attribute_whitelist_in_shadow_tree(
      &live,
      "name",
      Some("c"),
      &shadow_region,
      &no_prefixes()
    ));
  }
}

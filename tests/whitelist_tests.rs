use domguard::dom::append_child;
use domguard::dom::DomNode;
use domguard::DomGuard;
use domguard::Frame;
use domguard::Handle;
use std::rc::Rc;

fn setup_with_constraint(constraint_html: &str) -> (Rc<Frame>, Rc<DomGuard>, Handle) {
  let frame = Frame::new();
  let guard = DomGuard::new(&frame);
  guard.frame_attached_to_parent(&frame);
  frame.set_dom_constraint_html(constraint_html).unwrap();
  frame.set_dom_constraint_mode("e");

  let html = DomNode::new_element("html");
  let body = DomNode::new_element("body");
  append_child(&frame.document(), html.clone());
  append_child(&html, body.clone());
  (frame, guard, body)
}

const WIDGET_REGION: &str = concat!(
  "<div dtt-id=\"widget\" dtt-whitelist=\"\">",
  "<section><span dtt-id=\"w-*\"></span></section>",
  "<p name=\"a|b\"></p>",
  "</div>"
);

#[test]
fn whitelisted_structures_match_position_free() {
  let (frame, guard, body) = setup_with_constraint(WIDGET_REGION);
  let region = DomNode::new_element("div");
  region.set_attribute("id", "widget");
  append_child(&body, region.clone());
  let section = DomNode::new_element("section");
  append_child(&region, section.clone());

  // The recorded span and paragraph live elsewhere in the region; inside a
  // whitelisted subtree any recorded shape is admitted anywhere.
  let span = DomNode::new_element("span");
  span.set_attribute("id", "w-17");
  assert!(guard.will_insert_dom_node(&frame, &section, &span, None));

  let paragraph = DomNode::new_element("p");
  assert!(guard.will_insert_dom_node(&frame, &section, &paragraph, None));

  // Unknown shapes anywhere in the inserted tree are denied.
  let bad_wrapper = DomNode::new_element("section");
  append_child(&bad_wrapper, DomNode::new_element("table"));
  assert!(!guard.will_insert_dom_node(&frame, &section, &bad_wrapper, None));

  let mismatched_id = DomNode::new_element("span");
  mismatched_id.set_attribute("id", "other");
  assert!(!guard.will_insert_dom_node(&frame, &section, &mismatched_id, None));

  guard.shutdown();
}

#[test]
fn insertion_at_the_whitelist_node_itself_is_structural() {
  let (frame, guard, body) = setup_with_constraint(WIDGET_REGION);
  let region = DomNode::new_element("div");
  region.set_attribute("id", "widget");
  append_child(&body, region.clone());

  // Directly under the whitelist node the ordinary positional rule still
  // applies: a recorded direct child is admitted, a deeper shape is not.
  let section = DomNode::new_element("section");
  assert!(guard.will_insert_dom_node(&frame, &region, &section, None));

  let span = DomNode::new_element("span");
  span.set_attribute("id", "w-17");
  assert!(!guard.will_insert_dom_node(&frame, &region, &span, None));
  guard.shutdown();
}

#[test]
fn attribute_changes_in_whitelisted_regions_scan_all_patterns() {
  let (frame, guard, body) = setup_with_constraint(WIDGET_REGION);
  let region = DomNode::new_element("div");
  region.set_attribute("id", "widget");
  append_child(&body, region.clone());
  let paragraph = DomNode::new_element("p");
  append_child(&region, paragraph.clone());

  assert!(guard.will_modify_dom_attr(&frame, &paragraph, "name", None, Some("a")));
  assert!(guard.will_modify_dom_attr(&frame, &paragraph, "name", None, Some("b")));
  assert!(!guard.will_modify_dom_attr(&frame, &paragraph, "name", None, Some("c")));

  // Unmonitored attributes stay out of scope even inside the region.
  assert!(guard.will_modify_dom_attr(&frame, &paragraph, "class", None, Some("anything")));
  guard.shutdown();
}

#[test]
fn whitelist_region_styles_match_stored_patterns() {
  let constraint = concat!(
    "<div dtt-id=\"widget\" dtt-whitelist=\"\">",
    "<p dtt-s-display=\"inline|inline-block\"></p>",
    "</div>"
  );
  let (frame, guard, body) = setup_with_constraint(constraint);
  let region = DomNode::new_element("div");
  region.set_attribute("id", "widget");
  append_child(&body, region.clone());
  let paragraph = DomNode::new_element("p");
  append_child(&region, paragraph.clone());

  let inline = domguard::ComputedStyle::from_declarations(&[("display", "inline")]);
  assert!(guard.will_set_style(&frame, &paragraph, &inline));

  let flex = domguard::ComputedStyle::from_declarations(&[("display", "flex")]);
  assert!(!guard.will_set_style(&frame, &paragraph, &flex));
  guard.shutdown();
}

#[test]
fn whitelist_region_styles_match_descendant_computed_styles() {
  let (frame, guard, body) = setup_with_constraint(WIDGET_REGION);
  let region = DomNode::new_element("div");
  region.set_attribute("id", "widget");
  append_child(&body, region.clone());
  let paragraph = DomNode::new_element("p");
  append_child(&region, paragraph.clone());

  // Give one shadow descendant a computed style; the fast pass clears the
  // modified property against it without any stored pattern.
  let constraint = frame.dom_constraint();
  let shadow_region = constraint
    .first_child()
    .unwrap()
    .children()
    .into_iter()
    .find(|c| c.tag_name() == Some("BODY"))
    .unwrap()
    .first_child()
    .unwrap();
  let shadow_p = shadow_region
    .children()
    .into_iter()
    .find(|c| c.tag_name() == Some("P"))
    .unwrap();
  shadow_p.set_computed_style(Some(domguard::ComputedStyle::from_declarations(&[(
    "text-align",
    "center",
  )])));

  let centered = domguard::ComputedStyle::from_declarations(&[("text-align", "center")]);
  assert!(guard.will_set_style(&frame, &paragraph, &centered));

  let justified = domguard::ComputedStyle::from_declarations(&[("text-align", "justify")]);
  assert!(!guard.will_set_style(&frame, &paragraph, &justified));
  guard.shutdown();
}

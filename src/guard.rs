//! Decision gate
//!
//! The four `will_*` hooks the rendering engine calls on every pending
//! mutation, plus the frame lifecycle entry points. In record mode the
//! hooks extend the shadow tree and always allow; in enforce mode they
//! check the mutation against the shadow tree and deny anything it does
//! not account for. Rejections are logged with the hook, the match result,
//! the node path and the offending value; the host drops the mutation
//! silently.

use crate::css::computed::properties_equal_fast;
use crate::css::computed::ComputedStyle;
use crate::css::computed::FastEquality;
use crate::css::registry;
use crate::css::registry::PropertyId;
use crate::css::value::CssValue;
use crate::dom;
use crate::dom::Handle;
use crate::frame::Frame;
use crate::frame::ModeKind;
use crate::matching;
use crate::shadow;
use crate::shadow::ShadowTreeMatchResult;
use log::debug;
use log::info;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

/// The per-frame policy engine.
///
/// Owns the monitored-property list seeded at frame attach and the scratch
/// vectors used during style comparison; both are only touched during hook
/// execution on the host's main thread.
pub struct DomGuard {
  local_root: RefCell<Option<Weak<Frame>>>,
  css_property_ids: RefCell<Vec<PropertyId>>,
  css_property_values: RefCell<Vec<Option<CssValue>>>,
  is_css_property_modified: RefCell<Vec<bool>>,
  modified_property_count: Cell<usize>,
}

impl DomGuard {
  /// Creates a guard bound to its local root frame and registers it with
  /// the frame's probe sink.
  pub fn new(frame: &Rc<Frame>) -> Rc<DomGuard> {
    let guard = Rc::new(DomGuard {
      local_root: RefCell::new(Some(Rc::downgrade(frame))),
      css_property_ids: RefCell::new(Vec::new()),
      css_property_values: RefCell::new(Vec::new()),
      is_css_property_modified: RefCell::new(Vec::new()),
      modified_property_count: Cell::new(0),
    });
    frame.probe_sink().add_guard(Rc::downgrade(&guard));
    guard
  }

  /// Deregisters from the probe sink and revokes the frame handle. Must be
  /// called before the guard is dropped.
  pub fn shutdown(&self) {
    let Some(local_root) = self.local_root.borrow_mut().take() else {
      return;
    };
    if let Some(frame) = local_root.upgrade() {
      frame.probe_sink().remove_guard(self);
    }
  }

  // ==========================================================================
  // Hooks
  // ==========================================================================

  /// Mediates insertion of `node` under `parent` before `next`.
  pub fn will_insert_dom_node(&self, frame: &Frame, parent: &Handle, node: &Handle, _next: Option<&Handle>) -> bool {
    let mut allowed = true;

    if !frame.document().document_has_window() {
      return allowed;
    }

    if dom::is_descendant_of_user_agent_shadow_root(parent) {
      dom::execute_pending_attribute_changes(node);
      return allowed;
    }

    if frame.document().document_is_parsing() {
      dom::execute_pending_attribute_changes(node);
      return allowed;
    }

    match frame.mode_kind() {
      Some(ModeKind::Record) => {
        let (match_result, shadow_ptr) = shadow::locate_node_and_create_ancestors_in_shadow_tree(frame, parent);
        let Some(shadow_ptr) = shadow_ptr else {
          return allowed;
        };
        if match_result != ShadowTreeMatchResult::Found {
          return allowed;
        }

        shadow::create_shadow_node(&shadow_ptr, node, &frame.id_prefixes());
        dom::execute_pending_attribute_changes(node);
      }
      Some(ModeKind::Enforce) => {
        let (match_result, shadow_parent) = shadow::locate_node_in_shadow_tree(frame, parent);
        let id_prefixes = frame.id_prefixes();

        allowed = match (match_result, shadow_parent) {
          (ShadowTreeMatchResult::RootIsNotDocument, _) => true,
          (ShadowTreeMatchResult::Found, Some(shadow_parent)) => {
            shadow::has_matching_subtree_in_shadow_tree(node, &shadow_parent, &id_prefixes)
          }
          (ShadowTreeMatchResult::WhitelistMatch, Some(shadow_parent)) => {
            shadow::matches_node_whitelist_in_shadow_tree(node, &shadow_parent, &id_prefixes)
          }
          _ => false,
        };

        if !allowed {
          info!(
            "InsertDOMNode rejected, match_result = {:?}, parent = {}",
            match_result,
            dom::node_path(parent)
          );
        } else if match_result != ShadowTreeMatchResult::RootIsNotDocument {
          dom::execute_pending_attribute_changes(node);
        }
      }
      None => {}
    }
    allowed
  }

  /// Mediates an attribute change on `element`.
  pub fn will_modify_dom_attr(
    &self,
    frame: &Frame,
    element: &Handle,
    attribute_name: &str,
    _old_value: Option<&str>,
    new_value: Option<&str>,
  ) -> bool {
    let mut allowed = true;

    if !frame.document().document_has_window() {
      return allowed;
    }

    if dom::is_descendant_of_user_agent_shadow_root(element) {
      return allowed;
    }

    if frame.document().document_is_parsing() {
      return allowed;
    }

    if !crate::attributes::should_monitor_attribute(element, attribute_name) {
      return allowed;
    }

    match frame.mode_kind() {
      Some(ModeKind::Record) => {
        let (match_result, shadow_ptr) = shadow::locate_node_and_create_ancestors_in_shadow_tree(frame, element);
        let Some(shadow_ptr) = shadow_ptr else {
          return allowed;
        };
        if match_result != ShadowTreeMatchResult::Found {
          return allowed;
        }
        // The shadow element stands in for the live one here; its document
        // has no frame, so no id-prefix whitelist applies.
        let merged = matching::merge_shadow_attribute(
          &shadow_ptr,
          attribute_name,
          shadow_ptr.attribute(attribute_name).as_deref(),
          new_value,
          &[],
        );
        if let Some(merged) = merged {
          shadow_ptr.set_attribute(attribute_name, &merged);
        }
      }
      Some(ModeKind::Enforce) => {
        let (match_result, shadow_ptr) = shadow::locate_node_in_shadow_tree(frame, element);
        let id_prefixes = frame.id_prefixes();

        allowed = match (match_result, &shadow_ptr) {
          (ShadowTreeMatchResult::RootIsNotDocument, _) => true,
          (ShadowTreeMatchResult::Found, Some(shadow_ptr)) => matching::attribute_equals(
            element,
            attribute_name,
            shadow_ptr.attribute(attribute_name).as_deref(),
            new_value,
            &id_prefixes,
          ),
          (ShadowTreeMatchResult::WhitelistMatch, Some(shadow_ptr)) => {
            shadow::matches_attribute_whitelist_in_shadow_tree(
              element,
              attribute_name,
              new_value,
              shadow_ptr,
              &id_prefixes,
            )
          }
          _ => false,
        };

        if !allowed {
          let allowed_values = shadow_ptr
            .as_ref()
            .and_then(|shadow_ptr| shadow_ptr.attribute(attribute_name))
            .unwrap_or_default();
          info!(
            "ModifyDOMAttr rejected, match_result = {:?}, attribute_name = {}, attribute_value = {}, allowed_values = {}, element = {}",
            match_result,
            attribute_name,
            new_value.unwrap_or(""),
            allowed_values,
            dom::node_path(element)
          );
        }
      }
      None => {}
    }
    allowed
  }

  /// Mediates removal of `node`. Removal cannot drive the document outside
  /// the recorded set, so it is always allowed.
  pub fn will_remove_dom_node(&self, frame: &Frame, node: &Handle) -> bool {
    let allowed = true;

    if !frame.document().document_has_window() {
      return allowed;
    }

    if dom::is_descendant_of_user_agent_shadow_root(node) {
      return allowed;
    }

    allowed
  }

  /// Mediates a computed-style change on `element`.
  pub fn will_set_style(&self, frame: &Frame, element: &Handle, style: &ComputedStyle) -> bool {
    let mut allowed = true;

    // Moving an element into a window always triggers a style set.
    if !frame.document().document_has_window() {
      return allowed;
    }

    if dom::is_descendant_of_user_agent_shadow_root(element) {
      return allowed;
    }

    if frame.document().document_is_parsing() {
      return allowed;
    }

    match frame.mode_kind() {
      Some(ModeKind::Record) => {
        let (match_result, shadow_ptr) = shadow::locate_node_and_create_ancestors_in_shadow_tree(frame, element);
        let Some(shadow_ptr) = shadow_ptr else {
          return allowed;
        };
        if match_result != ShadowTreeMatchResult::Found {
          return allowed;
        }

        let current_style = element.computed_style();
        self.collect_style_changes(current_style.as_ref(), style, false);

        let property_ids = self.css_property_ids.borrow().clone();
        for (count, property) in property_ids.iter().enumerate() {
          if !self.is_css_property_modified.borrow()[count] {
            continue;
          }
          let shadow_attribute_name = format!("dtt-s-{}", property.name());
          let merged = matching::merge_shadow_property(
            *property,
            shadow_ptr.attribute(&shadow_attribute_name).as_deref(),
            style.value(*property),
          );
          match merged {
            Some(merged) => shadow_ptr.set_attribute(&shadow_attribute_name, &merged),
            None => shadow_ptr.remove_attribute(&shadow_attribute_name),
          }
        }
      }
      Some(ModeKind::Enforce) => {
        let (match_result, shadow_ptr) = shadow::locate_node_in_shadow_tree(frame, element);
        let Some(shadow_ptr) = shadow_ptr else {
          info!("SetStyle rejected, match_result = {:?}, element = {}", match_result, dom::node_path(element));
          return false;
        };

        match match_result {
          ShadowTreeMatchResult::Found => {
            let current_style = element.computed_style();
            let property_ids = self.css_property_ids.borrow().clone();
            for property in property_ids {
              let new_value = style.value(property);
              let new_css_text = new_value.map(CssValue::to_css_string).unwrap_or_default();
              match current_style.as_ref() {
                None => {
                  if new_css_text.is_empty() {
                    continue;
                  }
                }
                Some(current_style) => match properties_equal_fast(property, current_style, style) {
                  FastEquality::Equal => continue,
                  FastEquality::Indeterminate => {
                    let current_css_text = current_style
                      .value(property)
                      .map(CssValue::to_css_string)
                      .unwrap_or_default();
                    if current_css_text == new_css_text {
                      continue;
                    }
                  }
                  FastEquality::NotEqual => {}
                },
              }

              if let Some(shadow_style) = shadow_ptr.computed_style() {
                if properties_equal_fast(property, &shadow_style, style) == FastEquality::Equal {
                  continue;
                }
                let shadow_css_text = shadow_style
                  .value(property)
                  .map(CssValue::to_css_string)
                  .unwrap_or_default();
                if shadow_css_text == new_css_text {
                  continue;
                }
              }

              let shadow_attribute_name = format!("dtt-s-{}", property.name());
              allowed = matching::property_equals(
                property,
                shadow_ptr.attribute(&shadow_attribute_name).as_deref(),
                new_value,
              );
              if !allowed {
                info!(
                  "SetStyle rejected, match_result = {:?}, property = {}, value = {}, allowed_values = {}, element = {}",
                  match_result,
                  property.name(),
                  new_css_text,
                  shadow_ptr.attribute(&shadow_attribute_name).unwrap_or_default(),
                  dom::node_path(element)
                );
                return allowed;
              }
            }
          }
          ShadowTreeMatchResult::WhitelistMatch => {
            let current_style = element.computed_style();
            self.collect_style_changes(current_style.as_ref(), style, true);
            allowed = self.matches_property_whitelist_in_shadow_tree(&shadow_ptr, style, false);
            if !allowed {
              allowed = self.matches_property_whitelist_in_shadow_tree(&shadow_ptr, style, true);
            }
            if !allowed {
              let property_ids = self.css_property_ids.borrow().clone();
              for (count, property) in property_ids.iter().enumerate() {
                if self.is_css_property_modified.borrow()[count] {
                  let new_css_text = style.value(*property).map(CssValue::to_css_string).unwrap_or_default();
                  info!(
                    "SetStyle rejected, match_result = {:?}, property = {}, value = {}",
                    match_result,
                    property.name(),
                    new_css_text
                  );
                }
              }
              info!("SetStyle rejected at {}", dom::node_path(element));
            }
          }
          // The shadow handle is absent in every other state, including
          // RootIsNotDocument; those were denied above.
          _ => {
            info!("SetStyle rejected, match_result = {:?}, element = {}", match_result, dom::node_path(element));
            allowed = false;
          }
        }
      }
      None => {}
    }
    allowed
  }

  // ==========================================================================
  // Style comparison
  // ==========================================================================

  /// Derives the set of properties this style set actually changes,
  /// resetting the per-call scratch vectors. When `is_whitelist_match` is
  /// set, the new computed values are captured for descendant matching.
  fn collect_style_changes(
    &self,
    current_style: Option<&ComputedStyle>,
    new_style: &ComputedStyle,
    is_whitelist_match: bool,
  ) {
    let property_ids = self.css_property_ids.borrow().clone();
    self.modified_property_count.set(0);

    for (count, property) in property_ids.iter().enumerate() {
      self.is_css_property_modified.borrow_mut()[count] = false;
      let new_value = new_style.value(*property);
      if is_whitelist_match {
        self.css_property_values.borrow_mut()[count] = new_value.cloned();
      }

      match current_style {
        None => {
          let new_css_text = new_value.map(CssValue::to_css_string).unwrap_or_default();
          if !new_css_text.is_empty() {
            self.mark_modified(count);
          }
        }
        Some(current_style) => match properties_equal_fast(*property, current_style, new_style) {
          FastEquality::NotEqual => self.mark_modified(count),
          FastEquality::Indeterminate => {
            let current_css_text = current_style
              .value(*property)
              .map(CssValue::to_css_string)
              .unwrap_or_default();
            let new_css_text = new_value.map(CssValue::to_css_string).unwrap_or_default();
            if current_css_text != new_css_text {
              self.mark_modified(count);
            }
          }
          FastEquality::Equal => {}
        },
      }
    }
  }

  fn mark_modified(&self, count: usize) {
    self.is_css_property_modified.borrow_mut()[count] = true;
    self.modified_property_count.set(self.modified_property_count.get() + 1);
  }

  fn clear_modified(&self, count: usize) {
    self.is_css_property_modified.borrow_mut()[count] = false;
    self
      .modified_property_count
      .set(self.modified_property_count.get().saturating_sub(1));
  }

  /// Style whitelist enforcement: walk the trusted shadow region and clear
  /// each modified property matched by some descendant, via computed-style
  /// comparison on the fast pass or stored `dtt-s-*` patterns on the slow
  /// one. Cleared flags persist between the two passes.
  fn matches_property_whitelist_in_shadow_tree(
    &self,
    shadow_parent: &Handle,
    style: &ComputedStyle,
    slow_path: bool,
  ) -> bool {
    for child in shadow_parent.children() {
      if !child.is_element() {
        continue;
      }
      let property_ids = self.css_property_ids.borrow().clone();
      for (count, property) in property_ids.iter().enumerate() {
        if !self.is_css_property_modified.borrow()[count] {
          continue;
        }
        let new_value = self.css_property_values.borrow()[count].clone();

        if slow_path {
          let shadow_attribute_name = format!("dtt-s-{}", property.name());
          if matching::property_equals(*property, child.attribute(&shadow_attribute_name).as_deref(), new_value.as_ref()) {
            self.clear_modified(count);
          }
        } else if let Some(shadow_style) = child.computed_style() {
          if properties_equal_fast(*property, &shadow_style, style) == FastEquality::Equal {
            self.clear_modified(count);
          } else {
            let shadow_css_text = shadow_style
              .value(*property)
              .map(CssValue::to_css_string)
              .unwrap_or_default();
            let new_css_text = new_value.map(|value| value.to_css_string()).unwrap_or_default();
            if shadow_css_text == new_css_text {
              self.clear_modified(count);
            }
          }
        }
      }
      if self.modified_property_count.get() == 0
        || self.matches_property_whitelist_in_shadow_tree(&child, style, slow_path)
      {
        return true;
      }
    }
    false
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Seeds the monitored-property list from the registry, clears the shadow
  /// tree, and resets the mode to record.
  pub fn frame_attached_to_parent(&self, frame: &Frame) {
    let monitored = registry::monitored_properties();
    self.modified_property_count.set(0);
    *self.is_css_property_modified.borrow_mut() = vec![false; monitored.len()];
    *self.css_property_values.borrow_mut() = vec![None; monitored.len()];
    *self.css_property_ids.borrow_mut() = monitored;

    frame
      .set_dom_constraint_html("")
      .expect("clearing the constraint document cannot fail");
    frame.set_dom_constraint_mode("r");
  }

  /// Parse-complete notification; only parses that cannot run script are
  /// interesting, the rest are observed through the mutation hooks.
  pub fn did_parse_html(&self, frame: &Frame) {
    if frame.document().document_can_execute_script() {
      return;
    }
    debug!("document parsed without script execution");
  }

  /// Parse probe entry.
  pub fn will_parse_html_probe(&self, frame: &Frame) {
    if !frame.document().document_can_execute_script() {
      return;
    }
    debug!("parse starting in scripting document");
  }

  /// Parse probe exit.
  pub fn did_parse_html_probe(&self, _frame: &Frame) {}
}

impl Drop for DomGuard {
  fn drop(&mut self) {
    if !std::thread::panicking() {
      debug_assert!(
        self.local_root.borrow().is_none(),
        "DomGuard dropped without shutdown"
      );
    }
  }
}

// ============================================================================
// Shadow mutation tracing
// ============================================================================

static SHADOW_MUTATION_LOG_INITIALIZED: OnceLock<()> = OnceLock::new();
static SHADOW_MUTATION_LOG_ENABLED: AtomicBool = AtomicBool::new(false);

fn shadow_mutation_log_enabled() -> bool {
  SHADOW_MUTATION_LOG_INITIALIZED.get_or_init(|| {
    if let Ok(value) = std::env::var("DOMGUARD_LOG_SHADOW_MUTATIONS") {
      if value.trim() == "1" {
        SHADOW_MUTATION_LOG_ENABLED.store(true, Ordering::Relaxed);
      }
    }
  });
  SHADOW_MUTATION_LOG_ENABLED.load(Ordering::Relaxed)
}

pub(crate) fn output_element_insertion(shadow_ptr: &Handle, shadow_element: &Handle) {
  if !shadow_mutation_log_enabled() {
    return;
  }
  debug!(
    "ELEMENT {} under {}",
    dom::create_markup(shadow_element),
    dom::node_path(shadow_ptr)
  );
}

pub(crate) fn output_attribute_modification(element: &Handle, attribute_name: &str, attribute_value: Option<&str>) {
  if !shadow_mutation_log_enabled() {
    return;
  }
  debug!(
    "ATTRIBUTE {} = {} on {}",
    attribute_name,
    attribute_value.unwrap_or(""),
    dom::node_path(element)
  );
}

pub(crate) fn output_property_modification(property: PropertyId, value: Option<&CssValue>) {
  let Some(value) = value else {
    return;
  };
  if !value.may_contain_url() {
    return;
  }
  if !shadow_mutation_log_enabled() {
    return;
  }
  debug!("PROPERTY {} = {}", property.name(), value.to_css_string());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registers_with_the_probe_sink_until_shutdown() {
    let frame = Frame::new();
    let guard = DomGuard::new(&frame);
    assert_eq!(frame.probe_sink().guard_count(), 1);

    guard.shutdown();
    assert_eq!(frame.probe_sink().guard_count(), 0);

    // A second shutdown is a no-op.
    guard.shutdown();
  }

  #[test]
  fn frame_attach_seeds_monitored_properties_and_resets_controls() {
    let frame = Frame::new();
    let guard = DomGuard::new(&frame);
    frame.set_dom_constraint_mode("e");
    frame.set_dom_constraint_html("<div></div>").unwrap();

    guard.frame_attached_to_parent(&frame);
    assert!(!guard.css_property_ids.borrow().is_empty());
    assert_eq!(
      guard.css_property_ids.borrow().len(),
      guard.is_css_property_modified.borrow().len()
    );
    assert_eq!(frame.dom_constraint_mode(), "r");
    assert!(frame.dom_constraint().children().is_empty());

    guard.shutdown();
  }

  #[test]
  fn guard_outlives_its_frame() {
    let frame = Frame::new();
    let guard = DomGuard::new(&frame);
    drop(frame);
    // The weak frame handle is gone; shutdown still completes.
    guard.shutdown();
  }
}

//! Per-frame state
//!
//! A [`Frame`] owns the live document and the DOM constraint side document,
//! and carries the two string-valued controls the embedder sets:
//! `DOMConstraintHTML` (serialized shadow-tree content) and
//! `DOMConstraintMode` (first character `r` or `e`; the space-separated
//! remainder is an id-prefix whitelist). The probe sink is the registration
//! point for guards observing this frame.

use crate::dom;
use crate::dom::DomNode;
use crate::dom::Handle;
use crate::error::Result;
use crate::guard::DomGuard;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

/// Operating state selected by the mode string's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
  Record,
  Enforce,
}

pub struct Frame {
  document: Handle,
  dom_constraint: RefCell<Handle>,
  dom_constraint_mode: RefCell<String>,
  probe_sink: ProbeSink,
}

impl Frame {
  pub fn new() -> Rc<Frame> {
    let document = DomNode::new_document();
    document.set_document_has_window(true);
    Rc::new(Frame {
      document,
      dom_constraint: RefCell::new(DomNode::new_document()),
      dom_constraint_mode: RefCell::new("r".to_string()),
      probe_sink: ProbeSink::default(),
    })
  }

  /// The live document this frame renders.
  pub fn document(&self) -> Handle {
    self.document.clone()
  }

  /// The shadow-tree side document.
  pub fn dom_constraint(&self) -> Handle {
    self.dom_constraint.borrow().clone()
  }

  /// Replaces the shadow tree with deserialized constraint HTML. An empty
  /// string yields an empty constraint document.
  pub fn set_dom_constraint_html(&self, html: &str) -> Result<()> {
    let constraint = if html.trim().is_empty() {
      DomNode::new_document()
    } else {
      dom::parse_html(html)?
    };
    *self.dom_constraint.borrow_mut() = constraint;
    Ok(())
  }

  pub fn dom_constraint_mode(&self) -> String {
    self.dom_constraint_mode.borrow().clone()
  }

  pub fn set_dom_constraint_mode(&self, mode: &str) {
    *self.dom_constraint_mode.borrow_mut() = mode.to_string();
  }

  /// Record/enforce selection; anything else disables the engine.
  pub fn mode_kind(&self) -> Option<ModeKind> {
    match self.dom_constraint_mode.borrow().chars().next() {
      Some('r') => Some(ModeKind::Record),
      Some('e') => Some(ModeKind::Enforce),
      _ => None,
    }
  }

  /// The id-prefix whitelist carried after the mode character.
  pub fn id_prefixes(&self) -> Vec<String> {
    let mode = self.dom_constraint_mode.borrow();
    mode
      .get(1..)
      .unwrap_or("")
      .split(' ')
      .filter(|prefix| !prefix.is_empty())
      .map(str::to_string)
      .collect()
  }

  pub(crate) fn probe_sink(&self) -> &ProbeSink {
    &self.probe_sink
  }
}

/// Registration point for guards attached to a frame.
#[derive(Default)]
pub(crate) struct ProbeSink {
  guards: RefCell<Vec<Weak<DomGuard>>>,
}

impl ProbeSink {
  pub fn add_guard(&self, guard: Weak<DomGuard>) {
    self.guards.borrow_mut().push(guard);
  }

  pub fn remove_guard(&self, guard: &DomGuard) {
    self
      .guards
      .borrow_mut()
      .retain(|registered| registered.as_ptr() != guard as *const DomGuard);
  }

  pub fn guard_count(&self) -> usize {
    self
      .guards
      .borrow()
      .iter()
      .filter(|registered| registered.upgrade().is_some())
      .count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mode_string_controls() {
    let frame = Frame::new();
    assert_eq!(frame.mode_kind(), Some(ModeKind::Record));
    assert!(frame.id_prefixes().is_empty());

    frame.set_dom_constraint_mode("e ember rnd-");
    assert_eq!(frame.mode_kind(), Some(ModeKind::Enforce));
    assert_eq!(frame.id_prefixes(), vec!["ember".to_string(), "rnd-".to_string()]);

    frame.set_dom_constraint_mode("record");
    assert_eq!(frame.mode_kind(), Some(ModeKind::Record));

    frame.set_dom_constraint_mode("");
    assert_eq!(frame.mode_kind(), None);
  }

  #[test]
  fn constraint_html_roundtrip() {
    let frame = Frame::new();
    frame.set_dom_constraint_html("<div dtt-id=\"item-*\"></div>").unwrap();
    let constraint = frame.dom_constraint();
    let html = constraint.first_child().unwrap();
    assert_eq!(html.tag_name(), Some("HTML"));

    frame.set_dom_constraint_html("").unwrap();
    assert!(frame.dom_constraint().children().is_empty());
  }
}

//! DOM node model
//!
//! A lightweight reference-counted document tree shared by the live frame
//! document and the DOM constraint side document. Nodes are [`Handle`]s
//! (`Rc<DomNode>`) with weak parent links, so hook code can walk ancestors
//! while the host keeps mutating children.
//!
//! Serialized HTML (the `DOMConstraintHTML` control, test documents) is
//! parsed with html5ever into an rcdom tree and converted into this model.
//! Shadow roots are represented as fragment-like children of their host
//! element; structural walks treat them the way the engine treats document
//! fragments.

use crate::css::computed::ComputedStyle;
use crate::error::Error;
use crate::error::ParseError;
use crate::error::Result;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::NodeData;
use markup5ever_rcdom::RcDom;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;
use std::rc::Weak;

pub type Handle = Rc<DomNode>;

/// A node in a live document or in a DOM constraint document.
pub struct DomNode {
  data: DomNodeData,
  parent: Cell<Option<Weak<DomNode>>>,
  children: RefCell<Vec<Handle>>,
}

pub enum DomNodeData {
  Document {
    has_window: Cell<bool>,
    is_parsing: Cell<bool>,
    can_execute_script: Cell<bool>,
  },
  Fragment,
  ShadowRoot {
    user_agent: bool,
  },
  Element {
    tag_name: String,
    attributes: RefCell<Vec<(String, String)>>,
    pending_attribute_changes: RefCell<Vec<(String, String)>>,
    computed_style: RefCell<Option<ComputedStyle>>,
  },
  Text {
    content: RefCell<String>,
  },
}

impl DomNode {
  fn new(data: DomNodeData) -> Handle {
    Rc::new(DomNode {
      data,
      parent: Cell::new(None),
      children: RefCell::new(Vec::new()),
    })
  }

  pub fn new_document() -> Handle {
    DomNode::new(DomNodeData::Document {
      has_window: Cell::new(false),
      is_parsing: Cell::new(false),
      can_execute_script: Cell::new(true),
    })
  }

  pub fn new_fragment() -> Handle {
    DomNode::new(DomNodeData::Fragment)
  }

  pub fn new_shadow_root(user_agent: bool) -> Handle {
    DomNode::new(DomNodeData::ShadowRoot { user_agent })
  }

  /// Creates an element node. Tag names are stored uppercase, the HTML
  /// `tagName` convention the matching code relies on.
  pub fn new_element(tag_name: &str) -> Handle {
    DomNode::new(DomNodeData::Element {
      tag_name: tag_name.to_ascii_uppercase(),
      attributes: RefCell::new(Vec::new()),
      pending_attribute_changes: RefCell::new(Vec::new()),
      computed_style: RefCell::new(None),
    })
  }

  pub fn new_text(content: &str) -> Handle {
    DomNode::new(DomNodeData::Text {
      content: RefCell::new(content.to_string()),
    })
  }

  pub fn data(&self) -> &DomNodeData {
    &self.data
  }

  pub fn is_document(&self) -> bool {
    matches!(self.data, DomNodeData::Document { .. })
  }

  pub fn is_element(&self) -> bool {
    matches!(self.data, DomNodeData::Element { .. })
  }

  pub fn is_text(&self) -> bool {
    matches!(self.data, DomNodeData::Text { .. })
  }

  /// Fragments and shadow roots are transparent for structural matching.
  pub fn is_fragment_like(&self) -> bool {
    matches!(self.data, DomNodeData::Fragment | DomNodeData::ShadowRoot { .. })
  }

  pub fn is_shadow_root(&self) -> bool {
    matches!(self.data, DomNodeData::ShadowRoot { .. })
  }

  pub fn tag_name(&self) -> Option<&str> {
    match &self.data {
      DomNodeData::Element { tag_name, .. } => Some(tag_name),
      _ => None,
    }
  }

  // ==========================================================================
  // Attributes
  // ==========================================================================

  pub fn attribute(&self, name: &str) -> Option<String> {
    let name = name.to_ascii_lowercase();
    match &self.data {
      DomNodeData::Element { attributes, .. } => attributes
        .borrow()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.clone()),
      _ => None,
    }
  }

  pub fn has_attribute(&self, name: &str) -> bool {
    self.attribute(name).is_some()
  }

  pub fn set_attribute(&self, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    if let DomNodeData::Element { attributes, .. } = &self.data {
      let mut attributes = attributes.borrow_mut();
      if let Some(entry) = attributes.iter_mut().find(|(n, _)| *n == name) {
        entry.1 = value.to_string();
      } else {
        attributes.push((name, value.to_string()));
      }
    }
  }

  pub fn remove_attribute(&self, name: &str) {
    let name = name.to_ascii_lowercase();
    if let DomNodeData::Element { attributes, .. } = &self.data {
      attributes.borrow_mut().retain(|(n, _)| *n != name);
    }
  }

  /// Snapshot of the element's attributes in document order.
  pub fn attributes(&self) -> Vec<(String, String)> {
    match &self.data {
      DomNodeData::Element { attributes, .. } => attributes.borrow().clone(),
      _ => Vec::new(),
    }
  }

  pub fn id_attribute(&self) -> Option<String> {
    self.attribute("id")
  }

  // ==========================================================================
  // Pending attribute changes
  // ==========================================================================

  /// Queues an attribute change to be applied once the surrounding mutation
  /// is admitted.
  pub fn queue_attribute_change(&self, name: &str, value: &str) {
    if let DomNodeData::Element {
      pending_attribute_changes,
      ..
    } = &self.data
    {
      pending_attribute_changes
        .borrow_mut()
        .push((name.to_ascii_lowercase(), value.to_string()));
    }
  }

  fn apply_pending_attribute_changes(&self) {
    if let DomNodeData::Element {
      pending_attribute_changes,
      ..
    } = &self.data
    {
      let pending = std::mem::take(&mut *pending_attribute_changes.borrow_mut());
      for (name, value) in pending {
        self.set_attribute(&name, &value);
      }
    }
  }

  // ==========================================================================
  // Computed style
  // ==========================================================================

  pub fn computed_style(&self) -> Option<ComputedStyle> {
    match &self.data {
      DomNodeData::Element { computed_style, .. } => computed_style.borrow().clone(),
      _ => None,
    }
  }

  pub fn set_computed_style(&self, style: Option<ComputedStyle>) {
    if let DomNodeData::Element { computed_style, .. } = &self.data {
      *computed_style.borrow_mut() = style;
    }
  }

  // ==========================================================================
  // Document state
  // ==========================================================================

  pub fn document_has_window(&self) -> bool {
    match &self.data {
      DomNodeData::Document { has_window, .. } => has_window.get(),
      _ => false,
    }
  }

  pub fn set_document_has_window(&self, value: bool) {
    if let DomNodeData::Document { has_window, .. } = &self.data {
      has_window.set(value);
    }
  }

  pub fn document_is_parsing(&self) -> bool {
    match &self.data {
      DomNodeData::Document { is_parsing, .. } => is_parsing.get(),
      _ => false,
    }
  }

  pub fn set_document_is_parsing(&self, value: bool) {
    if let DomNodeData::Document { is_parsing, .. } = &self.data {
      is_parsing.set(value);
    }
  }

  pub fn document_can_execute_script(&self) -> bool {
    match &self.data {
      DomNodeData::Document { can_execute_script, .. } => can_execute_script.get(),
      _ => false,
    }
  }

  pub fn set_document_can_execute_script(&self, value: bool) {
    if let DomNodeData::Document { can_execute_script, .. } = &self.data {
      can_execute_script.set(value);
    }
  }

  // ==========================================================================
  // Tree structure
  // ==========================================================================

  pub fn parent(&self) -> Option<Handle> {
    let weak = self.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    self.parent.set(weak);
    parent
  }

  pub fn children(&self) -> Vec<Handle> {
    self.children.borrow().clone()
  }

  pub fn first_child(&self) -> Option<Handle> {
    self.children.borrow().first().cloned()
  }
}

/// Appends `child` to `parent`, detaching it from any previous parent.
pub fn append_child(parent: &Handle, child: Handle) {
  if let Some(old_parent) = child.parent() {
    old_parent
      .children
      .borrow_mut()
      .retain(|sibling| !Rc::ptr_eq(sibling, &child));
  }
  child.parent.set(Some(Rc::downgrade(parent)));
  parent.children.borrow_mut().push(child);
}

/// Collects `node` and its ancestors bottom-up; the last entry is the walk
/// root (the document, when the node is connected).
pub fn collect_ancestors(node: &Handle) -> Vec<Handle> {
  let mut ancestors = Vec::new();
  let mut current = node.clone();
  loop {
    ancestors.push(current.clone());
    match current.parent() {
      Some(parent) => current = parent,
      None => return ancestors,
    }
  }
}

/// True when the node lives under a user-agent shadow root, at any depth.
pub fn is_descendant_of_user_agent_shadow_root(node: &Handle) -> bool {
  let mut current = Some(node.clone());
  while let Some(node) = current {
    if let DomNodeData::ShadowRoot { user_agent: true } = node.data() {
      return true;
    }
    current = node.parent();
  }
  false
}

/// Applies queued attribute changes across a subtree, recursing through
/// children and author shadow roots but not user-agent ones.
pub fn execute_pending_attribute_changes(node: &Handle) {
  if let DomNodeData::ShadowRoot { user_agent: true } = node.data() {
    return;
  }
  node.apply_pending_attribute_changes();
  for child in node.children() {
    execute_pending_attribute_changes(&child);
  }
}

// ============================================================================
// HTML parsing
// ============================================================================

/// Parses serialized HTML into a document node.
pub fn parse_html(html: &str) -> Result<Handle> {
  let opts = ParseOpts {
    tree_builder: TreeBuilderOpts {
      scripting_enabled: false,
      ..Default::default()
    },
    ..Default::default()
  };

  let dom = parse_document(RcDom::default(), opts)
    .from_utf8()
    .read_from(&mut html.as_bytes())
    .map_err(|e| {
      Error::Parse(ParseError::InvalidHtml {
        message: format!("Failed to parse HTML: {}", e),
      })
    })?;

  let document = DomNode::new_document();
  for child in dom.document.children.borrow().iter() {
    if let Some(converted) = convert_handle(child) {
      append_child(&document, converted);
    }
  }
  Ok(document)
}

fn convert_handle(handle: &markup5ever_rcdom::Handle) -> Option<Handle> {
  let node = match &handle.data {
    NodeData::Element { name, attrs, .. } => {
      let element = DomNode::new_element(&name.local);
      for attr in attrs.borrow().iter() {
        element.set_attribute(&attr.name.local, &attr.value);
      }
      element
    }
    NodeData::Text { contents } => DomNode::new_text(&contents.borrow()),
    _ => return None,
  };
  for child in handle.children.borrow().iter() {
    if let Some(converted) = convert_handle(child) {
      append_child(&node, converted);
    }
  }
  Some(node)
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Serializes a subtree for log output.
pub fn create_markup(node: &Handle) -> String {
  let mut out = String::new();
  write_markup(node, &mut out);
  out
}

fn write_markup(node: &Handle, out: &mut String) {
  match node.data() {
    DomNodeData::Element { tag_name, attributes, .. } => {
      let tag = tag_name.to_ascii_lowercase();
      let _ = write!(out, "<{}", tag);
      for (name, value) in attributes.borrow().iter() {
        let _ = write!(out, " {}=\"{}\"", name, value.replace('"', "&quot;"));
      }
      out.push('>');
      for child in node.children() {
        write_markup(&child, out);
      }
      let _ = write!(out, "</{}>", tag);
    }
    DomNodeData::Text { content } => out.push_str(&content.borrow()),
    _ => {
      for child in node.children() {
        write_markup(&child, out);
      }
    }
  }
}

/// Renders a node's ancestor chain for log output, root first.
pub fn node_path(node: &Handle) -> String {
  let ancestors = collect_ancestors(node);
  let mut segments = Vec::with_capacity(ancestors.len());
  for ancestor in ancestors.iter().rev() {
    let segment = match ancestor.data() {
      DomNodeData::Document { .. } => "#document".to_string(),
      DomNodeData::Fragment => "#fragment".to_string(),
      DomNodeData::ShadowRoot { user_agent } => {
        if *user_agent {
          "#shadow-root(ua)".to_string()
        } else {
          "#shadow-root".to_string()
        }
      }
      DomNodeData::Element { tag_name, .. } => match ancestor.id_attribute() {
        Some(id) if !id.is_empty() => format!("{}#{}", tag_name, id),
        _ => tag_name.clone(),
      },
      DomNodeData::Text { .. } => "#text".to_string(),
    };
    segments.push(segment);
  }
  segments.join(" > ")
}

//! CSS value model
//!
//! Computed property values are held as a small tagged variant so the
//! pattern engine can compare them structurally: value lists, numeric
//! literals, URI and image references, colors, and an opaque fallback for
//! everything else. Parsing is a single-value pass over `cssparser` tokens;
//! colors are recognized with `csscolorparser`.
//!
//! Structural comparison threads a three-state accumulator through the
//! alternatives of a stored pattern: `0` unresolved, `1` shadow above the
//! new value, `2` shadow below it, `-1` match. The partial order lets a
//! recorded numeric range widen monotonically: one alternative above and
//! one below the new value together resolve to a match.

use crate::css::registry::PropertyId;
use crate::pattern;
use crate::urls;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::ToCss;
use cssparser::Token;

/// Separator of a CSS value list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSeparator {
  Space,
  Comma,
}

/// A parsed computed-value component.
#[derive(Debug, Clone, PartialEq)]
pub enum CssValue {
  List { separator: ListSeparator, items: Vec<CssValue> },
  Numeric { value: f64, unit: String },
  Uri(String),
  Image(String),
  Color { r: u8, g: u8, b: u8, a: f32 },
  Other(String),
}

impl CssValue {
  /// Canonical text form, the equivalent of the engine's `CssText()`.
  pub fn to_css_string(&self) -> String {
    match self {
      CssValue::List { separator, items } => {
        let joined: Vec<String> = items.iter().map(CssValue::to_css_string).collect();
        match separator {
          ListSeparator::Space => joined.join(" "),
          ListSeparator::Comma => joined.join(", "),
        }
      }
      CssValue::Numeric { value, unit } => format!("{}{}", format_number(*value), unit),
      CssValue::Uri(url) | CssValue::Image(url) => format!("url(\"{}\")", url),
      CssValue::Color { r, g, b, a } => {
        if *a >= 1.0 {
          format!("rgb({}, {}, {})", r, g, b)
        } else {
          format!("rgba({}, {}, {}, {})", r, g, b, a)
        }
      }
      CssValue::Other(text) => text.clone(),
    }
  }

  /// Whether the value references a URL anywhere, the gate used before
  /// logging recorded property values.
  pub fn may_contain_url(&self) -> bool {
    match self {
      CssValue::Uri(_) | CssValue::Image(_) => true,
      CssValue::List { items, .. } => items.iter().any(CssValue::may_contain_url),
      _ => false,
    }
  }
}

fn format_number(value: f64) -> String {
  if value == value.trunc() && value.abs() < 1e12 {
    format!("{}", value as i64)
  } else {
    format!("{}", value)
  }
}

fn round_component(value: f64) -> f64 {
  (value * 1e6).round() / 1e6
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses the text of a single property value into a [`CssValue`].
///
/// Returns `None` for empty or unrecognizable input; callers treat that as
/// an alternative that simply cannot match.
pub fn parse_single_value(property: PropertyId, text: &str) -> Option<CssValue> {
  let mut input = ParserInput::new(text);
  let mut parser = Parser::new(&mut input);

  let mut groups: Vec<Vec<CssValue>> = vec![Vec::new()];
  loop {
    let state = parser.state();
    let token = match parser.next() {
      Ok(token) => token.clone(),
      Err(_) => break,
    };
    match token {
      Token::Comma => groups.push(Vec::new()),
      token => {
        let component = parse_component(&mut parser, &state, token, property)?;
        groups.last_mut()?.push(component);
      }
    }
  }

  let comma_separated = groups.len() > 1;
  let mut items = Vec::with_capacity(groups.len());
  for group in groups {
    match group.len() {
      0 => return None,
      1 => items.extend(group),
      _ => items.push(CssValue::List {
        separator: ListSeparator::Space,
        items: group,
      }),
    }
  }
  if comma_separated {
    Some(CssValue::List {
      separator: ListSeparator::Comma,
      items,
    })
  } else {
    items.into_iter().next()
  }
}

fn parse_component<'i>(
  parser: &mut Parser<'i, '_>,
  state: &ParserState,
  token: Token<'i>,
  property: PropertyId,
) -> Option<CssValue> {
  let value = match token {
    Token::Number { value, int_value, .. } => CssValue::Numeric {
      value: int_value.map(f64::from).unwrap_or_else(|| round_component(value as f64)),
      unit: String::new(),
    },
    Token::Percentage { unit_value, int_value, .. } => CssValue::Numeric {
      value: int_value
        .map(f64::from)
        .unwrap_or_else(|| round_component(unit_value as f64 * 100.0)),
      unit: "%".to_string(),
    },
    Token::Dimension { value, int_value, unit, .. } => CssValue::Numeric {
      value: int_value.map(f64::from).unwrap_or_else(|| round_component(value as f64)),
      unit: unit.as_ref().to_string(),
    },
    Token::UnquotedUrl(url) => url_value(property, url.as_ref()),
    Token::Ident(ident) => match csscolorparser::parse(ident.as_ref()) {
      Ok(color) => color_value(&color),
      Err(_) => CssValue::Other(ident.as_ref().to_string()),
    },
    Token::Hash(hash) | Token::IDHash(hash) => {
      let spelled = format!("#{}", hash.as_ref());
      match csscolorparser::parse(&spelled) {
        Ok(color) => color_value(&color),
        Err(_) => CssValue::Other(spelled),
      }
    }
    Token::QuotedString(text) => CssValue::Other(format!("\"{}\"", text.as_ref())),
    Token::Function(name) if name.eq_ignore_ascii_case("url") => {
      let url = parser
        .parse_nested_block(|p| {
          let url = match p.next() {
            Ok(Token::QuotedString(s)) => s.as_ref().to_string(),
            _ => String::new(),
          };
          while p.next().is_ok() {}
          Ok::<String, cssparser::ParseError<'i, ()>>(url)
        })
        .ok()?;
      url_value(property, &url)
    }
    Token::Function(name) if is_color_function(name.as_ref()) => {
      let raw = consume_component_raw(parser, state)?;
      match csscolorparser::parse(&raw) {
        Ok(color) => color_value(&color),
        Err(_) => CssValue::Other(raw),
      }
    }
    Token::Function(_)
    | Token::ParenthesisBlock
    | Token::SquareBracketBlock
    | Token::CurlyBracketBlock => CssValue::Other(consume_component_raw(parser, state)?),
    other => CssValue::Other(other.to_css_string()),
  };
  Some(value)
}

fn is_color_function(name: &str) -> bool {
  matches!(
    name.to_ascii_lowercase().as_str(),
    "rgb" | "rgba" | "hsl" | "hsla" | "hwb" | "lab" | "lch" | "oklab" | "oklch" | "color"
  )
}

fn color_value(color: &csscolorparser::Color) -> CssValue {
  CssValue::Color {
    r: (color.r * 255.0) as u8,
    g: (color.g * 255.0) as u8,
    b: (color.b * 255.0) as u8,
    a: color.a as f32,
  }
}

fn url_value(property: PropertyId, url: &str) -> CssValue {
  if property.is_image_property() {
    CssValue::Image(url.to_string())
  } else {
    CssValue::Uri(url.to_string())
  }
}

/// Re-reads the component that starts at `state` as raw text, consuming any
/// nested block it opens.
fn consume_component_raw<'i>(parser: &mut Parser<'i, '_>, state: &ParserState) -> Option<String> {
  parser.reset(state);
  let start = parser.position();
  let token = parser.next().ok()?.clone();
  if matches!(
    token,
    Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock
  ) {
    consume_nested_block(parser);
  }
  Some(parser.slice_from(start).trim().to_string())
}

fn consume_nested_block<'i>(parser: &mut Parser<'i, '_>) {
  let _ = parser.parse_nested_block(|p| {
    while p.next().is_ok() {}
    Ok::<(), cssparser::ParseError<'i, ()>>(())
  });
}

// ============================================================================
// Structural equality
// ============================================================================

/// Structural comparison of two parsed values, accumulating into
/// `match_state` (`0` unresolved, `1` shadow above, `2` shadow below, `-1`
/// match). Variants must agree for any resolution to happen; keyword and
/// opaque values have no structural match path and rely on the textual one.
pub fn css_value_equals(shadow_value: &CssValue, actual_value: &CssValue, match_state: &mut i32) {
  match (shadow_value, actual_value) {
    (
      CssValue::List { separator: shadow_separator, items: shadow_items },
      CssValue::List { separator: actual_separator, items: actual_items },
    ) => {
      if shadow_separator != actual_separator {
        return;
      }
      if shadow_items.len() != actual_items.len() {
        return;
      }
      for (shadow_item, actual_item) in shadow_items.iter().zip(actual_items) {
        css_value_equals(shadow_item, actual_item, match_state);
        if *match_state != -1 {
          return;
        }
      }
      *match_state = -1;
    }
    (CssValue::Numeric { value: shadow, .. }, CssValue::Numeric { value: actual, .. }) => {
      if shadow == actual {
        *match_state = -1;
      } else if shadow > actual {
        if *match_state == 0 {
          *match_state = 1;
        } else if *match_state == 2 {
          *match_state = -1;
        }
      } else {
        if *match_state == 0 {
          *match_state = 2;
        } else if *match_state == 1 {
          *match_state = -1;
        }
      }
    }
    (CssValue::Uri(shadow_url), CssValue::Uri(actual_url)) => {
      if urls::url_equals(shadow_url, actual_url) {
        *match_state = -1;
      }
    }
    (CssValue::Image(shadow_url), CssValue::Image(actual_url)) => {
      if urls::url_equals(shadow_url, actual_url) {
        *match_state = -1;
      }
    }
    (CssValue::Color { .. }, CssValue::Color { .. }) => {
      *match_state = -1;
    }
    _ => {}
  }
}

/// Compares one stored alternative (as text) against the new computed
/// value: textual pattern match first, then the structural path on the
/// parsed alternative.
pub fn css_value_equals_text(
  property: PropertyId,
  shadow_css_text: &str,
  actual_value: Option<&CssValue>,
  match_state: &mut i32,
) {
  if shadow_css_text.is_empty() {
    if actual_value.is_none() {
      *match_state = -1;
    }
    return;
  }
  let Some(actual_value) = actual_value else {
    *match_state = 0;
    return;
  };

  if pattern::string_equals(shadow_css_text, &actual_value.to_css_string()) {
    *match_state = -1;
  } else if let Some(shadow_value) = parse_single_value(property, shadow_css_text) {
    css_value_equals(&shadow_value, actual_value, match_state);
  }
}

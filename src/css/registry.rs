//! CSS property registry
//!
//! A fixed table of property definitions with the exposure flags the
//! monitored-property filter consumes. The engine tracks the computed value
//! of every web-exposed longhand that can be resolved without layout;
//! shorthands, internal properties and surrogates are excluded when a frame
//! is attached.

pub const WEB_EXPOSED: u8 = 1 << 0;
pub const SHORTHAND: u8 = 1 << 1;
pub const LAYOUT_DEPENDENT: u8 = 1 << 2;
pub const INTERNAL: u8 = 1 << 3;
pub const SURROGATE: u8 = 1 << 4;

/// Identifier of a registered CSS property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
  BackgroundAttachment,
  BackgroundColor,
  BackgroundImage,
  BackgroundRepeat,
  BorderTopColor,
  BorderTopStyle,
  BoxShadow,
  Clear,
  ClipPath,
  Color,
  Content,
  Cursor,
  Direction,
  Display,
  Filter,
  Float,
  FontFamily,
  FontSize,
  FontStyle,
  FontWeight,
  LetterSpacing,
  LineHeight,
  ListStyleImage,
  ListStyleType,
  MaskImage,
  Opacity,
  OutlineColor,
  OutlineStyle,
  OverflowX,
  OverflowY,
  PointerEvents,
  Position,
  TextAlign,
  TextDecorationLine,
  TextTransform,
  UnicodeBidi,
  VerticalAlign,
  Visibility,
  WhiteSpace,
  WordSpacing,
  ZIndex,
  // Filtered out by the monitored-property selection.
  Background,
  Border,
  Font,
  ListStyle,
  Margin,
  Padding,
  TextDecoration,
  Height,
  Left,
  MarginLeft,
  MarginTop,
  Top,
  Transform,
  TransformOrigin,
  Width,
  BlockSize,
  InlineSize,
  WebkitWritingMode,
  InternalVisitedColor,
}

pub struct PropertyDef {
  pub id: PropertyId,
  pub name: &'static str,
  pub flags: u8,
}

pub static PROPERTIES: &[PropertyDef] = &[
  PropertyDef { id: PropertyId::BackgroundAttachment, name: "background-attachment", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::BackgroundColor, name: "background-color", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::BackgroundImage, name: "background-image", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::BackgroundRepeat, name: "background-repeat", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::BorderTopColor, name: "border-top-color", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::BorderTopStyle, name: "border-top-style", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::BoxShadow, name: "box-shadow", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Clear, name: "clear", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::ClipPath, name: "clip-path", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Color, name: "color", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Content, name: "content", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Cursor, name: "cursor", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Direction, name: "direction", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Display, name: "display", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Filter, name: "filter", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Float, name: "float", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::FontFamily, name: "font-family", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::FontSize, name: "font-size", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::FontStyle, name: "font-style", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::FontWeight, name: "font-weight", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::LetterSpacing, name: "letter-spacing", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::LineHeight, name: "line-height", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::ListStyleImage, name: "list-style-image", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::ListStyleType, name: "list-style-type", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::MaskImage, name: "mask-image", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Opacity, name: "opacity", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::OutlineColor, name: "outline-color", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::OutlineStyle, name: "outline-style", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::OverflowX, name: "overflow-x", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::OverflowY, name: "overflow-y", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::PointerEvents, name: "pointer-events", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Position, name: "position", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::TextAlign, name: "text-align", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::TextDecorationLine, name: "text-decoration-line", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::TextTransform, name: "text-transform", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::UnicodeBidi, name: "unicode-bidi", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::VerticalAlign, name: "vertical-align", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Visibility, name: "visibility", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::WhiteSpace, name: "white-space", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::WordSpacing, name: "word-spacing", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::ZIndex, name: "z-index", flags: WEB_EXPOSED },
  PropertyDef { id: PropertyId::Background, name: "background", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::Border, name: "border", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::Font, name: "font", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::ListStyle, name: "list-style", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::Margin, name: "margin", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::Padding, name: "padding", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::TextDecoration, name: "text-decoration", flags: WEB_EXPOSED | SHORTHAND },
  PropertyDef { id: PropertyId::Height, name: "height", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::Left, name: "left", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::MarginLeft, name: "margin-left", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::MarginTop, name: "margin-top", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::Top, name: "top", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::Transform, name: "transform", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::TransformOrigin, name: "transform-origin", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::Width, name: "width", flags: WEB_EXPOSED | LAYOUT_DEPENDENT },
  PropertyDef { id: PropertyId::BlockSize, name: "block-size", flags: WEB_EXPOSED | SURROGATE },
  PropertyDef { id: PropertyId::InlineSize, name: "inline-size", flags: WEB_EXPOSED | SURROGATE },
  PropertyDef { id: PropertyId::WebkitWritingMode, name: "-webkit-writing-mode", flags: WEB_EXPOSED | SURROGATE },
  PropertyDef { id: PropertyId::InternalVisitedColor, name: "-internal-visited-color", flags: INTERNAL },
];

impl PropertyId {
  pub fn def(self) -> &'static PropertyDef {
    PROPERTIES
      .iter()
      .find(|def| def.id == self)
      .expect("every PropertyId has a registry entry")
  }

  pub fn name(self) -> &'static str {
    self.def().name
  }

  pub fn from_name(name: &str) -> Option<PropertyId> {
    PROPERTIES.iter().find(|def| def.name == name).map(|def| def.id)
  }

  /// Properties whose `url()` components are image references rather than
  /// plain resource references.
  pub fn is_image_property(self) -> bool {
    matches!(
      self,
      PropertyId::BackgroundImage | PropertyId::ListStyleImage | PropertyId::MaskImage
    )
  }
}

/// The fixed ordered list of properties a frame monitors: web-exposed,
/// non-shorthand, non-layout-dependent, non-internal, non-surrogate.
pub fn monitored_properties() -> Vec<PropertyId> {
  PROPERTIES
    .iter()
    .filter(|def| {
      def.flags & WEB_EXPOSED != 0
        && def.flags & (SHORTHAND | LAYOUT_DEPENDENT | INTERNAL | SURROGATE) == 0
    })
    .map(|def| def.id)
    .collect()
}

pub mod attributes;
pub mod css;
pub mod dom;
pub mod error;
pub mod frame;
pub mod guard;
pub mod matching;
pub mod pattern;
pub mod scanner;
pub mod shadow;
pub mod urls;

pub use error::{Error, Result};
pub use frame::{Frame, ModeKind};
pub use guard::DomGuard;
pub use shadow::ShadowTreeMatchResult;

pub use css::{ComputedStyle, CssValue, PropertyId};
pub use dom::{DomNode, Handle};

//! A small reference engine for the inspector: paragraphs of marked text,
//! a selection, stored marks and linear undo.
//!
//! It exists so the inspector can be driven end to end, from the CLI and
//! from tests, without a real editor.

pub mod document;
mod marks;

use smartstring::{
  LazyCompact,
  SmartString,
};

pub use document::{
  Applied,
  DocState,
  Document,
  DocumentError,
};
pub use marks::{
  MarkSet,
  MarkSpan,
  Marks,
};

pub type Tendril = SmartString<LazyCompact>;

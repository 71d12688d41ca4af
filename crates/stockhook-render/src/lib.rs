//! Stockhook Render Library
//!
//! Pure transforms from stored payloads to displayable content:
//!
//! - [`inspect`]: locate the body text and the title inside an arbitrary JSON value
//! - [`markup`]: turn that body text into a [`Document`] tree for the page templates
//!
//! Nothing here performs I/O.

pub mod inspect;
pub mod markup;

pub use inspect::{inspect, Body, Inspection, Title, TitleSource};
pub use markup::{render, Block, Document, Inline};

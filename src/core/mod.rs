//! Core document model, tax engine and validation.
//!
//! This module provides the value objects, the per-line and aggregate tax
//! arithmetic and the document types (factura, boleta, notes, despatch) of
//! the Peruvian electronic receipt system (CPE).

mod builder;
mod certificate;
mod document;
mod error;
mod identification;
mod item;
mod numbering;
mod taxes;
mod taxpayer;
mod types;
mod validation;
mod words;

pub use builder::*;
pub use certificate::*;
pub use document::*;
pub use error::*;
pub use identification::*;
pub use item::*;
pub use numbering::*;
pub use taxes::*;
pub use taxpayer::*;
pub use types::*;
pub use validation::*;
pub use words::*;

//! # comprobante
//!
//! Peruvian electronic fiscal documents (CPE) for SUNAT: facturas, boletas,
//! credit and debit notes and guías de remisión.
//!
//! The crate computes line and document taxes (IGV, ISC, detraction), checks
//! documents for completeness, writes and reads their UBL 2.1 XML and sends
//! them to the authority.
//!
//! All monetary values use [`rust_decimal::Decimal`]. Amounts are only
//! rounded (half away from zero) when they are written.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use comprobante::core::*;
//! use rust_decimal_macros::dec;
//!
//! let taxpayer = Taxpayer::new(
//!     "EMPRESA SAC",
//!     Identification::ruc("20601030013").unwrap(),
//!     Address::new("AV. AREQUIPA 100"),
//! );
//! let customer = Party::new("CLIENTE SA", Identification::ruc("20100070970").unwrap());
//!
//! let mut invoice = Invoice::factura(Arc::new(taxpayer), Arc::new(customer));
//! invoice.core_mut().set_id("F001", 1).unwrap();
//! invoice.core_mut().issue_date = NaiveDate::from_ymd_opt(2024, 3, 5)
//!     .unwrap()
//!     .and_hms_opt(10, 0, 0);
//! invoice.add_item(
//!     ItemBuilder::new("Servicio", dec!(2), "ZZ", dec!(100))
//!         .vat(dec!(18))
//!         .build()
//!         .unwrap(),
//! );
//!
//! assert!(invoice.validate(true).is_ok());
//! assert_eq!(invoice.totals().tax_inclusive, dec!(236));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document model, tax engine, validation, numbering |
//! | `ubl` | UBL 2.1 XML generation & parsing, signature slot |
//! | `archive` | ZIP packaging of documents and responses |
//! | `transport` | SOAP and REST submission (async) |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "archive")]
pub mod archive;

#[cfg(feature = "transport")]
pub mod transport;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;

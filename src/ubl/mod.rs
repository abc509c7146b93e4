//! UBL 2.1 XML generation and parsing for SUNAT documents.
//!
//! Serialization only accepts a [`Validated`](crate::core::Validated) borrow,
//! so every document written here has passed its validation rules.
//! Parsing rebuilds the document model from a signed XML and recomputes
//! every derived amount.
//!
//! # Example
//!
//! ```no_run
//! use comprobante::core::*;
//! use comprobante::ubl;
//!
//! let invoice: Invoice = todo!();
//! let validated = invoice.validated(true).unwrap();
//! let xml = ubl::invoice_to_xml(&validated).unwrap();
//! ```

mod common;
mod despatch;
mod sale;
mod signature;
pub(crate) mod xml_utils;

pub use despatch::{despatch_from_xml, despatch_to_xml};
pub use sale::{invoice_from_xml, invoice_to_xml, note_from_xml, note_to_xml};
pub use signature::{SignedXml, SigningMaterial, XmlSigner, digest_value, insert_signature, sign_xml};

use crate::core::{ComprobanteError, FiscalDocument};

/// Id of the `ds:Signature` element referenced from `cac:Signature`.
pub const SIGNATURE_ID: &str = "SignSUNAT";

/// UBL 2.1 namespace URIs.
pub mod ubl_ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    pub const DEBIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:DebitNote-2";
    pub const DESPATCH_ADVICE: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:DespatchAdvice-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
    pub const EXT: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}

/// Agency name used on SUNAT catalog attributes.
pub const SUNAT_AGENCY: &str = "PE:SUNAT";

/// Prefix of SUNAT catalog URIs, completed with e.g. `catalogo06`.
pub const CATALOG_URI: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:";

/// Parse any supported document, dispatching on the root element.
pub fn from_xml(xml: &str) -> Result<FiscalDocument, ComprobanteError> {
    let root = xml_utils::parse_tree(xml)?;
    match root.name.as_str() {
        "Invoice" => sale::invoice_from_tree(&root).map(FiscalDocument::Invoice),
        "CreditNote" | "DebitNote" => sale::note_from_tree(&root).map(FiscalDocument::Note),
        "DespatchAdvice" => despatch::despatch_from_tree(&root).map(FiscalDocument::Despatch),
        other => Err(ComprobanteError::Xml(format!(
            "unsupported root element '{other}'"
        ))),
    }
}

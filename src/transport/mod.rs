//! Submission of signed documents to SUNAT.
//!
//! Invoices, receipts and notes go through the SOAP `sendBill` service and are
//! answered synchronously with a CDR. Despatches go through the REST API: the
//! document is queued under a ticket that is polled with
//! [`Client::ticket_status`].
//!
//! # Example
//!
//! ```ignore
//! use comprobante::transport::*;
//!
//! let client = Client::new(EndpointConfig::default())?;
//! match submit(&client, &invoice, &signed).await? {
//!     Submitted::Accepted(cdr) => println!("{}", cdr.description),
//!     Submitted::Ticket(ticket) => println!("queued as {ticket}"),
//! }
//! ```

mod cdr;
mod client;
mod endpoint;
mod rest;
mod soap;

pub use cdr::CdrResponse;
pub use client::Client;
pub use endpoint::{EndpointConfig, Mode, Service};
pub use rest::{SendFile, SendRequest, SendResponse, StatusError, StatusResponse, TicketStatus, TokenResponse, token_form};
pub use soap::{parse_send_bill_response, send_bill_envelope};

use crate::archive::pack_document;
use crate::core::{ComprobanteError, Document};
use crate::ubl::SignedXml;

/// What the authority returned for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// Synchronous answer of the SOAP service.
    Accepted(CdrResponse),
    /// Ticket of a queued despatch.
    Ticket(String),
}

/// Pack a signed document and send it to the service its type belongs to.
pub async fn submit<D: Document>(
    client: &Client,
    document: &D,
    signed: &SignedXml,
) -> Result<Submitted, ComprobanteError> {
    let core = document.core();
    let (zip_name, zip) = pack_document(core, &signed.xml)?;
    if core.type_code().is_despatch() {
        client
            .send_despatch(&core.taxpayer, &zip_name, &zip)
            .await
            .map(Submitted::Ticket)
    } else {
        client
            .send_bill(&core.taxpayer, &zip_name, &zip)
            .await
            .map(Submitted::Accepted)
    }
}

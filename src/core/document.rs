use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;
use super::item::Item;
use super::numbering::{MAX_SEQUENCE, check_series, format_id};
use super::taxes::{SaleTotals, discount_factor, fixed};
use super::taxpayer::Taxpayer;
use super::types::*;
use super::validation::{self, Validated};

/// UBL schema version written in `cbc:UBLVersionID`.
pub const UBL_VERSION: &str = "2.1";
/// Customization written in `cbc:CustomizationID`.
pub const CUSTOMIZATION_ID: &str = "2.0";

/// Maximum length of free-text notes and discrepancy descriptions.
const MAX_NOTE_LEN: usize = 250;

/// Identity, parties and items shared by every document type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCore {
    type_code: DocumentTypeCode,
    pub taxpayer: Arc<Taxpayer>,
    pub customer: Arc<Party>,
    series: String,
    sequence: u32,
    pub issue_date: Option<NaiveDateTime>,
    pub ubl_version: String,
    pub customization_id: String,
    /// Digest of the signed XML, known after signing or parsing.
    pub hash: Option<String>,
    items: Vec<Item>,
}

impl DocumentCore {
    pub fn new(type_code: DocumentTypeCode, taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self {
            type_code,
            taxpayer,
            customer,
            series: String::new(),
            sequence: 0,
            issue_date: None,
            ubl_version: UBL_VERSION.to_string(),
            customization_id: CUSTOMIZATION_ID.to_string(),
            hash: None,
            items: Vec::new(),
        }
    }

    pub fn type_code(&self) -> DocumentTypeCode {
        self.type_code
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn set_series(&mut self, series: impl Into<String>) -> Result<(), ComprobanteError> {
        let series = series.into();
        check_series(&series)?;
        self.series = series;
        Ok(())
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u32) -> Result<(), ComprobanteError> {
        if sequence > MAX_SEQUENCE {
            return Err(ComprobanteError::input(format!(
                "sequence {sequence} exceeds {MAX_SEQUENCE}"
            )));
        }
        self.sequence = sequence;
        Ok(())
    }

    /// Set series and sequence together.
    pub fn set_id(&mut self, series: impl Into<String>, sequence: u32) -> Result<(), ComprobanteError> {
        self.set_series(series)?;
        self.set_sequence(sequence)
    }

    /// `F001-00000001`, or `01-F001-00000001` with the type prefix.
    pub fn id(&self, with_type: bool, compacted: bool) -> String {
        format_id(
            with_type.then_some(self.type_code),
            &self.series,
            self.sequence,
            compacted,
        )
    }

    pub fn issue_date(&self) -> Result<NaiveDateTime, ComprobanteError> {
        self.issue_date
            .ok_or_else(|| ComprobanteError::missing("issue date"))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    fn file_stem(&self) -> Result<String, ComprobanteError> {
        Ok(format!("{}-{}", self.taxpayer.ruc()?, self.id(true, false)))
    }

    /// Name of the XML entry inside the submitted ZIP.
    pub fn xml_file_name(&self) -> Result<String, ComprobanteError> {
        Ok(format!("{}.xml", self.file_stem()?))
    }

    pub fn zip_file_name(&self) -> Result<String, ComprobanteError> {
        Ok(format!("{}.zip", self.file_stem()?))
    }

    /// Name of the authority's response (CDR) entry.
    pub fn response_file_name(&self) -> Result<String, ComprobanteError> {
        Ok(format!("R-{}.xml", self.file_stem()?))
    }
}

/// Behaviour common to every document.
pub trait Document {
    fn core(&self) -> &DocumentCore;

    fn core_mut(&mut self) -> &mut DocumentCore;

    /// Layered completeness check, failing on the first violation.
    fn validate(&self, check_sequence: bool) -> Result<(), ComprobanteError>;

    /// Validate and borrow the document as [`Validated`], which freezes it
    /// for serialization.
    fn validated(&self, check_sequence: bool) -> Result<Validated<'_, Self>, ComprobanteError>
    where
        Self: Sized,
    {
        self.validate(check_sequence)?;
        Ok(Validated::new(self))
    }
}

// ---------------------------------------------------------------------------
// Sale capability
// ---------------------------------------------------------------------------

/// Currency and running totals of a priced document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub core: DocumentCore,
    pub currency: String,
    totals: SaleTotals,
}

impl Sale {
    pub fn new(core: DocumentCore) -> Self {
        Self {
            core,
            currency: "PEN".to_string(),
            totals: SaleTotals::default(),
        }
    }

    pub fn totals(&self) -> &SaleTotals {
        &self.totals
    }

    pub fn items(&self) -> &[Item] {
        self.core.items()
    }

    /// Recompute the item's amounts and add them to the running totals.
    pub fn add_item(&mut self, mut item: Item) {
        item.compute_taxes();
        self.totals.add_item(item.amounts(), item.bucket());
        self.core.items_mut().push(item);
    }

    /// Add an item with the amounts it already carries.
    pub fn add_item_as_is(&mut self, item: Item) {
        self.totals.add_item(item.amounts(), item.bucket());
        self.core.items_mut().push(item);
    }

    /// Remove the item at `index` (0-based) and rebuild the totals.
    pub fn remove_item(&mut self, index: usize) -> Option<Item> {
        if index >= self.core.items().len() {
            return None;
        }
        let item = self.core.items_mut().remove(index);
        self.recalculate();
        Some(item)
    }

    pub fn clear_items(&mut self) {
        self.core.items_mut().clear();
        self.recalculate();
    }

    /// Mutable access to the items; call [`Sale::recalculate`] afterwards.
    pub fn items_mut(&mut self) -> &mut [Item] {
        self.core.items_mut()
    }

    /// Recompute every item and rebuild the totals from scratch.
    pub fn recalculate(&mut self) {
        let plastic_bag_tax = self.totals.plastic_bag_tax;
        self.totals = SaleTotals {
            plastic_bag_tax,
            ..SaleTotals::default()
        };
        for item in self.core.items_mut().iter_mut() {
            item.compute_taxes();
        }
        for item in self.core.items() {
            self.totals.add_item(item.amounts(), item.bucket());
        }
    }

    pub fn set_plastic_bag_tax(&mut self, amount: Decimal) {
        self.totals.plastic_bag_tax = amount;
    }

    pub(crate) fn apply_discount_factor(&mut self, factor: Decimal) {
        self.totals.apply_discount_factor(factor);
    }

    /// Pipe-separated payload printed as QR code on the representation.
    pub fn qr_data(&self) -> Result<String, ComprobanteError> {
        let core = &self.core;
        let customer = core.customer.identification()?;
        Ok(format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            core.taxpayer.ruc()?,
            core.type_code().padded(),
            core.series(),
            core.sequence(),
            fixed(self.totals.vat, 2),
            fixed(self.totals.tax_inclusive, 2),
            core.issue_date()?.format("%Y-%m-%d"),
            customer.kind().code(),
            customer.number(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Invoice
// ---------------------------------------------------------------------------

/// A discount together with the amount it was requested with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub requested: Decimal,
    pub charge: Charge,
}

/// Factura (01) or boleta (03).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub sale: Sale,
    /// Only emitted for facturas paid without installments.
    pub due_date: Option<NaiveDate>,
    order_reference: Option<String>,
    order_reference_text: Option<String>,
    shares: Vec<Share>,
    discount: Option<Discount>,
    detraction: Option<Detraction>,
}

impl Invoice {
    pub fn new(
        type_code: DocumentTypeCode,
        taxpayer: Arc<Taxpayer>,
        customer: Arc<Party>,
    ) -> Result<Self, ComprobanteError> {
        if !type_code.is_sale_invoice() {
            return Err(ComprobanteError::input(format!(
                "type code {} is not an invoice",
                type_code.padded()
            )));
        }
        Ok(Self::with_code(type_code, taxpayer, customer))
    }

    pub fn factura(taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self::with_code(DocumentTypeCode::Invoice, taxpayer, customer)
    }

    pub fn boleta(taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self::with_code(DocumentTypeCode::Receipt, taxpayer, customer)
    }

    fn with_code(type_code: DocumentTypeCode, taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self {
            sale: Sale::new(DocumentCore::new(type_code, taxpayer, customer)),
            due_date: None,
            order_reference: None,
            order_reference_text: None,
            shares: Vec::new(),
            discount: None,
            detraction: None,
        }
    }

    pub fn add_item(&mut self, item: Item) {
        self.sale.add_item(item);
    }

    pub fn totals(&self) -> &SaleTotals {
        self.sale.totals()
    }

    /// Rebuild totals from the items and re-apply the discount, if any.
    ///
    /// When the new total can no longer carry the requested discount, the
    /// discount keeps its previous factor and the error is returned.
    /// The detraction amount is not touched; call
    /// [`Invoice::compute_detraction_amount`] afterwards.
    pub fn recalculate(&mut self) -> Result<(), ComprobanteError> {
        self.sale.recalculate();
        match self.discount.take() {
            Some(previous) => self.apply_requested(previous.requested, Some(previous)),
            None => Ok(()),
        }
    }

    pub fn order_reference(&self) -> Option<&str> {
        self.order_reference.as_deref()
    }

    /// Purchase order number: no whitespace, at most 20 characters.
    pub fn set_order_reference(&mut self, reference: impl Into<String>) -> Result<(), ComprobanteError> {
        let reference = reference.into();
        if reference.is_empty()
            || reference.chars().count() > 20
            || reference.chars().any(char::is_whitespace)
        {
            return Err(ComprobanteError::input(format!(
                "order reference '{reference}' must be 1..=20 characters without spaces"
            )));
        }
        self.order_reference = Some(reference);
        Ok(())
    }

    pub fn order_reference_text(&self) -> Option<&str> {
        self.order_reference_text.as_deref()
    }

    pub fn set_order_reference_text(&mut self, text: impl Into<String>) -> Result<(), ComprobanteError> {
        if self.order_reference.is_none() {
            return Err(ComprobanteError::missing("order reference"));
        }
        self.order_reference_text = Some(text.into());
        Ok(())
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn add_share(&mut self, share: Share) {
        self.shares.push(share);
    }

    pub fn remove_share(&mut self, index: usize) -> Option<Share> {
        (index < self.shares.len()).then(|| self.shares.remove(index))
    }

    pub fn clear_shares(&mut self) {
        self.shares.clear();
    }

    /// Sum of all installment amounts.
    pub fn shares_amount(&self) -> Decimal {
        self.shares.iter().map(Share::amount).sum()
    }

    pub fn discount(&self) -> Option<&Charge> {
        self.discount.as_ref().map(|d| &d.charge)
    }

    /// Apply a global discount of `amount` against the current tax-inclusive
    /// total. A non-positive amount removes an existing discount. On error the
    /// existing discount is left in place.
    pub fn set_discount(&mut self, amount: Decimal) -> Result<(), ComprobanteError> {
        let previous = self.discount.take();
        if previous.is_some() {
            self.sale.recalculate();
        }
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        self.apply_requested(amount, previous)
    }

    /// Discount the undiscounted totals by `amount`, or fall back to `previous`.
    fn apply_requested(&mut self, amount: Decimal, previous: Option<Discount>) -> Result<(), ComprobanteError> {
        match discount_factor(amount, self.sale.totals().tax_inclusive) {
            Ok(factor) => {
                self.apply_discount(factor, amount);
                Ok(())
            }
            Err(e) => {
                if let Some(previous) = previous {
                    self.apply_discount(previous.charge.factor, previous.requested);
                }
                Err(e)
            }
        }
    }

    /// Apply a discount given directly as factor of the current totals.
    fn apply_discount(&mut self, factor: Decimal, requested: Decimal) {
        let base = self.sale.totals().line_extension;
        self.sale.apply_discount_factor(factor);
        self.discount = Some(Discount {
            requested,
            charge: Charge::with_factor(false, "02", factor, base),
        });
    }

    pub fn detraction(&self) -> Option<&Detraction> {
        self.detraction.as_ref()
    }

    pub fn detraction_mut(&mut self) -> Option<&mut Detraction> {
        self.detraction.as_mut()
    }

    /// Attach or update a detraction. Zero or negative removes it.
    pub fn set_detraction(&mut self, percentage: Decimal) -> Result<(), ComprobanteError> {
        if percentage <= Decimal::ZERO {
            self.detraction = None;
            return Ok(());
        }
        match self.detraction.as_mut() {
            Some(d) => d.set_percentage(percentage),
            None => {
                self.detraction = Some(Detraction::new(percentage)?);
                Ok(())
            }
        }
    }

    /// Recompute the detraction against the current total.
    pub fn compute_detraction_amount(&mut self) -> Decimal {
        let total = self.sale.totals().tax_inclusive;
        self.detraction
            .as_mut()
            .map_or(Decimal::ZERO, |d| d.compute_amount(total))
    }

    pub fn detraction_amount(&self) -> Decimal {
        self.detraction.as_ref().map_or(Decimal::ZERO, Detraction::amount)
    }

    pub fn has_detraction(&self) -> bool {
        self.detraction_amount() > Decimal::ZERO
    }

    /// What remains to be paid in installments after the detraction.
    pub fn shareable_amount(&self) -> Decimal {
        self.sale.totals().tax_inclusive - self.detraction_amount()
    }
}

impl Document for Invoice {
    fn core(&self) -> &DocumentCore {
        &self.sale.core
    }

    fn core_mut(&mut self) -> &mut DocumentCore {
        &mut self.sale.core
    }

    fn validate(&self, check_sequence: bool) -> Result<(), ComprobanteError> {
        validation::validate_invoice(self, check_sequence).map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// Credit (07) or debit (08) note against an earlier document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub sale: Sale,
    description: String,
    response_code: u8,
    document_reference: Option<String>,
    document_reference_type: Option<DocumentTypeCode>,
}

impl Note {
    pub fn new(
        type_code: DocumentTypeCode,
        taxpayer: Arc<Taxpayer>,
        customer: Arc<Party>,
    ) -> Result<Self, ComprobanteError> {
        if !type_code.is_note() {
            return Err(ComprobanteError::input(format!(
                "type code {} is not a note",
                type_code.padded()
            )));
        }
        Ok(Self::with_code(type_code, taxpayer, customer))
    }

    pub fn credit(taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self::with_code(DocumentTypeCode::CreditNote, taxpayer, customer)
    }

    pub fn debit(taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self::with_code(DocumentTypeCode::DebitNote, taxpayer, customer)
    }

    fn with_code(type_code: DocumentTypeCode, taxpayer: Arc<Taxpayer>, customer: Arc<Party>) -> Self {
        Self {
            sale: Sale::new(DocumentCore::new(type_code, taxpayer, customer)),
            description: String::new(),
            response_code: 1,
            document_reference: None,
            document_reference_type: None,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.sale.core.type_code() == DocumentTypeCode::CreditNote
    }

    pub fn add_item(&mut self, item: Item) {
        self.sale.add_item(item);
    }

    pub fn totals(&self) -> &SaleTotals {
        self.sale.totals()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Reason of the discrepancy; text over 250 characters is cut to 249.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = truncate_note(description.into());
    }

    /// Catalog 09 (credit) or 10 (debit) reason code.
    pub fn response_code(&self) -> u8 {
        self.response_code
    }

    pub fn set_response_code(&mut self, code: u8) {
        self.response_code = code;
    }

    pub fn document_reference(&self) -> Option<&str> {
        self.document_reference.as_deref()
    }

    pub fn document_reference_type(&self) -> Option<DocumentTypeCode> {
        self.document_reference_type
    }

    /// The document this note modifies, e.g. `("F001-00000001", Invoice)`.
    pub fn set_document_reference(&mut self, id: impl Into<String>, type_code: DocumentTypeCode) {
        self.document_reference = Some(id.into());
        self.document_reference_type = Some(type_code);
    }
}

impl Document for Note {
    fn core(&self) -> &DocumentCore {
        &self.sale.core
    }

    fn core_mut(&mut self) -> &mut DocumentCore {
        &mut self.sale.core
    }

    fn validate(&self, check_sequence: bool) -> Result<(), ComprobanteError> {
        validation::validate_note(self, check_sequence).map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Despatch
// ---------------------------------------------------------------------------

/// Guía de remisión (09 sender, 31 carrier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Despatch {
    pub core: DocumentCore,
    note: String,
    pub weight: Decimal,
    pub weight_unit: String,
    pub start_date: Option<NaiveDate>,
    pub delivery_address: Option<Address>,
    /// Where goods leave from; the taxpayer's address when unset.
    pub despatch_address: Option<Address>,
    /// Catalog 20 reason for the transfer.
    pub handling_code: u8,
    pub carrier: Option<Party>,
    /// Transfer in M1 or L category vehicles.
    pub light_vehicle: bool,
    pub vehicles: Vec<Vehicle>,
    pub drivers: Vec<Driver>,
    pub packages: Vec<Package>,
    pub port: Option<Port>,
    /// Consultation URL returned by the authority, printed as QR code.
    pub qr_url: Option<String>,
}

impl Despatch {
    pub fn new(
        type_code: DocumentTypeCode,
        taxpayer: Arc<Taxpayer>,
        customer: Arc<Party>,
    ) -> Result<Self, ComprobanteError> {
        if !type_code.is_despatch() {
            return Err(ComprobanteError::input(format!(
                "type code {} is not a despatch",
                type_code.padded()
            )));
        }
        Ok(Self {
            core: DocumentCore::new(type_code, taxpayer, customer),
            note: String::new(),
            weight: Decimal::ZERO,
            weight_unit: "KGM".to_string(),
            start_date: None,
            delivery_address: None,
            despatch_address: None,
            handling_code: 0,
            carrier: None,
            light_vehicle: false,
            vehicles: Vec::new(),
            drivers: Vec::new(),
            packages: Vec::new(),
            port: None,
            qr_url: None,
        })
    }

    pub fn add_item(&mut self, item: Item) {
        self.core.items_mut().push(item);
    }

    pub fn remove_item(&mut self, index: usize) -> Option<Item> {
        let items = self.core.items_mut();
        (index < items.len()).then(|| items.remove(index))
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Free-text observation; text over 250 characters is cut to 249.
    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = truncate_note(note.into());
    }

    /// Catalog 18: "01" public transport when a carrier is hired, else "02".
    pub fn transport_mode(&self) -> &'static str {
        if self.carrier.is_some() { "01" } else { "02" }
    }
}

impl Document for Despatch {
    fn core(&self) -> &DocumentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DocumentCore {
        &mut self.core
    }

    fn validate(&self, check_sequence: bool) -> Result<(), ComprobanteError> {
        validation::validate_despatch(self, check_sequence).map_err(Into::into)
    }
}

fn truncate_note(text: String) -> String {
    if text.chars().count() > MAX_NOTE_LEN {
        text.chars().take(MAX_NOTE_LEN - 1).collect()
    } else {
        text
    }
}

/// Any of the supported documents, as produced by the XML reader.
#[derive(Debug, Clone)]
pub enum FiscalDocument {
    Invoice(Invoice),
    Note(Note),
    Despatch(Despatch),
}

impl FiscalDocument {
    pub fn core(&self) -> &DocumentCore {
        match self {
            Self::Invoice(d) => d.core(),
            Self::Note(d) => d.core(),
            Self::Despatch(d) => d.core(),
        }
    }

    pub fn validate(&self, check_sequence: bool) -> Result<(), ComprobanteError> {
        match self {
            Self::Invoice(d) => d.validate(check_sequence),
            Self::Note(d) => d.validate(check_sequence),
            Self::Despatch(d) => d.validate(check_sequence),
        }
    }

    pub fn into_invoice(self) -> Option<Invoice> {
        match self {
            Self::Invoice(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_note(self) -> Option<Note> {
        match self {
            Self::Note(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_despatch(self) -> Option<Despatch> {
        match self {
            Self::Despatch(d) => Some(d),
            _ => None,
        }
    }
}

use rust_decimal::Decimal;

use super::document::{Despatch, DocumentCore, Invoice, Note, Sale};
use super::error::{ComprobanteError, ValidationError, ValidationRule};
use super::identification::IdentityType;
use super::numbering::MAX_SEQUENCE;
use super::taxes::round2;
use super::types::DocumentTypeCode;

type Check = Result<(), ValidationError>;

/// A document that passed validation, borrowed so it cannot change before it
/// is serialized.
#[derive(Debug)]
pub struct Validated<'a, D> {
    document: &'a D,
}

impl<'a, D> Validated<'a, D> {
    pub(crate) fn new(document: &'a D) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &'a D {
        self.document
    }
}

impl<D> Clone for Validated<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Validated<'_, D> {}

impl<D> std::ops::Deref for Validated<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.document
    }
}

/// Lifecycle of a document. This crate drives `Assembled → Validated`;
/// signing and submission move it further from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentState {
    Assembled,
    Validated,
    Signed,
    Submitted,
    Acknowledged,
    Failed,
}

impl DocumentState {
    /// Move to `next`, refusing transitions that skip or reverse a step.
    /// `Failed` is reachable from every other state.
    pub fn advance(self, next: DocumentState) -> Result<DocumentState, ComprobanteError> {
        use DocumentState::*;
        let ok = matches!(
            (self, next),
            (Assembled, Validated)
                | (Validated, Signed)
                | (Signed, Submitted)
                | (Submitted, Acknowledged)
                | (Assembled | Validated | Signed | Submitted | Acknowledged, Failed)
        );
        if ok {
            Ok(next)
        } else {
            Err(ComprobanteError::input(format!(
                "illegal state transition {self:?} -> {next:?}"
            )))
        }
    }

    /// No transition leaves a failed document.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Identity and issue date.
pub fn validate_core(core: &DocumentCore, check_sequence: bool) -> Check {
    if core.series().chars().count() != 4 {
        return Err(ValidationError::new(
            "series",
            "must be exactly 4 characters",
            ValidationRule::SeriesLength,
        ));
    }
    if check_sequence && !(1..=MAX_SEQUENCE).contains(&core.sequence()) {
        return Err(ValidationError::new(
            "sequence",
            format!("must be within 1..={MAX_SEQUENCE}"),
            ValidationRule::SequenceRange,
        ));
    }
    if core.issue_date.is_none() {
        return Err(ValidationError::new(
            "issue_date",
            "issue date is required",
            ValidationRule::IssueDate,
        ));
    }
    Ok(())
}

/// Items and currency of a priced document.
pub fn validate_sale(sale: &Sale, check_sequence: bool) -> Check {
    validate_core(&sale.core, check_sequence)?;

    if sale.items().is_empty() {
        return Err(ValidationError::new(
            "items",
            "at least one item is required",
            ValidationRule::NoItems,
        ));
    }
    if sale.currency.len() != 3 || !sale.currency.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            "currency",
            format!("'{}' is not a 3-letter currency code", sale.currency),
            ValidationRule::Currency,
        ));
    }

    for (i, item) in sale.items().iter().enumerate() {
        let pos = i + 1;
        if item.quantity() <= Decimal::ZERO {
            return Err(ValidationError::for_item(
                pos,
                "items.quantity",
                "must be positive",
                ValidationRule::ItemQuantity,
            ));
        }
        if item.unit_code.is_empty() {
            return Err(ValidationError::for_item(
                pos,
                "items.unit_code",
                "unit of measure is required",
                ValidationRule::ItemUnit,
            ));
        }
        if item.line_extension() <= Decimal::ZERO {
            return Err(ValidationError::for_item(
                pos,
                "items.line_extension",
                "must be positive",
                ValidationRule::ItemLineExtension,
            ));
        }
        if item.pricing_reference() <= Decimal::ZERO {
            return Err(ValidationError::for_item(
                pos,
                "items.pricing_reference",
                "must be positive",
                ValidationRule::ItemPricingReference,
            ));
        }
        if item.description().is_empty() {
            return Err(ValidationError::for_item(
                pos,
                "items.description",
                "description is required",
                ValidationRule::ItemDescription,
            ));
        }
    }
    Ok(())
}

/// Customer RUC, installments and detraction code.
pub fn validate_invoice(invoice: &Invoice, check_sequence: bool) -> Check {
    validate_sale(&invoice.sale, check_sequence)?;
    let core = &invoice.sale.core;

    if core.type_code() == DocumentTypeCode::Invoice {
        let has_ruc = core
            .customer
            .identification()
            .map(|id| id.kind() == IdentityType::TaxId)
            .unwrap_or(false);
        if !has_ruc {
            return Err(ValidationError::new(
                "customer.identification",
                "a factura requires a customer with RUC",
                ValidationRule::CustomerTaxId,
            ));
        }
    }

    if !invoice.shares().is_empty() {
        let expected = round2(invoice.shareable_amount());
        let actual = round2(invoice.shares_amount());
        if expected != actual {
            return Err(ValidationError::new(
                "shares",
                format!("installments sum {actual} but {expected} is payable"),
                ValidationRule::SharesMismatch,
            ));
        }
    }

    if let Some(d) = invoice.detraction() {
        if d.amount() > Decimal::ZERO && d.code().is_none() {
            return Err(ValidationError::new(
                "detraction.code",
                "a detraction requires a goods/service code",
                ValidationRule::DetractionCode,
            ));
        }
    }
    Ok(())
}

pub fn validate_note(note: &Note, check_sequence: bool) -> Check {
    validate_sale(&note.sale, check_sequence)
}

/// Shipment data and delivered items.
pub fn validate_despatch(despatch: &Despatch, check_sequence: bool) -> Check {
    validate_core(&despatch.core, check_sequence)?;

    if despatch.start_date.is_none() {
        return Err(ValidationError::new(
            "start_date",
            "transfer start date is required",
            ValidationRule::StartDate,
        ));
    }
    if despatch.weight <= Decimal::ZERO {
        return Err(ValidationError::new(
            "weight",
            "gross weight must be positive",
            ValidationRule::Weight,
        ));
    }
    if despatch.weight_unit.is_empty() {
        return Err(ValidationError::new(
            "weight_unit",
            "weight unit is required",
            ValidationRule::WeightUnit,
        ));
    }
    if despatch.handling_code == 0 {
        return Err(ValidationError::new(
            "handling_code",
            "transfer reason is required",
            ValidationRule::HandlingCode,
        ));
    }

    let Some(address) = despatch.delivery_address.as_ref() else {
        return Err(ValidationError::new(
            "delivery_address",
            "delivery address is required",
            ValidationRule::DeliveryAddress,
        ));
    };
    if address.line().is_none() {
        return Err(ValidationError::new(
            "delivery_address.line",
            "delivery address line is required",
            ValidationRule::DeliveryAddress,
        ));
    }
    if address.ubigeo.as_deref().map(|u| u.chars().count()) != Some(6) {
        return Err(ValidationError::new(
            "delivery_address.ubigeo",
            "delivery geocode must be 6 characters",
            ValidationRule::DeliveryGeocode,
        ));
    }

    let items = despatch.core.items();
    if items.is_empty() {
        return Err(ValidationError::new(
            "items",
            "at least one item is required",
            ValidationRule::NoItems,
        ));
    }
    for (i, item) in items.iter().enumerate() {
        let pos = i + 1;
        if item.quantity() <= Decimal::ZERO {
            return Err(ValidationError::for_item(
                pos,
                "items.quantity",
                "must be positive",
                ValidationRule::ItemQuantity,
            ));
        }
        if item.unit_code.is_empty() {
            return Err(ValidationError::for_item(
                pos,
                "items.unit_code",
                "unit of measure is required",
                ValidationRule::ItemUnit,
            ));
        }
        if item.description().is_empty() {
            return Err(ValidationError::for_item(
                pos,
                "items.description",
                "description is required",
                ValidationRule::ItemDescription,
            ));
        }
    }
    Ok(())
}

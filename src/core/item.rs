use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;
use super::taxes::{ItemAmounts, LineInputs, MAX_QUANTITY, MAX_UNIT_VALUE, OperationBucket, compute_item_taxes};

/// A document line.
///
/// Inputs are changed through setters; derived amounts are only refreshed by
/// [`Item::compute_taxes`], which must be called again after any input change.
/// Deserializing runs the same input checks and recomputes the amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItem")]
pub struct Item {
    description: String,
    /// Seller's product code.
    pub code: Option<String>,
    /// UNSPSC product classification.
    pub classification_code: Option<String>,
    quantity: Decimal,
    unit_value: Decimal,
    /// UN/ECE rec 20 unit of measure (e.g. "NIU", "ZZ", "KGM").
    pub unit_code: String,
    excise_percentage: Decimal,
    vat_percentage: Decimal,
    exemption_code: u8,
    amounts: ItemAmounts,
}

impl Item {
    /// Create an item with no taxes and exemption code 10 (taxed).
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_code: impl Into<String>,
        unit_value: Decimal,
    ) -> Result<Self, ComprobanteError> {
        let mut item = Self {
            description: String::new(),
            code: None,
            classification_code: None,
            quantity: Decimal::ONE,
            unit_value: Decimal::ZERO,
            unit_code: unit_code.into(),
            excise_percentage: Decimal::ZERO,
            vat_percentage: Decimal::ZERO,
            exemption_code: 10,
            amounts: ItemAmounts::default(),
        };
        item.set_description(description);
        item.set_quantity(quantity)?;
        item.set_unit_value(unit_value, false)?;
        item.compute_taxes();
        Ok(item)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Empty descriptions are ignored.
    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        if !description.is_empty() {
            self.description = description;
        }
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn set_quantity(&mut self, quantity: Decimal) -> Result<(), ComprobanteError> {
        if quantity <= Decimal::ZERO || quantity > MAX_QUANTITY {
            return Err(ComprobanteError::input(format!(
                "quantity must be in (0, {MAX_QUANTITY}], got {quantity}"
            )));
        }
        self.quantity = quantity;
        Ok(())
    }

    /// Unit value without taxes.
    pub fn unit_value(&self) -> Decimal {
        self.unit_value
    }

    /// Set the unit value. With `vat_included`, the current VAT percentage is
    /// taken out first, so set the VAT percentage before calling this.
    pub fn set_unit_value(&mut self, value: Decimal, vat_included: bool) -> Result<(), ComprobanteError> {
        if value < Decimal::ZERO || value > MAX_UNIT_VALUE {
            return Err(ComprobanteError::input(format!(
                "unit value must be in [0, {MAX_UNIT_VALUE}], got {value}"
            )));
        }
        self.unit_value = if vat_included {
            value / (Decimal::ONE + self.vat_percentage / Decimal::ONE_HUNDRED)
        } else {
            value
        };
        Ok(())
    }

    pub fn excise_percentage(&self) -> Decimal {
        self.excise_percentage
    }

    pub fn set_excise_percentage(&mut self, percentage: Decimal) -> Result<(), ComprobanteError> {
        self.excise_percentage = check_percentage("excise", percentage)?;
        Ok(())
    }

    pub fn vat_percentage(&self) -> Decimal {
        self.vat_percentage
    }

    pub fn set_vat_percentage(&mut self, percentage: Decimal) -> Result<(), ComprobanteError> {
        self.vat_percentage = check_percentage("VAT", percentage)?;
        Ok(())
    }

    /// Catalog 07 affectation code.
    pub fn exemption_code(&self) -> u8 {
        self.exemption_code
    }

    pub fn set_exemption_code(&mut self, code: u8) {
        self.exemption_code = code;
    }

    pub fn bucket(&self) -> OperationBucket {
        OperationBucket::from_exemption_code(self.exemption_code)
    }

    /// Refresh the derived amounts from the current inputs.
    pub fn compute_taxes(&mut self) {
        self.amounts = compute_item_taxes(&LineInputs {
            quantity: self.quantity,
            unit_value: self.unit_value,
            excise_percentage: self.excise_percentage,
            vat_percentage: self.vat_percentage,
            exemption_code: self.exemption_code,
        });
    }

    pub fn amounts(&self) -> &ItemAmounts {
        &self.amounts
    }

    pub fn line_extension(&self) -> Decimal {
        self.amounts.line_extension
    }

    pub fn excise_amount(&self) -> Decimal {
        self.amounts.excise_amount
    }

    pub fn vat_base(&self) -> Decimal {
        self.amounts.vat_base
    }

    pub fn vat_amount(&self) -> Decimal {
        self.amounts.vat_amount
    }

    pub fn tax_total(&self) -> Decimal {
        self.amounts.tax_total
    }

    pub fn pricing_reference(&self) -> Decimal {
        self.amounts.pricing_reference
    }
}

#[derive(Deserialize)]
struct RawItem {
    description: String,
    code: Option<String>,
    classification_code: Option<String>,
    quantity: Decimal,
    unit_value: Decimal,
    unit_code: String,
    excise_percentage: Decimal,
    vat_percentage: Decimal,
    exemption_code: u8,
}

impl TryFrom<RawItem> for Item {
    type Error = ComprobanteError;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let mut item = Item::new(raw.description, raw.quantity, raw.unit_code, raw.unit_value)?;
        item.code = raw.code;
        item.classification_code = raw.classification_code;
        item.set_excise_percentage(raw.excise_percentage)?;
        item.set_vat_percentage(raw.vat_percentage)?;
        item.set_exemption_code(raw.exemption_code);
        item.compute_taxes();
        Ok(item)
    }
}

fn check_percentage(what: &str, percentage: Decimal) -> Result<Decimal, ComprobanteError> {
    if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(ComprobanteError::input(format!(
            "{what} percentage {percentage} outside 0..=100"
        )));
    }
    Ok(percentage)
}

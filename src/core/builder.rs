use rust_decimal::Decimal;

use super::error::ComprobanteError;
use super::item::Item;
use super::types::Address;

/// Builder for document lines.
///
/// ```
/// use comprobante::core::*;
/// use rust_decimal_macros::dec;
///
/// let item = ItemBuilder::new("Laptop", dec!(2), "NIU", dec!(2360))
///     .vat(dec!(18))
///     .vat_included()
///     .code("LAP-01")
///     .build()
///     .unwrap();
///
/// assert_eq!(item.unit_value(), dec!(2000));
/// assert_eq!(item.line_extension(), dec!(4000));
/// assert_eq!(item.vat_amount(), dec!(720));
/// ```
pub struct ItemBuilder {
    description: String,
    quantity: Decimal,
    unit_code: String,
    unit_value: Decimal,
    vat_included: bool,
    vat_percentage: Decimal,
    excise_percentage: Decimal,
    exemption_code: u8,
    code: Option<String>,
    classification_code: Option<String>,
}

impl ItemBuilder {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_code: impl Into<String>,
        unit_value: Decimal,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_code: unit_code.into(),
            unit_value,
            vat_included: false,
            vat_percentage: Decimal::ZERO,
            excise_percentage: Decimal::ZERO,
            exemption_code: 10,
            code: None,
            classification_code: None,
        }
    }

    pub fn vat(mut self, percentage: Decimal) -> Self {
        self.vat_percentage = percentage;
        self
    }

    pub fn excise(mut self, percentage: Decimal) -> Self {
        self.excise_percentage = percentage;
        self
    }

    /// The unit value given to `new` already includes VAT.
    pub fn vat_included(mut self) -> Self {
        self.vat_included = true;
        self
    }

    /// Catalog 07 affectation code (default 10, taxed).
    pub fn exemption(mut self, code: u8) -> Self {
        self.exemption_code = code;
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn classification(mut self, code: impl Into<String>) -> Self {
        self.classification_code = Some(code.into());
        self
    }

    /// Build the item with its amounts computed.
    pub fn build(self) -> Result<Item, ComprobanteError> {
        let mut item = Item::new(self.description, self.quantity, self.unit_code, Decimal::ZERO)?;
        item.set_vat_percentage(self.vat_percentage)?;
        item.set_excise_percentage(self.excise_percentage)?;
        item.set_exemption_code(self.exemption_code);
        item.set_unit_value(self.unit_value, self.vat_included)?;
        item.code = self.code;
        item.classification_code = self.classification_code;
        item.compute_taxes();
        Ok(item)
    }
}

/// Builder for postal addresses.
pub struct AddressBuilder {
    address: Address,
}

impl AddressBuilder {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            address: Address::new(line),
        }
    }

    pub fn country(mut self, code: impl Into<String>) -> Self {
        self.address.country = Some(code.into());
        self
    }

    pub fn ubigeo(mut self, ubigeo: impl Into<String>) -> Self {
        self.address.ubigeo = Some(ubigeo.into());
        self
    }

    pub fn type_code(mut self, code: impl Into<String>) -> Self {
        self.address.type_code = Some(code.into());
        self
    }

    pub fn urbanization(mut self, urbanization: impl Into<String>) -> Self {
        self.address.urbanization = Some(urbanization.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.address.city = Some(city.into());
        self
    }

    pub fn subentity(mut self, subentity: impl Into<String>) -> Self {
        self.address.subentity = Some(subentity.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.address.district = Some(district.into());
        self
    }

    pub fn build(self) -> Address {
        self.address
    }
}

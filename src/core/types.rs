use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;
use super::identification::Identification;
use super::taxes::MAX_AMOUNT;

/// Document type codes (catalog 01) handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentTypeCode {
    /// 01: Factura.
    Invoice,
    /// 03: Boleta de venta.
    Receipt,
    /// 07: Nota de crédito.
    CreditNote,
    /// 08: Nota de débito.
    DebitNote,
    /// 09: Guía de remisión remitente.
    Despatch,
    /// 31: Guía de remisión transportista.
    CarrierDespatch,
}

impl DocumentTypeCode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Invoice => 1,
            Self::Receipt => 3,
            Self::CreditNote => 7,
            Self::DebitNote => 8,
            Self::Despatch => 9,
            Self::CarrierDespatch => 31,
        }
    }

    /// Two-digit form used in identities and XML ("01", "31").
    pub fn padded(&self) -> String {
        format!("{:0>2}", self.code())
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Invoice),
            3 => Some(Self::Receipt),
            7 => Some(Self::CreditNote),
            8 => Some(Self::DebitNote),
            9 => Some(Self::Despatch),
            31 => Some(Self::CarrierDespatch),
            _ => None,
        }
    }

    /// Invoices and receipts carry payment terms, detractions and order references.
    pub fn is_sale_invoice(&self) -> bool {
        matches!(self, Self::Invoice | Self::Receipt)
    }

    pub fn is_note(&self) -> bool {
        matches!(self, Self::CreditNote | Self::DebitNote)
    }

    pub fn is_despatch(&self) -> bool {
        matches!(self, Self::Despatch | Self::CarrierDespatch)
    }
}

/// Postal address. Only the line is guarded: assigning an empty line keeps the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    line: Option<String>,
    /// ISO 3166-1 alpha-2 (e.g. "PE").
    pub country: Option<String>,
    /// INEI 6-character geocode (ubigeo).
    pub ubigeo: Option<String>,
    /// Establishment code registered with the authority (e.g. "0000").
    pub type_code: Option<String>,
    pub urbanization: Option<String>,
    pub city: Option<String>,
    /// Department.
    pub subentity: Option<String>,
    pub district: Option<String>,
}

impl Address {
    pub fn new(line: impl Into<String>) -> Self {
        let mut address = Self::default();
        address.set_line(line);
        address
    }

    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }

    pub fn set_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !line.is_empty() {
            self.line = Some(line);
        }
    }
}

/// A person or company appearing on a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    name: String,
    pub address: Option<Address>,
    identification: Option<Identification>,
}

impl Party {
    pub fn new(name: impl Into<String>, identification: Identification) -> Self {
        Self {
            name: name.into(),
            address: None,
            identification: Some(identification),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty names are ignored.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() {
            self.name = name;
        }
    }

    /// The party's identification; it is an error to read it before it is set.
    pub fn identification(&self) -> Result<&Identification, ComprobanteError> {
        self.identification
            .as_ref()
            .ok_or_else(|| ComprobanteError::missing("identification"))
    }

    pub fn has_identification(&self) -> bool {
        self.identification.is_some()
    }

    pub fn set_identification(&mut self, identification: Identification) {
        self.identification = Some(identification);
    }

    /// The address; it is an error to read it before it is set.
    pub fn address(&self) -> Result<&Address, ComprobanteError> {
        self.address
            .as_ref()
            .ok_or_else(|| ComprobanteError::missing("address"))
    }
}

/// Contact channels printed in the supplier block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub web: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.web.is_none() && self.email.is_none() && self.telephone.is_none()
    }
}

/// A driver of a despatch: a person plus license and family name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub person: Party,
    pub family_name: String,
    pub license: String,
}

impl Driver {
    pub fn new(
        name: impl Into<String>,
        family_name: impl Into<String>,
        identification: Identification,
        license: impl Into<String>,
    ) -> Self {
        Self {
            person: Party::new(name, identification),
            family_name: family_name.into(),
            license: license.into(),
        }
    }
}

/// Document-level allowance or charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// True = charge, false = allowance (discount).
    pub is_charge: bool,
    pub amount: Decimal,
    /// Catalog 53 reason code (e.g. "02" global discount).
    pub type_code: String,
    pub factor: Decimal,
    pub base_amount: Decimal,
}

impl Charge {
    /// A factor-based charge; `amount = factor × base`.
    pub fn with_factor(
        is_charge: bool,
        type_code: impl Into<String>,
        factor: Decimal,
        base_amount: Decimal,
    ) -> Self {
        Self {
            is_charge,
            amount: factor * base_amount,
            type_code: type_code.into(),
            factor,
            base_amount,
        }
    }
}

/// Detraction (SPOT withholding) applied to an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detraction {
    percentage: Decimal,
    code: Option<String>,
    /// Banco de la Nación account receiving the withholding.
    pub financial_account: Option<String>,
    amount: Decimal,
}

/// Threshold above which a detraction applies.
pub const DETRACTION_THRESHOLD: Decimal = dec!(700);

impl Detraction {
    pub fn new(percentage: Decimal) -> Result<Self, ComprobanteError> {
        let mut d = Self {
            percentage: Decimal::ZERO,
            code: None,
            financial_account: None,
            amount: Decimal::ZERO,
        };
        d.set_percentage(percentage)?;
        Ok(d)
    }

    pub fn percentage(&self) -> Decimal {
        self.percentage
    }

    /// Out-of-range values reset the percentage to zero and fail.
    pub fn set_percentage(&mut self, percentage: Decimal) -> Result<(), ComprobanteError> {
        if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            self.percentage = Decimal::ZERO;
            return Err(ComprobanteError::input(format!(
                "detraction percentage {percentage} outside 0..=100"
            )));
        }
        self.percentage = percentage;
        Ok(())
    }

    /// Catalog 54 goods/service code.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn set_code(&mut self, code: impl Into<String>) -> Result<(), ComprobanteError> {
        let code = code.into();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ComprobanteError::input(format!(
                "detraction code '{code}' must be 3 digits"
            )));
        }
        self.code = Some(code);
        Ok(())
    }

    /// Amount computed by the last [`Detraction::compute_amount`] call.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Recompute the amount against the document's tax-inclusive total.
    pub fn compute_amount(&mut self, tax_inclusive: Decimal) -> Decimal {
        self.amount = super::taxes::detraction_amount(self.percentage, tax_inclusive);
        self.amount
    }
}

/// One installment of a credit sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawShare")]
pub struct Share {
    due_date: NaiveDate,
    amount: Decimal,
}

impl Share {
    pub fn new(due_date: NaiveDate, amount: Decimal) -> Result<Self, ComprobanteError> {
        if amount <= Decimal::ZERO || amount > MAX_AMOUNT {
            return Err(ComprobanteError::input(format!(
                "share amount must be in (0, {MAX_AMOUNT}], got {amount}"
            )));
        }
        Ok(Self { due_date, amount })
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

#[derive(Deserialize)]
struct RawShare {
    due_date: NaiveDate,
    amount: Decimal,
}

impl TryFrom<RawShare> for Share {
    type Error = ComprobanteError;

    fn try_from(raw: RawShare) -> Result<Self, Self::Error> {
        Self::new(raw.due_date, raw.amount)
    }
}

/// A vehicle used in a despatch. The first one on a despatch is the primary vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// License plate.
    pub plate: String,
    /// Registration certificate (TUCE) or nationality registration.
    pub registration: Option<String>,
    /// Special authorization number.
    pub authorization: Option<String>,
    /// Entity issuing the authorization (catalog D-37).
    pub authorization_entity: Option<String>,
}

impl Vehicle {
    pub fn new(plate: impl Into<String>) -> Self {
        Self {
            plate: plate.into(),
            ..Self::default()
        }
    }
}

/// A container or package identified by its trace id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub trace_id: String,
}

/// Port or airport of first arrival (catalogs 63 and 64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub code: String,
    pub name: String,
    pub is_airport: bool,
}

impl Port {
    /// (schemeName, catalog URI suffix, location type code)
    pub fn catalog(&self) -> (&'static str, &'static str, &'static str) {
        if self.is_airport {
            ("Aeropuertos", "catalogo64", "2")
        } else {
            ("Puertos", "catalogo63", "1")
        }
    }
}

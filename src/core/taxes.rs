//! Tax and charge arithmetic.
//!
//! Everything here works on full-precision [`Decimal`] values. Rounding to two
//! decimals happens only when amounts are formatted for output.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;
use super::types::DETRACTION_THRESHOLD;

/// Upper bound of an item quantity.
pub const MAX_QUANTITY: Decimal = dec!(1000000000);

/// Upper bound of an item unit value.
pub const MAX_UNIT_VALUE: Decimal = dec!(1000000000);

/// Upper bound of a share amount.
///
/// With the line bounds above, no sum of items or shares a document can hold
/// in memory comes near the range of [`Decimal`].
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000000);

/// Amounts derived from an item's inputs by [`compute_item_taxes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAmounts {
    /// quantity × unit value
    pub line_extension: Decimal,
    pub excise_amount: Decimal,
    /// Taxable base for VAT: line extension plus excise.
    pub vat_base: Decimal,
    pub vat_amount: Decimal,
    /// excise + VAT
    pub tax_total: Decimal,
    /// Unit price including all taxes.
    pub pricing_reference: Decimal,
}

/// Inputs of the per-line tax computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInputs {
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub excise_percentage: Decimal,
    pub vat_percentage: Decimal,
    /// Catalog 07 affectation code (10 taxed, 20 exempt, 30 unaffected, 40 export).
    pub exemption_code: u8,
}

/// Compute line extension, excise, VAT and pricing reference for one line.
///
/// Exemption codes of 20 and above zero both percentages for the computation.
pub fn compute_item_taxes(inputs: &LineInputs) -> ItemAmounts {
    let (excise_pct, vat_pct) = if inputs.exemption_code >= 20 {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        (inputs.excise_percentage, inputs.vat_percentage)
    };
    let excise_rate = excise_pct / Decimal::ONE_HUNDRED;
    let vat_rate = vat_pct / Decimal::ONE_HUNDRED;

    let line_extension = inputs.quantity * inputs.unit_value;
    let excise_amount = excise_rate * line_extension;
    let vat_base = excise_amount + line_extension;
    let vat_amount = vat_rate * vat_base;

    ItemAmounts {
        line_extension,
        excise_amount,
        vat_base,
        vat_amount,
        tax_total: excise_amount + vat_amount,
        pricing_reference: inputs.unit_value
            * (Decimal::ONE + excise_rate)
            * (Decimal::ONE + vat_rate),
    }
}

/// Tax-treatment class of an item's line amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationBucket {
    Taxed,
    Exempt,
    Unaffected,
    Other,
}

impl OperationBucket {
    pub const ALL: [OperationBucket; 4] = [Self::Taxed, Self::Exempt, Self::Unaffected, Self::Other];

    pub fn from_exemption_code(code: u8) -> Self {
        match code {
            0..20 => Self::Taxed,
            20..30 => Self::Exempt,
            30..40 => Self::Unaffected,
            _ => Self::Other,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Taxed => 0,
            Self::Exempt => 1,
            Self::Unaffected => 2,
            Self::Other => 3,
        }
    }

    /// Catalog 05 tax scheme: (scheme id, name, international type code).
    pub fn tax_scheme(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Taxed => ("1000", "IGV", "VAT"),
            Self::Exempt => ("9997", "EXO", "VAT"),
            Self::Unaffected => ("9998", "INA", "FRE"),
            Self::Other => ("9999", "OTROS CONCEPTOS DE PAGO", "OTH"),
        }
    }
}

/// Catalog 05 scheme for the excise tax (ISC).
pub const EXCISE_SCHEME: (&str, &str, &str) = ("2000", "ISC", "EXC");

/// Running totals of a sale document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub line_extension: Decimal,
    pub tax_total: Decimal,
    pub tax_inclusive: Decimal,
    pub vat: Decimal,
    pub excise: Decimal,
    /// ICBPER; not derived from items.
    pub plastic_bag_tax: Decimal,
    /// Line extension per [`OperationBucket`], indexed by [`OperationBucket::index`].
    pub operations: [Decimal; 4],
}

impl SaleTotals {
    pub fn add_item(&mut self, amounts: &ItemAmounts, bucket: OperationBucket) {
        self.line_extension += amounts.line_extension;
        self.tax_total += amounts.tax_total;
        self.tax_inclusive += amounts.line_extension + amounts.tax_total;
        self.vat += amounts.vat_amount;
        self.excise += amounts.excise_amount;
        self.operations[bucket.index()] += amounts.line_extension;
    }

    pub fn operation(&self, bucket: OperationBucket) -> Decimal {
        self.operations[bucket.index()]
    }

    /// Scale every tax figure and bucket by `1 - factor`. Line extension is left as is.
    pub fn apply_discount_factor(&mut self, factor: Decimal) {
        let keep = Decimal::ONE - factor;
        self.vat *= keep;
        self.excise *= keep;
        self.tax_total *= keep;
        self.tax_inclusive *= keep;
        for op in &mut self.operations {
            *op *= keep;
        }
    }
}

/// Detraction amount: a share of the total, only above the 700 threshold.
pub fn detraction_amount(percentage: Decimal, tax_inclusive: Decimal) -> Decimal {
    if percentage > Decimal::ZERO && tax_inclusive > DETRACTION_THRESHOLD {
        tax_inclusive * percentage / Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Proportion of the tax-inclusive total a global discount takes away.
pub fn discount_factor(discount: Decimal, tax_inclusive: Decimal) -> Result<Decimal, ComprobanteError> {
    if tax_inclusive <= Decimal::ZERO {
        return Err(ComprobanteError::input(
            "cannot apply a discount to a document without a positive total",
        ));
    }
    if discount > tax_inclusive {
        return Err(ComprobanteError::input(format!(
            "discount {discount} exceeds total {tax_inclusive}"
        )));
    }
    Ok(discount / tax_inclusive)
}

/// Round half away from zero; used by formatting and share reconciliation.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Format with exactly `dp` decimals, rounding half away from zero.
pub fn fixed(value: Decimal, dp: u32) -> String {
    let mut v = value.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    v.rescale(dp);
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn inputs(quantity: Decimal, unit_value: Decimal, excise: Decimal, vat: Decimal, code: u8) -> LineInputs {
        LineInputs {
            quantity,
            unit_value,
            excise_percentage: excise,
            vat_percentage: vat,
            exemption_code: code,
        }
    }

    #[test]
    fn taxed_line() {
        let a = compute_item_taxes(&inputs(dec!(2), dec!(100), dec!(0), dec!(18), 10));
        assert_eq!(a.line_extension, dec!(200));
        assert_eq!(a.vat_base, dec!(200));
        assert_eq!(a.vat_amount, dec!(36));
        assert_eq!(a.tax_total, dec!(36));
        assert_eq!(a.pricing_reference, dec!(118));
    }

    #[test]
    fn excise_is_computed_before_vat() {
        let a = compute_item_taxes(&inputs(dec!(1), dec!(100), dec!(10), dec!(18), 10));
        assert_eq!(a.excise_amount, dec!(10));
        assert_eq!(a.vat_base, dec!(110));
        assert_eq!(a.vat_amount, dec!(19.8));
        assert_eq!(a.tax_total, dec!(29.8));
        assert_eq!(a.pricing_reference, dec!(129.8));
    }

    #[test]
    fn exempt_line_ignores_percentages() {
        let a = compute_item_taxes(&inputs(dec!(3), dec!(50), dec!(10), dec!(18), 20));
        assert_eq!(a.line_extension, dec!(150));
        assert_eq!(a.excise_amount, Decimal::ZERO);
        assert_eq!(a.vat_amount, Decimal::ZERO);
        assert_eq!(a.pricing_reference, dec!(50));
    }

    #[test]
    fn largest_line_stays_in_range() {
        let a = compute_item_taxes(&inputs(MAX_QUANTITY, MAX_UNIT_VALUE, dec!(100), dec!(100), 10));
        assert_eq!(a.line_extension, dec!(1000000000000000000));
        assert_eq!(a.tax_total, dec!(3000000000000000000));
        let mut t = SaleTotals::default();
        for _ in 0..1000 {
            t.add_item(&a, OperationBucket::Taxed);
        }
        assert_eq!(t.tax_inclusive, dec!(4000000000000000000000));
    }

    #[test]
    fn bucket_tiers() {
        assert_eq!(OperationBucket::from_exemption_code(10), OperationBucket::Taxed);
        assert_eq!(OperationBucket::from_exemption_code(17), OperationBucket::Taxed);
        assert_eq!(OperationBucket::from_exemption_code(20), OperationBucket::Exempt);
        assert_eq!(OperationBucket::from_exemption_code(30), OperationBucket::Unaffected);
        assert_eq!(OperationBucket::from_exemption_code(40), OperationBucket::Other);
    }

    #[test]
    fn detraction_threshold() {
        assert_eq!(detraction_amount(dec!(12), dec!(700)), Decimal::ZERO);
        assert_eq!(detraction_amount(dec!(0), dec!(5000)), Decimal::ZERO);
        assert_eq!(detraction_amount(dec!(12), dec!(1000)), dec!(120));
    }

    #[test]
    fn discount_factor_guards() {
        assert_eq!(discount_factor(dec!(100), dec!(1000)).unwrap(), dec!(0.1));
        assert!(discount_factor(dec!(1), Decimal::ZERO).is_err());
        assert!(discount_factor(dec!(2000), dec!(1000)).is_err());
    }

    #[test]
    fn totals_accumulate_and_scale() {
        let mut t = SaleTotals::default();
        let a = compute_item_taxes(&inputs(dec!(2), dec!(100), dec!(0), dec!(18), 10));
        t.add_item(&a, OperationBucket::Taxed);
        assert_eq!(t.tax_inclusive, dec!(236));
        t.apply_discount_factor(dec!(0.5));
        assert_eq!(t.tax_inclusive, dec!(118));
        assert_eq!(t.vat, dec!(18));
        assert_eq!(t.line_extension, dec!(200));
        assert_eq!(t.operation(OperationBucket::Taxed), dec!(100));
    }

    #[test]
    fn round2_half_away_from_zero() {
        assert_eq!(round2(dec!(2.345)), dec!(2.35));
        assert_eq!(round2(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round2(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn fixed_pads_and_rounds() {
        assert_eq!(fixed(dec!(236), 2), "236.00");
        assert_eq!(fixed(dec!(0.125), 2), "0.13");
        assert_eq!(fixed(dec!(2), 10), "2.0000000000");
        assert_eq!(fixed(dec!(0.1), 5), "0.10000");
    }
}

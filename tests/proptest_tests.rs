//! Property-based tests for the tax engine and identifiers.
//!
//! Run with: `cargo test --test proptest_tests`

#![cfg(feature = "core")]

use std::sync::Arc;

use comprobante::core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn taxpayer() -> Arc<Taxpayer> {
    Arc::new(Taxpayer::new(
        "EMPRESA SAC",
        Identification::ruc("20601030013").unwrap(),
        Address::new("AV. AREQUIPA 100"),
    ))
}

fn customer() -> Arc<Party> {
    Arc::new(Party::new(
        "CLIENTE SA",
        Identification::ruc("20100070970").unwrap(),
    ))
}

/// Quantity, unit value (cents), VAT and exemption code of one line.
fn line() -> impl Strategy<Value = (Decimal, Decimal, Decimal, u8)> {
    (
        (1u32..500).prop_map(Decimal::from),
        (1i64..1_000_000).prop_map(|c| Decimal::new(c, 2)),
        prop_oneof![Just(dec!(0)), Just(dec!(10)), Just(dec!(18))],
        prop_oneof![Just(10u8), Just(20u8), Just(30u8), Just(40u8)],
    )
}

fn invoice_with(lines: &[(Decimal, Decimal, Decimal, u8)]) -> Invoice {
    let mut inv = Invoice::factura(taxpayer(), customer());
    for (qty, value, vat, code) in lines {
        inv.add_item(
            ItemBuilder::new("Producto", *qty, "NIU", *value)
                .vat(*vat)
                .exemption(*code)
                .build()
                .unwrap(),
        );
    }
    inv
}

/// Modulo-11 check digit of the first ten RUC digits.
fn check_digit(digits: &[u32]) -> u32 {
    const WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];
    let sum: u32 = digits.iter().zip(WEIGHTS).map(|(d, w)| d * w).sum();
    (11 - sum % 11) % 10
}

proptest! {
    #[test]
    fn line_amounts_are_consistent((qty, value, vat, code) in line(), excise in 0u32..50) {
        let item = ItemBuilder::new("Producto", qty, "NIU", value)
            .vat(vat)
            .excise(Decimal::from(excise))
            .exemption(code)
            .build()
            .unwrap();

        prop_assert_eq!(item.line_extension(), qty * value);
        prop_assert_eq!(item.vat_base(), item.line_extension() + item.excise_amount());
        prop_assert_eq!(item.tax_total(), item.excise_amount() + item.vat_amount());
        if code >= 20 {
            prop_assert_eq!(item.vat_amount(), Decimal::ZERO);
            prop_assert_eq!(item.excise_amount(), Decimal::ZERO);
        }
    }

    #[test]
    fn totals_add_up(lines in prop::collection::vec(line(), 1..12)) {
        let inv = invoice_with(&lines);
        let totals = inv.totals();

        prop_assert_eq!(totals.tax_inclusive, totals.line_extension + totals.tax_total);
        prop_assert_eq!(totals.tax_total, totals.vat + totals.excise);
        let by_bucket: Decimal = OperationBucket::ALL.iter().map(|b| totals.operation(*b)).sum();
        prop_assert_eq!(by_bucket, totals.line_extension);
        let items_vat: Decimal = inv.sale.items().iter().map(Item::vat_amount).sum();
        prop_assert_eq!(items_vat, totals.vat);
    }

    #[test]
    fn recalculate_is_idempotent(lines in prop::collection::vec(line(), 1..8)) {
        let mut inv = invoice_with(&lines);
        let before = *inv.totals();
        inv.recalculate().unwrap();
        prop_assert_eq!(before, *inv.totals());
    }

    #[test]
    fn detraction_only_above_threshold(
        lines in prop::collection::vec(line(), 1..6),
        pct in 1u32..=100,
    ) {
        let mut inv = invoice_with(&lines);
        inv.set_detraction(Decimal::from(pct)).unwrap();
        let amount = inv.compute_detraction_amount();
        let total = inv.totals().tax_inclusive;

        if total <= DETRACTION_THRESHOLD {
            prop_assert_eq!(amount, Decimal::ZERO);
        } else {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount <= total);
        }
        prop_assert_eq!(inv.shareable_amount() + amount, total);
    }

    #[test]
    fn discount_reduces_payable_amount(
        lines in prop::collection::vec(line(), 1..6),
        share in 1u32..100,
    ) {
        let mut inv = invoice_with(&lines);
        let total = inv.totals().tax_inclusive;
        let discount = round2(total * Decimal::from(share) / Decimal::ONE_HUNDRED);
        prop_assume!(discount > Decimal::ZERO);

        inv.set_discount(discount).unwrap();
        let expected = round2(total - discount);
        let actual = round2(inv.totals().tax_inclusive);
        prop_assert!((expected - actual).abs() <= dec!(0.01));
        prop_assert_eq!(inv.totals().line_extension, invoice_with(&lines).totals().line_extension);

        inv.set_discount(Decimal::ZERO).unwrap();
        prop_assert_eq!(inv.totals().tax_inclusive, total);
    }

    #[test]
    fn ruc_check_digit_is_enforced(
        prefix in prop::sample::select(vec!["10", "15", "17", "20"]),
        body in prop::collection::vec(0u32..10, 8),
        wrong in 1u32..10,
    ) {
        let mut digits: Vec<u32> = prefix.chars().filter_map(|c| c.to_digit(10)).collect();
        digits.extend(body);
        let check = check_digit(&digits);
        let base: String = digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect();

        let valid = format!("{base}{check}");
        prop_assert!(is_valid_ruc(&valid));
        prop_assert!(Identification::ruc(valid).is_ok());

        let invalid = format!("{base}{}", (check + wrong) % 10);
        prop_assert!(!is_valid_ruc(&invalid));
    }

    #[test]
    fn identity_is_zero_padded(sequence in 1u32..=MAX_SEQUENCE) {
        let id = format_id(None, "F001", sequence, false);
        prop_assert_eq!(id.len(), 13);
        let (series, number) = id.split_once('-').unwrap();
        prop_assert_eq!(series, "F001");
        prop_assert_eq!(number.parse::<u32>().unwrap(), sequence);
    }

    #[test]
    fn legend_has_cents_fraction(cents in 0i64..100_000_000) {
        let amount = Decimal::new(cents, 2);
        let words = amount_to_words(amount, "CON", "SOLES");
        let expected = format!(" CON {:02}/100 SOLES", cents % 100);
        prop_assert!(words.ends_with(&expected));
        prop_assert_eq!(words.clone(), words.to_uppercase());
    }
}

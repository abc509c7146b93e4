use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::taxes::round2;

const UNITS: [&str; 30] = [
    "cero", "uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve", "diez",
    "once", "doce", "trece", "catorce", "quince", "dieciséis", "diecisiete", "dieciocho",
    "diecinueve", "veinte", "veintiuno", "veintidós", "veintitrés", "veinticuatro", "veinticinco",
    "veintiséis", "veintisiete", "veintiocho", "veintinueve",
];

const TENS: [&str; 10] = [
    "", "", "", "treinta", "cuarenta", "cincuenta", "sesenta", "setenta", "ochenta", "noventa",
];

const HUNDREDS: [&str; 10] = [
    "",
    "ciento",
    "doscientos",
    "trescientos",
    "cuatrocientos",
    "quinientos",
    "seiscientos",
    "setecientos",
    "ochocientos",
    "novecientos",
];

/// Legend text of a total: `"DOSCIENTOS TREINTA Y SEIS CON 00/100 SOLES"`.
///
/// The integer part is spelled out in Spanish, the cents are written as a fraction.
/// `junctor` and `tail` are written as given; the UBL legend passes the currency
/// name as `tail`, though a currency code works the same way.
pub fn amount_to_words(amount: Decimal, junctor: &str, tail: &str) -> String {
    let rounded = round2(amount.abs());
    let integer = rounded.trunc();
    let cents = ((rounded - integer) * Decimal::ONE_HUNDRED)
        .to_u64()
        .unwrap_or_default();
    let words = number_to_words(integer.to_u64().unwrap_or_default()).to_uppercase();
    format!("{words} {junctor} {cents:02}/100 {tail}")
}

/// Spell out a whole number in Spanish (lowercase).
pub fn number_to_words(n: u64) -> String {
    if n == 0 {
        return UNITS[0].to_string();
    }
    let mut parts = Vec::new();

    let millions = n / 1_000_000;
    let rest = n % 1_000_000;
    if millions == 1 {
        parts.push("un millón".to_string());
    } else if millions > 1 {
        parts.push(format!("{} millones", apocopate(number_to_words(millions))));
    }

    let thousands = rest / 1000;
    if thousands == 1 {
        parts.push("mil".to_string());
    } else if thousands > 1 {
        parts.push(format!("{} mil", apocopate(below_thousand(thousands))));
    }

    let units = rest % 1000;
    if units > 0 {
        parts.push(below_thousand(units));
    }
    parts.join(" ")
}

fn below_thousand(n: u64) -> String {
    if n == 100 {
        return "cien".to_string();
    }
    let hundreds = (n / 100) as usize;
    let rest = n % 100;
    let mut out = String::from(HUNDREDS[hundreds]);
    if rest > 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&below_hundred(rest));
    }
    out
}

fn below_hundred(n: u64) -> String {
    let n = n as usize;
    if n < 30 {
        return UNITS[n].to_string();
    }
    match n % 10 {
        0 => TENS[n / 10].to_string(),
        u => format!("{} y {}", TENS[n / 10], UNITS[u]),
    }
}

// "uno" shortens to "un" in front of "mil" and "millones".
fn apocopate(words: String) -> String {
    if let Some(stem) = words.strip_suffix("veintiuno") {
        format!("{stem}veintiún")
    } else if let Some(stem) = words.strip_suffix("uno") {
        format!("{stem}un")
    } else {
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn legend_for_total() {
        assert_eq!(
            amount_to_words(dec!(236), "con", "PEN"),
            "DOSCIENTOS TREINTA Y SEIS con 00/100 PEN"
        );
        assert_eq!(
            amount_to_words(dec!(1001.5), "con", "USD"),
            "MIL UNO con 50/100 USD"
        );
        assert_eq!(amount_to_words(Decimal::ZERO, "con", "PEN"), "CERO con 00/100 PEN");
    }

    #[test]
    fn cents_are_rounded() {
        assert_eq!(amount_to_words(dec!(10.005), "con", "PEN"), "DIEZ con 01/100 PEN");
    }

    #[test]
    fn spanish_numbers() {
        assert_eq!(number_to_words(15), "quince");
        assert_eq!(number_to_words(21), "veintiuno");
        assert_eq!(number_to_words(40), "cuarenta");
        assert_eq!(number_to_words(99), "noventa y nueve");
        assert_eq!(number_to_words(100), "cien");
        assert_eq!(number_to_words(101), "ciento uno");
        assert_eq!(number_to_words(2000), "dos mil");
        assert_eq!(number_to_words(21_000), "veintiún mil");
        assert_eq!(number_to_words(31_000), "treinta y un mil");
        assert_eq!(number_to_words(100_000), "cien mil");
        assert_eq!(number_to_words(1_000_000), "un millón");
        assert_eq!(
            number_to_words(2_500_100),
            "dos millones quinientos mil cien"
        );
    }
}

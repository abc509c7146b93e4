use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use comprobante::core::*;
use comprobante::ubl;

const SIGNATURE: &str = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="SignSUNAT"><ds:SignedInfo><ds:Reference URI=""><ds:DigestValue>YmVuY2g=</ds:DigestValue></ds:Reference></ds:SignedInfo></ds:Signature>"#;

fn build_invoice(lines: usize) -> Invoice {
    let taxpayer = Taxpayer::new(
        "BENCHMARK SAC",
        Identification::ruc("20601030013").unwrap(),
        AddressBuilder::new("AV. AREQUIPA 100").ubigeo("150101").build(),
    );
    let customer = Party::new("CLIENTE SA", Identification::ruc("20100070970").unwrap());
    let mut inv = Invoice::factura(Arc::new(taxpayer), Arc::new(customer));
    inv.core_mut().set_id("F001", 1).unwrap();
    inv.core_mut().issue_date = NaiveDate::from_ymd_opt(2024, 6, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0);

    for i in 1..=lines {
        inv.add_item(
            ItemBuilder::new(format!("Servicio {i}"), dec!(5), "ZZ", dec!(120.50))
                .vat(dec!(18))
                .code(format!("S-{i:04}"))
                .build()
                .unwrap(),
        );
    }
    inv
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_10_line_invoice", |b| {
        b.iter(|| black_box(build_invoice(10)))
    });
}

fn bench_serialize(c: &mut Criterion) {
    let small = build_invoice(10);
    let large = build_invoice(1000);

    c.bench_function("invoice_to_xml_10_lines", |b| {
        b.iter(|| ubl::invoice_to_xml(&small.validated(true).unwrap()).unwrap())
    });
    c.bench_function("invoice_to_xml_1000_lines", |b| {
        b.iter(|| ubl::invoice_to_xml(&large.validated(true).unwrap()).unwrap())
    });
}

fn bench_parse(c: &mut Criterion) {
    let inv = build_invoice(100);
    let xml = ubl::invoice_to_xml(&inv.validated(true).unwrap()).unwrap();
    let signed = ubl::insert_signature(&xml, SIGNATURE).unwrap();

    c.bench_function("invoice_from_xml_100_lines", |b| {
        b.iter(|| ubl::invoice_from_xml(black_box(&signed)).unwrap())
    });
}

criterion_group!(benches, bench_build, bench_serialize, bench_parse);
criterion_main!(benches);

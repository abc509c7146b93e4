//! Offline tests of the submission pipeline: packing, envelopes, responses.

#![cfg(feature = "transport")]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use comprobante::archive::{pack_document, pack_xml, unpack_xml};
use comprobante::core::*;
use comprobante::transport::*;
use comprobante::ubl::{self, SignedXml};
use rust_decimal_macros::dec;

const SIGNATURE: &str = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="SignSUNAT"><ds:SignedInfo><ds:Reference URI=""><ds:DigestValue>3q2+7w==</ds:DigestValue></ds:Reference></ds:SignedInfo></ds:Signature>"#;

fn taxpayer(with_credentials: bool) -> Arc<Taxpayer> {
    let mut t = Taxpayer::new(
        "EMPRESA SAC",
        Identification::ruc("20601030013").unwrap(),
        AddressBuilder::new("AV. AREQUIPA 100").ubigeo("150101").build(),
    );
    if with_credentials {
        t.set_sol("MODDATOS", "moddatos");
        t.set_oauth_client("client-1", "secret-1");
    }
    Arc::new(t)
}

fn invoice(taxpayer: Arc<Taxpayer>) -> Invoice {
    let customer = Party::new("CLIENTE SA", Identification::ruc("20100070970").unwrap());
    let mut inv = Invoice::factura(taxpayer, Arc::new(customer));
    inv.core_mut().set_id("F001", 1).unwrap();
    inv.core_mut().issue_date = NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(9, 0, 0);
    inv.add_item(
        ItemBuilder::new("Servicio", dec!(2), "ZZ", dec!(100))
            .vat(dec!(18))
            .build()
            .unwrap(),
    );
    inv
}

fn signed(inv: &Invoice) -> SignedXml {
    let xml = ubl::invoice_to_xml(&inv.validated(true).unwrap()).unwrap();
    let xml = ubl::insert_signature(&xml, SIGNATURE).unwrap();
    let digest = ubl::digest_value(&xml).unwrap().unwrap();
    SignedXml { xml, digest }
}

fn cdr(code: &str, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ar:ApplicationResponse xmlns:ar="urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2" xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>171</cbc:ID>
  <cac:DocumentResponse>
    <cac:Response>
      <cbc:ReferenceID>F001-00000001</cbc:ReferenceID>
      <cbc:ResponseCode>{code}</cbc:ResponseCode>
      <cbc:Description>{description}</cbc:Description>
    </cac:Response>
  </cac:DocumentResponse>
</ar:ApplicationResponse>"#
    )
}

fn send_bill_response(cdr_zip: &[u8]) -> String {
    format!(
        r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><br:sendBillResponse xmlns:br="http://service.sunat.gob.pe"><applicationResponse>{}</applicationResponse></br:sendBillResponse></soap-env:Body></soap-env:Envelope>"#,
        STANDARD.encode(cdr_zip)
    )
}

#[test]
fn packed_document_keeps_signed_xml() {
    let inv = invoice(taxpayer(true));
    let signed = signed(&inv);
    let (zip_name, zip) = pack_document(inv.core(), &signed.xml).unwrap();

    assert_eq!(zip_name, "20601030013-01-F001-00000001.zip");
    let xml = unpack_xml(&zip, "20601030013-01-F001-00000001.xml").unwrap();
    assert_eq!(xml, signed.xml);
    let parsed = ubl::invoice_from_xml(&xml).unwrap();
    assert_eq!(parsed.core().hash.as_deref(), Some(signed.digest.as_str()));
}

#[test]
fn envelope_carries_credentials_and_zip() {
    let inv = invoice(taxpayer(true));
    let (zip_name, zip) = pack_document(inv.core(), &signed(&inv).xml).unwrap();
    let envelope = send_bill_envelope(&inv.core().taxpayer, &zip_name, &zip).unwrap();

    assert!(envelope.contains("<wsse:Username>20601030013MODDATOS</wsse:Username>"));
    assert!(envelope.contains("<wsse:Password>moddatos</wsse:Password>"));
    assert!(envelope.contains(&format!("<fileName>{zip_name}</fileName>")));
    assert!(envelope.contains(&STANDARD.encode(&zip)));
}

#[test]
fn accepted_response_yields_cdr() {
    let cdr_zip = pack_xml(
        "R-20601030013-01-F001-00000001.xml",
        &cdr("0", "La Factura numero F001-00000001, ha sido aceptada"),
    )
    .unwrap();
    let body = send_bill_response(&cdr_zip);

    let zip = parse_send_bill_response(&body).unwrap();
    let response = CdrResponse::from_zip(&zip).unwrap().into_result().unwrap();
    assert_eq!(response.code, 0);
    assert!(response.description.ends_with("ha sido aceptada"));
}

#[test]
fn rejected_cdr_becomes_error() {
    let cdr_zip = pack_xml("R-x.xml", &cdr("2800", "El dato ingresado en el tipo de documento no cumple")).unwrap();
    let zip = parse_send_bill_response(&send_bill_response(&cdr_zip)).unwrap();
    match CdrResponse::from_zip(&zip).unwrap().into_result() {
        Err(ComprobanteError::Rejected { code, .. }) => assert_eq!(code, "2800"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn soap_fault_is_rejection() {
    let body = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><soap-env:Fault><faultcode>soap-env:Client.1033</faultcode><faultstring>El comprobante fue registrado previamente con otros datos</faultstring></soap-env:Fault></soap-env:Body></soap-env:Envelope>"#;
    match parse_send_bill_response(body) {
        Err(ComprobanteError::Rejected { code, message }) => {
            assert_eq!(code, "1033");
            assert!(message.starts_with("El comprobante"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn deeply_nested_response_is_an_error() {
    let body = format!("{}{}", "<x>".repeat(50_000), "</x>".repeat(50_000));
    assert!(matches!(parse_send_bill_response(&body), Err(ComprobanteError::Xml(_))));
    assert!(CdrResponse::from_xml(&body).is_err());
}

#[test]
fn endpoint_config_from_json() {
    let config: EndpointConfig = serde_json::from_str(
        r#"{"mode":"deploy","documents_url":"https://example.test/cpe/","timeout_secs":5}"#,
    )
    .unwrap();
    assert_eq!(config.mode, Mode::Deploy);
    assert_eq!(config.service, Service::Bill);
    assert_eq!(
        config.soap_endpoint(),
        "https://e-factura.sunat.gob.pe/ol-ti-itcpfegem/billService"
    );
    assert_eq!(
        config.send_endpoint("20601030013-09-T001-00000001"),
        "https://example.test/cpe/20601030013-09-T001-00000001"
    );
    assert_eq!(config.status_endpoint("abc"), "https://example.test/cpe/envios/abc");
    assert_eq!(
        config.token_endpoint("client-1"),
        "https://api-seguridad.sunat.gob.pe/v1/clientessol/client-1/oauth2/token"
    );
}

#[tokio::test]
async fn bill_without_sol_credentials_fails_before_sending() {
    let client = Client::new(EndpointConfig::default()).unwrap();
    let inv = invoice(taxpayer(false));
    let err = submit(&client, &inv, &signed(&inv)).await.unwrap_err();
    assert!(matches!(err, ComprobanteError::Precondition(_)));
}

#[tokio::test]
async fn despatch_without_oauth_client_fails_before_sending() {
    let client = Client::new(EndpointConfig::default()).unwrap();
    let customer = Party::new("CLIENTE SA", Identification::ruc("20100070970").unwrap());
    let mut d = Despatch::new(DocumentTypeCode::Despatch, taxpayer(false), Arc::new(customer)).unwrap();
    d.core_mut().set_id("T001", 1).unwrap();
    d.core_mut().issue_date = NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(9, 0, 0);
    d.start_date = NaiveDate::from_ymd_opt(2024, 3, 6);
    d.weight = dec!(1);
    d.handling_code = 1;
    d.delivery_address = Some(AddressBuilder::new("JR. UNION 500").ubigeo("150101").build());
    d.add_item(Item::new("Cajas", dec!(1), "NIU", dec!(0)).unwrap());

    let xml = ubl::despatch_to_xml(&d.validated(true).unwrap()).unwrap();
    let xml = ubl::insert_signature(&xml, SIGNATURE).unwrap();
    let signed = SignedXml {
        xml,
        digest: "3q2+7w==".into(),
    };

    let err = submit(&client, &d, &signed).await.unwrap_err();
    assert!(matches!(err, ComprobanteError::Precondition(_)));
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    let config = EndpointConfig {
        soap_url: Some("http://127.0.0.1:9/billService".into()),
        timeout_secs: 2,
        ..EndpointConfig::default()
    };
    let client = Client::new(config).unwrap();
    let inv = invoice(taxpayer(true));
    let err = submit(&client, &inv, &signed(&inv)).await.unwrap_err();
    assert!(matches!(err, ComprobanteError::Transport(_)));
}

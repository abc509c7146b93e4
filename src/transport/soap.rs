//! SOAP `sendBill` envelope and response handling.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::core::{ComprobanteError, Taxpayer};
use crate::ubl::xml_utils::{XmlWriter, parse_tree};

const SOAPENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SER: &str = "http://service.sunat.gob.pe";
const WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// Build the `sendBill` request for a packed document.
///
/// The SOL user name is the RUC followed by the secondary user.
pub fn send_bill_envelope(
    taxpayer: &Taxpayer,
    zip_name: &str,
    zip: &[u8],
) -> Result<String, ComprobanteError> {
    let username = format!("{}{}", taxpayer.ruc()?, taxpayer.sol_user()?);
    let password = taxpayer.sol_password()?;

    let mut w = XmlWriter::fragment();
    w.start_element_with_attrs(
        "soapenv:Envelope",
        &[("xmlns:soapenv", SOAPENV), ("xmlns:ser", SER), ("xmlns:wsse", WSSE)],
    )?;
    w.start_element("soapenv:Header")?;
    w.start_element("wsse:Security")?;
    w.start_element("wsse:UsernameToken")?;
    w.text_element("wsse:Username", &username)?;
    w.text_element("wsse:Password", password)?;
    w.end_element("wsse:UsernameToken")?;
    w.end_element("wsse:Security")?;
    w.end_element("soapenv:Header")?;
    w.start_element("soapenv:Body")?;
    w.start_element("ser:sendBill")?;
    w.text_element("fileName", zip_name)?;
    w.text_element("contentFile", &STANDARD.encode(zip))?;
    w.end_element("ser:sendBill")?;
    w.end_element("soapenv:Body")?;
    w.end_element("soapenv:Envelope")?;
    w.into_string()
}

/// Extract the zipped CDR from a `sendBillResponse`, or the fault as
/// [`ComprobanteError::Rejected`].
pub fn parse_send_bill_response(body: &str) -> Result<Vec<u8>, ComprobanteError> {
    let root = parse_tree(body)?;
    if let Some(fault) = root.find(SOAPENV, "Fault") {
        let code = fault
            .find_local("faultcode")
            .map(|n| fault_code(&n.text))
            .unwrap_or_default();
        let message = fault
            .find_local("faultstring")
            .map(|n| n.text.clone())
            .unwrap_or_default();
        return Err(ComprobanteError::Rejected { code, message });
    }
    let response = root
        .find_local("applicationResponse")
        .ok_or_else(|| ComprobanteError::Xml("response has no applicationResponse".into()))?;
    STANDARD
        .decode(response.text.trim())
        .map_err(|e| ComprobanteError::Xml(format!("invalid applicationResponse: {e}")))
}

/// `soap-env:Client.0100` → `0100`; anything else is returned without prefix.
fn fault_code(raw: &str) -> String {
    let local = raw.rsplit(':').next().unwrap_or(raw);
    match local.rsplit_once('.') {
        Some((_, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.to_string()
        }
        _ => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Address, Identification};

    fn taxpayer() -> Taxpayer {
        let mut t = Taxpayer::new(
            "EMPRESA SAC",
            Identification::ruc("20601030013").unwrap(),
            Address::new("AV. AREQUIPA 100"),
        );
        t.set_sol("MODDATOS", "moddatos");
        t
    }

    #[test]
    fn envelope_carries_credentials_and_file() {
        let xml = send_bill_envelope(&taxpayer(), "20601030013-01-F001-00000001.zip", b"PK").unwrap();
        assert!(xml.contains("<wsse:Username>20601030013MODDATOS</wsse:Username>"));
        assert!(xml.contains("<wsse:Password>moddatos</wsse:Password>"));
        assert!(xml.contains("<fileName>20601030013-01-F001-00000001.zip</fileName>"));
        assert!(xml.contains("<contentFile>UEs=</contentFile>"));
    }

    #[test]
    fn envelope_requires_sol_credentials() {
        let t = Taxpayer::new(
            "EMPRESA SAC",
            Identification::ruc("20601030013").unwrap(),
            Address::new("AV. AREQUIPA 100"),
        );
        assert!(matches!(
            send_bill_envelope(&t, "x.zip", b""),
            Err(ComprobanteError::Precondition(_))
        ));
    }

    #[test]
    fn fault_becomes_rejection() {
        let body = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><soap-env:Fault><faultcode>soap-env:Client.0111</faultcode><faultstring>No tiene el perfil para enviar comprobantes electronicos</faultstring></soap-env:Fault></soap-env:Body></soap-env:Envelope>"#;
        match parse_send_bill_response(body) {
            Err(ComprobanteError::Rejected { code, message }) => {
                assert_eq!(code, "0111");
                assert!(message.starts_with("No tiene el perfil"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn application_response_is_decoded() {
        let body = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/"><soap-env:Body><br:sendBillResponse xmlns:br="http://service.sunat.gob.pe"><applicationResponse>UEsDBA==</applicationResponse></br:sendBillResponse></soap-env:Body></soap-env:Envelope>"#;
        assert_eq!(parse_send_bill_response(body).unwrap(), b"PK\x03\x04");
    }

    #[test]
    fn fault_code_forms() {
        assert_eq!(fault_code("soap-env:Client.1033"), "1033");
        assert_eq!(fault_code("env:Server"), "Server");
    }
}

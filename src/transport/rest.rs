//! Request and response bodies of the REST document API (used for despatches).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{ComprobanteError, Taxpayer};

const TOKEN_SCOPE: &str = "https://api-cpe.sunat.gob.pe";

/// Form fields of the OAuth password grant.
pub fn token_form(taxpayer: &Taxpayer) -> Result<Vec<(&'static str, String)>, ComprobanteError> {
    Ok(vec![
        ("grant_type", "password".to_string()),
        ("scope", TOKEN_SCOPE.to_string()),
        ("client_id", taxpayer.client_id()?.to_string()),
        ("client_secret", taxpayer.client_secret()?.to_string()),
        ("username", format!("{}{}", taxpayer.ruc()?, taxpayer.sol_user()?)),
        ("password", taxpayer.sol_password()?.to_string()),
    ])
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFile {
    pub nom_archivo: String,
    /// Lowercase hex SHA-256 of the ZIP.
    pub hash_zip: String,
    /// Base64 of the ZIP.
    pub arc_gre_zip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    pub archivo: SendFile,
}

impl SendRequest {
    pub fn new(zip_name: &str, zip: &[u8]) -> Self {
        Self {
            archivo: SendFile {
                nom_archivo: zip_name.to_string(),
                hash_zip: hex::encode(Sha256::digest(zip)),
                arc_gre_zip: STANDARD.encode(zip),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub num_ticket: String,
    #[serde(default)]
    pub fec_recepcion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusError {
    #[serde(default)]
    pub num_error: String,
    #[serde(default)]
    pub des_error: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub cod_respuesta: String,
    #[serde(default)]
    pub error: Option<StatusError>,
    /// Base64 of the zipped CDR.
    #[serde(default)]
    pub arc_cdr: Option<String>,
    #[serde(default)]
    pub ind_cdr_generado: Option<String>,
}

/// Outcome of a ticket query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    /// Still being processed ("98").
    Pending,
    /// Processed; holds the zipped CDR.
    Processed(Vec<u8>),
}

impl StatusResponse {
    /// "98" is pending; "0" and "99" carry a CDR when one was generated.
    /// "99" without CDR is a rejection of the submission itself.
    pub fn into_status(self) -> Result<TicketStatus, ComprobanteError> {
        if self.cod_respuesta == "98" {
            return Ok(TicketStatus::Pending);
        }
        if let Some(cdr) = self.arc_cdr.filter(|c| !c.is_empty()) {
            let bytes = STANDARD
                .decode(cdr.trim())
                .map_err(|e| ComprobanteError::Transport(format!("invalid arcCdr: {e}")))?;
            return Ok(TicketStatus::Processed(bytes));
        }
        let (code, message) = match self.error {
            Some(e) => (e.num_error, e.des_error),
            None => (self.cod_respuesta, "no CDR generated".to_string()),
        };
        Err(ComprobanteError::Rejected { code, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Address, Identification};

    #[test]
    fn send_body_shape() {
        let body = SendRequest::new("20601030013-09-T001-00000001.zip", b"abc");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["archivo"]["nomArchivo"], "20601030013-09-T001-00000001.zip");
        assert_eq!(
            json["archivo"]["hashZip"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(json["archivo"]["arcGreZip"], "YWJj");
    }

    #[test]
    fn token_form_fields() {
        let mut t = Taxpayer::new(
            "EMPRESA SAC",
            Identification::ruc("20601030013").unwrap(),
            Address::new("AV. AREQUIPA 100"),
        );
        assert!(token_form(&t).is_err());
        t.set_sol("MODDATOS", "moddatos");
        t.set_oauth_client("client-1", "secret-1");
        let form = token_form(&t).unwrap();
        assert!(form.contains(&("username", "20601030013MODDATOS".to_string())));
        assert!(form.contains(&("scope", "https://api-cpe.sunat.gob.pe".to_string())));
        assert!(form.contains(&("client_id", "client-1".to_string())));
    }

    #[test]
    fn pending_ticket() {
        let r: StatusResponse = serde_json::from_str(r#"{"codRespuesta":"98"}"#).unwrap();
        assert_eq!(r.into_status().unwrap(), TicketStatus::Pending);
    }

    #[test]
    fn processed_ticket_returns_cdr() {
        let r: StatusResponse =
            serde_json::from_str(r#"{"codRespuesta":"0","arcCdr":"UEsDBA==","indCdrGenerado":"1"}"#).unwrap();
        assert_eq!(r.into_status().unwrap(), TicketStatus::Processed(b"PK\x03\x04".to_vec()));
    }

    #[test]
    fn error_without_cdr_is_rejection() {
        let r: StatusResponse = serde_json::from_str(
            r#"{"codRespuesta":"99","error":{"numError":"2223","desError":"El archivo ya fue presentado"},"indCdrGenerado":"0"}"#,
        )
        .unwrap();
        match r.into_status() {
            Err(ComprobanteError::Rejected { code, message }) => {
                assert_eq!(code, "2223");
                assert_eq!(message, "El archivo ya fue presentado");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}

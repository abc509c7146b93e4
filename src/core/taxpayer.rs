use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::certificate::{CertificateValidity, pem_to_der};
use super::error::ComprobanteError;
use super::identification::Identification;
use super::types::{Address, Contact, Party};

/// Secrets held by a taxpayer. Wiped on drop and by [`Taxpayer::clear_data`].
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
struct Credentials {
    cert_pem: String,
    cert_der: Vec<u8>,
    key_der: Vec<u8>,
    sol_user: String,
    sol_password: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("cert", &!self.cert_der.is_empty())
            .field("key", &!self.key_der.is_empty())
            .field("sol_user", &self.sol_user)
            .finish_non_exhaustive()
    }
}

/// The issuer of documents: a party plus fiscal credentials and contact data.
///
/// One taxpayer usually backs many documents, which hold it behind an `Arc`.
/// Credentials are never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Taxpayer {
    pub party: Party,
    /// Commercial name printed next to the legal name.
    pub trade_name: Option<String>,
    pub contact: Contact,
    /// Banco de la Nación account for detractions.
    pub deductions_account: Option<String>,
    #[serde(skip)]
    credentials: Credentials,
    #[serde(skip)]
    cert_validity: Option<CertificateValidity>,
}

impl Taxpayer {
    pub fn new(name: impl Into<String>, ruc: Identification, address: Address) -> Self {
        let mut party = Party::new(name, ruc);
        party.address = Some(address);
        Self {
            party,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        self.party.name()
    }

    pub fn identification(&self) -> Result<&Identification, ComprobanteError> {
        self.party.identification()
    }

    /// The taxpayer's RUC number.
    pub fn ruc(&self) -> Result<&str, ComprobanteError> {
        Ok(self.party.identification()?.number())
    }

    pub fn address(&self) -> Result<&Address, ComprobanteError> {
        self.party.address()
    }

    /// Store a PEM certificate together with its DER form.
    pub fn set_cert_pem(&mut self, pem: &str) -> Result<(), ComprobanteError> {
        let der = pem_to_der(pem)?;
        self.credentials.cert_pem.zeroize();
        self.credentials.cert_der.zeroize();
        self.credentials.cert_pem = pem.to_string();
        self.credentials.cert_der = der;
        Ok(())
    }

    /// Record the certificate's validity window, as decoded by the caller, and
    /// return the remaining days (-1 if `now` is outside the window).
    pub fn set_cert_validity(&mut self, validity: CertificateValidity, now: DateTime<Utc>) -> i64 {
        self.cert_validity = Some(validity);
        validity.remaining_days(now)
    }

    pub fn cert_remaining_days(&self, now: DateTime<Utc>) -> Result<i64, ComprobanteError> {
        self.cert_validity
            .map(|v| v.remaining_days(now))
            .ok_or_else(|| ComprobanteError::missing("certificate validity"))
    }

    pub fn cert_pem(&self) -> Result<&str, ComprobanteError> {
        non_empty(&self.credentials.cert_pem, "certificate")
    }

    pub fn cert_der(&self) -> Result<&[u8], ComprobanteError> {
        if self.credentials.cert_der.is_empty() {
            return Err(ComprobanteError::missing("certificate"));
        }
        Ok(&self.credentials.cert_der)
    }

    /// Store a private key in PEM form (converted to DER).
    pub fn set_key_pem(&mut self, pem: &str) -> Result<(), ComprobanteError> {
        let der = pem_to_der(pem)?;
        self.set_key_der(der);
        Ok(())
    }

    pub fn set_key_der(&mut self, der: Vec<u8>) {
        self.credentials.key_der.zeroize();
        self.credentials.key_der = der;
    }

    pub fn key_der(&self) -> Result<&[u8], ComprobanteError> {
        if self.credentials.key_der.is_empty() {
            return Err(ComprobanteError::missing("private key"));
        }
        Ok(&self.credentials.key_der)
    }

    /// SOL (secondary user) credentials for SOAP submission.
    pub fn set_sol(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.credentials.sol_user.zeroize();
        self.credentials.sol_password.zeroize();
        self.credentials.sol_user = user.into();
        self.credentials.sol_password = password.into();
    }

    pub fn sol_user(&self) -> Result<&str, ComprobanteError> {
        non_empty(&self.credentials.sol_user, "SOL user")
    }

    pub fn sol_password(&self) -> Result<&str, ComprobanteError> {
        non_empty(&self.credentials.sol_password, "SOL password")
    }

    /// OAuth client credentials for the REST API.
    pub fn set_oauth_client(&mut self, client_id: impl Into<String>, secret: impl Into<String>) {
        self.credentials.client_id.zeroize();
        self.credentials.client_secret.zeroize();
        self.credentials.client_id = client_id.into();
        self.credentials.client_secret = secret.into();
    }

    pub fn client_id(&self) -> Result<&str, ComprobanteError> {
        non_empty(&self.credentials.client_id, "OAuth client id")
    }

    pub fn client_secret(&self) -> Result<&str, ComprobanteError> {
        non_empty(&self.credentials.client_secret, "OAuth client secret")
    }

    /// Wipe certificate, key and every secret. Identity, address and contact stay.
    pub fn clear_data(&mut self) {
        self.credentials.zeroize();
        self.cert_validity = None;
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str, ComprobanteError> {
    if value.is_empty() {
        Err(ComprobanteError::missing(what))
    } else {
        Ok(value)
    }
}

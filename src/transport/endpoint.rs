use serde::{Deserialize, Serialize};

/// Production or beta environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Deploy,
    #[default]
    Test,
}

/// SOAP service a document is sent to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Invoices, receipts and notes.
    #[default]
    Bill,
    /// Retention and perception documents.
    Retention,
}

const BILL_DEPLOY: &str = "https://e-factura.sunat.gob.pe/ol-ti-itcpfegem/billService";
const BILL_TEST: &str = "https://e-beta.sunat.gob.pe/ol-ti-itcpfegem-beta/billService";
const RETENTION_DEPLOY: &str =
    "https://e-factura.sunat.gob.pe/ol-ti-itemision-otroscpe-gem/billService";
const RETENTION_TEST: &str =
    "https://e-beta.sunat.gob.pe/ol-ti-itemision-otroscpe-gem-beta/billService";

const TOKEN_DEPLOY: &str = "https://api-seguridad.sunat.gob.pe/v1/clientessol/<client_id>/oauth2/token";
const TOKEN_TEST: &str = "https://gre-test.nubefact.com/v1/clientessol/<client_id>/oauth2/token";
const DOCUMENTS_DEPLOY: &str = "https://api-cpe.sunat.gob.pe/v1/contribuyente/gem/comprobantes/";
const DOCUMENTS_TEST: &str = "https://gre-test.nubefact.com/v1/contribuyente/gem/comprobantes/";

/// Where documents are sent. Every URL can be overridden; unset ones follow
/// `mode` and `service`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub mode: Mode,
    pub service: Service,
    pub soap_url: Option<String>,
    /// Token URL; `<client_id>` is replaced by the taxpayer's OAuth client id.
    pub token_url: Option<String>,
    /// Base of the REST document API, ending in `/`.
    pub documents_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Test,
            service: Service::Bill,
            soap_url: None,
            token_url: None,
            documents_url: None,
            timeout_secs: 30,
        }
    }
}

impl EndpointConfig {
    pub fn deploy() -> Self {
        Self {
            mode: Mode::Deploy,
            ..Self::default()
        }
    }

    pub fn soap_endpoint(&self) -> &str {
        if let Some(url) = &self.soap_url {
            return url;
        }
        match (self.service, self.mode) {
            (Service::Bill, Mode::Deploy) => BILL_DEPLOY,
            (Service::Bill, Mode::Test) => BILL_TEST,
            (Service::Retention, Mode::Deploy) => RETENTION_DEPLOY,
            (Service::Retention, Mode::Test) => RETENTION_TEST,
        }
    }

    pub fn token_endpoint(&self, client_id: &str) -> String {
        let template = self.token_url.as_deref().unwrap_or(match self.mode {
            Mode::Deploy => TOKEN_DEPLOY,
            Mode::Test => TOKEN_TEST,
        });
        template.replace("<client_id>", client_id)
    }

    fn documents_base(&self) -> &str {
        self.documents_url.as_deref().unwrap_or(match self.mode {
            Mode::Deploy => DOCUMENTS_DEPLOY,
            Mode::Test => DOCUMENTS_TEST,
        })
    }

    /// `.../comprobantes/{ruc}-{type}-{series}-{sequence}`.
    pub fn send_endpoint(&self, file_stem: &str) -> String {
        format!("{}{file_stem}", self.documents_base())
    }

    /// `.../comprobantes/envios/{ticket}`.
    pub fn status_endpoint(&self, ticket: &str) -> String {
        format!("{}envios/{ticket}", self.documents_base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_beta_bill_service() {
        let config = EndpointConfig::default();
        assert_eq!(config.soap_endpoint(), BILL_TEST);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn deploy_urls() {
        let mut config = EndpointConfig::deploy();
        assert_eq!(config.soap_endpoint(), BILL_DEPLOY);
        config.service = Service::Retention;
        assert_eq!(config.soap_endpoint(), RETENTION_DEPLOY);
        assert_eq!(
            config.token_endpoint("abc"),
            "https://api-seguridad.sunat.gob.pe/v1/clientessol/abc/oauth2/token"
        );
        assert_eq!(
            config.send_endpoint("20601030013-09-T001-00000001"),
            "https://api-cpe.sunat.gob.pe/v1/contribuyente/gem/comprobantes/20601030013-09-T001-00000001"
        );
        assert_eq!(
            config.status_endpoint("123"),
            "https://api-cpe.sunat.gob.pe/v1/contribuyente/gem/comprobantes/envios/123"
        );
    }

    #[test]
    fn overrides_win() {
        let config = EndpointConfig {
            soap_url: Some("http://localhost:8080/bill".into()),
            documents_url: Some("http://localhost:8080/docs/".into()),
            ..EndpointConfig::default()
        };
        assert_eq!(config.soap_endpoint(), "http://localhost:8080/bill");
        assert_eq!(config.status_endpoint("9"), "http://localhost:8080/docs/envios/9");
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config: EndpointConfig = serde_json::from_str(r#"{"mode":"deploy"}"#).unwrap();
        assert_eq!(config.mode, Mode::Deploy);
        assert_eq!(config.service, Service::Bill);
        assert_eq!(config.timeout_secs, 30);
    }
}

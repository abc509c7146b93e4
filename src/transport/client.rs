use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::cdr::CdrResponse;
use super::endpoint::EndpointConfig;
use super::rest::{SendRequest, SendResponse, StatusResponse, TicketStatus, TokenResponse, token_form};
use super::soap::{parse_send_bill_response, send_bill_envelope};
use crate::core::{ComprobanteError, Taxpayer};

/// Tokens are refreshed this long before they expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);
/// Lifetime assumed when the token response has none.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

fn network(e: reqwest::Error) -> ComprobanteError {
    ComprobanteError::Transport(e.to_string())
}

#[derive(Debug, Clone)]
struct CachedToken {
    client_id: String,
    value: String,
    expires_at: Instant,
}

/// HTTP client for the authority's SOAP and REST services.
///
/// Holds the endpoint configuration and the last OAuth token, which is reused
/// for the same client id until shortly before it expires.
#[derive(Debug)]
pub struct Client {
    config: EndpointConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl Client {
    pub fn new(config: EndpointConfig) -> Result<Self, ComprobanteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(network)?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Send a zipped invoice, receipt or note and return the accepted CDR.
    ///
    /// SOAP faults and non-zero CDR codes come back as
    /// [`ComprobanteError::Rejected`].
    pub async fn send_bill(
        &self,
        taxpayer: &Taxpayer,
        zip_name: &str,
        zip: &[u8],
    ) -> Result<CdrResponse, ComprobanteError> {
        let envelope = send_bill_envelope(taxpayer, zip_name, zip)?;
        let url = self.config.soap_endpoint();
        info!(file = zip_name, url, "sending bill");

        let resp = self
            .http
            .post(url)
            .header("Content-Type", "text/xml;charset=UTF-8")
            .header("SOAPAction", "urn:sendBill")
            .body(envelope)
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?;
        debug!(%status, bytes = body.len(), "bill service answered");

        // Faults arrive with HTTP 500, so the body is inspected first.
        let cdr_zip = match parse_send_bill_response(&body) {
            Ok(zip) => zip,
            Err(e @ ComprobanteError::Rejected { .. }) => {
                warn!(file = zip_name, error = %e, "bill rejected");
                return Err(e);
            }
            Err(_) if !status.is_success() => {
                return Err(ComprobanteError::Transport(format!("HTTP {status}: {body}")));
            }
            Err(e) => return Err(e),
        };

        let cdr = CdrResponse::from_zip(&cdr_zip)?;
        if !cdr.is_accepted() {
            warn!(file = zip_name, code = cdr.code, "bill not accepted");
        }
        cdr.into_result()
    }

    /// A valid bearer token for the taxpayer's OAuth client, cached between calls.
    pub async fn token(&self, taxpayer: &Taxpayer) -> Result<String, ComprobanteError> {
        let client_id = taxpayer.client_id()?;
        if let Some(cached) = self.cached_token(client_id) {
            return Ok(cached);
        }

        let url = self.config.token_endpoint(client_id);
        debug!(url = %url, "requesting token");
        let resp = self
            .http
            .post(&url)
            .form(&token_form(taxpayer)?)
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?;
        if !status.is_success() {
            return Err(ComprobanteError::Transport(format!("HTTP {status}: {body}")));
        }
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ComprobanteError::Transport(format!("invalid token response: {e}")))?;

        let lifetime = token
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_MARGIN);
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedToken {
            client_id: client_id.to_string(),
            value: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    fn cached_token(&self, client_id: &str) -> Option<String> {
        let guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|t| t.client_id == client_id && Instant::now() < t.expires_at)
            .map(|t| t.value.clone())
    }

    /// Drop the cached token so the next call requests a new one.
    pub fn clear_token(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Submit a zipped despatch through the REST API and return its ticket.
    pub async fn send_despatch(
        &self,
        taxpayer: &Taxpayer,
        zip_name: &str,
        zip: &[u8],
    ) -> Result<String, ComprobanteError> {
        let token = self.token(taxpayer).await?;
        let stem = zip_name.strip_suffix(".zip").unwrap_or(zip_name);
        let url = self.config.send_endpoint(stem);
        info!(file = zip_name, "sending despatch");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&SendRequest::new(zip_name, zip))
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?;
        if !status.is_success() {
            warn!(file = zip_name, %status, "despatch refused");
            return Err(ComprobanteError::Transport(format!("HTTP {status}: {body}")));
        }
        let sent: SendResponse = serde_json::from_str(&body)
            .map_err(|e| ComprobanteError::Transport(format!("invalid send response: {e}")))?;
        debug!(ticket = %sent.num_ticket, "despatch queued");
        Ok(sent.num_ticket)
    }

    /// Query a despatch ticket.
    pub async fn ticket_status(
        &self,
        taxpayer: &Taxpayer,
        ticket: &str,
    ) -> Result<TicketStatus, ComprobanteError> {
        let token = self.token(taxpayer).await?;
        let url = self.config.status_endpoint(ticket);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?;
        if !status.is_success() {
            return Err(ComprobanteError::Transport(format!("HTTP {status}: {body}")));
        }
        let response: StatusResponse = serde_json::from_str(&body)
            .map_err(|e| ComprobanteError::Transport(format!("invalid status response: {e}")))?;
        debug!(ticket, code = %response.cod_respuesta, "ticket status");
        response.into_status()
    }
}

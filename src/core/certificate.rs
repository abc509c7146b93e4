//! Certificate helpers. ASN.1 decoding is left to the caller; this module only
//! deals with PEM armor and the validity window.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;

/// Strip the `-----BEGIN ...-----` / `-----END ...-----` lines and decode the body.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>, ComprobanteError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return Err(ComprobanteError::input("PEM block has no content"));
    }
    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| ComprobanteError::input(format!("invalid PEM base64: {e}")))
}

/// The notBefore/notAfter pair of an X.509 certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateValidity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateValidity {
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Days left until expiry, rounded to the nearest day, or -1 when `now`
    /// lies outside the validity window.
    pub fn remaining_days(&self, now: DateTime<Utc>) -> i64 {
        if now < self.not_before || now > self.not_after {
            return -1;
        }
        let seconds = (self.not_after - now).num_seconds();
        (seconds + 43_200) / 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn pem_armor_is_stripped() {
        let pem = "-----BEGIN CERTIFICATE-----\nAQID\nBAU=\n-----END CERTIFICATE-----\n";
        assert_eq!(pem_to_der(pem).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn pem_rejects_garbage() {
        assert!(pem_to_der("-----BEGIN X-----\n-----END X-----").is_err());
        assert!(pem_to_der("-----BEGIN X-----\n@@@\n-----END X-----").is_err());
    }

    #[test]
    fn remaining_days_rounds_to_nearest() {
        let v = CertificateValidity::new(at(2024, 1, 1, 0), at(2024, 12, 31, 0));
        assert_eq!(v.remaining_days(at(2024, 12, 21, 0)), 10);
        assert_eq!(v.remaining_days(at(2024, 12, 20, 13)), 10);
        assert_eq!(v.remaining_days(at(2024, 12, 20, 11)), 11);
    }

    #[test]
    fn outside_window_is_minus_one() {
        let v = CertificateValidity::new(at(2024, 1, 1, 0), at(2024, 12, 31, 0));
        assert_eq!(v.remaining_days(at(2023, 12, 31, 0)), -1);
        assert_eq!(v.remaining_days(at(2025, 1, 1, 0)), -1);
    }
}

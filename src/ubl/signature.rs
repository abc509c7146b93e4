//! Signature slot handling.
//!
//! XML-DSig itself (canonicalization, RSA-SHA256) is delegated to an
//! [`XmlSigner`]; this module hands it the taxpayer's key material and checks
//! that the result carries a digest.

use super::ubl_ns;
use super::xml_utils::parse_tree;
use crate::core::{ComprobanteError, Taxpayer};

const SLOT_OPEN: &str = "<ext:ExtensionContent>";
const SLOT_CLOSE: &str = "</ext:ExtensionContent>";

/// Key and certificate handed to a signer. Borrowed from the taxpayer and
/// never copied.
#[derive(Clone, Copy)]
pub struct SigningMaterial<'a> {
    /// PKCS#8 DER private key.
    pub key_der: &'a [u8],
    pub cert_pem: &'a str,
    pub cert_der: &'a [u8],
}

impl std::fmt::Debug for SigningMaterial<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningMaterial").finish_non_exhaustive()
    }
}

/// Produces an enveloped `ds:Signature` for a document.
pub trait XmlSigner {
    /// Return the signed document. Implementations usually build the
    /// signature fragment and place it with [`insert_signature`].
    fn sign(&self, xml: &str, material: &SigningMaterial<'_>) -> Result<String, ComprobanteError>;
}

/// A signed document together with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedXml {
    pub xml: String,
    pub digest: String,
}

/// Place `fragment` inside the empty `ext:ExtensionContent` slot.
pub fn insert_signature(xml: &str, fragment: &str) -> Result<String, ComprobanteError> {
    let open = xml
        .find(SLOT_OPEN)
        .ok_or_else(|| ComprobanteError::Xml("document has no signature slot".into()))?;
    let content_start = open + SLOT_OPEN.len();
    let close = xml[content_start..]
        .find(SLOT_CLOSE)
        .map(|pos| content_start + pos)
        .ok_or_else(|| ComprobanteError::Xml("unterminated signature slot".into()))?;
    if !xml[content_start..close].trim().is_empty() {
        return Err(ComprobanteError::Xml("signature slot is already filled".into()));
    }

    let mut out = String::with_capacity(xml.len() + fragment.len());
    out.push_str(&xml[..content_start]);
    out.push_str(fragment);
    out.push_str(&xml[close..]);
    Ok(out)
}

/// The `ds:DigestValue` of a signed document, if any.
pub fn digest_value(xml: &str) -> Result<Option<String>, ComprobanteError> {
    let root = parse_tree(xml)?;
    Ok(root
        .find(ubl_ns::DS, "DigestValue")
        .map(|n| n.text.clone())
        .filter(|d| !d.is_empty()))
}

/// Sign `xml` with the taxpayer's key and certificate.
///
/// Fails with [`ComprobanteError::Precondition`] when the taxpayer has no key
/// or certificate loaded, and with [`ComprobanteError::Xml`] when the signer
/// output has no digest.
pub fn sign_xml(
    xml: &str,
    taxpayer: &Taxpayer,
    signer: &dyn XmlSigner,
) -> Result<SignedXml, ComprobanteError> {
    let material = SigningMaterial {
        key_der: taxpayer.key_der()?,
        cert_pem: taxpayer.cert_pem()?,
        cert_der: taxpayer.cert_der()?,
    };
    let signed = signer.sign(xml, &material)?;
    let digest = digest_value(&signed)?
        .ok_or_else(|| ComprobanteError::Xml("signer output has no ds:DigestValue".into()))?;
    Ok(SignedXml { xml: signed, digest })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSIGNED: &str = r#"<Invoice xmlns:ext="urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2"><ext:UBLExtensions><ext:UBLExtension><ext:ExtensionContent>
      </ext:ExtensionContent></ext:UBLExtension></ext:UBLExtensions></Invoice>"#;

    const FRAGMENT: &str = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="SignSUNAT"><ds:SignedInfo><ds:Reference URI=""><ds:DigestValue>abc=</ds:DigestValue></ds:Reference></ds:SignedInfo></ds:Signature>"#;

    struct StubSigner;

    impl XmlSigner for StubSigner {
        fn sign(&self, xml: &str, material: &SigningMaterial<'_>) -> Result<String, ComprobanteError> {
            assert!(!material.key_der.is_empty());
            insert_signature(xml, FRAGMENT)
        }
    }

    #[test]
    fn fragment_lands_in_slot() {
        let signed = insert_signature(UNSIGNED, FRAGMENT).unwrap();
        assert!(signed.contains("<ext:ExtensionContent><ds:Signature"));
        assert_eq!(digest_value(&signed).unwrap().as_deref(), Some("abc="));
    }

    #[test]
    fn filled_or_missing_slot_is_rejected() {
        let signed = insert_signature(UNSIGNED, FRAGMENT).unwrap();
        assert!(insert_signature(&signed, FRAGMENT).is_err());
        assert!(insert_signature("<Invoice/>", FRAGMENT).is_err());
    }

    #[test]
    fn unsigned_document_has_no_digest() {
        assert_eq!(digest_value(UNSIGNED).unwrap(), None);
    }

    #[test]
    fn signing_requires_key_material() {
        let taxpayer = Taxpayer::default();
        let err = sign_xml(UNSIGNED, &taxpayer, &StubSigner).unwrap_err();
        assert!(matches!(err, ComprobanteError::Precondition(_)));
    }
}

use crate::archive::unpack_first_xml;
use crate::core::ComprobanteError;
use crate::ubl::xml_utils::parse_tree;

/// The authority's verdict on a document (constancia de recepción).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdrResponse {
    /// 0 accepted; anything else is an observation or rejection code.
    /// -1 when the response carried no code.
    pub code: i32,
    pub description: String,
    /// Observations attached to an accepted document.
    pub notes: Vec<String>,
    /// Consultation URL of despatches, printed as QR code.
    pub qr_url: Option<String>,
}

impl CdrResponse {
    pub fn from_xml(xml: &str) -> Result<Self, ComprobanteError> {
        let root = parse_tree(xml)?;
        let response = root.find_local("DocumentResponse");
        let code_node = response.and_then(|r| r.find_local("ResponseCode"));
        let (code, description) = match code_node {
            Some(node) => {
                let code = node.text.trim().parse::<i32>().map_err(|e| {
                    ComprobanteError::Xml(format!("invalid ResponseCode '{}': {e}", node.text))
                })?;
                let description = response
                    .and_then(|r| r.find_local("Description"))
                    .map(|n| n.text.clone())
                    .unwrap_or_default();
                (code, description)
            }
            None => (-1, "No se encontró respuesta".to_string()),
        };
        let notes = root
            .children
            .iter()
            .filter(|c| c.name == "Note" && !c.text.is_empty())
            .map(|c| c.text.clone())
            .collect();
        let qr_url = response
            .and_then(|r| r.find_local("ExternalReference"))
            .and_then(|r| r.find_local("Description"))
            .map(|n| n.text.clone());
        Ok(Self {
            code,
            description,
            notes,
            qr_url,
        })
    }

    /// Read the CDR out of its ZIP.
    pub fn from_zip(bytes: &[u8]) -> Result<Self, ComprobanteError> {
        let (_, xml) = unpack_first_xml(bytes)?;
        Self::from_xml(&xml)
    }

    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }

    /// `Ok` for code 0, [`ComprobanteError::Rejected`] otherwise.
    pub fn into_result(self) -> Result<Self, ComprobanteError> {
        if self.is_accepted() {
            Ok(self)
        } else {
            Err(ComprobanteError::Rejected {
                code: self.code.to_string(),
                message: self.description,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEPTED: &str = r#"<ar:ApplicationResponse xmlns:ar="urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2" xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>1</cbc:ID>
  <cbc:Note>4252 - El dato ingresado como atributo @listName es incorrecto.</cbc:Note>
  <cac:DocumentResponse>
    <cac:Response>
      <cbc:ReferenceID>F001-00000001</cbc:ReferenceID>
      <cbc:ResponseCode>0</cbc:ResponseCode>
      <cbc:Description>La Factura numero F001-00000001, ha sido aceptada</cbc:Description>
    </cac:Response>
  </cac:DocumentResponse>
</ar:ApplicationResponse>"#;

    #[test]
    fn accepted_with_observation() {
        let cdr = CdrResponse::from_xml(ACCEPTED).unwrap();
        assert!(cdr.is_accepted());
        assert!(cdr.description.contains("ha sido aceptada"));
        assert_eq!(cdr.notes.len(), 1);
        assert!(cdr.into_result().is_ok());
    }

    #[test]
    fn rejected_code() {
        let xml = ACCEPTED
            .replace("<cbc:ResponseCode>0<", "<cbc:ResponseCode>2017<")
            .replace("ha sido aceptada", "ha sido rechazada");
        let err = CdrResponse::from_xml(&xml).unwrap().into_result().unwrap_err();
        assert!(matches!(err, ComprobanteError::Rejected { ref code, .. } if code == "2017"));
    }

    #[test]
    fn missing_code_is_minus_one() {
        let cdr = CdrResponse::from_xml("<ApplicationResponse/>").unwrap();
        assert_eq!(cdr.code, -1);
        assert_eq!(cdr.description, "No se encontró respuesta");
        assert!(!cdr.is_accepted());
    }

    #[test]
    fn despatch_qr_url() {
        let xml = r#"<ApplicationResponse xmlns:cac="urn:c" xmlns:cbc="urn:b"><cac:DocumentResponse><cac:Response><cbc:ResponseCode>0</cbc:ResponseCode><cbc:Description>ok</cbc:Description></cac:Response><cac:DocumentReference><cac:Attachment><cac:ExternalReference><cbc:Description>https://e-factura.sunat.gob.pe/v1/contribuyente/gre/comprobantes/descargaqr?hashqr=abc</cbc:Description></cac:ExternalReference></cac:Attachment></cac:DocumentReference></cac:DocumentResponse></ApplicationResponse>"#;
        let cdr = CdrResponse::from_xml(xml).unwrap();
        assert!(cdr.qr_url.unwrap().contains("hashqr=abc"));
        assert_eq!(cdr.description, "ok");
    }
}

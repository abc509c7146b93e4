use chrono::{NaiveDateTime, NaiveTime};

use super::xml_utils::{XmlNode, XmlWriter, parse_date, parse_decimal, parse_time};
use super::{CATALOG_URI, SIGNATURE_ID, SUNAT_AGENCY, ubl_ns};
use crate::core::*;

use ubl_ns::{CAC, CBC};

pub(super) fn catalog_uri(catalog: &str) -> String {
    format!("{CATALOG_URI}{catalog}")
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Open the root element, declaring the default and prefixed namespaces.
pub(super) fn write_root_start(
    w: &mut XmlWriter,
    root: &str,
    root_ns: &str,
) -> Result<(), ComprobanteError> {
    w.start_element_with_attrs(
        root,
        &[
            ("xmlns", root_ns),
            ("xmlns:cac", ubl_ns::CAC),
            ("xmlns:cbc", ubl_ns::CBC),
            ("xmlns:ext", ubl_ns::EXT),
            ("xmlns:ds", ubl_ns::DS),
        ],
    )?;
    Ok(())
}

/// Empty signature slot followed by the UBL version and customization.
pub(super) fn write_header(w: &mut XmlWriter, core: &DocumentCore) -> Result<(), ComprobanteError> {
    w.start_element("ext:UBLExtensions")?;
    w.start_element("ext:UBLExtension")?;
    w.start_element("ext:ExtensionContent")?;
    w.end_element("ext:ExtensionContent")?;
    w.end_element("ext:UBLExtension")?;
    w.end_element("ext:UBLExtensions")?;
    w.text_element("cbc:UBLVersionID", &core.ubl_version)?;
    w.text_element("cbc:CustomizationID", &core.customization_id)?;
    Ok(())
}

/// `cbc:ID`, `cbc:IssueDate` and `cbc:IssueTime`.
pub(super) fn write_identity(w: &mut XmlWriter, core: &DocumentCore) -> Result<(), ComprobanteError> {
    let issued = core.issue_date()?;
    w.text_element("cbc:ID", &core.id(false, false))?;
    w.text_element("cbc:IssueDate", &issued.format("%Y-%m-%d").to_string())?;
    w.text_element("cbc:IssueTime", &issued.format("%H:%M:%S").to_string())?;
    Ok(())
}

/// Reference from the document to its XML signature.
pub(super) fn write_signature(w: &mut XmlWriter, taxpayer: &Taxpayer) -> Result<(), ComprobanteError> {
    let ruc = taxpayer.ruc()?;
    w.start_element("cac:Signature")?;
    w.text_element("cbc:ID", ruc)?;
    w.start_element("cac:SignatoryParty")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element("cbc:ID", ruc)?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyName")?;
    w.cdata_element("cbc:Name", taxpayer.name())?;
    w.end_element("cac:PartyName")?;
    w.end_element("cac:SignatoryParty")?;
    w.start_element("cac:DigitalSignatureAttachment")?;
    w.start_element("cac:ExternalReference")?;
    w.text_element("cbc:URI", &format!("#{SIGNATURE_ID}"))?;
    w.end_element("cac:ExternalReference")?;
    w.end_element("cac:DigitalSignatureAttachment")?;
    w.end_element("cac:Signature")?;
    Ok(())
}

/// `cbc:ID` carrying an identity document with its catalog 06 attributes.
pub(super) fn write_identification(
    w: &mut XmlWriter,
    tag: &str,
    id: &Identification,
) -> Result<(), ComprobanteError> {
    let uri = catalog_uri("catalogo06");
    w.text_element_with_attrs(
        tag,
        id.number(),
        &[
            ("schemeID", id.kind().code()),
            ("schemeName", "Documento de Identidad"),
            ("schemeAgencyName", SUNAT_AGENCY),
            ("schemeURI", &uri),
        ],
    )?;
    Ok(())
}

fn write_party_identification(w: &mut XmlWriter, id: &Identification) -> Result<(), ComprobanteError> {
    w.start_element("cac:PartyIdentification")?;
    write_identification(w, "cbc:ID", id)?;
    w.end_element("cac:PartyIdentification")?;
    Ok(())
}

/// Address block; only the parts that are set are written.
pub(super) fn write_address(
    w: &mut XmlWriter,
    tag: &str,
    address: &Address,
) -> Result<(), ComprobanteError> {
    w.start_element(tag)?;
    if let Some(ubigeo) = &address.ubigeo {
        w.text_element_with_attrs(
            "cbc:ID",
            ubigeo,
            &[("schemeAgencyName", "PE:INEI"), ("schemeName", "Ubigeos")],
        )?;
    }
    if let Some(code) = &address.type_code {
        w.text_element_with_attrs(
            "cbc:AddressTypeCode",
            code,
            &[
                ("listAgencyName", SUNAT_AGENCY),
                ("listName", "Establecimientos anexos"),
            ],
        )?;
    }
    if let Some(v) = &address.urbanization {
        w.text_element("cbc:CitySubdivisionName", v)?;
    }
    if let Some(v) = &address.city {
        w.text_element("cbc:CityName", v)?;
    }
    if let Some(v) = &address.subentity {
        w.text_element("cbc:CountrySubentity", v)?;
    }
    if let Some(v) = &address.district {
        w.text_element("cbc:District", v)?;
    }
    if let Some(line) = address.line() {
        w.start_element("cac:AddressLine")?;
        w.cdata_element("cbc:Line", line)?;
        w.end_element("cac:AddressLine")?;
    }
    if let Some(country) = &address.country {
        w.start_element("cac:Country")?;
        w.text_element_with_attrs(
            "cbc:IdentificationCode",
            country,
            &[
                ("listID", "ISO 3166-1"),
                (
                    "listAgencyName",
                    "United Nations Economic Commission for Europe",
                ),
                ("listName", "Country"),
            ],
        )?;
        w.end_element("cac:Country")?;
    }
    w.end_element(tag)?;
    Ok(())
}

/// Issuer block: identification, trade name, legal entity and contact.
pub(super) fn write_supplier(
    w: &mut XmlWriter,
    wrapper: &str,
    taxpayer: &Taxpayer,
) -> Result<(), ComprobanteError> {
    w.start_element(wrapper)?;
    w.start_element("cac:Party")?;
    write_party_identification(w, taxpayer.identification()?)?;
    if let Some(trade_name) = &taxpayer.trade_name {
        w.start_element("cac:PartyName")?;
        w.cdata_element("cbc:Name", trade_name)?;
        w.end_element("cac:PartyName")?;
    }
    w.start_element("cac:PartyLegalEntity")?;
    w.cdata_element("cbc:RegistrationName", taxpayer.name())?;
    write_address(w, "cac:RegistrationAddress", taxpayer.address()?)?;
    w.end_element("cac:PartyLegalEntity")?;

    let contact = &taxpayer.contact;
    if !contact.is_empty() {
        w.start_element("cac:Contact")?;
        if let Some(v) = &contact.telephone {
            w.text_element("cbc:Telephone", v)?;
        }
        if let Some(v) = &contact.email {
            w.text_element("cbc:ElectronicMail", v)?;
        }
        if let Some(v) = &contact.web {
            w.text_element("cbc:Note", v)?;
        }
        w.end_element("cac:Contact")?;
    }
    w.end_element("cac:Party")?;
    w.end_element(wrapper)?;
    Ok(())
}

/// Receiver block: identification, legal name and optional address.
pub(super) fn write_customer(
    w: &mut XmlWriter,
    wrapper: &str,
    customer: &Party,
) -> Result<(), ComprobanteError> {
    w.start_element(wrapper)?;
    w.start_element("cac:Party")?;
    write_party_identification(w, customer.identification()?)?;
    w.start_element("cac:PartyLegalEntity")?;
    w.cdata_element("cbc:RegistrationName", customer.name())?;
    if let Some(address) = &customer.address {
        write_address(w, "cac:RegistrationAddress", address)?;
    }
    w.end_element("cac:PartyLegalEntity")?;
    w.end_element("cac:Party")?;
    w.end_element(wrapper)?;
    Ok(())
}

/// `cac:Item`: description, seller code and UNSPSC classification.
pub(super) fn write_item(w: &mut XmlWriter, item: &Item) -> Result<(), ComprobanteError> {
    w.start_element("cac:Item")?;
    w.cdata_element("cbc:Description", item.description())?;
    if let Some(code) = &item.code {
        w.start_element("cac:SellersItemIdentification")?;
        w.text_element("cbc:ID", code)?;
        w.end_element("cac:SellersItemIdentification")?;
    }
    if let Some(code) = &item.classification_code {
        w.start_element("cac:CommodityClassification")?;
        w.text_element_with_attrs(
            "cbc:ItemClassificationCode",
            code,
            &[
                ("listID", "UNSPSC"),
                ("listAgencyName", "GS1 US"),
                ("listName", "Item Classification"),
            ],
        )?;
        w.end_element("cac:CommodityClassification")?;
    }
    w.end_element("cac:Item")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub(super) fn check_root(root: &XmlNode, name: &str, ns: &str) -> Result<(), ComprobanteError> {
    if root.name != name || root.ns != ns {
        return Err(ComprobanteError::Xml(format!(
            "expected {name} in namespace {ns}, found {} in '{}'",
            root.name, root.ns
        )));
    }
    Ok(())
}

/// Identity, dates and signature digest shared by all documents.
pub(super) struct ParsedHeader {
    series: String,
    sequence: u32,
    issue_date: Option<NaiveDateTime>,
    ubl_version: Option<String>,
    customization_id: Option<String>,
    digest: String,
}

impl ParsedHeader {
    pub(super) fn read(root: &XmlNode) -> Result<Self, ComprobanteError> {
        let id = root
            .child_text(CBC, "ID")
            .ok_or_else(|| ComprobanteError::Xml("missing cbc:ID".into()))?;
        let (series, sequence) = id
            .split_once('-')
            .ok_or_else(|| ComprobanteError::Xml(format!("malformed document id '{id}'")))?;
        let sequence = sequence
            .parse::<u32>()
            .map_err(|e| ComprobanteError::Xml(format!("malformed sequence in '{id}': {e}")))?;

        let issue_date = match root.child_text(CBC, "IssueDate") {
            Some(date) => {
                let time = match root.child_text(CBC, "IssueTime") {
                    Some(t) => parse_time(t)?,
                    None => NaiveTime::MIN,
                };
                Some(parse_date(date)?.and_time(time))
            }
            None => None,
        };

        let digest = root
            .find(ubl_ns::DS, "DigestValue")
            .map(|n| n.text.clone())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ComprobanteError::Xml("missing ds:DigestValue".into()))?;

        Ok(Self {
            series: series.to_string(),
            sequence,
            issue_date,
            ubl_version: root.child_text(CBC, "UBLVersionID").map(str::to_string),
            customization_id: root.child_text(CBC, "CustomizationID").map(str::to_string),
            digest,
        })
    }

    pub(super) fn apply(self, core: &mut DocumentCore) -> Result<(), ComprobanteError> {
        core.set_id(self.series, self.sequence)?;
        core.issue_date = self.issue_date;
        if let Some(v) = self.ubl_version {
            core.ubl_version = v;
        }
        if let Some(v) = self.customization_id {
            core.customization_id = v;
        }
        core.hash = Some(self.digest);
        Ok(())
    }
}

/// Numeric document type from e.g. `cbc:InvoiceTypeCode`.
pub(super) fn read_type_code(root: &XmlNode, tag: &str) -> Result<DocumentTypeCode, ComprobanteError> {
    let text = root
        .child_text(CBC, tag)
        .ok_or_else(|| ComprobanteError::Xml(format!("missing cbc:{tag}")))?;
    text.trim()
        .parse::<u8>()
        .ok()
        .and_then(DocumentTypeCode::from_code)
        .ok_or_else(|| ComprobanteError::Xml(format!("unknown document type '{text}'")))
}

pub(super) fn read_identification(node: &XmlNode) -> Result<Identification, ComprobanteError> {
    let kind = node
        .attr("schemeID")
        .and_then(IdentityType::from_code)
        .ok_or_else(|| ComprobanteError::Xml(format!("unknown identity type on '{}'", node.text)))?;
    Identification::new(kind, node.text.as_str())
}

pub(super) fn read_address(node: &XmlNode) -> Address {
    let text = |name: &str| node.child_text(CBC, name).map(str::to_string);
    let mut address = Address::default();
    address.country = node
        .path_text(&[(CAC, "Country"), (CBC, "IdentificationCode")])
        .map(str::to_string);
    address.ubigeo = text("ID");
    address.type_code = text("AddressTypeCode");
    address.urbanization = text("CitySubdivisionName");
    address.city = text("CityName");
    address.subentity = text("CountrySubentity");
    address.district = text("District");
    if let Some(line) = node.path_text(&[(CAC, "AddressLine"), (CBC, "Line")]) {
        address.set_line(line);
    }
    address
}

fn party_node<'a>(root: &'a XmlNode, wrapper: &str) -> Result<&'a XmlNode, ComprobanteError> {
    root.path(&[(CAC, wrapper), (CAC, "Party")])
        .ok_or_else(|| ComprobanteError::Xml(format!("missing cac:{wrapper}")))
}

fn read_party_identification(party: &XmlNode) -> Result<Identification, ComprobanteError> {
    let id = party
        .path(&[(CAC, "PartyIdentification"), (CBC, "ID")])
        .ok_or_else(|| ComprobanteError::Xml("party without identification".into()))?;
    read_identification(id)
}

pub(super) fn read_supplier(root: &XmlNode, wrapper: &str) -> Result<Taxpayer, ComprobanteError> {
    let party = party_node(root, wrapper)?;
    let legal = party.child(CAC, "PartyLegalEntity");
    let name = legal
        .and_then(|l| l.child_text(CBC, "RegistrationName"))
        .unwrap_or_default();
    let address = legal
        .and_then(|l| l.child(CAC, "RegistrationAddress"))
        .map(read_address)
        .unwrap_or_default();

    let mut taxpayer = Taxpayer::new(name, read_party_identification(party)?, address);
    taxpayer.trade_name = party
        .path_text(&[(CAC, "PartyName"), (CBC, "Name")])
        .map(str::to_string);
    if let Some(contact) = party.child(CAC, "Contact") {
        taxpayer.contact = Contact {
            web: contact.child_text(CBC, "Note").map(str::to_string),
            email: contact.child_text(CBC, "ElectronicMail").map(str::to_string),
            telephone: contact.child_text(CBC, "Telephone").map(str::to_string),
        };
    }
    Ok(taxpayer)
}

pub(super) fn read_customer(root: &XmlNode, wrapper: &str) -> Result<Party, ComprobanteError> {
    let party = party_node(root, wrapper)?;
    let legal = party.child(CAC, "PartyLegalEntity");
    let name = legal
        .and_then(|l| l.child_text(CBC, "RegistrationName"))
        .unwrap_or_default();
    let mut customer = Party::new(name, read_party_identification(party)?);
    customer.address = legal
        .and_then(|l| l.child(CAC, "RegistrationAddress"))
        .map(read_address);
    Ok(customer)
}

/// Quantity, unit and `cac:Item` data of a line. The unit value is zero.
pub(super) fn read_line_item(line: &XmlNode, qty_tag: &str) -> Result<Item, ComprobanteError> {
    let qty = line
        .child(CBC, qty_tag)
        .ok_or_else(|| ComprobanteError::Xml(format!("line without cbc:{qty_tag}")))?;
    let quantity = parse_decimal(&qty.text)?;
    let unit = qty.attr("unitCode").unwrap_or("NIU");
    let description = line
        .path_text(&[(CAC, "Item"), (CBC, "Description")])
        .unwrap_or_default();

    let mut item = Item::new(description, quantity, unit, rust_decimal::Decimal::ZERO)?;
    item.code = line
        .path_text(&[(CAC, "Item"), (CAC, "SellersItemIdentification"), (CBC, "ID")])
        .map(str::to_string);
    item.classification_code = line
        .path_text(&[
            (CAC, "Item"),
            (CAC, "CommodityClassification"),
            (CBC, "ItemClassificationCode"),
        ])
        .map(str::to_string);
    Ok(item)
}

use std::sync::Arc;

use super::common::*;
use super::xml_utils::{XmlNode, XmlResult, XmlWriter, format_decimal, parse_date, parse_decimal, parse_tree};
use super::{SUNAT_AGENCY, ubl_ns};
use crate::core::*;

use ubl_ns::{CAC, CBC};

/// Marker for transfers in M1 or L category vehicles.
const LIGHT_VEHICLE_INDICATOR: &str = "SUNAT_Envio_IndicadorTrasladoVehiculoM1L";

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate the UBL 2.1 DespatchAdvice XML of a guía de remisión.
pub fn despatch_to_xml(despatch: &Validated<'_, Despatch>) -> XmlResult {
    let despatch = despatch.document();
    let core = &despatch.core;

    let mut w = XmlWriter::new()?;
    write_root_start(&mut w, "DespatchAdvice", ubl_ns::DESPATCH_ADVICE)?;
    write_header(&mut w, core)?;
    write_identity(&mut w, core)?;
    w.text_element("cbc:DespatchAdviceTypeCode", &core.type_code().padded())?;
    if !despatch.note().is_empty() {
        w.cdata_element("cbc:Note", despatch.note())?;
    }
    write_signature(&mut w, &core.taxpayer)?;
    write_supplier(&mut w, "cac:DespatchSupplierParty", &core.taxpayer)?;
    write_customer(&mut w, "cac:DeliveryCustomerParty", &core.customer)?;
    write_shipment(&mut w, despatch)?;

    for (i, item) in core.items().iter().enumerate() {
        let line_id = (i + 1).to_string();
        w.start_element("cac:DespatchLine")?;
        w.text_element("cbc:ID", &line_id)?;
        w.quantity_element("cbc:DeliveredQuantity", item.quantity(), &item.unit_code)?;
        w.start_element("cac:OrderLineReference")?;
        w.text_element("cbc:LineID", &line_id)?;
        w.end_element("cac:OrderLineReference")?;
        write_item(&mut w, item)?;
        w.end_element("cac:DespatchLine")?;
    }

    w.end_element("DespatchAdvice")?;
    w.into_string()
}

fn write_shipment(w: &mut XmlWriter, despatch: &Despatch) -> Result<(), ComprobanteError> {
    let start_date = despatch
        .start_date
        .ok_or_else(|| ComprobanteError::missing("transfer start date"))?;
    let delivery = despatch
        .delivery_address
        .as_ref()
        .ok_or_else(|| ComprobanteError::missing("delivery address"))?;
    let origin = match &despatch.despatch_address {
        Some(address) => address,
        None => despatch.core.taxpayer.address()?,
    };

    w.start_element("cac:Shipment")?;
    w.text_element("cbc:ID", "SUNAT_Envio")?;
    let uri20 = catalog_uri("catalogo20");
    w.text_element_with_attrs(
        "cbc:HandlingCode",
        &format!("{:02}", despatch.handling_code),
        &[
            ("listAgencyName", SUNAT_AGENCY),
            ("listName", "Motivo de traslado"),
            ("listURI", &uri20),
        ],
    )?;
    w.text_element_with_attrs(
        "cbc:GrossWeightMeasure",
        &format_decimal(despatch.weight),
        &[("unitCode", &despatch.weight_unit)],
    )?;
    if despatch.carrier.is_none() && despatch.light_vehicle {
        w.text_element("cbc:SpecialInstructions", LIGHT_VEHICLE_INDICATOR)?;
    }

    w.start_element("cac:ShipmentStage")?;
    let uri18 = catalog_uri("catalogo18");
    w.text_element_with_attrs(
        "cbc:TransportModeCode",
        despatch.transport_mode(),
        &[
            ("listName", "Modalidad de traslado"),
            ("listAgencyName", SUNAT_AGENCY),
            ("listURI", &uri18),
        ],
    )?;
    w.start_element("cac:TransitPeriod")?;
    w.text_element("cbc:StartDate", &start_date.format("%Y-%m-%d").to_string())?;
    w.end_element("cac:TransitPeriod")?;
    if let Some(carrier) = &despatch.carrier {
        w.start_element("cac:CarrierParty")?;
        w.start_element("cac:PartyIdentification")?;
        let id = carrier.identification()?;
        w.text_element_with_attrs("cbc:ID", id.number(), &[("schemeID", id.kind().code())])?;
        w.end_element("cac:PartyIdentification")?;
        w.start_element("cac:PartyLegalEntity")?;
        w.cdata_element("cbc:RegistrationName", carrier.name())?;
        w.end_element("cac:PartyLegalEntity")?;
        w.end_element("cac:CarrierParty")?;
    }
    for (i, driver) in despatch.drivers.iter().enumerate() {
        w.start_element("cac:DriverPerson")?;
        write_identification(w, "cbc:ID", driver.person.identification()?)?;
        w.cdata_element("cbc:FirstName", driver.person.name())?;
        w.cdata_element("cbc:FamilyName", &driver.family_name)?;
        w.text_element("cbc:JobTitle", if i == 0 { "Principal" } else { "Secundario" })?;
        w.start_element("cac:IdentityDocumentReference")?;
        w.text_element("cbc:ID", &driver.license)?;
        w.end_element("cac:IdentityDocumentReference")?;
        w.end_element("cac:DriverPerson")?;
    }
    w.end_element("cac:ShipmentStage")?;

    w.start_element("cac:Delivery")?;
    write_address(w, "cac:DeliveryAddress", delivery)?;
    w.start_element("cac:Despatch")?;
    write_address(w, "cac:DespatchAddress", origin)?;
    w.end_element("cac:Despatch")?;
    w.end_element("cac:Delivery")?;

    for (i, package) in despatch.packages.iter().enumerate() {
        w.start_element("cac:TransportHandlingUnit")?;
        w.start_element("cac:Package")?;
        w.text_element("cbc:ID", &(i + 1).to_string())?;
        w.text_element("cbc:TraceID", &package.trace_id)?;
        w.end_element("cac:Package")?;
        w.end_element("cac:TransportHandlingUnit")?;
    }

    if let Some((primary, secondary)) = despatch.vehicles.split_first() {
        w.start_element("cac:TransportHandlingUnit")?;
        w.start_element("cac:TransportEquipment")?;
        write_vehicle_details(w, primary)?;
        for vehicle in secondary {
            w.start_element("cac:AttachedTransportEquipment")?;
            write_vehicle_details(w, vehicle)?;
            w.end_element("cac:AttachedTransportEquipment")?;
        }
        if let Some(authorization) = &primary.authorization {
            write_authorization(w, primary, authorization)?;
        }
        w.end_element("cac:TransportEquipment")?;
        w.end_element("cac:TransportHandlingUnit")?;
    }

    if let Some(port) = &despatch.port {
        let (scheme, catalog, location_type) = port.catalog();
        let uri = catalog_uri(catalog);
        w.start_element("cac:FirstArrivalPortLocation")?;
        w.text_element_with_attrs(
            "cbc:ID",
            &port.code,
            &[
                ("schemeAgencyName", SUNAT_AGENCY),
                ("schemeName", scheme),
                ("schemeURI", &uri),
            ],
        )?;
        w.text_element("cbc:LocationTypeCode", location_type)?;
        w.cdata_element("cbc:Name", &port.name)?;
        w.end_element("cac:FirstArrivalPortLocation")?;
    }

    w.end_element("cac:Shipment")?;
    Ok(())
}

/// Plate and registration of one vehicle.
fn write_vehicle_details(w: &mut XmlWriter, vehicle: &Vehicle) -> Result<(), ComprobanteError> {
    w.text_element("cbc:ID", &vehicle.plate)?;
    if let Some(registration) = &vehicle.registration {
        w.start_element("cac:ApplicableTransportMeans")?;
        w.text_element("cbc:RegistrationNationalityID", registration)?;
        w.end_element("cac:ApplicableTransportMeans")?;
    }
    Ok(())
}

fn write_authorization(w: &mut XmlWriter, vehicle: &Vehicle, authorization: &str) -> Result<(), ComprobanteError> {
    w.start_element("cac:ShipmentDocumentReference")?;
    match &vehicle.authorization_entity {
        Some(entity) => w.text_element_with_attrs("cbc:ID", authorization, &[("schemeID", entity)])?,
        None => w.text_element("cbc:ID", authorization)?,
    };
    w.end_element("cac:ShipmentDocumentReference")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a guía de remisión.
pub fn despatch_from_xml(xml: &str) -> Result<Despatch, ComprobanteError> {
    despatch_from_tree(&parse_tree(xml)?)
}

pub(super) fn despatch_from_tree(root: &XmlNode) -> Result<Despatch, ComprobanteError> {
    check_root(root, "DespatchAdvice", ubl_ns::DESPATCH_ADVICE)?;
    let header = ParsedHeader::read(root)?;
    let type_code = read_type_code(root, "DespatchAdviceTypeCode")?;
    let taxpayer = read_supplier(root, "DespatchSupplierParty")?;
    let customer = read_customer(root, "DeliveryCustomerParty")?;
    let taxpayer_address = taxpayer.address().ok().cloned();

    let mut despatch = Despatch::new(type_code, Arc::new(taxpayer), Arc::new(customer))?;
    header.apply(despatch.core_mut())?;
    if let Some(note) = root.child_text(CBC, "Note") {
        despatch.set_note(note);
    }

    if let Some(shipment) = root.child(CAC, "Shipment") {
        read_shipment(shipment, &mut despatch)?;
    }
    // The taxpayer's address stands in for an unset despatch address.
    if despatch.despatch_address.is_some() && despatch.despatch_address == taxpayer_address {
        despatch.despatch_address = None;
    }

    for line in root.children_named(CAC, "DespatchLine") {
        despatch.add_item(read_line_item(line, "DeliveredQuantity")?);
    }
    Ok(despatch)
}

fn read_shipment(shipment: &XmlNode, despatch: &mut Despatch) -> Result<(), ComprobanteError> {
    if let Some(code) = shipment.child_text(CBC, "HandlingCode") {
        despatch.handling_code = code
            .trim()
            .parse()
            .map_err(|e| ComprobanteError::Xml(format!("invalid handling code '{code}': {e}")))?;
    }
    if let Some(weight) = shipment.child(CBC, "GrossWeightMeasure") {
        despatch.weight = parse_decimal(&weight.text)?;
        if let Some(unit) = weight.attr("unitCode") {
            despatch.weight_unit = unit.to_string();
        }
    }
    despatch.light_vehicle = shipment
        .children_named(CBC, "SpecialInstructions")
        .any(|n| n.text == LIGHT_VEHICLE_INDICATOR);

    if let Some(stage) = shipment.child(CAC, "ShipmentStage") {
        if let Some(date) = stage.path_text(&[(CAC, "TransitPeriod"), (CBC, "StartDate")]) {
            despatch.start_date = Some(parse_date(date)?);
        }
        if let Some(carrier) = stage.child(CAC, "CarrierParty") {
            let id = carrier
                .path(&[(CAC, "PartyIdentification"), (CBC, "ID")])
                .ok_or_else(|| ComprobanteError::Xml("carrier without identification".into()))?;
            let name = carrier
                .path_text(&[(CAC, "PartyLegalEntity"), (CBC, "RegistrationName")])
                .unwrap_or_default();
            despatch.carrier = Some(Party::new(name, read_identification(id)?));
        }
        for driver in stage.children_named(CAC, "DriverPerson") {
            let id = driver
                .child(CBC, "ID")
                .ok_or_else(|| ComprobanteError::Xml("driver without identification".into()))?;
            despatch.drivers.push(Driver::new(
                driver.child_text(CBC, "FirstName").unwrap_or_default(),
                driver.child_text(CBC, "FamilyName").unwrap_or_default(),
                read_identification(id)?,
                driver
                    .path_text(&[(CAC, "IdentityDocumentReference"), (CBC, "ID")])
                    .unwrap_or_default(),
            ));
        }
    }

    if let Some(delivery) = shipment.child(CAC, "Delivery") {
        despatch.delivery_address = delivery.child(CAC, "DeliveryAddress").map(read_address);
        despatch.despatch_address = delivery
            .path(&[(CAC, "Despatch"), (CAC, "DespatchAddress")])
            .map(read_address);
    }

    for unit in shipment.children_named(CAC, "TransportHandlingUnit") {
        for package in unit.children_named(CAC, "Package") {
            if let Some(trace_id) = package.child_text(CBC, "TraceID") {
                despatch.packages.push(Package {
                    trace_id: trace_id.to_string(),
                });
            }
        }
        if let Some(equipment) = unit.child(CAC, "TransportEquipment") {
            let mut primary = read_vehicle(equipment);
            if let Some(reference) = equipment.path(&[(CAC, "ShipmentDocumentReference"), (CBC, "ID")]) {
                primary.authorization = Some(reference.text.clone());
                primary.authorization_entity = reference.attr("schemeID").map(str::to_string);
            }
            despatch.vehicles.push(primary);
            despatch.vehicles.extend(
                equipment
                    .children_named(CAC, "AttachedTransportEquipment")
                    .map(read_vehicle),
            );
        }
    }

    if let Some(port) = shipment.child(CAC, "FirstArrivalPortLocation") {
        despatch.port = Some(Port {
            code: port.child_text(CBC, "ID").unwrap_or_default().to_string(),
            name: port.child_text(CBC, "Name").unwrap_or_default().to_string(),
            is_airport: port.child_text(CBC, "LocationTypeCode") == Some("2"),
        });
    }
    Ok(())
}

fn read_vehicle(node: &XmlNode) -> Vehicle {
    let mut vehicle = Vehicle::new(node.child_text(CBC, "ID").unwrap_or_default());
    vehicle.registration = node
        .path_text(&[(CAC, "ApplicableTransportMeans"), (CBC, "RegistrationNationalityID")])
        .map(str::to_string);
    vehicle
}

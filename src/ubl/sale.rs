use std::sync::Arc;

use rust_decimal::Decimal;

use super::common::*;
use super::xml_utils::{XmlNode, XmlResult, XmlWriter, format_decimal, parse_date, parse_decimal, parse_tree};
use super::{SUNAT_AGENCY, ubl_ns};
use crate::core::*;

use ubl_ns::{CAC, CBC};

const DETRACTION_NOTE: &str = "Operación sujeta a detracción";

/// Element names that differ between invoices and notes.
struct SaleTags {
    root: &'static str,
    namespace: &'static str,
    line: &'static str,
    quantity: &'static str,
    monetary_total: &'static str,
}

const INVOICE_TAGS: SaleTags = SaleTags {
    root: "Invoice",
    namespace: ubl_ns::INVOICE,
    line: "InvoiceLine",
    quantity: "InvoicedQuantity",
    monetary_total: "LegalMonetaryTotal",
};

const CREDIT_NOTE_TAGS: SaleTags = SaleTags {
    root: "CreditNote",
    namespace: ubl_ns::CREDIT_NOTE,
    line: "CreditNoteLine",
    quantity: "CreditedQuantity",
    monetary_total: "LegalMonetaryTotal",
};

const DEBIT_NOTE_TAGS: SaleTags = SaleTags {
    root: "DebitNote",
    namespace: ubl_ns::DEBIT_NOTE,
    line: "DebitNoteLine",
    quantity: "DebitedQuantity",
    monetary_total: "RequestedMonetaryTotal",
};

/// Closing words of the amount legend: the currency's Spanish name ("SOLES"
/// rather than "PEN"). Currencies without a known name fall back to their code.
fn currency_legend(currency: &str) -> &str {
    match currency {
        "PEN" => "SOLES",
        "USD" => "DÓLARES AMERICANOS",
        "EUR" => "EUROS",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate the UBL 2.1 XML of a factura or boleta.
pub fn invoice_to_xml(invoice: &Validated<'_, Invoice>) -> XmlResult {
    let invoice = invoice.document();
    let sale = &invoice.sale;
    let core = &sale.core;
    let currency = sale.currency.as_str();
    let tags = &INVOICE_TAGS;

    let mut w = XmlWriter::new()?;
    write_root_start(&mut w, tags.root, tags.namespace)?;
    write_header(&mut w, core)?;
    write_identity(&mut w, core)?;
    if core.type_code() == DocumentTypeCode::Invoice && invoice.shares().is_empty() {
        if let Some(due) = invoice.due_date {
            w.text_element("cbc:DueDate", &due.format("%Y-%m-%d").to_string())?;
        }
    }

    // Catalog 51: "1001" operation subject to detraction, "0101" internal sale
    let operation = if invoice.has_detraction() { "1001" } else { "0101" };
    w.text_element_with_attrs(
        "cbc:InvoiceTypeCode",
        &core.type_code().padded(),
        &[("listID", operation)],
    )?;

    write_legend(&mut w, sale)?;
    if invoice.has_detraction() {
        w.cdata_element_with_attrs("cbc:Note", DETRACTION_NOTE, &[("languageLocaleID", "2006")])?;
    }
    w.text_element("cbc:DocumentCurrencyCode", currency)?;

    if let Some(reference) = invoice.order_reference() {
        w.start_element("cac:OrderReference")?;
        w.text_element("cbc:ID", reference)?;
        if let Some(text) = invoice.order_reference_text() {
            w.cdata_element("cbc:CustomerReference", text)?;
        }
        w.end_element("cac:OrderReference")?;
    }

    write_signature(&mut w, &core.taxpayer)?;
    write_supplier(&mut w, "cac:AccountingSupplierParty", &core.taxpayer)?;
    write_customer(&mut w, "cac:AccountingCustomerParty", &core.customer)?;
    write_detraction(&mut w, invoice, currency)?;
    write_payment_terms(&mut w, invoice, currency)?;
    if let Some(discount) = invoice.discount() {
        write_charge(&mut w, discount, currency)?;
    }
    write_tax_total(&mut w, sale)?;
    write_monetary_total(&mut w, tags, sale)?;
    write_lines(&mut w, tags, sale)?;

    w.end_element(tags.root)?;
    w.into_string()
}

/// Generate the UBL 2.1 XML of a credit or debit note.
pub fn note_to_xml(note: &Validated<'_, Note>) -> XmlResult {
    let note = note.document();
    let sale = &note.sale;
    let core = &sale.core;
    let currency = sale.currency.as_str();
    let tags = if note.is_credit() {
        &CREDIT_NOTE_TAGS
    } else {
        &DEBIT_NOTE_TAGS
    };

    let mut w = XmlWriter::new()?;
    write_root_start(&mut w, tags.root, tags.namespace)?;
    write_header(&mut w, core)?;
    write_identity(&mut w, core)?;
    write_legend(&mut w, sale)?;
    w.text_element("cbc:DocumentCurrencyCode", currency)?;

    w.start_element("cac:DiscrepancyResponse")?;
    if let Some(reference) = note.document_reference() {
        w.text_element("cbc:ReferenceID", reference)?;
    }
    w.text_element("cbc:ResponseCode", &format!("{:02}", note.response_code()))?;
    w.cdata_element("cbc:Description", note.description())?;
    w.end_element("cac:DiscrepancyResponse")?;

    if let (Some(reference), Some(kind)) = (note.document_reference(), note.document_reference_type()) {
        w.start_element("cac:BillingReference")?;
        w.start_element("cac:InvoiceDocumentReference")?;
        w.text_element("cbc:ID", reference)?;
        w.text_element("cbc:DocumentTypeCode", &kind.padded())?;
        w.end_element("cac:InvoiceDocumentReference")?;
        w.end_element("cac:BillingReference")?;
    }

    write_signature(&mut w, &core.taxpayer)?;
    write_supplier(&mut w, "cac:AccountingSupplierParty", &core.taxpayer)?;
    write_customer(&mut w, "cac:AccountingCustomerParty", &core.customer)?;
    write_tax_total(&mut w, sale)?;
    write_monetary_total(&mut w, tags, sale)?;
    write_lines(&mut w, tags, sale)?;

    w.end_element(tags.root)?;
    w.into_string()
}

/// Catalog 52 legend 1000: the total in words.
fn write_legend(w: &mut XmlWriter, sale: &Sale) -> Result<(), ComprobanteError> {
    let words = amount_to_words(
        sale.totals().tax_inclusive,
        "CON",
        currency_legend(&sale.currency),
    );
    w.cdata_element_with_attrs("cbc:Note", &words, &[("languageLocaleID", "1000")])?;
    Ok(())
}

fn write_detraction(w: &mut XmlWriter, invoice: &Invoice, currency: &str) -> Result<(), ComprobanteError> {
    let Some(detraction) = invoice.detraction().filter(|d| d.amount() > Decimal::ZERO) else {
        return Ok(());
    };
    let account = detraction
        .financial_account
        .as_deref()
        .or(invoice.sale.core.taxpayer.deductions_account.as_deref());

    w.start_element("cac:PaymentMeans")?;
    w.text_element("cbc:ID", "Detraccion")?;
    w.text_element("cbc:PaymentMeansCode", "003")?;
    if let Some(account) = account {
        w.start_element("cac:PayeeFinancialAccount")?;
        w.text_element("cbc:ID", account)?;
        w.end_element("cac:PayeeFinancialAccount")?;
    }
    w.end_element("cac:PaymentMeans")?;

    w.start_element("cac:PaymentTerms")?;
    w.text_element("cbc:ID", "Detraccion")?;
    if let Some(code) = detraction.code() {
        w.text_element("cbc:PaymentMeansID", code)?;
    }
    w.text_element("cbc:PaymentPercent", &format_decimal(detraction.percentage()))?;
    w.amount_element("cbc:Amount", detraction.amount(), currency)?;
    w.end_element("cac:PaymentTerms")?;
    Ok(())
}

/// Cash sale, or credit sale followed by one entry per installment.
fn write_payment_terms(w: &mut XmlWriter, invoice: &Invoice, currency: &str) -> Result<(), ComprobanteError> {
    w.start_element("cac:PaymentTerms")?;
    w.text_element("cbc:ID", "FormaPago")?;
    if invoice.shares().is_empty() {
        w.text_element("cbc:PaymentMeansID", "Contado")?;
        w.end_element("cac:PaymentTerms")?;
        return Ok(());
    }
    w.text_element("cbc:PaymentMeansID", "Credito")?;
    w.amount_element("cbc:Amount", invoice.shareable_amount(), currency)?;
    w.end_element("cac:PaymentTerms")?;

    for (i, share) in invoice.shares().iter().enumerate() {
        w.start_element("cac:PaymentTerms")?;
        w.text_element("cbc:ID", "FormaPago")?;
        w.text_element("cbc:PaymentMeansID", &format!("Cuota{:03}", i + 1))?;
        w.amount_element("cbc:Amount", share.amount(), currency)?;
        w.text_element(
            "cbc:PaymentDueDate",
            &share.due_date().format("%Y-%m-%d").to_string(),
        )?;
        w.end_element("cac:PaymentTerms")?;
    }
    Ok(())
}

fn write_charge(w: &mut XmlWriter, charge: &Charge, currency: &str) -> Result<(), ComprobanteError> {
    w.start_element("cac:AllowanceCharge")?;
    w.text_element("cbc:ChargeIndicator", if charge.is_charge { "true" } else { "false" })?;
    w.text_element("cbc:AllowanceChargeReasonCode", &charge.type_code)?;
    w.text_element("cbc:MultiplierFactorNumeric", &fixed(charge.factor, 5))?;
    w.amount_element("cbc:Amount", charge.amount, currency)?;
    w.amount_element("cbc:BaseAmount", charge.base_amount, currency)?;
    w.end_element("cac:AllowanceCharge")?;
    Ok(())
}

fn write_tax_scheme(
    w: &mut XmlWriter,
    (id, name, type_code): (&str, &str, &str),
) -> Result<(), ComprobanteError> {
    let uri = catalog_uri("catalogo05");
    w.start_element("cac:TaxScheme")?;
    w.text_element_with_attrs(
        "cbc:ID",
        id,
        &[
            ("schemeName", "Codigo de tributos"),
            ("schemeAgencyName", SUNAT_AGENCY),
            ("schemeURI", &uri),
        ],
    )?;
    w.text_element("cbc:Name", name)?;
    w.text_element("cbc:TaxTypeCode", type_code)?;
    w.end_element("cac:TaxScheme")?;
    Ok(())
}

/// Document tax total with one subtotal per non-empty operation bucket.
fn write_tax_total(w: &mut XmlWriter, sale: &Sale) -> Result<(), ComprobanteError> {
    let totals = sale.totals();
    let currency = sale.currency.as_str();
    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", totals.tax_total, currency)?;
    for bucket in OperationBucket::ALL {
        let taxable = totals.operation(bucket);
        if taxable <= Decimal::ZERO {
            continue;
        }
        let tax = if matches!(bucket, OperationBucket::Taxed) {
            totals.vat
        } else {
            Decimal::ZERO
        };
        w.start_element("cac:TaxSubtotal")?;
        w.amount_element("cbc:TaxableAmount", taxable, currency)?;
        w.amount_element("cbc:TaxAmount", tax, currency)?;
        w.start_element("cac:TaxCategory")?;
        write_tax_scheme(w, bucket.tax_scheme())?;
        w.end_element("cac:TaxCategory")?;
        w.end_element("cac:TaxSubtotal")?;
    }
    w.end_element("cac:TaxTotal")?;
    Ok(())
}

fn write_monetary_total(w: &mut XmlWriter, tags: &SaleTags, sale: &Sale) -> Result<(), ComprobanteError> {
    let totals = sale.totals();
    let currency = sale.currency.as_str();
    let tag = format!("cac:{}", tags.monetary_total);
    w.start_element(&tag)?;
    w.amount_element("cbc:LineExtensionAmount", totals.line_extension, currency)?;
    w.amount_element("cbc:TaxInclusiveAmount", totals.tax_inclusive, currency)?;
    w.amount_element("cbc:PayableAmount", totals.tax_inclusive, currency)?;
    w.end_element(&tag)?;
    Ok(())
}

fn write_lines(w: &mut XmlWriter, tags: &SaleTags, sale: &Sale) -> Result<(), ComprobanteError> {
    let currency = sale.currency.as_str();
    let line_tag = format!("cac:{}", tags.line);
    let qty_tag = format!("cbc:{}", tags.quantity);

    for (i, item) in sale.items().iter().enumerate() {
        w.start_element(&line_tag)?;
        w.text_element("cbc:ID", &(i + 1).to_string())?;
        w.quantity_element(&qty_tag, item.quantity(), &item.unit_code)?;
        w.amount_element("cbc:LineExtensionAmount", item.line_extension(), currency)?;

        // Catalog 16: "01" unit price including taxes
        w.start_element("cac:PricingReference")?;
        w.start_element("cac:AlternativeConditionPrice")?;
        w.price_element("cbc:PriceAmount", item.pricing_reference(), currency)?;
        w.text_element("cbc:PriceTypeCode", "01")?;
        w.end_element("cac:AlternativeConditionPrice")?;
        w.end_element("cac:PricingReference")?;

        write_line_taxes(w, item, currency)?;
        write_item(w, item)?;

        w.start_element("cac:Price")?;
        w.price_element("cbc:PriceAmount", item.unit_value(), currency)?;
        w.end_element("cac:Price")?;
        w.end_element(&line_tag)?;
    }
    Ok(())
}

/// Line tax total: an excise subtotal when present, then the VAT subtotal.
fn write_line_taxes(w: &mut XmlWriter, item: &Item, currency: &str) -> Result<(), ComprobanteError> {
    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", item.tax_total(), currency)?;

    if item.excise_amount() > Decimal::ZERO {
        w.start_element("cac:TaxSubtotal")?;
        w.amount_element("cbc:TaxableAmount", item.line_extension(), currency)?;
        w.amount_element("cbc:TaxAmount", item.excise_amount(), currency)?;
        w.start_element("cac:TaxCategory")?;
        w.text_element("cbc:Percent", &format_decimal(item.excise_percentage()))?;
        // Catalog 08: "01" system applied to the value
        w.text_element("cbc:TierRange", "01")?;
        write_tax_scheme(w, EXCISE_SCHEME)?;
        w.end_element("cac:TaxCategory")?;
        w.end_element("cac:TaxSubtotal")?;
    }

    let uri = catalog_uri("catalogo07");
    w.start_element("cac:TaxSubtotal")?;
    w.amount_element("cbc:TaxableAmount", item.vat_base(), currency)?;
    w.amount_element("cbc:TaxAmount", item.vat_amount(), currency)?;
    w.start_element("cac:TaxCategory")?;
    w.text_element("cbc:Percent", &format_decimal(item.vat_percentage()))?;
    w.text_element_with_attrs(
        "cbc:TaxExemptionReasonCode",
        &format!("{:02}", item.exemption_code()),
        &[
            ("listAgencyName", SUNAT_AGENCY),
            ("listName", "Afectacion del IGV"),
            ("listURI", &uri),
        ],
    )?;
    write_tax_scheme(w, item.bucket().tax_scheme())?;
    w.end_element("cac:TaxCategory")?;
    w.end_element("cac:TaxSubtotal")?;

    w.end_element("cac:TaxTotal")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a factura or boleta. Totals are recomputed from the lines.
pub fn invoice_from_xml(xml: &str) -> Result<Invoice, ComprobanteError> {
    invoice_from_tree(&parse_tree(xml)?)
}

/// Parse a credit or debit note. Totals are recomputed from the lines.
pub fn note_from_xml(xml: &str) -> Result<Note, ComprobanteError> {
    note_from_tree(&parse_tree(xml)?)
}

pub(super) fn invoice_from_tree(root: &XmlNode) -> Result<Invoice, ComprobanteError> {
    let tags = &INVOICE_TAGS;
    check_root(root, tags.root, tags.namespace)?;
    let header = ParsedHeader::read(root)?;
    let type_code = read_type_code(root, "InvoiceTypeCode")?;
    let taxpayer = read_supplier(root, "AccountingSupplierParty")?;
    let customer = read_customer(root, "AccountingCustomerParty")?;

    let mut invoice = Invoice::new(type_code, Arc::new(taxpayer), Arc::new(customer))?;
    header.apply(invoice.core_mut())?;
    if let Some(currency) = root.child_text(CBC, "DocumentCurrencyCode") {
        invoice.sale.currency = currency.to_string();
    }
    if let Some(due) = root.child_text(CBC, "DueDate") {
        invoice.due_date = Some(parse_date(due)?);
    }
    if let Some(order) = root.child(CAC, "OrderReference") {
        if let Some(reference) = order.child_text(CBC, "ID") {
            invoice.set_order_reference(reference)?;
            if let Some(text) = order.child_text(CBC, "CustomerReference") {
                invoice.set_order_reference_text(text)?;
            }
        }
    }

    for item in read_lines(root, tags)? {
        invoice.add_item(item);
    }
    read_discount(root, &mut invoice)?;
    read_detraction(root, &mut invoice)?;
    for share in read_shares(root)? {
        invoice.add_share(share);
    }
    Ok(invoice)
}

pub(super) fn note_from_tree(root: &XmlNode) -> Result<Note, ComprobanteError> {
    let tags = if root.name == CREDIT_NOTE_TAGS.root {
        &CREDIT_NOTE_TAGS
    } else {
        &DEBIT_NOTE_TAGS
    };
    check_root(root, tags.root, tags.namespace)?;
    let header = ParsedHeader::read(root)?;
    let type_code = if tags.root == CREDIT_NOTE_TAGS.root {
        DocumentTypeCode::CreditNote
    } else {
        DocumentTypeCode::DebitNote
    };
    let taxpayer = read_supplier(root, "AccountingSupplierParty")?;
    let customer = read_customer(root, "AccountingCustomerParty")?;

    let mut note = Note::new(type_code, Arc::new(taxpayer), Arc::new(customer))?;
    header.apply(note.core_mut())?;
    if let Some(currency) = root.child_text(CBC, "DocumentCurrencyCode") {
        note.sale.currency = currency.to_string();
    }

    if let Some(discrepancy) = root.child(CAC, "DiscrepancyResponse") {
        if let Some(code) = discrepancy.child_text(CBC, "ResponseCode") {
            let code = code
                .trim()
                .parse::<u8>()
                .map_err(|e| ComprobanteError::Xml(format!("invalid response code '{code}': {e}")))?;
            note.set_response_code(code);
        }
        if let Some(description) = discrepancy.child_text(CBC, "Description") {
            note.set_description(description);
        }
    }
    let billing = root.path(&[(CAC, "BillingReference"), (CAC, "InvoiceDocumentReference")]);
    if let Some(billing) = billing {
        let reference = billing.child_text(CBC, "ID");
        let kind = billing
            .child_text(CBC, "DocumentTypeCode")
            .and_then(|c| c.trim().parse::<u8>().ok())
            .and_then(DocumentTypeCode::from_code);
        if let (Some(reference), Some(kind)) = (reference, kind) {
            note.set_document_reference(reference, kind);
        }
    }

    for item in read_lines(root, tags)? {
        note.add_item(item);
    }
    Ok(note)
}

fn read_lines(root: &XmlNode, tags: &SaleTags) -> Result<Vec<Item>, ComprobanteError> {
    root.children_named(CAC, tags.line)
        .enumerate()
        .map(|(i, line)| {
            read_sale_line(line, tags.quantity).map_err(|e| match e {
                ComprobanteError::Xml(msg) => ComprobanteError::Xml(format!("line {}: {msg}", i + 1)),
                other => other,
            })
        })
        .collect()
}

fn read_sale_line(line: &XmlNode, qty_tag: &str) -> Result<Item, ComprobanteError> {
    let mut item = read_line_item(line, qty_tag)?;
    if let Some(price) = line.path_text(&[(CAC, "Price"), (CBC, "PriceAmount")]) {
        item.set_unit_value(parse_decimal(price)?, false)?;
    }

    let subtotals = line
        .child(CAC, "TaxTotal")
        .into_iter()
        .flat_map(|t| t.children_named(CAC, "TaxSubtotal"));
    for subtotal in subtotals {
        let Some(category) = subtotal.child(CAC, "TaxCategory") else {
            continue;
        };
        let percent = category
            .child_text(CBC, "Percent")
            .map(parse_decimal)
            .transpose()?
            .unwrap_or_default();
        let scheme = category.path_text(&[(CAC, "TaxScheme"), (CBC, "ID")]);
        if scheme == Some(EXCISE_SCHEME.0) {
            item.set_excise_percentage(percent)?;
            continue;
        }
        item.set_vat_percentage(percent)?;
        if let Some(code) = category.child_text(CBC, "TaxExemptionReasonCode") {
            let code = code
                .trim()
                .parse::<u8>()
                .map_err(|e| ComprobanteError::Xml(format!("invalid exemption code '{code}': {e}")))?;
            item.set_exemption_code(code);
        }
    }
    item.compute_taxes();
    Ok(item)
}

/// Re-apply a global discount.
///
/// The requested amount is the gap between the undiscounted total and the
/// payable amount; the multiplier factor is only used without a payable amount.
fn read_discount(root: &XmlNode, invoice: &mut Invoice) -> Result<(), ComprobanteError> {
    let Some(charge) = root.child(CAC, "AllowanceCharge") else {
        return Ok(());
    };
    if charge.child_text(CBC, "ChargeIndicator") != Some("false") {
        return Ok(());
    }
    let total = invoice.totals().tax_inclusive;
    let payable = root
        .path_text(&[(CAC, INVOICE_TAGS.monetary_total), (CBC, "PayableAmount")])
        .map(parse_decimal)
        .transpose()?;
    let requested = match (payable, charge.child_text(CBC, "MultiplierFactorNumeric")) {
        (Some(payable), _) => total.checked_sub(payable),
        (None, Some(factor)) => parse_decimal(factor)?.checked_mul(total),
        (None, None) => return Ok(()),
    }
    .map(|amount| round2(amount).normalize())
    .ok_or_else(|| ComprobanteError::Xml("discount out of range".into()))?;
    if requested <= Decimal::ZERO {
        return Ok(());
    }
    invoice.set_discount(requested)
}

fn terms_with_id<'a>(root: &'a XmlNode, tag: &'a str, id: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
    root.children_named(CAC, tag)
        .filter(move |t| t.child_text(CBC, "ID") == Some(id))
}

fn read_detraction(root: &XmlNode, invoice: &mut Invoice) -> Result<(), ComprobanteError> {
    let Some(terms) = terms_with_id(root, "PaymentTerms", "Detraccion").next() else {
        return Ok(());
    };
    let percentage = terms
        .child_text(CBC, "PaymentPercent")
        .map(parse_decimal)
        .transpose()?
        .unwrap_or_default();
    invoice.set_detraction(percentage)?;

    let account = terms_with_id(root, "PaymentMeans", "Detraccion")
        .next()
        .and_then(|m| m.path_text(&[(CAC, "PayeeFinancialAccount"), (CBC, "ID")]));
    if let Some(detraction) = invoice.detraction_mut() {
        if let Some(code) = terms.child_text(CBC, "PaymentMeansID") {
            detraction.set_code(code)?;
        }
        detraction.financial_account = account.map(str::to_string);
    }
    invoice.compute_detraction_amount();
    Ok(())
}

/// Installments: a `FormaPago`/`Credito` entry followed by dated amounts,
/// read until the pattern breaks.
fn read_shares(root: &XmlNode) -> Result<Vec<Share>, ComprobanteError> {
    let terms: Vec<&XmlNode> = root.children_named(CAC, "PaymentTerms").collect();
    let Some(start) = terms
        .iter()
        .position(|t| t.child_text(CBC, "ID") == Some("FormaPago"))
    else {
        return Ok(Vec::new());
    };
    if terms[start].child_text(CBC, "PaymentMeansID") != Some("Credito") {
        return Ok(Vec::new());
    }

    let mut shares = Vec::new();
    for entry in &terms[start + 1..] {
        if entry.child_text(CBC, "ID") != Some("FormaPago") {
            break;
        }
        let (Some(amount), Some(due)) = (
            entry.child_text(CBC, "Amount"),
            entry.child_text(CBC, "PaymentDueDate"),
        ) else {
            break;
        };
        shares.push(Share::new(parse_date(due)?, parse_decimal(amount)?)?);
    }
    Ok(shares)
}

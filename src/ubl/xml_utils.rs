use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};
use rust_decimal::Decimal;
use std::io::Cursor;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use crate::core::{ComprobanteError, fixed};

pub type XmlResult = Result<String, ComprobanteError>;

fn xml_io(e: std::io::Error) -> ComprobanteError {
    ComprobanteError::Xml(format!("write error: {e}"))
}

pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Start a document with `<?xml version="1.0" encoding="UTF-8" standalone="no"?>`.
    pub fn new() -> Result<Self, ComprobanteError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    /// A writer without XML declaration, for fragments such as SOAP envelopes.
    pub fn fragment() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    pub fn into_string(self) -> Result<String, ComprobanteError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| ComprobanteError::Xml(format!("UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, ComprobanteError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ComprobanteError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, ComprobanteError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, ComprobanteError> {
        self.text_element_with_attrs(name, text, &[])
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ComprobanteError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write prose inside a `<![CDATA[...]]>` section.
    pub fn cdata_element(&mut self, name: &str, text: &str) -> Result<&mut Self, ComprobanteError> {
        self.cdata_element_with_attrs(name, text, &[])
    }

    pub fn cdata_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ComprobanteError> {
        self.start_element_with_attrs(name, attrs)?;
        // "]]>" cannot appear inside a single CDATA section
        let mut rest = text;
        while let Some(pos) = rest.find("]]>") {
            self.writer
                .write_event(Event::CData(BytesCData::new(&rest[..pos + 2])))
                .map_err(xml_io)?;
            rest = &rest[pos + 2..];
        }
        self.writer
            .write_event(Event::CData(BytesCData::new(rest)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write a 2-decimal amount with currencyID attribute.
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, ComprobanteError> {
        self.text_element_with_attrs(name, &fixed(amount, 2), &[("currencyID", currency)])
    }

    /// Write a 10-decimal unit price with currencyID attribute.
    pub fn price_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, ComprobanteError> {
        self.text_element_with_attrs(name, &fixed(amount, 10), &[("currencyID", currency)])
    }

    /// Write a line quantity with the UN/ECE rec 20 unit attributes.
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, ComprobanteError> {
        self.text_element_with_attrs(
            name,
            &fixed(qty, 10),
            &[
                ("unitCode", unit),
                ("unitCodeListID", "UN/ECE rec 20"),
                (
                    "unitCodeListAgencyName",
                    "United Nations Economic Commission for Europe",
                ),
            ],
        )
    }
}

/// Format a Decimal for XML output: at least 2 decimal places,
/// trailing zeros beyond that stripped.
pub fn format_decimal(d: Decimal) -> String {
    let s = d.normalize().to_string();
    if let Some(dot_pos) = s.find('.') {
        let decimals = s.len() - dot_pos - 1;
        if decimals < 2 {
            format!("{s}{}", "0".repeat(2 - decimals))
        } else {
            s
        }
    } else {
        format!("{s}.00")
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// An element with its resolved namespace, attributes, text and children.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub ns: String,
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn is(&self, ns: &str, name: &str) -> bool {
        self.name == name && self.ns == ns
    }

    /// First direct child with the given namespace and local name.
    pub fn child(&self, ns: &str, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.is(ns, name))
    }

    pub fn children_named<'a>(
        &'a self,
        ns: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.is(ns, name))
    }

    /// Follow a chain of direct children.
    pub fn path(&self, steps: &[(&str, &str)]) -> Option<&XmlNode> {
        steps
            .iter()
            .try_fold(self, |node, (ns, name)| node.child(ns, name))
    }

    /// First matching descendant in document order.
    pub fn find(&self, ns: &str, name: &str) -> Option<&XmlNode> {
        for c in &self.children {
            if c.is(ns, name) {
                return Some(c);
            }
            if let Some(found) = c.find(ns, name) {
                return Some(found);
            }
        }
        None
    }

    /// First descendant with the given local name, in any namespace.
    pub fn find_local(&self, name: &str) -> Option<&XmlNode> {
        for c in &self.children {
            if c.name == name {
                return Some(c);
            }
            if let Some(found) = c.find_local(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text of a direct child, `None` when missing or empty.
    pub fn child_text(&self, ns: &str, name: &str) -> Option<&str> {
        self.child(ns, name)
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Text at the end of a child chain, `None` when missing or empty.
    pub fn path_text(&self, steps: &[(&str, &str)]) -> Option<&str> {
        self.path(steps)
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ComprobanteError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ComprobanteError::Xml(format!("UTF-8 error: {e}")))
}

fn node_from(ns: ResolveResult<'_>, e: &BytesStart<'_>) -> Result<XmlNode, ComprobanteError> {
    let ns = match ns {
        ResolveResult::Bound(n) => utf8(n.as_ref())?,
        _ => String::new(),
    };
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ComprobanteError::Xml(format!("attribute error: {e}")))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| ComprobanteError::Xml(format!("attribute error: {e}")))?;
        attrs.push((utf8(attr.key.local_name().as_ref())?, value.into_owned()));
    }
    Ok(XmlNode {
        ns,
        name: utf8(e.local_name().as_ref())?,
        attrs,
        ..XmlNode::default()
    })
}

/// Deepest element nesting [`parse_tree`] accepts.
pub const MAX_DEPTH: usize = 64;

/// Parse a document into a tree of namespace-resolved nodes.
///
/// Documents nested deeper than [`MAX_DEPTH`] are rejected.
pub fn parse_tree(xml: &str) -> Result<XmlNode, ComprobanteError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| ComprobanteError::Xml(format!("parse error: {e}")))?;
        match event {
            Event::Start(ref e) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(ComprobanteError::Xml(format!(
                        "elements nested deeper than {MAX_DEPTH}"
                    )));
                }
                stack.push(node_from(ns, e)?);
            }
            Event::Empty(ref e) => {
                let node = node_from(ns, e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|e| ComprobanteError::Xml(format!("text error: {e}")))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = utf8(&e.into_inner())?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let Some(node) = stack.pop() else {
                    return Err(ComprobanteError::Xml("unbalanced end tag".into()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| ComprobanteError::Xml("document has no root element".into()))
}

pub fn parse_decimal(s: &str) -> Result<Decimal, ComprobanteError> {
    Decimal::from_str(s.trim())
        .map(|d| d.normalize())
        .map_err(|e| ComprobanteError::Xml(format!("invalid decimal '{s}': {e}")))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ComprobanteError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ComprobanteError::Xml(format!("invalid date '{s}': {e}")))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, ComprobanteError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
        .map_err(|e| ComprobanteError::Xml(format!("invalid time '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_decimal_cases() {
        assert_eq!(format_decimal(dec!(100)), "100.00");
        assert_eq!(format_decimal(dec!(12.5)), "12.50");
        assert_eq!(format_decimal(dec!(0.125)), "0.125");
    }

    #[test]
    fn cdata_is_not_escaped() {
        let mut w = XmlWriter::fragment();
        w.cdata_element("cbc:Name", "A & B <S.A.C.>").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("<![CDATA[A & B <S.A.C.>]]>"));
    }

    #[test]
    fn tree_resolves_namespaces() {
        let xml = r#"<r xmlns="urn:root" xmlns:a="urn:a"><a:x id="1">one</a:x><a:y><a:x>two</a:x></a:y><x>three</x></r>"#;
        let root = parse_tree(xml).unwrap();
        assert_eq!(root.ns, "urn:root");
        assert_eq!(root.child_text("urn:a", "x"), Some("one"));
        assert_eq!(root.child("urn:a", "x").unwrap().attr("id"), Some("1"));
        assert_eq!(root.path_text(&[("urn:a", "y"), ("urn:a", "x")]), Some("two"));
        assert_eq!(root.child_text("urn:root", "x"), Some("three"));
        assert_eq!(root.children_named("urn:a", "x").count(), 1);
    }

    #[test]
    fn tree_reads_cdata_and_empty_elements() {
        let xml = r#"<r xmlns:a="urn:a"><a:n><![CDATA[x < y]]></a:n><a:e/></r>"#;
        let root = parse_tree(xml).unwrap();
        assert_eq!(root.child_text("urn:a", "n"), Some("x < y"));
        assert!(root.child("urn:a", "e").is_some());
        assert_eq!(root.child_text("urn:a", "e"), None);
    }

    #[test]
    fn find_searches_descendants() {
        let xml = r#"<r xmlns:d="urn:d"><a><b><d:v>deep</d:v></b></a></r>"#;
        let root = parse_tree(xml).unwrap();
        assert_eq!(root.find("urn:d", "v").map(|n| n.text.as_str()), Some("deep"));
        assert!(root.find("urn:d", "w").is_none());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_tree("<a><b></a>").is_err());
        assert!(parse_tree("").is_err());
    }

    #[test]
    fn nesting_is_capped() {
        let at_limit = format!("{}{}", "<a>".repeat(MAX_DEPTH), "</a>".repeat(MAX_DEPTH));
        assert!(parse_tree(&at_limit).is_ok());
        let deep = format!("{}{}", "<a>".repeat(100_000), "</a>".repeat(100_000));
        assert!(matches!(parse_tree(&deep), Err(ComprobanteError::Xml(_))));
    }
}

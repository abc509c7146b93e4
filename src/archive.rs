//! ZIP packaging of signed documents and extraction of authority responses.
//!
//! Documents are submitted as a ZIP holding a single XML entry named after
//! the document (`{ruc}-{type}-{series}-{sequence}.xml`); the response (CDR)
//! comes back the same way with an `R-` prefix.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::{ComprobanteError, DocumentCore};

fn archive_err(e: impl std::fmt::Display) -> ComprobanteError {
    ComprobanteError::Archive(e.to_string())
}

/// Pack `xml` into a ZIP with one deflated entry called `file_name`.
pub fn pack_xml(file_name: &str, xml: &str) -> Result<Vec<u8>, ComprobanteError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(file_name, options).map_err(archive_err)?;
    zip.write_all(xml.as_bytes()).map_err(archive_err)?;
    let cursor = zip.finish().map_err(archive_err)?;
    Ok(cursor.into_inner())
}

/// Pack a signed document under its conventional names.
///
/// Returns the ZIP file name and its bytes.
pub fn pack_document(core: &DocumentCore, signed_xml: &str) -> Result<(String, Vec<u8>), ComprobanteError> {
    let bytes = pack_xml(&core.xml_file_name()?, signed_xml)?;
    Ok((core.zip_file_name()?, bytes))
}

/// Read the entry `file_name` from a ZIP as UTF-8 text.
pub fn unpack_xml(bytes: &[u8], file_name: &str) -> Result<String, ComprobanteError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;
    let mut entry = archive.by_name(file_name).map_err(archive_err)?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(archive_err)?;
    Ok(xml)
}

/// Read the first `.xml` entry of a ZIP. Responses sometimes carry a
/// directory entry before the document.
pub fn unpack_first_xml(bytes: &[u8]) -> Result<(String, String), ComprobanteError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_err)?;
        if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".xml") {
            continue;
        }
        let name = entry.name().to_string();
        let mut xml = String::new();
        entry.read_to_string(&mut xml).map_err(archive_err)?;
        return Ok((name, xml));
    }
    Err(ComprobanteError::Archive("no XML entry in archive".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_then_unpack_by_name() {
        let zip = pack_xml("20601030013-01-F001-00000001.xml", "<Invoice/>").unwrap();
        assert_eq!(&zip[..2], b"PK");
        let xml = unpack_xml(&zip, "20601030013-01-F001-00000001.xml").unwrap();
        assert_eq!(xml, "<Invoice/>");
    }

    #[test]
    fn missing_entry_is_archive_error() {
        let zip = pack_xml("a.xml", "<a/>").unwrap();
        assert!(matches!(
            unpack_xml(&zip, "b.xml"),
            Err(ComprobanteError::Archive(_))
        ));
    }

    #[test]
    fn first_xml_skips_directories() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.add_directory("dummy/", options).unwrap();
        zip.start_file("R-20601030013-01-F001-00000001.xml", options).unwrap();
        zip.write_all(b"<ApplicationResponse/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let (name, xml) = unpack_first_xml(&bytes).unwrap();
        assert_eq!(name, "R-20601030013-01-F001-00000001.xml");
        assert_eq!(xml, "<ApplicationResponse/>");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(unpack_first_xml(b"not a zip").is_err());
    }
}

//! Partial export document format.
//!
//! ```text
//! <root>
//!   <partial rootKey= rootName= info= sourcePath= sourceIdentifier= sourceName= sourceType=>
//!     ... subtree payload written by the tree codec ...
//!   </partial>
//!   <extension package= version=>
//!     ... side tree payload ...
//!   </extension>
//! </root>
//! ```
//!
//! Only this skeleton is ever handled here. Payload elements are produced and
//! consumed by the [`TreeCodec`](crate::codec::TreeCodec).

use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use crate::capability::CapabilityRegistry;
use crate::codec::XmlSource;
use crate::error::{Error, Result};

pub const ROOT_ELEMENT: &str = "root";
pub const PARTIAL_ELEMENT: &str = "partial";
pub const EXTENSION_ELEMENT: &str = "extension";

pub const ATTR_ROOT_KEY: &str = "rootKey";
pub const ATTR_ROOT_NAME: &str = "rootName";
pub const ATTR_INFO: &str = "info";
pub const ATTR_SOURCE_PATH: &str = "sourcePath";
pub const ATTR_SOURCE_IDENTIFIER: &str = "sourceIdentifier";
pub const ATTR_SOURCE_NAME: &str = "sourceName";
pub const ATTR_SOURCE_TYPE: &str = "sourceType";
pub const ATTR_PACKAGE: &str = "package";
pub const ATTR_VERSION: &str = "version";

/// Sibling directory holding binary resources of a document.
pub const RESOURCES_DIR: &str = "Resources";

/// Metadata on the `partial` element, everything an importer needs to decide
/// between merge and create without reading the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub root_key: String,
    pub root_name: String,
    pub info: String,
    /// Segment-joined source address, e.g. `site-a/section/page`.
    pub source_path: String,
    pub source_identifier: String,
    pub source_name: String,
    pub source_type: String,
}

impl DocumentHeader {
    pub fn to_start(&self) -> BytesStart<'static> {
        let mut start = BytesStart::new(PARTIAL_ELEMENT);
        start.push_attribute((ATTR_ROOT_KEY, self.root_key.as_str()));
        start.push_attribute((ATTR_ROOT_NAME, self.root_name.as_str()));
        start.push_attribute((ATTR_INFO, self.info.as_str()));
        start.push_attribute((ATTR_SOURCE_PATH, self.source_path.as_str()));
        start.push_attribute((ATTR_SOURCE_IDENTIFIER, self.source_identifier.as_str()));
        start.push_attribute((ATTR_SOURCE_NAME, self.source_name.as_str()));
        start.push_attribute((ATTR_SOURCE_TYPE, self.source_type.as_str()));
        start
    }

    pub fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        Ok(Self {
            root_key: required_attribute(start, ATTR_ROOT_KEY)?,
            root_name: required_attribute(start, ATTR_ROOT_NAME)?,
            info: optional_attribute(start, ATTR_INFO)?.unwrap_or_default(),
            source_path: required_attribute(start, ATTR_SOURCE_PATH)?,
            source_identifier: required_attribute(start, ATTR_SOURCE_IDENTIFIER)?,
            source_name: required_attribute(start, ATTR_SOURCE_NAME)?,
            source_type: required_attribute(start, ATTR_SOURCE_TYPE)?,
        })
    }
}

pub fn optional_attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match start.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

pub fn required_attribute(start: &BytesStart<'_>, name: &str) -> Result<String> {
    optional_attribute(start, name)?.ok_or_else(|| Error::MissingMetadata(name.to_string()))
}

/// Where the header element was found.
pub struct HeaderPosition {
    pub header: DocumentHeader,
    /// False for a self-closing `partial` element (no payload to read).
    pub has_payload: bool,
}

/// Advance `reader` to the `partial` element and parse its attributes.
/// The reader is left just inside the element.
pub fn find_header(reader: &mut XmlSource) -> Result<HeaderPosition> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.name().as_ref() == PARTIAL_ELEMENT.as_bytes() => {
                return Ok(HeaderPosition {
                    header: DocumentHeader::from_start(e)?,
                    has_payload: true,
                });
            }
            Event::Empty(ref e) if e.name().as_ref() == PARTIAL_ELEMENT.as_bytes() => {
                return Ok(HeaderPosition {
                    header: DocumentHeader::from_start(e)?,
                    has_payload: false,
                });
            }
            Event::Eof => {
                return Err(Error::MalformedDocument(format!(
                    "no <{}> element found",
                    PARTIAL_ELEMENT
                )))
            }
            _ => {}
        }
    }
}

/// Extension block attributes as declared in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionBlock {
    pub package: String,
    pub version: String,
    pub has_payload: bool,
}

/// Advance `reader` to the next `extension` element, skipping payload of
/// everything else at the same level. Returns `None` at end of document.
pub fn next_extension(reader: &mut XmlSource) -> Result<Option<ExtensionBlock>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.name().as_ref() == EXTENSION_ELEMENT.as_bytes() => {
                return Ok(Some(ExtensionBlock {
                    package: required_attribute(e, ATTR_PACKAGE)?,
                    version: required_attribute(e, ATTR_VERSION)?,
                    has_payload: true,
                }));
            }
            Event::Empty(ref e) if e.name().as_ref() == EXTENSION_ELEMENT.as_bytes() => {
                return Ok(Some(ExtensionBlock {
                    package: required_attribute(e, ATTR_PACKAGE)?,
                    version: required_attribute(e, ATTR_VERSION)?,
                    has_payload: false,
                }));
            }
            Event::Start(ref e) if e.name().as_ref() != ROOT_ELEMENT.as_bytes() => {
                let end = e.to_end().into_owned();
                let mut skip = Vec::new();
                reader.read_to_end_into(end.name(), &mut skip)?;
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// A document that can be opened (and re-opened) for reading.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    File(PathBuf),
    Text(String),
}

impl DocumentSource {
    pub fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            DocumentSource::File(path) => {
                let file = File::open(path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::DocumentNotFound(path.clone()),
                    _ => Error::Io(e),
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            DocumentSource::Text(text) => Ok(Box::new(Cursor::new(text.clone().into_bytes()))),
        }
    }

    /// Fresh streaming reader positioned at the start of the document.
    pub fn reader(&self) -> Result<XmlSource> {
        let mut reader = XmlSource::from_reader(self.open()?);
        reader.config_mut().trim_text(true);
        Ok(reader)
    }

    /// Resources directory travelling with the document.
    pub fn resource_dir(&self) -> Option<PathBuf> {
        match self {
            DocumentSource::File(path) => Some(resources_dir_for(path)),
            DocumentSource::Text(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DocumentSource::File(path) => path.display().to_string(),
            DocumentSource::Text(_) => "<text>".to_string(),
        }
    }
}

pub fn resources_dir_for(document: &Path) -> PathBuf {
    document
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(RESOURCES_DIR)
}

/// Append `.xml` unless already present.
pub fn ensure_xml_suffix(filename: &str) -> String {
    if filename.ends_with(".xml") {
        filename.to_string()
    } else {
        format!("{}.xml", filename)
    }
}

/// Default document name for an export of the node named `leaf`.
pub fn default_filename(leaf: &str) -> String {
    format!("PartialContent-{}.xml", leaf)
}

/// Content directory of a package: `<packages_dir>/<key>/Private/Content`.
pub fn package_content_dir(packages_dir: &Path, package_key: &str) -> PathBuf {
    packages_dir.join(package_key).join("Private").join("Content")
}

/// Locate an import document, either a plain path or a file inside a package.
pub fn resolve_import_file(
    capabilities: &dyn CapabilityRegistry,
    packages_dir: &Path,
    package_key: Option<&str>,
    path_or_filename: &str,
) -> Result<DocumentSource> {
    let full_path = match package_key {
        None => PathBuf::from(path_or_filename),
        Some(key) => {
            if !capabilities.is_package_active(key) {
                return Err(Error::PackageNotActive(key.to_string()));
            }
            package_content_dir(packages_dir, key).join(path_or_filename)
        }
    };
    if !full_path.is_file() {
        return Err(Error::DocumentNotFound(full_path));
    }
    Ok(DocumentSource::File(full_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::InstalledPackages;
    use crate::error::ErrorKind;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root>
  <partial rootKey="Acme.SiteA" rootName="site-a" info="t" sourcePath="site-a/section/page"
           sourceIdentifier="id-1" sourceName="Page" sourceType="Site:Page">
    <node identifier="id-1" name="page" type="Site:Page"><node identifier="id-2" name="c" type="Site:Text"/></node>
  </partial>
  <extension package="graft/taxonomy" version="2.1.0">
    <vocabulary name="colors"><node identifier="v" name="colors" type="Graft.Taxonomy:Vocabulary"/></vocabulary>
  </extension>
  <extension package="acme/other" version="1.0"/>
</root>"#;

    #[test]
    fn test_find_header_and_extensions() {
        let source = DocumentSource::Text(DOC.to_string());
        let mut reader = source.reader().unwrap();

        let position = find_header(&mut reader).unwrap();
        assert!(position.has_payload);
        assert_eq!(position.header.source_path, "site-a/section/page");
        assert_eq!(position.header.root_key, "Acme.SiteA");

        let first = next_extension(&mut reader).unwrap().unwrap();
        assert_eq!(first.package, "graft/taxonomy");
        assert_eq!(first.version, "2.1.0");

        let second = next_extension(&mut reader).unwrap().unwrap();
        assert_eq!(second.package, "acme/other");
        assert!(!second.has_payload);

        assert!(next_extension(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_missing_header_is_malformed() {
        let source = DocumentSource::Text("<root><other/></root>".to_string());
        let mut reader = source.reader().unwrap();
        let err = find_header(&mut reader).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    }

    #[test]
    fn test_missing_attribute() {
        let source = DocumentSource::Text(
            r#"<root><partial rootKey="k" rootName="s" sourcePath="s/a" sourceName="A" sourceType="T"/></root>"#
                .to_string(),
        );
        let mut reader = source.reader().unwrap();
        match find_header(&mut reader) {
            Err(Error::MissingMetadata(name)) => assert_eq!(name, ATTR_SOURCE_IDENTIFIER),
            other => panic!("unexpected result: {:?}", other.map(|p| p.header)),
        }
    }

    #[test]
    fn test_filenames() {
        assert_eq!(ensure_xml_suffix("export"), "export.xml");
        assert_eq!(ensure_xml_suffix("export.xml"), "export.xml");
        assert_eq!(default_filename("page"), "PartialContent-page.xml");
        assert_eq!(
            resources_dir_for(Path::new("/tmp/out/doc.xml")),
            PathBuf::from("/tmp/out/Resources")
        );
    }

    #[test]
    fn test_resolve_import_file() {
        let temp = tempfile::tempdir().unwrap();
        let packages_dir = temp.path().join("packages");
        let content = package_content_dir(&packages_dir, "Acme.Site");
        std::fs::create_dir_all(&content).unwrap();
        std::fs::write(content.join("doc.xml"), DOC).unwrap();

        let inactive = InstalledPackages::new();
        let err = resolve_import_file(&inactive, &packages_dir, Some("Acme.Site"), "doc.xml")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PackageNotActive);

        let active = InstalledPackages::new().with_active("Acme.Site");
        let source =
            resolve_import_file(&active, &packages_dir, Some("Acme.Site"), "doc.xml").unwrap();
        assert_eq!(source.resource_dir().unwrap(), content.join(RESOURCES_DIR));

        let err = resolve_import_file(&active, &packages_dir, Some("Acme.Site"), "missing.xml")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentNotFound);

        let err = resolve_import_file(&active, &packages_dir, None, "/nonexistent/doc.xml")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentNotFound);
    }
}

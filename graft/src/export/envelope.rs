//! Writes the partial export document.
//!
//! Order on the wire: XML declaration, `root`, `partial` header with the
//! delegated subtree payload, then one `extension` block per requested
//! extension. All validation happens in [`ExportEnvelopeBuilder::prepare`],
//! so a failing export writes nothing.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use super::types::{ExportDestination, ExportOutput, ExportRequest, ExportSummary, PreparedExport};
use crate::capability::CapabilityRegistry;
use crate::codec::{TreeCodec, XmlSink};
use crate::config::default_info;
use crate::document::{
    default_filename, ensure_xml_suffix, package_content_dir, resources_dir_for, DocumentHeader,
    ATTR_PACKAGE, ATTR_VERSION, EXTENSION_ELEMENT, PARTIAL_ELEMENT, ROOT_ELEMENT,
};
use crate::error::{Error, Result};
use crate::extension::{Extension, ExtensionRegistry};

pub struct ExportEnvelopeBuilder<'a> {
    codec: &'a dyn TreeCodec,
    capabilities: &'a dyn CapabilityRegistry,
    packages_dir: PathBuf,
    info: String,
}

impl<'a> ExportEnvelopeBuilder<'a> {
    pub fn new(codec: &'a dyn TreeCodec, capabilities: &'a dyn CapabilityRegistry) -> Self {
        Self {
            codec,
            capabilities,
            packages_dir: PathBuf::from("packages"),
            info: default_info(),
        }
    }

    pub fn with_packages_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.packages_dir = dir.into();
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Resolve and validate everything the document depends on.
    pub fn prepare(&self, request: &ExportRequest) -> Result<PreparedExport> {
        let root_name = request.source.root_name();
        let mut contexts = self.codec.root_containers(root_name);
        if contexts.len() != 1 {
            return Err(Error::RootNotFound(root_name.to_string()));
        }
        let context = contexts.remove(0);

        let registry = ExtensionRegistry::new(self.capabilities);
        let mut extensions = Vec::with_capacity(request.extensions.len());
        for extension in &request.extensions {
            let version = registry
                .installed_version(*extension)
                .ok_or_else(|| Error::ExtensionNotInstalled(extension.id().to_string()))?;
            if !extensions.iter().any(|(e, _)| e == extension) {
                extensions.push((*extension, version));
            }
        }

        let full_path = request.source.full_path();
        let node = self
            .codec
            .lookup_by_path(&context, &full_path)
            .ok_or_else(|| Error::SourceNodeNotFound(full_path.clone()))?;
        debug!(path = %full_path, identifier = %node.identifier, "Resolved export source");

        let header = DocumentHeader {
            root_key: context.resources_key.clone(),
            root_name: context.node_name.clone(),
            info: self.info.clone(),
            source_path: request.source.to_string(),
            source_identifier: node.identifier.clone(),
            source_name: node.label.clone(),
            source_type: node.node_type.clone(),
        };

        Ok(PreparedExport {
            header,
            source: request.source.clone(),
            workspace: context.workspace,
            node_type_filter: request.node_type_filter.clone(),
            extensions,
        })
    }

    /// Stream the document for `prepared` into `out`.
    pub fn write_document<W: Write>(
        &self,
        prepared: &PreparedExport,
        out: W,
        tidy: bool,
        resource_dir: Option<&Path>,
    ) -> Result<()> {
        let mut out = out;
        let sink: &mut dyn Write = &mut out;
        let mut writer = if tidy {
            Writer::new_with_indent(sink, b' ', 2)
        } else {
            Writer::new(sink)
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;

        writer.write_event(Event::Start(prepared.header.to_start()))?;
        self.codec.serialize_subtree(
            &prepared.source.full_path(),
            &prepared.workspace,
            &mut writer,
            prepared.node_type_filter.as_ref(),
            resource_dir,
        )?;
        writer.write_event(Event::End(BytesEnd::new(PARTIAL_ELEMENT)))?;

        for (extension, version) in &prepared.extensions {
            self.write_extension(&mut writer, prepared, *extension, version, resource_dir)?;
        }

        writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
        writer.get_mut().flush()?;
        Ok(())
    }

    fn write_extension(
        &self,
        writer: &mut XmlSink<'_>,
        prepared: &PreparedExport,
        extension: Extension,
        version: &str,
        resource_dir: Option<&Path>,
    ) -> Result<()> {
        let mut start = BytesStart::new(EXTENSION_ELEMENT);
        start.push_attribute((ATTR_PACKAGE, extension.id()));
        start.push_attribute((ATTR_VERSION, version));
        writer.write_event(Event::Start(start))?;

        let registry = ExtensionRegistry::new(self.capabilities);
        match registry.locate_side_tree(extension, self.codec) {
            Some(root) => {
                let members = self
                    .codec
                    .child_nodes(&root)
                    .into_iter()
                    .filter(|n| n.node_type == extension.member_type());
                for member in members {
                    let mut element = BytesStart::new(extension.member_element());
                    element.push_attribute(("name", member.name.as_str()));
                    writer.write_event(Event::Start(element))?;
                    self.codec.serialize_subtree(
                        &member.path,
                        &prepared.workspace,
                        writer,
                        None,
                        resource_dir,
                    )?;
                    writer.write_event(Event::End(BytesEnd::new(extension.member_element())))?;
                }
            }
            None => warn!(
                extension = %extension,
                root = extension.side_tree_root(),
                "Side tree not found, writing an empty extension block"
            ),
        }

        writer.write_event(Event::End(BytesEnd::new(EXTENSION_ELEMENT)))?;
        Ok(())
    }

    /// Export into a file. Resources go to the sibling `Resources`
    /// directory. The document only appears at `path` once complete.
    #[instrument(skip(self, request), fields(source = %request.source))]
    pub fn export_to_file(&self, request: &ExportRequest, path: &Path) -> Result<ExportSummary> {
        let prepared = self.prepare(request)?;

        let resource_dir = resources_dir_for(path);
        fs::create_dir_all(&resource_dir)?;
        let dir = parent_dir(path);
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        self.write_document(
            &prepared,
            BufWriter::new(temp.as_file_mut()),
            request.tidy,
            Some(&resource_dir),
        )?;
        temp.persist(path)?;

        info!(
            identifier = %prepared.header.source_identifier,
            extensions = prepared.extensions.len(),
            "Partial export written"
        );
        Ok(ExportSummary {
            source: prepared.source,
            source_identifier: prepared.header.source_identifier,
            document: path.to_path_buf(),
            resource_dir,
            extensions: prepared.extensions,
        })
    }

    /// Export into `Private/Content` of an active package.
    pub fn export_to_package(
        &self,
        request: &ExportRequest,
        package_key: &str,
        filename: Option<&str>,
    ) -> Result<ExportSummary> {
        if !self.capabilities.is_package_active(package_key) {
            return Err(Error::PackageNotActive(package_key.to_string()));
        }
        let filename = match filename {
            Some(name) => ensure_xml_suffix(name),
            None => default_filename(request.source.leaf()),
        };
        let path = package_content_dir(&self.packages_dir, package_key).join(filename);
        self.export_to_file(request, &path)
    }

    /// Export into a string, resources inlined.
    #[instrument(skip(self, request), fields(source = %request.source))]
    pub fn export_to_string(&self, request: &ExportRequest) -> Result<String> {
        let prepared = self.prepare(request)?;
        let mut buf = Vec::new();
        self.write_document(&prepared, &mut buf, request.tidy, None)?;
        String::from_utf8(buf).map_err(|e| Error::Codec(e.to_string()))
    }

    pub fn export(
        &self,
        request: &ExportRequest,
        destination: &ExportDestination,
    ) -> Result<ExportOutput> {
        match destination {
            ExportDestination::File(path) => {
                self.export_to_file(request, path).map(ExportOutput::Written)
            }
            ExportDestination::Package {
                package_key,
                filename,
            } => self
                .export_to_package(request, package_key, filename.as_deref())
                .map(ExportOutput::Written),
            ExportDestination::Text => self.export_to_string(request).map(ExportOutput::Text),
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

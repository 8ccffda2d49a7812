//! Node payload codec.
//!
//! ```text
//! <node identifier= name= type=>
//!   <property name= value=/>
//!   <resource name= file=/>                     resource copied to the resource dir
//!   <resource name= encoding="base64" data=/>   resource inlined
//!   <node ...>...</node>
//! </node>
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use graft::codec::{XmlSink, XmlSource};
use graft::document::{optional_attribute, required_attribute};
use graft::{NodeInfo, NodeTypeFilter, RootContext, TreeCodec};

use crate::error::{Result, StoreError};
use crate::node::{child_path, NodeRecord};
use crate::store::{asset_file_name, is_plain_file_name, ContentStore};

pub const NODE_ELEMENT: &str = "node";
pub const PROPERTY_ELEMENT: &str = "property";
pub const RESOURCE_ELEMENT: &str = "resource";

const BASE64_ENCODING: &str = "base64";

impl TreeCodec for ContentStore {
    fn root_containers(&self, node_name: &str) -> Vec<RootContext> {
        self.sites()
            .iter()
            .filter(|site| site.node_name == node_name)
            .map(|site| RootContext {
                node_name: site.node_name.clone(),
                name: site.name.clone(),
                resources_key: site.resources_package_key.clone(),
                workspace: self.workspace().to_string(),
            })
            .collect()
    }

    fn node_at(&self, path: &str) -> Option<NodeInfo> {
        self.info(path)
    }

    fn lookup_by_identifier(&self, context: &RootContext, identifier: &str) -> Option<NodeInfo> {
        self.find_by_identifier(identifier, |path| context.contains(path))
    }

    fn child_nodes(&self, path: &str) -> Vec<NodeInfo> {
        self.children(path)
    }

    fn serialize_subtree(
        &self,
        path: &str,
        workspace: &str,
        sink: &mut XmlSink<'_>,
        filter: Option<&NodeTypeFilter>,
        resource_dir: Option<&Path>,
    ) -> graft::Result<()> {
        if !self.contains_path(path) {
            return Err(StoreError::NotFound(path.to_string()).into());
        }
        debug!(path, workspace, "Serializing subtree");
        if let Some(dir) = resource_dir {
            fs::create_dir_all(dir)?;
        }
        self.write_node(path, sink, filter, resource_dir)?;
        Ok(())
    }

    fn deserialize_subtree(
        &mut self,
        source: &mut XmlSource,
        target_path: &str,
        resource_dir: Option<&Path>,
    ) -> graft::Result<Option<NodeInfo>> {
        if !self.contains_path(target_path) {
            return Err(StoreError::NotFound(target_path.to_string()).into());
        }

        let mut first = None;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let (start, has_body) = match source.read_event_into(&mut buf)? {
                Event::Start(e) => (e.into_owned(), true),
                Event::Empty(e) => (e.into_owned(), false),
                Event::End(_) => break,
                Event::Eof => {
                    return Err(StoreError::Malformed("unexpected end of document".to_string()).into())
                }
                _ => continue,
            };

            if start.name().as_ref() != NODE_ELEMENT.as_bytes() {
                if has_body {
                    skip_element(source, &start)?;
                }
                continue;
            }
            let node = self.read_node(source, &start, has_body, target_path, resource_dir)?;
            if first.is_none() {
                first = Some(node);
            }
        }
        Ok(first)
    }

    fn ensure_workspace(&mut self, name: &str) -> graft::Result<bool> {
        Ok(self.add_workspace(name))
    }
}

impl ContentStore {
    fn write_node(
        &self,
        path: &str,
        sink: &mut XmlSink<'_>,
        filter: Option<&NodeTypeFilter>,
        resource_dir: Option<&Path>,
    ) -> Result<()> {
        let record = self
            .node(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let info = record.to_info(path);

        let mut start = BytesStart::new(NODE_ELEMENT);
        start.push_attribute(("identifier", record.identifier.as_str()));
        start.push_attribute(("name", info.name.as_str()));
        start.push_attribute(("type", record.node_type.as_str()));
        sink.write_event(Event::Start(start))?;

        for (key, value) in &record.properties {
            let mut property = BytesStart::new(PROPERTY_ELEMENT);
            property.push_attribute(("name", key.as_str()));
            property.push_attribute(("value", value.as_str()));
            sink.write_event(Event::Empty(property))?;
        }

        for (name, file) in &record.resources {
            if let Some(resource) = self.export_resource(name, file, resource_dir)? {
                sink.write_event(Event::Empty(resource))?;
            }
        }

        for child in self.children(path) {
            if filter.is_some_and(|f| !f.matches(&child.node_type)) {
                debug!(path = %child.path, node_type = %child.node_type, "Skipping filtered node");
                continue;
            }
            self.write_node(&child.path, sink, filter, resource_dir)?;
        }

        sink.write_event(Event::End(BytesEnd::new(NODE_ELEMENT)))?;
        Ok(())
    }

    fn export_resource(
        &self,
        name: &str,
        file: &str,
        resource_dir: Option<&Path>,
    ) -> Result<Option<BytesStart<'static>>> {
        let asset = self.assets_dir().join(file);
        if !asset.is_file() {
            warn!(resource = name, asset = %asset.display(), "Resource asset missing, skipped");
            return Ok(None);
        }

        let mut element = BytesStart::new(RESOURCE_ELEMENT);
        element.push_attribute(("name", name));
        match resource_dir {
            Some(dir) => {
                fs::copy(&asset, dir.join(file))?;
                element.push_attribute(("file", file));
            }
            None => {
                let data = STANDARD.encode(fs::read(&asset)?);
                element.push_attribute(("encoding", BASE64_ENCODING));
                element.push_attribute(("data", data.as_str()));
            }
        }
        Ok(Some(element))
    }

    /// Materialize one `node` element below `parent`, overwriting an existing
    /// node at the same path. Its children already in the store are kept.
    fn read_node(
        &mut self,
        source: &mut XmlSource,
        start: &BytesStart<'_>,
        has_body: bool,
        parent: &str,
        resource_dir: Option<&Path>,
    ) -> Result<NodeInfo> {
        let identifier = required(start, "identifier")?;
        let name = required(start, "name")?;
        let node_type = required(start, "type")?;
        let path = child_path(parent, &name);

        let overwritten = match self.node(&path) {
            Some(existing) if existing.identifier != identifier => {
                return Err(StoreError::AlreadyExists(format!(
                    "{} holds {}, refusing to overwrite it with {}",
                    path, existing.identifier, identifier
                )));
            }
            Some(_) => true,
            None => false,
        };
        let info = self.put_node(&path, NodeRecord::new(identifier, node_type))?;
        debug!(path = %path, overwritten, "Imported node");

        if !has_body {
            return Ok(info);
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let (element, has_body) = match source.read_event_into(&mut buf)? {
                Event::Start(e) => (e.into_owned(), true),
                Event::Empty(e) => (e.into_owned(), false),
                Event::End(_) => break,
                Event::Eof => {
                    return Err(StoreError::Malformed(format!("unterminated node {}", path)))
                }
                _ => continue,
            };

            match element.name().as_ref() {
                b"node" => {
                    self.read_node(source, &element, has_body, &path, resource_dir)?;
                }
                b"property" => {
                    let key = required(&element, "name")?;
                    let value = optional(&element, "value")?.unwrap_or_default();
                    if let Some(record) = self.record_mut(&path) {
                        record.properties.insert(key, value);
                    }
                    if has_body {
                        skip_element(source, &element)?;
                    }
                }
                b"resource" => {
                    self.import_resource(&path, &info.identifier, &element, resource_dir)?;
                    if has_body {
                        skip_element(source, &element)?;
                    }
                }
                _ => {
                    if has_body {
                        skip_element(source, &element)?;
                    }
                }
            }
        }

        Ok(self.info(&path).unwrap_or(info))
    }

    fn import_resource(
        &mut self,
        path: &str,
        identifier: &str,
        element: &BytesStart<'_>,
        resource_dir: Option<&Path>,
    ) -> Result<()> {
        let name = required(element, "name")?;
        let encoding = optional(element, "encoding")?;

        let (file, data) = match encoding.as_deref() {
            Some(BASE64_ENCODING) => {
                let encoded = required(element, "data")?;
                let data = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| StoreError::Resource {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                (asset_file_name(identifier, &name), data)
            }
            Some(other) => {
                return Err(StoreError::Resource {
                    name,
                    reason: format!("unsupported encoding {}", other),
                })
            }
            None => {
                let file = required(element, "file")?;
                if !is_plain_file_name(&file) {
                    return Err(StoreError::Resource {
                        name,
                        reason: format!("file {:?} is not a plain file name", file),
                    });
                }
                let Some(dir) = resource_dir else {
                    warn!(resource = %name, "No resource directory, resource skipped");
                    return Ok(());
                };
                let origin = dir.join(&file);
                if !origin.is_file() {
                    warn!(resource = %name, file = %origin.display(), "Resource file missing, skipped");
                    return Ok(());
                }
                let data = fs::read(&origin)?;
                (file, data)
            }
        };

        fs::create_dir_all(self.assets_dir())?;
        fs::write(self.assets_dir().join(&file), data)?;
        if let Some(record) = self.record_mut(path) {
            record.resources.insert(name, file);
        }
        Ok(())
    }
}

fn required(start: &BytesStart<'_>, name: &str) -> Result<String> {
    required_attribute(start, name).map_err(|_| {
        StoreError::Malformed(format!(
            "<{}> without \"{}\"",
            String::from_utf8_lossy(start.name().as_ref()),
            name
        ))
    })
}

fn optional(start: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    optional_attribute(start, name).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn skip_element(source: &mut XmlSource, start: &BytesStart<'_>) -> Result<()> {
    let end = start.to_end().into_owned();
    let mut skipped = Vec::new();
    source.read_to_end_into(end.name(), &mut skipped)?;
    Ok(())
}

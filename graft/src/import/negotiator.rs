use quick_xml::events::Event;
use tracing::{debug, error, info, instrument, warn};

use super::observer::ImportObserver;
use super::plan::{ImportPlan, ImportedRoot, TargetDecision};
use crate::address::Address;
use crate::capability::CapabilityRegistry;
use crate::codec::{NodeInfo, RootContext, TreeCodec, XmlSource};
use crate::config::default_workspace;
use crate::document::{find_header, next_extension, DocumentHeader, DocumentSource};
use crate::error::{Error, Result};
use crate::extension::{Extension, ExtensionAcceptance, ExtensionRegistry};
use crate::resolver::{RootSelector, SegmentPathResolver};

pub struct ImportNegotiator<'a> {
    codec: &'a mut dyn TreeCodec,
    capabilities: &'a dyn CapabilityRegistry,
    workspace: String,
    observers: Vec<Box<dyn ImportObserver>>,
}

impl<'a> ImportNegotiator<'a> {
    pub fn new(codec: &'a mut dyn TreeCodec, capabilities: &'a dyn CapabilityRegistry) -> Self {
        Self {
            codec,
            capabilities,
            workspace: default_workspace(),
            observers: Vec::new(),
        }
    }

    /// Workspace bootstrapped on commit when the store has none.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_observer(mut self, observer: impl ImportObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Read the document skeleton and decide how it would be imported.
    /// Never mutates the store.
    #[instrument(skip(self, source), fields(document = %source.describe()))]
    pub fn preflight(
        &self,
        source: &DocumentSource,
        explicit_target: Option<&str>,
    ) -> Result<ImportPlan> {
        let mut reader = source.reader()?;
        let header = find_header(&mut reader)?.header;
        debug!(
            identifier = %header.source_identifier,
            source_path = %header.source_path,
            "Read document header"
        );

        let (candidate, default_target) = match explicit_target {
            Some(path) => (Address::parse(path)?, false),
            None => (default_target_for(&header)?, true),
        };

        let codec: &dyn TreeCodec = &*self.codec;
        let context = SegmentPathResolver::new(codec).resolve_root_context(&header.root_name)?;
        let decision = self.decide(&context, &header, candidate)?;

        let registry = ExtensionRegistry::new(self.capabilities);
        let mut extensions = Vec::new();
        while let Some(block) = next_extension(&mut reader)? {
            let acceptance = registry
                .assess(&block.package, &block.version)
                .into_result()?;
            if let ExtensionAcceptance::VersionMismatchWarning {
                installed, declared, ..
            } = &acceptance
            {
                warn!(
                    package = %block.package,
                    installed = %installed,
                    declared = %declared,
                    "Extension version differs from the installed one"
                );
            }
            extensions.push(acceptance);
        }

        info!(
            target = %decision.target(),
            merge = decision.is_merge(),
            extensions = extensions.len(),
            "Preflight complete"
        );
        Ok(ImportPlan {
            header,
            decision,
            extensions,
            default_target,
        })
    }

    /// Nodes from the root container down to the plan's target, for
    /// showing where an import would land.
    pub fn placement(&self, plan: &ImportPlan) -> Result<Vec<NodeInfo>> {
        let codec: &dyn TreeCodec = &*self.codec;
        let target = plan.target().to_string();
        SegmentPathResolver::new(codec).all_nodes_on_path(RootSelector::Infer, &target)
    }

    fn decide(
        &self,
        context: &RootContext,
        header: &DocumentHeader,
        candidate: Address,
    ) -> Result<TargetDecision> {
        if let Some(node) = self
            .codec
            .lookup_by_identifier(context, &header.source_identifier)
        {
            let existing = Address::parse(&self.codec.current_address(&node))?;
            let parent = self
                .codec
                .parent_address(&node)
                .and_then(|path| Address::parse(&path).ok());
            let renamed = Address::parse(&header.source_path)
                .map(|source| source.leaf() != existing.leaf())
                .unwrap_or(true);
            return match parent {
                Some(parent) if !renamed && (candidate == existing || candidate == parent) => {
                    debug!(existing = %existing, "Node exists, merging");
                    Ok(TargetDecision::Merge { existing, parent })
                }
                _ => Err(Error::ConflictingTarget {
                    target: candidate.to_string(),
                    existing: existing.to_string(),
                }),
            };
        }

        if self.codec.node_at(&candidate.full_path()).is_none() {
            return Err(Error::TargetNotFound(candidate.to_string()));
        }
        Ok(TargetDecision::Create {
            target: candidate,
            name: header.source_name.clone(),
            node_type: header.source_type.clone(),
        })
    }

    /// Materialize the primary block according to `plan`.
    ///
    /// `confirmed` lists the extensions whose version mismatch the caller
    /// accepted; every warning in the plan must be covered.
    #[instrument(skip(self, source, plan), fields(document = %source.describe()))]
    pub fn commit(
        &mut self,
        source: &DocumentSource,
        plan: &ImportPlan,
        confirmed: &[Extension],
    ) -> Result<ImportedRoot> {
        let imported = self.commit_primary(source, plan, confirmed).inspect_err(|e| {
            error!(error = %e, kind = %e.kind(), "Import commit failed");
        })?;
        for observer in &self.observers {
            observer.on_imported(&imported);
        }
        Ok(imported)
    }

    fn commit_primary(
        &mut self,
        source: &DocumentSource,
        plan: &ImportPlan,
        confirmed: &[Extension],
    ) -> Result<ImportedRoot> {
        for acceptance in &plan.extensions {
            check_confirmed(acceptance, confirmed)?;
        }

        if self.codec.ensure_workspace(&self.workspace)? {
            info!(workspace = %self.workspace, "Created workspace");
        }

        let mut reader = source.reader()?;
        let position = find_header(&mut reader)?;
        let header = position.header;
        if header.source_identifier != plan.header.source_identifier {
            return Err(Error::MalformedDocument(format!(
                "document identifier {} does not match the plan ({})",
                header.source_identifier, plan.header.source_identifier
            )));
        }

        let root = self.local_root(&header)?;
        if !position.has_payload {
            return Err(Error::ImportIncomplete("document has no payload".to_string()));
        }

        let resource_dir = source.resource_dir();
        let target_path = plan.target().full_path();
        let node = self
            .codec
            .deserialize_subtree(&mut reader, &target_path, resource_dir.as_deref())?
            .ok_or_else(|| {
                Error::ImportIncomplete(format!("nothing was imported below {}", target_path))
            })?;

        info!(identifier = %node.identifier, path = %node.path, "Primary block imported");
        Ok(ImportedRoot {
            root,
            node,
            decision: plan.decision.clone(),
        })
    }

    fn local_root(&self, header: &DocumentHeader) -> Result<RootContext> {
        let mut roots = self.codec.root_containers(&header.root_name);
        match roots.len() {
            0 => Err(Error::RootNotFound(header.root_name.clone())),
            1 => {
                let root = roots.remove(0);
                if root.resources_key != header.root_key {
                    return Err(Error::RootKeyMismatch {
                        local: root.resources_key,
                        document: header.root_key.clone(),
                    });
                }
                Ok(root)
            }
            matches => Err(Error::AmbiguousOrMissingRoot {
                name: header.root_name.clone(),
                matches,
            }),
        }
    }

    /// Re-import the side tree carried by `extension`'s block. Returns the
    /// number of members written. Independent of [`commit`](Self::commit).
    #[instrument(skip(self, source, plan, confirmed), fields(document = %source.describe()))]
    pub fn commit_extension(
        &mut self,
        source: &DocumentSource,
        plan: &ImportPlan,
        extension: Extension,
        confirmed: &[Extension],
    ) -> Result<usize> {
        let acceptance = plan.acceptance(extension).ok_or_else(|| {
            Error::MalformedDocument(format!("no {} block in the plan", extension))
        })?;
        check_confirmed(acceptance, confirmed)?;

        let root = ExtensionRegistry::new(self.capabilities)
            .locate_side_tree(extension, &*self.codec)
            .ok_or_else(|| Error::TargetNotFound(extension.side_tree_root().to_string()))?;

        let mut reader = source.reader()?;
        find_header(&mut reader)?;
        let block = loop {
            match next_extension(&mut reader)? {
                Some(block) if block.package == extension.id() => break block,
                Some(_) => continue,
                None => {
                    return Err(Error::MalformedDocument(format!(
                        "no {} block in the document",
                        extension
                    )))
                }
            }
        };
        if !block.has_payload {
            return Ok(0);
        }

        let resource_dir = source.resource_dir();
        let count = self.import_members(&mut reader, extension, &root, resource_dir.as_deref())?;
        info!(extension = %extension, members = count, "Extension block imported");
        Ok(count)
    }

    fn import_members(
        &mut self,
        reader: &mut XmlSource,
        extension: Extension,
        root: &str,
        resource_dir: Option<&std::path::Path>,
    ) -> Result<usize> {
        let member = extension.member_element().as_bytes();
        let mut count = 0;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let skip = match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.name().as_ref() == member => None,
                Event::Start(e) => Some(e.to_end().into_owned()),
                Event::End(_) => return Ok(count),
                Event::Eof => {
                    return Err(Error::MalformedDocument(format!(
                        "unterminated {} block",
                        extension
                    )))
                }
                _ => continue,
            };
            match skip {
                Some(end) => {
                    let mut skipped = Vec::new();
                    reader.read_to_end_into(end.name(), &mut skipped)?;
                }
                None => {
                    if self
                        .codec
                        .deserialize_subtree(reader, root, resource_dir)?
                        .is_some()
                    {
                        count += 1;
                    }
                }
            }
        }
    }
}

/// Derive the default target: the parent of the exported node.
fn default_target_for(header: &DocumentHeader) -> Result<Address> {
    let source = Address::parse(&header.source_path)?;
    let target = source.parent().ok_or_else(|| {
        Error::InvalidAddress(format!(
            "{} is a root container, a target path is required",
            header.source_path
        ))
    })?;
    warn!(target = %target, "No target given, importing below the original parent");
    Ok(target)
}

fn check_confirmed(acceptance: &ExtensionAcceptance, confirmed: &[Extension]) -> Result<()> {
    if let ExtensionAcceptance::VersionMismatchWarning {
        extension,
        installed,
        declared,
    } = acceptance
    {
        if !confirmed.contains(extension) {
            return Err(Error::UnconfirmedVersionMismatch {
                package: extension.id().to_string(),
                installed: installed.clone(),
                declared: declared.clone(),
            });
        }
    }
    Ok(())
}

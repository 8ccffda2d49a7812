//! Export command implementation.

use anyhow::{Context, Result};
use graft::document::ensure_xml_suffix;
use graft::{
    CapabilityRegistry, Config, Error, ExportDestination, ExportEnvelopeBuilder, ExportOutput,
    ExportRequest, Extension, ExtensionRegistry, NodeTypeFilter, RootSelector,
    SegmentPathResolver,
};
use graft_store::ContentStore;
use std::path::PathBuf;

use crate::confirm::{render_path, Prompt};

pub struct ExportArgs {
    pub source: String,
    pub site: Option<String>,
    pub filename: Option<String>,
    pub package_key: Option<String>,
    pub no_tidy: bool,
    pub node_type_filter: Option<String>,
    pub extensions: Vec<String>,
    pub no_detect_extensions: bool,
}

/// Run the export command.
pub fn run_export(
    config: &Config,
    store: &ContentStore,
    packages: &dyn CapabilityRegistry,
    args: ExportArgs,
    prompt: &Prompt,
) -> Result<()> {
    let mut extensions = args
        .extensions
        .iter()
        .map(|id| id.parse::<Extension>())
        .collect::<graft::Result<Vec<_>>>()?;

    let resolver = SegmentPathResolver::new(store);
    let selector = match &args.site {
        Some(site) => RootSelector::Name(site.as_str()),
        None => RootSelector::Infer,
    };
    let address = resolver
        .to_address(selector, &args.source)
        .with_context(|| format!("Unable to resolve {}", args.source))?
        .ok_or_else(|| Error::SourceNodeNotFound(args.source.clone()))?;

    let path = resolver.all_nodes_on_path(selector, &args.source)?;
    eprint!("{}", render_path(&path, "[EXPORT]"));
    if !prompt.confirm("Export this node and everything below it?")? {
        eprintln!("Export aborted");
        return Ok(());
    }

    if !args.no_detect_extensions {
        for (extension, version) in ExtensionRegistry::new(packages).installed() {
            if extensions.contains(&extension) {
                continue;
            }
            let question = format!(
                "{} {} is installed. {} Include it?",
                extension,
                version,
                extension.description()
            );
            if prompt.confirm(&question)? {
                extensions.push(extension);
            }
        }
    }

    let mut request = ExportRequest::new(address).with_tidy(config.export.tidy && !args.no_tidy);
    if let Some(filter) = &args.node_type_filter {
        request = request.with_filter(NodeTypeFilter::parse(filter));
    }
    for extension in extensions {
        request = request.with_extension(extension);
    }

    let destination = match (args.package_key, args.filename) {
        (Some(package_key), filename) => ExportDestination::Package {
            package_key,
            filename,
        },
        (None, Some(filename)) => ExportDestination::File(PathBuf::from(ensure_xml_suffix(&filename))),
        (None, None) => ExportDestination::Text,
    };

    let builder = ExportEnvelopeBuilder::new(store, packages)
        .with_packages_dir(&config.packages.dir)
        .with_info(&config.export.info);

    match builder.export(&request, &destination)? {
        ExportOutput::Written(summary) => {
            eprintln!(
                "Exported {} ({}) to {}",
                summary.source,
                summary.source_identifier,
                summary.document.display()
            );
            for (extension, version) in &summary.extensions {
                eprintln!("  with {} {}", extension, version);
            }
        }
        ExportOutput::Text(xml) => print!("{}", xml),
    }
    Ok(())
}

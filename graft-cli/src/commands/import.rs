//! Import command implementation.

use anyhow::{bail, Context, Result};
use graft::document::{ensure_xml_suffix, package_content_dir, resolve_import_file};
use graft::import::LoggingObserver;
use graft::{
    CapabilityRegistry, Config, DocumentSource, ExtensionAcceptance, ImportNegotiator, ImportPlan,
    NodeInfo, TargetDecision,
};
use graft_store::ContentStore;
use std::fs;
use std::path::Path;

use crate::confirm::Prompt;

pub struct ImportArgs {
    pub filename: Option<String>,
    pub package_key: Option<String>,
    pub target_path: Option<String>,
    pub dry_run: bool,
}

/// Run the import command.
pub fn run_import(
    config: &Config,
    store: &mut ContentStore,
    packages: &dyn CapabilityRegistry,
    args: ImportArgs,
    prompt: &Prompt,
) -> Result<()> {
    let source = locate_document(config, packages, &args)?;
    eprintln!("Importing {}", source.describe());

    let mut negotiator = ImportNegotiator::new(store, packages)
        .with_workspace(config.store.workspace.clone())
        .with_observer(LoggingObserver);

    let plan = negotiator.preflight(&source, args.target_path.as_deref())?;
    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let placement = negotiator.placement(&plan)?;
    eprint!("{}", render_plan(&plan, &placement));

    let mut confirmed = Vec::new();
    for warning in plan.warnings() {
        if let ExtensionAcceptance::VersionMismatchWarning {
            extension,
            installed,
            declared,
        } = warning
        {
            let question = format!(
                "{} is installed at version {} but the document was exported with {}. Import anyway?",
                extension, installed, declared
            );
            if !prompt.confirm(&question)? {
                eprintln!("Import aborted");
                return Ok(());
            }
            confirmed.push(*extension);
        }
    }
    if !prompt.confirm("Import?")? {
        eprintln!("Import aborted");
        return Ok(());
    }

    let imported = negotiator.commit(&source, &plan, &confirmed)?;
    eprintln!(
        "Imported {} ({}) at {}",
        imported.node.label, imported.node.identifier, imported.node.path
    );

    let mut failed = Vec::new();
    for extension in plan.extensions.iter().filter_map(ExtensionAcceptance::extension) {
        match negotiator.commit_extension(&source, &plan, extension, &confirmed) {
            Ok(members) => eprintln!("  {}: {} imported", extension, members),
            Err(e) => {
                tracing::error!(extension = %extension, error = %e, "Extension import failed");
                failed.push(extension);
            }
        }
    }
    drop(negotiator);

    store.save().context("Unable to save the store")?;
    if !failed.is_empty() {
        bail!(
            "Primary import saved, but {} extension block(s) failed; re-run the import to retry",
            failed.len()
        );
    }
    Ok(())
}

fn locate_document(
    config: &Config,
    packages: &dyn CapabilityRegistry,
    args: &ImportArgs,
) -> Result<DocumentSource> {
    let filename = match (&args.filename, &args.package_key) {
        (Some(filename), _) => ensure_xml_suffix(filename),
        (None, Some(package_key)) => {
            single_document(&package_content_dir(&config.packages.dir, package_key))?
        }
        (None, None) => bail!("Either --filename or --package-key is required"),
    };
    Ok(resolve_import_file(
        packages,
        &config.packages.dir,
        args.package_key.as_deref(),
        &filename,
    )?)
}

/// The only document in a package content directory.
fn single_document(dir: &Path) -> Result<String> {
    let mut names = Vec::new();
    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(".xml") {
                names.push(name);
            }
        }
    }
    match names.len() {
        1 => Ok(names.remove(0)),
        0 => bail!("No documents in {}", dir.display()),
        _ => {
            names.sort();
            bail!(
                "Several documents in {}, pick one with --filename: {}",
                dir.display(),
                names.join(", ")
            )
        }
    }
}

/// Placement preview: the nodes down to the target, then the imported node
/// marked `[MERGE]` or `[NEW]`.
fn render_plan(plan: &ImportPlan, placement: &[NodeInfo]) -> String {
    let mut out = String::new();
    for (depth, node) in placement.iter().enumerate() {
        out.push_str(&format!(
            "{}{} ({})\n",
            "  ".repeat(depth),
            node.label,
            node.node_type
        ));
    }
    let indent = "  ".repeat(placement.len());
    match &plan.decision {
        TargetDecision::Merge { .. } => {
            out.push_str(&format!(
                "{}[MERGE] {} ({})\n",
                indent, plan.header.source_name, plan.header.source_type
            ));
        }
        TargetDecision::Create {
            name, node_type, ..
        } => {
            out.push_str(&format!("{}[NEW] {} ({})\n", indent, name, node_type));
        }
    }
    if plan.default_target {
        out.push_str("(target derived from the exported node's original parent)\n");
    }
    out
}

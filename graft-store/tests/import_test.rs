//! Two-phase import tests against the reference store.

mod common;

use common::*;
use graft::{
    Address, DocumentSource, ErrorKind, ExportEnvelopeBuilder, ExportRequest, Extension,
    ExtensionAcceptance, ImportNegotiator, ImportObserver, ImportedRoot, TargetDecision,
    TreeCodec,
};
use graft_store::{ContentStore, NodeRecord};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Export `site-a/section/page` from the sample store into a file.
fn export_page(temp: &TempDir, taxonomy_version: Option<&str>) -> (ContentStore, DocumentSource) {
    let store = sample_store(&temp.path().join("assets"));
    let mut request = ExportRequest::new(Address::parse("site-a/section/page").unwrap());
    let packages = match taxonomy_version {
        Some(version) => {
            request = request.with_extension(Extension::Taxonomy);
            packages_with_taxonomy(version)
        }
        None => packages(),
    };
    let path = temp.path().join("export").join("page.xml");
    ExportEnvelopeBuilder::new(&store, &packages)
        .export_to_file(&request, &path)
        .unwrap();
    (store, DocumentSource::File(path))
}

fn document_text(source: &DocumentSource) -> String {
    match source {
        DocumentSource::File(path) => std::fs::read_to_string(path).unwrap(),
        DocumentSource::Text(text) => text.clone(),
    }
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl ImportObserver for Recorder {
    fn on_imported(&self, imported: &ImportedRoot) {
        self.0.borrow_mut().push(imported.node.path.clone());
    }
}

// ---------------------------------------------------------------------------
// Preflight
// ---------------------------------------------------------------------------

#[test]
fn test_preflight_merges_when_node_still_exists() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    assert!(plan.default_target);
    assert_eq!(
        plan.decision,
        TargetDecision::Merge {
            existing: Address::parse("site-a/section/page").unwrap(),
            parent: Address::parse("site-a/section").unwrap(),
        }
    );

    let plan = negotiator
        .preflight(&source, Some("/sites/site-a/section/page"))
        .unwrap();
    assert!(!plan.default_target);
    assert_eq!(plan.target().to_string(), "site-a/section");
}

#[test]
fn test_placement_lists_nodes_down_to_target() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    let placement = negotiator.placement(&plan).unwrap();
    let paths: Vec<_> = placement.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(paths, vec!["/sites/site-a", "/sites/site-a/section"]);
    assert_eq!(placement[0].label, "Site A");
}

#[test]
fn test_preflight_creates_when_node_was_deleted() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store.remove_subtree("/sites/site-a/section/page");
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    assert_eq!(
        plan.decision,
        TargetDecision::Create {
            target: Address::parse("site-a/section").unwrap(),
            name: "Page".to_string(),
            node_type: "Site:Page".to_string(),
        }
    );
    assert!(plan.extensions.is_empty());
}

#[test]
fn test_preflight_conflicts_with_moved_node() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store.remove_subtree("/sites/site-a/section/page");
    store
        .create_node("/sites/site-a/other", "page", NodeRecord::new("page-1", "Site:Page"))
        .unwrap();
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let err = negotiator.preflight(&source, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictingTarget);

    let plan = negotiator.preflight(&source, Some("site-a/other")).unwrap();
    assert!(plan.decision.is_merge());
}

#[test]
fn test_preflight_requires_existing_create_target() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store.remove_subtree("/sites/site-a/section");
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let err = negotiator.preflight(&source, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetNotFound);
}

#[test]
fn test_preflight_does_not_touch_store() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store.remove_subtree("/sites/site-a/section/page");
    let before = store.len();
    {
        let packages = packages();
        let negotiator = ImportNegotiator::new(&mut store, &packages);
        negotiator.preflight(&source, None).unwrap();
    }
    assert_eq!(store.len(), before);
    assert_eq!(store.workspaces().count(), 0);
}

#[test]
fn test_preflight_root_container_export_needs_target() {
    let temp = TempDir::new().unwrap();
    let store = sample_store(&temp.path().join("assets"));
    let packages = packages();
    let xml = ExportEnvelopeBuilder::new(&store, &packages)
        .export_to_string(&ExportRequest::new(Address::parse("site-a").unwrap()))
        .unwrap();

    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let negotiator = ImportNegotiator::new(&mut target, &packages);
    let err = negotiator
        .preflight(&DocumentSource::Text(xml), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAddress);
}

#[test]
fn test_preflight_unknown_root() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, None);
    let mut target = ContentStore::new(temp.path().join("target"));
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut target, &packages);

    let err = negotiator.preflight(&source, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousOrMissingRoot);
}

#[test]
fn test_preflight_malformed_documents() {
    let temp = TempDir::new().unwrap();
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut target, &packages);

    let err = negotiator
        .preflight(&DocumentSource::Text("<root></root>".to_string()), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);

    let missing = r#"<root><partial rootKey="Acme.SiteA" rootName="site-a" sourceIdentifier="page-1" sourceName="Page" sourceType="Site:Page"/></root>"#;
    let err = negotiator
        .preflight(&DocumentSource::Text(missing.to_string()), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingMetadata);

    let err = negotiator
        .preflight(&DocumentSource::File(PathBuf::from("/nonexistent/doc.xml")), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DocumentNotFound);
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

#[test]
fn test_version_mismatch_needs_confirmation() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, Some("2.0.0"));
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    add_taxonomies_root(&mut target);
    let packages = packages_with_taxonomy("2.1.0");
    let mut negotiator = ImportNegotiator::new(&mut target, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    assert!(plan.needs_confirmation());
    assert_eq!(
        plan.extensions,
        vec![ExtensionAcceptance::VersionMismatchWarning {
            extension: Extension::Taxonomy,
            installed: "2.1.0".to_string(),
            declared: "2.0.0".to_string(),
        }]
    );

    let err = negotiator.commit(&source, &plan, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnconfirmedVersionMismatch);
    let err = negotiator
        .commit_extension(&source, &plan, Extension::Taxonomy, &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnconfirmedVersionMismatch);

    let confirmed = [Extension::Taxonomy];
    negotiator.commit(&source, &plan, &confirmed).unwrap();
    let members = negotiator
        .commit_extension(&source, &plan, Extension::Taxonomy, &confirmed)
        .unwrap();
    assert_eq!(members, 1);
    drop(negotiator);

    assert!(target.node_at("/sites/site-a/section/page").is_some());
    assert!(target.node_at("/taxonomies/colors/red").is_some());
    assert!(target.node_at("/taxonomies/notes").is_none());
}

fn add_taxonomies_root(store: &mut ContentStore) {
    store
        .ensure_top_level("/taxonomies", "Graft.Taxonomy:Root")
        .unwrap();
}

#[test]
fn test_unconfirmed_commit_leaves_store_untouched() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, Some("2.0.0"));
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let before = target.len();
    {
        let packages = packages_with_taxonomy("2.1.0");
        let mut negotiator = ImportNegotiator::new(&mut target, &packages);
        let plan = negotiator.preflight(&source, None).unwrap();
        negotiator.commit(&source, &plan, &[]).unwrap_err();
    }
    assert_eq!(target.len(), before);
    assert_eq!(target.workspaces().count(), 0);
}

#[test]
fn test_extension_not_installed_locally() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, Some("2.1.0"));
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut target, &packages);

    let err = negotiator.preflight(&source, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExtensionNotInstalled);
}

#[test]
fn test_unsupported_extension_in_document() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, Some("2.1.0"));
    let xml = document_text(&source).replace("graft/taxonomy", "acme/unknown");
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let packages = packages_with_taxonomy("2.1.0");
    let negotiator = ImportNegotiator::new(&mut target, &packages);

    let err = negotiator
        .preflight(&DocumentSource::Text(xml), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedExtension);
}

#[test]
fn test_extension_commit_requires_side_tree_root() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, Some("2.1.0"));
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let packages = packages_with_taxonomy("2.1.0");
    let mut negotiator = ImportNegotiator::new(&mut target, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    assert!(!plan.needs_confirmation());
    let err = negotiator
        .commit_extension(&source, &plan, Extension::Taxonomy, &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetNotFound);
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[test]
fn test_commit_creates_subtree_with_resources() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, None);
    let target_assets = temp.path().join("target-assets");
    let mut target = empty_site(&target_assets, SITE_KEY);
    let packages = packages();
    let recorder = Recorder::default();

    let imported = {
        let mut negotiator =
            ImportNegotiator::new(&mut target, &packages).with_observer(recorder.clone());
        let plan = negotiator.preflight(&source, None).unwrap();
        assert!(!plan.decision.is_merge());
        negotiator.commit(&source, &plan, &[]).unwrap()
    };

    assert_eq!(imported.node.path, "/sites/site-a/section/page");
    assert_eq!(imported.node.identifier, "page-1");
    assert_eq!(imported.root.resources_key, SITE_KEY);
    assert_eq!(
        recorder.0.borrow().as_slice(),
        ["/sites/site-a/section/page".to_string()]
    );

    let text = target.node("/sites/site-a/section/page/text").unwrap();
    assert_eq!(text.properties["text"], "Hello");
    let asset = target_assets.join(&text.resources["image.png"]);
    assert_eq!(std::fs::read(asset).unwrap(), b"image-bytes");
    assert_eq!(target.workspaces().collect::<Vec<_>>(), vec!["live"]);
}

#[test]
fn test_commit_merges_into_current_parent() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store
        .set_property("/sites/site-a/section/page", "title", "Changed")
        .unwrap();
    let packages = packages();

    {
        let mut negotiator = ImportNegotiator::new(&mut store, &packages).with_workspace("user-test");
        let plan = negotiator
            .preflight(&source, Some("site-a/section/page"))
            .unwrap();
        let imported = negotiator.commit(&source, &plan, &[]).unwrap();
        assert_eq!(imported.node.label, "Page");
    }

    assert_eq!(store.node_at("/sites/site-a/section/page").unwrap().label, "Page");
    assert_eq!(store.workspaces().collect::<Vec<_>>(), vec!["user-test"]);
}

#[test]
fn test_commit_rejects_root_key_mismatch() {
    let temp = TempDir::new().unwrap();
    let (_, source) = export_page(&temp, None);
    let mut target = empty_site(&temp.path().join("target"), "Other.Key");
    let packages = packages();
    let mut negotiator = ImportNegotiator::new(&mut target, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    let err = negotiator.commit(&source, &plan, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RootKeyMismatch);
}

#[test]
fn test_commit_without_payload_is_incomplete() {
    let temp = TempDir::new().unwrap();
    let mut target = empty_site(&temp.path().join("target"), SITE_KEY);
    let before = target.len();
    let packages = packages();
    let header = r#"rootKey="Acme.SiteA" rootName="site-a" sourcePath="site-a/section/page" sourceIdentifier="page-1" sourceName="Page" sourceType="Site:Page""#;
    let documents = [
        format!("<root><partial {}/></root>", header),
        format!("<root><partial {}><note text=\"no nodes\"/></partial></root>", header),
    ];

    let mut negotiator = ImportNegotiator::new(&mut target, &packages);
    for document in documents {
        let source = DocumentSource::Text(document);
        let plan = negotiator.preflight(&source, None).unwrap();
        let err = negotiator.commit(&source, &plan, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImportIncomplete);
    }
    drop(negotiator);

    assert_eq!(target.len(), before);
    assert!(target.node("/sites/site-a/section/page").is_none());
}

#[test]
fn test_preflight_conflicts_with_renamed_node() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    let record = store.node("/sites/site-a/section/page").unwrap().clone();
    store.remove_subtree("/sites/site-a/section/page");
    store
        .create_node("/sites/site-a/section", "page-renamed", record)
        .unwrap();
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let err = negotiator.preflight(&source, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictingTarget);
    let err = negotiator
        .preflight(&source, Some("site-a/section/page-renamed"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictingTarget);
    drop(negotiator);

    assert!(store.node("/sites/site-a/section/page").is_none());
}

#[test]
fn test_commit_refuses_to_replace_unrelated_node() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store.remove_subtree("/sites/site-a/section/page");
    store
        .create_node(
            "/sites/site-a/section",
            "page",
            NodeRecord::new("someone-else", "Site:Page").with_property("title", "Theirs"),
        )
        .unwrap();
    let packages = packages();

    {
        let mut negotiator = ImportNegotiator::new(&mut store, &packages);
        let plan = negotiator.preflight(&source, None).unwrap();
        assert!(!plan.decision.is_merge());
        let err = negotiator.commit(&source, &plan, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    let page = store.node("/sites/site-a/section/page").unwrap();
    assert_eq!(page.identifier, "someone-else");
    assert_eq!(page.properties["title"], "Theirs");
}

#[test]
fn test_text_round_trip() {
    let temp = TempDir::new().unwrap();
    let store = sample_store(&temp.path().join("assets"));
    let packages = packages();
    let xml = ExportEnvelopeBuilder::new(&store, &packages)
        .export_to_string(&ExportRequest::new(
            Address::parse("site-a/section/page").unwrap(),
        ))
        .unwrap();

    let target_assets = temp.path().join("target-assets");
    let mut target = empty_site(&target_assets, SITE_KEY);
    let source = DocumentSource::Text(xml);
    {
        let mut negotiator = ImportNegotiator::new(&mut target, &packages);
        let plan = negotiator.preflight(&source, None).unwrap();
        negotiator.commit(&source, &plan, &[]).unwrap();
    }

    let text = target.node("/sites/site-a/section/page/text").unwrap();
    let asset = target_assets.join(&text.resources["image.png"]);
    assert_eq!(std::fs::read(asset).unwrap(), b"image-bytes");
}

#[test]
fn test_plan_serializes_for_dry_run() {
    let temp = TempDir::new().unwrap();
    let (mut store, source) = export_page(&temp, None);
    store.remove_subtree("/sites/site-a/section/page");
    let packages = packages();
    let negotiator = ImportNegotiator::new(&mut store, &packages);

    let plan = negotiator.preflight(&source, None).unwrap();
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["decision"]["action"], "create");
    assert_eq!(json["decision"]["target"], "site-a/section");
    assert_eq!(json["header"]["source_identifier"], "page-1");
}

//! Shared fixtures for the store integration tests.

#![allow(dead_code)]

use graft::InstalledPackages;
use graft_store::{ContentStore, NodeRecord};
use std::path::Path;

pub const SITE: &str = "site-a";
pub const SITE_KEY: &str = "Acme.SiteA";
pub const TAXONOMY: &str = "graft/taxonomy";
pub const VOCABULARY_TYPE: &str = "Graft.Taxonomy:Vocabulary";

/// Store with
///
/// ```text
/// /sites/site-a
///   section
///     page        (page-1, "Page")
///       text      (text-1, with image.png)
///   other
/// /taxonomies
///   colors        (vocabulary)
///     red
///   notes         (not a vocabulary)
/// ```
pub fn sample_store(assets: &Path) -> ContentStore {
    let mut store = ContentStore::new(assets);
    store.add_site(SITE, "Site A", SITE_KEY).unwrap();
    store
        .create_node("/sites/site-a", "section", NodeRecord::new("section-1", "Site:Section"))
        .unwrap();
    store
        .create_node(
            "/sites/site-a/section",
            "page",
            NodeRecord::new("page-1", "Site:Page").with_property("title", "Page"),
        )
        .unwrap();
    store
        .create_node(
            "/sites/site-a/section/page",
            "text",
            NodeRecord::new("text-1", "Site:Text").with_property("text", "Hello"),
        )
        .unwrap();
    store
        .attach_resource("/sites/site-a/section/page/text", "image.png", b"image-bytes")
        .unwrap();
    store
        .create_node("/sites/site-a", "other", NodeRecord::new("other-1", "Site:Section"))
        .unwrap();
    add_taxonomies(&mut store);
    store
}

pub fn add_taxonomies(store: &mut ContentStore) {
    store
        .ensure_top_level("/taxonomies", "Graft.Taxonomy:Root")
        .unwrap();
    store
        .create_node(
            "/taxonomies",
            "colors",
            NodeRecord::new("colors-1", VOCABULARY_TYPE).with_property("title", "Colors"),
        )
        .unwrap();
    store
        .create_node("/taxonomies/colors", "red", NodeRecord::new("red-1", "Graft.Taxonomy:Term"))
        .unwrap();
    store
        .create_node("/taxonomies", "notes", NodeRecord::new("notes-1", "Graft:Folder"))
        .unwrap();
}

/// Store holding only the site and its `section` node.
pub fn empty_site(assets: &Path, key: &str) -> ContentStore {
    let mut store = ContentStore::new(assets);
    store.add_site(SITE, "Site A", key).unwrap();
    store
        .create_node("/sites/site-a", "section", NodeRecord::new("section-1", "Site:Section"))
        .unwrap();
    store
}

pub fn packages() -> InstalledPackages {
    InstalledPackages::new().with_active(SITE_KEY)
}

pub fn packages_with_taxonomy(version: &str) -> InstalledPackages {
    packages().with_package(TAXONOMY, version)
}

use serde_json::json;
use std::fs;
use std::path::Path;

use crate::sources::obsidian::ObsidianVault;
use crate::sources::{files_with_extension, DocumentSource, SourceRegistry};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_registry_names() {
    let registry = SourceRegistry::new();

    assert_eq!(registry.names(), vec!["text", "csv", "pdf", "obsidian"]);
    assert_eq!(SourceRegistry::default_names(), vec!["text", "csv", "pdf"]);
    assert!(registry.get("obsidian").is_some());
    assert!(registry.get("text_file").is_none());
}

#[test]
fn test_text_source_skips_short_files() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "notes/long.txt", "Fungi form vast underground networks.");
    write(tmp.path(), "short.txt", "  tiny  ");
    write(tmp.path(), "ignored.md", "Markdown is not a text source file.");

    let registry = SourceRegistry::new();
    let docs = registry.get("text").unwrap().extract_documents(tmp.path());

    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.text, "Fungi form vast underground networks.");
    assert_eq!(doc.title.as_deref(), Some("long"));
    assert!(doc.url.as_deref().unwrap().starts_with("file://"));
    assert_eq!(doc.metadata["source"], json!("text"));
    assert_eq!(doc.metadata["file_name"], json!("long.txt"));
    assert_eq!(doc.metadata["file_size"], json!(37));
    assert_eq!(doc.metadata["mime_type"], json!("text/plain"));
}

#[test]
fn test_csv_source_summarizes_file() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "species.csv",
        "name,kingdom\nchanterelle,fungi\noak,plantae\n",
    );
    write(tmp.path(), "empty.csv", "name,kingdom\n");

    let registry = SourceRegistry::new();
    let docs = registry.get("csv").unwrap().extract_documents(tmp.path());

    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.title.as_deref(), Some("species (CSV)"));
    assert_eq!(
        doc.text,
        "CSV file with 2 rows and columns: name, kingdom\n\nSample data:\n\
         name: chanterelle, kingdom: fungi\nname: oak, kingdom: plantae"
    );
    assert_eq!(doc.metadata["source"], json!("csv"));
    assert_eq!(doc.metadata["row_count"], json!(2));
    assert_eq!(doc.metadata["columns"], json!(["name", "kingdom"]));
}

#[test]
fn test_obsidian_vault_notes() {
    let tmp = tempfile::tempdir().unwrap();
    let vault = tmp.path().join("garden");
    write(
        &vault,
        "biology/fungi.md",
        "---\nstatus: draft\nsource: elsewhere\n---\n\
         Fungi are #biology #forest/soil, see [[Mycelium|the network]] and [[Spores]].\n\
         More about #biology and [[Mycelium]].\n",
    );
    write(&vault, "empty.md", "   \n");
    write(&vault, ".obsidian/workspace.md", "Hidden settings note.");

    let docs = ObsidianVault::default().extract_documents(&vault);
    assert_eq!(docs.len(), 1);

    let doc = &docs[0];
    assert_eq!(doc.title.as_deref(), Some("fungi"));
    assert_eq!(
        doc.url.as_deref(),
        Some("obsidian://open?vault=garden&file=biology%2Ffungi.md")
    );
    assert!(doc.text.starts_with("Fungi are #biology"));
    assert!(!doc.text.contains("status: draft"));

    let meta = &doc.metadata;
    assert_eq!(meta["source"], json!("obsidian"));
    assert_eq!(meta["file_path"], json!("biology/fungi.md"));
    assert_eq!(meta["tags"], json!(["biology", "forest/soil"]));
    assert_eq!(meta["links"], json!(["Mycelium", "Spores"]));
    assert_eq!(meta["link_count"], json!(2));
    assert_eq!(meta["status"], json!("draft"));
}

#[test]
fn test_obsidian_hidden_folders() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "visible.md", "A visible note.");
    write(tmp.path(), ".trash/old.md", "A deleted note.");

    let docs = ObsidianVault::new(Some("Notes".into()), false).extract_documents(tmp.path());
    assert_eq!(docs.len(), 1);
    assert!(docs[0].url.as_deref().unwrap().contains("vault=Notes"));

    let docs = ObsidianVault::new(None, true).extract_documents(tmp.path());
    assert_eq!(docs.len(), 2);
}

#[test]
fn test_files_are_listed_in_path_order() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "b.TXT", "b");
    write(tmp.path(), "a/z.txt", "z");
    write(tmp.path(), "a.txt", "a");

    let files: Vec<String> = files_with_extension(tmp.path(), "txt", true)
        .into_iter()
        .map(|p| {
            p.strip_prefix(tmp.path())
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect();

    // paths compare component-wise, so a directory sorts before its longer siblings
    assert_eq!(files, vec!["a/z.txt", "a.txt", "b.TXT"]);
}

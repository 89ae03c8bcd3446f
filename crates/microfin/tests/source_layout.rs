//! Keeps workspace sources within the 100-column limit rustfmt enforces.

use std::fs;
use std::path::{Path, PathBuf};

const MAX_COLUMNS: usize = 100;

fn rust_sources(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_sources(&path, found);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            found.push(path);
        }
    }
}

#[test]
fn no_source_line_exceeds_the_column_limit() {
    let crate_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut sources = Vec::new();
    for dir in ["src", "tests", "../../services/api/src"] {
        rust_sources(&crate_root.join(dir), &mut sources);
    }
    assert!(!sources.is_empty(), "no sources found under {crate_root:?}");

    let offenders: Vec<String> = sources
        .iter()
        .flat_map(|path| {
            let text = fs::read_to_string(path).expect("source readable");
            text.lines()
                .enumerate()
                .filter(|(_, line)| line.chars().count() > MAX_COLUMNS)
                .map(|(index, _)| format!("{}:{}", path.display(), index + 1))
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(offenders.is_empty(), "lines over {MAX_COLUMNS} columns: {offenders:#?}");
}

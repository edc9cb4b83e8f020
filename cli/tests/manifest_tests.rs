// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fs;
use std::path::Path;

const MANIFEST: &str = include_str!("../Cargo.toml");

/// Crate names listed under `[dependencies]`, in their `use` spelling.
fn runtime_dependencies() -> Vec<String> {
    let mut in_section = false;
    let mut names = Vec::new();
    for line in MANIFEST.lines().map(str::trim) {
        if line.starts_with('[') {
            in_section = line.starts_with("[dependencies]");
            continue;
        }
        if !in_section || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            let name = name.trim().trim_end_matches(".workspace");
            names.push(name.replace('-', "_"));
        }
    }
    names
}

fn collect_sources(dir: &Path, out: &mut String) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_sources(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push_str(&fs::read_to_string(&path).unwrap());
        }
    }
}

#[test]
fn test_every_dependency_is_used_by_the_cli() {
    let mut sources = String::new();
    collect_sources(&Path::new(env!("CARGO_MANIFEST_DIR")).join("src"), &mut sources);

    let dependencies = runtime_dependencies();
    assert!(dependencies.contains(&"convoy_core".to_string()));
    for name in dependencies {
        assert!(
            sources.contains(&format!("{name}::")) || sources.contains(&format!("use {name}")),
            "dependency `{name}` is declared but never used"
        );
    }
}

#[test]
fn test_timestamps_come_from_core() {
    assert!(!runtime_dependencies().contains(&"chrono".to_string()));
}

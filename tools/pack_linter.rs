//! Pack Linter: validates dialogue packs before they ship.
//!
//! Usage: pack_linter <pack_file_or_dir>

use dialogue_engine::core::compiler;
use dialogue_engine::core::consequence::Consequence;
use dialogue_engine::core::pack::Pack;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: pack_linter <pack_file_or_dir>");
        process::exit(0);
    }

    let pack_path = Path::new(&args[1]);
    let mut packs: Vec<Pack> = Vec::new();
    let mut errors = Vec::new();

    if pack_path.is_file() {
        load_pack(pack_path, &mut packs, &mut errors);
    } else if pack_path.is_dir() {
        load_packs_recursive(pack_path, &mut packs, &mut errors);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", args[1]);
        process::exit(1);
    }

    let rule_total: usize = packs.iter().map(Pack::rule_count).sum();
    println!("Loaded {} packs with {} rules", packs.len(), rule_total);

    let mut warnings = Vec::new();
    for pack in &packs {
        let (pack_errors, pack_warnings) = lint_pack(pack);
        errors.extend(pack_errors);
        warnings.extend(pack_warnings);
    }

    println!("\n=== Pack Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

/// Files naming the same pack are merged, as the machine would on load.
fn load_pack(path: &Path, packs: &mut Vec<Pack>, errors: &mut Vec<String>) {
    let pack = match compiler::compile_file(path) {
        Ok(pack) => pack,
        Err(e) => {
            errors.push(format!("{}: {}", path.display(), e));
            return;
        }
    };
    println!("  Loaded: {}", path.display());

    match packs.iter_mut().find(|p| p.name() == pack.name()) {
        Some(existing) => {
            if let Err(e) = existing.merge(pack) {
                errors.push(format!("{}: {}", path.display(), e));
            }
        }
        None => packs.push(pack),
    }
}

fn load_packs_recursive(dir: &Path, packs: &mut Vec<Pack>, errors: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        errors.push(format!("{}: unreadable directory", dir.display()));
        return;
    };
    let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            load_packs_recursive(&path, packs, errors);
        } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            load_pack(&path, packs, errors);
        }
    }
}

fn lint_pack(pack: &Pack) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let name = pack.name();

    if pack.is_empty() {
        errors.push(format!("Pack '{}' is empty and will not load", name));
    }

    for (index, rule) in pack.rules().iter().enumerate() {
        if rule.consequences().is_empty() {
            warnings.push(format!(
                "Pack '{}' rule {} has no consequences",
                name, index
            ));
        }

        if rule.condition_count() == 0 {
            warnings.push(format!(
                "Pack '{}' rule {} has no conditions and is never selected",
                name, index
            ));
        }

        for consequence in rule.consequences() {
            if let Consequence::TextResponse(id) = consequence {
                if pack.try_get_response(id).is_none() {
                    errors.push(format!(
                        "Pack '{}' rule {} references non-existent response '{}'",
                        name, index, id
                    ));
                }
            }
        }

        // Rules are kept sorted by specificity, so an identical earlier rule
        // always wins the tie.
        if let Some(earlier) = pack.rules()[..index]
            .iter()
            .position(|r| r.conditions() == rule.conditions())
        {
            warnings.push(format!(
                "Pack '{}' rule {} is shadowed by rule {} with identical conditions",
                name, index, earlier
            ));
        }
    }

    for response in pack.responses() {
        if response.line_count() == 0 {
            errors.push(format!(
                "Pack '{}' response '{}' has no lines",
                name,
                response.name()
            ));
        }
    }

    (errors, warnings)
}

//! Font set catalog and fontconfig helpers.
//!
//! Font sets are fixed groups of packages installed through the regular
//! package batch machinery; fontconfig only enters the picture for listing
//! installed families and rebuilding its cache afterwards.

use crate::bridge::error::BridgeError;
use crate::bridge::executor::{CommandExecutor, ExecOutcome, ExecRequest};

/// A named group of font packages.
pub struct FontSet {
    pub name: &'static str,
    pub description: &'static str,
    pub packages: &'static [&'static str],
}

pub const FONT_SETS: &[FontSet] = &[
    FontSet {
        name: "nerd",
        description: "Patched monospace fonts with icon glyphs",
        packages: &[
            "ttf-jetbrains-mono-nerd",
            "ttf-firacode-nerd",
            "ttf-hack-nerd",
            "ttf-nerd-fonts-symbols",
        ],
    },
    FontSet {
        name: "system",
        description: "General purpose UI and document fonts",
        packages: &["noto-fonts", "ttf-dejavu", "ttf-liberation"],
    },
    FontSet {
        name: "emoji",
        description: "Color emoji coverage",
        packages: &["noto-fonts-emoji"],
    },
    FontSet {
        name: "cjk",
        description: "Chinese, Japanese and Korean coverage",
        packages: &["noto-fonts-cjk"],
    },
    FontSet {
        name: "ms",
        description: "Microsoft compatibility fonts (not in the official repositories)",
        packages: &["ttf-ms-fonts"],
    },
];

pub fn find_set(name: &str) -> Option<&'static FontSet> {
    FONT_SETS.iter().find(|set| set.name == name)
}

pub fn set_names() -> Vec<&'static str> {
    FONT_SETS.iter().map(|set| set.name).collect()
}

/// Expand font-set names into their package list, preserving order and
/// dropping duplicates. Unknown set names are caller input errors.
pub fn expand_sets(sets: &[String]) -> Result<Vec<String>, BridgeError> {
    let mut packages: Vec<String> = Vec::new();

    for name in sets {
        let set = find_set(name).ok_or_else(|| {
            BridgeError::validation(format!(
                "unknown font set '{}', known sets: {}",
                name,
                set_names().join(", ")
            ))
        })?;

        for package in set.packages {
            if !packages.iter().any(|p| p == package) {
                packages.push(package.to_string());
            }
        }
    }

    Ok(packages)
}

/// Installed font family names from fontconfig, unique and sorted.
pub async fn installed_families(executor: &CommandExecutor) -> Result<Vec<String>, BridgeError> {
    let outcome = executor
        .execute(ExecRequest::new("fc-list", [":", "family"]))
        .await?;
    if !outcome.success() {
        return Err(BridgeError::System {
            command: "fc-list : family".to_string(),
            message: outcome.failure_reason(),
        });
    }

    let mut families: Vec<String> = outcome
        .stdout
        .lines()
        // fc-list prints comma-separated alias lists; the first entry is the
        // canonical family name.
        .filter_map(|line| line.split(',').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    families.sort_unstable();
    families.dedup();
    Ok(families)
}

/// Rebuild the fontconfig cache after font packages changed.
pub async fn rebuild_cache(executor: &CommandExecutor) -> Result<ExecOutcome, BridgeError> {
    executor
        .execute(ExecRequest::new("fc-cache", ["-f"]))
        .await
}

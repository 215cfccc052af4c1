//! Pacman adapter: argv assembly and output parsing for the external
//! package-manager binaries.
//!
//! Everything here goes through the bridge executor; this module never spawns
//! processes on its own and never reimplements package-manager semantics.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::bridge::cache::CatalogSource;
use crate::bridge::error::BridgeError;
use crate::bridge::executor::{CommandExecutor, ExecOutcome, ExecRequest};
use crate::common::config::Config;
use crate::ui::prelude::*;

/// Detect available AUR helper (yay, paru, etc.)
///
/// Returns the name of the first available AUR helper found.
pub fn detect_aur_helper() -> Option<&'static str> {
    const AUR_HELPERS: &[&str] = &["yay", "paru", "pikaur", "trizen"];

    AUR_HELPERS
        .iter()
        .find(|&helper| which::which(helper).is_ok())
        .map(|v| v as _)
}

/// One entry in a search result listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResult {
    pub name: String,
    pub version: String,
    pub repository: String,
    pub description: String,
    pub installed: bool,
}

/// Search results partitioned by origin.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub official: Vec<SearchResult>,
    pub aur: Vec<SearchResult>,
}

/// Adapter over pacman and its companion tools.
pub struct PacmanBackend {
    executor: CommandExecutor,
    aur_helper: Option<&'static str>,
    list_deadline: Duration,
}

impl PacmanBackend {
    pub fn new(executor: CommandExecutor, config: &Config) -> Self {
        let aur_helper = if config.aur { detect_aur_helper() } else { None };
        Self {
            executor,
            aur_helper,
            list_deadline: Duration::from_secs(config.list_timeout_secs),
        }
    }

    pub fn aur_helper(&self) -> Option<&'static str> {
        self.aur_helper
    }

    /// Whether the package is currently installed.
    pub async fn is_installed(&self, name: &str) -> Result<bool, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Qq", name]))
            .await?;
        Ok(outcome.success())
    }

    pub async fn install(&self, name: &str) -> Result<ExecOutcome, BridgeError> {
        self.executor
            .execute(ExecRequest::new("pacman", ["-S", "--noconfirm", "--needed", name]).privileged())
            .await
    }

    pub async fn remove(&self, name: &str) -> Result<ExecOutcome, BridgeError> {
        self.executor
            .execute(ExecRequest::new("pacman", ["-R", "--noconfirm", name]).privileged())
            .await
    }

    /// Search official repositories, plus the AUR when a helper is present.
    ///
    /// AUR lookup is best-effort: a failing helper degrades to official-only
    /// results instead of failing the whole search.
    pub async fn search(&self, query: &str) -> Result<SearchResults, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Ss", query]))
            .await?;

        // pacman -Ss exits 1 when nothing matched; real failures write to stderr.
        if !outcome.success() && !outcome.stderr.trim().is_empty() {
            return Err(BridgeError::System {
                command: format!("pacman -Ss {query}"),
                message: outcome.failure_reason(),
            });
        }

        let mut results = SearchResults {
            official: parse_search_output(&outcome.stdout),
            aur: Vec::new(),
        };

        if let Some(helper) = self.aur_helper {
            match self
                .executor
                .execute(ExecRequest::new(helper, ["-Ss", query]))
                .await
            {
                Ok(helper_outcome) => {
                    results.aur = parse_search_output(&helper_outcome.stdout)
                        .into_iter()
                        .filter(|r| r.repository == "aur")
                        .collect();
                }
                Err(err) => emit(
                    Level::Debug,
                    "pacman.search.aur_failed",
                    &format!("AUR search via {helper} failed: {err}"),
                    None,
                ),
            }
        }

        Ok(results)
    }

    /// Details for one package, preferring the local database.
    pub async fn info(&self, name: &str) -> Result<serde_json::Value, BridgeError> {
        let local = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Qi", name]))
            .await?;
        if local.success() {
            return Ok(info_to_json(&local.stdout, true));
        }

        let sync = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Si", name]))
            .await?;
        if sync.success() {
            return Ok(info_to_json(&sync.stdout, false));
        }

        Err(BridgeError::System {
            command: format!("pacman -Si {name}"),
            message: format!("package '{name}' not found"),
        })
    }

    /// Installed packages with versions.
    pub async fn installed_versions(&self) -> Result<Vec<(String, String)>, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Q"]).deadline(self.list_deadline))
            .await?;
        if !outcome.success() {
            return Err(BridgeError::System {
                command: "pacman -Q".to_string(),
                message: outcome.failure_reason(),
            });
        }

        Ok(outcome
            .stdout
            .lines()
            .filter_map(|line| {
                line.split_once(' ')
                    .map(|(name, version)| (name.to_string(), version.trim().to_string()))
            })
            .collect())
    }

    /// Pending updates as "name old -> new" lines from checkupdates.
    pub async fn pending_updates(&self) -> Result<Vec<String>, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("checkupdates", Vec::<String>::new()))
            .await?;

        match outcome.exit_code {
            0 => Ok(outcome
                .stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            // checkupdates exits 2 when there is nothing to update.
            2 => Ok(Vec::new()),
            _ => Err(BridgeError::System {
                command: "checkupdates".to_string(),
                message: outcome.failure_reason(),
            }),
        }
    }

    pub async fn full_upgrade(&self) -> Result<ExecOutcome, BridgeError> {
        self.executor
            .execute(ExecRequest::new("pacman", ["-Syu", "--noconfirm"]).privileged())
            .await
    }

    /// Orphaned packages (installed as dependencies, no longer required).
    pub async fn orphans(&self) -> Result<Vec<String>, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Qtdq"]))
            .await?;

        // Exit 1 with empty output means no orphans, not an error.
        if !outcome.success() && !outcome.stderr.trim().is_empty() {
            return Err(BridgeError::System {
                command: "pacman -Qtdq".to_string(),
                message: outcome.failure_reason(),
            });
        }

        Ok(outcome
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn clean_cache(&self, keep: u32) -> Result<ExecOutcome, BridgeError> {
        self.executor
            .execute(
                ExecRequest::new("paccache", vec!["-r".to_string(), format!("-k{keep}")])
                    .privileged(),
            )
            .await
    }

    pub async fn update_mirrors(
        &self,
        country: Option<&str>,
        count: u32,
    ) -> Result<ExecOutcome, BridgeError> {
        let mut args = vec![
            "--protocol".to_string(),
            "https".to_string(),
            "--sort".to_string(),
            "rate".to_string(),
            "--latest".to_string(),
            count.to_string(),
            "--save".to_string(),
            "/etc/pacman.d/mirrorlist".to_string(),
        ];
        if let Some(country) = country {
            args.push("--country".to_string());
            args.push(country.to_string());
        }

        self.executor
            .execute(ExecRequest::new("reflector", args).privileged())
            .await
    }
}

#[async_trait]
impl CatalogSource for PacmanBackend {
    async fn available_names(&self) -> Result<Vec<String>, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Slq"]).deadline(self.list_deadline))
            .await?;
        if !outcome.success() {
            return Err(BridgeError::System {
                command: "pacman -Slq".to_string(),
                message: outcome.failure_reason(),
            });
        }
        Ok(collect_names(&outcome.stdout))
    }

    async fn installed_names(&self) -> Result<Vec<String>, BridgeError> {
        let outcome = self
            .executor
            .execute(ExecRequest::new("pacman", ["-Qq"]).deadline(self.list_deadline))
            .await?;
        if !outcome.success() {
            return Err(BridgeError::System {
                command: "pacman -Qq".to_string(),
                message: outcome.failure_reason(),
            });
        }
        Ok(collect_names(&outcome.stdout))
    }
}

fn collect_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `pacman -Ss` style output.
///
/// ```text
/// extra/vim 9.1.0686-1 [installed]
///     Vi Improved, a highly configurable text editor
/// ```
fn parse_search_output(output: &str) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::new();

    for line in output.lines() {
        if line.starts_with(char::is_whitespace) {
            // Description line belongs to the most recent header.
            if let Some(last) = results.last_mut() {
                if last.description.is_empty() {
                    last.description = line.trim().to_string();
                }
            }
            continue;
        }

        let mut words = line.split_whitespace();
        let Some(qualified) = words.next() else {
            continue;
        };
        let Some((repository, name)) = qualified.split_once('/') else {
            continue;
        };
        let version = words.next().unwrap_or_default().to_string();
        let installed = line.contains("[installed");

        results.push(SearchResult {
            name: name.to_string(),
            version,
            repository: repository.to_string(),
            description: String::new(),
            installed,
        });
    }

    results
}

/// Parse `pacman -Qi` / `-Si` key-value output into the info payload.
fn info_to_json(output: &str, installed: bool) -> serde_json::Value {
    let mut name = None;
    let mut version = None;
    let mut description = None;
    let mut url = None;
    let mut repository = None;
    let mut installed_size = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => name = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            "Description" => description = Some(value.to_string()),
            "URL" => url = Some(value.to_string()),
            "Repository" => repository = Some(value.to_string()),
            "Installed Size" => installed_size = Some(value.to_string()),
            _ => {}
        }
    }

    serde_json::json!({
        "name": name,
        "version": version,
        "description": description,
        "url": url,
        "repository": repository,
        "installed_size": installed_size,
        "installed": installed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_output() {
        let output = "\
extra/vim 9.1.0686-1 [installed]
    Vi Improved, a highly configurable text editor
extra/vim-airline 0.11-2
    Lean and mean status/tabline for vim
core/gzip 1.13-3 (base-devel) [installed: 1.13-2]
    GNU compression utility
";
        let results = parse_search_output(output);
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].name, "vim");
        assert_eq!(results[0].repository, "extra");
        assert_eq!(results[0].version, "9.1.0686-1");
        assert!(results[0].installed);
        assert_eq!(
            results[0].description,
            "Vi Improved, a highly configurable text editor"
        );

        assert_eq!(results[1].name, "vim-airline");
        assert!(!results[1].installed);

        assert_eq!(results[2].name, "gzip");
        assert!(results[2].installed);
    }

    #[test]
    fn test_parse_search_output_empty() {
        assert!(parse_search_output("").is_empty());
        assert!(parse_search_output("\n\n").is_empty());
    }

    #[test]
    fn test_info_to_json() {
        let output = "\
Name            : vim
Version         : 9.1.0686-1
Description     : Vi Improved, a highly configurable text editor
URL             : https://www.vim.org
Installed Size  : 4.64 MiB
Licenses        : custom:vim
";
        let info = info_to_json(output, true);
        assert_eq!(info["name"], "vim");
        assert_eq!(info["version"], "9.1.0686-1");
        assert_eq!(info["url"], "https://www.vim.org");
        assert_eq!(info["installed_size"], "4.64 MiB");
        assert_eq!(info["installed"], true);
        assert!(info["repository"].is_null());
    }

    #[test]
    fn test_info_to_json_url_with_colons_kept_whole() {
        let output = "URL             : https://example.org:8443/path\n";
        let info = info_to_json(output, false);
        // split_once keeps everything after the first colon.
        assert_eq!(info["url"], "https://example.org:8443/path");
    }

    #[test]
    fn test_collect_names_skips_blanks() {
        assert_eq!(collect_names("a\n\n b \n"), vec!["a", "b"]);
    }
}

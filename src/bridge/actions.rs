//! Action protocol: name + positional arguments in, one envelope out.
//!
//! This is the bridge's boundary with every front end (CLI subcommands, the
//! interactive menu, and the generic `action` entry used by scripts). The
//! recognized-action list is the only discoverability mechanism and must stay
//! in sync with the dispatch below.

use serde_json::json;

use super::BridgeContext;
use super::cache::CacheScope;
use super::error::BridgeError;
use super::protocol::ResponseEnvelope;
use crate::common::fonts;
use crate::common::operations::{InstallOperation, RemoveOperation};
use crate::ui::prelude::*;

/// Every action the bridge understands, in protocol order.
pub const RECOGNIZED_ACTIONS: &[&str] = &[
    "install",
    "remove",
    "search",
    "info",
    "list_available",
    "list_installed_names",
    "list_installed",
    "check_updates",
    "update_system",
    "clean_cache",
    "remove_orphans",
    "update_mirrors",
    "font_install",
    "font_remove",
    "font_list",
    "font_search",
    "font_update_cache",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Install { items: Vec<String> },
    Remove { items: Vec<String> },
    Search { query: String },
    Info { item: String },
    ListAvailable,
    ListInstalledNames,
    ListInstalled,
    CheckUpdates,
    UpdateSystem,
    CleanCache { keep: Option<u32> },
    RemoveOrphans,
    UpdateMirrors { country: Option<String>, count: Option<u32> },
    FontInstall { sets: Vec<String> },
    FontRemove { sets: Vec<String> },
    FontList,
    FontSearch { query: String },
    FontUpdateCache,
}

impl Action {
    /// Parse an action name plus positional arguments.
    pub fn parse(name: &str, args: &[String]) -> Result<Self, BridgeError> {
        match name {
            "install" => Ok(Self::Install {
                items: args.to_vec(),
            }),
            "remove" => Ok(Self::Remove {
                items: args.to_vec(),
            }),
            "search" => {
                if args.is_empty() {
                    return Err(BridgeError::validation("search requires a query"));
                }
                Ok(Self::Search {
                    query: args.join(" "),
                })
            }
            "info" => match args {
                [item] => Ok(Self::Info { item: item.clone() }),
                _ => Err(BridgeError::validation(
                    "info requires exactly one package name",
                )),
            },
            "list_available" => Ok(Self::ListAvailable),
            "list_installed_names" => Ok(Self::ListInstalledNames),
            "list_installed" => Ok(Self::ListInstalled),
            "check_updates" => Ok(Self::CheckUpdates),
            "update_system" => Ok(Self::UpdateSystem),
            "clean_cache" => {
                let keep = args.first().map(|raw| parse_count(raw, "keep")).transpose()?;
                Ok(Self::CleanCache { keep })
            }
            "remove_orphans" => Ok(Self::RemoveOrphans),
            "update_mirrors" => {
                let (country, count) = match args {
                    [] => (None, None),
                    [single] => match single.parse::<u32>() {
                        Ok(count) => (None, Some(count)),
                        Err(_) => (Some(single.clone()), None),
                    },
                    [country, count] => (Some(country.clone()), Some(parse_count(count, "count")?)),
                    _ => {
                        return Err(BridgeError::validation(
                            "update_mirrors takes at most a country and a count",
                        ));
                    }
                };
                Ok(Self::UpdateMirrors { country, count })
            }
            "font_install" => Ok(Self::FontInstall {
                sets: args.to_vec(),
            }),
            "font_remove" => Ok(Self::FontRemove {
                sets: args.to_vec(),
            }),
            "font_list" => Ok(Self::FontList),
            "font_search" => {
                if args.is_empty() {
                    return Err(BridgeError::validation("font_search requires a query"));
                }
                Ok(Self::FontSearch {
                    query: args.join(" "),
                })
            }
            "font_update_cache" => Ok(Self::FontUpdateCache),
            _ => Err(BridgeError::InvalidAction {
                name: name.to_string(),
            }),
        }
    }
}

fn parse_count(raw: &str, what: &str) -> Result<u32, BridgeError> {
    raw.parse::<u32>()
        .map_err(|_| BridgeError::validation(format!("{what} must be a non-negative integer, got '{raw}'")))
}

/// Run one action to completion and wrap the outcome in an envelope.
///
/// Application-level failures become error envelopes here; the only failures
/// left for the caller are protocol-level (an envelope that cannot be
/// serialized or written).
pub async fn dispatch(ctx: &mut BridgeContext, action: Action) -> ResponseEnvelope {
    match run_action(ctx, action).await {
        Ok(envelope) => envelope,
        Err(err) => ResponseEnvelope::from_bridge_error(&err),
    }
}

async fn run_action(
    ctx: &mut BridgeContext,
    action: Action,
) -> Result<ResponseEnvelope, BridgeError> {
    match action {
        Action::Install { items } => {
            let operation = InstallOperation::new(&ctx.backend);
            let report = ctx.runner.run(&items, &operation).await?;
            if !report.succeeded.is_empty() {
                ctx.cache.invalidate(CacheScope::Installed);
            }
            Ok(report.into_envelope("installed"))
        }

        Action::Remove { items } => {
            let operation = RemoveOperation::new(&ctx.backend);
            let report = ctx.runner.run(&items, &operation).await?;
            if !report.succeeded.is_empty() {
                ctx.cache.invalidate(CacheScope::Installed);
            }
            Ok(report.into_envelope("removed"))
        }

        Action::Search { query } => {
            let results = ctx.backend.search(&query).await?;
            let total = results.official.len() + results.aur.len();
            let message = if total == 0 {
                format!("No packages found matching '{query}'")
            } else {
                format!("Found {total} matching packages")
            };
            Ok(ResponseEnvelope::success(
                message,
                json!({
                    "official": results.official,
                    "aur": results.aur,
                    "total_count": total,
                }),
            ))
        }

        Action::Info { item } => {
            let info = ctx.backend.info(&item).await?;
            Ok(ResponseEnvelope::success(
                format!("Package information for {item}"),
                info,
            ))
        }

        Action::ListAvailable => {
            let packages = ctx.cache.available(false).await?.to_vec();
            Ok(ResponseEnvelope::success(
                format!("{} packages available", packages.len()),
                json!({ "packages": packages, "count": packages.len() }),
            ))
        }

        Action::ListInstalledNames => {
            let packages = ctx.cache.installed(false).await?.to_vec();
            Ok(ResponseEnvelope::success(
                format!("{} packages installed", packages.len()),
                json!({ "packages": packages, "count": packages.len() }),
            ))
        }

        Action::ListInstalled => {
            let packages: Vec<_> = ctx
                .backend
                .installed_versions()
                .await?
                .into_iter()
                .map(|(name, version)| json!({ "name": name, "version": version }))
                .collect();
            Ok(ResponseEnvelope::success(
                format!("{} packages installed", packages.len()),
                json!({ "packages": packages, "count": packages.len() }),
            ))
        }

        Action::CheckUpdates => {
            let updates = ctx.backend.pending_updates().await?;
            let message = if updates.is_empty() {
                "System is up to date".to_string()
            } else {
                format!("{} updates available", updates.len())
            };
            Ok(ResponseEnvelope::success(
                message,
                json!({ "updates": updates, "count": updates.len() }),
            ))
        }

        Action::UpdateSystem => {
            let outcome = ctx.backend.full_upgrade().await?;
            if !outcome.success() {
                return Err(BridgeError::System {
                    command: "pacman -Syu --noconfirm".to_string(),
                    message: outcome.failure_reason(),
                });
            }
            // A full upgrade also refreshes the sync database, so both
            // catalogs are stale.
            ctx.cache.invalidate(CacheScope::Both);
            Ok(ResponseEnvelope::success(
                "System update completed",
                json!({}),
            ))
        }

        Action::CleanCache { keep } => {
            let keep = keep.unwrap_or(ctx.config.clean_keep_versions);
            let outcome = ctx.backend.clean_cache(keep).await?;
            if !outcome.success() {
                return Err(BridgeError::System {
                    command: format!("paccache -r -k{keep}"),
                    message: outcome.failure_reason(),
                });
            }
            Ok(ResponseEnvelope::success(
                format!("Package cache cleaned, kept {keep} versions"),
                json!({ "kept_versions": keep }),
            ))
        }

        Action::RemoveOrphans => {
            let orphans = ctx.backend.orphans().await?;
            if orphans.is_empty() {
                return Ok(ResponseEnvelope::success(
                    "No orphaned packages found",
                    json!({ "succeeded": [], "succeeded_count": 0 }),
                ));
            }
            let operation = RemoveOperation::new(&ctx.backend);
            let report = ctx.runner.run(&orphans, &operation).await?;
            if !report.succeeded.is_empty() {
                ctx.cache.invalidate(CacheScope::Installed);
            }
            Ok(report.into_envelope("removed"))
        }

        Action::UpdateMirrors { country, count } => {
            let country = country.or_else(|| ctx.config.mirror_country.clone());
            let count = count.unwrap_or(ctx.config.mirror_count);
            let outcome = ctx
                .backend
                .update_mirrors(country.as_deref(), count)
                .await?;
            if !outcome.success() {
                return Err(BridgeError::System {
                    command: "reflector".to_string(),
                    message: outcome.failure_reason(),
                });
            }
            Ok(ResponseEnvelope::success(
                format!("Mirror list updated with {count} mirrors"),
                json!({ "count": count, "country": country }),
            ))
        }

        Action::FontInstall { sets } => {
            let packages = fonts::expand_sets(&sets)?;
            let operation = InstallOperation::new(&ctx.backend);
            let report = ctx.runner.run(&packages, &operation).await?;
            if !report.succeeded.is_empty() {
                ctx.cache.invalidate(CacheScope::Installed);
                refresh_font_cache(ctx).await;
            }
            Ok(report.into_envelope("installed"))
        }

        Action::FontRemove { sets } => {
            let packages = fonts::expand_sets(&sets)?;
            let operation = RemoveOperation::new(&ctx.backend);
            let report = ctx.runner.run(&packages, &operation).await?;
            if !report.succeeded.is_empty() {
                ctx.cache.invalidate(CacheScope::Installed);
                refresh_font_cache(ctx).await;
            }
            Ok(report.into_envelope("removed"))
        }

        Action::FontList => {
            let families = fonts::installed_families(&ctx.executor).await?;
            Ok(ResponseEnvelope::success(
                format!("{} font families installed", families.len()),
                json!({
                    "fonts": families,
                    "count": families.len(),
                    "sets": fonts::set_names(),
                }),
            ))
        }

        Action::FontSearch { query } => {
            let needle = query.to_lowercase();
            let families: Vec<String> = fonts::installed_families(&ctx.executor)
                .await?
                .into_iter()
                .filter(|family| family.to_lowercase().contains(&needle))
                .collect();
            let message = if families.is_empty() {
                format!("No font families matching '{query}'")
            } else {
                format!("{} font families matching '{query}'", families.len())
            };
            Ok(ResponseEnvelope::success(
                message,
                json!({ "fonts": families, "count": families.len() }),
            ))
        }

        Action::FontUpdateCache => {
            let outcome = fonts::rebuild_cache(&ctx.executor).await?;
            if !outcome.success() {
                return Err(BridgeError::System {
                    command: "fc-cache -f".to_string(),
                    message: outcome.failure_reason(),
                });
            }
            Ok(ResponseEnvelope::success("Font cache updated", json!({})))
        }
    }
}

/// Best-effort fontconfig refresh after font packages changed. A failure is
/// logged, not propagated; the batch result is already decided.
async fn refresh_font_cache(ctx: &BridgeContext) {
    match fonts::rebuild_cache(&ctx.executor).await {
        Ok(outcome) if outcome.success() => {}
        Ok(outcome) => emit(
            Level::Warn,
            "fonts.cache.failed",
            &format!(
                "{} Font cache rebuild failed: {}",
                char::from(NerdFont::Warning),
                outcome.failure_reason()
            ),
            None,
        ),
        Err(err) => emit(
            Level::Warn,
            "fonts.cache.failed",
            &format!(
                "{} Font cache rebuild failed: {err}",
                char::from(NerdFont::Warning)
            ),
            None,
        ),
    }
}

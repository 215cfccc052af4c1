//! Interactive menu front-end.
//!
//! Pure presentation: every operation goes through the action dispatch and
//! comes back as an envelope. The menu's only extra responsibilities are
//! gathering input (with catalog-backed autocomplete) and asking for
//! confirmation before mutating operations.

use std::sync::atomic::Ordering;

use anyhow::Result;
use colored::Colorize;
use dialoguer::Completion;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use serde_json::Value;

use crate::bridge::BridgeContext;
use crate::bridge::actions::{Action, dispatch};
use crate::common::fonts::FONT_SETS;
use crate::common::progress::{create_spinner, finish_spinner};
use crate::ui::prelude::*;
use crate::ui::render_envelope;

/// Completes the last whitespace-separated token against a name catalog.
struct CatalogCompletion {
    names: Vec<String>,
}

impl Completion for CatalogCompletion {
    fn get(&self, input: &str) -> Option<String> {
        let (head, tail) = match input.rsplit_once(' ') {
            Some((head, tail)) => (format!("{head} "), tail),
            None => (String::new(), input),
        };
        if tail.is_empty() {
            return None;
        }

        self.names
            .iter()
            .find(|name| name.starts_with(tail))
            .map(|name| format!("{head}{name}"))
    }
}

pub async fn run_menu(ctx: &mut BridgeContext) -> Result<()> {
    let theme = ColorfulTheme::default();

    loop {
        // A previous interrupt must not poison the next batch.
        ctx.cancel.store(false, Ordering::SeqCst);

        println!();
        println!(
            "{} {}",
            char::from(NerdFont::Package),
            "Package Bridge".bold()
        );

        let items = [
            format!("{} Install packages", char::from(NerdFont::Download)),
            format!("{} Remove packages", char::from(NerdFont::Trash)),
            format!("{} Search packages", char::from(NerdFont::Search)),
            format!("{} Update system", char::from(NerdFont::Refresh)),
            format!("{} List installed packages", char::from(NerdFont::List)),
            format!("{} Package information", char::from(NerdFont::Info)),
            format!("{} Clean package cache", char::from(NerdFont::Gear)),
            format!("{} Remove orphans", char::from(NerdFont::Question)),
            format!("{} Font manager", char::from(NerdFont::Font)),
            format!("{} Exit", char::from(NerdFont::Cross)),
        ];

        let choice = Select::with_theme(&theme)
            .with_prompt("Select an action")
            .items(&items)
            .default(0)
            .interact()?;

        match choice {
            0 => install_flow(ctx, &theme).await?,
            1 => remove_flow(ctx, &theme).await?,
            2 => search_flow(ctx, &theme).await?,
            3 => update_flow(ctx, &theme).await?,
            4 => list_flow(ctx, &theme).await?,
            5 => info_flow(ctx, &theme).await?,
            6 => clean_flow(ctx, &theme).await?,
            7 => orphans_flow(ctx, &theme).await?,
            8 => font_menu(ctx, &theme).await?,
            _ => break,
        }
    }

    Ok(())
}

/// Prompt for package names with autocomplete backed by a catalog.
fn prompt_packages(
    theme: &ColorfulTheme,
    prompt: &str,
    catalog: Vec<String>,
) -> Result<Vec<String>> {
    let completion = CatalogCompletion { names: catalog };
    let raw: String = Input::with_theme(theme)
        .with_prompt(format!("{prompt} (space-separated, tab completes)"))
        .allow_empty(true)
        .completion_with(&completion)
        .interact_text()?;

    Ok(shell_words::split(&raw).unwrap_or_else(|_| {
        raw.split_whitespace().map(str::to_string).collect()
    }))
}

async fn load_catalog(ctx: &mut BridgeContext, installed: bool) -> Vec<String> {
    let spinner = create_spinner("Loading package catalog...".to_string());
    let result = if installed {
        ctx.cache.installed(false).await
    } else {
        ctx.cache.available(false).await
    };
    finish_spinner(spinner);

    match result {
        Ok(names) => names.to_vec(),
        Err(err) => {
            emit(
                Level::Warn,
                "menu.catalog.unavailable",
                &format!(
                    "{} Could not load package catalog: {err}",
                    char::from(NerdFont::Warning)
                ),
                None,
            );
            Vec::new()
        }
    }
}

async fn install_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let available = load_catalog(ctx, false).await;
    let packages = prompt_packages(theme, "Packages to install", available)?;
    if packages.is_empty() {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(theme)
        .with_prompt(format!(
            "Install {} package(s): {}?",
            packages.len(),
            packages.join(", ")
        ))
        .default(true)
        .interact()?;
    if !confirmed {
        emit(Level::Info, "menu.install.cancelled", "Installation cancelled", None);
        return Ok(());
    }

    let envelope = dispatch(ctx, Action::Install { items: packages }).await;
    render_envelope(&envelope)?;
    Ok(())
}

async fn remove_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let installed = load_catalog(ctx, true).await;

    let packages = if installed.is_empty() {
        prompt_packages(theme, "Packages to remove", Vec::new())?
    } else {
        let method = Select::with_theme(theme)
            .with_prompt("Choose input method")
            .items(&["Multi-select from installed packages", "Type names"])
            .default(0)
            .interact()?;

        if method == 0 {
            // Multi-select gets unwieldy past a screenful.
            let limit = 50.min(installed.len());
            if installed.len() > limit {
                emit(
                    Level::Info,
                    "menu.remove.truncated",
                    &format!("Showing first {limit} of {} packages", installed.len()),
                    None,
                );
            }
            let shown = &installed[..limit];
            let picked = MultiSelect::with_theme(theme)
                .with_prompt("Select packages to remove")
                .items(shown)
                .interact()?;
            picked.into_iter().map(|i| shown[i].clone()).collect()
        } else {
            prompt_packages(theme, "Packages to remove", installed)?
        }
    };

    if packages.is_empty() {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(theme)
        .with_prompt(format!(
            "Remove {} package(s): {}?",
            packages.len(),
            packages.join(", ")
        ))
        .default(false)
        .interact()?;
    if !confirmed {
        emit(Level::Info, "menu.remove.cancelled", "Removal cancelled", None);
        return Ok(());
    }

    let envelope = dispatch(ctx, Action::Remove { items: packages }).await;
    render_envelope(&envelope)?;
    Ok(())
}

async fn search_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let query: String = Input::with_theme(theme)
        .with_prompt("Search query")
        .interact_text()?;
    if query.trim().is_empty() {
        return Ok(());
    }

    let spinner = create_spinner(format!("Searching for '{query}'..."));
    let envelope = dispatch(ctx, Action::Search { query }).await;
    finish_spinner(spinner);

    render_envelope(&envelope)?;
    if get_output_format() == OutputFormat::Text {
        print_search_results(&envelope.data);
    }
    Ok(())
}

fn print_search_results(data: &Value) {
    for origin in ["official", "aur"] {
        let Some(results) = data.get(origin).and_then(|v| v.as_array()) else {
            continue;
        };
        for entry in results {
            let name = entry["name"].as_str().unwrap_or("?");
            let version = entry["version"].as_str().unwrap_or("");
            let repository = entry["repository"].as_str().unwrap_or(origin);
            let description = entry["description"].as_str().unwrap_or("");
            let marker = if entry["installed"].as_bool().unwrap_or(false) {
                format!(" {}", char::from(NerdFont::Check)).green().to_string()
            } else {
                String::new()
            };
            println!(
                "  {}/{} {}{}",
                repository.cyan(),
                name.bold(),
                version.dimmed(),
                marker
            );
            if !description.is_empty() {
                println!("      {description}");
            }
        }
    }
}

async fn update_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let spinner = create_spinner("Checking for updates...".to_string());
    let check = dispatch(ctx, Action::CheckUpdates).await;
    finish_spinner(spinner);
    render_envelope(&check)?;

    let count = check.data["count"].as_u64().unwrap_or(0);
    if !check.is_success() || count == 0 {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(theme)
        .with_prompt("Proceed with system update?")
        .default(true)
        .interact()?;
    if !confirmed {
        emit(Level::Info, "menu.update.cancelled", "Update cancelled", None);
        return Ok(());
    }

    let envelope = dispatch(ctx, Action::UpdateSystem).await;
    render_envelope(&envelope)?;
    Ok(())
}

async fn list_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let envelope = dispatch(ctx, Action::ListInstalled).await;
    render_envelope(&envelope)?;

    let Some(packages) = envelope.data.get("packages").and_then(|v| v.as_array()) else {
        return Ok(());
    };

    let preview = 20.min(packages.len());
    for entry in &packages[..preview] {
        println!(
            "  {} {}",
            entry["name"].as_str().unwrap_or("?").bold(),
            entry["version"].as_str().unwrap_or("").dimmed()
        );
    }

    if packages.len() > preview {
        let show_all = Confirm::with_theme(theme)
            .with_prompt(format!("Show all {} packages?", packages.len()))
            .default(false)
            .interact()?;
        if show_all {
            for entry in &packages[preview..] {
                println!(
                    "  {} {}",
                    entry["name"].as_str().unwrap_or("?").bold(),
                    entry["version"].as_str().unwrap_or("").dimmed()
                );
            }
        }
    }
    Ok(())
}

async fn info_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let available = load_catalog(ctx, false).await;
    let completion = CatalogCompletion { names: available };
    let package: String = Input::with_theme(theme)
        .with_prompt("Package name")
        .completion_with(&completion)
        .interact_text()?;
    if package.trim().is_empty() {
        return Ok(());
    }

    let envelope = dispatch(ctx, Action::Info { item: package }).await;
    render_envelope(&envelope)?;

    if envelope.is_success() && get_output_format() == OutputFormat::Text {
        for (label, key) in [
            ("Name", "name"),
            ("Version", "version"),
            ("Repository", "repository"),
            ("Description", "description"),
            ("URL", "url"),
            ("Installed size", "installed_size"),
        ] {
            if let Some(value) = envelope.data.get(key).and_then(|v| v.as_str()) {
                println!("  {}: {}", label.cyan(), value);
            }
        }
        let installed = envelope.data["installed"].as_bool().unwrap_or(false);
        println!(
            "  {}: {}",
            "Installed".cyan(),
            if installed { "yes" } else { "no" }
        );
    }
    Ok(())
}

async fn clean_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let keep: u32 = Input::with_theme(theme)
        .with_prompt("Package versions to keep")
        .default(ctx.config.clean_keep_versions)
        .interact_text()?;

    let confirmed = Confirm::with_theme(theme)
        .with_prompt(format!("Clean cache, keeping {keep} versions?"))
        .default(true)
        .interact()?;
    if !confirmed {
        return Ok(());
    }

    let envelope = dispatch(ctx, Action::CleanCache { keep: Some(keep) }).await;
    render_envelope(&envelope)?;
    Ok(())
}

async fn orphans_flow(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    let confirmed = Confirm::with_theme(theme)
        .with_prompt("Remove all orphaned packages?")
        .default(false)
        .interact()?;
    if !confirmed {
        return Ok(());
    }

    let envelope = dispatch(ctx, Action::RemoveOrphans).await;
    render_envelope(&envelope)?;
    Ok(())
}

async fn font_menu(ctx: &mut BridgeContext, theme: &ColorfulTheme) -> Result<()> {
    loop {
        let items = [
            "Install font sets",
            "Remove font sets",
            "List installed fonts",
            "Search fonts",
            "Update font cache",
            "Back",
        ];
        let choice = Select::with_theme(theme)
            .with_prompt(format!("{} Font manager", char::from(NerdFont::Font)))
            .items(&items)
            .default(0)
            .interact()?;

        match choice {
            0 | 1 => {
                let labels: Vec<String> = FONT_SETS
                    .iter()
                    .map(|set| format!("{} - {}", set.name, set.description))
                    .collect();
                let picked = MultiSelect::with_theme(theme)
                    .with_prompt(if choice == 0 {
                        "Select font sets to install"
                    } else {
                        "Select font sets to remove"
                    })
                    .items(&labels)
                    .interact()?;
                if picked.is_empty() {
                    continue;
                }
                let sets: Vec<String> = picked
                    .into_iter()
                    .map(|i| FONT_SETS[i].name.to_string())
                    .collect();

                let action = if choice == 0 {
                    Action::FontInstall { sets }
                } else {
                    Action::FontRemove { sets }
                };
                let envelope = dispatch(ctx, action).await;
                render_envelope(&envelope)?;
            }
            2 => {
                let envelope = dispatch(ctx, Action::FontList).await;
                render_envelope(&envelope)?;
                if let Some(fonts) = envelope.data.get("fonts").and_then(|v| v.as_array()) {
                    for family in fonts.iter().take(40) {
                        println!("  {}", family.as_str().unwrap_or("?"));
                    }
                    if fonts.len() > 40 {
                        println!("  ... and {} more", fonts.len() - 40);
                    }
                }
            }
            3 => {
                let query: String = Input::with_theme(theme)
                    .with_prompt("Font family query")
                    .interact_text()?;
                if query.trim().is_empty() {
                    continue;
                }
                let envelope = dispatch(ctx, Action::FontSearch { query }).await;
                render_envelope(&envelope)?;
                if let Some(fonts) = envelope.data.get("fonts").and_then(|v| v.as_array()) {
                    for family in fonts {
                        println!("  {}", family.as_str().unwrap_or("?"));
                    }
                }
            }
            4 => {
                let envelope = dispatch(ctx, Action::FontUpdateCache).await;
                render_envelope(&envelope)?;
            }
            _ => break,
        }
    }
    Ok(())
}

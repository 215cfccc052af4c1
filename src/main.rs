mod bridge;
mod common;
mod menu;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bridge::BridgeContext;
use bridge::actions::{Action, dispatch};
use bridge::privilege::PrivilegeManager;
use bridge::protocol::{PROTOCOL_VERSION, ResponseEnvelope};
use common::config::Config;
use ui::prelude::*;
use ui::render_envelope;

/// Package bridge main parser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit machine-readable JSON envelopes instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Use an alternative config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install packages
    Install {
        /// Package names to install
        packages: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        no_confirm: bool,
    },

    /// Remove packages
    Remove {
        /// Package names to remove
        packages: Vec<String>,
        #[arg(short = 'y', long)]
        no_confirm: bool,
    },

    /// Search for packages
    Search {
        /// Search query
        query: String,
    },

    /// Show package information
    Info {
        /// Package name
        package: String,
    },

    /// List package names
    List {
        /// List installable packages instead of installed ones
        #[arg(short, long)]
        available: bool,
    },

    /// Check for pending updates
    CheckUpdates,

    /// Update all system packages
    Update {
        #[arg(short = 'y', long)]
        no_confirm: bool,
    },

    /// Clean the package cache
    Clean {
        /// Package versions to keep
        #[arg(short, long)]
        keep: Option<u32>,
    },

    /// Remove orphaned packages
    Orphans,

    /// Regenerate the mirror list
    Mirrors {
        /// Country filter
        #[arg(short, long)]
        country: Option<String>,
        /// Number of mirrors to keep
        #[arg(short = 'n', long)]
        count: Option<u32>,
    },

    /// Font set management
    Font {
        #[command(subcommand)]
        command: FontCommands,
    },

    /// Run a raw bridge action (scripting entry point)
    Action {
        /// Action name, e.g. install, list_available, font_update_cache
        name: String,
        /// Positional action arguments
        args: Vec<String>,
    },

    /// Start the interactive menu (default)
    Menu,
}

#[derive(Subcommand, Debug)]
enum FontCommands {
    /// Install font sets
    Install { sets: Vec<String> },
    /// Remove font sets
    Remove { sets: Vec<String> },
    /// List installed font families
    List,
    /// Search installed font families
    Search { query: String },
    /// Rebuild the fontconfig cache
    UpdateCache,
}

/// What to do after input handling: nothing (cancelled or already answered),
/// the interactive menu, or one bridge action.
enum Planned {
    Menu,
    Action(Action),
}

/// Exit code for protocol-level failures: the envelope itself could not be
/// built or written. Application errors still exit 0 with an error envelope.
const EXIT_PROTOCOL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    ui::set_debug_mode(cli.debug);
    ui::init(
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        true,
    );

    match run(cli).await {
        Ok(()) => {}
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(EXIT_PROTOCOL_FAILURE);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    emit(
        Level::Debug,
        "bridge.protocol",
        &format!("envelope protocol v{PROTOCOL_VERSION}"),
        None,
    );

    let config = Config::load(cli.config.as_deref())?;

    // Interrupts stop submission of further batch items; classified work is
    // still reported.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                emit(
                    Level::Warn,
                    "signal.interrupt",
                    "Interrupt received, finishing the current item...",
                    None,
                );
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let command = cli.command.unwrap_or(Commands::Menu);

    // Input validation and confirmation happen before privilege acquisition:
    // bad arguments or a declined prompt must never cost an authentication.
    let Some(planned) = prepare(command)? else {
        return Ok(());
    };

    let needs_privilege = match &planned {
        Planned::Menu => true,
        Planned::Action(action) => action_needs_privilege(action),
    };

    let mut privileges = if needs_privilege {
        PrivilegeManager::acquire()
            .with_interval(Duration::from_secs(config.keepalive_interval_secs))
    } else {
        PrivilegeManager::unauthenticated()
    };
    privileges.start_keepalive();

    let mut ctx = BridgeContext::new(config, privileges.session(), cancel);

    let result = match planned {
        Planned::Menu => menu::run_menu(&mut ctx).await,
        Planned::Action(action) => {
            let envelope = dispatch(&mut ctx, action).await.with_request_id();
            render_envelope(&envelope).map_err(Into::into)
        }
    };

    // Deterministically cancel the keepalive so no background work outlives
    // the process.
    privileges.shutdown().await;

    result
}

fn action_needs_privilege(action: &Action) -> bool {
    match action {
        // Empty batches are rejected by the runner before any executor call,
        // so they never need an authentication either.
        Action::Install { items } | Action::Remove { items } => !items.is_empty(),
        Action::FontInstall { sets } | Action::FontRemove { sets } => !sets.is_empty(),
        Action::UpdateSystem
        | Action::CleanCache { .. }
        | Action::RemoveOrphans
        | Action::UpdateMirrors { .. } => true,
        _ => false,
    }
}

/// Turn a CLI command into a planned bridge action, prompting for
/// confirmation where the command mutates the system. Returns `None` when the
/// user declined or the answer has already been rendered.
fn prepare(command: Commands) -> Result<Option<Planned>> {
    let planned = match command {
        Commands::Menu => Planned::Menu,

        Commands::Install {
            packages,
            no_confirm,
        } => {
            if !no_confirm && !confirm_items("Install", &packages)? {
                emit(Level::Info, "install.cancelled", "Installation cancelled", None);
                return Ok(None);
            }
            Planned::Action(Action::Install { items: packages })
        }

        Commands::Remove {
            packages,
            no_confirm,
        } => {
            if !no_confirm && !confirm_items("Remove", &packages)? {
                emit(Level::Info, "remove.cancelled", "Removal cancelled", None);
                return Ok(None);
            }
            Planned::Action(Action::Remove { items: packages })
        }

        Commands::Search { query } => Planned::Action(Action::Search { query }),
        Commands::Info { package } => Planned::Action(Action::Info { item: package }),
        Commands::List { available } => Planned::Action(if available {
            Action::ListAvailable
        } else {
            Action::ListInstalled
        }),
        Commands::CheckUpdates => Planned::Action(Action::CheckUpdates),

        Commands::Update { no_confirm } => {
            if !no_confirm && !confirm("Update all system packages?")? {
                emit(Level::Info, "update.cancelled", "Update cancelled", None);
                return Ok(None);
            }
            Planned::Action(Action::UpdateSystem)
        }

        Commands::Clean { keep } => Planned::Action(Action::CleanCache { keep }),
        Commands::Orphans => Planned::Action(Action::RemoveOrphans),
        Commands::Mirrors { country, count } => {
            Planned::Action(Action::UpdateMirrors { country, count })
        }

        Commands::Font { command } => Planned::Action(match command {
            FontCommands::Install { sets } => Action::FontInstall { sets },
            FontCommands::Remove { sets } => Action::FontRemove { sets },
            FontCommands::List => Action::FontList,
            FontCommands::Search { query } => Action::FontSearch { query },
            FontCommands::UpdateCache => Action::FontUpdateCache,
        }),

        Commands::Action { name, args } => match Action::parse(&name, &args) {
            Ok(action) => Planned::Action(action),
            Err(err) => {
                let envelope = ResponseEnvelope::from_bridge_error(&err).with_request_id();
                render_envelope(&envelope)?;
                return Ok(None);
            }
        },
    };

    Ok(Some(planned))
}

fn confirm_items(verb: &str, items: &[String]) -> Result<bool> {
    if items.is_empty() {
        // The batch runner reports the validation error.
        return Ok(true);
    }
    confirm(&format!(
        "{verb} {} package(s): {}?",
        items.len(),
        items.join(", ")
    ))
}

fn confirm(prompt: &str) -> Result<bool> {
    use dialoguer::Confirm;

    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()?)
}

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use package_core::{
    ControllerHandle, ControllerSnapshot, ListViewMode, NotificationBus, SettingsProvider,
    SortColumn, SortSpec,
};
use shared::{domain::PackageId, settings::AppSettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod inventory;
mod settings;

use console::ConsoleProgress;
use inventory::Inventory;
use settings::SettingsFile;

#[derive(Parser, Debug)]
#[command(name = "pkgdeck", about = "Inspect and update locally installed packages")]
struct Args {
    /// Configuration file; `./pkgdeck.toml` is read when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed packages.
    List(ListOptions),
    /// List unpinned packages that have an update.
    Outdated,
    /// Update every unpinned package that has an update.
    UpdateAll,
    Pin {
        id: String,
    },
    Unpin {
        id: String,
    },
    Uninstall {
        id: String,
    },
    /// Write the installed packages to an XML file.
    Export {
        path: PathBuf,
    },
    /// Show or change persisted settings.
    Settings {
        #[arg(long)]
        tile_view: Option<bool>,
    },
}

#[derive(clap::Args, Debug)]
struct ListOptions {
    #[arg(long, short)]
    query: Option<String>,
    /// Require the whole title or id to match the query.
    #[arg(long)]
    exact: bool,
    #[arg(long)]
    updates_only: bool,
    #[arg(long, value_enum)]
    sort: Option<SortArg>,
    #[arg(long, requires = "sort")]
    desc: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Title,
    Id,
    Version,
    Latest,
}

impl From<SortArg> for SortColumn {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Title => SortColumn::Title,
            SortArg::Id => SortColumn::Id,
            SortArg::Version => SortColumn::Version,
            SortArg::Latest => SortColumn::LatestVersion,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let settings = crate::config::load_settings(args.config.as_deref())?;
    let app_settings = Arc::new(SettingsFile::load(&settings.settings_path)?);

    if let Command::Settings { tile_view } = &args.command {
        if let Some(tile_view) = *tile_view {
            app_settings.save(AppSettings {
                default_to_tile_view_for_local_source: tile_view,
            })?;
            info!(path = %app_settings.path().display(), "settings saved");
        }
        println!("{}", toml::to_string_pretty(&app_settings.settings())?);
        return Ok(());
    }

    let inventory = Arc::new(Inventory::open(&settings.inventory_path).await?);
    let handle = ControllerHandle::spawn(
        inventory.clone(),
        Arc::new(ConsoleProgress::default()),
        app_settings,
        NotificationBus::default(),
        settings.controller_config(),
    );
    handle.initialize().await?;

    match args.command {
        Command::List(options) => {
            if let Some(query) = options.query {
                handle.set_search_query(query).await?;
            }
            handle.set_match_word(options.exact).await?;
            handle
                .set_show_only_packages_with_update(options.updates_only)
                .await?;
            if let Some(column) = options.sort {
                let column = SortColumn::from(column);
                let sort = if options.desc {
                    SortSpec::descending(column)
                } else {
                    SortSpec::ascending(column)
                };
                handle.set_sort(Some(sort)).await?;
            }
            print_view(&handle.snapshot().await?);
        }
        Command::Outdated => {
            handle.set_show_only_packages_with_update(true).await?;
            print_view(&handle.snapshot().await?);
        }
        Command::UpdateAll => {
            handle.update_all().await?;
            print_view(&handle.snapshot().await?);
        }
        Command::Pin { id } => {
            let change = inventory.pin(&PackageId::new(id)).await?;
            handle.apply_change(change).await?;
            print_view(&handle.snapshot().await?);
        }
        Command::Unpin { id } => {
            let change = inventory.unpin(&PackageId::new(id)).await?;
            handle.apply_change(change).await?;
            print_view(&handle.snapshot().await?);
        }
        Command::Uninstall { id } => {
            let change = inventory.uninstall(&PackageId::new(id)).await?;
            handle.apply_change(change).await?;
            print_view(&handle.snapshot().await?);
        }
        Command::Export { path } => {
            handle.export_to(&path).await?;
            println!("Exported package list to {}", path.display());
        }
        Command::Settings { .. } => {}
    }

    Ok(())
}

fn print_view(snapshot: &ControllerSnapshot) {
    match snapshot.list_view_mode {
        ListViewMode::Tile => {
            for package in &snapshot.view {
                let marker = if package.can_update() { " *" } else { "" };
                println!("[{} {}{marker}]", package.display_name(), package.version);
            }
        }
        ListViewMode::Standard => {
            println!("{:<32} {:<28} {:<14} {:<14} PINNED", "TITLE", "ID", "VERSION", "LATEST");
            for package in &snapshot.view {
                let latest = package
                    .latest_version
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                println!(
                    "{:<32} {:<28} {:<14} {:<14} {}",
                    package.display_name(),
                    package.id.as_str(),
                    package.version.to_string(),
                    latest,
                    if package.is_pinned { "yes" } else { "" }
                );
            }
        }
    }
    println!(
        "{} of {} packages shown",
        snapshot.view.len(),
        snapshot.packages.len()
    );
}

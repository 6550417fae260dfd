//! Quarry CLI - operate on a local directory through the virtual file
//! system.
//!
//! Every invocation mounts one directory, runs one command and exits.
//! Lock tokens printed by `lock` are passed back with `--token`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quarry_config::{Config, ResolvedConfig};
use quarry_vfs::MountPoint;
use tracing::debug;

mod commands;
pub mod config_bridge;
mod theme;

use commands::tree::Transfer;
use commands::{archive, info, locks, props, tree};
use theme::Theme;

/// Quarry - virtual file system over a local directory
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the layered lookup
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory to mount (overrides config)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Workspace id (overrides config)
    #[arg(long, global = true)]
    workspace: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a folder
    Ls {
        /// Logical path
        #[arg(default_value = "/")]
        path: String,
        /// Show size, modification time and lock state
        #[arg(short, long)]
        long: bool,
    },

    /// Create a folder, including missing parents
    Mkdir {
        /// Logical path
        path: String,
    },

    /// Upload a file, creating or replacing it
    Put {
        /// Logical destination path
        path: String,
        /// Local file to read (stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Lock token of the destination
        #[arg(long)]
        token: Option<String>,
    },

    /// Print file content
    Cat {
        /// Logical path
        path: String,
    },

    /// Delete a file or folder
    Rm {
        /// Logical path
        path: String,
        /// Lock token of the file
        #[arg(long)]
        token: Option<String>,
    },

    /// Move or rename an item
    Mv {
        /// Item to move
        source: String,
        /// Destination folder
        dest: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// Replace an existing destination
        #[arg(long)]
        overwrite: bool,
        /// Lock token of the source
        #[arg(long)]
        token: Option<String>,
    },

    /// Copy an item
    Cp {
        /// Item to copy
        source: String,
        /// Destination folder
        dest: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// Replace an existing destination
        #[arg(long)]
        overwrite: bool,
    },

    /// Lock a file and print the token
    Lock {
        /// Logical path
        path: String,
        /// Seconds until the lock expires; 0 never expires
        #[arg(short, long, default_value = "0")]
        timeout: u64,
    },

    /// Release a lock
    Unlock {
        /// Logical path
        path: String,
        /// Token printed by `lock`
        token: String,
    },

    /// Show properties and access list
    Props {
        /// Logical path
        path: String,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Set or clear a property
    Setprop {
        /// Logical path
        path: String,
        /// Property name
        name: String,
        /// New value (clears the property when omitted)
        value: Option<String>,
        /// Lock token of the file
        #[arg(long)]
        token: Option<String>,
    },

    /// Export a folder as a zip archive
    Zip {
        /// Logical folder path
        path: String,
        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a zip archive into a folder
    Unzip {
        /// Local archive
        archive: PathBuf,
        /// Logical destination folder
        #[arg(default_value = "/")]
        path: String,
        /// Replace existing files
        #[arg(long)]
        overwrite: bool,
        /// Leading path segments to drop from every entry
        #[arg(long, default_value = "0")]
        strip: usize,
    },

    /// Print MD5 sums of every file below a folder
    Md5 {
        /// Logical folder path
        #[arg(default_value = "/")]
        path: String,
    },

    /// Print the id of a path, or the path of an id
    Id {
        /// Logical path, or an id with --resolve
        value: String,
        /// Treat the value as an id
        #[arg(long)]
        resolve: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("{e:#}")));
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let resolved = load_config(&cli, &cwd)?;
    let mut cfg = resolved.config;
    if let Some(root) = &cli.root {
        cfg.mount.root.clone_from(root);
    }
    if let Some(workspace) = &cli.workspace {
        cfg.mount.workspace_id.clone_from(workspace);
    }

    let mut log_config = config_bridge::to_log_config(&cfg);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = quarry_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
    for file in &resolved.loaded_files {
        debug!(path = %file, "config file applied");
    }

    let root = config_bridge::mount_root(&cfg, &cwd);
    let mount = MountPoint::builder(cfg.mount.workspace_id.clone(), &root)
        .with_options(config_bridge::to_mount_options(&cfg))
        .build()
        .with_context(|| format!("cannot mount {}", root.display()))?;

    dispatch(&mount, cli.command)
}

fn load_config(cli: &Cli, cwd: &std::path::Path) -> Result<ResolvedConfig> {
    match &cli.config {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("cannot load config {}", path.display())),
        None => Config::load(Some(cwd)).context("cannot load configuration"),
    }
}

fn dispatch(mount: &MountPoint, command: Commands) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match command {
        Commands::Ls { path, long } => tree::ls(mount, &path, long, &mut stdout),
        Commands::Mkdir { path } => tree::mkdir(mount, &path),
        Commands::Put { path, file, token } => {
            tree::put(mount, &path, file.as_deref(), token.as_deref())
        },
        Commands::Cat { path } => tree::cat(mount, &path, &mut stdout),
        Commands::Rm { path, token } => tree::rm(mount, &path, token.as_deref()),
        Commands::Mv {
            source,
            dest,
            name,
            overwrite,
            token,
        } => {
            let transfer = Transfer {
                source: &source,
                dest_folder: &dest,
                name: name.as_deref(),
                overwrite,
            };
            tree::mv(mount, &transfer, token.as_deref())
        },
        Commands::Cp {
            source,
            dest,
            name,
            overwrite,
        } => {
            let transfer = Transfer {
                source: &source,
                dest_folder: &dest,
                name: name.as_deref(),
                overwrite,
            };
            tree::cp(mount, &transfer)
        },
        Commands::Lock { path, timeout } => locks::lock(mount, &path, timeout).map(|_| ()),
        Commands::Unlock { path, token } => locks::unlock(mount, &path, &token),
        Commands::Props { path, json } => props::props(mount, &path, json, &mut stdout),
        Commands::Setprop {
            path,
            name,
            value,
            token,
        } => props::setprop(mount, &path, &name, value.as_deref(), token.as_deref()),
        Commands::Zip { path, output } => {
            archive::zip(mount, &path, output.as_deref()).map(|_| ())
        },
        Commands::Unzip {
            archive: file,
            path,
            overwrite,
            strip,
        } => archive::unzip(mount, &path, &file, overwrite, strip),
        Commands::Md5 { path } => info::md5(mount, &path, &mut stdout),
        Commands::Id { value, resolve } => info::id(mount, &value, resolve, &mut stdout),
    }
}

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cmd::commands::{
    cat_command, cp_command, get_command, list_command, mkdir_command, mv_command, put_command,
    rm_command, stat_command,
};
use cmd::common::{credential_from_vars, load_config, open_filesystem};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "adls")]
struct Cli {
    /// YAML adapter config (defaults to $ADLSFS_CONFIG, then ADLSFS_ACCOUNT/ADLSFS_FILESYSTEM)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory, a filesystem, or the account's filesystems
    Ls {
        #[arg(default_value = "")]
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show the type, size and modification time of one path
    Stat { path: String },
    /// Write a remote file to stdout
    Cat { path: String },
    /// Upload a local file
    Put {
        local: PathBuf,
        remote: String,
        #[arg(long)]
        content_type: Option<String>,
        /// Append to the remote file instead of replacing it
        #[arg(short, long)]
        append: bool,
    },
    /// Download a remote file
    Get { remote: String, local: PathBuf },
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parents (and the filesystem) as needed
        #[arg(short, long)]
        parents: bool,
    },
    /// Remove a file or directory
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
        /// Ignore missing paths
        #[arg(short, long)]
        force: bool,
    },
    /// Move or rename within the account
    Mv {
        src: String,
        dst: String,
        /// Replace an existing destination file
        #[arg(long)]
        overwrite: bool,
    },
    /// Copy a remote file
    Cp { src: String, dst: String },
}

fn main() -> Result<()> {
    diagnostics::init_diagnostics();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let fs = open_filesystem(&config, credential_from_vars(|name| std::env::var(name).ok()))?;
    let fs = fs.as_ref();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Ls { path, recursive } => {
            _ = list_command(fs, path, *recursive, &mut out)?;
        }
        Commands::Stat { path } => stat_command(fs, path, &mut out)?,
        Commands::Cat { path } => {
            _ = cat_command(fs, path, &mut out)?;
        }
        Commands::Put {
            local,
            remote,
            content_type,
            append,
        } => {
            _ = put_command(fs, local, remote, content_type.as_deref(), *append)?;
        }
        Commands::Get { remote, local } => {
            _ = get_command(fs, remote, local)?;
        }
        Commands::Mkdir { path, parents } => mkdir_command(fs, path, *parents)?,
        Commands::Rm {
            path,
            recursive,
            force,
        } => rm_command(fs, path, *recursive, *force)?,
        Commands::Mv {
            src,
            dst,
            overwrite,
        } => mv_command(fs, src, dst, *overwrite)?,
        Commands::Cp { src, dst } => cp_command(fs, src, dst)?,
    }
    out.flush()?;
    Ok(())
}

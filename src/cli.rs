use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lgm", about = "Local git manager: bare origins with one clone per workspace")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pick a workspace interactively and print its path
    List,
    /// Print a non-interactive summary of every workspace
    Status,
    /// List projects under the managed root
    Projects,
    /// List the workspaces of a project
    Workspaces {
        project: String,
    },
    /// Create a project with a bare origin and a first workspace
    NewProject {
        name: String,
        /// Name of the first workspace
        #[arg(long, short, default_value = "main")]
        workspace: String,
        /// Create only the project, without a workspace
        #[arg(long, conflicts_with = "workspace")]
        empty: bool,
    },
    /// Add a workspace to an existing project
    New {
        /// Workspace name, also used as its branch
        name: String,
        #[arg(long, short)]
        project: String,
    },
    /// Copy a folder into a new project with fresh history
    Import {
        source: PathBuf,
        /// Project name (defaults to the folder name)
        #[arg(long)]
        project: Option<String>,
        /// Workspace name
        #[arg(long)]
        workspace: Option<String>,
        /// Do not ask before copying environment folders
        #[arg(long, short)]
        yes: bool,
    },
    /// Move an existing working copy into the managed layout
    Adopt {
        path: PathBuf,
        /// Fetch remote history without asking
        #[arg(long, conflicts_with = "no_fetch")]
        fetch: bool,
        /// Never fetch remote history
        #[arg(long)]
        no_fetch: bool,
        /// Answer yes to every question
        #[arg(long, short)]
        yes: bool,
    },
    /// Find working copies under the root that are not projects
    Scan {
        /// Offer to adopt each one
        #[arg(long)]
        adopt: bool,
        /// Adopt without asking
        #[arg(long, short, requires = "adopt")]
        yes: bool,
    },
    /// Rewrite the session script, notebook helper and editor settings
    Regen {
        project: String,
        workspace: String,
    },
    /// Show or change the managed root
    Root {
        path: Option<PathBuf>,
    },
    /// Show or change the editor used by launchers
    Editor {
        path: Option<PathBuf>,
    },
    /// Write a launcher script for a workspace
    Launcher {
        project: String,
        workspace: String,
    },
    /// List launcher scripts
    Launchers,
    /// Run a launcher script by file name
    Run {
        name: String,
    },
    /// Open a workspace in the editor
    Open {
        project: String,
        workspace: String,
    },
    /// Print version
    Version,
}

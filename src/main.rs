mod adopt;
mod cli;
mod config;
mod context;
mod error;
mod git;
mod launcher;
mod names;
mod paths;
mod project;
mod prompt;
mod session;
mod tui;
mod workspace;

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::{Config, ConfigStore};
use context::Context;
use git::GitRunner;
use launcher::Launchers;
use prompt::{Confirm, Fixed, TtyPrompt};
use session::SessionFiles;
use workspace::{Created, ImportOptions, ImportOutcome, WorkspaceEntry};

fn init_logging() {
    let filter = EnvFilter::try_from_env("LGM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let store = ConfigStore::new(config::data_dir()?);
    let mut config = store.load()?;
    let files = SessionFiles::new(&config.global_venv_path);

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => {
            let ctx = context(&config, &files, &TtyPrompt);
            let entries = workspace::list_all_entries(&ctx)?;
            if let Some(path) = tui::run_picker(entries)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Status => {
            let ctx = context(&config, &files, &TtyPrompt);
            print_status(&workspace::list_all_entries(&ctx)?);
            Ok(())
        }
        Commands::Projects => {
            let ctx = context(&config, &files, &TtyPrompt);
            for project in project::list_projects(&ctx)? {
                println!("{}", project.name);
            }
            Ok(())
        }
        Commands::Workspaces { project } => {
            let ctx = context(&config, &files, &TtyPrompt);
            let project = project::find_project(&ctx, &project)?;
            for ws in workspace::list_workspaces(&project)? {
                println!("{}", ws.name);
            }
            Ok(())
        }
        Commands::NewProject {
            name,
            workspace,
            empty,
        } => {
            let ctx = context(&config, &files, &TtyPrompt);
            let project = project::create_project(&ctx, &name)?;
            eprintln!(
                "{} project {} at {}",
                "Created".green(),
                project.name.bold(),
                project.paths.dir.display().dimmed()
            );
            if !empty {
                let created = workspace::create_workspace(&ctx, &project, &workspace)?;
                report_created("Created", &created);
            }
            Ok(())
        }
        Commands::New { name, project } => {
            let ctx = context(&config, &files, &TtyPrompt);
            let project = project::find_project(&ctx, &project)?;
            let created = workspace::create_workspace(&ctx, &project, &name)?;
            report_created("Created", &created);
            Ok(())
        }
        Commands::Import {
            source,
            project,
            workspace,
            yes,
        } => {
            let confirm = confirmer(yes);
            let ctx = context(&config, &files, confirm.as_ref());
            let opts = ImportOptions { project, workspace };
            match workspace::import_folder(&ctx, &source, opts)? {
                ImportOutcome::Imported {
                    created,
                    kept_env_dirs,
                } => {
                    report_created("Imported", &created);
                    if !kept_env_dirs.is_empty() {
                        eprintln!(
                            "  {} copied environment folder(s) left as they were: {}",
                            "note:".yellow(),
                            kept_env_dirs.join(", ")
                        );
                    }
                }
                ImportOutcome::Cancelled => eprintln!("{}", "Import cancelled".yellow()),
            }
            Ok(())
        }
        Commands::Adopt {
            path,
            fetch,
            no_fetch,
            yes,
        } => {
            let confirm = confirmer(yes);
            let ctx = context(&config, &files, confirm.as_ref());
            let policy = if fetch {
                adopt::FetchPolicy::Always
            } else if no_fetch {
                adopt::FetchPolicy::Never
            } else {
                adopt::FetchPolicy::Ask
            };
            adopt_and_report(&ctx, &path, policy)
        }
        Commands::Scan { adopt: offer, yes } => {
            let confirm = confirmer(yes);
            let ctx = context(&config, &files, confirm.as_ref());
            let found = project::find_unmanaged(&ctx)?;
            if found.is_empty() {
                eprintln!("no unmanaged repositories under {}", ctx.root().display());
                return Ok(());
            }
            for path in found {
                println!("{}", path.display());
                if offer {
                    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                    if ctx.confirm.confirm(&format!("Adopt '{name}' into the managed layout?")) {
                        adopt_and_report(&ctx, &path, adopt::FetchPolicy::Ask)?;
                    }
                }
            }
            Ok(())
        }
        Commands::Regen { project, workspace } => {
            let ctx = context(&config, &files, &TtyPrompt);
            let ws = workspace::find_workspace(&ctx, &project, &workspace)?;
            ctx.files.generate(&ws.project, &ws.path)?;
            eprintln!("{} workspace files in {}", "Regenerated".green(), ws.path.display());
            Ok(())
        }
        Commands::Root { path } => {
            if let Some(path) = path {
                paths::ensure(&path)?;
                config.base_dir = path.canonicalize()?;
                store.save(&config)?;
                eprintln!("{} managed root", "Updated".green());
            }
            println!("{}", config.base_dir.display());
            Ok(())
        }
        Commands::Editor { path } => {
            if let Some(path) = path {
                config.editor_path = Some(path);
                store.save(&config)?;
                eprintln!("{} editor", "Updated".green());
            }
            match &config.editor_path {
                Some(editor) => println!("{}", editor.display()),
                None => eprintln!("no editor configured - set one with `lgm editor <path>`"),
            }
            Ok(())
        }
        Commands::Launcher { project, workspace } => {
            let ctx = context(&config, &files, &TtyPrompt);
            let ws = workspace::find_workspace(&ctx, &project, &workspace)?;
            let path = Launchers::new(&config.launchers_dir).generate(
                config.editor_path.as_deref(),
                &ws.project,
                &ws.name,
                &ws.path,
            )?;
            eprintln!("{} launcher", "Created".green());
            println!("{}", path.display());
            Ok(())
        }
        Commands::Launchers => {
            for name in Launchers::new(&config.launchers_dir).list()? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Run { name } => Launchers::new(&config.launchers_dir).run(&name),
        Commands::Open { project, workspace } => {
            let ctx = context(&config, &files, &TtyPrompt);
            let ws = workspace::find_workspace(&ctx, &project, &workspace)?;
            launcher::open_in_editor(config.editor_path.as_deref(), &ws.path)
        }
        Commands::Version => {
            println!("{} {}", "lgm".bold().cyan(), env!("CARGO_PKG_VERSION").bright_white());
            Ok(())
        }
    }
}

fn context<'a>(config: &Config, files: &'a SessionFiles, confirm: &'a dyn Confirm) -> Context<'a> {
    let git = GitRunner::default().with_env("GIT_TERMINAL_PROMPT", "0");
    Context::new(&config.base_dir, git, files, confirm)
}

fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(Fixed(true))
    } else {
        Box::new(TtyPrompt)
    }
}

fn adopt_and_report(ctx: &Context, path: &Path, policy: adopt::FetchPolicy) -> Result<()> {
    let adopted = adopt::adopt(ctx, path, policy)?;
    if let Some(staged) = &adopted.staged_at {
        eprintln!("  {} {}", "staged via".dimmed(), staged.display());
    }
    if adopted.fetched {
        eprintln!("  {} remote history", "Fetched".cyan());
    }
    report_created("Adopted", &adopted.created);
    Ok(())
}

fn report_created(verb: &str, created: &Created) {
    eprintln!(
        "{} workspace {} in project {}",
        verb.green(),
        created.workspace.name.bold(),
        created.project.name.bold()
    );
    eprintln!("  {} {}", "origin:".dimmed(), created.project.paths.origin.display());
    if let Some(err) = &created.files_error {
        eprintln!("  {} workspace files were not written: {}", "warning:".yellow(), err);
    }
    println!("{}", created.workspace.path.display());
}

fn print_status(entries: &[WorkspaceEntry]) {
    if entries.is_empty() {
        eprintln!("no workspaces found");
        return;
    }
    let mut current = None;
    for entry in entries {
        if current != Some(&entry.project) {
            println!("{}", entry.project.bold().cyan());
            current = Some(&entry.project);
        }
        let branch = entry.branch.as_deref().unwrap_or("(detached)");
        let origin = if entry.tracks_origin {
            format!("{:<16}", "linked").green().to_string()
        } else {
            format!("{:<16}", "origin elsewhere").red().to_string()
        };
        let changes = match entry.changes {
            Some(0) => "clean".dimmed().to_string(),
            Some(n) => format!("{n} changed").green().to_string(),
            None => "?".dimmed().to_string(),
        };
        println!(
            "  {:<20} {} {} {} {}",
            entry.name,
            format!("{branch:<24}").magenta(),
            origin,
            format!("{:<10}", tui::format_time_ago(entry.last_modified)).yellow(),
            changes
        );
    }
}

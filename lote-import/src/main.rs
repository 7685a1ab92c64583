//! lote-import - bulk work-item import tool
//!
//! Reads a delimited file of work items, validates it, shows a preview and
//! creates (or updates) the items in the remote work-tracking service.
//! An interrupted import can be resumed from the persisted session.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lote_common::config::{
    database_path, default_config_path, load_toml_config, resolve_config_path, write_toml_config,
    RootFolderResolver, TomlConfig,
};
use lote_common::events::{EventBus, ImportEvent};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use lote_import::config::resolve_credentials;
use lote_import::db::{init_database_pool, SqliteStore};
use lote_import::models::{ImportMode, ImportSession, ImportState, WorkItemType};
use lote_import::remote::HttpTracker;
use lote_import::report::report_file_name;
use lote_import::template::generate_template;
use lote_import::{ImportConfig, ImportWorkflow, RestoreOutcome};

/// Command-line arguments for lote-import
#[derive(Parser, Debug)]
#[command(name = "lote-import")]
#[command(about = "Bulk work-item import")]
#[command(version)]
struct Args {
    /// Config file (default: LOTE_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding lote.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    /// Login identity (default: LOTE_IDENTITY, then [remote] identity)
    #[arg(long)]
    identity: Option<String>,

    /// Login secret (default: LOTE_SECRET)
    #[arg(long)]
    secret: Option<String>,

    /// Skip the preview confirmation
    #[arg(short, long)]
    yes: bool,

    /// Where to write the result report
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a file
    Import {
        file: PathBuf,

        /// create or update
        #[arg(short, long, default_value = "create")]
        mode: ImportMode,

        /// Name recorded in history (default: file name and time)
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        login: LoginArgs,
    },

    /// Continue the persisted import session
    Resume {
        #[command(flatten)]
        login: LoginArgs,
    },

    /// Discard the persisted import session
    Reset,

    /// Past imports
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },

    /// Write an import template
    Template {
        /// Types to include, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        types: Vec<WorkItemType>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a config file with the default settings
    InitConfig {
        /// Destination (default: the user config dir)
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    /// List past imports, newest first
    List,
    /// Delete all history
    Clear,
    /// Regenerate the report of a past import
    Redownload {
        id: Uuid,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = load_toml_config(config_path.as_deref())?;

    // RUST_LOG wins over [logging] level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &toml_config.logging.level;
                format!("lote_import={level},lote_common={level},warn").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("lote-import {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    if let Command::Template { types, output } = &args.command {
        let text = generate_template(types)?;
        return write_output(output.as_deref(), &text);
    }
    if let Command::InitConfig { path, force } = &args.command {
        return init_config(path.clone(), *force);
    }

    let root_folder = RootFolderResolver::new(args.root_folder.clone(), &toml_config).resolve();
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    let store = Arc::new(SqliteStore::new(pool));

    let tracker = Arc::new(
        HttpTracker::new(
            toml_config.remote.base_url.clone(),
            Duration::from_secs(toml_config.remote.timeout_secs),
        )
        .context("Failed to build HTTP client")?,
    );
    let events = EventBus::new(100);

    let mut workflow = ImportWorkflow::new(
        ImportConfig::from_toml(&toml_config),
        store.clone(),
        store,
        tracker,
        events,
    )
    .await?;

    match args.command {
        Command::Import {
            file,
            mode,
            name,
            login,
        } => {
            if let Some(RestoreOutcome::Restored { .. }) = workflow.restore().await? {
                warn!("An unfinished import session was found and will be replaced");
                workflow.reset_import().await?;
            }
            workflow.select_file(&file, mode).await?;
            if let Some(name) = name {
                workflow.set_import_name(name);
            }
            let processed = workflow.process_file().await.map(|_| ());
            if let Err(e) = processed {
                print_rejections(workflow.session());
                return Err(e.into());
            }
            run_import(&mut workflow, &toml_config, login).await
        }
        Command::Resume { login } => match workflow.restore().await? {
            None => bail!("Nenhuma importação pendente"),
            Some(RestoreOutcome::Discarded { saved_at }) => {
                bail!("A sessão salva em {} expirou e foi descartada", saved_at)
            }
            Some(RestoreOutcome::Restored {
                state,
                saved_at,
                pending,
            }) => {
                println!(
                    "Sessão de {} restaurada ({}; {} registro(s) pendente(s))",
                    saved_at.format("%Y-%m-%d %H:%M"),
                    state,
                    pending
                );
                if state == ImportState::Completed {
                    return print_outcome(&workflow, login.report);
                }
                if state == ImportState::FileSelected {
                    workflow.process_file().await?;
                }
                run_import(&mut workflow, &toml_config, login).await
            }
        },
        Command::Reset => {
            workflow.restore().await?;
            workflow.reset_import().await?;
            println!("Sessão descartada");
            Ok(())
        }
        Command::History { action } => match action {
            HistoryCommand::List => {
                for entry in workflow.history().entries() {
                    println!(
                        "{}  {}  {:<16}  total={} sucesso={} erro={}  {}",
                        entry.id,
                        entry.timestamp.format("%Y-%m-%d %H:%M"),
                        entry.status.as_str(),
                        entry.total_activities,
                        entry.success_count,
                        entry.error_count,
                        entry.import_name
                    );
                }
                if workflow.history().is_empty() {
                    println!("Histórico vazio");
                }
                Ok(())
            }
            HistoryCommand::Clear => {
                workflow.history_mut().clear().await?;
                println!("Histórico apagado");
                Ok(())
            }
            HistoryCommand::Redownload { id, output } => {
                let text = workflow.history().redownload(id)?;
                write_output(output.as_deref(), &text)
            }
        },
        Command::Template { .. } | Command::InitConfig { .. } => Ok(()),
    }
}

/// Preview, confirm, execute, report
async fn run_import(
    workflow: &mut ImportWorkflow,
    toml_config: &TomlConfig,
    login: LoginArgs,
) -> Result<()> {
    print_preview(workflow.session());
    if !login.yes && !confirm("Enviar os registros válidos? [s/N] ")? {
        println!("Importação mantida em pré-visualização; use `resume` para continuar");
        return Ok(());
    }

    let credentials = resolve_credentials(login.identity, login.secret, toml_config)?;

    let cancel = workflow.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling import");
            cancel.cancel();
        }
    });

    let mut rx = workflow.events().subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let ImportEvent::Progress {
                completed, total, ..
            } = event
            {
                eprint!("{}", progress_line(completed, total));
            }
        }
    });

    let outcome = workflow.execute_import(&credentials).await.map(|_| ());
    // The bus outlives the run, so the printer never sees Closed
    progress.abort();
    outcome?;
    let sent = workflow.session().map(|s| s.progress.total).unwrap_or(0);
    eprintln!("{}", progress_line(sent, sent));

    print_outcome(workflow, login.report)
}

/// Summary line plus the report file of a finished import
fn print_outcome(workflow: &ImportWorkflow, report: Option<PathBuf>) -> Result<()> {
    let results = workflow
        .session()
        .map(|s| s.results.clone())
        .unwrap_or_default();
    println!(
        "Importação concluída: {} sucesso(s), {} erro(s) de {} registro(s)",
        results.success_count(),
        results.error_count(),
        results.total
    );

    let report_path = match report {
        Some(path) => path,
        None => PathBuf::from(report_file_name(
            workflow
                .session()
                .map(|s| s.import_name.as_str())
                .unwrap_or("importacao"),
        )),
    };
    std::fs::write(&report_path, workflow.report()?)
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    println!("Relatório: {}", report_path.display());
    Ok(())
}

fn progress_line(completed: usize, total: usize) -> String {
    format!("\rEnviados {}/{}", completed, total)
}

fn print_preview(session: Option<&ImportSession>) {
    let Some(session) = session else {
        return;
    };
    println!(
        "{}: {} registro(s) válido(s), {} linha(s) com erro",
        session.import_name,
        session.pending_records().len(),
        session.results.error_count()
    );
    for record in session.pending_records().iter().take(10) {
        println!(
            "  linha {:>4}  {:<12} {}",
            record.original_line,
            record.kind_label(),
            record.title
        );
    }
    print_rejections(Some(session));
}

fn print_rejections(session: Option<&ImportSession>) {
    let Some(session) = session else {
        return;
    };
    for message in &session.parse_errors {
        eprintln!("  {}", message);
    }
    for failure in &session.results.errors {
        if failure.line > 0 {
            eprintln!("  Linha {}: {}", failure.line, failure.message);
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "s" | "sim" | "y" | "yes"))
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(path) = path.or_else(default_config_path) else {
        bail!("No user config directory on this system; pass a path");
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    write_toml_config(&TomlConfig::default(), &path)?;
    println!("Configuração gerada: {}", path.display());
    Ok(())
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Arquivo gerado: {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

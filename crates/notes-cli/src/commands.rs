use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use tracing::warn;

use notes_bus::{ActionBus, ActionComplete};
use notes_coordinator::{CoordinatorHandle, NotesConfig, PersistenceCoordinator};
use notes_types::{Note, NoteId, Operation, Params, Payload};

use crate::cli::*;
use crate::editor;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.data_dir.clone())?;
    let format = cli.format;

    if let Command::Compact = cli.command {
        return cmd_compact(&config, format);
    }

    let session = Session::open(&config)?;
    let result = match cli.command {
        Command::Add(args) => cmd_add(&session, args, format).await,
        Command::Edit(args) => cmd_edit(&session, args, format).await,
        Command::Show(args) => cmd_show(&session, args, format).await,
        Command::List => cmd_list(&session, format).await,
        Command::Delete(args) => cmd_delete(&session, args, format).await,
        Command::Compact => cmd_compact(&config, format),
    };
    finish(session, result).await
}

/// Close the session without masking the command's own error.
async fn finish(session: Session, result: anyhow::Result<()>) -> anyhow::Result<()> {
    let closed = session.close().await;
    match (result, closed) {
        (Err(e), Err(close)) => {
            warn!(error = %close, "failed to close session");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => closed,
    }
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<NotesConfig> {
    let mut config = match path {
        Some(path) => NotesConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => NotesConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

/// A coordinator running for the duration of one command.
struct Session {
    handle: CoordinatorHandle,
}

impl Session {
    fn open(config: &NotesConfig) -> anyhow::Result<Self> {
        let bus = Arc::new(ActionBus::with_capacity(config.completion_capacity));
        let driver = config
            .open_driver()
            .with_context(|| format!("failed to open {}", config.data_dir.display()))?;
        let handle = PersistenceCoordinator::start(bus, driver, config.store.clone())?;
        Ok(Self { handle })
    }

    /// Run one action and wait for it. A failed action becomes an error.
    async fn call(&self, operation: Operation, params: Params) -> anyhow::Result<ActionComplete> {
        let done = self.handle.request(operation.as_str(), params).await?;
        if !done.ok {
            match &done.error {
                Some(error) => bail!("{operation} failed: {error}"),
                None => bail!("{operation} failed"),
            }
        }
        Ok(done)
    }

    async fn get(&self, id: u64) -> anyhow::Result<Note> {
        let done = self.call(Operation::Get, id_params(id)).await?;
        match done.result {
            Payload::Note(note) => Ok(note),
            _ => bail!("note {id} not found"),
        }
    }

    async fn close(self) -> anyhow::Result<()> {
        self.handle.shutdown().await?;
        Ok(())
    }
}

fn id_params(id: u64) -> Params {
    notes_types::params::from_value(json!({ "id": id }))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_note(note: &Note) {
    println!("{} {}", format!("#{}", note.id).yellow().bold(), note.title.bold());
    if !note.note.is_empty() {
        println!("{}", note.note);
    }
}

async fn cmd_add(session: &Session, args: AddArgs, format: OutputFormat) -> anyhow::Result<()> {
    let Some(draft) = editor::prepare(&args.title, &args.note) else {
        bail!("a note needs a title or a body");
    };
    let done = session.call(Operation::Add, editor::draft_params(&draft)?).await?;
    let Some(id) = done.result.as_id() else {
        bail!("add returned no id");
    };
    match format {
        OutputFormat::Json => print_json(&json!({ "id": id, "title": draft.title, "note": draft.note })),
        OutputFormat::Text => {
            println!("{} Added note {}", "✓".green().bold(), format!("#{id}").yellow());
            Ok(())
        }
    }
}

async fn cmd_edit(session: &Session, args: EditArgs, format: OutputFormat) -> anyhow::Result<()> {
    let existing = session.get(args.id).await?;
    let Some(draft) = editor::merge(&existing, args.title, args.note) else {
        bail!("a note needs a title or a body");
    };
    session.call(Operation::Put, editor::draft_params(&draft)?).await?;
    let updated = draft.into_note(existing.id);
    match format {
        OutputFormat::Json => print_json(&updated),
        OutputFormat::Text => {
            println!("{} Updated note {}", "✓".green().bold(), format!("#{}", updated.id).yellow());
            Ok(())
        }
    }
}

async fn cmd_show(session: &Session, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let note = session.get(args.id).await?;
    match format {
        OutputFormat::Json => print_json(&note),
        OutputFormat::Text => {
            print_note(&note);
            Ok(())
        }
    }
}

async fn cmd_list(session: &Session, format: OutputFormat) -> anyhow::Result<()> {
    let done = session.call(Operation::GetAll, Params::new()).await?;
    let notes = done.result.as_notes().unwrap_or_default();
    match format {
        OutputFormat::Json => print_json(&notes),
        OutputFormat::Text => {
            if notes.is_empty() {
                println!("No notes.");
            }
            for note in notes {
                let preview: String = note.note.lines().next().unwrap_or("").chars().take(60).collect();
                println!(
                    "{:>6}  {}  {}",
                    format!("#{}", note.id).yellow(),
                    note.title.bold(),
                    preview.dimmed()
                );
            }
            Ok(())
        }
    }
}

async fn cmd_delete(session: &Session, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    session.call(Operation::Delete, id_params(args.id)).await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "deleted": NoteId::new(args.id) })),
        OutputFormat::Text => {
            println!("{} Deleted note {}", "✓".green().bold(), format!("#{}", args.id).yellow());
            Ok(())
        }
    }
}

/// Compaction talks to the store directly; no coordinator is running.
fn cmd_compact(config: &NotesConfig, format: OutputFormat) -> anyhow::Result<()> {
    let driver = config.open_driver()?;
    if !driver.backend().exists(&config.store.name)? {
        println!("Nothing to compact.");
        return Ok(());
    }
    let mut conn = driver.open(&config.store)?;
    conn.compact()?;
    let live = conn.count()?;
    conn.close();
    match format {
        OutputFormat::Json => print_json(&json!({ "compacted": true, "notes": live })),
        OutputFormat::Text => {
            println!("{} Compacted store {} ({} notes)", "✓".green().bold(), config.store.name.bold(), live);
            Ok(())
        }
    }
}

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use serde_json::Value;

use notevault::{JsonSettings, Note, NoteStore, Result, SortDirection};

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(version, about = "File-backed note collection store")]
struct Cli {
    /// Path to the settings file
    #[clap(short, long, default_value = "notevault-settings.json")]
    settings: PathBuf,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a backup directory and remember it for later runs
    Load {
        /// Directory containing the record files
        dir: PathBuf,
    },

    /// List notes in the current sort order
    List {
        /// Include archived notes
        #[clap(short, long)]
        archived: bool,

        /// Include trashed notes
        #[clap(short, long)]
        trashed: bool,
    },

    /// Create a new note
    Add {
        /// Title of the note
        #[clap(short = 'T', long)]
        title: String,

        /// Content of the note
        #[clap(short, long)]
        content: Option<String>,
    },

    /// Set or clear the archived flag on notes by creation timestamp
    Archive {
        creations: Vec<i64>,

        /// Clear the flag instead of setting it
        #[clap(long)]
        undo: bool,
    },

    /// Set or clear the trashed flag on notes by creation timestamp
    Trash {
        creations: Vec<i64>,

        /// Clear the flag instead of setting it
        #[clap(long)]
        undo: bool,
    },

    /// List known categories
    Categories,

    /// Change the sort order
    Sort {
        /// Field to sort by (e.g. title, creation, lastModification)
        predicate: String,

        /// Sort descending
        #[clap(long)]
        desc: bool,
    },
}

fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();
}

fn select_notes(store: &NoteStore, creations: &[i64]) -> Vec<Note> {
    store
        .notes()
        .iter()
        .filter(|note| note.creation.is_some_and(|c| creations.contains(&c)))
        .cloned()
        .collect()
}

fn print_notes(notes: &[Note]) {
    for note in notes {
        let title = note
            .field("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)");
        let mut flags = String::new();
        if note.archived {
            flags.push('A');
        }
        if note.trashed {
            flags.push('T');
        }
        println!(
            "{:>13}  {:<2}  {}",
            note.creation.unwrap_or_default(),
            flags,
            title
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_logger();
    let cli = Cli::parse();

    let settings = JsonSettings::open(&cli.settings)?;
    let mut store = NoteStore::new(Box::new(settings));

    if let Commands::Load { dir } = &cli.command {
        let summary = store.load_notes(dir).await?;
        println!("Loaded {} notes from {}", summary.loaded, dir.display());
        for (path, reason) in &summary.failed {
            eprintln!("skipped {}: {}", path.display(), reason);
        }
        return Ok(());
    }

    let Some(backup) = store.backup_folder().map(Path::to_path_buf) else {
        eprintln!("No backup folder configured; run `notevault load <dir>` first.");
        std::process::exit(2);
    };
    let summary = store.load_notes(&backup).await?;
    info!("Loaded {} notes from {}", summary.loaded, backup.display());

    match cli.command {
        Commands::Load { .. } => unreachable!(),

        Commands::List { archived, trashed } => {
            let visible = store
                .filter_notes(|note| (archived || !note.archived) && (trashed || !note.trashed));
            print_notes(&visible);
        }

        Commands::Add { title, content } => {
            let mut note = Note::default();
            note.extra.insert("title".to_string(), Value::String(title));
            if let Some(content) = content {
                note.extra
                    .insert("content".to_string(), Value::String(content));
            }
            let saved = store.save_note(note, true, true)?;
            println!("Created note {}", saved.creation.unwrap_or_default());
        }

        Commands::Archive { creations, undo } => {
            let selected = select_notes(&store, &creations);
            let updated = store.archive_notes(selected, !undo)?;
            println!("Updated {} notes", updated.len());
        }

        Commands::Trash { creations, undo } => {
            let selected = select_notes(&store, &creations);
            let updated = store.trash_notes(selected, !undo)?;
            println!("Updated {} notes", updated.len());
        }

        Commands::Categories => {
            for (id, category) in store.categories() {
                let name = category
                    .extra
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("(unnamed)");
                println!("{id:>13}  {name}");
            }
        }

        Commands::Sort { predicate, desc } => {
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            store.sort_notes(&predicate, direction)?;
            print_notes(store.notes());
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use newsroom_backend::config::Config;
use newsroom_backend::models::db_operations;
use newsroom_backend::models::{ContentItem, ContentType};
use newsroom_backend::setup::db_setup::{self, SetupOutcome};
use newsroom_backend::store::ContentStore;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "newsroom_cli", author, version, about = "A CLI for setting up and maintaining newsroom content.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Content {
        #[command(subcommand)]
        action: ContentAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the configured content storage and the uploads directory.
    Setup,
}

#[derive(Subcommand, Debug)]
enum ContentAction {
    /// Lists items newest first.
    List {
        #[arg(long = "type", value_name = "news|blog")]
        content_type: Option<ContentType>,
    },
    /// Replaces the whole collection with the items in a JSON file.
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Prints the collection as JSON.
    Export,
    Delete {
        #[arg(long)]
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_database(&config),
        },
        Commands::Content { action } => {
            let Some(store) = open_store(&config) else {
                return;
            };
            match action {
                ContentAction::List { content_type } => list_content(&store, *content_type),
                ContentAction::Import { file } => import_content(&store, file),
                ContentAction::Export => export_content(&store),
                ContentAction::Delete { id } => delete_content(&store, id),
            }
        }
    }
}

fn setup_database(config: &Config) {
    println!("\nSetting up content storage ({:?})...", config.storage_backend);
    match db_setup::setup_content_storage(config) {
        Ok(SetupOutcome::Created(path)) => {
            println!("✅ Content storage created at '{}'.", path.display())
        }
        Ok(SetupOutcome::AlreadyExists(path)) => {
            println!("ℹ️ Content storage already exists at '{}'. Skipping creation.", path.display())
        }
        Err(e) => eprintln!("❌ Error setting up content storage: {}", e),
    }
}

fn open_store(config: &Config) -> Option<ContentStore> {
    match db_operations::open_storage(config) {
        Ok(storage) => Some(ContentStore::open(storage)),
        Err(e) => {
            eprintln!(
                "❌ Error: Could not open content storage: {}. Run `newsroom_cli db setup` first, and stop the server when using the redb backend.",
                e
            );
            None
        }
    }
}

fn list_content(store: &ContentStore, content_type: Option<ContentType>) {
    let items = match content_type {
        Some(t) => store.get_by_type(t),
        None => store.get_all(),
    };
    if items.is_empty() {
        println!("ℹ️ No content found.");
        return;
    }
    println!("Listing {} item(s):", items.len());
    for item in items {
        println!("- [{}] {} | {} | {} ({})", item.content_type, item.date, item.title, item.slug, item.id);
    }
}

fn import_content(store: &ContentStore, file: &PathBuf) {
    let raw = match fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("❌ Error reading '{}': {}", file.display(), e);
            return;
        }
    };
    let items: Vec<ContentItem> = match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            eprintln!("❌ Error: '{}' is not a valid content export: {}", file.display(), e);
            return;
        }
    };
    match store.replace_all(items) {
        Ok(count) => println!("✅ Imported {} item(s).", count),
        Err(e) => eprintln!("❌ Error importing content: {}", e),
    }
}

fn export_content(store: &ContentStore) {
    match serde_json::to_string_pretty(&store.get_all()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("❌ Error exporting content: {}", e),
    }
}

fn delete_content(store: &ContentStore, id: &str) {
    match store.delete(id) {
        Ok(true) => println!("✅ Item '{}' deleted.", id),
        Ok(false) => eprintln!("❌ Error: No item with id '{}' found.", id),
        Err(e) => eprintln!("❌ Error deleting item: {}", e),
    }
}

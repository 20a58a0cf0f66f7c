use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use vaultdb_backend_fs::{FsBlobStore, FsPropertyStore};
use vaultdb_core::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "vaultdb")]
#[command(about = "VaultDB CLI - exercise a VaultDB instance over the filesystem backend")]
#[command(version)]
struct Cli {
    /// Directory holding collection blobs and the property store.
    #[arg(long, global = true, default_value = "vaultdb-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new collection.
    CreateCollection { name: String },
    /// List all collections.
    ListCollections,
    /// Drop a collection.
    DropCollection { name: String },
    /// Insert one document (JSON object) into a collection.
    Insert {
        collection: String,
        /// Document as a JSON object, e.g. '{"name": "Anna", "age": 30}'
        document: String,
    },
    /// Find documents matching a filter (defaults to `{}`, matching all).
    Find {
        collection: String,
        #[arg(default_value = "{}")]
        filter: String,
    },
    /// Update the first document matching a filter.
    Update {
        collection: String,
        filter: String,
        /// Update document, e.g. '{"$set": {"age": 31}}'
        update: String,
        /// Apply to every matching document instead of just the first.
        #[arg(long)]
        many: bool,
    },
    /// Delete documents matching a filter.
    Delete {
        collection: String,
        filter: String,
        /// Delete every matching document instead of just the first.
        #[arg(long)]
        many: bool,
    },
    /// Count documents matching a filter (defaults to `{}`, counting all).
    Count {
        collection: String,
        #[arg(default_value = "{}")]
        filter: String,
    },
}

fn open_database(data_dir: &std::path::Path) -> Result<Database<FsBlobStore, FsPropertyStore>> {
    let blob_store = FsBlobStore::open(data_dir.join("collections"))
        .with_context(|| format!("failed to open blob store at {}", data_dir.display()))?;
    let property_store = FsPropertyStore::open(data_dir.join("properties.json"))
        .with_context(|| format!("failed to open property store at {}", data_dir.display()))?;
    Database::open(DatabaseConfig::default(), blob_store, property_store)
        .context("failed to open VaultDB database")
}

fn parse_json(label: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{label} must be valid JSON: {raw:?}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut db = open_database(&cli.data_dir)?;

    match cli.command {
        Commands::CreateCollection { name } => {
            db.create_collection(&name).context("failed to create collection")?;
            println!("created collection '{name}'");
        }
        Commands::ListCollections => {
            for name in db.list_collections() {
                println!("{name}");
            }
        }
        Commands::DropCollection { name } => {
            db.drop_collection(&name).context("failed to drop collection")?;
            println!("dropped collection '{name}'");
        }
        Commands::Insert { collection, document } => {
            let doc = parse_json("document", &document)?;
            let mut coll = db.collection(&collection).context("failed to open collection")?;
            let inserted = coll.insert_one(doc).context("insert failed")?;
            println!("{}", serde_json::to_string_pretty(inserted.as_value())?);
        }
        Commands::Find { collection, filter } => {
            let filter = parse_json("filter", &filter)?;
            let mut coll = db.collection(&collection).context("failed to open collection")?;
            let docs = coll.find(&filter).context("find failed")?;
            for doc in docs {
                println!("{}", serde_json::to_string(doc.as_value())?);
            }
        }
        Commands::Update { collection, filter, update, many } => {
            let filter = parse_json("filter", &filter)?;
            let update = parse_json("update", &update)?;
            let mut coll = db.collection(&collection).context("failed to open collection")?;
            let result = if many {
                coll.update_many(&filter, &update).context("update failed")?
            } else {
                coll.update_one(&filter, &update).context("update failed")?
            };
            println!("matched {}, modified {}", result.matched, result.modified);
        }
        Commands::Delete { collection, filter, many } => {
            let filter = parse_json("filter", &filter)?;
            let mut coll = db.collection(&collection).context("failed to open collection")?;
            if many {
                let deleted = coll.delete_many(&filter).context("delete failed")?;
                println!("deleted {deleted} documents");
            } else {
                let deleted = coll.delete_one(&filter).context("delete failed")?;
                println!("deleted {}", if deleted { 1 } else { 0 });
            }
        }
        Commands::Count { collection, filter } => {
            let filter = parse_json("filter", &filter)?;
            let mut coll = db.collection(&collection).context("failed to open collection")?;
            let count = coll.count_documents(&filter).context("count failed")?;
            println!("{count}");
        }
    }

    Ok(())
}

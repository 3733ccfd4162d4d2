use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use websemble::json_db::collections::Selector;
use websemble::json_db::query::{FindOptions, SortOrder};
use websemble::utils::{init_logging, AppConfig};
use websemble::AppState;

#[derive(Parser, Debug)]
#[command(name = "jsondb", about = "CLI d'administration des collections Websemble")]
struct Cli {
    /// Fichier de configuration du backend (dataRoot, persistence.catalog)
    #[arg(long, env = "WEBSEMBLE_CONFIG", default_value = "websemble.json")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Liste les collections du catalogue
    Collections,

    /// Recherche: <collection> [--filter '{"name":"x"}'] [--sort price:desc] [--skip n] [--limit n]
    Find {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        sort: Vec<String>,
        #[arg(long)]
        skip: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Lit un document: <collection> <id>
    Get { collection: String, id: String },

    /// Insère un document: <collection> <json>
    Insert { collection: String, data: String },

    /// Remplace un document: <collection> <id> <json>
    Update {
        collection: String,
        id: String,
        data: String,
    },

    /// Fusionne des champs dans un document: <collection> <id> <json>
    Patch {
        collection: String,
        id: String,
        data: String,
    },

    /// Supprime un document: <collection> <id>
    Delete { collection: String, id: String },

    /// Vide une collection: <collection>
    Drop { collection: String },

    /// Affiche le schéma: <collection>
    Schema { collection: String },
}

/// `42` devient un nombre, tout le reste une chaîne.
fn parse_id(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Number(_)) => v,
        _ => Value::String(raw.to_string()),
    }
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("JSON invalide : {}", raw))
}

fn parse_sort(specs: &[String]) -> Result<FindOptions> {
    let mut opts = FindOptions::default();
    for raw in specs {
        let (field, order) = match raw.split_once(':') {
            Some((f, "asc")) => (f, SortOrder::Asc),
            Some((f, "desc")) => (f, SortOrder::Desc),
            Some((_, other)) => return Err(anyhow!("Ordre de tri inconnu : {}", other)),
            None => (raw.as_str(), SortOrder::Asc),
        };
        opts = opts.sorted_by(field, order);
    }
    Ok(opts)
}

async fn run(cli: Cli) -> Result<Value> {
    let config = AppConfig::load(&cli.config)?;
    init_logging(&config);
    let state = AppState::bootstrap(&config).await?;
    let catalog = &state.catalog;
    tracing::debug!(command = ?cli.cmd, "jsondb");

    let output = match cli.cmd {
        Cmd::Collections => serde_json::to_value(catalog.collection_names())?,

        Cmd::Find {
            collection,
            filter,
            sort,
            skip,
            limit,
        } => {
            let store = catalog.get_collection(&collection)?;
            let condition = filter.as_deref().map(parse_json).transpose()?;
            let mut opts = parse_sort(&sort)?;
            opts.skip = skip;
            opts.limit = limit;
            Value::Array(store.find(condition.as_ref(), &opts).await?)
        }

        Cmd::Get { collection, id } => {
            let store = catalog.get_collection(&collection)?;
            store.find_by_id(&parse_id(&id)).await?
        }

        Cmd::Insert { collection, data } => {
            let store = catalog.get_collection(&collection)?;
            store.insert(parse_json(&data)?).await?
        }

        Cmd::Update {
            collection,
            id,
            data,
        } => {
            let store = catalog.get_collection(&collection)?;
            store
                .update(Selector::Id(parse_id(&id)), parse_json(&data)?)
                .await?
                .into_value()
        }

        Cmd::Patch {
            collection,
            id,
            data,
        } => {
            let store = catalog.get_collection(&collection)?;
            store
                .update_partially(Selector::Id(parse_id(&id)), parse_json(&data)?)
                .await?
                .into_value()
        }

        Cmd::Delete { collection, id } => {
            let store = catalog.get_collection(&collection)?;
            store.delete(Selector::Id(parse_id(&id))).await?.into_value()
        }

        Cmd::Drop { collection } => {
            let store = catalog.get_collection(&collection)?;
            Value::Bool(store.drop_collection().await?)
        }

        Cmd::Schema { collection } => {
            let store = catalog.get_collection(&collection)?;
            store.get_schema().await?
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let output = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

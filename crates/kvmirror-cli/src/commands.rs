use colored::Colorize;
use kvmirror_collections::{Cell, DisplayCodec, MapCollection, Refresh, SetCollection, Store};
use kvmirror_store::StoreConfig;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cli::*;

/// Values are handled as raw text so the CLI can show anything any client
/// wrote.
type Raw = DisplayCodec<String>;
type RawCell = Cell<String, Raw>;
type RawSet = SetCollection<String, Raw>;
type RawMap = MapCollection<String, String, Raw, Raw>;

/// What a command produced, before rendering.
#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    Text(Option<String>),
    Flag(bool),
    Count(usize),
    List(Vec<String>),
    Pairs(Vec<(String, String)>),
    Done,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(prefix) = cli.prefix {
        config.prefix = prefix;
    }
    debug!(?config, "opening store");
    let store = Store::connect(&config).await?;
    let output = execute(&store, cli.command).await?;
    println!("{}", render(&output, cli.format));
    Ok(())
}

fn cell(store: &Store, name: &str) -> anyhow::Result<RawCell> {
    Ok(Cell::with_codec(store, name, String::new(), Raw::new())?)
}

fn set(store: &Store, name: &str) -> anyhow::Result<RawSet> {
    Ok(SetCollection::with_codec(store, name, Raw::new())?)
}

fn map(store: &Store, name: &str) -> anyhow::Result<RawMap> {
    Ok(MapCollection::with_codecs(store, name, Raw::new(), Raw::new())?)
}

fn value_of<T>(refresh: Refresh<T>, key: &str) -> T {
    if let Some(error) = refresh.error() {
        warn!(key, %error, "showing cached value");
    }
    refresh.into_value()
}

pub async fn execute(store: &Store, command: Command) -> anyhow::Result<Output> {
    let output = match command {
        Command::Get { name } => {
            let cell = cell(store, &name)?;
            match cell.read().await? {
                Refresh::Absent(_) => Output::Text(None),
                other => Output::Text(Some(value_of(other, cell.key()))),
            }
        }
        Command::Put { name, value } => {
            cell(store, &name)?.write(value).await?;
            Output::Done
        }
        Command::Del { name } => Output::Flag(cell(store, &name)?.clear().await?),
        Command::Members { name } => {
            let set = set(store, &name)?;
            let mut members: Vec<String> = value_of(set.read_all().await?, set.key())
                .into_iter()
                .collect();
            members.sort();
            Output::List(members)
        }
        Command::Sadd { name, members } => {
            let set = set(store, &name)?;
            let mut added = 0;
            for member in &members {
                if set.add(member).await? {
                    added += 1;
                }
            }
            Output::Count(added)
        }
        Command::Srem { name, members } => {
            let set = set(store, &name)?;
            let mut removed = 0;
            for member in &members {
                if set.remove(member).await? {
                    removed += 1;
                }
            }
            Output::Count(removed)
        }
        Command::Sismember { name, member } => Output::Flag(set(store, &name)?.has(&member).await?),
        Command::Hgetall { name } => {
            let map = map(store, &name)?;
            let mut pairs: Vec<(String, String)> = value_of(map.read_all().await?, map.key())
                .into_iter()
                .collect();
            pairs.sort();
            Output::Pairs(pairs)
        }
        Command::Hset { name, field, value } => {
            Output::Flag(map(store, &name)?.set(&field, &value).await?)
        }
        Command::Hget { name, field } => Output::Text(map(store, &name)?.get(&field).await?),
        Command::Hdel { name, fields } => {
            let map = map(store, &name)?;
            let mut removed = 0;
            for field in &fields {
                if map.remove(field).await? {
                    removed += 1;
                }
            }
            Output::Count(removed)
        }
        Command::Hclear { name } => Output::Flag(map(store, &name)?.clear().await?),
    };
    Ok(output)
}

pub fn render(output: &Output, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => render_json(output).to_string(),
        OutputFormat::Text => render_text(output),
    }
}

fn render_json(output: &Output) -> Value {
    match output {
        Output::Text(text) => json!(text),
        Output::Flag(flag) => json!(flag),
        Output::Count(n) => json!(n),
        Output::List(items) => json!(items),
        Output::Pairs(pairs) => Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
        Output::Done => json!("OK"),
    }
}

fn render_text(output: &Output) -> String {
    match output {
        Output::Text(Some(text)) => text.clone(),
        Output::Text(None) => "(nil)".dimmed().to_string(),
        Output::Flag(true) => "yes".green().to_string(),
        Output::Flag(false) => "no".yellow().to_string(),
        Output::Count(n) => format!("({}) {}", "integer".dimmed(), n.to_string().bold()),
        Output::List(items) if items.is_empty() => "(empty)".dimmed().to_string(),
        Output::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}) {}", (i + 1).to_string().dimmed(), item))
            .collect::<Vec<_>>()
            .join("\n"),
        Output::Pairs(pairs) if pairs.is_empty() => "(empty)".dimmed().to_string(),
        Output::Pairs(pairs) => pairs
            .iter()
            .map(|(k, v)| format!("{} {}", k.cyan(), v))
            .collect::<Vec<_>>()
            .join("\n"),
        Output::Done => format!("{} OK", "✓".green()),
    }
}

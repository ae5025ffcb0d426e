use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use configuration::{DEFAULT_CONFIG_FILE, init_tracing, load_config_from};
use database::{Databean, Fields, Upsert, Value};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

mod render;

/// The main entry point for the bigbeans command-line tool.
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let mut settings = load_config_from(&cli.config).context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        settings.database.url = Some(url);
    }
    let _log_guard = init_tracing(&settings.logging).context("Failed to initialise logging")?;

    let bean = Databean::connect(&settings.database)
        .await
        .context("Failed to connect to the database")?;

    // Execute the appropriate command
    let result = run(cli.command, &bean, cli.json).await;
    bean.close().await;
    result
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Store and query JSON rows in PostgreSQL without writing a schema first.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file; skipped when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// PostgreSQL URL, overriding the configured connection.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Print results as JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert one row, given as a JSON object.
    Insert(RowArgs),
    /// Bulk insert a JSON-lines file, one transaction per batch.
    Import(ImportArgs),
    /// Print the rows matching a filter.
    Find(FindArgs),
    /// Count the rows matching a filter.
    Count(FilterArgs),
    /// Update the rows whose `--on` columns match the given row.
    Update(MatchArgs),
    /// Update the matching row, or insert the row when nothing matches.
    Upsert(MatchArgs),
    /// Delete the rows matching a filter.
    Delete(FilterArgs),
    /// Drop a table and all its rows.
    Drop(TableArgs),
    /// List the tables in the current schema.
    Tables,
    /// Run a plain SQL statement.
    Sql(SqlArgs),
}

#[derive(Args)]
struct TableArgs {
    table: String,
}

#[derive(Args)]
struct RowArgs {
    table: String,
    /// The row, e.g. '{"name": "pinto", "count": 12}'.
    row: String,
}

#[derive(Args)]
struct ImportArgs {
    table: String,
    /// A file with one JSON object per line.
    file: PathBuf,
    /// Rows per transaction.
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
}

#[derive(Args)]
struct FilterArgs {
    table: String,
    /// Equality filter as a JSON object; null matches missing values.
    #[arg(long = "where")]
    filter: Option<String>,
}

#[derive(Args)]
struct FindArgs {
    #[command(flatten)]
    filter: FilterArgs,
    /// Return at most one row.
    #[arg(long)]
    one: bool,
}

#[derive(Args)]
struct MatchArgs {
    table: String,
    /// Comma-separated columns that identify the row(s).
    #[arg(long, value_delimiter = ',', required = true)]
    on: Vec<String>,
    row: String,
}

#[derive(Args)]
struct SqlArgs {
    statement: String,
    /// A JSON value bound to the next `$n` placeholder. Repeatable.
    #[arg(long = "param")]
    params: Vec<String>,
    /// Print the returned rows instead of the affected row count.
    #[arg(long)]
    fetch: bool,
}

async fn run(command: Commands, bean: &Databean, json: bool) -> Result<()> {
    match command {
        Commands::Insert(args) => handle_insert(args, bean, json).await,
        Commands::Import(args) => handle_import(args, bean, json).await,
        Commands::Find(args) => handle_find(args, bean, json).await,
        Commands::Count(args) => {
            let filters = parse_filter(args.filter.as_deref())?;
            let n = bean.table(&args.table)?.count(&filters).await?;
            println!("{}", render::count("rows", n as u64, json));
            Ok(())
        }
        Commands::Update(args) => handle_update(args, bean, json).await,
        Commands::Upsert(args) => handle_upsert(args, bean, json).await,
        Commands::Delete(args) => {
            let filters = parse_filter(args.filter.as_deref())?;
            let n = bean.table(&args.table)?.delete(&filters).await?;
            println!("{}", render::count("deleted", n, json));
            Ok(())
        }
        Commands::Drop(args) => {
            bean.table(&args.table)?.drop().await?;
            println!("Dropped {}.", args.table);
            Ok(())
        }
        Commands::Tables => {
            let names = bean.list_tables().await?;
            println!("{}", render::names(&names, json)?);
            Ok(())
        }
        Commands::Sql(args) => handle_sql(args, bean, json).await,
    }
}

// ==============================================================================
// Command Handlers
// ==============================================================================

async fn handle_insert(args: RowArgs, bean: &Databean, json: bool) -> Result<()> {
    let row = parse_object(&args.row)?;
    bean.table(&args.table)?.insert(&row).await?;
    println!("{}", render::count("inserted", 1, json));
    Ok(())
}

/// Reads the whole file up front so a malformed line aborts before anything is written.
async fn handle_import(args: ImportArgs, bean: &Databean, json: bool) -> Result<()> {
    if args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .context(format!("Failed to read {:?}", &args.file))?;

    let rows = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_object(line).context(format!("line {}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    let table = bean.table(&args.table)?;

    // Set up the progress bar
    let progress_bar = ProgressBar::new(rows.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message(format!("Importing into {}...", args.table));

    for batch in rows.chunks(args.batch_size) {
        if let Err(e) = table.insert_many(batch).await {
            progress_bar.abandon_with_message("Import failed.");
            return Err(e).context(format!(
                "Batch starting at row {} was rolled back",
                progress_bar.position() + 1
            ));
        }
        progress_bar.inc(batch.len() as u64);
    }
    progress_bar.finish_with_message("Import complete!");

    tracing::info!(table = %args.table, rows = rows.len(), "Imported rows.");
    println!("{}", render::count("inserted", rows.len() as u64, json));
    Ok(())
}

async fn handle_find(args: FindArgs, bean: &Databean, json: bool) -> Result<()> {
    let filters = parse_filter(args.filter.filter.as_deref())?;
    let table = bean.table(&args.filter.table)?;

    let records = if args.one {
        table.find_one(&filters).await?.into_iter().collect()
    } else {
        table.find(&filters).await?
    };
    println!("{}", render::records(&records, json)?);
    Ok(())
}

async fn handle_update(args: MatchArgs, bean: &Databean, json: bool) -> Result<()> {
    let row = parse_object(&args.row)?;
    let on: Vec<&str> = args.on.iter().map(String::as_str).collect();
    let n = bean.table(&args.table)?.update(&on, &row).await?;
    println!("{}", render::count("updated", n, json));
    Ok(())
}

async fn handle_upsert(args: MatchArgs, bean: &Databean, json: bool) -> Result<()> {
    let row = parse_object(&args.row)?;
    let on: Vec<&str> = args.on.iter().map(String::as_str).collect();
    let message = match bean.table(&args.table)?.upsert(&on, &row).await? {
        Upsert::Inserted => render::count("inserted", 1, json),
        Upsert::Updated(n) => render::count("updated", n, json),
    };
    println!("{message}");
    Ok(())
}

async fn handle_sql(args: SqlArgs, bean: &Databean, json: bool) -> Result<()> {
    let params = args
        .params
        .iter()
        .map(String::as_str)
        .map(parse_value)
        .collect::<Result<Vec<_>>>()?;

    if args.fetch {
        let records = bean.fetch(&args.statement, &params).await?;
        println!("{}", render::records(&records, json)?);
    } else {
        let n = bean.execute(&args.statement, &params).await?;
        println!("{}", render::count("affected", n, json));
    }
    Ok(())
}

// ==============================================================================
// Input Parsing
// ==============================================================================

fn parse_value(text: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).context(format!("Invalid JSON: {text}"))?;
    Ok(Value::from_json(json)?)
}

/// Parses a JSON object into row fields, keeping the key order of the input.
fn parse_object(text: &str) -> Result<Fields> {
    let json: serde_json::Value =
        serde_json::from_str(text).context(format!("Invalid JSON: {text}"))?;
    let serde_json::Value::Object(object) = json else {
        bail!("Expected a JSON object, got: {text}");
    };

    object
        .into_iter()
        .map(|(column, value)| -> Result<(String, Value)> {
            Ok((column, Value::from_json(value)?))
        })
        .collect()
}

fn parse_filter(text: Option<&str>) -> Result<Fields> {
    text.map_or_else(|| Ok(Fields::new()), parse_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_keeps_order_and_types() {
        let row = parse_object(r#"{"name": "pinto", "count": 12, "weight": 0.5, "tags": ["dry"], "meta": {"a": 1}, "gone": null}"#).unwrap();
        let keys: Vec<_> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "count", "weight", "tags", "meta", "gone"]);
        assert_eq!(row["count"], Value::Int(12));
        assert_eq!(row["weight"], Value::Float(0.5));
        assert_eq!(row["tags"], Value::Array(vec![Value::from("dry")]));
        assert_eq!(row["meta"], Value::Json(serde_json::json!({"a": 1})));
        assert_eq!(row["gone"], Value::Null);
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object("[1, 2]").is_err());
        assert!(parse_object("not json").is_err());
    }

    #[test]
    fn test_missing_filter_matches_everything() {
        assert!(parse_filter(None).unwrap().is_empty());
        assert_eq!(parse_filter(Some(r#"{"a": true}"#)).unwrap().len(), 1);
    }

    #[test]
    fn test_cli_parses_match_columns() {
        let cli = Cli::try_parse_from([
            "bigbeans", "--json", "upsert", "pantry", "--on", "name,colour", r#"{"name": "pinto"}"#,
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Upsert(args) => assert_eq!(args.on, ["name", "colour"]),
            _ => panic!("expected upsert"),
        }
    }
}

use std::process::ExitCode;

use clap::Parser;
use legacy_qb::prelude::*;
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run or compile a legacy-style SELECT against a SQLite file")]
struct Args {
    /// Database file.
    #[arg(long)]
    db: Option<String>,
    #[arg(long, value_enum, default_value = "sqlite")]
    db_type: DatabaseType,
    #[arg(long)]
    table: String,
    /// Comma-separated columns.
    #[arg(long)]
    select: Option<String>,
    /// `key=value`; `age>=18`, `age<=18` and `name!=bob` carry an operator. Repeatable.
    #[arg(long = "where", value_parser = parse_condition)]
    conditions: Vec<(String, RowValues)>,
    /// `field` or `field:desc`.
    #[arg(long)]
    order_by: Option<String>,
    #[arg(long)]
    limit: Option<u64>,
    #[arg(long)]
    offset: Option<u64>,
    /// Print the compiled SQL instead of running it.
    #[arg(long)]
    compile_only: bool,
}

fn parse_condition(raw: &str) -> Result<(String, RowValues), String> {
    let (key, value) = raw
        .split_once('=')
        .filter(|(k, _)| !k.trim().is_empty())
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    // "age>=18" splits as ("age>", "18"); the '=' belongs to the operator
    let (key, value) = match value.strip_prefix('=') {
        Some(rest) => (format!("{key}="), rest),
        None if key.ends_with(['<', '>', '!']) => (format!("{key}="), value),
        None => (key.to_owned(), value),
    };
    let value = serde_json::from_str::<JsonValue>(value)
        .map_or_else(|_| RowValues::Text(value.to_owned()), RowValues::from_json);
    Ok((key.trim().to_owned(), value))
}

async fn run(args: Args) -> Result<(), BridgeError> {
    let mut db = match args.db_type {
        DatabaseType::Sqlite => {
            let path = args.db.clone().unwrap_or_else(|| ":memory:".to_owned());
            let pool = ConfigAndPool::sqlite_builder(path)
                .max_connections(1)
                .build()
                .await?;
            pool.legacy().await?
        }
    };

    if let Some(columns) = &args.select {
        db.select(columns);
    }
    for (key, value) in args.conditions {
        db.where_(&key, value);
    }
    if let Some(order) = &args.order_by {
        let (field, direction) = order.split_once(':').unwrap_or((order.as_str(), ""));
        db.order_by(field, direction);
    }

    if args.compile_only {
        if let Some(limit) = args.limit {
            db.limit(limit, args.offset);
        } else if let Some(offset) = args.offset {
            db.offset(offset);
        }
        println!("{}", db.get_compiled_select(&args.table, true)?);
        return Ok(());
    }

    let result = db.get(&args.table, args.limit, args.offset).await?;
    tracing::info!(rows = result.num_rows(), "query finished");
    for row in result.result_array() {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

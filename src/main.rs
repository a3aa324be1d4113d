//! shapeorm - command-line entry point.
//!
//! Prints the SQL derived for a shape declared on the command line, or
//! fetches one record of that shape by primary key.

use clap::Parser;
use shapeorm::config::{Cli, Command, FindArgs, PoolConfig, ShapeArgs};
use shapeorm::db::{QueryExecutor, create_pool};
use shapeorm::error::{DbError, DbResult};
use shapeorm::models::{Record, Shape, Value};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout carries only command output
    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn build_shape(args: &ShapeArgs) -> DbResult<Arc<Shape>> {
    let mut builder = Shape::builder(&args.shape).fields(args.fields.iter().cloned());
    if let Some(table) = &args.table {
        builder = builder.table(table);
    }
    builder.build()
}

fn print_templates(shape: &Shape) {
    println!("select:        {}", shape.select_template());
    println!("select by key: {}", shape.select_by_key_template());
    println!("insert:        {}", shape.insert_template());
    match shape.update_template() {
        Some(update) => println!("update:        {}", update),
        None => println!("update:        (none, shape has only a primary key)"),
    }
    println!("delete:        {}", shape.delete_template());
}

async fn find(args: &FindArgs) -> DbResult<()> {
    let shape = build_shape(&args.shape)?;
    let key_field = shape.require_field(shape.primary_key())?;
    let key = Value::parse_as(&args.key, key_field.column_type())?;

    let config = PoolConfig::from_url(&args.database_url)?;
    let pool = create_pool(&config).await?;
    let executor = QueryExecutor::new(pool.clone());

    let result = Record::find(&executor, &shape, key).await;
    pool.close().await;

    println!("{}", render(result?.as_ref())?);
    Ok(())
}

/// Render a lookup result for stdout: the record as JSON, or `not found`.
fn render(record: Option<&Record>) -> DbResult<String> {
    match record {
        Some(record) => serde_json::to_string_pretty(record)
            .map_err(|e| DbError::invalid_input(format!("Failed to render record: {}", e))),
        None => Ok("not found".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting shapeorm v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Templates(args) => {
            let shape = build_shape(args)?;
            print_templates(&shape);
        }
        Command::Find(args) => find(args).await?,
    }

    Ok(())
}

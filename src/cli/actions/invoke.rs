use crate::api::event::{self, InvocationEvent};
use crate::cli::actions::StoreArgs;
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub store: StoreArgs,
}

/// Execute the invoke action: one event from stdin, one result to stdout.
/// # Errors
/// Returns an error if stdin is not a valid event or stdout cannot be written.
/// Store failures are not errors here, they become 5xx results.
pub async fn execute(args: Args) -> Result<()> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read event from stdin")?;

    let event: InvocationEvent =
        serde_json::from_str(&input).context("Failed to parse invocation event")?;

    // Nothing outlives the invocation: a single lazily opened connection
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(args.store.db_timeout)
        .connect_lazy(args.store.dsn.expose_secret())
        .context("Invalid database connection string")?;

    let handler = args.store.handler(pool.clone());
    let result = event::invoke(&handler, event).await?;

    pool.close().await;
    debug!("Invocation finished with status {}", result.status_code);

    let mut output = serde_json::to_vec(&result)?;
    output.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output).await?;
    stdout.flush().await?;

    Ok(())
}

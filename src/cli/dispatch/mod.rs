use crate::cli::{
    actions::{invoke, server, Action, StoreArgs},
    commands::{self, store},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::CMD_SERVER, sub)) => Ok(Action::Server(server::Args {
            port: sub
                .get_one::<u16>(commands::ARG_PORT)
                .copied()
                .unwrap_or(8080),
            db_max_connections: sub
                .get_one::<u32>(store::ARG_DB_MAX_CONNECTIONS)
                .copied()
                .unwrap_or(5),
            store: store_args(sub)?,
        })),
        Some((commands::CMD_INVOKE, sub)) => Ok(Action::Invoke(invoke::Args {
            store: store_args(sub)?,
        })),
        _ => Err(anyhow!("missing subcommand")),
    }
}

fn store_args(matches: &clap::ArgMatches) -> Result<StoreArgs> {
    let dsn = matches
        .get_one::<String>(store::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    validate_dsn(&dsn)?;

    let db_timeout = matches
        .get_one::<u64>(store::ARG_DB_TIMEOUT)
        .copied()
        .unwrap_or(5);
    let session_ttl_days = matches
        .get_one::<i64>(store::ARG_SESSION_TTL)
        .copied()
        .unwrap_or(7);

    Ok(StoreArgs {
        dsn: SecretString::from(dsn),
        db_timeout: Duration::from_secs(db_timeout),
        session_ttl_days,
    })
}

fn validate_dsn(dsn: &str) -> Result<()> {
    let url = Url::parse(dsn).context("invalid TESSERA_DSN")?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        scheme => Err(anyhow!("unsupported DSN scheme: {scheme}")),
    }
}

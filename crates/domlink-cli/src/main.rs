//! # domlink
//!
//! Command-line client for the remote-dom bridge: watch destinations, invoke
//! tools, and answer queued actions.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use domlink_client::{ChannelReceiver, Session, SessionConfig, SessionHandle};
use domlink_core::{DestinationUri, DomOp, QueuedAction};
use domlink_settings::DomlinkSettings;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Time given to the socket writer to drain after shutdown.
const FLUSH_GRACE: Duration = Duration::from_millis(200);

/// Remote-dom bridge client.
#[derive(Parser, Debug)]
#[command(name = "domlink", about = "Remote-dom bridge client", version)]
struct Cli {
    /// Server URL (overrides settings and `DOMLINK_URL`).
    #[arg(long, global = true)]
    url: Option<String>,

    /// Settings file (defaults to `~/.domlink/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level or `EnvFilter` directive.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every operation routed to the given destinations.
    Watch {
        /// Destination to observe. Repeatable.
        #[arg(long = "uri", required = true)]
        uris: Vec<String>,
    },
    /// Send a tool frame.
    Invoke {
        /// Tool name.
        tool: String,
        /// Destination the tool targets.
        #[arg(long)]
        uri: String,
        /// Tool parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
        /// Wait for the matching response and print it.
        #[arg(long)]
        wait: bool,
    },
    /// Print queued actions as they arrive.
    Actions {
        /// Answer every action with this error.
        #[arg(long)]
        decline: Option<String>,
    },
}

/// One JSON line on stdout.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Line<'a> {
    Op { uri: &'a DestinationUri, op: &'a DomOp },
    Action { action: &'a QueuedAction },
    Response { value: &'a Value },
}

fn emit(line: &Line<'_>) -> Result<()> {
    println!("{}", serde_json::to_string(line)?);
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<DomlinkSettings> {
    let mut settings = match cli.settings.as_deref() {
        Some(path) => domlink_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => domlink_settings::load_settings().context("Failed to load settings")?,
    };
    apply_cli_overrides(&mut settings, cli);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn apply_cli_overrides(settings: &mut DomlinkSettings, cli: &Cli) {
    if let Some(url) = &cli.url {
        settings.server.url.clone_from(url);
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    if cli.log_json {
        settings.logging.json = true;
    }
}

fn parse_params(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw).context("--params is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("--params must be a JSON object, got {other}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    if settings.logging.json {
        domlink_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        domlink_core::logging::init_subscriber(&settings.logging.level);
    }

    let config = SessionConfig::from_settings(&settings);
    let connector = Arc::new(config.connector());
    info!(url = %config.url, "starting session");
    let session = Session::spawn(config, connector);

    let outcome = match cli.command {
        Command::Watch { uris } => watch(&session, uris).await,
        Command::Invoke {
            tool,
            uri,
            params,
            wait,
        } => invoke(&session, tool, uri, params.as_deref(), wait).await,
        Command::Actions { decline } => actions(&session, decline.as_deref()).await,
    };

    session.shutdown().await;
    tokio::time::sleep(FLUSH_GRACE).await;
    outcome
}

async fn watch(session: &SessionHandle, uris: Vec<String>) -> Result<()> {
    if let Err(e) = session.ensure_connected().await {
        // The session keeps retrying in the background.
        warn!(error = %e, "initial connect failed");
    }

    let (tx, mut ops) = mpsc::unbounded_channel::<(DestinationUri, DomOp)>();
    for uri in uris {
        let uri = DestinationUri::from(uri);
        let (receiver, mut rx) = ChannelReceiver::new();
        let outcome = session.register(uri.clone(), receiver).await?;
        info!(%uri, replayed = outcome.replayed, "watching");

        let tx = tx.clone();
        let _ = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                if tx.send((uri.clone(), op)).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut actions = session.subscribe_actions();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = ops.recv() => {
                let Some((uri, op)) = next else { break };
                emit(&Line::Op { uri: &uri, op: &op })?;
            }
            action = actions.recv() => match action {
                Ok(action) => emit(&Line::Action { action: &action })?,
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "action stream lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

async fn invoke(
    session: &SessionHandle,
    tool: String,
    uri: String,
    params: Option<&str>,
    wait: bool,
) -> Result<()> {
    let params = parse_params(params)?;
    session
        .ensure_connected()
        .await
        .context("Failed to connect")?;

    if wait {
        let value = session
            .invoke_tool_and_wait(tool, uri, params)
            .await
            .context("Tool call failed")?;
        emit(&Line::Response { value: &value })?;
    } else {
        session.invoke_tool(tool, uri, params).await?;
    }
    Ok(())
}

async fn actions(session: &SessionHandle, decline: Option<&str>) -> Result<()> {
    if let Err(e) = session.ensure_connected().await {
        warn!(error = %e, "initial connect failed");
    }

    let mut actions = session.subscribe_actions();
    loop {
        let action = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            action = actions.recv() => action,
        };
        match action {
            Ok(action) => {
                emit(&Line::Action { action: &action })?;
                if let Some(reason) = decline {
                    session
                        .respond_to_action(action.id.clone(), None, Some(reason.to_owned()))
                        .await?;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "action stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_invoke_with_wait() {
        let cli = Cli::parse_from([
            "domlink",
            "--url",
            "ws://localhost:9/ws",
            "invoke",
            "search",
            "--uri",
            "ui://panel-1",
            "--params",
            r#"{"q":"x"}"#,
            "--wait",
        ]);
        assert_eq!(cli.url.as_deref(), Some("ws://localhost:9/ws"));
        let Command::Invoke {
            tool, uri, wait, ..
        } = cli.command
        else {
            panic!("expected invoke");
        };
        assert_eq!(tool, "search");
        assert_eq!(uri, "ui://panel-1");
        assert!(wait);
    }

    #[test]
    fn watch_requires_a_uri() {
        assert!(Cli::try_parse_from(["domlink", "watch"]).is_err());
        let cli = Cli::try_parse_from(["domlink", "watch", "--uri", "ui://a", "--uri", "ui://b"])
            .unwrap();
        assert!(matches!(cli.command, Command::Watch { ref uris } if uris.len() == 2));
    }

    #[test]
    fn params_must_be_an_object() {
        assert_eq!(parse_params(None).unwrap(), Map::new());
        assert_eq!(
            parse_params(Some(r#"{"a":1}"#)).unwrap()["a"],
            json!(1)
        );
        assert!(parse_params(Some("[1]")).is_err());
        assert!(parse_params(Some("{")).is_err());
    }

    #[test]
    fn cli_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"url": "ws://file/ws"}, "logging": {"level": "warn"}}"#)
            .unwrap();

        let cli = Cli::parse_from([
            "domlink",
            "--settings",
            path.to_str().unwrap(),
            "--log-level",
            "debug",
            "actions",
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.logging.level, "debug");
        // DOMLINK_URL may be set in the environment; only assert when it is not.
        if std::env::var("DOMLINK_URL").is_err() {
            assert_eq!(settings.server.url, "ws://file/ws");
        }
    }

    #[test]
    fn invalid_url_is_rejected() {
        let cli = Cli::parse_from(["domlink", "--url", "http://nope", "actions"]);
        assert!(load_settings(&cli).is_err());
    }

    #[test]
    fn op_line_shape() {
        let uri = DestinationUri::from("ui://a");
        let op = DomOp::Mutate {
            mutations: vec![json!(1)],
        };
        let line = serde_json::to_value(Line::Op { uri: &uri, op: &op }).unwrap();
        assert_eq!(
            line,
            json!({"kind": "op", "uri": "ui://a", "op": {"type": "mutate", "mutations": [1]}})
        );
    }
}

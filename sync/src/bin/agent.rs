//! Dompet sync agent.
//!
//! Runs the offline write path against a remote document store and reads
//! commands from stdin. Type `help` for the command list.

use dompet_engine::EntityType;
use dompet_sync::connectivity::probe_address;
use dompet_sync::{
    sync_channel, AgentConfig, BackgroundSync, ConnectivityMonitor, HttpRemote, PendingBadge,
    PendingStore, Session, SqliteStore, SyncEngine, SyncListener, TracingNotifier,
    TransactionFacade, UnavailableStore, SYNC_PENDING_TAG,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  add <type> <json>            record a transaction (type: expense, income, installment)
  update <type> <id> <json>    patch a transaction
  delete <type> <id>           delete a transaction
  pending                      list queued operations
  failed                       list rejected operations
  retry                        requeue rejected operations
  discard <op-id>              abandon a rejected operation
  clear                        drop every queued operation
  sync                         sync now
  online | offline             override connectivity
  login <user-id> | logout
  quit";

#[derive(Debug, PartialEq)]
enum Command {
    Add(EntityType, Value),
    Update(EntityType, String, Value),
    Delete(EntityType, String),
    Pending,
    Failed,
    Retry,
    Discard(String),
    Clear,
    Sync,
    Online(bool),
    Login(String),
    Logout,
    Help,
    Quit,
}

fn entity(name: &str) -> Result<EntityType, String> {
    EntityType::ALL
        .into_iter()
        .find(|entity| entity.to_string() == name || entity.collection() == name)
        .ok_or_else(|| format!("unknown transaction type: {}", name))
}

fn json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let missing = || format!("missing arguments, usage:\n{}", HELP);

    match word {
        "add" => {
            let (kind, data) = rest.split_once(char::is_whitespace).ok_or_else(missing)?;
            Ok(Command::Add(entity(kind)?, json(data)?))
        }
        "update" => {
            let (kind, rest) = rest.split_once(char::is_whitespace).ok_or_else(missing)?;
            let (id, patch) = rest.trim().split_once(char::is_whitespace).ok_or_else(missing)?;
            Ok(Command::Update(entity(kind)?, id.to_string(), json(patch)?))
        }
        "delete" => {
            let (kind, id) = rest.split_once(char::is_whitespace).ok_or_else(missing)?;
            Ok(Command::Delete(entity(kind)?, id.trim().to_string()))
        }
        "discard" if !rest.is_empty() => Ok(Command::Discard(rest.to_string())),
        "login" if !rest.is_empty() => Ok(Command::Login(rest.to_string())),
        "discard" | "login" => Err(missing()),
        "pending" => Ok(Command::Pending),
        "failed" => Ok(Command::Failed),
        "retry" => Ok(Command::Retry),
        "clear" => Ok(Command::Clear),
        "sync" => Ok(Command::Sync),
        "online" => Ok(Command::Online(true)),
        "offline" => Ok(Command::Online(false)),
        "logout" => Ok(Command::Logout),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {} (try `help`)", other)),
    }
}

struct Agent {
    facade: TransactionFacade,
    monitor: Arc<ConnectivityMonitor>,
    session: Arc<Session>,
}

impl Agent {
    fn user(&self) -> Result<String, String> {
        self.session
            .current()
            .ok_or_else(|| "not signed in, use `login <user-id>`".to_string())
    }

    /// Execute a command. Returns `false` when the agent should stop.
    async fn execute(&self, command: Command) -> Result<bool, Box<dyn std::error::Error>> {
        match command {
            Command::Add(entity, data) => {
                let receipt = self.facade.add_transaction(&self.user()?, entity, data).await?;
                println!("{}", serde_json::to_string(&receipt)?);
            }
            Command::Update(entity, id, patch) => {
                let receipt = self
                    .facade
                    .update_transaction(&self.user()?, entity, &id, patch)
                    .await?;
                println!("{}", serde_json::to_string(&receipt)?);
            }
            Command::Delete(entity, id) => {
                let receipt = self.facade.delete_transaction(&self.user()?, entity, &id).await?;
                println!("{}", serde_json::to_string(&receipt)?);
            }
            Command::Pending => {
                for op in self.facade.pending_operations(&self.user()?).await? {
                    println!(
                        "{} {} {} {} ({}, attempts {})",
                        op.id, op.kind, op.entity_type, op.target_id, op.status, op.attempts
                    );
                }
            }
            Command::Failed => {
                for op in self.facade.failed_operations(&self.user()?).await? {
                    println!(
                        "{} {} {} {}: {}",
                        op.id,
                        op.kind,
                        op.entity_type,
                        op.target_id,
                        op.last_error.as_deref().unwrap_or("rejected")
                    );
                }
            }
            Command::Retry => {
                let retried = self.facade.retry_failed(&self.user()?).await?;
                println!("requeued {}", retried);
            }
            Command::Discard(op_id) => {
                let op = self.facade.discard(&self.user()?, &op_id).await?;
                println!("discarded {}", op.id);
            }
            Command::Clear => {
                let cleared = self.facade.clear_pending(&self.user()?).await?;
                println!("cleared {}", cleared);
            }
            Command::Sync => self.facade.request_sync(),
            Command::Online(online) => {
                self.monitor.set_online(online);
            }
            Command::Login(user_id) => self.session.sign_in(user_id),
            Command::Logout => self.session.sign_out(),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dompet_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AgentConfig::from_env()?;

    tracing::info!("Starting Dompet sync agent against {}", config.remote_url);

    let store: Arc<dyn PendingStore> = match SqliteStore::open(&config.database_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Could not open pending store");
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    };

    let remote = Arc::new(HttpRemote::new(
        &config.remote_url,
        config.request_timeout,
        config.auth_token.clone(),
    )?);

    let probe_target = probe_address(&config.remote_url);
    let initially_online = match &probe_target {
        Some(addr) => dompet_sync::connectivity::probe(addr, config.request_timeout).await,
        None => true,
    };
    let monitor = ConnectivityMonitor::new_shared(initially_online);
    let _probe = match probe_target {
        Some(addr) if !config.probe_interval.is_zero() => Some(monitor.spawn_probe(
            addr,
            config.probe_interval,
            config.request_timeout.min(Duration::from_secs(5)),
        )),
        _ => None,
    };

    let session = Session::new_shared(config.user_id.clone());
    let badge = PendingBadge::new_shared();
    let notifier = Arc::new(TracingNotifier);

    let (sync_tx, sync_rx) = sync_channel();

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote.clone(),
        badge.clone(),
        notifier.clone(),
    ));

    let background = Arc::new(BackgroundSync::new(sync_tx.clone()));
    background.register(SYNC_PENDING_TAG);
    let _scheduler = background.spawn_scheduler(config.background_interval);

    let listener = SyncListener::new(
        engine,
        monitor.clone(),
        session.clone(),
        notifier.clone(),
        config.retry,
    )
    .spawn(sync_rx);

    let facade = TransactionFacade::new(store, remote, monitor.clone(), badge, notifier)
        .with_policy(config.write_policy)
        .with_listener(sync_tx);

    let agent = Agent {
        facade,
        monitor,
        session,
    };

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(command) => match agent.execute(command).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("error: {}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down");
    drop(agent);
    drop(background);
    // The listener stops once every sender is gone
    let _ = tokio::time::timeout(Duration::from_secs(5), listener).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_add() {
        let command =
            parse_command(r#"add expense {"description": "Kopi", "amount": 25000}"#).unwrap();
        assert_eq!(
            command,
            Command::Add(
                EntityType::Expense,
                json!({"description": "Kopi", "amount": 25000})
            )
        );
    }

    #[test]
    fn parse_accepts_collection_names() {
        let command = parse_command("delete incomes inc-1").unwrap();
        assert_eq!(command, Command::Delete(EntityType::Income, "inc-1".into()));
    }

    #[test]
    fn parse_update() {
        let command = parse_command(r#"update installment ins-1 {"paid": true}"#).unwrap();
        assert_eq!(
            command,
            Command::Update(EntityType::Installment, "ins-1".into(), json!({"paid": true}))
        );
    }

    #[test]
    fn parse_errors() {
        assert!(parse_command("add expense").is_err());
        assert!(parse_command("add savings {}").is_err());
        assert!(parse_command("add expense {not json}").is_err());
        assert!(parse_command("discard").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("pending").unwrap(), Command::Pending);
        assert_eq!(parse_command("  offline ").unwrap(), Command::Online(false));
        assert_eq!(parse_command("login user-1").unwrap(), Command::Login("user-1".into()));
        assert_eq!(parse_command("quit").unwrap(), Command::Quit);
    }
}

//! Command bus for the bridge surface.
//!
//! A name-keyed dispatch table: each command declares a minimum
//! parameter arity and an async handler returning a success/error
//! envelope. The transport (HTTP, framed socket) is a collaborator;
//! only the dispatcher and the command contracts live here. Handler
//! failures become error envelopes, never propagated panics.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Outcome of one command handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Transport-agnostic request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub id: String,
}

/// Transport-agnostic response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub result: Option<Value>,
    pub error: Option<String>,
    pub id: String,
}

/// An async command handler over positional parameters.
pub type CommandHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, CommandResult> + Send + Sync>;

/// Boxes an async closure into a [`CommandHandler`].
pub fn handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    Arc::new(move |params| Box::pin(f(params)))
}

struct CommandSpec {
    /// Minimum number of positional parameters
    arity: usize,
    handler: CommandHandler,
}

/// The dispatch table.
#[derive(Default)]
pub struct CommandBus {
    commands: RwLock<HashMap<String, CommandSpec>>,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command with its minimum arity.
    pub async fn register(&self, name: impl Into<String>, arity: usize, handler: CommandHandler) {
        let name = name.into();
        debug!(command = %name, arity, "command registered");
        self.commands
            .write()
            .await
            .insert(name, CommandSpec { arity, handler });
    }

    /// Registered command names, sorted.
    pub async fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Validates and dispatches one request.
    pub async fn dispatch(&self, request: CommandRequest) -> CommandResponse {
        let spec_handler = {
            let commands = self.commands.read().await;
            match commands.get(&request.command) {
                Some(spec) if request.params.len() >= spec.arity => Some(spec.handler.clone()),
                Some(spec) => {
                    return CommandResponse {
                        result: None,
                        error: Some(format!(
                            "command `{}` expects at least {} parameter(s), got {}",
                            request.command,
                            spec.arity,
                            request.params.len()
                        )),
                        id: request.id,
                    };
                }
                None => None,
            }
        };

        let Some(handler) = spec_handler else {
            warn!(command = %request.command, "unknown command");
            return CommandResponse {
                result: None,
                error: Some(format!("unknown command `{}`", request.command)),
                id: request.id,
            };
        };

        let outcome = handler(request.params).await;
        if outcome.success {
            CommandResponse {
                result: outcome.data,
                error: None,
                id: request.id,
            }
        } else {
            CommandResponse {
                result: None,
                error: outcome.error.or_else(|| Some("command failed".into())),
                id: request.id,
            }
        }
    }
}

//! Command table for the dispatch loop.
//!
//! Each command is a [`CommandHandler`] registered under its exact wire name.
//! A handler always produces a [`Reply`]: the response to send, plus an
//! optional local error that the connection logs but never puts on the wire.

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use crate::core::frame::MAX_FRAME_LEN;
use crate::core::protocol::{Request, Response, Status};
use crate::core::registry::{Creation, Registry};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{command}: require exactly one argument (got {got})")]
    ArgCount { command: &'static str, got: usize },

    #[error("{command}: unsupported format {format:?} (allowed: json)")]
    UnsupportedFormat {
        command: &'static str,
        format: String,
    },

    #[error("DUMP: server state too long ({0} bytes)")]
    StateTooLong(usize),

    #[error("DUMP: failed to serialize server state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What a command hands back to the dispatch loop.
#[derive(Debug)]
pub struct Reply {
    pub response: Response,
    pub error: Option<CommandError>,
}

impl Reply {
    pub fn ok(response: Response) -> Self {
        Self {
            response,
            error: None,
        }
    }

    pub fn failed(status: Status, error: CommandError) -> Self {
        Self {
            response: Response::status(status),
            error: Some(error),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    /// Wire name, matched exactly (case-sensitive).
    fn name(&self) -> &'static str;

    /// Rejects bad arguments before the registry is touched.
    ///
    /// The default requires exactly one argument.
    fn validate(&self, args: &[String]) -> Result<(), CommandError> {
        if args.len() != 1 {
            return Err(CommandError::ArgCount {
                command: self.name(),
                got: args.len(),
            });
        }
        Ok(())
    }

    /// Runs a validated command against the registry.
    fn execute(&self, registry: &mut Registry, args: &[String]) -> Reply;
}

/// `XMAKE name`: 201 when the exchange is new, 200 when it already existed.
pub struct MakeExchange;

impl CommandHandler for MakeExchange {
    fn name(&self) -> &'static str {
        "XMAKE"
    }

    fn execute(&self, registry: &mut Registry, args: &[String]) -> Reply {
        Reply::ok(creation_response(registry.make_exchange(&args[0])))
    }
}

/// `QMAKE name`: same contract as `XMAKE`, over queues.
pub struct MakeQueue;

impl CommandHandler for MakeQueue {
    fn name(&self) -> &'static str {
        "QMAKE"
    }

    fn execute(&self, registry: &mut Registry, args: &[String]) -> Reply {
        Reply::ok(creation_response(registry.make_queue(&args[0])))
    }
}

fn creation_response(creation: Creation) -> Response {
    match creation {
        Creation::Created => Response::status(Status::Created),
        Creation::Existing => Response::status(Status::Ok),
    }
}

/// `DUMP json`: the whole registry as a JSON document in `args[0]`.
pub struct Dump;

impl Dump {
    pub const FORMAT_JSON: &'static str = "json";
}

impl CommandHandler for Dump {
    fn name(&self) -> &'static str {
        "DUMP"
    }

    fn validate(&self, args: &[String]) -> Result<(), CommandError> {
        if args.len() != 1 {
            return Err(CommandError::ArgCount {
                command: self.name(),
                got: args.len(),
            });
        }
        if args[0] != Self::FORMAT_JSON {
            return Err(CommandError::UnsupportedFormat {
                command: self.name(),
                format: args[0].clone(),
            });
        }
        Ok(())
    }

    fn execute(&self, registry: &mut Registry, _args: &[String]) -> Reply {
        let doc = match registry.to_json() {
            Ok(doc) => doc,
            Err(e) => return Reply::failed(Status::InternalError, e.into()),
        };
        if doc.len() > MAX_FRAME_LEN {
            return Reply::failed(Status::InternalError, CommandError::StateTooLong(doc.len()));
        }
        Reply::ok(Response::new(Status::Ok, vec![doc]))
    }
}

/// Fixed mapping from command name to handler.
pub struct CommandTable {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandTable {
    /// A table with no commands at all.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        info!("registering command {}", handler.name());
        self.handlers.insert(handler.name(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CommandHandler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Routes one request. Unknown commands get 405 and no local error; they
    /// are ordinary traffic, not a failure of this server.
    pub fn dispatch(&self, registry: &mut Registry, request: &Request) -> Reply {
        let Some(handler) = self.get(&request.command) else {
            return Reply::ok(Response::status(Status::UnknownCommand));
        };
        if let Err(e) = handler.validate(&request.args) {
            return Reply::failed(Status::BadArgs, e);
        }
        handler.execute(registry, &request.args)
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(Box::new(MakeExchange));
        table.register(Box::new(MakeQueue));
        table.register(Box::new(Dump));
        table
    }
}

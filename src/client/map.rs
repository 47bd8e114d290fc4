//! Name-keyed clients for a whole API tree and CLI-style command dispatch

use super::{Client, ClientError};
use crate::api::ApiNode;
use crate::core::path::RoutePath;
use crate::core::resource::AnyResource;
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One schemaless [`Client`] per resource API in a tree, keyed by API name
#[derive(Clone)]
pub struct ClientMap {
    clients: HashMap<String, Client<AnyResource>>,
}

impl ClientMap {
    /// Walk the tree below `top` and create a client for every resource API
    ///
    /// Root APIs get no client of their own but their children do.
    pub fn new(top: &dyn ApiNode, address: &str) -> Result<Self, ClientError> {
        let mut map = Self {
            clients: HashMap::new(),
        };
        map.collect(top, &RoutePath::root(), address)?;
        Ok(map)
    }

    fn collect(
        &mut self,
        node: &dyn ApiNode,
        parent: &RoutePath,
        address: &str,
    ) -> Result<(), ClientError> {
        let path = parent.child(node.name(), node.base(), node.takes_id());

        if node.takes_id() {
            if self.clients.contains_key(node.name()) {
                return Err(ClientError::DuplicateName(node.name().to_string()));
            }
            let client = Client::new(address, path.clone())
                .with_response_codes(node.response_codes().clone());
            self.clients.insert(node.name().to_string(), client);
        }

        for child in node.children() {
            self.collect(child.as_ref(), &path, address)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Client<AnyResource>> {
        self.clients.get(name)
    }

    /// Names of all resources with a client, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute `command` and return the response data as JSON
    ///
    /// `delete` returns `null`; `list` returns the `{"items": [...]}` envelope.
    pub async fn run(&self, command: &Command) -> Result<serde_json::Value, ClientError> {
        let client = self
            .get(&command.resource)
            .ok_or_else(|| ClientError::UnknownResource(command.resource.clone()))?;
        let parents: Vec<&str> = command.parent_ids.iter().map(String::as_str).collect();

        tracing::debug!(verb = %command.verb, resource = %command.resource, "running client command");

        let value = match command.verb {
            Verb::Get => to_json(client.get(command.arg(0, "id")?, &parents).await?)?,
            Verb::List => {
                let query = command
                    .args
                    .iter()
                    .map(|arg| {
                        arg.split_once('=').ok_or_else(|| {
                            ClientError::InvalidCommand(format!(
                                "query argument '{}' is not key=value",
                                arg
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                to_json(client.get_all(&query, &parents).await?)?
            }
            Verb::Post => {
                let body = parse_body(command.arg(0, "body")?)?;
                to_json(client.post(&body, &parents).await?)?
            }
            Verb::Put => {
                let body = parse_body(command.arg(1, "body")?)?;
                to_json(client.put(command.arg(0, "id")?, &body, &parents).await?)?
            }
            Verb::Patch => {
                let body = parse_body(command.arg(1, "body")?)?;
                to_json(client.patch(command.arg(0, "id")?, &body, &parents).await?)?
            }
            Verb::Delete => {
                client.delete(command.arg(0, "id")?, &parents).await?;
                serde_json::Value::Null
            }
        };
        Ok(value)
    }
}

/// Operation a [`Command`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verb {
    Get,
    List,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Verb {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Verb as ValueEnum>::from_str(s, true)
            .map_err(|_| ClientError::InvalidCommand(format!("unknown verb '{}'", s)))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// A verb applied to a named resource
///
/// Arguments by verb:
/// - `get`, `delete`: `[id]`
/// - `list`: `key=value` query pairs
/// - `post`: `[json]`
/// - `put`, `patch`: `[id, json]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub resource: String,
    /// Ancestor IDs, outermost first
    pub parent_ids: Vec<String>,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(verb: Verb, resource: impl Into<String>) -> Self {
        Self {
            verb,
            resource: resource.into(),
            parent_ids: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Parse `<verb> <resource> [args...]`, with `--parent <id>` (repeatable)
    /// anywhere after the verb
    pub fn parse<S: AsRef<str>>(words: &[S]) -> Result<Self, ClientError> {
        let line = CommandLine::try_parse_from(words.iter().map(<S as AsRef<str>>::as_ref))
            .map_err(|err| ClientError::InvalidCommand(err.to_string().trim().to_string()))?;
        Ok(line.into())
    }

    pub fn with_parents<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.parent_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn arg(&self, index: usize, what: &str) -> Result<&str, ClientError> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            ClientError::InvalidCommand(format!("'{}' needs a {} argument", self.verb, what))
        })
    }
}

/// Command line accepted by [`Command::parse`]
#[derive(Debug, Parser)]
#[command(
    name = "nestapi",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct CommandLine {
    #[arg(value_enum, ignore_case = true)]
    verb: Verb,

    /// API name, as registered in the tree
    resource: String,

    /// Ancestor ID, outermost first; repeat for deeper resources
    #[arg(long = "parent", value_name = "ID")]
    parents: Vec<String>,

    /// Verb arguments: an ID, a JSON body or `key=value` query pairs
    args: Vec<String>,
}

impl From<CommandLine> for Command {
    fn from(line: CommandLine) -> Self {
        Command::new(line.verb, line.resource)
            .with_parents(line.parents)
            .with_args(line.args)
    }
}

fn parse_body(raw: &str) -> Result<AnyResource, ClientError> {
    serde_json::from_str(raw)
        .map_err(|e| ClientError::InvalidCommand(format!("invalid JSON body: {}", e)))
}

fn to_json<V: serde::Serialize>(value: V) -> Result<serde_json::Value, ClientError> {
    serde_json::to_value(value).map_err(ClientError::Encode)
}

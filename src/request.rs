//! Request payloads understood by the host, and the shapes it answers with

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ipc::StreamId;

/// Body of a page request, externally tagged on the wire (`{"read": "/etc/hosts"}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    /// Write a message to the host's log
    Log(String),
    /// List a directory; answered with full entry paths
    ListDir(PathBuf),
    FileExists(PathBuf),
    /// Read a UTF-8 file
    Read(PathBuf),
    RunCommand(RunCommand),
    RunDetachedCommand(CommandSpec),
    StreamCommand(StreamCommand),
}

/// A command line plus where and how to run it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: Vec<String>,
    /// Defaults to the host's working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Added to the environment the host process was started with
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
}

impl CommandSpec {
    pub fn new(command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn envs<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Run a command to completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCommand {
    #[serde(flatten)]
    pub spec: CommandSpec,
    /// Enforced by the host, which defaults to 10 seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl RunCommand {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            timeout_secs: None,
        }
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl From<CommandSpec> for RunCommand {
    fn from(spec: CommandSpec) -> Self {
        Self::new(spec)
    }
}

/// Run a command and forward each stdout line as a stream notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCommand {
    pub id: StreamId,
    #[serde(flatten)]
    pub spec: CommandSpec,
}

/// Captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A command left running in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedProcess {
    pub pid: u32,
}

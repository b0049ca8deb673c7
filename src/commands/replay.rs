//! Replay console commands
//!
//! Thin handlers over an injected [`ReplayBuffer`]. Every command answers
//! with a JSON response; failures never escape as errors.

use crate::buffer::ReplayBuffer;
use crate::utils::error::{ErrorResponse, ReplayError};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

/// A command typed on the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    /// Save a replay, to the given path or a timestamped one
    Save(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".to_string());
        };
        let argument = parts.collect::<Vec<_>>().join(" ");

        let command = match verb.to_lowercase().as_str() {
            "start" => ConsoleCommand::Start,
            "stop" => ConsoleCommand::Stop,
            "save" | "trigger" => {
                ConsoleCommand::Save((!argument.is_empty()).then(|| PathBuf::from(argument)))
            }
            "status" | "info" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(command)
    }
}

/// Response written back for every command
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl CommandResponse {
    pub fn ok<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::failed(ReplayError::from(e)),
        }
    }

    pub fn failed(error: ReplayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    fn message(message: &str) -> Self {
        Self::ok(&serde_json::json!({ "message": message }))
    }
}

/// What the console loop should do after a command
#[derive(Debug)]
pub enum CommandOutcome {
    Continue(CommandResponse),
    Exit,
}

const HELP: &str = "commands: start | stop | save [path] | status | help | quit";

/// Run one command against the buffer
pub async fn handle_command(buffer: &ReplayBuffer, command: ConsoleCommand) -> CommandOutcome {
    tracing::debug!("Handling console command {:?}", command);

    let response = match command {
        ConsoleCommand::Start => match buffer.start().await {
            Ok(()) => CommandResponse::ok(&buffer.get_buffer_info()),
            Err(e) => CommandResponse::failed(e),
        },
        ConsoleCommand::Stop => {
            buffer.stop().await;
            CommandResponse::ok(&buffer.get_buffer_info())
        }
        ConsoleCommand::Save(path) => {
            let result = match path {
                Some(path) => buffer.save_replay(&path).await,
                None => buffer.save_timestamped_replay().await,
            };
            match result {
                Ok(replay) => CommandResponse::ok(&replay),
                Err(e) => CommandResponse::failed(e),
            }
        }
        ConsoleCommand::Status => CommandResponse::ok(&buffer.get_buffer_info()),
        ConsoleCommand::Help => CommandResponse::message(HELP),
        ConsoleCommand::Quit => return CommandOutcome::Exit,
    };

    CommandOutcome::Continue(response)
}

/// Parse and run one console line
pub async fn handle_line(buffer: &ReplayBuffer, line: &str) -> CommandOutcome {
    match line.parse::<ConsoleCommand>() {
        Ok(command) => handle_command(buffer, command).await,
        Err(message) => CommandOutcome::Continue(CommandResponse {
            success: false,
            data: None,
            error: Some(ErrorResponse {
                code: "INVALID_COMMAND".to_string(),
                message: format!("{}; {}", message, HELP),
            }),
        }),
    }
}

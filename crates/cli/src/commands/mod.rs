pub mod config;
pub mod doctor;
pub mod parse;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<T: Serialize> {
    command: String,
    status: String,
    error_class: Option<String>,
    result: Option<T>,
    message: String,
}

impl CommandResult {
    pub fn success<T: Serialize>(command: &str, result: T, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            result: Some(result),
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome::<()> {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            result: None,
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

fn serialize_payload<T: Serialize>(payload: &CommandOutcome<T>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

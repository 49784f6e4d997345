//! Wire messages of the DashScope duplex inference gateway.
//!
//! Control flow is JSON over text frames; audio arrives as binary frames.
//! A task is opened with `run-task`, fed with `continue-task`, and closed
//! with `finish-task`; the server answers with `task-started`,
//! `result-generated`, `task-finished`, or `task-failed` events.

use serde::{Deserialize, Serialize};

pub const ACTION_RUN_TASK: &str = "run-task";
pub const ACTION_CONTINUE_TASK: &str = "continue-task";
pub const ACTION_FINISH_TASK: &str = "finish-task";

pub const EVENT_TASK_STARTED: &str = "task-started";
pub const EVENT_RESULT_GENERATED: &str = "result-generated";
pub const EVENT_TASK_FINISHED: &str = "task-finished";
pub const EVENT_TASK_FAILED: &str = "task-failed";

#[derive(Debug, Serialize)]
pub struct ClientMessage {
    pub header: ClientHeader,
    pub payload: ClientPayload,
}

#[derive(Debug, Serialize)]
pub struct ClientHeader {
    pub action: &'static str,
    pub task_id: String,
    pub streaming: &'static str,
}

#[derive(Debug, Default, Serialize)]
pub struct ClientPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_group: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<SynthesisParameters>,
    pub input: TextInput,
}

#[derive(Debug, Serialize)]
pub struct SynthesisParameters {
    pub text_type: &'static str,
    pub voice: String,
    pub format: String,
    pub sample_rate: u32,
    pub rate: f32,
}

#[derive(Debug, Default, Serialize)]
pub struct TextInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ClientMessage {
    pub fn run_task(task_id: &str, model: &str, parameters: SynthesisParameters) -> Self {
        Self {
            header: ClientHeader {
                action: ACTION_RUN_TASK,
                task_id: task_id.to_string(),
                streaming: "duplex",
            },
            payload: ClientPayload {
                task_group: Some("audio"),
                task: Some("tts"),
                function: Some("SpeechSynthesizer"),
                model: Some(model.to_string()),
                parameters: Some(parameters),
                input: TextInput::default(),
            },
        }
    }

    pub fn continue_task(task_id: &str, text: String) -> Self {
        Self {
            header: ClientHeader {
                action: ACTION_CONTINUE_TASK,
                task_id: task_id.to_string(),
                streaming: "duplex",
            },
            payload: ClientPayload {
                input: TextInput { text: Some(text) },
                ..Default::default()
            },
        }
    }

    pub fn finish_task(task_id: &str) -> Self {
        Self {
            header: ClientHeader {
                action: ACTION_FINISH_TASK,
                task_id: task_id.to_string(),
                streaming: "duplex",
            },
            payload: ClientPayload::default(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("client message serialization")
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerMessage {
    pub header: ServerHeader,
}

#[derive(Debug, Deserialize)]
pub struct ServerHeader {
    pub event: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn error_detail(&self) -> String {
        match (&self.header.error_code, &self.header.error_message) {
            (Some(code), Some(message)) => format!("{message} ({code})"),
            (None, Some(message)) => message.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unspecified task failure".to_string(),
        }
    }
}

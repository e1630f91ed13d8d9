use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, specta::Type)]
pub struct TaskOutcome {
    /// Whether the task counts as done
    pub success: bool,
    /// Text to show the player, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskOutcome {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn with_message(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: Some(message.into()),
        }
    }
}

pub type TaskHandler = Box<dyn Fn(&Value) -> TaskOutcome + Send + Sync>;

/// Maps a landmark task's `app` name to the code that runs it
#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, TaskHandler>,
}

/// Strings are shown as-is, anything else as pretty JSON
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the apps every hunt can use. These only describe the task, the UI layer
    /// decides when it's been completed.
    pub fn with_builtin_apps() -> Self {
        let mut registry = Self::new();

        for name in ["photoPrompt", "triviaCard", "audioPing"] {
            registry.register(name, move |payload| {
                info!("[app:{name}] payload {payload}");
                TaskOutcome::pending()
            });
        }

        for name in ["showMessage", "askPuzzle", "askWordle", "askFifteen"] {
            registry.register(name, |payload| {
                TaskOutcome::with_message(false, payload_text(payload))
            });
        }

        registry
    }

    /// Add or replace the handler for `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&Value) -> TaskOutcome + Send + Sync + 'static,
    ) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn run(&self, app: &str, payload: &Value) -> TaskOutcome {
        match self.handlers.get(app) {
            Some(handler) => handler(payload),
            None => {
                let message = format!("Missing app \"{app}\"");
                warn!("[app-registry] {message}");
                TaskOutcome::with_message(false, message)
            }
        }
    }
}

//! Normalized execution requests

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Definition of one extension (MCP) server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpServer {
    /// Local process speaking over stdio
    Stdio {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },
    /// Remote server reached over HTTP
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
    /// Remote server reached over server-sent events
    Sse {
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
}

/// Inline extension-server configuration, keyed by server name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(rename = "mcpServers")]
    pub servers: BTreeMap<String, McpServer>,
}

impl McpConfig {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// One normalized call to an agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Conversation so far; only the most recent user turn is sent
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Zero or unset falls back to the adapter default; zero there means no deadline
    #[serde(default, with = "duration_secs")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub mcp_config: Option<McpConfig>,
}

impl ExecutionRequest {
    /// Create a request with a single user turn
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_disallowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_mcp_config(mut self, config: McpConfig) -> Self {
        self.mcp_config = Some(config);
        self
    }

    /// Text of the most recent user turn
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    /// System prompt and last user turn joined by a blank line
    ///
    /// Returns `None` when nothing but whitespace remains.
    pub fn prompt_text(&self) -> Option<String> {
        let system = self
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let user = self
            .last_user_message()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (system, user) {
            (Some(system), Some(user)) => Some(format!("{}\n\n{}", system, user)),
            (None, Some(user)) => Some(user.to_string()),
            (Some(system), None) => Some(system.to_string()),
            (None, None) => None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_joins_system_and_last_user_turn() {
        let mut request = ExecutionRequest::new("first").with_system_prompt("Be terse.");
        request.messages.push(ChatMessage::assistant("ok"));
        request.messages.push(ChatMessage::user("second"));

        assert_eq!(request.prompt_text().unwrap(), "Be terse.\n\nsecond");
    }

    #[test]
    fn test_empty_prompt() {
        let request = ExecutionRequest::new("   ");
        assert!(request.prompt_text().is_none());

        let request = ExecutionRequest {
            messages: vec![ChatMessage::assistant("only me")],
            ..Default::default()
        };
        assert!(request.prompt_text().is_none());
    }

    #[test]
    fn test_mcp_config_serializes_as_server_map() {
        let mut config = McpConfig::default();
        config.servers.insert(
            "files".to_string(),
            McpServer::Stdio {
                command: "mcp-files".to_string(),
                args: vec!["--root".to_string(), ".".to_string()],
                env: BTreeMap::new(),
            },
        );

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["mcpServers"]["files"]["type"], "stdio");
        assert_eq!(json["mcpServers"]["files"]["command"], "mcp-files");
        assert!(json["mcpServers"]["files"].get("env").is_none());
    }

    #[test]
    fn test_request_deserializes_timeout_seconds() {
        let json = r#"{"messages":[{"role":"user","content":"hi"}],"timeout":30}"#;
        let request: ExecutionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
        assert!(request.system_prompt.is_none());
    }
}

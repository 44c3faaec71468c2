//! Declarative per-executable profiles

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Supported agent kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    OpenCode,
    ClaudeCode,
    GeminiCli,
    Codex,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::ClaudeCode,
        AgentKind::OpenCode,
        AgentKind::Codex,
        AgentKind::GeminiCli,
    ];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenCode => "opencode",
            Self::ClaudeCode => "claude-code",
            Self::GeminiCli => "gemini-cli",
            Self::Codex => "codex",
        }
    }

    /// Get the command to run this agent
    pub fn command(&self) -> &'static str {
        match self {
            Self::OpenCode => {
                if cfg!(target_os = "windows") {
                    "opencode.cmd"
                } else {
                    "opencode"
                }
            }
            Self::ClaudeCode => {
                if cfg!(target_os = "windows") {
                    "claude.cmd"
                } else {
                    "claude"
                }
            }
            Self::GeminiCli => "gemini",
            Self::Codex => "codex",
        }
    }

    /// Environment variable that overrides the binary path
    pub fn binary_env_var(&self) -> &'static str {
        match self {
            Self::OpenCode => "OPENCODE_BIN",
            Self::ClaudeCode => "CLAUDE_CODE_BIN",
            Self::GeminiCli => "GEMINI_CLI_BIN",
            Self::Codex => "CODEX_BIN",
        }
    }

    /// The fixed profile for this agent
    pub fn profile(&self) -> AgentProfile {
        match self {
            Self::ClaudeCode => AgentProfile {
                name: self.as_str().to_string(),
                program: PathBuf::from(self.command()),
                fixed_args: vec!["--print".to_string(), "--verbose".to_string()],
                flags: FlagTable {
                    prompt: PromptArg::Flag("-p".to_string()),
                    model: Some("--model".to_string()),
                    allowed_tools: Some("--allowedTools".to_string()),
                    disallowed_tools: Some("--disallowedTools".to_string()),
                    output_format: Some(("--output-format".to_string(), "stream-json".to_string())),
                    mcp_config: Some("--mcp-config".to_string()),
                },
                env: BTreeMap::new(),
                output: OutputFormat::JsonEvents,
            },
            Self::OpenCode => AgentProfile {
                name: self.as_str().to_string(),
                program: PathBuf::from(self.command()),
                fixed_args: vec!["run".to_string()],
                flags: FlagTable {
                    model: Some("--model".to_string()),
                    output_format: Some(("--format".to_string(), "json".to_string())),
                    ..FlagTable::default()
                },
                env: BTreeMap::new(),
                output: OutputFormat::JsonEvents,
            },
            Self::Codex => AgentProfile {
                name: self.as_str().to_string(),
                program: PathBuf::from(self.command()),
                fixed_args: vec!["exec".to_string(), "--skip-git-repo-check".to_string()],
                flags: FlagTable {
                    model: Some("--model".to_string()),
                    ..FlagTable::default()
                },
                env: BTreeMap::new(),
                output: OutputFormat::PlainText,
            },
            Self::GeminiCli => AgentProfile {
                name: self.as_str().to_string(),
                program: PathBuf::from(self.command()),
                fixed_args: vec!["--yolo".to_string()],
                flags: FlagTable {
                    prompt: PromptArg::Flag("--prompt".to_string()),
                    model: Some("--model".to_string()),
                    ..FlagTable::default()
                },
                env: BTreeMap::new(),
                output: OutputFormat::MarkerTagged,
            },
        }
    }
}

impl FromStr for AgentKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opencode" => Ok(Self::OpenCode),
            "claude-code" | "claudecode" | "claude" => Ok(Self::ClaudeCode),
            "gemini-cli" | "geminicli" | "gemini" => Ok(Self::GeminiCli),
            "codex" => Ok(Self::Codex),
            _ => Err(AdapterError::unknown_agent(s)),
        }
    }
}

/// Which output normalizer applies to an executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One content chunk per stdout line
    PlainText,
    /// Line-delimited tagged JSON events, with plain-text fallback
    JsonEvents,
    /// Free text carrying paired marker tags
    MarkerTagged,
}

/// How the prompt reaches the executable
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptArg {
    /// Final positional argument
    #[default]
    Positional,
    /// Value of the named flag
    Flag(String),
}

/// Mapping from request fields to the executable's flag names
///
/// A `None` entry means the executable has no such flag and the field is
/// not forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagTable {
    #[serde(default)]
    pub prompt: PromptArg,
    pub model: Option<String>,
    pub allowed_tools: Option<String>,
    pub disallowed_tools: Option<String>,
    /// Flag name and its fixed value
    pub output_format: Option<(String, String)>,
    pub mcp_config: Option<String>,
}

/// Everything fixed about one target executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Origin label used in logs and errors
    pub name: String,
    pub program: PathBuf,
    /// Always-present non-interactive flags, emitted first
    #[serde(default)]
    pub fixed_args: Vec<String>,
    #[serde(default)]
    pub flags: FlagTable,
    /// Adapter-level environment overlay
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub output: OutputFormat,
}

impl AgentProfile {
    /// Profile for an arbitrary executable with no optional flags
    pub fn custom(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        output: OutputFormat,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            fixed_args: Vec::new(),
            flags: FlagTable::default(),
            env: BTreeMap::new(),
            output,
        }
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn with_fixed_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixed_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: FlagTable) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_from_str() {
        assert_eq!("opencode".parse::<AgentKind>().unwrap(), AgentKind::OpenCode);
        assert_eq!("Claude-Code".parse::<AgentKind>().unwrap(), AgentKind::ClaudeCode);
        assert_eq!("gemini".parse::<AgentKind>().unwrap(), AgentKind::GeminiCli);
        assert_eq!("codex".parse::<AgentKind>().unwrap(), AgentKind::Codex);

        let err = "unknown".parse::<AgentKind>().unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_round_trip_names() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.as_str().parse::<AgentKind>().unwrap(), kind);
            assert_eq!(kind.profile().name, kind.as_str());
        }
    }

    #[test]
    fn test_builtin_normalizers() {
        assert_eq!(AgentKind::ClaudeCode.profile().output, OutputFormat::JsonEvents);
        assert_eq!(AgentKind::OpenCode.profile().output, OutputFormat::JsonEvents);
        assert_eq!(AgentKind::Codex.profile().output, OutputFormat::PlainText);
        assert_eq!(AgentKind::GeminiCli.profile().output, OutputFormat::MarkerTagged);
    }
}

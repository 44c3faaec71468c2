//! Turning a request into a concrete command line

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::profile::{AgentProfile, PromptArg};
use crate::request::ExecutionRequest;

/// A fully resolved subprocess invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Overlay applied on top of the ambient environment
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

/// Build the argument list and environment overlay for one call
///
/// Pure: identical inputs give identical output. `prompt` is the already
/// extracted prompt text; `mcp_config_path` is the provisioned config file,
/// if any. Optional flags are only emitted when the request sets them and
/// the profile knows the flag, so omitting a field leaves the executable's
/// own default in place.
pub fn build(
    profile: &AgentProfile,
    request: &ExecutionRequest,
    prompt: &str,
    mcp_config_path: Option<&Path>,
) -> Invocation {
    let flags = &profile.flags;
    let mut args = profile.fixed_args.clone();

    if let Some((flag, value)) = &flags.output_format {
        args.push(flag.clone());
        args.push(value.clone());
    }

    if let (Some(flag), Some(model)) = (&flags.model, non_empty(request.model.as_deref())) {
        args.push(flag.clone());
        args.push(model.to_string());
    }

    if let Some(flag) = &flags.allowed_tools {
        if !request.allowed_tools.is_empty() {
            args.push(flag.clone());
            args.push(request.allowed_tools.join(","));
        }
    }

    if let Some(flag) = &flags.disallowed_tools {
        if !request.disallowed_tools.is_empty() {
            args.push(flag.clone());
            args.push(request.disallowed_tools.join(","));
        }
    }

    if let (Some(flag), Some(path)) = (&flags.mcp_config, mcp_config_path) {
        args.push(flag.clone());
        args.push(path.to_string_lossy().into_owned());
    }

    match &flags.prompt {
        PromptArg::Flag(flag) => {
            args.push(flag.clone());
            args.push(prompt.to_string());
        }
        PromptArg::Positional => args.push(prompt.to_string()),
    }

    // Profile overlay first, request entries win on key collisions
    let mut env = profile.env.clone();
    env.extend(request.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    Invocation {
        program: profile.program.clone(),
        args,
        env,
        working_dir: request.working_dir.clone(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::AgentKind;

    fn claude_request() -> ExecutionRequest {
        ExecutionRequest::new("fix the bug")
            .with_model("sonnet")
            .with_allowed_tools(["Read", "Edit"])
            .with_disallowed_tools(["Bash"])
            .with_working_dir("/tmp/work")
            .with_env("API_KEY", "k")
    }

    #[test]
    fn test_claude_arguments() {
        let profile = AgentKind::ClaudeCode.profile();
        let request = claude_request();
        let invocation = build(&profile, &request, "fix the bug", Some(Path::new("/tmp/mcp.json")));

        assert_eq!(
            invocation.args,
            vec![
                "--print",
                "--verbose",
                "--output-format",
                "stream-json",
                "--model",
                "sonnet",
                "--allowedTools",
                "Read,Edit",
                "--disallowedTools",
                "Bash",
                "--mcp-config",
                "/tmp/mcp.json",
                "-p",
                "fix the bug",
            ]
        );
        assert_eq!(invocation.working_dir, Some(PathBuf::from("/tmp/work")));
        assert_eq!(invocation.env.get("API_KEY").map(String::as_str), Some("k"));
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let profile = AgentKind::ClaudeCode.profile();
        let request = ExecutionRequest::new("hello").with_model("  ");
        let invocation = build(&profile, &request, "hello", None);

        assert_eq!(
            invocation.args,
            vec!["--print", "--verbose", "--output-format", "stream-json", "-p", "hello"]
        );
    }

    #[test]
    fn test_profile_without_flag_drops_field() {
        let profile = AgentKind::Codex.profile();
        let request = claude_request();
        let invocation = build(&profile, &request, "fix the bug", Some(Path::new("/tmp/mcp.json")));

        assert_eq!(
            invocation.args,
            vec!["exec", "--skip-git-repo-check", "--model", "sonnet", "fix the bug"]
        );
    }

    #[test]
    fn test_prompt_is_single_argument() {
        let profile = AgentKind::GeminiCli.profile();
        let prompt = "line one\n\nline two with spaces";
        let invocation = build(&profile, &ExecutionRequest::new(prompt), prompt, None);
        assert_eq!(invocation.args.last().map(String::as_str), Some(prompt));
    }

    #[test]
    fn test_build_is_deterministic() {
        let profile = AgentKind::ClaudeCode.profile().with_env("B", "2").with_env("A", "1");
        let request = claude_request().with_env("Z", "26").with_env("C", "3");

        let first = build(&profile, &request, "p", None);
        let second = build(&profile, &request, "p", None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_request_env_overrides_profile_env() {
        let profile = AgentKind::OpenCode.profile().with_env("API_BASE", "https://default");
        let request = ExecutionRequest::new("p").with_env("API_BASE", "https://override");
        let invocation = build(&profile, &request, "p", None);
        assert_eq!(invocation.env["API_BASE"], "https://override");
    }
}

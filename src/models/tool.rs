use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The coding tool a conversation originated from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ToolTag {
    Copilot,
    Cursor,
    ClaudeCode,
    Antigravity,
    Codex,
    GeminiCli,
}

impl ToolTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolTag::Copilot => "copilot",
            ToolTag::Cursor => "cursor",
            ToolTag::ClaudeCode => "claude-code",
            ToolTag::Antigravity => "antigravity",
            ToolTag::Codex => "codex",
            ToolTag::GeminiCli => "gemini-cli",
        }
    }

    /// Tools that have an on-disk extractor
    pub fn with_extractors() -> Vec<Self> {
        vec![
            Self::Copilot,
            Self::Cursor,
            Self::ClaudeCode,
            Self::Antigravity,
        ]
    }
}

impl std::fmt::Display for ToolTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copilot" => Ok(ToolTag::Copilot),
            "cursor" => Ok(ToolTag::Cursor),
            "claude-code" | "claude" => Ok(ToolTag::ClaudeCode),
            "antigravity" => Ok(ToolTag::Antigravity),
            "codex" => Ok(ToolTag::Codex),
            "gemini-cli" | "gemini" => Ok(ToolTag::GeminiCli),
            _ => Err(format!("Unknown tool: {s}")),
        }
    }
}

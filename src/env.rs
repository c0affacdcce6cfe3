//! Environment variable constants used throughout the application
//!
//! This module centralizes all environment variable names so configuration
//! overrides are spelled the same everywhere.

/// Logging configuration
pub mod logging {
    /// Log level configuration (e.g., "debug", "info", "warn", "error")
    pub const LOG_LEVEL: &str = "CHATVAULT_LOG_LEVEL";

    /// Log file path for file-based logging
    pub const LOG_FILE: &str = "CHATVAULT_LOG_FILE";

    /// Disable colored output (follows the NO_COLOR standard)
    pub const NO_COLOR: &str = "NO_COLOR";
}

/// Tool storage root overrides
pub mod sources {
    /// VS Code workspaceStorage root holding Copilot chat sessions
    pub const COPILOT_DIR: &str = "CHATVAULT_COPILOT_DIR";

    /// Cursor workspaceStorage root holding state.vscdb files
    pub const CURSOR_DIR: &str = "CHATVAULT_CURSOR_DIR";

    /// Claude Code projects directory
    pub const CLAUDE_DIR: &str = "CHATVAULT_CLAUDE_DIR";

    /// Antigravity conversations directory
    pub const ANTIGRAVITY_DIR: &str = "CHATVAULT_ANTIGRAVITY_DIR";
}

/// Network capture configuration
pub mod capture {
    /// "true"/"false" toggle for network capture
    pub const ENABLED: &str = "CHATVAULT_CAPTURE_ENABLED";

    /// Maximum buffered body size in bytes
    pub const MAX_BODY_BYTES: &str = "CHATVAULT_MAX_BODY_BYTES";
}

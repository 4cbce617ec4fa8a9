use clap::Parser;
use std::path::PathBuf;

/// Command-line options for the daemon.
#[derive(Parser, Debug)]
#[command(name = "schoold", version, about = "School records sidecar speaking JSON lines on stdio")]
pub struct Config {
    /// Workspace directory to open at start-up. `workspace.select` can open one later.
    #[arg(long, env = "SCHOOLD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Tracing filter directive, e.g. `info` or `schoold=debug`. Logs go to stderr.
    #[arg(long, env = "SCHOOLD_LOG", default_value = "info")]
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cfg = Config::try_parse_from(["schoold", "--workspace", "/tmp/ws", "--log", "debug"])
            .expect("parse");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cfg.log, "debug");
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Config::try_parse_from(["schoold", "--port", "80"]).is_err());
    }
}

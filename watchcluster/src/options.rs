use std::str::FromStr;
use structopt::StructOpt;

/// Output format of log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected text, compact or json", other)),
        }
    }
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Resolves watch face data by fanning requests out to facet workers.")]
pub struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "info,hyper=warn,warp=warn,reqwest=warn",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,

    /// Format of log messages (text, compact or json)
    #[structopt(long, global = true, env, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable status reporting server which can be used as a readiness check
    #[structopt(long, global = true, env, value_name = "port")]
    pub status_server: Option<u16>,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Accepts watch requests and assembles the responses
    Api(modules::api::Options),
    /// Resolves one facet of each watch request
    Worker(modules::worker::Options),
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn parse_worker_invocation() {
        let options = MainOptions::from_iter_safe(&[
            "watchcluster",
            "--log-format",
            "json",
            "worker",
            "weather",
            "--id",
            "worker-1",
        ])
        .unwrap();

        assert_eq!(options.log_format, LogFormat::Json);
        assert!(matches!(options.command, Command::Worker(ref worker) if worker.queueing.id == "worker-1"));
    }
}

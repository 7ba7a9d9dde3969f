use anyhow::Result;
use harness::ModuleRunner;
use modules::api::Api;
use modules::worker::Worker;
use options::{Command, LogFormat};
use structopt::StructOpt;
use tracing::info;

mod options;

#[tokio::main]
async fn main() -> Result<()> {
    let (command, runner) = init()?;

    match command {
        Command::Api(options) => runner.run(Api::new(options)).await,
        Command::Worker(options) => runner.run(Worker::new(options)).await,
    };

    Ok(())
}

fn init() -> Result<(Command, ModuleRunner)> {
    let options = options::MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log);

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    info!("WatchCluster {}", env!("CARGO_PKG_VERSION"));

    Ok((options.command, ModuleRunner::new(options.status_server)))
}

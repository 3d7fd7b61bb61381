use anyhow::Result;
use clap::Parser;
use std::io::Read;

mod app;
mod cli;
mod serve;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let project_root = app::resolve_project_root(cli.project)?;

    match cli.command {
        Commands::Serve => {
            let app = app::App::bootstrap(&project_root)?;
            serve::run(app).await?;
        }
        Commands::Run { task } => {
            let task = match task {
                Some(task) => task,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let app = app::App::bootstrap(&project_root)?;
            let state = app.engine.run(task, None).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod bookmarks;
mod cli;
mod collections;
mod company;
mod config;
mod metadata;
mod scrape;
mod storage;
mod tags;
#[cfg(test)]
mod tests;
mod web;

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let paths = app::AppPaths::from_env()?;
    let app = app::App::load(&paths)?;

    match args.command {
        cli::Command::Daemon { listen } => {
            let listen = listen.unwrap_or_else(|| app.config().listen.clone());
            web::start_daemon(app, listen)?;
        }

        cli::Command::Meta { url } => match app.interrogate_url(Some(url.as_str())) {
            Ok(meta) => {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            }
            Err(err) => {
                bail!("{err}");
            }
        },
    }

    Ok(())
}

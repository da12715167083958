use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start linkshelf as a service.
    Daemon {
        /// Address to listen on, overrides the config file
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Resolve title, description, preview image and favicon of a url
    Meta {
        /// A url
        #[clap(allow_hyphen_values = true)]
        url: String,
    },
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;
mod session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search arXiv with a memory of who you are
    Arxiv {
        /// Username memories are stored under
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_key: Option<String>,

        #[arg(long, env = "MULTION_API_KEY", hide_env_values = true)]
        multion_key: Option<String>,

        /// Memory service base URL
        #[arg(long, env = "MEM0_HOST")]
        memory_host: Option<String>,

        #[arg(long, env = "MEM0_API_KEY", hide_env_values = true)]
        memory_key: Option<String>,
    },

    /// Drive a browser through natural-language commands
    Browse {
        /// YAML file with extra tool servers
        #[arg(long, value_name = "FILE")]
        servers: Option<PathBuf>,
    },

    /// Run one browser command and print the answer
    Run {
        command: String,

        #[arg(long, value_name = "FILE")]
        servers: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Arxiv {
            user,
            openai_key,
            multion_key,
            memory_host,
            memory_key,
        } => {
            commands::arxiv::execute(commands::arxiv::ArxivArgs {
                user,
                openai_key,
                multion_key,
                memory_host,
                memory_key,
            })
            .await
        }
        Command::Browse { servers } => commands::browse::execute(servers).await,
        Command::Run { command, servers } => commands::run::execute(command, servers).await,
    }
}

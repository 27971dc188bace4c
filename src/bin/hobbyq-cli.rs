//! One-shot client for a running hobbyq server.
//!
//! Connects, performs the handshake, sends a single command and prints the
//! response.

use clap::{Parser, Subcommand};
use tracing::info;

use hobbyq::config::DEFAULT_BIND_ADDR;
use hobbyq::core::protocol::Status;
use hobbyq::Client;

/// Command-line interface for hobbyq.
#[derive(Debug, Parser)]
#[command(name = "hobbyq-cli", version, about = "hobbyq CLI: xmake / qmake / dump")]
pub struct Cli {
    /// Address of the hobbyq server
    #[arg(short, long, default_value = DEFAULT_BIND_ADDR)]
    pub addr: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an exchange (no-op if it exists)
    Xmake {
        /// Exchange name
        name: String,
    },

    /// Create a queue (no-op if it exists)
    Qmake {
        /// Queue name
        name: String,
    },

    /// Print the server's exchanges and queues
    Dump {
        #[arg(short, long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut client = Client::connect(cli.addr.as_str())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", cli.addr, e))?;

    let (command, arg) = match cli.command {
        Command::Xmake { name } => ("XMAKE", name),
        Command::Qmake { name } => ("QMAKE", name),
        Command::Dump { format } => ("DUMP", format),
    };
    info!("sending {} {}", command, arg);

    let resp = client.send_request(command, [arg]).await?;
    match (command, resp.status_kind()) {
        ("DUMP", Some(Status::Ok)) => {
            let dump = resp.args.first().map(String::as_str).unwrap_or("");
            println!("resp: status {}, dump {}", resp.status, dump);
        }
        _ => println!("resp: status {}, args {:?}", resp.status, resp.args),
    }

    if !resp.is_success() {
        anyhow::bail!("server answered {}", resp.status);
    }
    Ok(())
}

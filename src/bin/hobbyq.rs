//! hobbyq – one binary that can start the server *or* act as an
//! interactive client shell.
//
//  $ hobbyq start --config hobbyq.toml
//  $ hobbyq connect 127.0.0.1:7253
//  > xmake orders
//  201 Created
//  > dump
//  200 OK {"exchanges":[{"name":"orders","bindings":[]}],"queues":[]}
use hobbyq::core::protocol::Response;
use hobbyq::logging::init_logging;
use hobbyq::{start_broker, Client, Config};

use clap::{Parser, Subcommand};
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};

#[derive(Debug, Parser)]
#[command(name = "hobbyq", version, about = "hobbyq server & shell")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the server.
    Start {
        /// Path to config TOML (env HOBBYQ_CONFIG is used when omitted)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Connect to a running server in interactive mode.
    Connect {
        /// Server address (host:port)
        #[arg(default_value = hobbyq::config::DEFAULT_BIND_ADDR)]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Start { config } => {
            let cfg: Config = Config::load(config.as_deref())?;
            init_logging(&cfg.logging.level)?;
            start_broker(&cfg.server).await?;
        }
        Command::Connect { addr } => {
            init_logging("warn")?;
            repl(&addr).await?;
        }
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────
// Interactive REPL shell
// ───────────────────────────────────────────────────────────
async fn repl(addr: &str) -> anyhow::Result<()> {
    let mut rl: Editor<(), DefaultHistory> = DefaultEditor::new()?;
    let mut client = Client::connect(addr).await?;

    println!("Connected to {}. Type `help` for commands.", client.peer_addr());

    loop {
        let Ok(line) = rl.readline("> ") else { break };
        let _ = rl.add_history_entry(line.as_str());

        let resp = match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            [] => continue,
            ["help"] => {
                println!("xmake <name> | qmake <name> | dump [format] | raw <COMMAND> [args..] | exit");
                continue;
            }
            ["exit" | "quit"] => break,
            ["xmake", name] => client.send_request("XMAKE", [*name]).await?,
            ["qmake", name] => client.send_request("QMAKE", [*name]).await?,
            ["dump"] => client.send_request("DUMP", ["json"]).await?,
            ["dump", format] => client.send_request("DUMP", [*format]).await?,
            ["raw", command, args @ ..] => client.send_request(command, args.iter().copied()).await?,
            _ => {
                println!("Unknown cmd. Type `help`.");
                continue;
            }
        };
        print_response(&resp);
    }

    Ok(())
}

fn print_response(resp: &Response) {
    let status = match resp.status_kind() {
        Some(s) => s.to_string(),
        None => resp.status.to_string(),
    };
    if resp.args.is_empty() {
        println!("{status}");
    } else {
        println!("{status} {}", resp.args.join(" "));
    }
}

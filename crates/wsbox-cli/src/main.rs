mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use opts::{ClientOpts, ServerArgs};

#[derive(Parser, Debug)]
#[command(
    name = "wsbox",
    version,
    about = "Sandboxed file transfer over a WebSocket tunnel",
    after_help = "Examples:\n  \
        wsbox server --addr 0.0.0.0:8080 --dir ./files --token mysecret\n  \
        wsbox client -s ws://mysecret@server:8080/ws list\n  \
        wsbox client -s ws://mysecret@server:8080/ws add file.txt uploads/file.txt"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the file gateway
    Server(ServerArgs),

    /// Connect to a gateway and run a file operation
    Client {
        #[command(flatten)]
        opts: ClientOpts,

        #[command(subcommand)]
        command: ClientCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// List a remote directory as a tree
    List {
        /// Remote directory
        #[arg(default_value = "/")]
        dir: String,
    },

    /// Upload a local file
    Add {
        /// Local file to upload
        local: std::path::PathBuf,

        /// Remote destination (default: the local file name)
        remote: Option<String>,
    },

    /// Download a remote file
    Get {
        /// Remote file to download
        remote: String,

        /// Local destination (default: the remote file name)
        local: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Server(args) => commands::server::cmd_server(&args).await,
        Command::Client { opts, command } => match command {
            ClientCommand::List { dir } => commands::list::cmd_list(&opts, &dir).await,
            ClientCommand::Add { local, remote } => {
                commands::add::cmd_add(&opts, &local, remote.as_deref()).await
            }
            ClientCommand::Get { remote, local } => {
                commands::get::cmd_get(&opts, &remote, local.as_deref()).await
            }
        },
    }
}

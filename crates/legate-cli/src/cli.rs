use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "legate",
    version,
    about = "Assistant conversations from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a prompt to the assistant and print its reply
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// The message to send.
    pub prompt: String,

    /// Continue the most recent conversation instead of starting a new one.
    #[arg(short = 'c', long = "continue")]
    pub continue_conversation: bool,
}

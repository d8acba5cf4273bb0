use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "The Luma scripting language")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Script to run. Without one, starts the REPL.
    pub path: Option<PathBuf>,

    /// Enter the REPL after running the script, keeping its globals.
    #[arg(short, long)]
    pub interactive: bool,

    /// Directory `@std` modules are loaded from.
    #[arg(long, global = true, env = "LUMA_STD_ROOT")]
    pub std_root: Option<PathBuf>,

    /// Maximum depth of nested function calls.
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// More logging; repeat for more detail.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the token stream of a file.
    Tokens { path: PathBuf },
    /// Print the parsed program.
    Ast { path: PathBuf },
    /// Run a file.
    Run { path: PathBuf },
}

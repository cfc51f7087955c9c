use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hashfile",
    about = "Content-addressed single-file databases with a verifiable commit log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the databases (overrides the config file)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty database
    New(NameArgs),
    /// Delete a database and its journal files
    Delete(NameArgs),
    /// Check whether a database exists
    Exists(NameArgs),
    /// Store a file's content and commit it
    Put(PutArgs),
    /// Read content by hash
    Get(GetArgs),
    /// Erase content by hash and commit
    Rm(RmArgs),
    /// List content keys of one kind
    Keys(KeysArgs),
    /// Show commit history
    Log(LogArgs),
    /// Audit the commit chain and content pointers
    Verify(NameArgs),
    /// Show or replace the peer list
    Peers(PeersArgs),
}

#[derive(Args)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub name: String,
    pub file: PathBuf,
    #[arg(short, long, default_value = "0")]
    pub kind: u32,
}

#[derive(Args)]
pub struct GetArgs {
    pub name: String,
    pub hash: String,
    #[arg(short, long, default_value = "0")]
    pub kind: u32,
    /// Write the content here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RmArgs {
    pub name: String,
    #[arg(required = true)]
    pub hashes: Vec<String>,
    #[arg(short, long, default_value = "0")]
    pub kind: u32,
}

#[derive(Args)]
pub struct KeysArgs {
    pub name: String,
    #[arg(short, long, default_value = "0")]
    pub kind: u32,
}

#[derive(Args)]
pub struct LogArgs {
    pub name: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct PeersArgs {
    pub name: String,
    /// Replace the peer list (comma separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "clear")]
    pub set: Option<Vec<String>>,
    /// Remove every peer
    #[arg(long)]
    pub clear: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["hashfile", "put", "db", "file.bin", "--kind", "3", "--dir", "/tmp/x", "--format", "json"]);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Put(args) => {
                assert_eq!(args.kind, 3);
                assert_eq!(args.file, PathBuf::from("file.bin"));
            }
            _ => panic!("expected put"),
        }
    }

    #[test]
    fn peers_set_is_comma_separated() {
        let cli = Cli::parse_from(["hashfile", "peers", "db", "--set", "tcp://a:1,tcp://b:2"]);
        match cli.command {
            Command::Peers(args) => assert_eq!(args.set.unwrap().len(), 2),
            _ => panic!("expected peers"),
        }
    }
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::system::core_count;

#[derive(Debug, Parser)]
#[command(
    name = "coppafish",
    version,
    about = "Spot calling for coppafish experiments: filter, find spots, call reference spots and run OMP"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubArgs,

    #[arg(
        short = 't',
        long = "threads",
        help = "Number of threads",
        value_name = "THREADS",
        default_value_t = core_count(),
        global = true
    )]
    pub threads: usize,

    #[arg(short = 'v', long = "verbose", help = "Log at debug level", global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum SubArgs {
    /// Runs every stage not yet in the notebook, then writes the reports
    Run {
        #[arg(short = 'c', long = "config", value_name = "PATH", required = true)]
        config: PathBuf,
    },
    /// Lists notebook pages, describes one page or prints one variable.
    /// Can also delete a page so its stage runs again, or rewrite every page.
    Notebook {
        #[arg(short = 'd', long = "dir", value_name = "DIR", required = true)]
        dir: PathBuf,

        #[arg(short = 'p', long = "page", value_name = "PAGE")]
        page: Option<String>,

        #[arg(long = "variable", value_name = "NAME", requires = "page")]
        variable: Option<String>,

        #[arg(long = "delete", value_name = "PAGE", conflicts_with_all = ["page", "resave"])]
        delete: Option<String>,

        #[arg(long = "resave", conflicts_with = "page")]
        resave: bool,
    },
    /// Writes Reed-Solomon style gene codes as a code book
    Codes {
        #[arg(short = 'g', long = "genes", value_name = "N")]
        genes: usize,

        #[arg(short = 'r', long = "rounds", value_name = "N")]
        rounds: usize,

        #[arg(short = 'n', long = "channels", value_name = "N")]
        channels: usize,

        #[arg(short = 'o', long = "out", value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Writes a synthetic experiment with its config
    Simulate {
        #[arg(short = 'o', long = "out", value_name = "DIR", required = true)]
        out: PathBuf,

        #[arg(short = 's', long = "seed", default_value_t = 0)]
        seed: u64,

        #[arg(long = "tiles", default_value_t = 2)]
        tiles: usize,
    },
}

mod call_spots;
mod cli;
mod config;
mod indexing;
mod input;
mod logging;
mod model;
mod morphology;
mod notebook;
mod omp;
mod pipeline;
mod report;
mod simd;
mod simulate;
mod spot_colours;
mod utils;

use std::path::Path;

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Args, SubArgs};
use crate::input::codebook::write_codebook;
use crate::input::codes::reed_solomon_codes;
use crate::notebook::{Notebook, catalogue};
use crate::simulate::{SimulationOptions, simulate};

fn main() {
    let start = std::time::Instant::now();
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
    {
        error!("{}", e);
        std::process::exit(1);
    }
    info!(simd = simd::backend_name(), threads = args.threads, "starting");

    if let Err(e) = run(args.command) {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("elapsed time: {:.3?}", start.elapsed());
}

fn run(command: SubArgs) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        SubArgs::Run { config } => {
            pipeline::run_pipeline(&config)?;
        }
        SubArgs::Notebook {
            dir,
            page,
            variable,
            delete,
            resave,
        } => {
            if delete.is_some() || resave {
                edit_notebook(&dir, delete.as_deref(), resave)?;
            } else {
                print!("{}", notebook_text(&dir, page.as_deref(), variable.as_deref())?);
            }
        }
        SubArgs::Codes {
            genes,
            rounds,
            channels,
            out,
        } => {
            let codes = reed_solomon_codes(genes, rounds, channels)?;
            match out {
                Some(path) => {
                    write_codebook(&path, &codes)?;
                    info!(path = %path.display(), n_genes = genes, "wrote code book");
                }
                None => {
                    for g in 0..codes.n_genes() {
                        println!("{} {}", codes.names[g], codes.code_string(g));
                    }
                }
            }
        }
        SubArgs::Simulate { out, seed, tiles } => {
            let truth = simulate(
                &out,
                &SimulationOptions {
                    seed,
                    n_tiles: tiles,
                    ..SimulationOptions::default()
                },
            )?;
            println!("{}", truth.config_path.display());
        }
    }
    Ok(())
}

/// Page list, page description or one variable as pretty JSON.
fn notebook_text(
    dir: &Path,
    page: Option<&str>,
    variable: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    let nb = Notebook::open(dir, None)?;
    let mut out = String::new();
    match (page, variable) {
        (None, _) => {
            out.push_str(&format!("Notebook at {} (version {})\n", nb.dir().display(), nb.version()));
            let versions = nb.all_versions();
            for name in catalogue::page_names() {
                match versions.get(name) {
                    Some(version) => out.push_str(&format!("[x] {} ({})\n", name, version)),
                    None => out.push_str(&format!("[ ] {}\n", name)),
                }
            }
        }
        (Some(page), None) => {
            out.push_str(&nb.describe(page)?);
            out.push('\n');
        }
        (Some(page), Some(variable)) => {
            let value = nb.page(page)?.get_value(variable)?;
            out.push_str(&serde_json::to_string_pretty(value)?);
            out.push('\n');
        }
    }
    Ok(out)
}

/// Deletes one page, then rewrites the pages left when asked to.
fn edit_notebook(
    dir: &Path,
    delete: Option<&str>,
    resave: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut nb = Notebook::open(dir, None)?;
    if let Some(page) = delete {
        nb.delete_page(page)?;
    }
    if resave {
        nb.resave()?;
        info!(pages = nb.page_names().len(), "resaved notebook");
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;

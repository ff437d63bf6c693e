use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use omero_scripts::channels::convert;
use omero_scripts::cli::run_main;

///Convert a CSV channel mapping to a YAML channel configuration
#[derive(Parser)]
struct Args {
    ///The CSV file to convert
    infile: PathBuf,

    ///The YAML file to output
    outfile: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    run_main(|| {
        convert(&args.infile, &args.outfile)
            .with_context(|| format!("converting {}", args.infile.display()))?;
        Ok(())
    })
}

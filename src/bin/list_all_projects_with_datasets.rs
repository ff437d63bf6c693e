use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::ProjectDataset;
use omero_scripts::cli::{run_main, ConnectionArgs, NamesArgs, OutputArgs};
use omero_scripts::Report;

///List all projects and child datasets visible to the user
#[derive(Parser)]
struct Args {
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    names: NamesArgs,
    #[command(flatten)]
    connection: ConnectionArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();
    run_main(|| {
        let mut manager = args.connection.manager(None);
        let query = ProjectDataset::query(args.names.names());
        let report = Report::<ProjectDataset>::fetch(&mut manager, &query)?;
        report.emit(args.output.quiet, args.output.file())?;
        Ok(())
    })
}

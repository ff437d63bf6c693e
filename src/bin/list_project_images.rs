use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::ProjectImage;
use omero_scripts::cli::{run_main, ConnectionArgs, NamesArgs, OutputArgs};
use omero_scripts::Report;

///List the images of every dataset in a project
#[derive(Parser)]
struct Args {
    ///Project ID
    project: i64,
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
        let query = ProjectImage::query(args.project, args.names.names());
        let report = Report::<ProjectImage>::fetch(&mut manager, &query)?;
        report.emit(args.output.quiet, args.output.file())?;
        Ok(())
    })
}

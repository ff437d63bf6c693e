use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::PlateImage;
use omero_scripts::cli::{run_main, ConnectionArgs, NamesArgs, OutputArgs};
use omero_scripts::Report;

///List every field of every well in a plate
#[derive(Parser)]
struct Args {
    ///Plate ID
    plate: i64,
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
        let query = PlateImage::query(args.plate, args.names.names());
        let report = Report::<PlateImage>::fetch(&mut manager, &query)?;
        report.emit(args.output.quiet, args.output.file())?;
        Ok(())
    })
}

use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::ScreenPlate;
use omero_scripts::cli::{run_main, ConnectionArgs, NamesArgs, OutputArgs};
use omero_scripts::Report;

///List the plates in a screen
#[derive(Parser)]
struct Args {
    ///Screen ID
    screen: i64,
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
        let query = ScreenPlate::query(args.screen, args.names.names());
        let report = Report::<ScreenPlate>::fetch(&mut manager, &query)?;
        report.emit(args.output.quiet, args.output.file())?;
        Ok(())
    })
}

use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::ScreenFirstField;
use omero_scripts::cli::{run_main, ConnectionArgs, OutputArgs};
use omero_scripts::Report;

///List the first field of every well of every plate in a screen
#[derive(Parser)]
struct Args {
    ///Screen ID
    screen: i64,
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    connection: ConnectionArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();
    run_main(|| {
        let mut manager = args.connection.manager(None);
        let query = ScreenFirstField::query(args.screen);
        let report = Report::<ScreenFirstField>::fetch(&mut manager, &query)?;
        report.emit(args.output.quiet, args.output.file())?;
        Ok(())
    })
}

use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::User;
use omero_scripts::cli::{run_main, ConnectionArgs, OutputArgs};
use omero_scripts::Report;

///List all users
#[derive(Parser)]
struct Args {
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    connection: ConnectionArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();
    run_main(|| {
        let mut manager = args.connection.manager(None);
        let report = Report::<User>::fetch(&mut manager, &User::query())?;
        report.emit(args.output.quiet, args.output.file())?;
        Ok(())
    })
}

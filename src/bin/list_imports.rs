use std::process::ExitCode;

use clap::Parser;
use omero_scripts::catalogue::{parse_timestamp, Imports, Period, PeriodImports};
use omero_scripts::cli::{run_main, ConnectionArgs, OutputArgs};
use omero_scripts::Report;

///Report number of images imported in a date range
#[derive(Parser)]
struct Args {
    #[command(flatten)]
    output: OutputArgs,

    ///Start timestamp
    #[arg(short, long)]
    start: Option<String>,

    ///End timestamp
    #[arg(short, long)]
    end: Option<String>,

    ///Complete report. Ignores start/end
    #[arg(short, long)]
    all: bool,

    ///Period for use in conjunction with -a
    #[arg(short, long, value_enum, default_value_t)]
    period: Period,

    #[command(flatten)]
    connection: ConnectionArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();
    run_main(|| {
        let mut manager = args.connection.manager(None);
        if args.all {
            let query = PeriodImports::query(args.period);
            let report = Report::<PeriodImports>::fetch(&mut manager, &query)?;
            report.emit(args.output.quiet, args.output.file())?;
        } else {
            //both dates are parsed before anything is sent to the server
            let start = args.start.as_deref().map(parse_timestamp).transpose()?;
            let end = args.end.as_deref().map(parse_timestamp).transpose()?;
            let query = Imports::query(start, end);
            let report = Report::<Imports>::fetch(&mut manager, &query)?;
            report.emit(args.output.quiet, args.output.file())?;
        }
        Ok(())
    })
}

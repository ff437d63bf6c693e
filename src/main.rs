use std::process::ExitCode;

use clap::Parser;
use omero_scripts::cli::{run_main, ConnectionArgs};
use omero_scripts::movie::{make_movie, MovieOptions};

///Make a movie of the z planes of an image, one frame per cycle
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(flatten)]
    movie: MovieOptions,

    ///OMERO.web address serving the rendered planes, e.g. https://omero.example.org
    #[arg(long, value_name = "URL")]
    web_url: String,

    #[command(flatten)]
    connection: ConnectionArgs,
}

fn main() -> ExitCode {
    let args = Args::parse();
    run_main(|| {
        let mut manager = args.connection.manager(Some(&args.web_url));
        let video = make_movie(&mut manager, &args.movie)?;
        println!("{}", video.display());
        Ok(())
    })
}

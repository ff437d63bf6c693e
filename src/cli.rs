//! Flag groups shared by the command line tools, and the common `main` wrapper.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::connection::ConnectionManager;
use crate::credentials::CredentialSource;
use crate::gateway::OmeroConnector;
use crate::omero_cli::OmeroCli;

///Output destination flags
#[derive(Debug, Clone, Default, clap::Args)]
pub struct OutputArgs {
    ///Do not print output
    #[arg(short, long)]
    pub quiet: bool,

    ///Destination CSV file
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

impl OutputArgs {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct NamesArgs {
    ///Do not print names
    #[arg(short, long)]
    pub nonames: bool,
}

impl NamesArgs {
    pub fn names(&self) -> bool {
        !self.nonames
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConnectionArgs {
    ///Credentials file used when there is no active CLI session [default: ~/.omero/config]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    ///OMERO command line client used to run queries
    #[arg(long, value_name = "PROGRAM", default_value = "omero")]
    pub omero: String,
}

impl ConnectionArgs {
    ///Manager for queries, and for images too when `web_url` names the OMERO.web server
    pub fn manager(&self, web_url: Option<&str>) -> ConnectionManager {
        let connector = OmeroConnector {
            cli: OmeroCli {
                program: self.omero.clone(),
            },
            web_url: web_url.map(str::to_string),
        };
        ConnectionManager::with_connector(connector, CredentialSource::new(self.config.clone()))
    }
}

///Set up logging, run `body`, and turn an error into a message on stderr and exit status 1
pub fn run_main(body: impl FnOnce() -> anyhow::Result<()>) -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match body() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

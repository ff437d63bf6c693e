use std::path::PathBuf;

///Everything that can go wrong in the library. Binaries report these to the user and exit with
///status 1.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No active OMERO CLI session and configuration file {} does not exist", .0.display())]
    NoCredentials(PathBuf),

    #[error(
        "Configuration file contains private credentials and must not be accessible by other \
         users. Please run:\n\n    chmod 600 {}\n",
        .0.display()
    )]
    InsecureConfig(PathBuf),

    #[error("Configuration file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Connection not available, please check your user name and password.")]
    Authentication,

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server answered {url} with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Unexpected response from server: {0}")]
    Response(String),

    #[error("OMERO CLI not found ({program}), ensure that it is installed and available on the path")]
    CliMissing {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    CliFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Query parameter :{0} is not bound")]
    UnboundParameter(String),

    #[error("Image access needs the OMERO.web address, pass --web-url")]
    NoWebGateway,

    #[error("Column {column} of the query result: expected {expected}, got {found}")]
    Cell {
        column: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Well row {0} has no single letter designation")]
    WellRow(i64),

    #[error("Header does not have the same number of columns as the rows")]
    HeaderMismatch,

    #[error("Row {0} does not have the same number of columns as the first row")]
    RaggedRow(usize),

    #[error("Start and/or end dates have to be parseable! ({0})")]
    Date(String),

    #[error("Image {0} not found or inaccessible!")]
    ImageNotFound(i64),

    #[error("{0}")]
    Precondition(String),

    #[error("ffmpeg not found ({program}), ensure that it is installed and available on the path")]
    EncoderMissing {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Failed to process video with ffmpeg ({status}). Ensure it is installed with the correct \
         codecs. Frames were left in {}",
        frames.display()
    )]
    EncoderFailed { status: String, frames: PathBuf },

    #[error("First {} column names must be {:?}", .0.len(), .0)]
    MandatoryColumns(&'static [&'static str]),

    #[error("All columns must have a name for the channel grouping title")]
    UnnamedGrouping,

    #[error("Channel grouping titles must be unique")]
    DuplicateGrouping,

    #[error("Layer {0:?} is not an integer")]
    Layer(String),

    #[error("Unrecognised color {0:?}")]
    Color(String),

    #[error(transparent)]
    Csv(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

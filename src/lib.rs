//! Command line tools for an OMERO image server: fixed reports over its query service written as
//! text or CSV, a z-stack movie maker, and a channel mapping converter.

pub mod catalogue;
pub mod channels;
pub mod cli;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod font;
pub mod gateway;
pub mod movie;
pub mod omero_cli;
pub mod query;
pub mod rtypes;
pub mod table;
pub mod web;

pub use connection::ConnectionManager;
pub use error::{Error, Result};
pub use query::{Query, Record, Report};
pub use rtypes::{Parameters, RType, Value};
pub use table::{read_table, write_csv};

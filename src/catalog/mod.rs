//! Film catalog: record type, raw-line parser and dataset loaders.

pub mod error;
pub mod loader;
pub mod parser;
pub mod record;

pub use error::{CatalogError, ParseError};
pub use loader::{
    load_or_empty, load_raw, load_resolved, write_resolved, CatalogOptions, Dataset, Source,
};
pub use parser::{parse_catalog, parse_line, DEFAULT_HEADER_LINES};
pub use record::FilmRecord;

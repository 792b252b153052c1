//! Parser for the raw tab-separated locations catalog.
//!
//! Layout after the fixed header, one record per line:
//!
//! ```text
//! Name (YYYY) {episode}<TAB>...<TAB>Location[<TAB>(notes)]
//! ```
//!
//! The location is the last field, or the second-to-last when the line ends
//! in a parenthesised notes field.

use super::error::ParseError;
use super::loader::{CatalogOptions, Dataset};
use super::record::FilmRecord;
use std::io::{self, BufRead};
use tracing::debug;

/// Header lines at the top of the catalog file.
pub const DEFAULT_HEADER_LINES: usize = 14;

/// Parse one catalog line (with or without its line terminator).
pub fn parse_line(line: &str) -> Result<FilmRecord, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 2 {
        return Err(ParseError::MissingFields);
    }

    let location = if line.ends_with(')') && fields.len() >= 3 {
        fields[fields.len() - 2]
    } else {
        fields[fields.len() - 1]
    };
    let location = location.trim();
    if location.is_empty() {
        return Err(ParseError::EmptyLocation);
    }

    let (name, year) = split_name_year(fields[0])?;
    Ok(FilmRecord::new(name, year, location))
}

/// `"Title" (1999) {Episode}` → (`"Title"`, 1999)
fn split_name_year(field: &str) -> Result<(&str, u16), ParseError> {
    let open = field.find('(').ok_or(ParseError::MissingYear)?;
    let name = field[..open].trim_end();
    if name.is_empty() {
        return Err(ParseError::EmptyName);
    }

    let after = &field[open + 1..];
    let token = after.get(..4).unwrap_or(after);
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidYear(token.to_string()));
    }
    let year = token
        .parse()
        .map_err(|_| ParseError::InvalidYear(token.to_string()))?;
    Ok((name, year))
}

/// Parse a whole catalog stream: skip the header, keep good lines, count bad
/// ones. Bytes that are not UTF-8 are decoded lossily.
pub fn parse_catalog<R: BufRead>(reader: R, opts: &CatalogOptions) -> io::Result<Dataset> {
    let mut dataset = Dataset::default();

    for (idx, chunk) in reader.split(b'\n').enumerate() {
        let bytes = chunk?;
        if idx < opts.header_lines {
            continue;
        }
        let line = String::from_utf8_lossy(&bytes);
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Ok(record) => {
                dataset.records.push(record);
                if opts.limit.is_some_and(|n| dataset.records.len() >= n) {
                    break;
                }
            }
            Err(e) => {
                debug!(line = idx + 1, error = %e, "skipping malformed catalog line");
                dataset.skipped += 1;
            }
        }
    }

    Ok(dataset)
}

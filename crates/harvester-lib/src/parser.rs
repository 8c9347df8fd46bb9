//! Whitespace-table parsing
//!
//! `kubectl top` style output: one header row, then one row per entity,
//! columns separated by whitespace runs. Parsing is all-or-nothing: a
//! single malformed row rejects the whole table so a partially parsed
//! tick can never reach the series store.

use crate::errors::TableParseError;
use crate::models::Record;

/// Synthetic key carrying the entity name in every parsed record,
/// independent of what the table's first header happens to be called.
pub const ENTITY_NAME_KEY: &str = "__entity_name";

/// Parse raw tabular text into one ordered record per entity row.
///
/// Row order of the input is preserved in the output. Each record keeps
/// the table's columns in positional order and additionally carries
/// [`ENTITY_NAME_KEY`] set to the row's first token.
pub fn parse_table(raw: &str) -> Result<Vec<(String, Record)>, TableParseError> {
    let mut lines = raw
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let header_line = lines.next().ok_or(TableParseError::Empty)?;
    let headers: Vec<&str> = header_line.split_whitespace().collect();
    if headers.is_empty() {
        return Err(TableParseError::Empty);
    }

    let mut records = Vec::new();
    for (offset, line) in lines.enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != headers.len() {
            return Err(TableParseError::MalformedRow {
                line: offset + 2,
                expected: headers.len(),
                actual: tokens.len(),
            });
        }

        let mut record = Record::new();
        record.insert(ENTITY_NAME_KEY, tokens[0]);
        for (header, token) in headers.iter().zip(&tokens) {
            record.insert(*header, *token);
        }
        records.push((tokens[0].to_string(), record));
    }

    Ok(records)
}

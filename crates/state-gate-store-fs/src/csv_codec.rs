// crates/state-gate-store-fs/src/csv_codec.rs
// ============================================================================
// Module: Run Log CSV Codec
// Description: RFC-4180-style encode/decode of RunEntry rows.
// Purpose: Give the filesystem-backed log store a stable, append-friendly
//          on-disk row format without depending on a CSV library.
// Dependencies: state_gate_core::run::RunEntry
// ============================================================================

//! ## Overview
//! Rows are hand-encoded rather than pulled in from a CSV crate: the format
//! is narrow (six fixed, known fields, no embedded headers mid-file) and the
//! quoting rules are the three from RFC 4180 that matter here — a field is
//! quoted if it contains a comma, a double quote, or a newline, and an
//! embedded double quote is escaped by doubling it.
//!
//! `artifact_paths` is encoded as a single field: its members are joined with
//! `;`, and that joined string is then quoted like any other field if it
//! needs it. An empty artifact set encodes as an empty field, not `;`.

use state_gate_core::run::RunEntry;

/// The header row written as the first line of every run's log file.
pub const HEADER_ROW: &str = "timestamp,state,revision,event,idempotency_key,artifact_paths";

/// A CSV row failed to parse into a [`RunEntry`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CsvError {
    /// A data row did not split into exactly six fields.
    #[error("row has {found} field(s), expected 6: {row:?}")]
    WrongFieldCount {
        /// The raw row text.
        row: String,
        /// The number of fields actually found.
        found: usize,
    },
    /// The `revision` field was not a valid non-negative integer.
    #[error("row has an invalid revision field: {0:?}")]
    InvalidRevision(String),
    /// A quoted field was never closed before the input ended.
    #[error("unterminated quoted field")]
    UnterminatedQuote,
}

/// Encodes a single [`RunEntry`] as one RFC-4180-style CSV row, without a
/// trailing newline.
#[must_use]
pub fn encode_entry(entry: &RunEntry) -> String {
    let artifact_paths = entry.artifact_paths.join(";");
    [
        entry.timestamp.as_str(),
        entry.state.as_str(),
        &entry.revision.to_string(),
        entry.event.as_str(),
        entry.idempotency_key.as_str(),
        artifact_paths.as_str(),
    ]
    .into_iter()
    .map(encode_field)
    .collect::<Vec<_>>()
    .join(",")
}

fn encode_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

/// Decodes every data row of a run's log contents, skipping the header row.
///
/// # Errors
///
/// Returns [`CsvError`] if any data row is malformed.
pub fn decode_entries(contents: &str) -> Result<Vec<RunEntry>, CsvError> {
    let mut rows = split_records(contents)?.into_iter();
    rows.next(); // header row
    rows.map(|fields| decode_row(&fields)).collect()
}

fn decode_row(fields: &[String]) -> Result<RunEntry, CsvError> {
    let [timestamp, state, revision, event, idempotency_key, artifact_paths] = fields else {
        return Err(CsvError::WrongFieldCount {
            row: fields.join(","),
            found: fields.len(),
        });
    };
    let revision: u64 = revision
        .parse()
        .map_err(|_| CsvError::InvalidRevision(revision.clone()))?;
    let artifact_paths = if artifact_paths.is_empty() {
        Vec::new()
    } else {
        artifact_paths.split(';').map(ToOwned::to_owned).collect()
    };
    Ok(RunEntry {
        timestamp: timestamp.clone(),
        state: state.clone(),
        revision,
        event: event.clone(),
        idempotency_key: idempotency_key.clone(),
        artifact_paths,
    })
}

/// Splits `contents` into records (rows), each a vector of unescaped field
/// strings, honoring quoted fields that may themselves contain commas or
/// embedded newlines.
fn split_records(contents: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();
    let mut saw_any_field_char = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                saw_any_field_char = true;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                saw_any_field_char = true;
            }
            '\r' => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut fields));
                saw_any_field_char = false;
            }
            other => {
                field.push(other);
                saw_any_field_char = true;
            }
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote);
    }
    if saw_any_field_char || !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(artifact_paths: Vec<String>) -> RunEntry {
        RunEntry {
            timestamp: "2026-01-01T00:00:00Z".to_owned(),
            state: "start".to_owned(),
            revision: 1,
            event: "__init__".to_owned(),
            idempotency_key: "k1".to_owned(),
            artifact_paths,
        }
    }

    #[test]
    fn round_trips_a_plain_entry() {
        let original = entry(vec!["a.txt".to_owned(), "b.txt".to_owned()]);
        let contents = format!("{HEADER_ROW}\n{}\n", encode_entry(&original));
        let decoded = decode_entries(&contents).expect("decodes");
        assert_eq!(decoded, vec![original]);
    }

    #[test]
    fn round_trips_fields_containing_commas_quotes_and_newlines() {
        let mut original = entry(vec![]);
        original.event = "weird, \"quoted\"\nevent".to_owned();
        let contents = format!("{HEADER_ROW}\n{}\n", encode_entry(&original));
        let decoded = decode_entries(&contents).expect("decodes");
        assert_eq!(decoded, vec![original]);
    }

    #[test]
    fn empty_artifact_paths_round_trip_as_empty_not_single_empty_element() {
        let original = entry(vec![]);
        let contents = format!("{HEADER_ROW}\n{}\n", encode_entry(&original));
        let decoded = decode_entries(&contents).expect("decodes");
        assert!(decoded[0].artifact_paths.is_empty());
    }

    #[test]
    fn multiple_rows_decode_in_file_order() {
        let first = entry(vec!["a.txt".to_owned()]);
        let mut second = entry(vec!["a.txt".to_owned(), "b.txt".to_owned()]);
        second.revision = 2;
        second.event = "go".to_owned();
        let contents = format!(
            "{HEADER_ROW}\n{}\n{}\n",
            encode_entry(&first),
            encode_entry(&second)
        );
        let decoded = decode_entries(&contents).expect("decodes");
        assert_eq!(decoded, vec![first, second]);
    }

    #[test]
    fn unterminated_quote_is_reported_not_panicked() {
        let contents = format!("{HEADER_ROW}\n\"unterminated,row\n");
        assert_eq!(decode_entries(&contents), Err(CsvError::UnterminatedQuote));
    }

    #[test]
    fn wrong_field_count_is_reported() {
        let contents = format!("{HEADER_ROW}\ntoo,few,fields\n");
        assert!(matches!(
            decode_entries(&contents),
            Err(CsvError::WrongFieldCount { .. })
        ));
    }
}

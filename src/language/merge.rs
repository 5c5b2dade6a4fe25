//! Multi-file merge of the mirrored language tables
//!
//! Files are read in file-name order. Each file contributes its header line
//! the first time that exact string is seen, followed by all of its body
//! lines. The merged text is then parsed as `|`-delimited data with the
//! first header as column names.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::errors::MergeError;
use crate::mirror::LocalMirror;

pub const DELIMITER: char = '|';
const QUOTE: char = '"';

/// Phone-to-language table rebuilt for every lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTable {
    /// Merged text: deduplicated headers and every body line
    pub raw_text: String,
    /// Phone number to language code, in first-seen order
    pub entries: IndexMap<String, String>,
    /// Number of mirrored files that went into the merge
    pub source_files: usize,
}

impl MergedTable {
    /// First line of the merged text
    pub fn header(&self) -> Option<&str> {
        self.raw_text.lines().next()
    }

    pub fn language_for(&self, phone: &str) -> Option<&str> {
        self.entries.get(phone).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct CsvMergeEngine;

impl CsvMergeEngine {
    /// Read every mirrored `.csv` file and merge them into one table
    pub async fn build_table(mirror: &LocalMirror) -> Result<MergedTable, MergeError> {
        let entries = mirror.csv_entries().await.map_err(|e| MergeError::Read {
            path: mirror.root().to_path_buf(),
            source: e,
        })?;

        let mut texts = Vec::with_capacity(entries.len());
        for entry in &entries {
            let text = tokio::fs::read_to_string(&entry.local_path)
                .await
                .map_err(|e| MergeError::Read {
                    path: entry.local_path.clone(),
                    source: e,
                })?;
            texts.push(text);
        }

        let table = Self::merge_texts(texts.iter().map(String::as_str))?;
        debug!(
            files = table.source_files,
            rows = table.entries.len(),
            "Built merged language table"
        );
        Ok(table)
    }

    /// Merge already-loaded file contents, in the given order
    pub fn merge_texts<'a, I>(texts: I) -> Result<MergedTable, MergeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen_headers = HashSet::new();
        let mut merged: Vec<&str> = Vec::new();
        let mut source_files = 0;

        for text in texts {
            source_files += 1;
            let mut lines = text.lines().filter(|line| !line.is_empty());
            let Some(header) = lines.next() else {
                continue;
            };
            if seen_headers.insert(header) {
                merged.push(header);
            }
            merged.extend(lines);
        }

        // Every retained line ends with a newline, the last one included
        let raw_text: String = merged.iter().flat_map(|line| [*line, "\n"]).collect();
        let entries = parse_table(&raw_text)?;
        Ok(MergedTable {
            raw_text,
            entries,
            source_files,
        })
    }
}

/// Parse merged text into the phone-to-language map.
///
/// Missing phone/language columns are not an error: the table is empty.
fn parse_table(text: &str) -> Result<IndexMap<String, String>, MergeError> {
    let mut rows = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| split_fields(line, index + 1).map(|fields| (index + 1, fields)));

    let Some(header) = rows.next().transpose()? else {
        return Ok(IndexMap::new());
    };
    let (_, columns) = header;

    let phone_column = find_column(&columns, "phone");
    let lang_column = find_column(&columns, "lang");
    let (Some(phone_column), Some(lang_column)) = (phone_column, lang_column) else {
        warn!(
            "No phone/language columns in merged header {:?}, serving an empty table",
            columns
        );
        // Malformed rows still fail the merge
        for row in rows {
            let (line, fields) = row?;
            check_width(line, &fields, columns.len())?;
        }
        return Ok(IndexMap::new());
    };

    let mut table = IndexMap::new();
    for row in rows {
        let (line, fields) = row?;
        check_width(line, &fields, columns.len())?;

        let phone = &fields[phone_column];
        let language = &fields[lang_column];
        if !phone.is_empty() && !language.is_empty() {
            table.insert(phone.clone(), language.clone());
        }
    }
    Ok(table)
}

fn find_column(columns: &[String], needle: &str) -> Option<usize> {
    columns
        .iter()
        .position(|column| column.to_lowercase().contains(needle))
}

fn check_width(line: usize, fields: &[String], expected: usize) -> Result<(), MergeError> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(MergeError::malformed(
            line,
            format!("expected {} fields, found {}", expected, fields.len()),
        ))
    }
}

/// Split one record on `|`, trimming each field.
///
/// A field may be wrapped in double quotes, in which case it can contain the
/// delimiter and `""` stands for a literal quote.
fn split_fields(line: &str, line_number: usize) -> Result<Vec<String>, MergeError> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| *c != DELIMITER && c.is_whitespace()) {
            chars.next();
        }

        let mut field = String::new();
        if chars.peek() == Some(&QUOTE) {
            chars.next();
            loop {
                match chars.next() {
                    Some(QUOTE) if chars.peek() == Some(&QUOTE) => {
                        chars.next();
                        field.push(QUOTE);
                    }
                    Some(QUOTE) => break,
                    Some(c) => field.push(c),
                    None => {
                        return Err(MergeError::malformed(line_number, "unterminated quoted field"));
                    }
                }
            }
            while let Some(c) = chars.peek() {
                if *c == DELIMITER {
                    break;
                }
                if !c.is_whitespace() {
                    return Err(MergeError::malformed(
                        line_number,
                        "unexpected character after closing quote",
                    ));
                }
                chars.next();
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == DELIMITER {
                    break;
                }
                if *c == QUOTE {
                    return Err(MergeError::malformed(
                        line_number,
                        "quote inside unquoted field",
                    ));
                }
                field.push(*c);
                chars.next();
            }
            field.truncate(field.trim_end().len());
        }
        fields.push(field);

        // Past the delimiter, or at end of line
        if chars.next().is_none() {
            break;
        }
    }

    Ok(fields)
}

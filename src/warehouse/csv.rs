//! Minimal RFC 4180 reading and writing for generated data files.

use std::fs;
use std::io;
use std::path::Path;

/// Quotes a field when it contains a delimiter, quote or line break.
pub fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Writes a header row followed by records.
pub fn write_records(path: &Path, header: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut out = String::new();
    out.push_str(&header.iter().map(|h| quote_field(h)).collect::<Vec<_>>().join(","));
    out.push('\n');

    for row in rows {
        out.push_str(&row.iter().map(|f| quote_field(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }

    fs::write(path, out)
}

/// Parses CSV text into records. Quoted fields may contain commas,
/// escaped quotes and line breaks. Blank lines are skipped.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

pub fn read_records(path: &Path) -> io::Result<Vec<Vec<String>>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_records(&text))
}

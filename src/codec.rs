use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde_json::{Map, Value};

use crate::error::CodecError;

/// One decoded spreadsheet row: an ordered column -> value mapping.
///
/// `serde_json::Map` is built with the `preserve_order` feature, so columns
/// keep the order they were first seen in all the way to the export file.
pub type Row = Map<String, Value>;

/// Decode an uploaded workbook into row records.
///
/// The format is detected from the bytes, so both XLSX and legacy XLS
/// uploads parse. Selects the first sheet and uses its first row as column
/// headers. Cells
/// with no value decode as empty text (never omitted, never null); numeric
/// cells decode as numbers, everything else as its display text. Columns
/// with an empty header cell are skipped, as are rows whose cells are all
/// empty. An empty or headers-only sheet decodes to an empty vector; that is
/// not an error, the caller decides whether to warn.
///
/// # Arguments
/// * `bytes` - Raw contents of an uploaded .xlsx or .xls file
///
/// # Returns
/// * `Result<Vec<Row>, CodecError>` - Decoded rows, or a decode failure
pub fn decode(bytes: &[u8]) -> Result<Vec<Row>, CodecError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Vec::new()),
    };

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for data_row in rows_iter {
        if data_row.iter().all(is_blank) {
            continue;
        }

        let mut row = Row::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let cell = data_row.get(i).unwrap_or(&Data::Empty);
            row.insert(header.clone(), cell_value(cell));
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Encode row records into a single-sheet XLSX workbook.
///
/// Columns are the union of keys across all rows, in the order each key is
/// first encountered. Rows missing a key get an empty cell. String values
/// are written as strings, numeric values as numbers.
///
/// # Arguments
/// * `rows` - The records to write, one worksheet row each
///
/// # Returns
/// * `Result<Vec<u8>, CodecError>` - The workbook as bytes, ready to serve
///   as a file download
pub fn encode(rows: &[Row]) -> Result<Vec<u8>, CodecError> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut columns: Vec<&String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, column) in columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, column.as_str())?;
    }

    for (r, row) in rows.iter().enumerate() {
        for (c, column) in columns.iter().enumerate() {
            let row_num = (r + 1) as u32;
            let col_num = c as u16;
            match row.get(*column) {
                Some(Value::Number(n)) => {
                    worksheet.write_number(row_num, col_num, n.as_f64().unwrap_or(0.0))?;
                }
                Some(Value::String(s)) => {
                    worksheet.write_string(row_num, col_num, s.as_str())?;
                }
                Some(other) => {
                    worksheet.write_string(row_num, col_num, other.to_string().as_str())?;
                }
                None => {
                    worksheet.write_string(row_num, col_num, "")?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::String(b.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

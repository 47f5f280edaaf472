use ledger_api::SourceRow;

use crate::config::ColumnNames;
use crate::error::TrackerError;

const DELIMITER: char = ',';

// ═══════════════════════════════════════════════════════════════
//  RFC 4180 field parser
// ═══════════════════════════════════════════════════════════════

/// Split one line into fields, honouring `"…"` quoting and `""` escapes.
/// Fields never span lines.
pub(crate) fn parse_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    let mut field = String::new();

    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        break;
                    }
                } else {
                    field.push(c);
                }
            }
            // Anything between the closing quote and the delimiter is dropped.
            for c in chars.by_ref() {
                if c == DELIMITER {
                    break;
                }
            }
        } else {
            while let Some(c) = chars.next_if(|&c| c != DELIMITER) {
                field.push(c);
            }
            chars.next();
        }

        fields.push(std::mem::take(&mut field));

        if chars.peek().is_none() {
            if line.ends_with(DELIMITER) {
                fields.push(String::new());
            }
            break;
        }
    }

    fields
}

// ═══════════════════════════════════════════════════════════════
//  Reading source rows
// ═══════════════════════════════════════════════════════════════

/// Positions of the configured columns inside a header.
struct ColumnIndex {
    source_id: usize,
    category: usize,
    value: usize,
}

impl ColumnIndex {
    fn from_header(header: &[String], names: &ColumnNames) -> Result<Self, String> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| format!("missing column {name:?} in header {header:?}"))
        };
        Ok(Self {
            source_id: find(&names.source_id)?,
            category: find(&names.category)?,
            value: find(&names.value)?,
        })
    }

    fn row(&self, fields: &mut [String]) -> Result<SourceRow, String> {
        let mut take = |i: usize| {
            fields
                .get_mut(i)
                .map(std::mem::take)
                .ok_or_else(|| format!("row has {} fields, column {i} missing", fields.len()))
        };
        Ok(SourceRow {
            source_id: take(self.source_id)?,
            category: take(self.category)?,
            value: take(self.value)?,
        })
    }
}

/// Parse CSV text into source rows. The first non-blank line is the
/// header; blank lines are skipped; extra columns are ignored.
/// `path` only labels errors.
pub fn parse_rows(path: &str, text: &str, names: &ColumnNames) -> Result<Vec<SourceRow>, TrackerError> {
    let input_err = |line: usize, detail: String| TrackerError::Input {
        path: path.to_string(),
        line,
        detail,
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((header_line, header)) = lines.next() else {
        return Err(input_err(1, "empty file, expected a header row".into()));
    };
    let index = ColumnIndex::from_header(&parse_fields(header), names)
        .map_err(|d| input_err(header_line, d))?;

    lines
        .map(|(n, line)| index.row(&mut parse_fields(line)).map_err(|d| input_err(n, d)))
        .collect()
}

pub fn read_rows(path: &str, names: &ColumnNames) -> Result<Vec<SourceRow>, TrackerError> {
    let text = std::fs::read_to_string(path).map_err(|e| TrackerError::io(path, e))?;
    parse_rows(path, &text, names)
}

// ═══════════════════════════════════════════════════════════════
//  Writing
// ═══════════════════════════════════════════════════════════════

/// Accumulates CSV text; fields containing the delimiter, a quote or a
/// line break are quoted.
pub struct CsvWriter {
    out: String,
}

impl CsvWriter {
    pub fn new<S: AsRef<str>>(header: &[S]) -> Self {
        let mut w = Self { out: String::new() };
        w.record(header);
        w
    }

    pub fn record<S: AsRef<str>>(&mut self, fields: &[S]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.out.push(DELIMITER);
            }
            let s = field.as_ref();
            if s.contains([DELIMITER, '"', '\n', '\r']) {
                self.out.push('"');
                self.out.push_str(&s.replace('"', "\"\""));
                self.out.push('"');
            } else {
                self.out.push_str(s);
            }
        }
        self.out.push('\n');
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_and_escapes() {
        assert_eq!(
            parse_fields(r#"PKG1,"14.6,120.98","say ""hi""""#),
            vec!["PKG1", "14.6,120.98", r#"say "hi""#]
        );
    }

    #[test]
    fn trailing_delimiter_adds_empty_field() {
        assert_eq!(parse_fields("a,b,"), vec!["a", "b", ""]);
        assert_eq!(parse_fields(""), vec![""]);
    }

    #[test]
    fn rows_follow_header_order_not_file_order() {
        let text = "data_value,extra,device_id,data_type\r\n22.5°C,x,D1,Temperature\n\n\"14.6,120.9\",y,D1,GPS\n";
        let rows = parse_rows("in.csv", text, &ColumnNames::default()).unwrap();
        assert_eq!(
            rows,
            vec![
                SourceRow::new("D1", "Temperature", "22.5°C"),
                SourceRow::new("D1", "GPS", "14.6,120.9"),
            ]
        );
    }

    #[test]
    fn missing_column_reports_header_line() {
        let err = parse_rows("in.csv", "\ndevice_id,data_type\nD1,Temp\n", &ColumnNames::default())
            .unwrap_err();
        match err {
            TrackerError::Input { line, detail, .. } => {
                assert_eq!(line, 2);
                assert!(detail.contains("data_value"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn short_row_reports_its_line() {
        let text = "device_id,data_type,data_value\nD1,Temp,1C\nD2,Temp\n";
        let err = parse_rows("in.csv", text, &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, TrackerError::Input { line: 3, .. }));
    }

    #[test]
    fn header_only_is_no_rows() {
        let rows = parse_rows("in.csv", "device_id,data_type,data_value\n", &ColumnNames::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn writer_quotes_when_needed() {
        let mut w = CsvWriter::new(&["a", "b"]);
        w.record(&["14.6,120.9", "plain"]);
        w.record(&["say \"hi\"", ""]);
        assert_eq!(w.finish(), "a,b\n\"14.6,120.9\",plain\n\"say \"\"hi\"\"\",\n");
    }

    #[test]
    fn writer_output_parses_back() {
        let mut w = CsvWriter::new(&["device_id", "data_type", "data_value"]);
        w.record(&["D1", "GPS", "14.599500,120.984200"]);
        let rows = parse_rows("out.csv", &w.finish(), &ColumnNames::default()).unwrap();
        assert_eq!(rows, vec![SourceRow::new("D1", "GPS", "14.599500,120.984200")]);
    }
}

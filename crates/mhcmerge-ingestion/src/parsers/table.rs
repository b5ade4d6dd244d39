//! Delimited text reader shared by all parsers.

use csv::{ReaderBuilder, StringRecord, Trim};

use mhcmerge_common::error::Result;

use super::ParseContext;

/// Tab when the header line contains one, comma otherwise.
pub(crate) fn sniff_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') { b'\t' } else { b',' }
}

/// Cells that mean "no prediction" rather than a malformed value.
pub(crate) fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty()
        || cell.eq_ignore_ascii_case("na")
        || cell.eq_ignore_ascii_case("nan")
        || cell.eq_ignore_ascii_case("none")
}

/// Number of blank lines before the first non-blank one, and its byte offset.
fn first_content_line(text: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if !line.trim().is_empty() {
            return Some((idx, offset));
        }
        offset += line.len();
    }
    None
}

pub(crate) struct Row {
    /// 1-based line number in the original output
    pub line: usize,
    fields: StringRecord,
}

impl Row {
    pub fn get(&self, idx: usize) -> &str {
        self.fields.get(idx).unwrap_or("")
    }
}

/// A header plus the rows whose field count matches it.
pub(crate) struct Table {
    header: Vec<String>,
    header_line: usize,
    rows: Vec<Row>,
}

impl Table {
    /// Read `text`, whose first non-blank line is the header.
    ///
    /// `line_offset` is the number of lines preceding `text` in the file.
    /// Rows with the wrong field count are recorded as malformed and left
    /// out. Returns `None` for blank input.
    pub fn read(text: &str, line_offset: usize, ctx: &mut ParseContext<'_>) -> Result<Option<Self>> {
        let Some((skipped, start)) = first_content_line(text) else { return Ok(None) };
        let text = &text[start..];
        let line_offset = line_offset + skipped;
        let header_line = line_offset + 1;
        let first = text.lines().next().unwrap_or("");

        let mut reader = ReaderBuilder::new()
            .delimiter(sniff_delimiter(first))
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| ctx.header_error(header_line, format!("unreadable header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            match result {
                Ok(fields) => {
                    let line = fields.position().map(|p| p.line() as usize).unwrap_or(0) + line_offset;
                    if fields.len() != header.len() {
                        ctx.malformed(
                            line,
                            format!("expected {} fields, found {}", header.len(), fields.len()),
                        );
                        continue;
                    }
                    rows.push(Row { line, fields });
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize).unwrap_or(0) + line_offset;
                    ctx.malformed(line, e.to_string());
                }
            }
        }

        Ok(Some(Self { header, header_line, rows }))
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn header_line(&self) -> usize {
        self.header_line
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Index of the first of `names` present in the header (case-insensitive).
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.header.iter().position(|h| h.eq_ignore_ascii_case(name)))
    }

    /// Every column named exactly `name`, in header order.
    pub fn columns_named(&self, name: &str) -> Vec<usize> {
        self.header
            .iter()
            .enumerate()
            .filter(|(_, h)| h.as_str() == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Columns starting with one of `prefixes`, paired with the rest of the name.
    ///
    /// The first prefix that matches at least one column wins, so a table
    /// carrying both presentation and affinity columns only yields the former.
    pub fn prefixed(&self, prefixes: &[&str]) -> Vec<(usize, String)> {
        for prefix in prefixes {
            let found: Vec<(usize, String)> = self
                .header
                .iter()
                .enumerate()
                .filter_map(|(i, h)| {
                    h.strip_prefix(prefix)
                        .filter(|rest| !rest.is_empty())
                        .map(|rest| (i, rest.to_string()))
                })
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhcmerge_common::entities::{InputFileType, MhcClass, Predictor, SampleMetadata};
    use mhcmerge_common::error::ErrorKind;
    use mhcmerge_common::issues::IssueLog;

    use crate::normalise::AlleleNormaliser;

    #[test]
    fn test_sniff() {
        assert_eq!(sniff_delimiter("sequence\tHLA-A*02:01"), b'\t');
        assert_eq!(sniff_delimiter("peptide,ic50,allele"), b',');
    }

    #[test]
    fn test_missing_cells() {
        for cell in ["", " ", "NA", "nan", "NaN"] {
            assert!(is_missing(cell), "{cell:?}");
        }
        assert!(!is_missing("0"));
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let norm = AlleleNormaliser::new();
        let meta = SampleMetadata::new("S1", "", MhcClass::I, InputFileType::Peptide, [Predictor::Mhcnuggets]);
        let mut log = IssueLog::new("S1");
        let mut ctx = ParseContext::new(Predictor::Mhcnuggets, &meta, &norm, &mut log);

        let table = Table::read("a,b,c\n1,2,3\n1,2\n4,5,6\n", 0, &mut ctx).unwrap().unwrap();
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[1].line, 4);
        drop(ctx);
        assert_eq!(log.count(ErrorKind::MalformedRecord), 1);
        assert!(log.issues()[0].message.contains("line 3"));
    }

    #[test]
    fn test_leading_blank_lines_skipped() {
        let norm = AlleleNormaliser::new();
        let meta = SampleMetadata::new("S1", "H2-Kb", MhcClass::I, InputFileType::Peptide, [Predictor::Syfpeithi]);
        let mut log = IssueLog::new("S1");
        let mut ctx = ParseContext::new(Predictor::Syfpeithi, &meta, &norm, &mut log);

        let table = Table::read("\n  \npeptide\tH2-Kb\nSIINFEKL\t42\n", 0, &mut ctx).unwrap().unwrap();
        assert_eq!(table.header(), ["peptide".to_string(), "H2-Kb".to_string()]);
        assert_eq!(table.header_line(), 3);
        assert_eq!(table.rows()[0].line, 4);
        assert_eq!(table.rows()[0].get(1), "42");
    }

    #[test]
    fn test_first_content_line() {
        assert_eq!(first_content_line("a,b\n"), Some((0, 0)));
        assert_eq!(first_content_line("\n\r\na,b\n"), Some((2, 3)));
        assert_eq!(first_content_line(" \n\t\n"), None);
    }

    #[test]
    fn test_column_lookup() {
        let norm = AlleleNormaliser::new();
        let meta = SampleMetadata::new("S1", "", MhcClass::I, InputFileType::Peptide, [Predictor::Mhcflurry]);
        let mut log = IssueLog::new("S1");
        let mut ctx = ParseContext::new(Predictor::Mhcflurry, &meta, &norm, &mut log);

        let text = "Peptide\tpresentation_percentile_A0201\tpresentation_percentile_B0702\taffinity_percentile_A0201\n";
        let table = Table::read(text, 0, &mut ctx).unwrap().unwrap();
        assert_eq!(table.column(&["sequence", "peptide"]), Some(0));
        let cols = table.prefixed(&["presentation_percentile_", "affinity_percentile_"]);
        assert_eq!(cols, vec![(1, "A0201".to_string()), (2, "B0702".to_string())]);
    }
}

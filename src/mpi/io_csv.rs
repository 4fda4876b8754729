// Primitives for reading CSV files, and the dispatch between the readers.

use std::io::Read;

use crate::mpi::config_reader::SourceFormat;
use crate::mpi::io_common::{assemble_table, SourceTable};
use crate::mpi::io_xlsx::read_xlsx_table;
use crate::mpi::*;

/// What to read in a source file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetSpec {
    pub format: SourceFormat,
    /// Ignored for CSV files.
    pub sheet: Option<String>,
    pub header_rows: Vec<usize>,
}

pub trait TableReader {
    fn read(&self, path: &Path, spec: &SheetSpec) -> MpiResult<SourceTable>;
}

/// Reads the tables from the files on disk.
pub struct FileTableReader {}

impl TableReader for FileTableReader {
    fn read(&self, path: &Path, spec: &SheetSpec) -> MpiResult<SourceTable> {
        let p = path_str(path);
        match spec.format {
            SourceFormat::Xlsx => read_xlsx_table(&p, spec.sheet.as_deref(), &spec.header_rows),
            SourceFormat::Csv => read_csv_table(&p, &spec.header_rows),
        }
    }
}

pub fn read_csv_table(path: &str, header_rows: &[usize]) -> MpiResult<SourceTable> {
    let file = fs::File::open(path).context(OpeningFileSnafu { path })?;
    read_csv_from(file, header_rows, path)
}

pub fn read_csv_from<R: Read>(
    input: R,
    header_rows: &[usize],
    path: &str,
) -> MpiResult<SourceTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The index starts at 1 to respect most conventions in the excel world
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        let cells: Vec<CellValue> = line
            .iter()
            .map(|s| {
                if s.trim().is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(s.to_string())
                }
            })
            .collect();
        grid.push(cells);
    }
    debug!("read_csv_from: {}: {} lines", path, grid.len());
    assemble_table(grid, header_rows, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_two_header_rows() {
        let data = "\
ISO country code,MPI data source,,MPI
,Survey,Year,Range 0 to 1
AFG,DHS,2015-2016,0.272
NPL,DHS,2022
";
        let table = read_csv_from(data.as_bytes(), &[1, 2], "national.csv").unwrap();
        assert_eq!(
            table.headers,
            vec![
                "ISO country code",
                "MPI data source Survey",
                "MPI data source Year",
                "MPI Range 0 to 1"
            ]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].text("MPI Range 0 to 1"), "0.272");
        assert_eq!(table.rows[1].cell("MPI Range 0 to 1"), &CellValue::Empty);
    }

    #[test]
    fn reader_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        let spec = SheetSpec {
            format: SourceFormat::Csv,
            sheet: Some("ignored".to_string()),
            header_rows: vec![1],
        };
        let table = FileTableReader {}.read(&path, &spec).unwrap();
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows[0].text("b"), "2");
    }

    #[test]
    fn missing_csv() {
        assert!(matches!(
            read_csv_table("does/not/exist.csv", &[1]),
            Err(MpiError::OpeningFile { .. })
        ));
    }
}

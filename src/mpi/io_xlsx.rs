// Primitives for reading Excel files.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::mpi::io_common::{assemble_table, SourceTable};
use crate::mpi::*;

fn read_cell(cell: &DataType) -> CellValue {
    match cell {
        DataType::Int(i) => CellValue::Number(*i as f64),
        DataType::Float(f) => CellValue::Number(*f),
        DataType::String(s) if s.trim().is_empty() => CellValue::Empty,
        DataType::String(s) => CellValue::Text(s.clone()),
        DataType::Bool(b) => CellValue::Text(b.to_string()),
        DataType::DateTime(f) => CellValue::Number(*f),
        // Errors such as #N/A carry no value.
        _ => CellValue::Empty,
    }
}

fn get_range(path: &str, sheet: Option<&str>) -> MpiResult<Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, sheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { sheet: name, path })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(MissingWorksheetSnafu {
                sheet: "(first sheet)",
                path,
            })?
            .context(OpeningExcelSnafu { path })?,
    };
    Ok(wrange)
}

// The range only covers the used cells: it is padded so that row and column
// numbers match the ones displayed by Excel.
fn range_to_grid(wrange: &Range<DataType>) -> Vec<Vec<CellValue>> {
    let (row0, col0) = wrange.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); row0 as usize];
    for row in wrange.rows() {
        let mut line: Vec<CellValue> = vec![CellValue::Empty; col0 as usize];
        line.extend(row.iter().map(read_cell));
        grid.push(line);
    }
    grid
}

pub fn read_xlsx_table(
    path: &str,
    sheet: Option<&str>,
    header_rows: &[usize],
) -> MpiResult<SourceTable> {
    let wrange = get_range(path, sheet)?;
    info!(
        "read_xlsx_table: {} {:?}: {} rows",
        path,
        sheet,
        wrange.height()
    );
    assemble_table(range_to_grid(&wrange), header_rows, path)
}

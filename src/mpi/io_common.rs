use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

use crate::mpi::config_reader::DownloadSource;
use crate::mpi::*;

const USER_AGENT_VALUE: &str = concat!("ophi-mpi/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// A table read from a sheet, with its assembled column names.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// The last segment of a path or a url, without the query string.
pub fn simplify_file_name(path: &str) -> String {
    let no_query = path.split(|c| c == '?' || c == '#').next().unwrap_or(path);
    match no_query.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "download".to_string(),
    }
}

/// Builds the column names and the rows of a sheet.
///
/// `header_rows` are 1-based row numbers. The cells of these rows are joined
/// with a space, column by column, after the merged cells are spread over the
/// columns they cover. The data starts after the last header row. Columns
/// without a name and rows without any value are dropped. Two columns with the
/// same name are an error.
pub fn assemble_table(
    grid: Vec<Vec<CellValue>>,
    header_rows: &[usize],
    path: &str,
) -> MpiResult<SourceTable> {
    let header_rows: Vec<usize> = if header_rows.is_empty() {
        vec![1]
    } else {
        header_rows.to_vec()
    };
    let mut parts: Vec<Vec<String>> = Vec::new();
    for row_num in header_rows.iter() {
        ensure!(
            *row_num >= 1 && *row_num <= grid.len(),
            MissingHeaderRowSnafu {
                row: *row_num,
                path
            }
        );
        parts.push(grid[row_num - 1].iter().map(|c| c.as_text()).collect());
    }
    let width = parts.iter().map(|p| p.len()).max().unwrap_or(0);
    for p in parts.iter_mut() {
        p.resize(width, String::new());
    }
    fill_merged_headers(&mut parts);

    let headers: Vec<String> = (0..width)
        .map(|col| {
            let words: Vec<&str> = parts
                .iter()
                .map(|p| p[col].as_str())
                .filter(|s| !s.is_empty())
                .collect();
            normalise_header(&words.join(" "))
        })
        .collect();
    debug!("assemble_table: {}: headers: {:?}", path, headers);
    let mut seen: HashSet<&str> = HashSet::new();
    for h in headers.iter().filter(|h| !h.is_empty()) {
        ensure!(
            seen.insert(h.as_str()),
            DuplicateHeaderSnafu {
                header: h.clone(),
                path
            }
        );
    }

    let first_data_row = header_rows.iter().max().copied().unwrap_or(1);
    let mut rows: Vec<RawRow> = Vec::new();
    for line in grid.into_iter().skip(first_data_row) {
        if line.iter().all(|c| c.is_empty()) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .zip(line)
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, c)| (h.clone(), c))
            .collect();
        rows.push(row);
    }
    debug!("assemble_table: {}: {} rows", path, rows.len());
    Ok(SourceTable { headers, rows })
}

// Spreadsheets only keep the value of a merged cell in its first column. In
// every header row but the last, an empty cell takes the value on its left
// when the rows above are the same for both columns and a lower row names it.
fn fill_merged_headers(parts: &mut [Vec<String>]) {
    let n = parts.len();
    for row in 0..n.saturating_sub(1) {
        for col in 1..parts[row].len() {
            if !parts[row][col].is_empty() || parts[row][col - 1].is_empty() {
                continue;
            }
            let same_parent = (0..row).all(|r| parts[r][col] == parts[r][col - 1]);
            let named_below = (row + 1..n).any(|r| !parts[r][col].is_empty());
            if same_parent && named_below {
                parts[row][col] = parts[row][col - 1].clone();
            }
        }
    }
}

/// Finds the local copy of the source files, downloading them when needed.
pub struct Retriever {
    base_dir: PathBuf,
    download_dir: PathBuf,
    saved_dir: PathBuf,
    save: bool,
    use_saved: bool,
}

impl Retriever {
    pub fn new(
        base_dir: PathBuf,
        download_dir: PathBuf,
        saved_dir: PathBuf,
        save: bool,
        use_saved: bool,
    ) -> Retriever {
        Retriever {
            base_dir,
            download_dir,
            saved_dir,
            save,
            use_saved,
        }
    }

    /// The local path of a source.
    ///
    /// Local sources are resolved against the folder of the configuration.
    /// Remote sources are read from the saved data folder with `use_saved`,
    /// otherwise they are downloaded (into the saved data folder with `save`).
    pub fn retrieve(&self, source: &DownloadSource) -> MpiResult<PathBuf> {
        if !source.is_remote() {
            let path = resolve(&self.base_dir, &source.url);
            ensure!(
                path.exists(),
                SourceMissingSnafu {
                    path: path_str(&path)
                }
            );
            debug!("retrieve: local file {:?}", path);
            return Ok(path);
        }

        let filename = source
            .filename
            .clone()
            .unwrap_or_else(|| simplify_file_name(&source.url));
        if self.use_saved {
            let path = self.saved_dir.join(&filename);
            ensure!(
                path.exists(),
                SavedDataMissingSnafu {
                    path: path_str(&path)
                }
            );
            info!("Using saved file {:?} for {}", path, source.url);
            return Ok(path);
        }

        let dir = if self.save {
            &self.saved_dir
        } else {
            &self.download_dir
        };
        fs::create_dir_all(dir).context(WritingFileSnafu {
            path: path_str(dir),
        })?;
        let path = dir.join(&filename);
        download(&source.url, &path)?;
        Ok(path)
    }
}

fn download(url: &str, path: &Path) -> MpiResult<()> {
    info!("Downloading {} to {:?}", url, path);
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context(DownloadSnafu { url })?;
    let response = client
        .get(url)
        .header(USER_AGENT, USER_AGENT_VALUE)
        .send()
        .and_then(|r| r.error_for_status())
        .context(DownloadSnafu { url })?;
    let bytes = response.bytes().context(DownloadSnafu { url })?;
    fs::write(path, &bytes).context(WritingFileSnafu {
        path: path_str(path),
    })?;
    debug!("download: {} bytes written", bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<CellValue>> {
        rows.iter()
            .map(|r| r.iter().map(|s| text(s)).collect())
            .collect()
    }

    #[test]
    fn file_names() {
        assert_eq!(
            simplify_file_name("https://ophi.org.uk/wp-content/Table-1.xlsx?download=1"),
            "Table-1.xlsx"
        );
        assert_eq!(simplify_file_name("input/admin1.csv"), "admin1.csv");
        assert_eq!(simplify_file_name("https://ophi.org.uk/"), "download");
    }

    #[test]
    fn multi_row_headers() {
        let g = grid(&[
            &["Table 1.1 National results", "", "", ""],
            &["ISO country code", "MPI data source", "", "Multidimensional Poverty Index (MPI)"],
            &["", "Survey", "Year", "Range  0 to 1"],
            &["AFG", "DHS", "2015-2016", "0.272"],
            &["", "", "", ""],
            &["NPL", "DHS", "2022", "0.074"],
        ]);
        let table = assemble_table(g, &[2, 3], "national.xlsx").unwrap();
        assert_eq!(
            table.headers,
            vec![
                "ISO country code",
                "MPI data source Survey",
                "MPI data source Year",
                "Multidimensional Poverty Index (MPI) Range 0 to 1"
            ]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].text("MPI data source Year"), "2015-2016");
        assert_eq!(table.rows[1].text("ISO country code"), "NPL");
    }

    #[test]
    fn short_rows_and_unnamed_columns() {
        let g = grid(&[&["a", "", "c"], &["1", "2", "3"], &["4"]]);
        let table = assemble_table(g, &[], "t.csv").unwrap();
        assert_eq!(table.headers, vec!["a", "", "c"]);
        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[1].text("a"), "4");
        assert_eq!(table.rows[1].cell("c"), &CellValue::Empty);
    }

    #[test]
    fn merged_cells_span_their_columns() {
        let g = grid(&[
            &["ISO country code", "MPI data source", "", "", ""],
            &["", "t0", "", "t1", ""],
            &["", "Survey", "Year", "Survey", "Year"],
            &["AFG", "DHS", "2010", "DHS", "2015-2016"],
        ]);
        let table = assemble_table(g, &[1, 2, 3], "trends.csv").unwrap();
        assert_eq!(
            table.headers,
            vec![
                "ISO country code",
                "MPI data source t0 Survey",
                "MPI data source t0 Year",
                "MPI data source t1 Survey",
                "MPI data source t1 Year"
            ]
        );
        assert_eq!(table.rows[0].text("MPI data source t0 Year"), "2010");
        assert_eq!(table.rows[0].text("MPI data source t1 Year"), "2015-2016");
    }

    #[test]
    fn unnamed_columns_stay_unnamed() {
        // The last header row is never filled, nor a column no lower row names.
        let g = grid(&[&["a", "", ""], &["", "b", ""], &["1", "2", "3"]]);
        let table = assemble_table(g, &[1, 2], "t.csv").unwrap();
        assert_eq!(table.headers, vec!["a", "a b", ""]);
    }

    #[test]
    fn duplicate_headers() {
        let g = grid(&[&["", "t0", "", "t1", ""], &["iso", "Year", "Value", "Year", "Value"]]);
        assert!(assemble_table(g, &[1, 2], "ok.csv").is_ok());
        let g = grid(&[&["iso", "Year", "Year"], &["AFG", "2010", "2015"]]);
        assert!(matches!(
            assemble_table(g, &[1], "t.csv"),
            Err(MpiError::DuplicateHeader { .. })
        ));
    }

    #[test]
    fn bundled_trend_columns_are_assembled() {
        let config = crate::mpi::config_reader::read_config(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/config/project_configuration.json"
        ))
        .unwrap();
        let groups = [
            ("Multidimensional Poverty Index (MPIT)", "Range 0 to 1", "0.3", "0.272"),
            ("Multidimensional Headcount Ratio (HT)", "% pop.", "60", "55.9"),
            ("Intensity of Poverty (AT)", "Avg % of weighted deprivations", "50", "48.6"),
            ("Vulnerable to poverty", "% pop.", "20", "18.1"),
            ("In severe poverty", "% pop.", "30", "24.9"),
        ];
        let mut top: Vec<&str> = vec!["ISO country code", "Country"];
        let mut middle: Vec<&str> = vec!["", ""];
        let mut bottom: Vec<&str> = vec!["", ""];
        let mut data: Vec<&str> = vec!["AFG", "Afghanistan"];
        for (name, unit, early, late) in groups.iter() {
            top.extend([*name, ""]);
            middle.extend(["t0", "t1"]);
            bottom.extend([*unit, *unit]);
            data.extend([*early, *late]);
        }
        top.extend(["MPI data source", "", "", ""]);
        middle.extend(["t0", "", "t1", ""]);
        bottom.extend(["Survey", "Year", "Survey", "Year"]);
        data.extend(["DHS", "2010", "DHS", "2015-2016"]);
        let g = grid(&[
            top.as_slice(),
            middle.as_slice(),
            bottom.as_slice(),
            data.as_slice(),
        ]);
        let table = assemble_table(g, &[1, 2, 3], "trends.xlsx").unwrap();

        let revision = &config.trends.national.revisions[0];
        let labels = &config.trends.timepoints;
        for tp in Timepoint::BOTH.iter() {
            let layout = revision.layout().for_timepoint(labels.get(*tp));
            assert_eq!(layout.missing_columns(&table.headers), Vec::<String>::new());
        }
        let late = revision.layout().for_timepoint(labels.get(Timepoint::Late));
        assert_eq!(table.rows[0].text(&late.date_column), "2015-2016");
        assert_eq!(table.rows[0].text(&late.indicator_columns[0]), "0.272");
    }

    #[test]
    fn missing_header_row() {
        let g = grid(&[&["a"]]);
        assert!(matches!(
            assemble_table(g, &[1, 2], "t.csv"),
            Err(MpiError::MissingHeaderRow { row: 2, .. })
        ));
    }

    #[test]
    fn retrieve_local_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("local.csv"), "a\n1\n").unwrap();
        let saved = dir.path().join("saved");
        fs::create_dir_all(&saved).unwrap();
        fs::write(saved.join("remote.xlsx"), "x").unwrap();

        let retriever = Retriever::new(
            dir.path().to_path_buf(),
            dir.path().join("out"),
            saved.clone(),
            false,
            true,
        );
        let local = DownloadSource {
            url: "local.csv".to_string(),
            filename: None,
            format: "csv".to_string(),
        };
        assert_eq!(retriever.retrieve(&local).unwrap(), dir.path().join("local.csv"));

        let remote = DownloadSource {
            url: "https://ophi.org.uk/files/remote.xlsx".to_string(),
            filename: None,
            format: "xlsx".to_string(),
        };
        assert_eq!(retriever.retrieve(&remote).unwrap(), saved.join("remote.xlsx"));

        let renamed = DownloadSource {
            filename: Some("other.xlsx".to_string()),
            ..remote
        };
        assert!(matches!(
            retriever.retrieve(&renamed),
            Err(MpiError::SavedDataMissing { .. })
        ));

        let missing = DownloadSource {
            url: "nothing.csv".to_string(),
            ..local
        };
        assert!(matches!(
            retriever.retrieve(&missing),
            Err(MpiError::SourceMissing { .. })
        ));
    }
}

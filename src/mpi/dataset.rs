// Writes the standardised rows as CSV resources, with a JSON record per dataset.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::mpi::config_reader::*;
use crate::mpi::pipeline::SourcePaths;
use crate::mpi::*;

pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ResourceRecord {
    pub name: String,
    pub description: String,
    pub format: String,
    pub file: String,
}

/// The metadata of a dataset, as written next to its resources.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct DatasetRecord {
    pub name: String,
    pub title: String,
    pub notes: String,
    pub dataset_date: String,
    pub tags: Vec<String>,
    pub subnational: bool,
    pub methodology_other: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_update_frequency: Option<String>,
    /// ISO3 codes of the countries covered.
    pub locations: Vec<String>,
    pub resources: Vec<ResourceRecord>,
}

/// Lowercase alphanumeric words joined by dashes.
pub fn slugify(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<&str>>().join("-")
}

pub fn format_date_range(range: &DateRange) -> String {
    format!(
        "[{} TO {}]",
        range.start.format(DATE_FORMAT),
        range.end.format(DATE_FORMAT)
    )
}

pub fn resource_filename(scope: &str) -> String {
    format!("{}_mpi.csv", scope)
}

pub fn trend_resource_filename(scope: &str) -> String {
    format!("{}_mpi_trends.csv", scope)
}

/// A row that can be written in an output table.
pub trait OutputRow {
    /// The text of a field, by its name in the configuration.
    fn field(&self, field: &str) -> MpiResult<String>;
}

impl OutputRow for IndicatorRow {
    fn field(&self, field: &str) -> MpiResult<String> {
        field_value(self, field)
    }
}

/// The value of a standardised field, as written in the CSV files.
pub fn field_value(row: &IndicatorRow, field: &str) -> MpiResult<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    let res = match field {
        "country_code" => row.country_code.clone(),
        "admin1_code" => row.admin1_code.clone(),
        "admin1_name" => row.admin1_name.clone(),
        "reference_period_start" => row.reference_period_start.format(DATE_FORMAT).to_string(),
        "reference_period_end" => row.reference_period_end.format(DATE_FORMAT).to_string(),
        "survey" => opt(&row.survey),
        "methodology_note" => opt(&row.methodology_note),
        _ => match Indicator::ALL.iter().find(|i| i.field_name() == field) {
            Some(indicator) => row.indicators.get(*indicator).cloned().unwrap_or_default(),
            None => whatever!("Unknown output field {}", field),
        },
    };
    Ok(res)
}

/// Writes the rows as a CSV file with a header row and a row of HXL hashtags.
///
/// Returns false, and writes nothing, when there are no rows.
pub fn generate_resource<'r, R, I>(
    columns: &[HxlColumn],
    rows: I,
    folder: &Path,
    filename: &str,
) -> MpiResult<bool>
where
    R: OutputRow + 'r,
    I: IntoIterator<Item = &'r R>,
{
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        debug!("generate_resource: {}: no rows", filename);
        return Ok(false);
    }
    let path = folder.join(filename);
    let p = path_str(&path);
    let mut wtr = csv::Writer::from_path(&path).context(CsvWriteSnafu { path: p.clone() })?;
    wtr.write_record(columns.iter().map(|c| c.header.as_str()))
        .context(CsvWriteSnafu { path: p.clone() })?;
    wtr.write_record(columns.iter().map(|c| c.tag.as_str()))
        .context(CsvWriteSnafu { path: p.clone() })?;
    let mut count = 0_usize;
    for row in rows {
        let values = columns
            .iter()
            .map(|c| row.field(&c.field))
            .collect::<MpiResult<Vec<String>>>()?;
        wtr.write_record(&values)
            .context(CsvWriteSnafu { path: p.clone() })?;
        count += 1;
    }
    wtr.flush().context(WritingFileSnafu { path: p.clone() })?;
    info!("generate_resource: {} rows written to {}", count, p);
    Ok(true)
}

pub struct DatasetGenerator<'a> {
    config: &'a MpiConfig,
    source_paths: &'a SourcePaths,
}

impl<'a> DatasetGenerator<'a> {
    pub fn new(config: &'a MpiConfig, source_paths: &'a SourcePaths) -> DatasetGenerator<'a> {
        DatasetGenerator {
            config,
            source_paths,
        }
    }

    pub fn get_title(country_name: &str) -> String {
        format!("{} Multi Dimensional Poverty Index", country_name)
    }

    pub fn get_name(country_name: &str) -> String {
        format!("{} MPI", country_name)
    }

    /// The identifier of a dataset in the JSON records.
    pub fn dataset_id(country_name: &str) -> String {
        slugify(&DatasetGenerator::get_name(country_name))
    }

    fn notes(&self, scope: &str) -> String {
        let dataset = &self.config.dataset;
        match dataset.country_notes.get(scope) {
            Some(extra) => format!("{}  \n{}", dataset.notes, extra),
            None => dataset.notes.clone(),
        }
    }

    fn build_dataset(
        &self,
        folder: &Path,
        rows: &RowMap,
        trend_rows: &RowMap,
        scope: &str,
        country_name: &str,
        date_range: &DateRange,
    ) -> MpiResult<Option<(DatasetRecord, Vec<PathBuf>)>> {
        let name = DatasetGenerator::get_name(country_name);
        if rows.is_empty() {
            warn!("{} has no data!", name);
            return Ok(None);
        }
        info!("Creating dataset: {}", DatasetGenerator::get_title(country_name));
        let dataset = &self.config.dataset;
        let descriptions = &dataset.resource_descriptions;
        let mut files: Vec<PathBuf> = Vec::new();
        let mut resources: Vec<ResourceRecord> = Vec::new();

        let filename = resource_filename(scope);
        if !generate_resource(&self.config.hxltags, rows.values(), folder, &filename)? {
            warn!("{} has no data!", name);
            return Ok(None);
        }
        files.push(folder.join(&filename));
        resources.push(ResourceRecord {
            name: format!("{} MPI and Partial Indices", country_name),
            description: descriptions.standardised_mpi.clone(),
            format: "csv".to_string(),
            file: filename,
        });

        let mut methodology = format!(
            "{} [here]({})",
            dataset.methodology, dataset.methodology_notes.mpi_and_partial_indices
        );
        let filename = trend_resource_filename(scope);
        if generate_resource(&self.config.hxltags, trend_rows.values(), folder, &filename)? {
            files.push(folder.join(&filename));
            resources.push(ResourceRecord {
                name: format!("{} MPI Trends Over Time", country_name),
                description: descriptions.standardised_trends.clone(),
                format: "csv".to_string(),
                file: filename,
            });
            methodology.push_str(&format!(
                " and [here]({}).",
                dataset.methodology_notes.trend_over_time
            ));
        } else {
            methodology.push('.');
        }

        let locations: BTreeSet<String> = rows.values().map(|r| r.country_code.clone()).collect();
        let record = DatasetRecord {
            name: DatasetGenerator::dataset_id(country_name),
            title: DatasetGenerator::get_title(country_name),
            notes: self.notes(scope),
            dataset_date: format_date_range(date_range),
            tags: dataset.tags.clone(),
            subnational: true,
            methodology_other: methodology,
            data_update_frequency: None,
            locations: locations.into_iter().collect(),
            resources,
        };
        Ok(Some((record, files)))
    }

    fn write_record(&self, folder: &Path, scope: &str, record: &DatasetRecord) -> MpiResult<PathBuf> {
        let path = folder.join(format!("{}_dataset.json", scope));
        let js = serde_json::to_string_pretty(record).context(ParsingJsonSnafu {
            path: path_str(&path),
        })?;
        fs::write(&path, js + "\n").context(WritingFileSnafu {
            path: path_str(&path),
        })?;
        Ok(path)
    }

    /// Writes the dataset of a country. Returns the files written, or `None`
    /// when the country has no rows.
    pub fn generate_dataset(
        &self,
        folder: &Path,
        rows: &RowMap,
        trend_rows: &RowMap,
        iso3: &str,
        country_name: &str,
        date_range: &DateRange,
    ) -> MpiResult<Option<Vec<PathBuf>>> {
        match self.build_dataset(folder, rows, trend_rows, iso3, country_name, date_range)? {
            Some((record, mut files)) => {
                files.push(self.write_record(folder, iso3, &record)?);
                Ok(Some(files))
            }
            None => Ok(None),
        }
    }

    /// Writes the global dataset. It also lists the source workbooks.
    pub fn generate_global_dataset(
        &self,
        folder: &Path,
        rows: &RowMap,
        trend_rows: &RowMap,
        date_range: &DateRange,
    ) -> MpiResult<Option<Vec<PathBuf>>> {
        let (mut record, mut files) =
            match self.build_dataset(folder, rows, trend_rows, GLOBAL_SCOPE, "Global", date_range)? {
                Some(x) => x,
                None => return Ok(None),
            };
        record.data_update_frequency = Some("Every year".to_string());
        let descriptions = &self.config.dataset.resource_descriptions;
        let sources = [
            (
                "MPI and Partial Indices National Database",
                &descriptions.mpi_national,
                &self.config.mpi_national.source,
                &self.source_paths.mpi_national,
            ),
            (
                "MPI and Partial Indices Subnational Database",
                &descriptions.mpi_subnational,
                &self.config.mpi_subnational.source,
                &self.source_paths.mpi_subnational,
            ),
            (
                "Trends Over Time MPI Database",
                &descriptions.trends,
                &self.config.trends.source,
                &self.source_paths.trends,
            ),
        ];
        for (name, description, source, path) in sources.iter() {
            record.resources.push(ResourceRecord {
                name: name.to_string(),
                description: description.to_string(),
                format: source.format.to_lowercase(),
                file: path_str(path),
            });
        }
        files.push(self.write_record(folder, GLOBAL_SCOPE, &record)?);
        Ok(Some(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<HxlColumn> {
        [
            ("country_code", "#country+code"),
            ("admin1_name", "#adm1+name"),
            ("mpi", "#indicator+mpi"),
            ("in_severe_poverty", "#indicator+severe"),
            ("reference_period_start", "#date+start"),
        ]
        .iter()
        .map(|(f, t)| HxlColumn {
            header: f.to_string(),
            tag: t.to_string(),
            field: f.to_string(),
        })
        .collect()
    }

    fn rows(specs: &[(&str, &str, &str)]) -> RowMap {
        let mut table = StandardisedTable::new();
        let mut envelopes = DateRangeEnvelopes::new();
        for (country, region, period) in specs.iter() {
            let row = NormalizedRow {
                country_code: country.to_string(),
                admin1_code: "".to_string(),
                admin1_name: region.to_string(),
                indicators: Indicators {
                    mpi: Some("0.2720".to_string()),
                    ..Indicators::default()
                },
                survey: None,
                methodology_note: None,
            };
            table
                .add_row(row, period, true, &mut envelopes, "test")
                .unwrap();
        }
        table.global().clone()
    }

    fn config() -> MpiConfig {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/project_configuration.json");
        read_config(path).unwrap()
    }

    fn paths() -> SourcePaths {
        SourcePaths {
            mpi_national: PathBuf::from("saved/national.xlsx"),
            mpi_subnational: PathBuf::from("saved/subnational.xlsx"),
            trends: PathBuf::from("saved/trends.xlsx"),
        }
    }

    fn range() -> DateRange {
        parse_date_range("2015-2016", true).unwrap()
    }

    #[test]
    fn empty_resource_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let empty = RowMap::new();
        let res = generate_resource(&columns(), empty.values(), dir.path(), "x.csv").unwrap();
        assert!(!res);
        assert!(!dir.path().join("x.csv").exists());
    }

    #[test]
    fn resource_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let r = rows(&[("NPL", "", "2019"), ("AFG", "Kabul", "2015-2016"), ("AFG", "", "2015-2016")]);
        assert!(generate_resource(&columns(), r.values(), dir.path(), "global_mpi.csv").unwrap());
        let content = fs::read_to_string(dir.path().join("global_mpi.csv")).unwrap();
        let expected = "\
country_code,admin1_name,mpi,in_severe_poverty,reference_period_start
#country+code,#adm1+name,#indicator+mpi,#indicator+severe,#date+start
AFG,,0.2720,,2015-01-01T00:00:00
AFG,Kabul,0.2720,,2015-01-01T00:00:00
NPL,,0.2720,,2019-01-01T00:00:00
";
        assert_eq!(content, expected);
    }

    #[test]
    fn unknown_field() {
        let r = rows(&[("AFG", "", "2015")]);
        let row = r.values().next().unwrap();
        assert_eq!(field_value(row, "mpi").unwrap(), "0.2720");
        assert!(field_value(row, "population").is_err());
    }

    #[test]
    fn slugs_and_dates() {
        assert_eq!(slugify("Global MPI"), "global-mpi");
        assert_eq!(slugify("Lao People's Democratic Republic MPI"), "lao-people-s-democratic-republic-mpi");
        assert_eq!(
            format_date_range(&range()),
            "[2015-01-01T00:00:00 TO 2016-12-31T23:59:59]"
        );
    }

    #[test]
    fn country_dataset_without_trends() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let paths = paths();
        let generator = DatasetGenerator::new(&config, &paths);
        let files = generator
            .generate_dataset(
                dir.path(),
                &rows(&[("AFG", "", "2015-2016")]),
                &RowMap::new(),
                "AFG",
                "Afghanistan",
                &range(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(!dir.path().join("AFG_mpi_trends.csv").exists());
        let js: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("AFG_dataset.json")).unwrap())
                .unwrap();
        assert_eq!(js["name"], "afghanistan-mpi");
        assert_eq!(js["title"], "Afghanistan Multi Dimensional Poverty Index");
        assert!(js["methodology_other"].as_str().unwrap().ends_with(")."));
        assert!(!js["methodology_other"].as_str().unwrap().contains(" and [here]"));
        assert_eq!(js["resources"].as_array().unwrap().len(), 1);
        assert!(js.get("data_update_frequency").is_none());
        assert_eq!(js["locations"], serde_json::json!(["AFG"]));
    }

    #[test]
    fn empty_country_has_no_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let paths = paths();
        let generator = DatasetGenerator::new(&config, &paths);
        let res = generator
            .generate_dataset(dir.path(), &RowMap::new(), &RowMap::new(), "AFG", "Afghanistan", &range())
            .unwrap();
        assert_eq!(res, None);
        assert!(!dir.path().join("AFG_dataset.json").exists());
    }

    #[test]
    fn global_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let paths = paths();
        let generator = DatasetGenerator::new(&config, &paths);
        let r = rows(&[("AFG", "", "2015-2016"), ("NPL", "", "2019"), ("AFG", "Kabul", "2015-2016")]);
        let files = generator
            .generate_global_dataset(dir.path(), &r, &r, &range())
            .unwrap()
            .unwrap();
        assert_eq!(files.len(), 3);
        let js: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("global_dataset.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(js["name"], "global-mpi");
        assert_eq!(js["data_update_frequency"], "Every year");
        assert_eq!(js["locations"], serde_json::json!(["AFG", "NPL"]));
        let resources = js["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 5);
        assert_eq!(resources[1]["name"], "Global MPI Trends Over Time");
        assert_eq!(resources[4]["file"], "saved/trends.xlsx");
        assert!(js["methodology_other"]
            .as_str()
            .unwrap()
            .contains(" and [here]("));
    }
}

use crate::mpi::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The format of a source file.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SourceFormat {
    Xlsx,
    Csv,
}

/// Where a source file comes from.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSource {
    /// A local path (relative to the configuration file) or an http(s) address.
    pub url: String,
    /// The name of the file once downloaded. Defaults to the last segment of the url.
    pub filename: Option<String>,
    pub format: String,
}

impl DownloadSource {
    pub fn format(&self) -> MpiResult<SourceFormat> {
        match self.format.to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(SourceFormat::Xlsx),
            "csv" => Ok(SourceFormat::Csv),
            _ => UnknownFormatSnafu {
                format: self.format.clone(),
            }
            .fail(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// The columns of one release of a table.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    pub name: String,
    #[serde(rename = "countryColumn")]
    pub country_column: String,
    #[serde(rename = "countryNameColumn")]
    pub country_name_column: Option<String>,
    #[serde(rename = "regionColumn")]
    pub region_column: Option<String>,
    #[serde(rename = "dateColumn")]
    pub date_column: String,
    #[serde(rename = "indicatorColumns")]
    pub indicator_columns: Vec<String>,
    #[serde(rename = "surveyColumn")]
    pub survey_column: Option<String>,
    #[serde(rename = "methodologyNoteColumn")]
    pub methodology_note_column: Option<String>,
}

impl RevisionConfig {
    /// The layout of this revision, with the column names normalised the same
    /// way as the headers of the sheets.
    pub fn layout(&self) -> ColumnLayout {
        let norm = |s: &String| normalise_header(s);
        ColumnLayout {
            country_column: norm(&self.country_column),
            region_column: self.region_column.as_ref().map(norm),
            date_column: norm(&self.date_column),
            indicator_columns: self.indicator_columns.iter().map(norm).collect(),
            survey_column: self.survey_column.as_ref().map(norm),
            methodology_note_column: self.methodology_note_column.as_ref().map(norm),
        }
    }

    pub fn country_name_column(&self) -> Option<String> {
        self.country_name_column.as_deref().map(normalise_header)
    }
}

fn default_header_rows() -> Vec<usize> {
    vec![1]
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// The worksheet to read. The first sheet is used when not set.
    pub sheet: Option<String>,
    /// The rows (starting at 1) that make up the column names.
    #[serde(rename = "headerRows", default = "default_header_rows")]
    pub header_rows: Vec<usize>,
    /// Whether the survey periods end on the last second of their final day.
    #[serde(rename = "maxEndtime", default)]
    pub max_endtime: bool,
    pub revisions: Vec<RevisionConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TableSource {
    pub source: DownloadSource,
    pub table: TableConfig,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TimepointLabels {
    pub early: String,
    pub late: String,
}

impl TimepointLabels {
    pub fn get(&self, timepoint: Timepoint) -> &str {
        match timepoint {
            Timepoint::Early => self.early.as_str(),
            Timepoint::Late => self.late.as_str(),
        }
    }
}

impl Default for TimepointLabels {
    fn default() -> Self {
        TimepointLabels {
            early: Timepoint::Early.default_label().to_string(),
            late: Timepoint::Late.default_label().to_string(),
        }
    }
}

/// The trends over time workbook: one sheet per table, two timepoints per row.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TrendSource {
    pub source: DownloadSource,
    #[serde(default)]
    pub timepoints: TimepointLabels,
    pub national: TableConfig,
    pub subnational: TableConfig,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub source: DownloadSource,
    /// `"ISO3|Region name"` to pcode, for the regions whose names differ from the lookup table.
    #[serde(rename = "nameMappings", default)]
    pub name_mappings: BTreeMap<String, String>,
}

/// An output column.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct HxlColumn {
    pub header: String,
    pub tag: String,
    /// The standardised field written in this column.
    pub field: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MethodologyNotes {
    #[serde(rename = "mpiAndPartialIndices")]
    pub mpi_and_partial_indices: String,
    #[serde(rename = "trendOverTime")]
    pub trend_over_time: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptions {
    #[serde(rename = "standardisedMpi")]
    pub standardised_mpi: String,
    #[serde(rename = "standardisedTrends")]
    pub standardised_trends: String,
    #[serde(rename = "mpiNational")]
    pub mpi_national: String,
    #[serde(rename = "mpiSubnational")]
    pub mpi_subnational: String,
    pub trends: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub tags: Vec<String>,
    pub notes: String,
    /// Notes added to the description of a single country, keyed by ISO3 code.
    #[serde(rename = "countryNotes", default)]
    pub country_notes: BTreeMap<String, String>,
    pub methodology: String,
    #[serde(rename = "methodologyNotes")]
    pub methodology_notes: MethodologyNotes,
    #[serde(rename = "resourceDescriptions")]
    pub resource_descriptions: ResourceDescriptions,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct HapiResourceConfig {
    pub name: String,
    pub description: String,
    /// Without extension.
    pub filename: String,
    pub hxltags: Vec<HxlColumn>,
}

/// The poverty rate dataset, built from the global rows.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct HapiDatasetConfig {
    pub name: String,
    pub title: String,
    pub tags: Vec<String>,
    #[serde(rename = "datasetSource")]
    pub dataset_source: String,
    #[serde(rename = "licenseId")]
    pub license_id: String,
    pub resource: HapiResourceConfig,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MpiConfig {
    #[serde(rename = "mpiNational")]
    pub mpi_national: TableSource,
    #[serde(rename = "mpiSubnational")]
    pub mpi_subnational: TableSource,
    pub trends: TrendSource,
    pub admin1: AdminConfig,
    pub hxltags: Vec<HxlColumn>,
    pub dataset: DatasetConfig,
    /// The poverty rate output is skipped when absent.
    #[serde(rename = "hapiDataset", default)]
    pub hapi_dataset: Option<HapiDatasetConfig>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

pub fn read_config(path: &str) -> MpiResult<MpiConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: MpiConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    info!("read_config: {} loaded", path);
    Ok(config)
}

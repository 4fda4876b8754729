use log::{debug, info, warn};

use mpi_standardise::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use text_diff::print_diff;

use crate::args::Args;
use crate::mpi::admin::AdminTable;
use crate::mpi::config_reader::*;
use crate::mpi::dataset::{resource_filename, trend_resource_filename, DatasetGenerator};
use crate::mpi::hapi::{HapiDatasetGenerator, HapiOutput};
use crate::mpi::io_common::Retriever;
use crate::mpi::io_csv::{FileTableReader, TableReader};
use crate::mpi::pipeline::Pipeline;

pub mod admin;
pub mod config_reader;
pub mod dataset;
pub mod hapi;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;
pub mod pipeline;

const DEFAULT_CONFIG: &str = "config/project_configuration.json";
const DEFAULT_OUTPUT: &str = "output";
const DEFAULT_SAVED_DIR: &str = "saved_data";

#[derive(Debug, Snafu)]
pub enum MpiError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {sheet} not found in {path}"))]
    MissingWorksheet { sheet: String, path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Header row {row} is missing in {path}"))]
    MissingHeaderRow { row: usize, path: String },
    #[snafu(display("Column {header} appears more than once in {path}"))]
    DuplicateHeader { header: String, path: String },
    #[snafu(display("No revision of table {table} matches the headers of {path}. Missing columns: {missing}"))]
    NoMatchingRevision {
        table: String,
        path: String,
        missing: String,
    },
    #[snafu(display("Error opening {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error downloading {url}"))]
    Download { source: reqwest::Error, url: String },
    #[snafu(display("Source file {path} does not exist"))]
    SourceMissing { path: String },
    #[snafu(display("Saved file {path} does not exist (was it saved with --save?)"))]
    SavedDataMissing { path: String },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error in table {table}: {source}"))]
    Standardise {
        source: StandardiseError,
        table: String,
    },
    #[snafu(display("The pipeline is not finished (current stage: {stage})"))]
    PipelineNotReady { stage: String },
    #[snafu(display("Unknown file format {format}"))]
    UnknownFormat { format: String },
    #[snafu(display("Differences found with the reference files: {paths}"))]
    ReferenceMismatch { paths: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type MpiResult<T> = Result<T, MpiError>;

fn path_str(p: &Path) -> String {
    p.display().to_string()
}

// Relative paths in the configuration are resolved against its folder.
fn resolve(base: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Runs the whole program: reads the sources and writes the datasets.
pub fn run(args: &Args) -> MpiResult<()> {
    run_with(args, &FileTableReader {})?;
    Ok(())
}

/// Same as `run`, with another source of tables. Returns the files written.
pub fn run_with(args: &Args, reader: &dyn TableReader) -> MpiResult<Vec<PathBuf>> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = read_config(&config_path)?;
    debug!("run_with: config: {:?}", config);
    let config_dir = Path::new(&config_path)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    let folder = match (&args.out, &config.output_directory) {
        (Some(out), _) => PathBuf::from(out),
        (None, Some(dir)) => resolve(&config_dir, dir),
        (None, None) => PathBuf::from(DEFAULT_OUTPUT),
    };
    fs::create_dir_all(&folder).context(WritingFileSnafu {
        path: path_str(&folder),
    })?;
    let saved_dir = PathBuf::from(
        args.saved_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_SAVED_DIR.to_string()),
    );
    let retriever = Retriever::new(
        config_dir.clone(),
        folder.clone(),
        saved_dir,
        args.save,
        args.use_saved,
    );

    let admin_path = retriever.retrieve(&config.admin1.source)?;
    let admin = AdminTable::load(&admin_path, &config.admin1.name_mappings)?;
    info!("Admin-1 table loaded: {} units", admin.len());

    let mut pipeline = Pipeline::new(&config, &retriever, &admin, reader);
    let source_paths = pipeline.process()?;
    debug!(
        "run_with: pipeline {:?}, {} country names",
        pipeline.stage(),
        pipeline.country_names()?.len()
    );

    let generator = DatasetGenerator::new(&config, &source_paths);
    let date_ranges = pipeline.date_ranges()?;
    let mut written: Vec<PathBuf> = Vec::new();

    let global_rows = pipeline.standardised_global()?;
    let global_trend_rows = pipeline.standardised_global_trend()?;
    let global = match date_ranges.global() {
        Some(range) => generator
            .generate_global_dataset(&folder, global_rows, global_trend_rows, range)?
            .map(|files| (files, range)),
        None => {
            warn!("No rows were read from any table");
            None
        }
    };
    match global {
        Some((files, range)) => {
            written.extend(files);
            if let Some(hapi_config) = &config.hapi_dataset {
                let hapi_rows = HapiOutput::new(&admin, global_rows, global_trend_rows).process(
                    &DatasetGenerator::dataset_id("Global"),
                    &resource_filename(GLOBAL_SCOPE),
                    &trend_resource_filename(GLOBAL_SCOPE),
                );
                let res = HapiDatasetGenerator::new(hapi_config, &hapi_rows)
                    .generate_poverty_rate_dataset(&folder, range)?;
                if let Some(files) = res {
                    written.extend(files);
                }
            }
        }
        None => warn!("No global dataset produced"),
    }

    if !args.global_only {
        let empty = RowMap::new();
        let trends = pipeline.standardised_countries_trend()?;
        for (iso3, rows) in pipeline.standardised_countries()?.iter() {
            let range = date_ranges
                .get(iso3)
                .with_whatever_context(|| format!("No date range for {}", iso3))?;
            let res = generator.generate_dataset(
                &folder,
                rows,
                trends.get(iso3).unwrap_or(&empty),
                iso3,
                &pipeline.country_name(iso3),
                range,
            )?;
            if let Some(files) = res {
                written.extend(files);
            }
        }
    }
    info!("{} files written in {:?}", written.len(), folder);

    if let Some(reference_dir) = &args.reference {
        compare_with_reference(&written, Path::new(reference_dir))?;
    }
    Ok(written)
}

/// Compares the files written with the files of the same name in a reference folder.
pub fn compare_with_reference(written: &[PathBuf], reference_dir: &Path) -> MpiResult<()> {
    let mut mismatches: Vec<String> = Vec::new();
    for path in written {
        let file_name = match path.file_name() {
            Some(f) => f,
            None => continue,
        };
        let ref_path = reference_dir.join(file_name);
        let actual = fs::read_to_string(path).context(OpeningFileSnafu {
            path: path_str(path),
        })?;
        let expected = fs::read_to_string(&ref_path).context(OpeningFileSnafu {
            path: path_str(&ref_path),
        })?;
        if expected != actual {
            warn!("Found differences with the reference file {:?}", ref_path);
            print_diff(expected.as_str(), actual.as_str(), "\n");
            mismatches.push(path_str(path));
        }
    }
    ensure!(
        mismatches.is_empty(),
        ReferenceMismatchSnafu {
            paths: mismatches.join(", ")
        }
    );
    info!("All {} files match the reference", written.len());
    Ok(())
}

// The sequence of downloads and reads that builds the standardised tables.

use std::collections::BTreeMap;

use crate::mpi::config_reader::*;
use crate::mpi::io_common::{Retriever, SourceTable};
use crate::mpi::io_csv::{SheetSpec, TableReader};
use crate::mpi::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PipelineStage {
    Init,
    DownloadMpiNational,
    DownloadMpiSubnational,
    DownloadTrends,
    ReadNational,
    ReadSubnational,
    ReadTrendsNational,
    ReadTrendsSubnational,
    Ready,
}

impl PipelineStage {
    /// The stage that follows this one. `Ready` is final.
    pub fn next(&self) -> PipelineStage {
        match self {
            PipelineStage::Init => PipelineStage::DownloadMpiNational,
            PipelineStage::DownloadMpiNational => PipelineStage::DownloadMpiSubnational,
            PipelineStage::DownloadMpiSubnational => PipelineStage::DownloadTrends,
            PipelineStage::DownloadTrends => PipelineStage::ReadNational,
            PipelineStage::ReadNational => PipelineStage::ReadSubnational,
            PipelineStage::ReadSubnational => PipelineStage::ReadTrendsNational,
            PipelineStage::ReadTrendsNational => PipelineStage::ReadTrendsSubnational,
            PipelineStage::ReadTrendsSubnational => PipelineStage::Ready,
            PipelineStage::Ready => PipelineStage::Ready,
        }
    }
}

/// The local copies of the three source workbooks.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourcePaths {
    pub mpi_national: PathBuf,
    pub mpi_subnational: PathBuf,
    pub trends: PathBuf,
}

// Where the rows of a sheet go.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Destination {
    Standardised,
    Trend(Timepoint),
}

pub struct Pipeline<'a> {
    config: &'a MpiConfig,
    retriever: &'a Retriever,
    resolver: &'a dyn AdminResolver,
    reader: &'a dyn TableReader,
    stage: PipelineStage,
    mpi_national_path: Option<PathBuf>,
    mpi_subnational_path: Option<PathBuf>,
    trends_path: Option<PathBuf>,
    // National and subnational rows share a table.
    standardised: StandardisedTable,
    trends: Timepoints<StandardisedTable>,
    merged_trends: StandardisedTable,
    date_ranges: DateRangeEnvelopes,
    country_names: BTreeMap<String, String>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a MpiConfig,
        retriever: &'a Retriever,
        resolver: &'a dyn AdminResolver,
        reader: &'a dyn TableReader,
    ) -> Pipeline<'a> {
        Pipeline {
            config,
            retriever,
            resolver,
            reader,
            stage: PipelineStage::Init,
            mpi_national_path: None,
            mpi_subnational_path: None,
            trends_path: None,
            standardised: StandardisedTable::new(),
            trends: Timepoints::default(),
            merged_trends: StandardisedTable::new(),
            date_ranges: DateRangeEnvelopes::new(),
            country_names: BTreeMap::new(),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Runs all the remaining stages, and returns the paths of the source workbooks.
    pub fn process(&mut self) -> MpiResult<SourcePaths> {
        while self.stage != PipelineStage::Ready {
            self.advance()?;
        }
        self.source_paths()
    }

    /// Runs the next stage. Any error stops the pipeline in its current stage.
    pub fn advance(&mut self) -> MpiResult<PipelineStage> {
        let next = self.stage.next();
        info!("Pipeline: {:?} -> {:?}", self.stage, next);
        match next {
            PipelineStage::Init => {}
            PipelineStage::DownloadMpiNational => {
                self.mpi_national_path =
                    Some(self.retriever.retrieve(&self.config.mpi_national.source)?);
            }
            PipelineStage::DownloadMpiSubnational => {
                self.mpi_subnational_path =
                    Some(self.retriever.retrieve(&self.config.mpi_subnational.source)?);
            }
            PipelineStage::DownloadTrends => {
                self.trends_path = Some(self.retriever.retrieve(&self.config.trends.source)?);
            }
            PipelineStage::ReadNational => {
                let config = self.config;
                let path = self.source_path(&self.mpi_national_path)?;
                self.read_table(
                    "national",
                    &path,
                    &config.mpi_national.source,
                    &config.mpi_national.table,
                )?;
            }
            PipelineStage::ReadSubnational => {
                let config = self.config;
                let path = self.source_path(&self.mpi_subnational_path)?;
                self.read_table(
                    "subnational",
                    &path,
                    &config.mpi_subnational.source,
                    &config.mpi_subnational.table,
                )?;
            }
            PipelineStage::ReadTrendsNational => {
                let config = self.config;
                let path = self.source_path(&self.trends_path)?;
                self.read_trend_table("trends national", &path, &config.trends.national)?;
            }
            PipelineStage::ReadTrendsSubnational => {
                let config = self.config;
                let path = self.source_path(&self.trends_path)?;
                self.read_trend_table("trends subnational", &path, &config.trends.subnational)?;
            }
            PipelineStage::Ready => {
                if self.stage != PipelineStage::Ready {
                    self.merged_trends = merge_timepoints(&self.trends);
                    info!(
                        "Pipeline: {} standardised rows, {} trend rows, {} countries",
                        self.standardised.len(),
                        self.merged_trends.len(),
                        self.standardised.countries().len()
                    );
                }
            }
        }
        self.stage = next;
        Ok(next)
    }

    fn source_path(&self, p: &Option<PathBuf>) -> MpiResult<PathBuf> {
        p.clone().context(PipelineNotReadySnafu {
            stage: format!("{:?}", self.stage),
        })
    }

    fn source_paths(&self) -> MpiResult<SourcePaths> {
        Ok(SourcePaths {
            mpi_national: self.source_path(&self.mpi_national_path)?,
            mpi_subnational: self.source_path(&self.mpi_subnational_path)?,
            trends: self.source_path(&self.trends_path)?,
        })
    }

    fn load(&self, path: &Path, format: SourceFormat, table: &TableConfig) -> MpiResult<SourceTable> {
        let spec = SheetSpec {
            format,
            sheet: table.sheet.clone(),
            header_rows: table.header_rows.clone(),
        };
        self.reader.read(path, &spec)
    }

    fn read_table(
        &mut self,
        label: &str,
        path: &Path,
        source: &DownloadSource,
        table: &TableConfig,
    ) -> MpiResult<()> {
        let data = self.load(path, source.format()?, table)?;
        let (revision, layouts) =
            select_revision(label, path, &data.headers, &table.revisions, |l| vec![l.clone()])?;
        let name_column = revision.country_name_column();
        for layout in layouts.iter() {
            self.ingest(
                label,
                &data,
                layout,
                table.max_endtime,
                name_column.as_deref(),
                Destination::Standardised,
            )?;
        }
        Ok(())
    }

    fn read_trend_table(&mut self, label: &str, path: &Path, table: &TableConfig) -> MpiResult<()> {
        let config = self.config;
        let labels = &config.trends.timepoints;
        let data = self.load(path, config.trends.source.format()?, table)?;
        let (_, layouts) = select_revision(label, path, &data.headers, &table.revisions, |l| {
            Timepoint::BOTH
                .iter()
                .map(|tp| l.for_timepoint(labels.get(*tp)))
                .collect()
        })?;
        for (timepoint, layout) in Timepoint::BOTH.iter().zip(layouts.iter()) {
            let tp_label = format!("{} {}", label, labels.get(*timepoint));
            self.ingest(
                &tp_label,
                &data,
                layout,
                table.max_endtime,
                None,
                Destination::Trend(*timepoint),
            )?;
        }
        Ok(())
    }

    fn ingest(
        &mut self,
        label: &str,
        data: &SourceTable,
        layout: &ColumnLayout,
        max_end: bool,
        name_column: Option<&str>,
        destination: Destination,
    ) -> MpiResult<()> {
        let resolver = self.resolver;
        let (mut inserted, mut duplicates, mut skipped) = (0_usize, 0_usize, 0_usize);
        for raw in data.rows.iter() {
            let record = match normalize_row(raw, layout, resolver)
                .context(StandardiseSnafu { table: label })?
            {
                Some(r) => r,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            if let Some(col) = name_column {
                let name = raw.text(col);
                if !name.is_empty() {
                    self.country_names
                        .entry(record.row.country_code.clone())
                        .or_insert(name);
                }
            }
            let table = match destination {
                Destination::Standardised => &mut self.standardised,
                Destination::Trend(tp) => self.trends.get_mut(tp),
            };
            let res = table
                .add_row(
                    record.row,
                    &record.date_range_text,
                    max_end,
                    &mut self.date_ranges,
                    label,
                )
                .context(StandardiseSnafu { table: label })?;
            match res {
                Insertion::Inserted => inserted += 1,
                Insertion::Duplicate => duplicates += 1,
            }
        }
        info!(
            "{}: {} rows read, {} inserted, {} duplicates, {} skipped",
            label,
            data.rows.len(),
            inserted,
            duplicates,
            skipped
        );
        Ok(())
    }

    fn ensure_ready(&self) -> MpiResult<()> {
        ensure!(
            self.stage == PipelineStage::Ready,
            PipelineNotReadySnafu {
                stage: format!("{:?}", self.stage)
            }
        );
        Ok(())
    }

    pub fn standardised_global(&self) -> MpiResult<&RowMap> {
        self.ensure_ready()?;
        Ok(self.standardised.global())
    }

    pub fn standardised_countries(&self) -> MpiResult<&CountryRowMaps> {
        self.ensure_ready()?;
        Ok(self.standardised.countries())
    }

    pub fn standardised_global_trend(&self) -> MpiResult<&RowMap> {
        self.ensure_ready()?;
        Ok(self.merged_trends.global())
    }

    pub fn standardised_countries_trend(&self) -> MpiResult<&CountryRowMaps> {
        self.ensure_ready()?;
        Ok(self.merged_trends.countries())
    }

    pub fn date_ranges(&self) -> MpiResult<&DateRangeEnvelopes> {
        self.ensure_ready()?;
        Ok(&self.date_ranges)
    }

    pub fn country_names(&self) -> MpiResult<&BTreeMap<String, String>> {
        self.ensure_ready()?;
        Ok(&self.country_names)
    }

    /// The name of a country as written in the tables, or its code.
    pub fn country_name(&self, iso3: &str) -> String {
        self.country_names
            .get(iso3)
            .cloned()
            .unwrap_or_else(|| iso3.to_string())
    }
}

/// Picks the first revision whose columns are all in the headers.
///
/// `expand` turns the layout of a revision into the layouts actually read,
/// one per timepoint for the trend tables.
fn select_revision<'r, F>(
    label: &str,
    path: &Path,
    headers: &[String],
    revisions: &'r [RevisionConfig],
    expand: F,
) -> MpiResult<(&'r RevisionConfig, Vec<ColumnLayout>)>
where
    F: Fn(&ColumnLayout) -> Vec<ColumnLayout>,
{
    let mut first_missing: Option<Vec<String>> = None;
    for revision in revisions.iter() {
        let base = revision.layout();
        base.validate().context(StandardiseSnafu { table: label })?;
        let layouts = expand(&base);
        let mut missing: Vec<String> = Vec::new();
        for layout in layouts.iter() {
            for col in layout.missing_columns(headers) {
                if !missing.contains(&col) {
                    missing.push(col);
                }
            }
        }
        if missing.is_empty() {
            info!("{}: using revision {}", label, revision.name);
            return Ok((revision, layouts));
        }
        debug!(
            "select_revision: {}: revision {} does not match, missing: {:?}",
            label, revision.name, missing
        );
        if first_missing.is_none() {
            first_missing = Some(missing);
        }
    }
    NoMatchingRevisionSnafu {
        table: label,
        path: path_str(path),
        missing: first_missing
            .map(|m| m.join(", "))
            .unwrap_or_else(|| "no revision configured".to_string()),
    }
    .fail()
}

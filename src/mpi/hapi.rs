// The poverty rate table: the global rows with their admin-1 units matched to the
// lookup table, one row per place and end of reference period.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::mpi::admin::AdminTable;
use crate::mpi::config_reader::HapiDatasetConfig;
use crate::mpi::dataset::*;
use crate::mpi::*;

#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct HapiKey {
    pub location_code: String,
    pub provider_admin1_name: String,
    pub admin1_code: String,
    pub reference_period_end: NaiveDateTime,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HapiRow {
    pub location_code: String,
    /// The region name as written in the source table.
    pub provider_admin1_name: String,
    pub admin1_code: String,
    /// The region name of the lookup table. Empty when the region was not matched.
    pub admin1_name: String,
    /// 0 for a national row, 1 for a region.
    pub admin_level: u8,
    pub indicators: Indicators,
    pub reference_period_start: NaiveDateTime,
    pub reference_period_end: NaiveDateTime,
    pub dataset_id: String,
    pub resource_id: String,
}

impl HapiRow {
    pub fn key(&self) -> HapiKey {
        HapiKey {
            location_code: self.location_code.clone(),
            provider_admin1_name: self.provider_admin1_name.clone(),
            admin1_code: self.admin1_code.clone(),
            reference_period_end: self.reference_period_end,
        }
    }
}

impl OutputRow for HapiRow {
    fn field(&self, field: &str) -> MpiResult<String> {
        let res = match field {
            "location_code" => self.location_code.clone(),
            "provider_admin1_name" => self.provider_admin1_name.clone(),
            "admin1_code" => self.admin1_code.clone(),
            "admin1_name" => self.admin1_name.clone(),
            "admin_level" => self.admin_level.to_string(),
            "reference_period_start" => self.reference_period_start.format(DATE_FORMAT).to_string(),
            "reference_period_end" => self.reference_period_end.format(DATE_FORMAT).to_string(),
            "dataset_hdx_id" => self.dataset_id.clone(),
            "resource_hdx_id" => self.resource_id.clone(),
            _ => match Indicator::ALL.iter().find(|i| i.field_name() == field) {
                Some(indicator) => self.indicators.get(*indicator).cloned().unwrap_or_default(),
                None => whatever!("Unknown poverty rate field {}", field),
            },
        };
        Ok(res)
    }
}

pub type HapiRows = BTreeMap<HapiKey, HapiRow>;

pub struct HapiOutput<'a> {
    admin: &'a AdminTable,
    rows: &'a RowMap,
    trend_rows: &'a RowMap,
}

impl<'a> HapiOutput<'a> {
    pub fn new(admin: &'a AdminTable, rows: &'a RowMap, trend_rows: &'a RowMap) -> HapiOutput<'a> {
        HapiOutput {
            admin,
            rows,
            trend_rows,
        }
    }

    fn create_row(&self, row: &IndicatorRow, dataset_id: &str, resource_id: &str) -> HapiRow {
        let (admin1_name, admin_level) = if !row.admin1_code.is_empty() {
            let name = match self.admin.pcode_name(&row.admin1_code) {
                Some(n) => n.to_string(),
                None => {
                    warn!("HapiOutput: pcode {} is not in the lookup table", row.admin1_code);
                    "".to_string()
                }
            };
            (name, 1)
        } else if !row.admin1_name.is_empty() {
            // A region that could not be matched stays at level 1.
            ("".to_string(), 1)
        } else {
            ("".to_string(), 0)
        };
        HapiRow {
            location_code: row.country_code.clone(),
            provider_admin1_name: row.admin1_name.clone(),
            admin1_code: row.admin1_code.clone(),
            admin1_name,
            admin_level,
            indicators: row.indicators.clone(),
            reference_period_start: row.reference_period_start,
            reference_period_end: row.reference_period_end,
            dataset_id: dataset_id.to_string(),
            resource_id: resource_id.to_string(),
        }
    }

    /// Builds the rows from the standardised rows, then from the trend rows.
    ///
    /// The two sources are keyed on the place and the end of the reference
    /// period only: a trend row replaces a standardised row with the same key.
    pub fn process(&self, dataset_id: &str, resource_id: &str, trend_resource_id: &str) -> HapiRows {
        let mut res = HapiRows::new();
        let sources = [(self.rows, resource_id), (self.trend_rows, trend_resource_id)];
        for (rows, rid) in sources.iter() {
            for row in rows.values() {
                let hapi_row = self.create_row(row, dataset_id, rid);
                let key = hapi_row.key();
                if res.insert(key, hapi_row).is_some() {
                    debug!(
                        "HapiOutput::process: {} {:?} replaced by {}",
                        row.country_code, row.admin1_name, rid
                    );
                }
            }
        }
        info!("HapiOutput: {} poverty rate rows", res.len());
        res
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct HapiDatasetRecord {
    pub name: String,
    pub title: String,
    pub dataset_source: String,
    pub license_id: String,
    pub tags: Vec<String>,
    pub subnational: bool,
    pub data_update_frequency: String,
    pub dataset_date: String,
    pub locations: Vec<String>,
    pub resources: Vec<ResourceRecord>,
}

pub struct HapiDatasetGenerator<'a> {
    config: &'a HapiDatasetConfig,
    rows: &'a HapiRows,
}

impl<'a> HapiDatasetGenerator<'a> {
    pub fn new(config: &'a HapiDatasetConfig, rows: &'a HapiRows) -> HapiDatasetGenerator<'a> {
        HapiDatasetGenerator { config, rows }
    }

    /// Writes the poverty rate table and its dataset record. Returns `None`
    /// when there are no rows.
    pub fn generate_poverty_rate_dataset(
        &self,
        folder: &Path,
        date_range: &DateRange,
    ) -> MpiResult<Option<Vec<PathBuf>>> {
        info!("Creating dataset: {}", self.config.title);
        let resource = &self.config.resource;
        if self.rows.is_empty() {
            warn!("Poverty rate has no data!");
            return Ok(None);
        }
        let filename = format!("{}.csv", resource.filename);
        if !generate_resource(&resource.hxltags, self.rows.values(), folder, &filename)? {
            warn!("{} has no data!", resource.name);
            return Ok(None);
        }
        let locations: BTreeSet<String> =
            self.rows.values().map(|r| r.location_code.clone()).collect();
        let record = HapiDatasetRecord {
            name: self.config.name.clone(),
            title: self.config.title.clone(),
            dataset_source: self.config.dataset_source.clone(),
            license_id: self.config.license_id.clone(),
            tags: self.config.tags.clone(),
            subnational: true,
            data_update_frequency: "Every year".to_string(),
            dataset_date: format_date_range(date_range),
            locations: locations.into_iter().collect(),
            resources: vec![ResourceRecord {
                name: resource.name.clone(),
                description: resource.description.clone(),
                format: "csv".to_string(),
                file: filename.clone(),
            }],
        };
        let path = folder.join(format!("{}_dataset.json", resource.filename));
        let js = serde_json::to_string_pretty(&record).context(ParsingJsonSnafu {
            path: path_str(&path),
        })?;
        fs::write(&path, js + "\n").context(WritingFileSnafu {
            path: path_str(&path),
        })?;
        Ok(Some(vec![folder.join(filename), path]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpi::config_reader::{HapiResourceConfig, HxlColumn};

    fn admin() -> AdminTable {
        let units = vec![(
            "AFG".to_string(),
            "Kabul".to_string(),
            "AF01".to_string(),
        )];
        AdminTable::new(&units, &BTreeMap::new()).unwrap()
    }

    fn table(specs: &[(&str, &str, &str, &str, &str)]) -> RowMap {
        let mut table = StandardisedTable::new();
        let mut envelopes = DateRangeEnvelopes::new();
        for (country, code, name, period, mpi) in specs.iter() {
            let row = NormalizedRow {
                country_code: country.to_string(),
                admin1_code: code.to_string(),
                admin1_name: name.to_string(),
                indicators: Indicators {
                    mpi: Some(mpi.to_string()),
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

    fn config() -> HapiDatasetConfig {
        let columns = ["location_code", "admin1_code", "admin1_name", "admin_level", "mpi", "resource_hdx_id"];
        HapiDatasetConfig {
            name: "hdx-hapi-poverty-rate".to_string(),
            title: "Poverty Rate".to_string(),
            tags: vec!["poverty".to_string()],
            dataset_source: "OPHI".to_string(),
            license_id: "cc-by-igo".to_string(),
            resource: HapiResourceConfig {
                name: "Global Poverty Rate".to_string(),
                description: "Poverty rate".to_string(),
                filename: "hdx_hapi_poverty_rate_global".to_string(),
                hxltags: columns
                    .iter()
                    .map(|c| HxlColumn {
                        header: c.to_string(),
                        tag: format!("#{}", c),
                        field: c.to_string(),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn admin_levels() {
        let admin = admin();
        let rows = table(&[
            ("AFG", "", "", "2015-2016", "0.2720"),
            ("AFG", "AF01", "Kabul Province", "2015-2016", "0.1180"),
            ("AFG", "", "Atlantis", "2015-2016", "0.3000"),
        ]);
        let empty = RowMap::new();
        let out = HapiOutput::new(&admin, &rows, &empty).process("global-mpi", "global_mpi.csv", "t");
        assert_eq!(out.len(), 3);
        let by_name = |n: &str| out.values().find(|r| r.provider_admin1_name == n).unwrap();
        assert_eq!(by_name("").admin_level, 0);
        let kabul = by_name("Kabul Province");
        assert_eq!(kabul.admin_level, 1);
        assert_eq!(kabul.admin1_name, "Kabul");
        assert_eq!(kabul.resource_id, "global_mpi.csv");
        let atlantis = by_name("Atlantis");
        assert_eq!(atlantis.admin_level, 1);
        assert_eq!(atlantis.admin1_code, "");
        assert_eq!(atlantis.admin1_name, "");
    }

    #[test]
    fn trend_rows_replace_rows_with_the_same_end() {
        let admin = admin();
        let rows = table(&[("AFG", "", "", "2015-2016", "0.2720")]);
        // Same end, other start: a different composite key but the same poverty rate key.
        let trends = table(&[
            ("AFG", "", "", "2016", "0.2700"),
            ("AFG", "", "", "2010", "0.3000"),
        ]);
        let out = HapiOutput::new(&admin, &rows, &trends).process("global-mpi", "mpi", "trends");
        assert_eq!(out.len(), 2);
        let last = out.values().last().unwrap();
        assert_eq!(last.indicators.mpi, Some("0.2700".to_string()));
        assert_eq!(last.resource_id, "trends");
        assert_eq!(last.field("reference_period_start").unwrap(), "2016-01-01T00:00:00");
        assert!(last.field("population").is_err());
    }

    #[test]
    fn poverty_rate_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let admin = admin();
        let rows = table(&[
            ("NPL", "", "", "2019", "0.0740"),
            ("AFG", "AF01", "Kabul", "2015-2016", "0.1180"),
        ]);
        let empty = RowMap::new();
        let out = HapiOutput::new(&admin, &rows, &empty).process("global-mpi", "global_mpi.csv", "t");
        let config = config();
        let range = parse_date_range("2015-2019", true).unwrap();
        let files = HapiDatasetGenerator::new(&config, &out)
            .generate_poverty_rate_dataset(dir.path(), &range)
            .unwrap()
            .unwrap();
        assert_eq!(files.len(), 2);
        let content = fs::read_to_string(dir.path().join("hdx_hapi_poverty_rate_global.csv")).unwrap();
        let expected = "\
location_code,admin1_code,admin1_name,admin_level,mpi,resource_hdx_id
#location_code,#admin1_code,#admin1_name,#admin_level,#mpi,#resource_hdx_id
AFG,AF01,Kabul,1,0.1180,global_mpi.csv
NPL,,,0,0.0740,global_mpi.csv
";
        assert_eq!(content, expected);
        let js: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("hdx_hapi_poverty_rate_global_dataset.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(js["locations"], serde_json::json!(["AFG", "NPL"]));
        assert_eq!(js["dataset_date"], "[2015-01-01T00:00:00 TO 2019-12-31T23:59:59]");
    }

    #[test]
    fn no_rows_no_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let rows = HapiRows::new();
        let range = parse_date_range("2015", true).unwrap();
        let res = HapiDatasetGenerator::new(&config, &rows)
            .generate_poverty_rate_dataset(dir.path(), &range)
            .unwrap();
        assert_eq!(res, None);
        assert!(!dir.path().join("hdx_hapi_poverty_rate_global.csv").exists());
    }
}

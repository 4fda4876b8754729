// The lookup table of the first-level administrative units.

use std::collections::{BTreeMap, HashMap};

use crate::mpi::*;

const COUNTRY_COLUMN: &str = "Location";
const LEVEL_COLUMN: &str = "Admin Level";
const PCODE_COLUMN: &str = "P-Code";
const NAME_COLUMN: &str = "Name";

// Words that the tables add to some region names but the lookup does not.
const FILLER_WORDS: [&str; 5] = ["province", "region", "state", "department", "district"];

#[derive(Eq, PartialEq, Debug, Clone)]
struct AdminUnit {
    name: String,
    normalised: String,
    pcode: String,
}

/// Lowercase words, without punctuation and filler words.
pub fn normalise_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|w| !FILLER_WORDS.contains(w))
        .collect::<Vec<&str>>()
        .join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct AdminTable {
    units: HashMap<String, Vec<AdminUnit>>,
    mappings: HashMap<(String, String), String>,
    names: HashMap<String, String>,
}

impl AdminTable {
    /// Builds the table from the units and the explicit name mappings.
    ///
    /// The keys of the mappings are written `ISO3|Region name`.
    pub fn new(
        units: &[(String, String, String)],
        name_mappings: &BTreeMap<String, String>,
    ) -> MpiResult<AdminTable> {
        let mut res = AdminTable::default();
        for (iso3, name, pcode) in units.iter() {
            res.names.entry(pcode.clone()).or_insert_with(|| name.clone());
            res.units
                .entry(iso3.to_uppercase())
                .or_default()
                .push(AdminUnit {
                    name: name.clone(),
                    normalised: normalise_name(name),
                    pcode: pcode.clone(),
                });
        }
        for (key, pcode) in name_mappings.iter() {
            let (iso3, name) = match key.split_once('|') {
                Some(x) => x,
                None => whatever!("Name mapping {:?} is not of the form ISO3|name", key),
            };
            res.mappings.insert(
                (iso3.trim().to_uppercase(), normalise_name(name)),
                pcode.clone(),
            );
        }
        Ok(res)
    }

    /// Reads the lookup table from a CSV file.
    ///
    /// Rows whose country cell starts with `#` hold HXL hashtags and are skipped. Only the units
    /// of level 1 are kept when the file has a level column.
    pub fn load(path: &Path, name_mappings: &BTreeMap<String, String>) -> MpiResult<AdminTable> {
        let p = path_str(path);
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .context(CsvOpenSnafu { path: p.clone() })?;
        let headers = rdr
            .headers()
            .context(CsvLineParseSnafu {
                path: p.clone(),
                lineno: 1_usize,
            })?
            .clone();
        let col = |name: &str| headers.iter().position(|h| h.trim() == name);
        let (country_idx, pcode_idx, name_idx) =
            match (col(COUNTRY_COLUMN), col(PCODE_COLUMN), col(NAME_COLUMN)) {
                (Some(c), Some(pc), Some(n)) => (c, pc, n),
                _ => whatever!(
                    "{} must have the columns {}, {} and {}",
                    p,
                    COUNTRY_COLUMN,
                    PCODE_COLUMN,
                    NAME_COLUMN
                ),
            };
        let level_idx = col(LEVEL_COLUMN);

        let mut units: Vec<(String, String, String)> = Vec::new();
        for (idx, line_r) in rdr.records().enumerate() {
            let lineno = idx + 2;
            let line = line_r.context(CsvLineParseSnafu {
                path: p.clone(),
                lineno,
            })?;
            let get = |i: usize| line.get(i).unwrap_or("").trim().to_string();
            if get(country_idx).starts_with('#') {
                continue;
            }
            if let Some(level) = level_idx {
                if get(level) != "1" {
                    continue;
                }
            }
            let (iso3, pcode, name) = (get(country_idx), get(pcode_idx), get(name_idx));
            if iso3.is_empty() || pcode.is_empty() {
                debug!("AdminTable::load: line {}: incomplete unit", lineno);
                continue;
            }
            units.push((iso3, name, pcode));
        }
        AdminTable::new(&units, name_mappings)
    }

    /// The name of a unit in the lookup table.
    pub fn pcode_name(&self, pcode: &str) -> Option<&str> {
        self.names.get(pcode).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.values().map(|v| v.len()).sum()
    }
}

impl AdminResolver for AdminTable {
    fn get_pcode(&self, country_iso3: &str, name: &str) -> (Option<String>, MatchConfidence) {
        let iso3 = country_iso3.trim().to_uppercase();
        let normalised = normalise_name(name);
        if let Some(pcode) = self.mappings.get(&(iso3.clone(), normalised.clone())) {
            return (Some(pcode.clone()), MatchConfidence::Exact);
        }
        let units = match self.units.get(&iso3) {
            Some(u) => u,
            None => return (None, MatchConfidence::NoMatch),
        };
        if let Some(u) = units.iter().find(|u| u.name == name.trim()) {
            return (Some(u.pcode.clone()), MatchConfidence::Exact);
        }
        let candidates: Vec<&AdminUnit> = units
            .iter()
            .filter(|u| !normalised.is_empty() && u.normalised == normalised)
            .collect();
        match candidates.as_slice() {
            [u] => (Some(u.pcode.clone()), MatchConfidence::Normalised),
            [] => (None, MatchConfidence::NoMatch),
            _ => {
                warn!(
                    "get_pcode: {} {:?} matches several units, ignoring",
                    iso3, name
                );
                (None, MatchConfidence::NoMatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_CSV: &str = "\
Location,Admin Level,P-Code,Name
#country+code,#geo+admin_level,#adm1+code,#adm1+name
AFG,1,AF01,Kabul
AFG,1,AF02,Kapisa
AFG,2,AF0101,Kabul District
NPL,1,NP01,Koshi Province
CIV,1,CI01,Abidjan
CIV,1,CI02,#Lagunes
";

    fn table() -> AdminTable {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin1.csv");
        fs::write(&path, ADMIN_CSV).unwrap();
        let mappings = BTreeMap::from([(
            "NPL|Province No. 1".to_string(),
            "NP01".to_string(),
        )]);
        AdminTable::load(&path, &mappings).unwrap()
    }

    #[test]
    fn loads_level_one_units() {
        let t = table();
        assert_eq!(t.len(), 5);
        assert_eq!(t.pcode_name("CI02"), Some("#Lagunes"));
        assert_eq!(t.pcode_name("NP01"), Some("Koshi Province"));
        assert_eq!(t.pcode_name("AF0101"), None);
    }

    #[test]
    fn lookups() {
        let t = table();
        assert_eq!(
            t.get_pcode("AFG", "Kabul"),
            (Some("AF01".to_string()), MatchConfidence::Exact)
        );
        assert_eq!(
            t.get_pcode("afg", "KAPISA "),
            (Some("AF02".to_string()), MatchConfidence::Normalised)
        );
        assert_eq!(
            t.get_pcode("NPL", "Koshi"),
            (Some("NP01".to_string()), MatchConfidence::Normalised)
        );
        assert_eq!(
            t.get_pcode("NPL", "Province No. 1"),
            (Some("NP01".to_string()), MatchConfidence::Exact)
        );
        assert_eq!(t.get_pcode("AFG", "Atlantis"), (None, MatchConfidence::NoMatch));
        assert_eq!(t.get_pcode("ZZZ", "Kabul"), (None, MatchConfidence::NoMatch));
    }

    #[test]
    fn names() {
        assert_eq!(normalise_name("Koshi Province"), "koshi");
        assert_eq!(normalise_name("Sud-Ouest (Region)"), "sud ouest");
        assert_eq!(normalise_name("  "), "");
    }

    #[test]
    fn bad_mapping() {
        let mappings = BTreeMap::from([("Kabul".to_string(), "AF01".to_string())]);
        assert!(AdminTable::new(&[], &mappings).is_err());
    }
}

//! Loading the long-format source csv and pivoting it into one row per year.
//!
//! The source holds one observation per indicator, year and sex:
//!
//! ```text
//! INDICATOR,YEAR,SEX,RATE_PER_100
//! Stunting in children (under 5),2020,female,40.0
//! Stunting in children (under 5),2020,male,42.0
//! Stunting in children (under 5),2020,total,41.0
//! ```
//!
//! Only the rows of one indicator are kept, and each sex category is lifted
//! into its own column of a [`GenderTable`].

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::DuplicatePolicy;
use crate::error::StuntingError;
use crate::{COL_FEMALE, COL_MALE, COL_TOTAL, COL_YEAR};

pub const SRC_INDICATOR: &str = "INDICATOR";
pub const SRC_YEAR: &str = "YEAR";
pub const SRC_SEX: &str = "SEX";
pub const SRC_RATE: &str = "RATE_PER_100";
pub const SRC_COLUMNS: [&str; 4] = [SRC_INDICATOR, SRC_YEAR, SRC_SEX, SRC_RATE];

/// Cell values read as missing, the same set pandas recognizes by default.
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A kept row of the source csv, parsed only after the indicator matched.
#[derive(Debug, Deserialize)]
struct SourceRecord {
    #[serde(rename = "YEAR", deserialize_with = "na_or")]
    year: Option<i32>,
    #[serde(rename = "SEX")]
    sex: String,
    #[serde(rename = "RATE_PER_100", deserialize_with = "na_or")]
    rate: Option<f64>,
}

/// parses a cell, `None` for any of the [`NA_VALUES`]
fn na_or<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if NA_VALUES.contains(&raw) {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid value {:?}: {}", raw, e)))
}

/// The wide table: one row per year, one column per sex category.
/// `columns[name][i]` is the rate of `years[i]`, `None` when the source has no rate for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenderTable {
    pub years: Vec<i32>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl GenderTable {
    /// Reads the csv at `fin`, keeps the rows whose indicator is exactly `indicator`
    /// and pivots them by year.
    pub fn from_csv(
        fin: &Path,
        indicator: &str,
        duplicates: DuplicatePolicy,
    ) -> Result<GenderTable, StuntingError> {
        let file = File::open(fin).map_err(|e| StuntingError::DataLoad {
            path: fin.to_path_buf(),
            source: e.into(),
        })?;
        let table = GenderTable::from_reader(file, fin, indicator, duplicates)?;
        info!(
            "loaded {} year(s) with column(s) [{}] from {}",
            table.len(),
            table.column_names().join(", "),
            fin.display()
        );
        Ok(table)
    }

    /// Same as [`GenderTable::from_csv`] over any reader; `origin` only names the source in errors.
    pub fn from_reader<R: Read>(
        rdr: R,
        origin: &Path,
        indicator: &str,
        duplicates: DuplicatePolicy,
    ) -> Result<GenderTable, StuntingError> {
        let load_err = |source: csv::Error| StuntingError::DataLoad {
            path: origin.to_path_buf(),
            source,
        };
        let mut rdr = csv::Reader::from_reader(rdr);
        let headers = rdr.headers().map_err(load_err)?.clone();

        let missing: Vec<String> = SRC_COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| h == **c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(StuntingError::Schema {
                path: origin.to_path_buf(),
                missing,
            });
        }
        let indicator_idx = headers
            .iter()
            .position(|h| h == SRC_INDICATOR)
            .unwrap_or_default();

        // year -> column -> every rate found, in file order
        let mut cells: BTreeMap<i32, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
        let mut kept = 0usize;
        for result in rdr.records() {
            let record = result.map_err(load_err)?;
            if record.get(indicator_idx) != Some(indicator) {
                continue;
            }
            let row: SourceRecord = record.deserialize(Some(&headers)).map_err(load_err)?;
            let year = match row.year {
                Some(y) => y,
                None => {
                    let line = record.position().map(|p| p.line()).unwrap_or_default();
                    warn!("dropping row at line {} without a year", line);
                    continue;
                }
            };
            kept += 1;
            let rates = cells
                .entry(year)
                .or_default()
                .entry(column_label(&row.sex.trim().to_lowercase()))
                .or_default();
            // spellings like "NAN" still parse to a NaN float
            if let Some(rate) = row.rate.filter(|r| !r.is_nan()) {
                rates.push(rate);
            }
        }
        debug!("{} row(s) matched indicator '{}'", kept, indicator);

        GenderTable::pivot(cells, duplicates)
    }

    fn pivot(
        cells: BTreeMap<i32, BTreeMap<String, Vec<f64>>>,
        duplicates: DuplicatePolicy,
    ) -> Result<GenderTable, StuntingError> {
        let mut table = GenderTable::default();
        for by_column in cells.values() {
            for name in by_column.keys() {
                table
                    .columns
                    .entry(name.clone())
                    .or_insert_with(|| Vec::with_capacity(cells.len()));
            }
        }
        for (&year, by_column) in cells.iter() {
            table.years.push(year);
            for (name, values) in table.columns.iter_mut() {
                let rates = by_column.get(name).map(|r| r.as_slice()).unwrap_or_default();
                values.push(resolve(year, name, rates, duplicates)?);
            }
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }
}

/// The wide column name of a lower-case sex category.
pub fn column_label(category: &str) -> String {
    match category {
        "female" => COL_FEMALE.to_string(),
        "male" => COL_MALE.to_string(),
        "total" => COL_TOTAL.to_string(),
        other => other.to_string(),
    }
}

fn resolve(
    year: i32,
    column: &str,
    rates: &[f64],
    duplicates: DuplicatePolicy,
) -> Result<Option<f64>, StuntingError> {
    match (rates, duplicates) {
        ([], _) => Ok(None),
        ([rate], _) => Ok(Some(*rate)),
        (_, DuplicatePolicy::Reject) => Err(StuntingError::Reshape {
            year,
            category: column.to_string(),
            count: rates.len(),
        }),
        (_, DuplicatePolicy::Mean) => Ok(Some(rates.iter().sum::<f64>() / rates.len() as f64)),
        (_, DuplicatePolicy::Last) => Ok(rates.last().copied()),
    }
}

impl std::fmt::Display for GenderTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", COL_YEAR)?;
        for name in self.columns.keys() {
            write!(f, ",{}", name)?;
        }
        writeln!(f)?;
        for (i, year) in self.years.iter().enumerate() {
            write!(f, "{}", year)?;
            for values in self.columns.values() {
                match values[i] {
                    Some(v) => write!(f, ",{}", v)?,
                    None => write!(f, ",")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

use std::path::PathBuf;
use tracing::{debug, info};
pub mod config;
pub mod error;
pub mod load;
pub mod plot;
pub mod render;

pub use config::{ChartStyle, Config, DuplicatePolicy, SeriesStyle};
pub use error::StuntingError;
pub use load::GenderTable;
pub use render::render;

pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// The only indicator kept from the source, matched exactly (case included).
pub const STUNTING_INDICATOR: &str = "Stunting in children (under 5)";

pub const COL_YEAR: &str = "Year";
pub const COL_FEMALE: &str = "Female";
pub const COL_MALE: &str = "Male";
pub const COL_TOTAL: &str = "Total";

/// Loads and reshapes `config.data_path`, then renders it to `config.output_path`.
/// Returns the path written; errors of either step are returned unchanged.
pub fn run(config: &Config) -> Result<PathBuf, StuntingError> {
    info!(
        "reading {} for indicator '{}'",
        config.data_path.display(),
        config.indicator
    );
    let table = GenderTable::from_csv(&config.data_path, &config.indicator, config.duplicates)?;
    debug!("reshaped table:\n{}", table);
    render(&table, config)?;
    Ok(config.output_path.clone())
}

/// Smallest and largest element of the slice, `None` when it is empty.
pub fn min_and_max<T: std::cmp::PartialOrd + Copy>(s: &[T]) -> Option<(T, T)> {
    let mut self_iter = s.iter();
    let (mut min, mut max) = match self_iter.next() {
        Some(v) => (*v, *v),
        None => return None,
    };
    for es in self_iter {
        if *es > max {
            max = *es
        }
        if *es < min {
            min = *es
        }
    }
    Some((min, max))
}

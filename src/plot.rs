use super::VERSION;
use crate::config::Config;
use clap::App;
use tracing_subscriber::EnvFilter;

/// Takes the CLI arguments of the plotting app.
/// The run is fixed: only `--help` and `--version` are understood.
pub fn parse_cli() -> Config {
    App::new("stunting_plot")
        .version(VERSION.unwrap_or("unknown"))
        .about("cli app to plot the stunting (under five) rates by gender")
        .after_help(
            "Reads data/stunting-under-five_rows.csv and writes \
             analytics/outputs/stunting_gender_trend.png, relative to the working directory.",
        )
        .get_matches();
    Config::default()
}

/// Log filter of the app; fixed, the environment is not consulted.
pub fn log_filter() -> EnvFilter {
    EnvFilter::new("info")
}

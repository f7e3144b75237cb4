use anyhow::Result;
use stunting_trend::plot::{log_filter, parse_cli};
use stunting_trend::run;
use tracing::error;
use tracing_subscriber::fmt;

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let config = parse_cli();
    match run(&config) {
        Ok(fout) => {
            println!("Plot saved to {}", fout.display());
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}

use std::path::PathBuf;
use std::process::ExitCode;

use device_simulator_template::{config, device_simulator, template, writer};
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Template(#[from] template::Error),

    #[error(transparent)]
    Writer(#[from] writer::Error),
}

fn main() -> ExitCode {
    // stdout carries the template, so diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    return match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "template generation failed");
            ExitCode::FAILURE
        }
    };
}

fn run() -> Result<(), Error> {
    let config_path = PathBuf::from("./template-config.yaml");
    let config = config::load(&config_path)?;

    let template = device_simulator::build()?;
    let document = template.serialize()?;
    writer::write(&config, &document)?;

    return Ok(());
}

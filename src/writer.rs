use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;

use crate::config::{Config, Format};
use crate::template::Document;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Rendering error: {0}")]
    RenderingError(String),

    #[error("Unable to write {0}: {1}")]
    WriteError(String, String),
}

pub fn write(config: &Config, document: &Document) -> Result<(), Error> {
    let contents = render(config.format, document)?;

    return match &config.output {
        Some(output) => write_file(&output.location, &contents),
        None => write_stdout(&contents),
    };
}

/// Renders the document, newline-terminated. JSON is indented by four spaces.
pub fn render(format: Format, document: &Document) -> Result<String, Error> {
    let mut contents = match format {
        Format::Json => render_json(document)?,
        Format::Yaml => match serde_yaml::to_string(document) {
            Ok(contents) => contents,
            Err(error) => return Err(Error::RenderingError(error.to_string())),
        },
    };

    if !contents.ends_with('\n') {
        contents.push('\n');
    }

    return Ok(contents);
}

fn render_json(document: &Document) -> Result<String, Error> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);

    match document.serialize(&mut serializer) {
        Ok(_) => (),
        Err(error) => return Err(Error::RenderingError(error.to_string())),
    }

    return match String::from_utf8(buffer) {
        Ok(contents) => Ok(contents),
        Err(error) => Err(Error::RenderingError(error.to_string())),
    };
}

// Written to a temporary sibling, then renamed over the target.
fn write_file(path: &PathBuf, contents: &str) -> Result<(), Error> {
    let write_error = |error: String| Error::WriteError(path.display().to_string(), error);

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = match NamedTempFile::new_in(directory) {
        Ok(file) => file,
        Err(error) => return Err(write_error(error.to_string())),
    };
    match file.write_all(contents.as_bytes()).and_then(|_| file.flush()) {
        Ok(_) => (),
        Err(error) => return Err(write_error(error.to_string())),
    }
    match file.persist(path) {
        Ok(_) => (),
        Err(error) => return Err(write_error(error.error.to_string())),
    }

    tracing::info!(location = %path.display(), "template written");
    return Ok(());
}

fn write_stdout(contents: &str) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    return match handle.write_all(contents.as_bytes()).and_then(|_| handle.flush()) {
        Ok(_) => Ok(()),
        Err(error) => Err(Error::WriteError(
            String::from("standard output"),
            error.to_string(),
        )),
    };
}

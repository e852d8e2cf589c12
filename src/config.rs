use serde::{Deserialize, Serialize};
use std::{fs, io, path::PathBuf};
use validator::{Validate, ValidationError};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OutputFile {
    pub location: PathBuf,
}

/// Where and how the template is written. Everything is optional; an absent
/// `output` means standard output.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_output_extension"))]
pub struct Config {
    #[serde(default)]
    pub format: Format,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFile>,
}

pub fn parse(path: &PathBuf) -> Result<Config, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let config: Config = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    match config.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(config);
}

/// Like [`parse`], but a missing file falls back to the defaults.
pub fn load(path: &PathBuf) -> Result<Config, Error> {
    return match parse(path) {
        Err(Error::FileNotFound(location)) => {
            tracing::debug!(%location, "no generator config, using defaults");
            Ok(Config::default())
        }
        result => result,
    };
}

fn validate_output_extension(config: &Config) -> Result<(), ValidationError> {
    let output = match &config.output {
        Some(output) => output,
        None => return Ok(()),
    };

    let file_extension = match output.location.extension() {
        Some(extension) => extension,
        None => {
            return Err(ValidationError::new(
                "Unable to parse the extension of the output file location",
            ))
        }
    };

    let matches = match config.format {
        Format::Json => file_extension == "json",
        Format::Yaml => file_extension == "yaml" || file_extension == "yml",
    };
    if !matches {
        return Err(ValidationError::new(
            "The output file extension has to match the format (`.json`, `.yaml` or `.yml`)",
        ));
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    use super::load;
    use super::parse;
    use super::Config;
    use super::Error;
    use super::Format;
    use super::OutputFile;
    use tempfile::tempdir;

    #[test]
    fn file_does_not_exist() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::FileNotFound(_) => {}
            _ => panic!("Expected `FileNotFound` error"),
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let config = load(&file_path).unwrap();
        assert_eq!(Format::Json, config.format);
        assert_eq!(true, config.output.is_none());
    }

    #[test]
    fn file_wrong_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "Not yaml").unwrap();

        let result = load(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "format: json\nindent: 2").unwrap();

        let result = parse(&file_path);
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn unknown_output_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "output:\n  location: a.json\n  extra: 1").unwrap();

        let result = parse(&file_path);
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn output_extension_must_match_format() {
        let config = Config {
            format: Format::Yaml,
            output: Some(OutputFile {
                location: PathBuf::from("template.json"),
            }),
        };
        let config_contents = serde_yaml::to_string(&config).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config_contents).unwrap();

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn parses_the_config() {
        let config = Config {
            format: Format::Yaml,
            output: Some(OutputFile {
                location: PathBuf::from("device-simulator.yml"),
            }),
        };
        let config_contents = serde_yaml::to_string(&config).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("template-config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config_contents).unwrap();

        let result = parse(&file_path);
        assert_eq!(false, result.is_err());
        let parsed = result.unwrap();
        assert_eq!(Format::Yaml, parsed.format);
        assert_eq!(
            PathBuf::from("device-simulator.yml"),
            parsed.output.unwrap().location
        );
    }
}

use eks_stacks_synth::environment::DEFAULT_REGION;
use eks_stacks_synth::Environment;
use eyre::WrapErr;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "eks-stacks.toml";
const DEFAULT_OUTPUT_DIR: &str = "cdk.out";

/// Settings of a run, after the file and the environment variables are merged
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub environment: Environment,

    /// Cloud assembly directory
    pub output_dir: PathBuf,
}

/// FileConfig is the structure of eks-stacks.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    /// [environment]
    /// account = "123456789012"
    /// region = "us-east-1"
    #[serde(default)]
    environment: EnvironmentSection,

    /// [output]
    /// dir = "cdk.out"
    #[serde(default)]
    output: OutputSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentSection {
    account: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    dir: Option<PathBuf>,
}

impl FileConfig {
    fn from_path(path: &Path, required: bool) -> eyre::Result<Self> {
        let toml_string = match std::fs::read_to_string(path) {
            Ok(text) => text,

            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No {} found, using defaults", path.display());
                return Ok(FileConfig::default());
            }

            Err(e) => {
                return Err(e).wrap_err(format!("Failed to read {}", path.display()));
            }
        };

        toml::from_str(&toml_string).wrap_err(format!("Failed to parse {}", path.display()))
    }
}

impl Config {
    /// Load the config file and apply CDK_DEFAULT_* overrides
    ///
    /// An explicitly passed file must exist, the default one is optional.
    pub fn load(path: Option<&Path>) -> eyre::Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    fn load_with(path: Option<&Path>, var: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let file = match path {
            Some(path) => FileConfig::from_path(path, true)?,
            None => FileConfig::from_path(Path::new(CONFIG_FILE), false)?,
        };

        let account = var("CDK_DEFAULT_ACCOUNT")
            .filter(|a| !a.is_empty())
            .or(file.environment.account);

        let region = var("CDK_DEFAULT_REGION")
            .filter(|r| !r.is_empty())
            .or(file.environment.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Ok(Config {
            environment: Environment::new(account.as_deref(), &region),
            output_dir: file
                .output
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    fn file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn full_file_is_read() {
        let file = file(
            r#"
            [environment]
            account = "575108957879"
            region = "eu-west-1"

            [output]
            dir = "out/assembly"
            "#,
        );

        let config = Config::load_with(Some(file.path()), no_vars).unwrap();

        assert_eq!(
            config,
            Config {
                environment: Environment::new(Some("575108957879"), "eu-west-1"),
                output_dir: PathBuf::from("out/assembly"),
            }
        );
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = file("");
        let config = Config::load_with(Some(file.path()), no_vars).unwrap();

        assert_eq!(config.environment, Environment::default());
        assert_eq!(config.output_dir, PathBuf::from("cdk.out"));
    }

    #[test]
    fn environment_variables_win_over_the_file() {
        let file = file("[environment]\naccount = \"111111111111\"\nregion = \"eu-west-1\"\n");

        let config = Config::load_with(Some(file.path()), |name| match name {
            "CDK_DEFAULT_ACCOUNT" => Some("222222222222".into()),
            "CDK_DEFAULT_REGION" => Some("ap-south-1".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.environment.account.as_deref(), Some("222222222222"));
        assert_eq!(config.environment.region, "ap-south-1");
    }

    #[test]
    fn malformed_file_names_the_file() {
        let file = file("[environment\nregion = 1");
        let error = Config::load_with(Some(file.path()), no_vars).unwrap_err();

        assert!(error.to_string().contains("Failed to parse"));
        assert!(error.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = file("[output]\ndirectory = \"x\"\n");
        assert!(Config::load_with(Some(file.path()), no_vars).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        assert!(Config::load_with(Some(&path), no_vars).is_err());
    }
}

use crate::config::types::{Config, RunPlan};
use crate::config::validation::{validate, validate_plan};
use crate::identifier::Place;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use furlong::config::load_config;
///
/// let config = load_config(Path::new("furlong.toml")).unwrap();
/// println!("Batch size: {}", config.crawler.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded in snapshot metadata so results can be traced back to the
/// settings that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
///
/// Without a path the built-in defaults are used and the hash is that of
/// an empty document.
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    match path {
        Some(path) => {
            let config = load_config(path)?;
            let hash = compute_config_hash(path)?;
            Ok((config, hash))
        }
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok((config, hash_content("")))
        }
    }
}

/// Parses place codes, returning them sorted and de-duplicated
///
/// An empty list means every place.
pub fn parse_places<S: AsRef<str>>(codes: &[S]) -> Result<Vec<Place>, ConfigError> {
    if codes.is_empty() {
        return Ok(Place::ALL.to_vec());
    }

    let mut places = codes
        .iter()
        .map(|code| {
            let code = code.as_ref();
            Place::from_code(code).ok_or_else(|| ConfigError::InvalidPlace(code.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    places.sort();
    places.dedup();
    Ok(places)
}

/// Builds and validates a run plan from raw command-line values
pub fn build_run_plan<S: AsRef<str>>(
    year: u16,
    places: &[S],
    max_items: Option<u32>,
    reset_places: &[S],
) -> Result<RunPlan, ConfigError> {
    let plan = RunPlan {
        year,
        places: parse_places(places)?,
        max_items,
        reset_places: if reset_places.is_empty() {
            Vec::new()
        } else {
            parse_places(reset_places)?
        },
    };

    validate_plan(&plan)?;
    Ok(plan)
}

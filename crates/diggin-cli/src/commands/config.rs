use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use diggin_etl::{config, Config};
use toml_edit::DocumentMut;

/// Settings that are absent from the defaults because they have none.
const OPTIONAL_KEYS: [&str; 1] = ["lastfm_api_key"];

/// Show the current effective configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load()?;
    let config_path = config::config_file_path();

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!(
        "  lastfm_api_key: {}",
        if config.require_lastfm_api_key().is_ok() { "<set>" } else { "<not set>" }
    );
    let table = effective_table(&config)?;
    for key in leaf_keys(&table) {
        if let Some(value) = lookup(&table, &key) {
            println!("  {}: {}", key, display_value(value));
        }
    }
    println!("  effective tags: {}", config.tags().join(", "));

    println!("\nPriority: ENV vars (DIGGIN_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value, or the whole file when `key` is `None`.
pub fn get_config(key: Option<String>) -> Result<()> {
    let Some(key) = key else {
        let config_path = config::config_file_path();
        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'diggin config init' to create it.");
        }
        return Ok(());
    };

    let config = Config::load()?;
    println!("{}", get_value(&config, &key)?);
    Ok(())
}

/// Set a config value in the config file, creating the file if needed.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();
    config::ensure_config_file()?;

    set_value_in(&config_path, key, value)?;

    println!("✓ Updated {} = {}", key, value);
    println!("  in {}", config_path.display());
    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nSet your Last.fm API key with 'diggin config set lastfm_api_key <key>'.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}

fn effective_table(config: &Config) -> Result<toml::Table> {
    match toml::Value::try_from(config).context("Failed to serialize configuration")? {
        toml::Value::Table(table) => Ok(table),
        other => bail!("Configuration serialized to a {}", other.type_str()),
    }
}

/// Dotted paths of every non-table value.
fn leaf_keys(table: &toml::Table) -> Vec<String> {
    let mut keys = Vec::new();
    for (name, value) in table {
        match value {
            toml::Value::Table(nested) => {
                keys.extend(leaf_keys(nested).into_iter().map(|k| format!("{name}.{k}")));
            }
            _ => keys.push(name.clone()),
        }
    }
    keys
}

fn lookup<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let mut parts = key.split('.');
    let mut current = table.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn display_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    let mut valid: Vec<String> = OPTIONAL_KEYS.iter().map(|k| (*k).to_string()).collect();
    if let Ok(defaults) = effective_table(&Config::default()) {
        valid.extend(leaf_keys(&defaults));
    }
    anyhow!(
        "Unknown config key: {}\n\nValid keys: {}",
        key,
        valid.join(", ")
    )
}

fn get_value(config: &Config, key: &str) -> Result<String> {
    if key == "lastfm_api_key" {
        return Ok(config
            .lastfm_api_key
            .clone()
            .unwrap_or_else(|| String::from("<not set>")));
    }
    let table = effective_table(config)?;
    match lookup(&table, key) {
        Some(toml::Value::Table(_)) | None => Err(unknown_key(key)),
        Some(value) => Ok(display_value(value)),
    }
}

/// Convert `raw` to the TOML type of `template`.
fn typed_value(key: &str, template: &toml::Value, raw: &str) -> Result<toml_edit::Value> {
    match template {
        toml::Value::String(_) => Ok(raw.into()),
        toml::Value::Integer(_) => {
            let n: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} expects a whole number, got {raw:?}"))?;
            Ok(n.into())
        }
        toml::Value::Array(_) => {
            let items: toml_edit::Array = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            Ok(toml_edit::Value::Array(items))
        }
        other => bail!("{key} has unsupported type {}", other.type_str()),
    }
}

/// Write `key = raw` into the TOML file at `path`, keeping comments and
/// formatting of everything else.
fn set_value_in(path: &Path, key: &str, raw: &str) -> Result<()> {
    let template = if OPTIONAL_KEYS.contains(&key) {
        toml::Value::String(String::new())
    } else {
        let defaults = effective_table(&Config::default())?;
        match lookup(&defaults, key) {
            Some(toml::Value::Table(_)) | None => return Err(unknown_key(key)),
            Some(value) => value.clone(),
        }
    };
    let value = typed_value(key, &template, raw)?;

    let contents = if path.exists() {
        std::fs::read_to_string(path).context("Failed to read config file")?
    } else {
        String::new()
    };
    let mut doc: DocumentMut = contents.parse().context("Failed to parse config file")?;

    let (parents, leaf) = match key.rsplit_once('.') {
        Some((parents, leaf)) => (parents.split('.').collect::<Vec<_>>(), leaf),
        None => (Vec::new(), key),
    };
    let mut table = doc.as_table_mut();
    for part in parents {
        table = table
            .entry(part)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .ok_or_else(|| anyhow!("`{part}` is not a table in {}", path.display()))?;
    }
    table[leaf] = toml_edit::value(value);

    let updated = doc.to_string();
    toml::from_str::<Config>(&updated).with_context(|| format!("Invalid value for {key}"))?;
    std::fs::write(path, updated).context("Failed to write config file")?;

    Ok(())
}

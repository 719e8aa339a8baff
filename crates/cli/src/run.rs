//! `otd run` / `otd validate`: config-driven delivery reconciliation.

use std::path::{Path, PathBuf};

use otd_recon::{load_input, PipelineConfig, PipelineInput, PipelineResult, Selection};

use crate::exit_codes::{EXIT_DATA_QUALITY, EXIT_RUNTIME};
use crate::summary::print_run_summary;
use crate::{CliError, SelectionArgs};

impl SelectionArgs {
    pub fn to_selection(&self) -> Selection {
        Selection::all()
            .with_years(self.years.iter().copied())
            .with_suppliers(self.suppliers.iter().cloned())
    }
}

/// Read and validate the config file.
pub fn read_config(config_path: &Path) -> Result<PipelineConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_RUNTIME, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    Ok(PipelineConfig::from_toml(&config_str)?)
}

/// Load both exports, resolving file paths relative to the config file's directory.
pub fn load_sources(config_path: &Path, config: &PipelineConfig) -> Result<PipelineInput, CliError> {
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(load_input(config, base_dir)?)
}

pub fn cmd_run(
    config_path: PathBuf,
    selection: SelectionArgs,
    json_output: bool,
    output_file: Option<PathBuf>,
    strict: bool,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let input = load_sources(&config_path, &config)?;
    let result = otd_recon::run(&config, &input, &selection.to_selection())?;

    write_json(&result, json_output, output_file.as_deref())?;
    print_run_summary(&result);

    if strict && !result.quality.is_clean() {
        return Err(CliError::new(
            EXIT_DATA_QUALITY,
            format!("{} data-quality issue(s) found (--strict)", result.quality.issue_count()),
        ));
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "{}: valid ({} + {}, analysis {} x {} per {}, top {})",
        config.name,
        config.orders.file,
        config.receipts.file,
        config.analysis.rows,
        config.analysis.columns,
        crate::summary::granularity_label(config.analysis.granularity),
        config.analysis.top_n,
    );
    Ok(())
}

fn write_json(result: &PipelineResult, json_output: bool, output_file: Option<&Path>) -> Result<(), CliError> {
    if !json_output && output_file.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(result)
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{json_str}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_args_map_to_selection() {
        let args = SelectionArgs {
            years: vec![2024, 2023, 2024],
            suppliers: vec!["Acme".into()],
        };
        let selection = args.to_selection();
        assert_eq!(selection.years.iter().copied().collect::<Vec<_>>(), vec![2023, 2024]);
        assert!(selection.suppliers.contains("Acme"));
        assert_eq!(SelectionArgs::default().to_selection(), Selection::all());
    }

    #[test]
    fn unreadable_config_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(&dir.path().join("missing.otd.toml")).unwrap_err();
        assert_eq!(err.code, EXIT_RUNTIME);
        assert!(err.message.contains("missing.otd.toml"));
    }

    #[test]
    fn invalid_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.otd.toml");
        std::fs::write(&path, "name = \"x\"\n[orders]\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_INVALID_CONFIG);
    }
}

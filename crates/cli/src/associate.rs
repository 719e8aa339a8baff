//! `otd associate`: contingency analysis with command-line dimension overrides.

use std::path::PathBuf;

use otd_recon::config::AnalysisConfig;
use otd_recon::{AssociationOutcome, Dimension, Granularity};

use crate::exit_codes::{EXIT_INSUFFICIENT_DATA, EXIT_RUNTIME};
use crate::run::{load_sources, read_config};
use crate::summary::print_association;
use crate::{CliError, SelectionArgs};

/// Command-line values that replace the config's `[analysis]` settings.
#[derive(Debug, Default)]
pub struct Overrides {
    pub rows: Option<Dimension>,
    pub columns: Option<Dimension>,
    pub top_n: Option<usize>,
    pub granularity: Option<Granularity>,
    pub yates: bool,
}

impl Overrides {
    fn apply(self, analysis: &mut AnalysisConfig) -> Result<(), CliError> {
        if let Some(rows) = self.rows {
            analysis.rows = rows;
        }
        if let Some(columns) = self.columns {
            analysis.columns = columns;
        }
        if let Some(top_n) = self.top_n {
            analysis.top_n = top_n;
        }
        if let Some(granularity) = self.granularity {
            analysis.granularity = granularity;
        }
        analysis.yates_correction |= self.yates;

        analysis
            .validate()
            .map_err(|e| CliError::args(e.to_string()).with_hint("pick two different dimensions and --top-n >= 1"))
    }
}

pub fn cmd_associate(
    config_path: PathBuf,
    overrides: Overrides,
    selection: SelectionArgs,
    json_output: bool,
) -> Result<(), CliError> {
    let mut config = read_config(&config_path)?;
    overrides.apply(&mut config.analysis)?;

    let input = load_sources(&config_path, &config)?;
    let result = otd_recon::run(&config, &input, &selection.to_selection())?;
    let report = &result.association;

    if json_output {
        let json_str = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        print_association(report);
    }

    if let AssociationOutcome::InsufficientData { detail } = &report.outcome {
        return Err(CliError::new(
            EXIT_INSUFFICIENT_DATA,
            format!("association {} x {} not tested: {detail}", report.rows, report.columns),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::EXIT_USAGE;

    #[test]
    fn overrides_replace_configured_analysis() {
        let mut analysis = AnalysisConfig::default();
        Overrides {
            rows: Some(Dimension::Supplier),
            columns: Some(Dimension::DelayCategory),
            top_n: Some(3),
            granularity: Some(Granularity::Line),
            yates: true,
        }
        .apply(&mut analysis)
        .unwrap();

        assert_eq!(analysis.rows, Dimension::Supplier);
        assert_eq!(analysis.columns, Dimension::DelayCategory);
        assert_eq!(analysis.top_n, 3);
        assert_eq!(analysis.granularity, Granularity::Line);
        assert!(analysis.yates_correction);
    }

    #[test]
    fn no_overrides_keeps_config() {
        let mut analysis = AnalysisConfig::default();
        Overrides::default().apply(&mut analysis).unwrap();
        assert_eq!(analysis.rows, Dimension::ResponsibleParty);
        assert_eq!(analysis.columns, Dimension::Status);
        assert_eq!(analysis.top_n, 5);
    }

    #[test]
    fn same_dimension_twice_is_usage_error() {
        let mut analysis = AnalysisConfig::default();
        let err = Overrides {
            columns: Some(Dimension::ResponsibleParty),
            ..Default::default()
        }
        .apply(&mut analysis)
        .unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.is_some());
    }
}

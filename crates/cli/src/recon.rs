//! `stockrecon run|validate|roles`: count reconciliation from the command line.

use std::path::{Path, PathBuf};

use serde::Serialize;
use stockrecon_recon::{ReconConfig, ReconResult};

use crate::exit_codes::{recon_exit_code, EXIT_RECON_RUNTIME, EXIT_RECON_VARIANCE};
use crate::sheet::{load_table, SheetOptions};
use crate::CliError;

/// Arguments for `stockrecon run`, flattened out of the clap subcommand.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub detail: PathBuf,
    pub external: PathBuf,
    pub config: Option<PathBuf>,
    pub detail_sheet: SheetOptions,
    pub external_sheet: SheetOptions,
    pub json: bool,
    /// `Some(empty)` means "write to the default timestamped file".
    pub output: Option<PathBuf>,
    pub fail_on_variance: bool,
}

/// JSON document written by `run`.
#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    generated_at: String,
    version: &'static str,
    config: &'a str,
    detail: String,
    external: String,
    result: &'a ReconResult,
}

fn engine_err(err: stockrecon_recon::ReconError) -> CliError {
    let code = recon_exit_code(&err);
    let hint = if err.is_schema() {
        Some("run `stockrecon roles` to see the recognised column names".to_string())
    } else {
        None
    };
    CliError { code, message: err.to_string(), hint }
}

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_RECON_RUNTIME, format!("cannot read config: {e}"))
    })?;
    ReconConfig::from_toml(&config_str).map_err(engine_err)
}

/// `Reconciled_YYYYMMDD_HHMMSS.json` in the current directory.
pub fn default_output_name(now: chrono::DateTime<chrono::Local>) -> PathBuf {
    PathBuf::from(format!("Reconciled_{}.json", now.format("%Y%m%d_%H%M%S")))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    let detail = load_table(&args.detail, &args.detail_sheet)?;
    let external = load_table(&args.external, &args.external_sheet)?;

    let result = stockrecon_recon::reconcile(&config, &detail, &external).map_err(engine_err)?;

    let now = chrono::Local::now();
    let output = RunOutput {
        generated_at: now.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        config: &config.name,
        detail: args.detail.display().to_string(),
        external: args.external.display().to_string(),
        result: &result,
    };
    let json_str = serde_json::to_string_pretty(&output)
        .map_err(|e| CliError::new(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(path) = &args.output {
        let path = if path.as_os_str().is_empty() {
            default_output_name(now)
        } else {
            path.clone()
        };
        std::fs::write(&path, &json_str).map_err(|e| {
            CliError::new(EXIT_RECON_RUNTIME, format!("cannot write {}: {e}", path.display()))
        })?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    print_summary(&result);

    if args.fail_on_variance && !result.is_clean() {
        return Err(CliError::new(EXIT_RECON_VARIANCE, "variance found"));
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    eprintln!("ok: {} ('{}')", config_path.display(), config.name);
    Ok(())
}

pub fn cmd_roles() -> Result<(), CliError> {
    let toml_str = ReconConfig::default().to_toml().map_err(engine_err)?;
    print!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Human summary
// ---------------------------------------------------------------------------

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "{} recon: {} rows, {} previously received, {} ready to receive, {} remaining",
        result.mode, s.total_rows, s.previously_received, s.ready_to_receive, s.remaining,
    );
    eprintln!(
        "quantities: internal {}, external {}, variance {}",
        s.internal_quantity, s.external_quantity, s.variance,
    );
    eprintln!(
        "keys: {} total, {} reconciled, {} with variance ({} not counted, {} not on hand)",
        s.keys_total,
        s.keys_reconciled,
        s.keys_with_variance,
        s.keys_missing_externally,
        s.keys_missing_internally,
    );
    if s.unmatched > 0 {
        eprintln!("unmatched: {} keys, {} units", s.unmatched, s.unmatched_quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_output_name_is_timestamped() {
        let now = chrono::Local.with_ymd_and_hms(2026, 3, 2, 14, 5, 9).unwrap();
        assert_eq!(
            default_output_name(now),
            PathBuf::from("Reconciled_20260302_140509.json")
        );
    }

    #[test]
    fn missing_config_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.name, "default");
    }

    #[test]
    fn invalid_config_maps_to_config_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[detail.primary_key]\nexact = 3\n").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_RECON_INVALID_CONFIG);
    }

    #[test]
    fn schema_error_carries_hint() {
        let err = engine_err(stockrecon_recon::ReconError::UnexpectedShape {
            table: "external".into(),
            columns: 5,
        });
        assert_eq!(err.code, crate::exit_codes::EXIT_RECON_SCHEMA);
        assert!(err.hint.unwrap().contains("stockrecon roles"));
    }
}

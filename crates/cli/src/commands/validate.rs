//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    site_id: String,
    zone: String,
    camera_timeout_ms: u64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    site_id: blueprint.site.id.clone(),
                    zone: blueprint.site.zone.clone(),
                    camera_timeout_ms: blueprint.correlator.camera_timeout_ms,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::SiteBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    // Short timeouts leave little room for camera round trips
    if blueprint.correlator.camera_timeout_ms < 500 {
        warnings.push(format!(
            "correlator.camera_timeout_ms = {} is very short - most passes will time out",
            blueprint.correlator.camera_timeout_ms
        ));
    }

    // Heavy fault injection makes matched events rare
    if blueprint.simulation.camera_drop_probability > 0.5 {
        warnings.push(format!(
            "simulation.camera_drop_probability = {} - over half the camera responses will be dropped",
            blueprint.simulation.camera_drop_probability
        ));
    }

    if blueprint.simulation.camera_latency_ms >= blueprint.correlator.camera_timeout_ms {
        warnings.push(
            "simulation.camera_latency_ms >= correlator.camera_timeout_ms - every pass will time out"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Site: {}", summary.site_id);
            println!("  Zone: {}", summary.zone);
            println!("  Camera timeout: {} ms", summary.camera_timeout_ms);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_for(path: std::path::PathBuf) -> ValidateArgs {
        ValidateArgs {
            config: path,
            json: false,
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
            [site]
            id = "site-001"
            zone = "nb-lane-1"

            [[sinks]]
            name = "log"
            sink_type = "log"
            "#
        )
        .unwrap();

        let result = validate_config(&args_for(file.path().to_path_buf()));
        assert!(result.valid, "error: {:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.site_id, "site-001");
        assert_eq!(summary.sink_count, 1);
    }

    #[test]
    fn test_validate_missing_file() {
        let result = validate_config(&args_for("/nonexistent/config.toml".into()));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_short_timeout_warns() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
            [site]
            id = "site-001"
            zone = "nb-lane-1"

            [correlator]
            camera_timeout_ms = 100
            max_pending = 500

            [[sinks]]
            name = "log"
            sink_type = "log"
            "#
        )
        .unwrap();

        let result = validate_config(&args_for(file.path().to_path_buf()));
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("camera_timeout_ms")));
        // Default mock latency (300 ms) exceeds the 100 ms deadline.
        assert!(warnings.iter().any(|w| w.contains("camera_latency_ms")));
    }
}

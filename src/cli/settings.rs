//! Remote settings commands

use colored::Colorize;
use tabled::Tabled;

use parishimg::error::Result;
use parishimg::settings::{ImageBackendConfig, keys};

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::output::{json::format_json, table::format_table};

#[derive(Tabled)]
struct SettingDisplay {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Values shown for credential keys are masked except for the folder
fn display_rows(config: &ImageBackendConfig) -> Vec<SettingDisplay> {
    config
        .to_rows()
        .into_iter()
        .map(|row| {
            let value = if row.key == keys::PRIMARY_API_KEY && !row.value.is_empty() {
                mask(&row.value)
            } else {
                row.value
            };
            SettingDisplay {
                key: row.key,
                value,
            }
        })
        .collect()
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}…", visible)
}

fn print_config(config: &ImageBackendConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", format_json(config)?),
        OutputFormat::Table => println!("{}", format_table(&display_rows(config))),
        OutputFormat::Pretty => {
            let primary = if config.is_primary_configured() {
                format!("{} ({})", "enabled".green(), config.primary_name)
            } else if config.primary_enabled {
                "enabled but missing cloud name".yellow().to_string()
            } else {
                "disabled".dimmed().to_string()
            };
            let fallback = if config.fallback_enabled {
                "enabled".green().to_string()
            } else {
                "disabled".red().to_string()
            };

            println!("Primary CDN:      {}", primary);
            println!("Fallback storage: {}", fallback);
            println!("Upload target:    {}", config.upload_target.as_str());
            println!();
            println!("{}", format_table(&display_rows(config)));
        }
    }
    Ok(())
}

/// Show the current image backend settings
pub async fn show(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let config = ctx.delivery.resolver().get().await;
    print_config(&config, ctx.format)
}

/// Set one setting and invalidate the cached config
pub async fn set(opts: &GlobalOptions, key: &str, value: &str) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    ctx.delivery.resolver().set(key, value).await?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "key": key, "value": value, "success": true });
            println!("{}", format_json(&json)?);
        }
        _ => println!("{} {} = {}", "✓".green(), key.bold(), value),
    }
    Ok(())
}

/// Drop the cached config and show what the store returns now
pub async fn invalidate(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let resolver = ctx.delivery.resolver();

    resolver.get().await;
    resolver.invalidate();
    let config = resolver.get().await;

    if ctx.format == OutputFormat::Pretty {
        println!("{} Settings cache invalidated and re-fetched\n", "✓".green());
    }
    print_config(&config, ctx.format)
}

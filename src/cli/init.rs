//! Init command implementation

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use parishimg::client::{SettingsStore, SupabaseClient};
use parishimg::config::{Config, jwt_role};
use parishimg::error::Result;
use parishimg::settings::{ImageBackendConfig, keys};

use crate::cli::args::GlobalOptions;

/// Run the init command
///
/// Prompts for the Supabase project, checks that the settings table answers,
/// and writes the local config file.
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}", "Welcome to parishimg!".bold().green());
    println!("Let's connect to the parish site's Supabase project.\n");

    let mut config = Config::load_at(opts.config_ref()).unwrap_or_default();
    let theme = ColorfulTheme::default();

    let url: String = Input::with_theme(&theme)
        .with_prompt("Supabase project URL")
        .with_initial_text(config.supabase_url.clone().unwrap_or_default())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.starts_with("https://") || input.starts_with("http://") {
                Ok(())
            } else {
                Err("URL must start with https://")
            }
        })
        .interact_text()?;

    let key: String = Password::with_theme(&theme)
        .with_prompt("Supabase API key (anon or service-role)")
        .interact()?;

    let table: String = Input::with_theme(&theme)
        .with_prompt("Settings table")
        .default(config.settings_table.clone())
        .interact_text()?;

    config.supabase_url = Some(url.trim_end_matches('/').to_string());
    config.supabase_key = Some(key);
    config.settings_table = table;

    println!("\n{}", "Checking settings table...".cyan());
    let client = SupabaseClient::from_config(&config)?;
    let rows = client.fetch_by_keys(&keys::ALL).await?;
    let settings = ImageBackendConfig::from_rows(&rows);
    println!(
        "{} Found {} of {} image settings",
        "✓".green(),
        rows.len(),
        keys::ALL.len()
    );
    if settings.is_primary_configured() {
        println!("  Primary CDN: {}", settings.primary_name.bold());
    }

    match config.supabase_key.as_deref().and_then(jwt_role) {
        Some(role) if role == "service_role" => {
            println!("{} Service-role key: settings can be edited", "✓".green())
        }
        _ => println!(
            "{} Read-only key: `parishimg settings set` will be rejected",
            "⚠".yellow()
        ),
    }

    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "parishimg status".cyan());
    println!("  {} - Show image backend settings", "parishimg settings show".cyan());

    Ok(())
}

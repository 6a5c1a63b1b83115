//! Status command implementation

use colored::Colorize;

use parishimg::cache::CacheStorage;
use parishimg::config::Config;
use parishimg::error::Result;

use crate::cli::CommandContext;
use crate::cli::args::GlobalOptions;

/// Run the status command to display configuration and backend status
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "parishimg Configuration Status".bold());

    let config = match Config::load_at(opts.config_ref()) {
        Ok(config) => config,
        Err(_) => {
            println!("{} Configuration not found", "✗".red());
            println!();
            println!(
                "Run {} to create a configuration file.",
                "parishimg init".cyan()
            );
            println!();
            return Ok(());
        }
    };

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!("Config file: {}", config_path.display().to_string().cyan());
    println!();

    match config.supabase_url {
        Some(ref url) => println!("{} Supabase project: {}", "✓".green(), url),
        None => {
            println!("{} Supabase project URL not configured", "✗".red());
            println!("  → Run 'parishimg init' to configure");
        }
    }

    match (config.supabase_key.is_some(), config.key_role()) {
        (true, Some(role)) if role == "service_role" => {
            println!("{} Key role: {} (can save settings)", "✓".green(), role)
        }
        (true, Some(role)) => println!(
            "{} Key role: {} (read-only settings)",
            "○".dimmed(),
            role
        ),
        (true, None) => println!("{} Key configured (role unknown)", "⚠".yellow()),
        (false, _) => println!("{} Supabase key not configured", "✗".red()),
    }

    match CacheStorage::cache_dir() {
        Ok(dir) => println!("{} Cache directory: {}", "○".dimmed(), dir.display()),
        Err(_) => println!("{} Cache directory unavailable", "⚠".yellow()),
    }

    if config.validate_remote().is_ok() {
        let ctx = CommandContext::new(opts)?;
        let settings = ctx.delivery.resolver().get().await;

        println!();
        // Failed fetches are never cached
        if ctx.delivery.resolver().cached_at().is_some() {
            println!("{} Settings table reachable", "✓".green());
        } else {
            println!(
                "{} Settings table unreachable, serving safe defaults",
                "⚠".yellow()
            );
        }

        if settings.is_primary_configured() {
            println!(
                "{} Primary CDN: {}",
                "✓".green(),
                settings.primary_name.bold()
            );
        } else {
            println!("{} Primary CDN disabled", "○".dimmed());
        }
        if settings.fallback_enabled {
            println!("{} Fallback storage enabled", "✓".green());
        } else {
            println!(
                "{} Fallback storage disabled (storage URLs show placeholders)",
                "⚠".yellow()
            );
        }
        println!("  Upload target: {}", settings.upload_target.as_str());
    }

    println!();
    Ok(())
}

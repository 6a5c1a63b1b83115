//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
pub use clap_complete::Shell;

use parishimg::image::{CropMode, ImageCategory, ImageFormat, NetworkType};

pub mod args;
pub mod cache;
pub mod context;
pub mod init;
pub mod preload;
pub mod resolve;
pub mod settings;
pub mod status;
pub mod upload;

pub use args::OutputFormat;
pub use context::CommandContext;

/// parishimg CLI - operator companion for the parish image-delivery layer
#[derive(Parser, Debug)]
#[command(name = "parishimg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "PARISHIMG_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "PARISHIMG_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "PARISHIMG_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Skip the persistent URL cache for this run
    #[arg(long, global = true, env = "PARISHIMG_NO_CACHE", hide_env = true)]
    pub no_cache: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize parishimg configuration
    Init,

    /// Show configuration and backend status
    Status,

    /// Display version information
    Version,

    /// Build the delivery URL for an image
    #[command(after_help = "EXAMPLES:\n  \
            parishimg resolve '' --id abc123 --width 1920\n  \
            parishimg resolve https://x.supabase.co/storage/v1/object/public/images/a.jpg -c thumbnail\n  \
            parishimg resolve '' --id abc123 --viewport 375 --network 3g")]
    Resolve(ResolveArgs),

    /// Warm a list of images, at most N fetches at a time
    Preload(PreloadArgs),

    /// Inspect and edit the remote image backend settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Upload a file to the configured upload target
    Upload {
        /// Image file to upload
        file: PathBuf,

        /// Destination folder
        #[arg(long)]
        folder: Option<String>,
    },

    /// Manage the local URL cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions
    #[command(after_help = "\
  bash:   parishimg completion bash > /etc/bash_completion.d/parishimg
  zsh:    parishimg completion zsh > \"${fpath[1]}/_parishimg\"
  fish:   parishimg completion fish > ~/.config/fish/completions/parishimg.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Transform options shared by `resolve` and `preload`
#[derive(Debug, Clone, Args, Default)]
pub struct TransformArgs {
    /// Logical size class
    #[arg(long, short = 'c', value_enum, default_value = "medium")]
    pub category: ImageCategory,

    /// Requested width in pixels
    #[arg(long, short = 'W')]
    pub width: Option<u32>,

    /// Requested height in pixels
    #[arg(long, short = 'H')]
    pub height: Option<u32>,

    /// Requested quality (1-100)
    #[arg(long, short = 'q', value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,

    /// Smallest acceptable quality and size
    #[arg(long)]
    pub ultra: bool,

    /// Output format hint
    #[arg(long = "image-format", value_enum, default_value = "auto")]
    pub image_format: ImageFormat,

    /// Crop mode
    #[arg(long, value_enum)]
    pub crop: Option<CropMode>,

    /// Device pixel ratio
    #[arg(long)]
    pub dpr: Option<f32>,

    /// Viewport width, enables device-optimized mode
    #[arg(long)]
    pub viewport: Option<u32>,

    /// Effective network type, enables device-optimized mode
    #[arg(long, value_enum)]
    pub network: Option<NetworkType>,

    /// Client asked to save data, enables device-optimized mode
    #[arg(long)]
    pub save_data: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// Source URL of the image (may be empty when --id is given)
    pub source: String,

    /// Asset identifier in the primary CDN
    #[arg(long)]
    pub id: Option<String>,

    #[command(flatten)]
    pub transform: TransformArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PreloadArgs {
    /// Source URLs, in the order they are likely to be shown
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Maximum concurrent fetches (defaults to the configured value)
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub transform: TransformArgs,
}

/// Remote settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show the current image backend settings
    Show,

    /// Set one setting (requires a service-role key)
    Set {
        /// Setting key, e.g. cloudinary_enabled
        key: String,
        /// New value
        value: String,
    },

    /// Drop the cached settings and fetch them again
    Invalidate,
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,
    /// Clear all cached data
    Clear,
    /// Print cache directory path
    Path,
    /// Remove expired entries
    Purge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_args_parse() {
        let cli = Cli::parse_from([
            "parishimg",
            "resolve",
            "",
            "--id",
            "abc123",
            "--width",
            "1920",
            "-c",
            "hero",
            "--network",
            "slow-2g",
        ]);

        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.id.as_deref(), Some("abc123"));
                assert_eq!(args.transform.width, Some(1920));
                assert_eq!(args.transform.category, ImageCategory::Hero);
                assert_eq!(args.transform.network, Some(NetworkType::Slow2g));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_preload_requires_sources() {
        assert!(Cli::try_parse_from(["parishimg", "preload"]).is_err());
    }
}

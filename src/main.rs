//! parishimg CLI - operator companion for the parish image-delivery layer

use clap::{CommandFactory, Parser};

mod cli;
mod output;

use cli::args::GlobalOptions;
use cli::{CacheCommands, Cli, Commands, SettingsCommands};
use parishimg::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `--debug` forces debug output; otherwise `RUST_LOG` decides, defaulting to warnings
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Init => cli::init::run(&opts).await,
        Commands::Status => cli::status::run(&opts).await,
        Commands::Version => {
            println!("parishimg version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "parishimg", &mut std::io::stdout());
            Ok(())
        }
        Commands::Resolve(args) => cli::resolve::run(&opts, &args).await,
        Commands::Preload(args) => cli::preload::run(&opts, &args).await,
        Commands::Settings(cmd) => match cmd {
            SettingsCommands::Show => cli::settings::show(&opts).await,
            SettingsCommands::Set { key, value } => cli::settings::set(&opts, &key, &value).await,
            SettingsCommands::Invalidate => cli::settings::invalidate(&opts).await,
        },
        Commands::Upload { file, folder } => cli::upload::run(&opts, &file, folder).await,
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(),
            CacheCommands::Purge => cli::cache::purge(&opts),
        },
    }
}

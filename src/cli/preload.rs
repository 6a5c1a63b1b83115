//! Preload command implementation

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use parishimg::cache::ImageMeta;
use parishimg::error::Result;
use parishimg::preload::{HttpImageFetcher, ImageFetcher, preload_images};

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat, PreloadArgs};
use crate::output::{json::format_json, table::format_table};

/// Advances a progress bar as each fetch settles
struct ProgressFetcher<'a> {
    inner: &'a HttpImageFetcher,
    bar: ProgressBar,
}

#[async_trait]
impl ImageFetcher for ProgressFetcher<'_> {
    async fn fetch(&self, url: &str) -> Result<ImageMeta> {
        let result = self.inner.fetch(url).await;
        self.bar.inc(1);
        result
    }
}

#[derive(Tabled)]
struct PreloadRow {
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "TYPE")]
    content_type: String,
    #[tabled(rename = "BYTES")]
    size: String,
}

/// Run the preload command
pub async fn run(opts: &GlobalOptions, args: &PreloadArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let concurrency = args
        .concurrency
        .unwrap_or(ctx.config.preferences.preload_concurrency);
    let options = args.transform.to_options();

    let references: Vec<_> = args
        .sources
        .iter()
        .map(|source| ctx.delivery.reference(source, None, args.transform.category))
        .collect();

    let bar = if ctx.format == OutputFormat::Json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(references.len() as u64)
    };
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message("preloading");

    let http = HttpImageFetcher::new(ctx.meta_cache())?;
    let fetcher = ProgressFetcher {
        inner: &http,
        bar: bar.clone(),
    };

    let report = preload_images(&ctx.delivery, &references, &options, &fetcher, concurrency).await;
    bar.finish_and_clear();

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&report)?),
        OutputFormat::Table => {
            let mut rows: Vec<PreloadRow> = report
                .succeeded
                .iter()
                .map(|meta| PreloadRow {
                    image: meta.url.clone(),
                    status: "ok".to_string(),
                    content_type: meta.content_type.clone().unwrap_or_default(),
                    size: meta.size_bytes.map(|s| s.to_string()).unwrap_or_default(),
                })
                .collect();
            rows.extend(report.failed.iter().map(|f| PreloadRow {
                image: f.item.clone(),
                status: f.error.clone(),
                content_type: String::new(),
                size: String::new(),
            }));
            println!("{}", format_table(&rows));
        }
        OutputFormat::Pretty => {
            println!(
                "{} Preloaded {} of {} images ({} at a time)",
                "✓".green(),
                report.succeeded.len(),
                report.total(),
                concurrency.max(1)
            );
            for failure in &report.failed {
                println!("{} {}: {}", "✗".red(), failure.item, failure.error.dimmed());
            }
        }
    }

    Ok(())
}

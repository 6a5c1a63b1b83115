//! Cache management commands

use parishimg::cache::CacheStorage;
use parishimg::error::Result;

use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::output::json::format_json;

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let cache = CacheStorage::open()?;
    let stats = cache.stats()?;
    let path = cache.dir().display().to_string();

    match opts.format {
        OutputFormat::Json => {
            let namespaces: serde_json::Map<String, serde_json::Value> = stats
                .by_namespace
                .iter()
                .map(|(ns, count)| (ns.clone(), serde_json::Value::from(*count)))
                .collect();
            let json = serde_json::json!({
                "total_entries": stats.total_entries,
                "valid_entries": stats.valid_entries,
                "expired_entries": stats.expired_entries,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
                "oldest_entry_timestamp": stats.oldest_entry,
                "newest_entry_timestamp": stats.newest_entry,
                "namespaces": namespaces,
                "path": path,
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", path);
            println!("Valid entries:  {}", stats.valid_entries);
            for (namespace, count) in &stats.by_namespace {
                println!("  {:<12} {}", namespace, count);
            }
            println!("Expired:        {}", stats.expired_entries);
            println!("Total size:     {}", format_size(stats.total_size_bytes));

            if let Some(oldest) = stats.oldest_entry {
                println!("Oldest entry:   {}", format_local(oldest));
            }
            if let Some(newest) = stats.newest_entry {
                println!("Newest entry:   {}", format_local(newest));
            }
        }
    }

    Ok(())
}

/// Clear all cache entries
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let cache = CacheStorage::open()?;
    let stats = cache.clear_all()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            if stats.entries_removed > 0 {
                println!("Cleared {} cache entries", stats.entries_removed);
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Remove expired entries only
pub fn purge(opts: &GlobalOptions) -> Result<()> {
    let cache = CacheStorage::open()?;
    let removed = cache.purge_expired()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "expired_removed": removed });
            println!("{}", format_json(&json)?);
        }
        _ => println!("Removed {} expired cache entries", removed),
    }
    Ok(())
}

/// Show cache path
pub fn path() -> Result<()> {
    let path = CacheStorage::cache_dir()?;
    println!("{}", path.display());
    Ok(())
}

fn format_local(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|d| {
            d.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Format bytes as human-readable size
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}

//! Resolve command implementation

use serde::Serialize;
use tabled::Tabled;

use parishimg::error::Result;
use parishimg::image::{
    DeviceProfile, ImageCategory, Placeholder, ResolveOptions, Resolved, TransformSpec, plan,
};

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat, ResolveArgs, TransformArgs};
use crate::output::{json::format_json, table::format_table};

impl TransformArgs {
    /// Options for the URL builder. Any device hint turns on device mode.
    pub fn to_options(&self) -> ResolveOptions {
        let device = (self.viewport.is_some() || self.network.is_some() || self.save_data).then(
            || DeviceProfile {
                viewport_width: self.viewport,
                network: self.network,
                save_data: self.save_data,
            },
        );

        ResolveOptions {
            width: self.width,
            height: self.height,
            quality: self.quality,
            ultra_compress: self.ultra,
            format: self.image_format,
            crop: self.crop,
            dpr: self.dpr,
            device,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_id: Option<String>,
    category: ImageCategory,
    backend: &'static str,
    available: bool,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transform: Option<TransformSpec>,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "FIELD")]
    field: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Run the resolve command
pub async fn run(opts: &GlobalOptions, args: &ResolveArgs) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let reference = ctx.delivery.reference(
        &args.source,
        args.id.as_deref(),
        args.transform.category,
    );
    let options = args.transform.to_options();

    let config = ctx.delivery.resolver().get().await;
    let planned = plan(&reference, &options, &config);
    let resolved = ctx.delivery.resolve_image_url(&reference, &options).await;

    let report = ResolveReport {
        source: args.source.clone(),
        backend_id: reference.backend_id().map(str::to_string),
        category: reference.category(),
        backend: planned.backend(),
        available: !resolved.is_unavailable(),
        url: resolved.to_string(),
        transform: planned.spec().cloned(),
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&report)?),
        OutputFormat::Table => {
            let mut rows = vec![
                FieldRow {
                    field: "Backend",
                    value: report.backend.to_string(),
                },
                FieldRow {
                    field: "URL",
                    value: report.url.clone(),
                },
            ];
            if let Some(ref spec) = report.transform {
                rows.push(FieldRow {
                    field: "Size",
                    value: format!("{}x{}", spec.width, spec.height),
                });
                rows.push(FieldRow {
                    field: "Quality",
                    value: spec.quality.to_string(),
                });
            }
            println!("{}", format_table(&rows));
        }
        OutputFormat::Pretty => {
            println!("{}", resolved);
            if let Resolved::Unavailable = resolved {
                eprintln!("{}", Placeholder::unavailable().text);
            }
        }
    }

    log::debug!("{}", ctx.delivery.cache().stats());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parishimg::image::NetworkType;

    #[test]
    fn test_no_device_hints_means_no_device_mode() {
        let args = TransformArgs {
            width: Some(1920),
            ..Default::default()
        };
        let options = args.to_options();
        assert_eq!(options.width, Some(1920));
        assert!(options.device.is_none());
    }

    #[test]
    fn test_network_hint_enables_device_mode() {
        let args = TransformArgs {
            network: Some(NetworkType::ThreeG),
            ..Default::default()
        };
        let device = args.to_options().device.unwrap();
        assert_eq!(device.network, Some(NetworkType::ThreeG));
        assert_eq!(device.viewport_width, None);
    }
}

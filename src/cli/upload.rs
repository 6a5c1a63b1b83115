//! Upload command implementation

use std::path::Path;

use colored::Colorize;

use parishimg::client::{CloudinaryClient, ImageUploader, UploadRequest};
use parishimg::error::Result;
use parishimg::settings::UploadTarget;

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::output::json::format_json;

/// Upload `file` to whichever backend the settings name as upload target
pub async fn run(opts: &GlobalOptions, file: &Path, folder: Option<String>) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let settings = ctx.delivery.resolver().get().await;
    let request = UploadRequest::from_path(file, folder)?;

    let cloudinary;
    let uploader: &dyn ImageUploader = match settings.upload_target {
        UploadTarget::Cloudinary => {
            cloudinary = CloudinaryClient::from_config(&settings)?;
            &cloudinary
        }
        UploadTarget::Supabase => ctx.client.as_ref(),
    };

    log::debug!("Uploading {} via {}", request.file_name, uploader.name());
    let uploaded = uploader.upload(request).await?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "backend": uploader.name(),
                "backend_id": uploaded.backend_id,
                "url": uploaded.url,
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            println!("{} Uploaded to {}", "✓".green(), uploader.name().bold());
            println!("  URL: {}", uploaded.url.cyan());
            if let Some(ref id) = uploaded.backend_id {
                println!("  ID:  {}", id);
            }
        }
    }
    Ok(())
}

use crate::config::Config;
use crate::errors::UploadError;
use crate::models::UploadResponse;
use crate::utils::commands::run_post_deploy;
use crate::utils::extract::extract_archive;
use actix_multipart::{Field, Multipart};
use actix_web::web::{self, Bytes, BytesMut};
use actix_web::HttpResponse;
use futures::TryStreamExt;

const FILE_FIELD: &str = "file";

/// The uploaded archive, kept in memory for the length of one request
#[derive(Debug)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Bytes,
}

/// Deploy an uploaded zip into the projects root, then run the
/// post-deploy commands. Command failures are logged only.
pub async fn upload(
    config: web::Data<Config>,
    multipart: Multipart,
) -> Result<HttpResponse, UploadError> {
    let UploadRequest { filename, bytes } = read_upload(multipart, config.upload_limit).await?;
    log::info!("Received {} ({} bytes)", filename, bytes.len());

    let root = config.projects_root.clone();
    let max_bytes = config.max_extracted_bytes;
    // fs operations are blocking, run them on the threadpool
    let summary = web::block(move || extract_archive(&bytes, &root, max_bytes)).await??;
    log::info!(
        "Extracted {} into {}: {} files, {} directories, {} bytes",
        filename,
        config.projects_root.display(),
        summary.files,
        summary.directories,
        summary.bytes
    );

    let commands = config.post_deploy_commands();
    if !commands.is_empty() {
        let succeeded =
            run_post_deploy(&commands, &config.projects_root, config.command_timeout).await;
        log::info!(
            "{} of {} post-deploy commands succeeded for {}",
            succeeded,
            commands.len(),
            filename
        );
    }

    Ok(HttpResponse::Ok().json(UploadResponse::deployed(filename)))
}

/// Pull the `file` field out of the form. Other fields are skipped, and only
/// the first `file` field counts.
pub async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<UploadRequest, UploadError> {
    let mut upload: Option<UploadRequest> = None;

    while let Some(mut field) = multipart.try_next().await.map_err(UploadError::InvalidMultipart)? {
        let wanted = upload.is_none() && field.name() == Some(FILE_FIELD);
        if !wanted {
            drain(&mut field).await?;
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .filter(|name| !name.is_empty())
            .map(String::from)
            .ok_or(UploadError::NoFile)?;
        // Checked before buffering anything
        if !filename.ends_with(".zip") {
            return Err(UploadError::NotZip { filename });
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = field.try_next().await.map_err(UploadError::InvalidMultipart)? {
            if buffer.len() + chunk.len() > limit {
                return Err(UploadError::TooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }
        upload = Some(UploadRequest {
            filename,
            bytes: buffer.freeze(),
        });
    }

    upload.ok_or(UploadError::NoFile)
}

async fn drain(field: &mut Field) -> Result<(), UploadError> {
    while field
        .try_next()
        .await
        .map_err(UploadError::InvalidMultipart)?
        .is_some()
    {}
    Ok(())
}

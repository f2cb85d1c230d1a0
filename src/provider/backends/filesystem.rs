use std::io::{Cursor, ErrorKind};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use anyhow::anyhow;
use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;

use crate::config::{CropMode, Transformation};
use crate::provider::{AssetUpload, StoredAsset};
use crate::AssetProvider;

/// Stores assets in a local directory, applying the requested
/// transformation itself.
pub struct FileSystemBackend {
    directory: PathBuf,
    public_url: String,
}

impl FileSystemBackend {
    pub fn new(dir: PathBuf, public_url: String) -> Self {
        Self {
            directory: dir,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    #[inline]
    fn format_key(&self, folder: &str, public_id: &str, format: ImageFormat) -> String {
        let name = format!("{}.{}", public_id, file_extension(format));
        if folder.is_empty() {
            name
        } else {
            format!("{}/{}", folder, name)
        }
    }
}

/// Runs a blocking job on the rayon pool.
///
/// A panicking job is reported as an error, rayon would otherwise
/// abort the process.
async fn spawn_on_pool<F, T>(job: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    rayon::spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(job))
            .unwrap_or_else(|_| Err(anyhow!("image processing panicked")));
        let _ = tx.send(result);
    });

    rx.await?
}

#[async_trait]
impl AssetProvider for FileSystemBackend {
    async fn upload(&self, asset: AssetUpload) -> anyhow::Result<StoredAsset> {
        let AssetUpload {
            public_id,
            folder,
            allowed_formats,
            transformation,
            data,
            ..
        } = asset;

        let (format, buff) =
            spawn_on_pool(move || transform(&data, &allowed_formats, transformation)).await?;

        let key = self.format_key(&folder, &public_id, format);
        let path = self.directory.join(&key);

        debug!("Storing asset @ {:?}", &path);
        match tokio::fs::write(&path, &buff).await {
            Ok(()) => {},
            Err(ref e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, buff).await?;
            },
            Err(other) => return Err(other.into()),
        }

        Ok(StoredAsset {
            url: format!("{}/{}", self.public_url, key),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> anyhow::Result<()> {
        // The public id does not carry the folder, so look for it in every
        // known extension under every folder we have written to.
        let mut folders = vec![self.directory.clone()];
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(other) => return Err(other.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                folders.push(entry.path());
            }
        }

        for folder in folders {
            for format in [ImageFormat::Png, ImageFormat::Jpeg] {
                let path = folder.join(format!("{}.{}", public_id, file_extension(format)));
                debug!("Purging asset @ {:?}", &path);

                match tokio::fs::remove_file(&path).await {
                    Ok(()) => continue,
                    Err(ref e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(other) => return Err(other.into()),
                }
            }
        }

        Ok(())
    }
}

#[inline]
fn file_extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("bin")
}

/// Sniffs, checks and transforms the raw image.
///
/// Returns the detected format along with the re-encoded image.
fn transform(
    data: &[u8],
    allowed_formats: &[String],
    transformation: Transformation,
) -> anyhow::Result<(ImageFormat, Vec<u8>)> {
    let format = image::guess_format(data)?;

    let allowed = format
        .extensions_str()
        .iter()
        .any(|ext| allowed_formats.iter().any(|f| f.eq_ignore_ascii_case(ext)));
    if !allowed {
        return Err(anyhow!("Image file format {} not allowed", file_extension(format)));
    }

    let img = image::load_from_memory_with_format(data, format)?;
    let Transformation { width, height, crop } = transformation;
    let img = match crop {
        CropMode::Fill => img.resize_to_fill(width, height, FilterType::Lanczos3),
        CropMode::Fit => img.resize(width, height, FilterType::Lanczos3),
        CropMode::Scale => img.resize_exact(width, height, FilterType::Lanczos3),
    };

    let mut buff = Cursor::new(Vec::new());
    img.write_to(&mut buff, format)?;
    Ok((format, buff.into_inner()))
}

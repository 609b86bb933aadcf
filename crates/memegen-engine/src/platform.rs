use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use memegen_contracts::decode::DataUri;
use tracing::debug;

use crate::error::{MemeError, Result};
use crate::transport::RuntimePlatform;

/// Host capabilities the session calls into once a meme exists. Saving may
/// report where the image ended up when the host has a filesystem path.
pub trait PlatformServices: Send + Sync {
    fn runtime(&self) -> RuntimePlatform;
    fn pick_images(&self, max: usize) -> Result<Vec<PathBuf>>;
    fn save_to_album(&self, data_uri: &str) -> Result<Option<PathBuf>>;
    fn trigger_download(&self, data_uri: &str, file_name: &str) -> Result<Option<PathBuf>>;
    fn share(&self, data_uri: &str) -> Result<()>;
}

/// `meme_<unix millis>.<ext>`, with the extension taken from the data URI.
pub fn meme_file_name(data_uri: &str) -> String {
    let extension = DataUri::parse(data_uri)
        .map(|uri| uri.extension())
        .unwrap_or("gif");
    format!("meme_{}.{extension}", Utc::now().timestamp_millis())
}

/// Filesystem-backed host: picks come from a preset list, saves and downloads
/// land in one output directory, sharing is unsupported.
#[derive(Debug, Clone)]
pub struct LocalPlatform {
    runtime: RuntimePlatform,
    out_dir: PathBuf,
    picks: Vec<PathBuf>,
}

impl LocalPlatform {
    pub fn new(runtime: RuntimePlatform, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            out_dir: out_dir.into(),
            picks: Vec::new(),
        }
    }

    pub fn with_picks(mut self, picks: Vec<PathBuf>) -> Self {
        self.picks = picks;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn write_image(&self, data_uri: &str, file_name: &str) -> Result<PathBuf> {
        let uri = DataUri::parse(data_uri)
            .ok_or_else(|| MemeError::Platform("not an image data URI".to_string()))?;
        let bytes = uri
            .decode_bytes()
            .map_err(|err| MemeError::Platform(format!("undecodable image payload: {err}")))?;
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(file_name);
        fs::write(&path, bytes)?;
        debug!("wrote {}", path.display());
        Ok(path)
    }
}

impl PlatformServices for LocalPlatform {
    fn runtime(&self) -> RuntimePlatform {
        self.runtime
    }

    fn pick_images(&self, max: usize) -> Result<Vec<PathBuf>> {
        for path in &self.picks {
            if !path.is_file() {
                return Err(MemeError::Platform(format!(
                    "image not found: {}",
                    path.display()
                )));
            }
        }
        Ok(self.picks.iter().take(max).cloned().collect())
    }

    fn save_to_album(&self, data_uri: &str) -> Result<Option<PathBuf>> {
        self.write_image(data_uri, &meme_file_name(data_uri))
            .map(Some)
    }

    fn trigger_download(&self, data_uri: &str, file_name: &str) -> Result<Option<PathBuf>> {
        self.write_image(data_uri, file_name).map(Some)
    }

    fn share(&self, _data_uri: &str) -> Result<()> {
        Err(MemeError::Platform(
            "sharing is not supported on this platform".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{meme_file_name, LocalPlatform, PlatformServices};
    use crate::error::MemeError;
    use crate::transport::RuntimePlatform;

    const PNG_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn file_names_follow_the_data_uri_type() {
        let name = meme_file_name(PNG_URI);
        assert!(name.starts_with("meme_"));
        assert!(name.ends_with(".png"));
        assert!(meme_file_name("garbage").ends_with(".gif"));
    }

    #[test]
    fn save_writes_decoded_bytes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let platform = LocalPlatform::new(RuntimePlatform::NativeApp, temp.path().join("album"));
        let saved = platform.save_to_album(PNG_URI)?;
        let path = saved.ok_or_else(|| anyhow::anyhow!("no path returned"))?;
        assert_eq!(fs::read(&path)?, b"\x89PNG\r\n\x1a\n".to_vec());
        assert_eq!(path.parent(), Some(platform.out_dir()));
        Ok(())
    }

    #[test]
    fn download_uses_the_given_name() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let platform = LocalPlatform::new(RuntimePlatform::Browser, temp.path());
        let saved = platform.trigger_download(PNG_URI, "meme_1.png")?;
        assert_eq!(saved, Some(temp.path().join("meme_1.png")));
        Ok(())
    }

    #[test]
    fn malformed_images_and_share_are_platform_errors() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let platform = LocalPlatform::new(RuntimePlatform::NativeApp, temp.path());
        assert!(matches!(
            platform.save_to_album("data:text/plain;base64,AAAA"),
            Err(MemeError::Platform(_))
        ));
        assert!(matches!(platform.share(PNG_URI), Err(MemeError::Platform(_))));
        Ok(())
    }

    #[test]
    fn picks_are_capped_and_must_exist() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let first = temp.path().join("a.png");
        let second = temp.path().join("b.png");
        fs::write(&first, b"a")?;
        fs::write(&second, b"b")?;
        let platform = LocalPlatform::new(RuntimePlatform::NativeApp, temp.path())
            .with_picks(vec![first.clone(), second]);
        assert_eq!(platform.pick_images(1)?, vec![first]);

        let missing = LocalPlatform::new(RuntimePlatform::NativeApp, temp.path())
            .with_picks(vec![temp.path().join("missing.png")]);
        assert!(missing.pick_images(3).is_err());
        Ok(())
    }
}

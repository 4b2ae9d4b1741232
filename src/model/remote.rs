use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP fetcher that persists remote artifacts under a cache directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    force_download: bool,
}

impl Downloader {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            force_download: false,
        })
    }

    /// Re-download even when a cached copy exists.
    pub fn force_download(mut self, force: bool) -> Self {
        self.force_download = force;
        self
    }

    pub(crate) fn is_forced(&self) -> bool {
        self.force_download
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Ensures the artifact is cached and opens a read handle on it.
    pub fn acquire(&self, url: &str, cache_location: impl AsRef<Path>) -> Result<RemoteFile> {
        let url = parse_url(url)?;
        let local_path = local_path_for(&url, cache_location.as_ref())?;
        self.ensure_cached(&url, &local_path)?;

        let file = File::open(&local_path)?;
        Ok(RemoteFile {
            url,
            local_path,
            reader: BufReader::new(file),
        })
    }

    /// Ensures the artifact is cached and returns its local path.
    pub fn fetch(&self, url: &str, cache_location: impl AsRef<Path>) -> Result<PathBuf> {
        let url = parse_url(url)?;
        let local_path = local_path_for(&url, cache_location.as_ref())?;
        self.ensure_cached(&url, &local_path)?;
        Ok(local_path)
    }

    fn ensure_cached(&self, url: &Url, local_path: &Path) -> Result<()> {
        if local_path.is_file() && !self.force_download {
            tracing::info!("Using cached local file at {:?}", local_path);
            return Ok(());
        }

        tracing::info!("Downloading {} ...", url);
        self.download(url, local_path)
    }

    fn download(&self, url: &Url, local_path: &Path) -> Result<()> {
        let mut response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("Bad uri {}: HTTP {}", url, status)));
        }

        let dir = local_path
            .parent()
            .ok_or_else(|| Error::InvalidInput(format!("Invalid cache path: {:?}", local_path)))?;
        fs::create_dir_all(dir)?;

        // The temp file is removed on drop, so a failed write never lands at `local_path`.
        let mut partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(dir)?;
        let written = response.copy_to(partial.as_file_mut())?;
        partial.as_file().sync_all()?;
        partial.persist(local_path).map_err(|e| Error::IoError(e.error))?;

        tracing::info!("Saved {} bytes to {:?}", written, local_path);
        Ok(())
    }
}

/// Scoped read handle on a cached remote artifact.
///
/// Dropping the handle closes the stream. The cached file itself stays on
/// disk so later acquisitions of the same URL are served locally.
#[derive(Debug)]
pub struct RemoteFile {
    url: Url,
    local_path: PathBuf,
    reader: BufReader<File>,
}

impl RemoteFile {
    /// Acquires `url` into `cache_location` with a default client.
    pub fn acquire(url: &str, cache_location: impl AsRef<Path>) -> Result<Self> {
        Downloader::new(&Config::default())?.acquire(url, cache_location)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.local_path
    }
}

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        tracing::debug!("Released {:?}", self.local_path);
    }
}

pub fn parse_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| Error::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::InvalidInput(format!(
            "Unsupported URL scheme '{}' in {}",
            other, url
        ))),
    }
}

/// `<cache>/<parent segment>/<file name>`, or `<cache>/<file name>` for a
/// single-segment URL path.
pub fn local_path_for(url: &Url, cache_location: &Path) -> Result<PathBuf> {
    if url.path().ends_with('/') {
        return Err(Error::InvalidInput(format!("URL has no file name: {}", url)));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let mut path = cache_location.to_path_buf();
    match segments.as_slice() {
        [] => return Err(Error::InvalidInput(format!("URL has no file name: {}", url))),
        [file] => path.push(file),
        [.., parent, file] => {
            path.push(parent);
            path.push(file);
        }
    }
    Ok(path)
}

//! Remote file sources the synchronizer lists and downloads from.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use percent_encoding::percent_decode_str;
use reqwest::{Client, Url};
use suppaftp::types::FileType;
use suppaftp::AsyncFtpStream;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// Chunk size for streaming local files.
const CHUNK_SIZE: usize = 64 * 1024;

/// A file offered by a remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: Option<u64>,
}

/// Body of a remote file as a stream of chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A directory of instrument files on some remote store.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// List the entries of the remote directory.
    async fn list(&self) -> Result<Vec<RemoteEntry>>;

    /// Start downloading one entry.
    async fn open(&self, entry: &RemoteEntry) -> Result<ByteStream>;
}

/// An HTTP(S) server exposing an auto-generated directory index.
pub struct HttpDirectorySource {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpDirectorySource {
    pub fn new(
        base_url: impl Into<String>,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let base_url: String = base_url.into();
        let base_url = directory_url(&base_url)?;

        Ok(Self {
            client,
            base_url,
            username,
            password,
        })
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteSource for HttpDirectorySource {
    fn describe(&self) -> String {
        self.base_url.to_string()
    }

    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        let response = self.get(self.base_url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(IngestionError::Transfer(format!(
                "listing failed: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let entries: Vec<RemoteEntry> = parse_directory_index(&self.base_url, &body)
            .into_iter()
            .map(|name| RemoteEntry { name, size: None })
            .collect();

        info!(count = entries.len(), "Listed remote directory");
        Ok(entries)
    }

    async fn open(&self, entry: &RemoteEntry) -> Result<ByteStream> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IngestionError::invalid_url(self.base_url.as_str(), "cannot be a base"))?
            .pop_if_empty()
            .push(&entry.name);
        debug!(url = %url, "Downloading file");

        let response = self.get(url).send().await?;
        if !response.status().is_success() {
            return Err(IngestionError::Transfer(format!(
                "{}: HTTP {}",
                entry.name,
                response.status()
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(IngestionError::from))
            .boxed())
    }
}

/// Parse `url` and make sure its path ends with a slash, so entries
/// resolve inside the directory.
fn directory_url(url: &str) -> Result<Url> {
    let mut parsed = Url::parse(url).map_err(|e| IngestionError::invalid_url(url, e))?;
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

/// File names linked from an HTML directory index at `base`.
///
/// Links are resolved against `base` and percent-decoded. Only plain files
/// directly inside `base` are kept; sub-directories, parent links, sort
/// links and other hosts are ignored.
pub fn parse_directory_index(base: &Url, html: &str) -> Vec<String> {
    let mut names = Vec::new();

    for part in html.split("href=").skip(1) {
        let Some(quote) = part.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let Some(link) = part[1..].split(quote).next() else {
            continue;
        };
        if link.is_empty() || link.starts_with('?') || link.starts_with('#') {
            continue;
        }

        let Ok(url) = base.join(link) else {
            continue;
        };
        if url.origin() != base.origin() || url.query().is_some() {
            continue;
        }
        let Some((dir, file)) = url.path().rsplit_once('/') else {
            continue;
        };
        if file.is_empty() || base.path() != format!("{}/", dir) {
            continue;
        }
        let Ok(name) = percent_decode_str(file).decode_utf8() else {
            continue;
        };

        let name = name.into_owned();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    names
}

/// An FTP server directory, as exported by the probe's base station.
///
/// Each operation opens its own control connection: log in, change to the
/// directory, run the command, quit. Files are fetched in binary mode.
pub struct FtpDirectorySource {
    host: String,
    port: u16,
    directory: Option<String>,
    username: String,
    password: String,
    timeout: Duration,
}

impl FtpDirectorySource {
    /// `url` is `ftp://host[:port]/dir`. Credentials fall back to the ones
    /// embedded in the URL, then to anonymous login.
    pub fn new(
        url: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| IngestionError::invalid_url(url, e))?;
        if parsed.scheme() != "ftp" {
            return Err(IngestionError::invalid_url(url, "expected an ftp:// URL"));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| IngestionError::invalid_url(url, "missing host"))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(21);

        let path = percent_decode_str(parsed.path().trim_matches('/'))
            .decode_utf8()
            .map_err(|e| IngestionError::invalid_url(url, e))?;
        let directory = (!path.is_empty()).then(|| path.into_owned());

        let username = username
            .or_else(|| (!parsed.username().is_empty()).then(|| parsed.username().to_string()))
            .unwrap_or_else(|| "anonymous".to_string());
        let password = password
            .or_else(|| parsed.password().map(str::to_string))
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            directory,
            username,
            password,
            timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Directory changed into after login, relative to the login directory.
    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    async fn session(&self) -> Result<AsyncFtpStream> {
        let mut ftp = AsyncFtpStream::connect((self.host.as_str(), self.port)).await?;
        ftp.login(self.username.as_str(), self.password.as_str())
            .await?;
        if let Some(dir) = &self.directory {
            ftp.cwd(dir.as_str()).await?;
        }
        Ok(ftp)
    }

    async fn with_timeout<T>(
        &self,
        what: &str,
        operation: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| {
                IngestionError::Transfer(format!("{} timed out after {:?}", what, self.timeout))
            })?
    }
}

async fn quit(mut ftp: AsyncFtpStream) {
    if let Err(e) = ftp.quit().await {
        warn!(error = %e, "FTP quit failed");
    }
}

#[async_trait]
impl RemoteSource for FtpDirectorySource {
    fn describe(&self) -> String {
        format!(
            "ftp://{}:{}/{}",
            self.host,
            self.port,
            self.directory.as_deref().unwrap_or_default()
        )
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        let names = self
            .with_timeout("FTP listing", async {
                let mut ftp = self.session().await?;
                let names = ftp.nlst(None).await;
                quit(ftp).await;
                Ok::<_, IngestionError>(names?)
            })
            .await?;

        let entries: Vec<RemoteEntry> = names
            .into_iter()
            .filter_map(|name| {
                // Some servers answer NLST with paths
                let name = name.rsplit('/').next().unwrap_or_default().trim().to_string();
                (!name.is_empty()).then_some(RemoteEntry { name, size: None })
            })
            .collect();

        info!(count = entries.len(), "Listed FTP directory");
        Ok(entries)
    }

    async fn open(&self, entry: &RemoteEntry) -> Result<ByteStream> {
        debug!(file = %entry.name, "Retrieving file");

        let body = self
            .with_timeout("FTP transfer", async {
                let mut ftp = self.session().await?;
                let body = match ftp.transfer_type(FileType::Binary).await {
                    Ok(()) => ftp.retr_as_buffer(&entry.name).await,
                    Err(e) => Err(e),
                };
                quit(ftp).await;
                Ok::<_, IngestionError>(body?.into_inner())
            })
            .await?;

        let chunks: Vec<Result<Bytes>> = body
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

/// A directory on a mounted share.
pub struct LocalDirectorySource {
    dir: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl RemoteSource for LocalDirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut out = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            out.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: Some(metadata.len()),
            });
        }

        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn open(&self, entry: &RemoteEntry) -> Result<ByteStream> {
        let file = tokio::fs::File::open(self.dir.join(&entry.name)).await?;

        let chunks = stream::unfold(Some(file), |state| async move {
            let mut file = state?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), Some(file)))
                }
                Err(e) => Some((Err(IngestionError::from(e)), None)),
            }
        });

        Ok(chunks.boxed())
    }
}

use crate::types::{PluviaError, PluviaResult};
use flate2::read::GzDecoder;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Remote locations of one published dataset.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    /// Station metadata CSV.
    pub stations_url: String,
    /// Long-format precipitation CSV (may carry climate-index columns).
    pub observations_url: String,
    /// Optional DEM raster in ESRI ASCII grid format.
    pub dem_url: Option<String>,
}

impl Default for DatasetSource {
    /// The northern Andes precipitation dataset the pipeline was built
    /// around, served as raw files from its public repository.
    fn default() -> Self {
        Self {
            stations_url:
                "https://raw.githubusercontent.com/omejiariv/Chaac-SIHCLI/main/data/mapaCVENSO.csv"
                    .to_string(),
            observations_url:
                "https://raw.githubusercontent.com/omejiariv/Chaac-SIHCLI/main/data/DatosPptnmes_ENSO.csv"
                    .to_string(),
            dem_url: None,
        }
    }
}

/// Downloads dataset files into a local cache, reusing cached copies.
///
/// Downloads go through a temporary file in the cache directory and are
/// renamed into place, so an interrupted transfer never leaves a
/// truncated file that a later run would trust. Bodies ending in `.gz`
/// are decompressed transparently.
pub struct RemoteFetcher {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl RemoteFetcher {
    /// Fetcher over the platform cache directory (e.g.
    /// `~/.cache/pluvia` on Linux).
    pub fn new() -> PluviaResult<Self> {
        let base = dirs::cache_dir().ok_or_else(|| {
            PluviaError::Processing("no platform cache directory available".to_string())
        })?;
        Self::with_cache_dir(base.join("pluvia"))
    }

    /// Fetcher over an explicit cache directory.
    pub fn with_cache_dir<P: AsRef<Path>>(dir: P) -> PluviaResult<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            cache_dir: dir.as_ref().to_path_buf(),
            client: reqwest::blocking::Client::new(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fetch one URL into the cache, returning the local path. A file
    /// already in the cache is reused without touching the network.
    pub fn fetch(&self, url: &str) -> PluviaResult<PathBuf> {
        let gzipped = url_segment(url)?.ends_with(".gz");
        let target = self.cache_dir.join(cached_file_name(url)?);
        if target.exists() {
            log::info!("Using cached copy of {} at {}", url, target.display());
            return Ok(target);
        }

        log::info!("Downloading {}", url);
        let response = self.client.get(url).send()?.error_for_status()?;
        let body = response.bytes()?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        if gzipped {
            let mut decoder = GzDecoder::new(body.as_ref());
            let mut decoded = Vec::new();
            decoder.read_to_end(&mut decoded)?;
            tmp.write_all(&decoded)?;
        } else {
            tmp.write_all(&body)?;
        }
        tmp.persist(&target).map_err(|e| PluviaError::Io(e.error))?;

        log::info!("Cached {} ({} bytes)", target.display(), target.metadata()?.len());
        Ok(target)
    }

    /// Fetch the station and observation files of a dataset source.
    pub fn fetch_dataset(&self, source: &DatasetSource) -> PluviaResult<(PathBuf, PathBuf)> {
        let stations = self.fetch(&source.stations_url)?;
        let observations = self.fetch(&source.observations_url)?;
        Ok((stations, observations))
    }
}

/// Last path segment of a URL, minus any query string or fragment. Both
/// the cache file name and the gzip decision derive from this segment,
/// so a query suffix can never desynchronize them.
fn url_segment(url: &str) -> PluviaResult<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            PluviaError::InvalidFormat(format!("cannot derive a file name from URL '{}'", url))
        })
}

/// Local file name for a URL: the segment with a trailing `.gz` removed
/// (bodies are stored decompressed).
fn cached_file_name(url: &str) -> PluviaResult<String> {
    Ok(url_segment(url)?.trim_end_matches(".gz").to_string())
}

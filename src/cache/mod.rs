//! On-disk cache of built conversions.
//!
//! Cache files are named by a [`Fingerprint`] and stored next to the polygon
//! source (falling back to the working directory), or in the directory named
//! by `GRID_CACHE_DIR`. Failed reads delete the file so it is rebuilt;
//! failed writes are logged and ignored.

mod fingerprint;

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result, conv::GridPolyConv, vector::PolyKey};

pub use fingerprint::Fingerprint;
use fingerprint::is_cache_file_name;

/// Environment variable naming a cache directory that replaces the default
/// search path.
pub const CACHE_DIR_ENV: &str = "GRID_CACHE_DIR";

/// How cached conversions are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheLevel {
    /// Always rebuild; never read or write cache files.
    None,
    /// Match on grid, polygon keys and refine factor.
    #[default]
    Standard,
    /// Additionally match on polygon geometry.
    Strict,
}

impl TryFrom<u8> for CacheLevel {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Standard),
            2 => Ok(Self::Strict),
            _ => Err(Error::config(format!("caching must be 0, 1 or 2; found {v}"))),
        }
    }
}

/// Where cache files are looked up and written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirs {
    override_dir: Option<PathBuf>,
    search: Vec<PathBuf>,
}

impl CacheDirs {
    /// A single explicit cache directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { override_dir: Some(dir.into()), search: Vec::new() }
    }

    /// Directories from the environment: `GRID_CACHE_DIR` when set, otherwise
    /// the directory of `source_path` followed by the working directory.
    pub fn from_env(source_path: Option<&Path>) -> Result<Self> {
        match std::env::var_os(CACHE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => {
                let dir = PathBuf::from(dir);
                if !dir.is_dir() {
                    return Err(Error::config(format!(
                        "{CACHE_DIR_ENV} is not a directory: {}",
                        dir.display()
                    )));
                }
                Ok(Self::new(dir))
            }
            _ => Ok(Self::search_from(source_path)),
        }
    }

    fn search_from(source_path: Option<&Path>) -> Self {
        let mut search = Vec::with_capacity(2);
        if let Some(parent) = source_path.and_then(Path::parent) {
            search.push(if parent.as_os_str().is_empty() { PathBuf::from(".") } else { parent.to_path_buf() });
        }
        if !search.iter().any(|d| d == Path::new(".")) {
            search.push(PathBuf::from("."));
        }
        Self { override_dir: None, search }
    }

    /// Directories in lookup and store order.
    pub fn dirs(&self) -> Vec<&Path> {
        match &self.override_dir {
            Some(dir) => vec![dir.as_path()],
            None => self.search.iter().map(PathBuf::as_path).collect(),
        }
    }
}

/// Cache file in `dir` matching `fp`: the exact name, or for
/// [`CacheLevel::Standard`] the first file sharing its prefix.
pub fn find_cache(dir: &Path, fp: &Fingerprint, level: CacheLevel) -> Option<PathBuf> {
    if level == CacheLevel::None {
        return None;
    }
    let entries = fs::read_dir(dir).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| is_cache_file_name(name))
        .collect();
    names.sort();

    let exact = fp.file_name();
    if names.iter().any(|n| *n == exact) {
        return Some(dir.join(exact));
    }
    if level == CacheLevel::Standard {
        let prefix = fp.prefix();
        if let Some(name) = names.iter().find(|n| n.starts_with(&prefix)) {
            return Some(dir.join(name));
        }
    }
    None
}

/// Read a cached conversion. A file that fails to decode is deleted.
pub fn lookup<K: PolyKey>(dirs: &CacheDirs, fp: &Fingerprint, level: CacheLevel) -> Option<GridPolyConv<K>> {
    if level == CacheLevel::None {
        return None;
    }
    let path = dirs.dirs().into_iter().find_map(|dir| find_cache(dir, fp, level))?;
    match GridPolyConv::read_from_path(&path) {
        Ok(conv) => {
            tracing::info!("reading from cache: {}", path.display());
            Some(conv)
        }
        Err(e) => {
            tracing::error!("failed to read cache {}: {e}", path.display());
            match fs::remove_file(&path) {
                Ok(()) => tracing::warn!("deleted unreadable cache: {}", path.display()),
                Err(e) => tracing::warn!("could not delete {}: {e}", path.display()),
            }
            None
        }
    }
}

/// Write a conversion under `fp` to the first directory that accepts it.
/// Returns the written path; failures are logged, never raised.
pub fn store<K: PolyKey>(dirs: &CacheDirs, fp: &Fingerprint, conv: &GridPolyConv<K>) -> Option<PathBuf> {
    let bytes = match conv.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("failed to encode cache: {e}");
            return None;
        }
    };
    let name = fp.file_name();
    for dir in dirs.dirs() {
        let path = dir.join(&name);
        match write_atomic(&path, &bytes) {
            Ok(()) => {
                tracing::info!("saved cache: {}", path.display());
                return Some(path);
            }
            Err(e) => tracing::warn!("cannot write cache {}: {e}", path.display()),
        }
    }
    tracing::error!("cache {name} was not saved");
    None
}

/// Write to a hidden sibling, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("cache.gpc");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conv::IndexRaster;
    use crate::grid::Grid;
    use ndarray::arr2;

    fn conv() -> GridPolyConv<i64> {
        GridPolyConv::new(vec![5, 9], IndexRaster::Single(arr2(&[[1, 2], [0, 2]]))).unwrap()
    }

    fn grid() -> Grid {
        Grid::new(1.0, (2, 2), (0.0, 2.0), None).unwrap()
    }

    #[test]
    fn caching_levels_from_integers() {
        assert_eq!(CacheLevel::try_from(0).unwrap(), CacheLevel::None);
        assert_eq!(CacheLevel::try_from(2).unwrap(), CacheLevel::Strict);
        assert!(matches!(CacheLevel::try_from(3), Err(Error::Config(_))));
        assert_eq!(CacheLevel::default(), CacheLevel::Standard);
    }

    #[test]
    fn search_dirs_follow_source() {
        let dirs = CacheDirs::search_from(Some(Path::new("data/catchments.shp")));
        assert_eq!(dirs.dirs(), vec![Path::new("data"), Path::new(".")]);
        let bare = CacheDirs::search_from(Some(Path::new("catchments.shp")));
        assert_eq!(bare.dirs(), vec![Path::new(".")]);
        let none = CacheDirs::search_from(None);
        assert_eq!(none.dirs(), vec![Path::new(".")]);
    }

    // the only test that touches the environment; keep every case in it
    #[test]
    fn cache_dir_override_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"").unwrap();
        let source = Path::new("data/catchments.shp");

        unsafe { std::env::set_var(CACHE_DIR_ENV, &file) };
        let err = CacheDirs::from_env(Some(source));
        unsafe { std::env::set_var(CACHE_DIR_ENV, dir.path()) };
        let over = CacheDirs::from_env(Some(source));
        unsafe { std::env::remove_var(CACHE_DIR_ENV) };
        let default = CacheDirs::from_env(Some(source));

        assert!(matches!(err, Err(Error::Config(_))));
        assert_eq!(over.unwrap().dirs(), vec![dir.path()]);
        assert_eq!(default.unwrap().dirs(), vec![Path::new("data"), Path::new(".")]);
    }

    #[test]
    fn store_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = CacheDirs::new(dir.path());
        let fp = Fingerprint::standard(&grid(), &[5, 9], 1);

        assert!(lookup::<i64>(&dirs, &fp, CacheLevel::Standard).is_none());
        let path = store(&dirs, &fp, &conv()).unwrap();
        assert_eq!(path, dir.path().join(fp.file_name()));
        assert_eq!(lookup::<i64>(&dirs, &fp, CacheLevel::Standard).unwrap(), conv());
        assert!(lookup::<i64>(&dirs, &fp, CacheLevel::None).is_none());
    }

    #[test]
    fn standard_accepts_strict_file_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = CacheDirs::new(dir.path());
        let strict = Fingerprint::strict(&grid(), &[5, 9], 1, &[]);
        store(&dirs, &strict, &conv()).unwrap();

        let standard = Fingerprint::standard(&grid(), &[5, 9], 1);
        assert_eq!(find_cache(dir.path(), &standard, CacheLevel::Standard), Some(dir.path().join(strict.file_name())));
        assert!(lookup::<i64>(&dirs, &standard, CacheLevel::Standard).is_some());

        // strict never falls back to a prefix match
        let other = Fingerprint::strict(&grid(), &[5, 9], 1, &[(geo::MultiPolygon(vec![]), 1)]);
        assert_eq!(find_cache(dir.path(), &other, CacheLevel::Strict), None);
    }

    #[test]
    fn corrupt_cache_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = CacheDirs::new(dir.path());
        let fp = Fingerprint::standard(&grid(), &[5, 9], 1);
        let path = dir.path().join(fp.file_name());
        fs::write(&path, b"garbage").unwrap();

        assert!(lookup::<i64>(&dirs, &fp, CacheLevel::Standard).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn store_falls_back_to_next_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let dirs = CacheDirs { override_dir: None, search: vec![missing, dir.path().to_path_buf()] };
        let fp = Fingerprint::standard(&grid(), &[5, 9], 1);

        let path = store(&dirs, &fp, &conv()).unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(lookup::<i64>(&dirs, &fp, CacheLevel::Standard).is_some());
    }
}

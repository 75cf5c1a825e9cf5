use std::fmt::Debug;

use geo::MultiPolygon;
use sha2::{Digest, Sha256};

use crate::grid::Grid;

const PREFIX: &str = "c";
const SUFFIX: &str = ".gpc";
const DIGEST_LEN: usize = 8;

/// Content-derived cache identity of a conversion.
///
/// The standard part hashes the grid, the sorted polygon keys and the
/// refine factor. The strict variant adds a second digest over the polygon
/// geometries, so edits that keep the keys still change the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    primary: String,
    geometry: Option<String>,
}

impl Fingerprint {
    pub fn standard<K: Debug>(grid: &Grid, keys: &[K], refine: u32) -> Self {
        let text = format!("{grid}{keys:?}{refine}");
        Self { primary: digest(text.as_bytes()), geometry: None }
    }

    /// `shapes` pairs each geometry with its 1-based key position.
    pub fn strict<K: Debug>(grid: &Grid, keys: &[K], refine: u32, shapes: &[(MultiPolygon<f64>, u32)]) -> Self {
        let mut sorted: Vec<&(MultiPolygon<f64>, u32)> = shapes.iter().collect();
        sorted.sort_by_key(|(_, idx)| *idx);
        let text = format!("{sorted:?}");
        Self {
            geometry: Some(digest(text.as_bytes())),
            ..Self::standard(grid, keys, refine)
        }
    }

    /// `c<8 hex>[<8 hex>].gpc`
    pub fn file_name(&self) -> String {
        format!("{PREFIX}{}{}{SUFFIX}", self.primary, self.geometry.as_deref().unwrap_or(""))
    }

    /// Leading `c<8 hex>` shared by standard and strict names of the same
    /// grid, keys and refine factor.
    pub fn prefix(&self) -> String {
        format!("{PREFIX}{}", self.primary)
    }
}

/// Whether a directory entry looks like a cache file.
pub(crate) fn is_cache_file_name(name: &str) -> bool {
    name.starts_with(PREFIX) && name.ends_with(SUFFIX) && name.len() > PREFIX.len() + SUFFIX.len()
}

fn digest(bytes: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(bytes));
    hex.truncate(DIGEST_LEN);
    hex
}

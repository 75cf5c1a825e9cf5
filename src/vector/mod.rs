pub mod proj;
pub mod shp;

use std::{fmt, hash::Hash, path::{Path, PathBuf}};

use geo::MultiPolygon;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Requirements on a polygon key: unique, orderable, hashable, and
/// serializable so it can be stored with a cached conversion.
pub trait PolyKey: Clone + Eq + Ord + Hash + fmt::Debug + Serialize + DeserializeOwned {}

impl<T> PolyKey for T where T: Clone + Eq + Ord + Hash + fmt::Debug + Serialize + DeserializeOwned {}

/// Attribute value read from a vector or tabular source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

/// Polygons tagged with keys, plus where they came from.
#[derive(Debug, Clone)]
pub struct PolygonSource<K> {
    features: Vec<(MultiPolygon<f64>, K)>,
    crs: Option<String>,
    path: Option<PathBuf>,
}

impl<K> PolygonSource<K> {
    pub fn new(features: Vec<(MultiPolygon<f64>, K)>) -> Self {
        Self { features, crs: None, path: None }
    }

    /// Coordinate reference of the features (PROJ string).
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        let crs = crs.into();
        self.crs = (!crs.trim().is_empty()).then_some(crs);
        self
    }

    /// File the features were read from; its directory is searched for caches.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[inline]
    pub fn features(&self) -> &[(MultiPolygon<f64>, K)] { &self.features }

    #[inline]
    pub fn crs(&self) -> Option<&str> { self.crs.as_deref() }

    #[inline]
    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    #[inline]
    pub fn len(&self) -> usize { self.features.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.features.is_empty() }
}

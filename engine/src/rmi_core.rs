//! Two-stage recursive model index (RMI) loaded from a pre-trained blob.
//!
//! Level 0 is a cubic polynomial of the key that selects a leaf. Each leaf is
//! a linear model plus the worst-case absolute error observed at training
//! time. Training happens elsewhere; this module only loads, evaluates and
//! (for tooling) writes the parameter blob.
//!
//! Blob layout, native byte order:
//!
//! ```text
//! offset  field
//! 0       magic  b"LBRMI001"
//! 8       u64    dataset size the model was trained on
//! 16      u64    leaf count L (>= 1)
//! 24      u64    training time in nanoseconds
//! 32      4 x f64 level-0 cubic coefficients a, b, c, d
//! 64      L x { f64 intercept, f64 slope, u64 error }
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;

use crate::dataset::read_ne_u64;
use crate::error::{LoadError, Result};
use crate::index::{PointEstimate, PositionOracle, Window};

pub const MODEL_MAGIC: &[u8; 8] = b"LBRMI001";
pub const HEADER_BYTES: usize = 64;
pub const LEAF_BYTES: usize = 24;

/// Level-1 linear model for one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeafModel {
    pub intercept: f64,
    pub slope: f64,
    /// Maximum absolute distance between prediction and true position.
    pub error: u64,
}

impl LeafModel {
    #[inline(always)]
    fn predict(&self, key: u64) -> f64 {
        self.intercept + self.slope * key as f64
    }
}

/// Header fields of a model blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelHeader {
    pub dataset_size: u64,
    pub leaf_count: u64,
    pub build_time_ns: u64,
    pub level0: [f64; 4],
}

/// Owned RMI parameters.
#[derive(Debug, Clone)]
pub struct RegressionModel {
    dataset_size: usize,
    build_time_ns: u64,
    level0: [f64; 4],
    leaves: Vec<LeafModel>,
}

impl RegressionModel {
    /// Assemble a model from already-trained parameters.
    pub fn from_parts(
        dataset_size: usize,
        level0: [f64; 4],
        leaves: Vec<LeafModel>,
        build_time_ns: u64,
    ) -> std::result::Result<Self, String> {
        if leaves.is_empty() {
            return Err("model has no leaves".to_string());
        }
        if level0.iter().any(|c| !c.is_finite()) {
            return Err(format!("non-finite level-0 coefficients {level0:?}"));
        }
        if let Some(i) = leaves
            .iter()
            .position(|l| !l.intercept.is_finite() || !l.slope.is_finite())
        {
            return Err(format!("leaf {i} has non-finite coefficients"));
        }
        Ok(Self {
            dataset_size,
            build_time_ns,
            level0,
            leaves,
        })
    }

    /// Load a blob, validating its layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| io_error(path, source))?;

        let header = Self::parse_header(path, &bytes)?;
        Self::check_len(path, &header, bytes.len() as u64)?;

        let leaves = bytes[HEADER_BYTES..]
            .chunks_exact(LEAF_BYTES)
            .map(|rec| LeafModel {
                intercept: f64::from_bits(read_ne_u64(&rec[0..8])),
                slope: f64::from_bits(read_ne_u64(&rec[8..16])),
                error: read_ne_u64(&rec[16..24]),
            })
            .collect();

        let dataset_size = usize::try_from(header.dataset_size)
            .map_err(|_| LoadError::malformed(path, "dataset size exceeds address space"))?;
        Self::from_parts(dataset_size, header.level0, leaves, header.build_time_ns)
            .map_err(|reason| LoadError::malformed(path, reason))
    }

    /// Read only the header of a blob.
    ///
    /// The leaves are not read, but the file length must still match the
    /// declared leaf count exactly.
    pub fn read_header(path: impl AsRef<Path>) -> Result<ModelHeader> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| io_error(path, source))?;
        let file_len = file
            .metadata()
            .map_err(|source| io_error(path, source))?
            .len();

        let mut bytes = Vec::with_capacity(HEADER_BYTES);
        file.take(HEADER_BYTES as u64)
            .read_to_end(&mut bytes)
            .map_err(|source| io_error(path, source))?;
        let header = Self::parse_header(path, &bytes)?;
        Self::check_len(path, &header, file_len)?;
        Ok(header)
    }

    /// The blob must be exactly one header plus `leaf_count` leaves.
    fn check_len(path: &Path, header: &ModelHeader, found: u64) -> Result<()> {
        let expected = header
            .leaf_count
            .checked_mul(LEAF_BYTES as u64)
            .and_then(|body| body.checked_add(HEADER_BYTES as u64))
            .ok_or_else(|| LoadError::malformed(path, "leaf count overflows"))?;
        if found < expected {
            return Err(LoadError::Truncated {
                path: path.to_path_buf(),
                expected,
                found,
            });
        }
        if found > expected {
            return Err(LoadError::malformed(
                path,
                format!(
                    "{} trailing bytes after {} leaves",
                    found - expected,
                    header.leaf_count
                ),
            ));
        }
        Ok(())
    }

    fn parse_header(path: &Path, bytes: &[u8]) -> Result<ModelHeader> {
        if bytes.len() < HEADER_BYTES {
            return Err(LoadError::Truncated {
                path: path.to_path_buf(),
                expected: HEADER_BYTES as u64,
                found: bytes.len() as u64,
            });
        }
        if &bytes[0..8] != MODEL_MAGIC {
            return Err(LoadError::malformed(path, "bad magic"));
        }
        let leaf_count = read_ne_u64(&bytes[16..24]);
        if leaf_count == 0 {
            return Err(LoadError::malformed(path, "model has no leaves"));
        }
        let mut level0 = [0.0; 4];
        for (i, coeff) in level0.iter_mut().enumerate() {
            let at = 32 + i * 8;
            *coeff = f64::from_bits(read_ne_u64(&bytes[at..at + 8]));
        }
        Ok(ModelHeader {
            dataset_size: read_ne_u64(&bytes[8..16]),
            leaf_count,
            build_time_ns: read_ne_u64(&bytes[24..32]),
            level0,
        })
    }

    /// Serialize in the blob layout.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(MODEL_MAGIC)?;
        out.write_all(&(self.dataset_size as u64).to_ne_bytes())?;
        out.write_all(&(self.leaves.len() as u64).to_ne_bytes())?;
        out.write_all(&self.build_time_ns.to_ne_bytes())?;
        for coeff in self.level0 {
            out.write_all(&coeff.to_bits().to_ne_bytes())?;
        }
        for leaf in &self.leaves {
            out.write_all(&leaf.intercept.to_bits().to_ne_bytes())?;
            out.write_all(&leaf.slope.to_bits().to_ne_bytes())?;
            out.write_all(&leaf.error.to_ne_bytes())?;
        }
        out.flush()
    }

    /// Level-0 routing: cubic in Horner form, truncated and clamped to a leaf.
    #[inline(always)]
    pub fn leaf_index(&self, key: u64) -> usize {
        let x = key as f64;
        let [a, b, c, d] = self.level0;
        let fpred = ((a * x + b) * x + c) * x + d;
        // `as` saturates and maps NaN to zero.
        (fpred.max(0.0) as usize).min(self.leaves.len() - 1)
    }

    /// Point estimate clamped to `[0, dataset_size - 1]`.
    #[inline(always)]
    pub fn predict(&self, key: u64) -> PointEstimate {
        let leaf = &self.leaves[self.leaf_index(key)];
        let guess = (leaf.predict(key).max(0.0) as usize).min(self.dataset_size.saturating_sub(1));
        PointEstimate {
            guess,
            radius: usize::try_from(leaf.error).unwrap_or(usize::MAX),
        }
    }

    pub fn dataset_size(&self) -> usize {
        self.dataset_size
    }

    pub fn build_time_ns(&self) -> u64 {
        self.build_time_ns
    }

    pub fn leaves(&self) -> &[LeafModel] {
        &self.leaves
    }

    pub fn header(&self) -> ModelHeader {
        ModelHeader {
            dataset_size: self.dataset_size as u64,
            leaf_count: self.leaves.len() as u64,
            build_time_ns: self.build_time_ns,
            level0: self.level0,
        }
    }

    /// Size of the serialized parameters.
    pub fn size_in_bytes(&self) -> usize {
        HEADER_BYTES + self.leaves.len() * LEAF_BYTES
    }
}

/// [`RegressionModel`] bound to the dataset it was trained on.
#[derive(Debug)]
pub struct RegressionOracle {
    model: RegressionModel,
}

impl RegressionOracle {
    /// Load a blob and check it was trained on `dataset_len` keys.
    pub fn load(path: impl AsRef<Path>, dataset_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let model = RegressionModel::load(path)?;
        check_trained_on(path, model.dataset_size() as u64, dataset_len)?;
        tracing::debug!(
            path = %path.display(),
            leaves = model.leaves().len(),
            bytes = model.size_in_bytes(),
            "regression model loaded"
        );
        Ok(Self { model })
    }

    /// Validate a blob against `dataset_len` without loading its leaves.
    ///
    /// Accepts exactly the blobs [`RegressionOracle::load`] accepts for a
    /// well-formed layout, so callers can reject bad models up front.
    pub fn check(path: impl AsRef<Path>, dataset_len: usize) -> Result<ModelHeader> {
        let path = path.as_ref();
        let header = RegressionModel::read_header(path)?;
        check_trained_on(path, header.dataset_size, dataset_len)?;
        Ok(header)
    }

    pub fn new(model: RegressionModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &RegressionModel {
        &self.model
    }
}

fn check_trained_on(path: &Path, trained_on: u64, dataset_len: usize) -> Result<()> {
    if trained_on != dataset_len as u64 {
        return Err(LoadError::malformed(
            path,
            format!("model trained on {trained_on} keys but dataset has {dataset_len}"),
        ));
    }
    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> LoadError {
    if source.kind() == io::ErrorKind::NotFound {
        LoadError::Open {
            path: path.to_path_buf(),
            source,
        }
    } else {
        LoadError::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl PositionOracle for RegressionOracle {
    fn name(&self) -> &str {
        "RMI"
    }

    #[inline(always)]
    fn estimate(&self, key: u64) -> Window {
        self.model.predict(key).window(self.model.dataset_size)
    }

    fn size_in_bytes(&self) -> usize {
        self.model.size_in_bytes()
    }
}

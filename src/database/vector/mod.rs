//! In-memory dense vector index with file persistence.
//!
//! Embeddings live in one row-major `f32` matrix plus a bijection between
//! section ids and matrix rows. Deletions tombstone rows; the matrix is
//! compacted when the tombstone fraction passes a threshold and always
//! before persisting. On disk the index is a little-endian `f32` matrix
//! file next to a JSON mapping file carrying the row order and the
//! embedder identity.


use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const MATRIX_FILE: &str = "embeddings.bin";
pub const MAPPING_FILE: &str = "section_mapping.json";

/// Compaction runs once this fraction of rows is tombstoned.
const COMPACTION_THRESHOLD: f64 = 0.25;

#[derive(Debug, Serialize, Deserialize)]
struct MappingFile {
    embedder: String,
    dimension: usize,
    sections: Vec<i64>,
}

#[derive(Debug)]
pub struct VectorIndex {
    embedder_id: String,
    dimension: usize,
    data: Vec<f32>,
    row_sections: Vec<i64>,
    section_rows: HashMap<i64, usize>,
    tombstones: Vec<bool>,
    dead_rows: usize,
}

impl VectorIndex {
    #[inline]
    pub fn new(embedder_id: &str, dimension: usize) -> Self {
        Self {
            embedder_id: embedder_id.to_string(),
            dimension,
            data: Vec::new(),
            row_sections: Vec::new(),
            section_rows: HashMap::new(),
            tombstones: Vec::new(),
            dead_rows: 0,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of live rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.row_sections.len() - self.dead_rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, section_id: i64) -> bool {
        self.section_rows
            .get(&section_id)
            .is_some_and(|row| !self.tombstones[*row])
    }

    /// Live section ids in ascending order.
    pub fn section_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .row_sections
            .iter()
            .enumerate()
            .filter(|(row, _)| !self.tombstones[*row])
            .map(|(_, id)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn add(&mut self, section_id: i64, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            bail!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            );
        }
        if self.contains(section_id) {
            bail!("Section {section_id} already has an embedding");
        }

        self.data.extend_from_slice(vector);
        self.row_sections.push(section_id);
        self.tombstones.push(false);
        self.section_rows
            .insert(section_id, self.row_sections.len() - 1);

        Ok(())
    }

    /// Tombstone the rows of the given sections. Ids without a row are
    /// ignored. Compacts lazily once enough rows are dead.
    pub fn remove_many(&mut self, section_ids: &[i64]) {
        for section_id in section_ids {
            if let Some(row) = self.section_rows.remove(section_id)
                && !self.tombstones[row]
            {
                self.tombstones[row] = true;
                self.dead_rows += 1;
            }
        }

        if !self.row_sections.is_empty()
            && self.dead_rows as f64 / self.row_sections.len() as f64 > COMPACTION_THRESHOLD
        {
            self.compact();
        }
    }

    /// Rewrite the matrix without tombstoned rows.
    pub fn compact(&mut self) {
        if self.dead_rows == 0 {
            return;
        }

        debug!(
            "Compacting vector index: dropping {} of {} rows",
            self.dead_rows,
            self.row_sections.len()
        );

        let live = self.row_sections.len() - self.dead_rows;
        let mut data = Vec::with_capacity(live * self.dimension);
        let mut row_sections = Vec::with_capacity(live);
        let mut section_rows = HashMap::with_capacity(live);

        for (row, section_id) in self.row_sections.iter().enumerate() {
            if self.tombstones[row] {
                continue;
            }
            let start = row * self.dimension;
            data.extend_from_slice(&self.data[start..start + self.dimension]);
            section_rows.insert(*section_id, row_sections.len());
            row_sections.push(*section_id);
        }

        self.data = data;
        self.row_sections = row_sections;
        self.section_rows = section_rows;
        self.tombstones = vec![false; self.row_sections.len()];
        self.dead_rows = 0;
    }

    /// Cosine similarity of the query against each candidate. Vectors are
    /// unit-norm so this is the inner product. Candidates without a live
    /// row score 0 and stay in the output with that neutral weight.
    pub fn similarity(&self, query: &[f32], candidates: &[i64]) -> Vec<(i64, f32)> {
        candidates
            .iter()
            .map(|section_id| {
                let score = match self.section_rows.get(section_id) {
                    Some(row) if !self.tombstones[*row] && query.len() == self.dimension => {
                        let start = row * self.dimension;
                        crate::embeddings::dot(query, &self.data[start..start + self.dimension])
                    }
                    _ => 0.0,
                };
                (*section_id, score)
            })
            .collect()
    }

    /// Write the matrix and mapping files atomically (temp file + rename).
    /// The matrix is compacted first so persisted data has no dead rows.
    pub fn persist(&mut self, dir: &Path) -> Result<()> {
        self.compact();

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create vector directory: {}", dir.display()))?;

        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        write_atomic(&dir.join(MATRIX_FILE), &bytes)?;

        let mapping = MappingFile {
            embedder: self.embedder_id.clone(),
            dimension: self.dimension,
            sections: self.row_sections.clone(),
        };
        let mapping_json =
            serde_json::to_vec_pretty(&mapping).context("Failed to encode section mapping")?;
        write_atomic(&dir.join(MAPPING_FILE), &mapping_json)?;

        debug!("Persisted {} embeddings to {}", self.len(), dir.display());
        Ok(())
    }

    /// Load a persisted index. Returns `None` when files are missing or when
    /// the matrix, mapping and expected embedder identity disagree, in which
    /// case the caller rebuilds from the store.
    pub fn load(dir: &Path, embedder_id: &str, dimension: usize) -> Result<Option<Self>> {
        let matrix_path = dir.join(MATRIX_FILE);
        let mapping_path = dir.join(MAPPING_FILE);

        if !matrix_path.exists() || !mapping_path.exists() {
            return Ok(None);
        }

        let mapping_json = fs::read(&mapping_path)
            .with_context(|| format!("Failed to read mapping file: {}", mapping_path.display()))?;
        let mapping: MappingFile = match serde_json::from_slice(&mapping_json) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!("Corrupt section mapping, rebuilding vector index: {e}");
                return Ok(None);
            }
        };

        if mapping.embedder != embedder_id || mapping.dimension != dimension {
            warn!(
                "Embedder identity changed ({}/{} -> {}/{}), rebuilding vector index",
                mapping.embedder, mapping.dimension, embedder_id, dimension
            );
            return Ok(None);
        }

        let bytes = fs::read(&matrix_path)
            .with_context(|| format!("Failed to read matrix file: {}", matrix_path.display()))?;
        if bytes.len() != mapping.sections.len() * dimension * 4 {
            warn!(
                "Matrix and mapping disagree ({} bytes for {} rows), rebuilding vector index",
                bytes.len(),
                mapping.sections.len()
            );
            return Ok(None);
        }

        let data: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let mut section_rows = HashMap::with_capacity(mapping.sections.len());
        for (row, section_id) in mapping.sections.iter().enumerate() {
            if section_rows.insert(*section_id, row).is_some() {
                warn!("Duplicate section {section_id} in mapping, rebuilding vector index");
                return Ok(None);
            }
        }

        info!(
            "Loaded {} embeddings ({}-dimensional) from {}",
            mapping.sections.len(),
            dimension,
            dir.display()
        );

        let rows = mapping.sections.len();
        Ok(Some(Self {
            embedder_id: embedder_id.to_string(),
            dimension,
            data,
            row_sections: mapping.sections,
            section_rows,
            tombstones: vec![false; rows],
            dead_rows: 0,
        }))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace file: {}", path.display()))?;
    Ok(())
}

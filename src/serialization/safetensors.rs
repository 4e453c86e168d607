//! `SafeTensors` format for weight checkpoints.
//!
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```
//!
//! Only weights are stored; the architecture is rebuilt from configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{PixelCnnError, Result};

/// State dictionary: mapping from parameter names to tensor data and shapes.
pub type StateDict = BTreeMap<String, (Vec<f32>, Vec<usize>)>;

/// Metadata for a single tensor in `SafeTensors` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorMetadata {
    /// Data type of the tensor (always "F32" here).
    pub dtype: String,
    /// Shape of the tensor.
    pub shape: Vec<usize>,
    /// Data offsets `[start, end]` in the raw data section.
    pub data_offsets: [usize; 2],
}

/// Complete `SafeTensors` metadata structure.
/// Uses `BTreeMap` for deterministic JSON serialization (sorted keys).
pub type SafeTensorsMetadata = BTreeMap<String, TensorMetadata>;

/// Upper bound on the JSON header, guards against garbage length prefixes.
const MAX_HEADER_LEN: u64 = 100 * 1024 * 1024;

/// Encode tensors into `SafeTensors` bytes.
pub fn encode(tensors: &StateDict) -> Result<Vec<u8>> {
    let mut metadata = SafeTensorsMetadata::new();
    let mut raw_data = Vec::new();
    let mut current_offset = 0;

    // BTreeMap already provides sorted iteration
    for (name, (data, shape)) in tensors {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(PixelCnnError::Checkpoint(format!(
                "tensor '{name}' has {} values for shape {shape:?}",
                data.len()
            )));
        }

        let start_offset = current_offset;
        let end_offset = current_offset + data.len() * 4;

        metadata.insert(
            name.clone(),
            TensorMetadata {
                dtype: "F32".to_string(),
                shape: shape.clone(),
                data_offsets: [start_offset, end_offset],
            },
        );

        for &value in data {
            raw_data.extend_from_slice(&value.to_le_bytes());
        }

        current_offset = end_offset;
    }

    let metadata_json = serde_json::to_string(&metadata)?;
    let metadata_bytes = metadata_json.as_bytes();
    let metadata_len = metadata_bytes.len() as u64;

    let mut output = Vec::with_capacity(8 + metadata_bytes.len() + raw_data.len());
    output.extend_from_slice(&metadata_len.to_le_bytes());
    output.extend_from_slice(metadata_bytes);
    output.extend_from_slice(&raw_data);
    Ok(output)
}

/// Decode `SafeTensors` bytes into a state dictionary.
///
/// # Errors
///
/// Returns [`PixelCnnError::Checkpoint`] if:
/// - Header is shorter than 8 bytes or its length prefix is out of range
/// - JSON metadata fails to parse
/// - A tensor is not F32, or its offsets/shape disagree with the data section
pub fn decode(bytes: &[u8]) -> Result<StateDict> {
    let header: [u8; 8] = bytes
        .get(..8)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| PixelCnnError::Checkpoint("file shorter than 8-byte header".to_string()))?;
    let metadata_len = u64::from_le_bytes(header);
    if metadata_len > MAX_HEADER_LEN || 8 + metadata_len as usize > bytes.len() {
        return Err(PixelCnnError::Checkpoint(format!(
            "metadata length {metadata_len} exceeds file size {}",
            bytes.len()
        )));
    }

    let data_start = 8 + metadata_len as usize;
    let metadata: SafeTensorsMetadata = serde_json::from_slice(&bytes[8..data_start])
        .map_err(|e| PixelCnnError::Checkpoint(format!("invalid metadata JSON: {e}")))?;
    let raw = &bytes[data_start..];

    let mut state = StateDict::new();
    for (name, meta) in metadata {
        if meta.dtype != "F32" {
            return Err(PixelCnnError::Checkpoint(format!(
                "tensor '{name}' has unsupported dtype {}",
                meta.dtype
            )));
        }
        let [start, end] = meta.data_offsets;
        let byte_len = meta
            .shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .and_then(|numel| numel.checked_mul(4))
            .ok_or_else(|| {
                PixelCnnError::Checkpoint(format!(
                    "tensor '{name}' shape {:?} overflows",
                    meta.shape
                ))
            })?;
        if start > end || end > raw.len() || end - start != byte_len {
            return Err(PixelCnnError::Checkpoint(format!(
                "tensor '{name}' offsets [{start}, {end}) invalid for shape {:?}",
                meta.shape
            )));
        }

        let data: Vec<f32> = raw[start..end]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        state.insert(name, (data, meta.shape));
    }

    Ok(state)
}

/// Saves tensors to a `SafeTensors` file.
pub fn save_safetensors<P: AsRef<Path>>(path: P, tensors: &StateDict) -> Result<()> {
    let bytes = encode(tensors)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Loads tensors from a `SafeTensors` file.
pub fn load_safetensors<P: AsRef<Path>>(path: P) -> Result<StateDict> {
    let bytes = fs::read(path)?;
    decode(&bytes)
}

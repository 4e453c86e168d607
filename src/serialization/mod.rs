//! Weight serialization.
//!
//! ## `SafeTensors` Format
//! Industry-standard format compatible with the `HuggingFace` ecosystem.
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```
//!
//! Architecture descriptions (JSON/YAML) are produced by
//! [`crate::pixelcnn::GraphDescription`]; this module only stores weights.

pub mod safetensors;

pub use safetensors::{load_safetensors, save_safetensors, StateDict};

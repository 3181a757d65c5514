//! Bincode snapshot format.

use std::io::{Read, Write};

use crate::serialization::{ModelSerializer, ModelSnapshot, SerializationError};

/// Compact binary snapshot format.
///
/// The format of choice for model files; see [`JsonSerializer`] for a
/// human-readable alternative.
///
/// [`JsonSerializer`]: crate::serialization::JsonSerializer
pub struct BincodeSerializer;

impl ModelSerializer for BincodeSerializer {
    fn serialize<W: Write>(snapshot: &ModelSnapshot, writer: W) -> Result<(), SerializationError> {
        bincode::serialize_into(writer, snapshot)?;
        Ok(())
    }

    fn deserialize<R: Read>(reader: R) -> Result<ModelSnapshot, SerializationError> {
        Ok(bincode::deserialize_from(reader)?)
    }
}

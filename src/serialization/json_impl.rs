//! JSON snapshot format.

use std::io::{Read, Write};

use crate::serialization::{ModelSerializer, ModelSnapshot, SerializationError};

/// Human-readable snapshot format, useful for inspecting trained
/// parameters.
pub struct JsonSerializer;

impl ModelSerializer for JsonSerializer {
    fn serialize<W: Write>(snapshot: &ModelSnapshot, writer: W) -> Result<(), SerializationError> {
        serde_json::to_writer(writer, snapshot)?;
        Ok(())
    }

    fn deserialize<R: Read>(reader: R) -> Result<ModelSnapshot, SerializationError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

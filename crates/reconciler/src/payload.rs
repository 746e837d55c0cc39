//! Decoding configuration payloads into resource descriptors.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::ManagedResourceDescriptor;

/// Payload formats the agent decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Yaml,
}

impl FromStr for ContentType {
    type Err = Error;

    /// Media-type parameters (`; charset=utf-8`) are ignored. An empty
    /// content type is treated as YAML, which also accepts JSON documents.
    fn from_str(content_type: &str) -> Result<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" | "text/json" => Ok(Self::Json),
            "" | "application/yaml" | "application/x-yaml" | "text/yaml" | "text/x-yaml" => {
                Ok(Self::Yaml)
            }
            _ => Err(Error::unknown_content_type(content_type)),
        }
    }
}

/// Decode a payload of the declared content type into a descriptor.
///
/// # Errors
///
/// Returns [`Error::UnknownContentType`] for unrecognized content types and
/// [`Error::Decode`] when the bytes do not parse or required fields are missing.
pub fn decode_descriptor(body: &[u8], content_type: &str) -> Result<ManagedResourceDescriptor> {
    let descriptor: ManagedResourceDescriptor = match content_type.parse::<ContentType>()? {
        ContentType::Json => {
            serde_json::from_slice(body).map_err(|e| Error::decode(e.to_string()))?
        }
        ContentType::Yaml => {
            serde_yaml::from_slice(body).map_err(|e| Error::decode(e.to_string()))?
        }
    };

    if descriptor.name().is_none() {
        return Err(Error::decode(
            "descriptor names no object: operationInfo.name and metadata.name are empty",
        ));
    }

    tracing::debug!(
        resource = %descriptor.resource(),
        name = descriptor.name().unwrap_or_default(),
        operation = %descriptor.operation(),
        "Decoded resource descriptor"
    );

    Ok(descriptor)
}

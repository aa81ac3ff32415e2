//! ADX definition compiler
//!
//! Turns an ADX sensor map into a [`DecoderSchema`].

use uuid::Uuid;

use super::error::CompileError;
use super::fields::{self, DEFAULT_MASK};
use super::gauges::derive_gauges;
use super::markup::{markup_start, parse_document, Element};
use super::types::{BitDef, DecoderSchema, ParameterDef, MAX_FRAME_LENGTH};

const DESCRIPTION: &str = "ALDL Definition";

/// Compile an ADX document into a decoder schema.
///
/// Bytes before the first `<` are ignored; some definition files carry a
/// binary header. `fallback_name` names the schema when the root element
/// has no `title`.
pub fn compile(document: &str, fallback_name: &str) -> Result<DecoderSchema, CompileError> {
    let start = markup_start(document).ok_or(CompileError::NoMarkup)?;
    let doc = parse_document(document[start..].trim());

    let root = doc.root();
    let name = root
        .and_then(|r| r.attribute("title"))
        .unwrap_or(fallback_name)
        .to_string();
    let mask = root
        .and_then(|r| r.attribute("mask"))
        .unwrap_or(DEFAULT_MASK)
        .to_string();

    let mut parameters = Vec::new();
    let mut bit_flags = Vec::new();
    for node in doc.descendants("ADXVALUE") {
        if let Some(param) = parse_parameter(node) {
            bit_flags.extend(parse_bits(node, &param));
            parameters.push(param);
        }
    }

    let schema = DecoderSchema {
        id: Uuid::new_v4().to_string(),
        name,
        mask,
        description: DESCRIPTION.to_string(),
        request_command: fields::request_command(&doc),
        expected_frame_length: DecoderSchema::derive_frame_length(&parameters),
        baud_rate: fields::baud_rate(&doc),
        echo_cancel: fields::echo_cancel(&doc),
        gauges: derive_gauges(&parameters),
        parameters,
        bit_flags,
    };

    tracing::debug!(
        "Compiled definition '{}': {} parameters, {} bits, frame length {}, request {:02X?}",
        schema.name,
        schema.parameters.len(),
        schema.bit_flags.len(),
        schema.expected_frame_length,
        schema.request_command
    );

    Ok(schema)
}

/// A parameter needs `id`, `title` and a `<packetoffset>`; anything less is
/// skipped, as is a parameter that would not fit in [`MAX_FRAME_LENGTH`].
fn parse_parameter(node: &Element) -> Option<ParameterDef> {
    let id = node.attribute("id")?;
    let title = node.attribute("title")?;
    let byte_offset = fields::index_field(node, "packetoffset")?;

    let byte_count = match fields::index_field(node, "bytecount") {
        Some(2) => 2,
        _ => 1,
    };

    if byte_offset.saturating_add(byte_count) >= MAX_FRAME_LENGTH {
        tracing::warn!("Skipping parameter '{id}': offset {byte_offset} is beyond the frame limit");
        return None;
    }

    Some(ParameterDef {
        id: id.to_string(),
        title: title.to_string(),
        units: fields::text_field(node, "units").unwrap_or_default().to_string(),
        byte_offset,
        byte_count,
        scale: fields::float_field(node, &["factor", "scale"], 1.0),
        offset: fields::float_field(node, &["offset"], 0.0),
    })
}

fn parse_bits(node: &Element, parent: &ParameterDef) -> Vec<BitDef> {
    node.descendants("ADXBIT")
        .enumerate()
        .filter_map(|(index, bit)| {
            let title = bit.attribute("title")?;
            let bit_position = fields::index_field(bit, "bitposition")
                .and_then(|pos| u8::try_from(pos).ok())
                .filter(|pos| *pos < 8)?;
            let id = bit
                .attribute("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("bit-{}-{}", parent.id, index));

            Some(BitDef {
                id,
                title: title.to_string(),
                byte_offset: parent.byte_offset,
                bit_position,
            })
        })
        .collect()
}

//! Minimal ONNX protobuf reader and the IR version downgrade.
//!
//! Only the fields needed to describe a model's interface are declared;
//! `prost` skips everything else on decode. The downgrade never goes
//! through these types: it patches field 1 of `ModelProto` in the raw
//! bytes so that graph, weights and metadata are copied verbatim.

use prost::bytes::Buf;
use prost::encoding::{decode_key, decode_varint, encode_key, encode_varint, WireType};
use prost::Message;

use crate::engine::{Dim, TensorSpec};
use crate::error::EngineError;

/// IR version written by the compatibility downgrade.
pub const REMEDIATED_IR_VERSION: i64 = 3;

/// `ModelProto.ir_version` field number.
const IR_VERSION_TAG: u32 = 1;

#[derive(Clone, PartialEq, Message)]
pub struct ModelProto {
    #[prost(int64, tag = "1")]
    pub ir_version: i64,
    #[prost(string, tag = "2")]
    pub producer_name: String,
    #[prost(message, optional, tag = "7")]
    pub graph: Option<GraphProto>,
    #[prost(message, repeated, tag = "8")]
    pub opset_import: Vec<OperatorSetIdProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OperatorSetIdProto {
    #[prost(string, tag = "1")]
    pub domain: String,
    #[prost(int64, tag = "2")]
    pub version: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GraphProto {
    #[prost(message, repeated, tag = "1")]
    pub node: Vec<NodeProto>,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, repeated, tag = "5")]
    pub initializer: Vec<TensorProto>,
    #[prost(message, repeated, tag = "11")]
    pub input: Vec<ValueInfoProto>,
    #[prost(message, repeated, tag = "12")]
    pub output: Vec<ValueInfoProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NodeProto {
    #[prost(string, repeated, tag = "1")]
    pub input: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub output: Vec<String>,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub op_type: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorProto {
    #[prost(int64, repeated, tag = "1")]
    pub dims: Vec<i64>,
    #[prost(int32, tag = "2")]
    pub data_type: i32,
    #[prost(float, repeated, tag = "4")]
    pub float_data: Vec<f32>,
    #[prost(string, tag = "8")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueInfoProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub r#type: Option<TypeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TypeProto {
    #[prost(oneof = "type_proto::Value", tags = "1")]
    pub value: Option<type_proto::Value>,
}

pub mod type_proto {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        #[prost(message, tag = "1")]
        TensorType(super::TensorTypeProto),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorTypeProto {
    #[prost(int32, tag = "1")]
    pub elem_type: i32,
    #[prost(message, optional, tag = "2")]
    pub shape: Option<TensorShapeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorShapeProto {
    #[prost(message, repeated, tag = "1")]
    pub dim: Vec<DimensionProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DimensionProto {
    #[prost(oneof = "dimension::Value", tags = "1, 2")]
    pub value: Option<dimension::Value>,
}

pub mod dimension {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        #[prost(int64, tag = "1")]
        DimValue(i64),
        #[prost(string, tag = "2")]
        DimParam(String),
    }
}

/// ONNX `TensorProto.DataType.FLOAT`.
pub const ELEM_TYPE_FLOAT: i32 = 1;

/// Interface of a model as declared in its graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    pub ir_version: i64,
    /// Graph inputs that are not initializers, in declaration order
    pub inputs: Vec<TensorSpec>,
    /// Graph outputs, in declaration order
    pub outputs: Vec<TensorSpec>,
}

/// Decode a model's interface.
pub fn read_metadata(model: &[u8]) -> Result<ModelMetadata, EngineError> {
    let proto = ModelProto::decode(model)
        .map_err(|e| EngineError::InvalidModel(format!("not an ONNX model: {e}")))?;
    let graph = proto
        .graph
        .ok_or_else(|| EngineError::InvalidModel("model has no graph".to_string()))?;

    let initializers: Vec<&str> = graph.initializer.iter().map(|t| t.name.as_str()).collect();
    let inputs = graph
        .input
        .iter()
        .filter(|v| !initializers.contains(&v.name.as_str()))
        .map(tensor_spec)
        .collect();
    let outputs = graph.output.iter().map(tensor_spec).collect();

    Ok(ModelMetadata {
        ir_version: proto.ir_version,
        inputs,
        outputs,
    })
}

fn tensor_spec(value: &ValueInfoProto) -> TensorSpec {
    let shape = match value.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(type_proto::Value::TensorType(tensor)) => tensor
            .shape
            .as_ref()
            .map(|s| s.dim.iter().map(dim_of).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    TensorSpec {
        name: value.name.clone(),
        shape,
    }
}

fn dim_of(dim: &DimensionProto) -> Dim {
    match &dim.value {
        Some(dimension::Value::DimValue(v)) if *v > 0 => Dim::Fixed(*v as usize),
        Some(dimension::Value::DimParam(p)) if !p.is_empty() => Dim::Symbolic(p.clone()),
        _ => Dim::Symbolic("?".to_string()),
    }
}

/// Rewrite the model's IR version marker.
///
/// Every top-level field other than `ir_version` is copied byte for byte;
/// the new marker is written first.
pub fn set_ir_version(model: &[u8], version: i64) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::with_capacity(model.len() + 11);
    encode_key(IR_VERSION_TAG, WireType::Varint, &mut out);
    encode_varint(version as u64, &mut out);

    let mut buf = model;
    while buf.has_remaining() {
        let start = model.len() - buf.remaining();
        let (tag, wire_type) = decode_key(&mut buf).map_err(malformed)?;
        skip_field(wire_type, &mut buf)?;
        let end = model.len() - buf.remaining();
        if tag != IR_VERSION_TAG {
            out.extend_from_slice(&model[start..end]);
        }
    }
    Ok(out)
}

fn skip_field(wire_type: WireType, buf: &mut &[u8]) -> Result<(), EngineError> {
    let len = match wire_type {
        WireType::Varint => {
            decode_varint(buf).map_err(malformed)?;
            return Ok(());
        }
        WireType::SixtyFourBit => 8,
        WireType::ThirtyTwoBit => 4,
        WireType::LengthDelimited => decode_varint(buf).map_err(malformed)? as usize,
        WireType::StartGroup | WireType::EndGroup => {
            return Err(EngineError::InvalidModel(
                "unexpected group field in ONNX model".to_string(),
            ))
        }
    };
    if buf.remaining() < len {
        return Err(EngineError::InvalidModel(
            "truncated field in ONNX model".to_string(),
        ));
    }
    buf.advance(len);
    Ok(())
}

fn malformed(err: prost::DecodeError) -> EngineError {
    EngineError::InvalidModel(format!("not an ONNX model: {err}"))
}

#[cfg(test)]
mod tests {
    use crate::fakes::linear_model;
    use super::*;

    #[test]
    fn test_read_metadata_skips_initializers() {
        let bytes = linear_model(8, 4, 5).encode_to_vec();
        let meta = read_metadata(&bytes).unwrap();

        assert_eq!(meta.ir_version, 8);
        assert_eq!(meta.inputs.len(), 1);
        assert_eq!(meta.inputs[0].name, "x");
        assert_eq!(
            meta.inputs[0].shape,
            vec![Dim::Symbolic("N".to_string()), Dim::Fixed(4)]
        );
        assert_eq!(meta.outputs[0].name, "y");
        assert_eq!(
            meta.outputs[0].shape,
            vec![Dim::Symbolic("N".to_string()), Dim::Fixed(5)]
        );
    }

    #[test]
    fn test_read_metadata_rejects_garbage() {
        let err = read_metadata(b"\xff\xff\xff\xff").unwrap_err();
        assert!(matches!(err, EngineError::InvalidModel(_)));
    }

    #[test]
    fn test_read_metadata_requires_graph() {
        let bytes = ModelProto {
            ir_version: 7,
            ..Default::default()
        }
        .encode_to_vec();
        assert!(matches!(
            read_metadata(&bytes),
            Err(EngineError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_set_ir_version_changes_only_the_marker() {
        let original = linear_model(11, 4, 5).encode_to_vec();
        let patched = set_ir_version(&original, REMEDIATED_IR_VERSION).unwrap();

        let expected = linear_model(REMEDIATED_IR_VERSION, 4, 5).encode_to_vec();
        assert_eq!(patched, expected);
    }

    #[test]
    fn test_set_ir_version_preserves_interface() {
        let original = linear_model(11, 4, 5).encode_to_vec();
        let patched = set_ir_version(&original, REMEDIATED_IR_VERSION).unwrap();

        let before = read_metadata(&original).unwrap();
        let after = read_metadata(&patched).unwrap();
        assert_eq!(after.ir_version, REMEDIATED_IR_VERSION);
        assert_eq!(before.inputs, after.inputs);
        assert_eq!(before.outputs, after.outputs);
    }

    #[test]
    fn test_set_ir_version_inserts_missing_marker() {
        let original = linear_model(0, 2, 1).encode_to_vec();
        let patched = set_ir_version(&original, REMEDIATED_IR_VERSION).unwrap();
        assert_eq!(ModelProto::decode(patched.as_slice()).unwrap().ir_version, 3);
        assert_eq!(patched.len(), original.len() + 2);
    }

    #[test]
    fn test_set_ir_version_rejects_truncated_model() {
        let original = linear_model(9, 4, 5).encode_to_vec();
        let truncated = &original[..original.len() - 3];
        assert!(matches!(
            set_ir_version(truncated, REMEDIATED_IR_VERSION),
            Err(EngineError::InvalidModel(_))
        ));
    }
}

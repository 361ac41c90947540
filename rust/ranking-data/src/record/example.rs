// rust/ranking-data/src/record/example.rs

//! `tf.train.Example` protobuf messages.
//!
//! Field numbers match `tensorflow/core/example/{example,feature}.proto`, so
//! records written by TensorFlow decode here and vice versa.

use std::collections::BTreeMap;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Features {
    #[prost(btree_map = "string, message", tag = "1")]
    pub feature: BTreeMap<String, Feature>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

impl Feature {
    pub fn bytes(values: Vec<Vec<u8>>) -> Self {
        Self {
            kind: Some(feature::Kind::BytesList(BytesList { value: values })),
        }
    }

    pub fn floats(values: Vec<f32>) -> Self {
        Self {
            kind: Some(feature::Kind::FloatList(FloatList { value: values })),
        }
    }

    pub fn int64s(values: Vec<i64>) -> Self {
        Self {
            kind: Some(feature::Kind::Int64List(Int64List { value: values })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_example_roundtrip() {
        let mut feature = BTreeMap::new();
        feature.insert("clicked".to_string(), Feature::int64s(vec![0, 1, -1]));
        feature.insert("int-feature-1".to_string(), Feature::floats(vec![0.5, 1.5, 2.5]));
        feature.insert(
            "categorical-feature-14".to_string(),
            Feature::bytes(vec![vec![1, 0, 0, 0, 0, 0, 0, 0]]),
        );
        let example = Example {
            features: Some(Features { feature }),
        };

        let bytes = example.encode_to_vec();
        let decoded = Example::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, example);
    }

    #[test]
    fn test_decodes_unpacked_int64() {
        // Int64List { value: [3, 4] } written without packing:
        // field 1, varint: 0x08 0x03 0x08 0x04
        let unpacked = [0x08u8, 0x03, 0x08, 0x04];
        let list = Int64List::decode(&unpacked[..]).unwrap();
        assert_eq!(list.value, vec![3, 4]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let garbage = [0xffu8, 0xff, 0xff];
        assert!(Example::decode(&garbage[..]).is_err());
    }
}

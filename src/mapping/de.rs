//! `serde::Deserializer` over configuration trees.
//!
//! Every scalar in a tree is a string, so the deserializer parses the
//! requested primitive type out of it. Sequences accept either an array or a
//! comma-separated value; enums accept a variant name or a single-key map.

use crate::properties::split_list;
use crate::tree::{ArrayNode, MapNode, TreeNode, join};
use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use std::fmt;

/// Failure while mapping a node, with the path relative to the mapped root.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingError {
    segments: Vec<String>,
    message: String,
}

impl MappingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            segments: Vec::new(),
            message: message.into(),
        }
    }

    /// Record that the error happened below `segment`.
    fn within(mut self, segment: impl Into<String>) -> Self {
        self.segments.insert(0, segment.into());
        self
    }

    /// Full path of the failing node below `base`.
    pub fn path_from(&self, base: &str) -> String {
        self.segments
            .iter()
            .fold(base.to_string(), |path, segment| join(&path, segment))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path_from(""), self.message)
        }
    }
}

impl std::error::Error for MappingError {}

impl de::Error for MappingError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::new(msg.to_string())
    }
}

type Result<T> = std::result::Result<T, MappingError>;

/// Deserializer for any node.
pub struct NodeDeserializer<'de> {
    node: &'de TreeNode,
}

impl<'de> NodeDeserializer<'de> {
    pub fn new(node: &'de TreeNode) -> Self {
        Self { node }
    }

    fn scalar(&self, expected: &str) -> Result<ScalarDeserializer> {
        match self.node {
            TreeNode::Value(value) => Ok(ScalarDeserializer::new(value.value())),
            other => Err(MappingError::new(format!(
                "expected {}, found {}",
                expected,
                other.kind()
            ))),
        }
    }
}

macro_rules! forward_to_scalar {
    ($($method:ident => $expected:literal,)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            self.scalar($expected)?.$method(visitor)
        }
    )*};
}

impl<'de> de::Deserializer<'de> for NodeDeserializer<'de> {
    type Error = MappingError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.node {
            TreeNode::Value(value) => visitor.visit_borrowed_str(value.value()),
            TreeNode::Map(map) => visitor.visit_map(MapAccessor::new(map)),
            TreeNode::Array(array) => visitor.visit_seq(ArrayAccessor::new(array)),
        }
    }

    forward_to_scalar! {
        deserialize_bool => "a boolean",
        deserialize_i8 => "an integer",
        deserialize_i16 => "an integer",
        deserialize_i32 => "an integer",
        deserialize_i64 => "an integer",
        deserialize_i128 => "an integer",
        deserialize_u8 => "an integer",
        deserialize_u16 => "an integer",
        deserialize_u32 => "an integer",
        deserialize_u64 => "an integer",
        deserialize_u128 => "an integer",
        deserialize_f32 => "a number",
        deserialize_f64 => "a number",
        deserialize_char => "a character",
        deserialize_bytes => "a value",
        deserialize_byte_buf => "a value",
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.node {
            TreeNode::Value(value) => visitor.visit_borrowed_str(value.value()),
            other => Err(MappingError::new(format!(
                "expected a string, found {}",
                other.kind()
            ))),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.node {
            TreeNode::Array(array) => visitor.visit_seq(ArrayAccessor::new(array)),
            TreeNode::Value(value) => visitor.visit_seq(ListAccessor::new(value.value())),
            TreeNode::Map(_) => Err(MappingError::new("expected a sequence, found map")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.node {
            TreeNode::Map(map) => visitor.visit_map(MapAccessor::new(map)),
            other => Err(MappingError::new(format!(
                "expected a map, found {}",
                other.kind()
            ))),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.node {
            TreeNode::Value(value) => visitor.visit_enum(value.value().trim().into_deserializer()),
            TreeNode::Map(map) => match (map.len(), map.iter().next()) {
                (1, Some((variant, node))) => visitor.visit_enum(EnumAccessor { variant, node }),
                (len, _) => Err(MappingError::new(format!(
                    "expected an enum variant, found map with {} entries",
                    len
                ))),
            },
            TreeNode::Array(_) => Err(MappingError::new("expected an enum variant, found array")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// Deserializer for one scalar string: values, map keys and list items.
pub struct ScalarDeserializer {
    value: String,
}

impl ScalarDeserializer {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    fn invalid(&self, expected: &str, error: impl fmt::Display) -> MappingError {
        MappingError::new(format!("invalid {} '{}': {}", expected, self.value, error))
    }
}

macro_rules! parse_number {
    ($($method:ident => $visit:ident($ty:ty),)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let parsed = self
                .value
                .trim()
                .parse::<$ty>()
                .map_err(|e| self.invalid(stringify!($ty), e))?;
            visitor.$visit(parsed)
        }
    )*};
}

impl<'de> de::Deserializer<'de> for ScalarDeserializer {
    type Error = MappingError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_string(self.value)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value.trim().to_ascii_lowercase().as_str() {
            "true" => visitor.visit_bool(true),
            "false" => visitor.visit_bool(false),
            _ => Err(self.invalid("boolean", "expected true or false")),
        }
    }

    parse_number! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let mut chars = self.value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.invalid("character", "expected exactly one character")),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bytes(self.value.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_byte_buf(self.value.into_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(ListAccessor::new(&self.value))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(self.value.trim().to_string().into_deserializer())
    }

    serde::forward_to_deserialize_any! {
        str string unit unit_struct tuple tuple_struct map struct identifier ignored_any
    }
}

struct MapAccessor<'de> {
    entries: std::vec::IntoIter<(&'de str, &'de TreeNode)>,
    pending: Option<(&'de str, &'de TreeNode)>,
}

impl<'de> MapAccessor<'de> {
    fn new(map: &'de MapNode) -> Self {
        Self {
            entries: map.iter().collect::<Vec<_>>().into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for MapAccessor<'de> {
    type Error = MappingError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let Some((key, node)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some((key, node));
        seed.deserialize(ScalarDeserializer::new(key))
            .map(Some)
            .map_err(|e| e.within(key))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let (key, node) = self
            .pending
            .take()
            .ok_or_else(|| MappingError::new("value requested before key"))?;
        seed.deserialize(NodeDeserializer::new(node))
            .map_err(|e| e.within(key))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct ArrayAccessor<'de> {
    items: std::iter::Enumerate<std::slice::Iter<'de, TreeNode>>,
    remaining: usize,
}

impl<'de> ArrayAccessor<'de> {
    fn new(array: &'de ArrayNode) -> Self {
        Self {
            items: array.iter().enumerate(),
            remaining: array.len(),
        }
    }
}

impl<'de> SeqAccess<'de> for ArrayAccessor<'de> {
    type Error = MappingError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        let Some((index, node)) = self.items.next() else {
            return Ok(None);
        };
        self.remaining -= 1;
        seed.deserialize(NodeDeserializer::new(node))
            .map(Some)
            .map_err(|e| e.within(index.to_string()))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Items of a comma-separated value.
struct ListAccessor {
    items: std::iter::Enumerate<std::vec::IntoIter<String>>,
}

impl ListAccessor {
    fn new(raw: &str) -> Self {
        Self {
            items: split_list(raw).into_iter().enumerate(),
        }
    }
}

impl<'de> SeqAccess<'de> for ListAccessor {
    type Error = MappingError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        let Some((index, item)) = self.items.next() else {
            return Ok(None);
        };
        seed.deserialize(ScalarDeserializer::new(item))
            .map(Some)
            .map_err(|e| e.within(index.to_string()))
    }
}

struct EnumAccessor<'de> {
    variant: &'de str,
    node: &'de TreeNode,
}

impl<'de> EnumAccess<'de> for EnumAccessor<'de> {
    type Error = MappingError;
    type Variant = VariantAccessor<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(ScalarDeserializer::new(self.variant))?;
        Ok((
            variant,
            VariantAccessor {
                variant: self.variant,
                node: self.node,
            },
        ))
    }
}

struct VariantAccessor<'de> {
    variant: &'de str,
    node: &'de TreeNode,
}

impl<'de> VariantAccess<'de> for VariantAccessor<'de> {
    type Error = MappingError;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(NodeDeserializer::new(self.node))
            .map_err(|e| e.within(self.variant))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(NodeDeserializer::new(self.node), visitor)
            .map_err(|e| e.within(self.variant))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_map(NodeDeserializer::new(self.node), visitor)
            .map_err(|e| e.within(self.variant))
    }
}

//! Argument type tags and their binary pack-format codes.
//!
//! The pack code of every argument feeds the function fingerprint that keys
//! the persisted identifier table. A released mapping must never change
//! meaning: doing so silently reassigns ids in previously serialized files.
//! New tags may be added freely.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declared type of a function or solver argument.
///
/// Parsed verbatim from the `type` field in metadata. Unrecognized names are
/// preserved as [`TypeTag::Other`] so loading never fails on them; they are
/// rejected later, when a fingerprint is computed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// `bool`
    Bool,
    /// `int64`
    Int64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `string`
    String,
    /// `repeated int64`
    RepeatedInt64,
    /// `Shape`
    Shape,
    /// Any other declared type name, kept verbatim.
    Other(String),
}

impl TypeTag {
    /// Parses a declared type name. Never fails.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "bool" => Self::Bool,
            "int64" => Self::Int64,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            "repeated int64" => Self::RepeatedInt64,
            "Shape" => Self::Shape,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the type name as written in metadata.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::RepeatedInt64 => "repeated int64",
            Self::Shape => "Shape",
            Self::Other(name) => name,
        }
    }

    /// Returns the pack-format code, or `None` for an unmapped type.
    #[must_use]
    pub fn pack_format(&self) -> Option<&'static str> {
        pack_format(self)
    }
}

/// Maps a type tag to its pack-format code.
///
/// | tag | code |
/// |-----|------|
/// | `bool` | `B` |
/// | `float`, `double` | `f` |
/// | `int64`, `string` | `i` |
/// | `repeated int64`, `Shape` | `iI` |
///
/// Everything else yields `None`; callers must treat that as an error.
#[must_use]
pub fn pack_format(tag: &TypeTag) -> Option<&'static str> {
    match tag {
        TypeTag::Bool => Some("B"),
        TypeTag::Float | TypeTag::Double => Some("f"),
        TypeTag::Int64 => Some("i"),
        // Strings are serialized as an index into the string table.
        TypeTag::String => Some("i"),
        TypeTag::RepeatedInt64 | TypeTag::Shape => Some("iI"),
        TypeTag::Other(_) => None,
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_codes_are_fixed() {
        assert_eq!(pack_format(&TypeTag::Bool), Some("B"));
        assert_eq!(pack_format(&TypeTag::Float), Some("f"));
        assert_eq!(pack_format(&TypeTag::Double), Some("f"));
        assert_eq!(pack_format(&TypeTag::Int64), Some("i"));
        assert_eq!(pack_format(&TypeTag::String), Some("i"));
        assert_eq!(pack_format(&TypeTag::RepeatedInt64), Some("iI"));
        assert_eq!(pack_format(&TypeTag::Shape), Some("iI"));
    }

    #[test]
    fn unknown_type_has_no_code() {
        let tag = TypeTag::parse("repeated float");
        assert_eq!(tag, TypeTag::Other("repeated float".to_string()));
        assert_eq!(tag.pack_format(), None);
    }

    #[test]
    fn parse_round_trips_through_as_str() {
        for name in ["bool", "int64", "float", "double", "string", "repeated int64", "Shape"] {
            assert_eq!(TypeTag::parse(name).as_str(), name);
        }
    }

    #[test]
    fn type_names_are_case_sensitive() {
        assert!(matches!(TypeTag::parse("shape"), TypeTag::Other(_)));
        assert!(matches!(TypeTag::parse("Int64"), TypeTag::Other(_)));
    }
}

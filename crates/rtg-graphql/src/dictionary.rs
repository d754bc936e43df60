//! The type dictionary: the gateway's view of the upstream schema.
//!
//! Built once from the introspection response, the dictionary maps type
//! names to their kind, fields and possible concrete types. It drives
//! fragment generation, include resolution and resource-type validation;
//! a name that is missing here is the authoritative signal that a REST
//! path does not address a known resource and must be proxied as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of a schema type as reported by introspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum TypeKind {
    Object,
    Scalar,
    Enum,
    List,
    Interface,
    Union,
    NonNull,
    InputObject,
    /// Anything the upstream reports that we do not model, including an
    /// `ofType` chain that never reaches a named type. Callers treat
    /// unknown-kind fields as unselectable and skip them.
    #[default]
    Unknown,
}

impl From<String> for TypeKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "OBJECT" => Self::Object,
            "SCALAR" => Self::Scalar,
            "ENUM" => Self::Enum,
            "LIST" => Self::List,
            "INTERFACE" => Self::Interface,
            "UNION" => Self::Union,
            "NON_NULL" => Self::NonNull,
            "INPUT_OBJECT" => Self::InputObject,
            _ => Self::Unknown,
        }
    }
}

/// A concrete member of a union or interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossibleType {
    pub name: String,
    pub kind: TypeKind,
}

/// A field of a schema type, with its wrapper chain already resolved to
/// the first named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// Name of the resolved type; empty when the chain never named one.
    pub type_name: String,
    pub kind: TypeKind,
}

/// One entry of the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaType {
    pub name: String,
    pub kind: TypeKind,
    pub possible_types: Vec<PossibleType>,
    pub fields: Vec<FieldDef>,
}

/// Immutable name → [`SchemaType`] mapping.
#[derive(Debug, Clone, Default)]
pub struct TypeDictionary {
    types: BTreeMap<String, SchemaType>,
}

impl TypeDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema_type: SchemaType) {
        self.types.insert(schema_type.name.clone(), schema_type);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SchemaType)> {
        self.types.iter()
    }

    /// Field lookup on a type, `None` when either link is missing.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.get(type_name)?
            .fields
            .iter()
            .find(|field| field.name == field_name)
    }
}

//! Introspection document and response model.
//!
//! At startup the gateway issues a single introspection query against the
//! upstream and distills the answer into a [`TypeDictionary`]. The nested
//! `ofType` chain in the document is bounded by [`OF_TYPE_DEPTH`]: deeper
//! wrapper stacks (e.g. `NON_NULL` of `LIST` of `NON_NULL` of ...) are
//! truncated and their fields treated as unknown.

use serde::Deserialize;

use crate::dictionary::{FieldDef, PossibleType, SchemaType, TypeDictionary, TypeKind};

/// How many `ofType` levels the introspection document unwraps.
pub const OF_TYPE_DEPTH: usize = 3;

/// Builds the introspection document sent to the upstream.
pub fn introspection_query() -> String {
    let mut of_type = String::from("name kind");
    for _ in 0..OF_TYPE_DEPTH {
        of_type = format!("name kind ofType {{ {of_type} }}");
    }
    format!(
        "{{ __schema {{ types {{ name kind possibleTypes {{ name kind }} \
         fields {{ name type {{ {of_type} }} }} }} }} }}"
    )
}

#[derive(Debug, Deserialize)]
pub struct IntrospectionResponse {
    #[serde(default)]
    pub data: IntrospectionData,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionData {
    #[serde(rename = "__schema", default)]
    pub schema: IntrospectionSchema,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionSchema {
    #[serde(default)]
    pub types: Vec<IntrospectionType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionType {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(rename = "possibleTypes", default)]
    pub possible_types: Option<Vec<PossibleType>>,
    #[serde(default)]
    pub fields: Option<Vec<IntrospectionField>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionField {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: TypeRef,
}

/// A (possibly wrapped) type reference with its `ofType` chain.
#[derive(Debug, Default, Deserialize)]
pub struct TypeRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<TypeKind>,
    #[serde(rename = "ofType", default)]
    pub of_type: Option<Box<TypeRef>>,
}

/// Walks an `ofType` chain and returns the first named type together with
/// its kind. A chain that ends without naming a type yields an empty name
/// and [`TypeKind::Unknown`].
pub fn resolve_type_ref(type_ref: &TypeRef) -> (String, TypeKind) {
    if let Some(name) = type_ref.name.as_deref() {
        if !name.is_empty() {
            return (name.to_string(), type_ref.kind.unwrap_or_default());
        }
    }
    match &type_ref.of_type {
        Some(inner) => resolve_type_ref(inner),
        None => (String::new(), TypeKind::Unknown),
    }
}

/// Distills an introspection response into the type dictionary, dropping
/// `__`-prefixed meta types and unnamed entries.
pub fn build_dictionary(response: IntrospectionResponse) -> TypeDictionary {
    let mut dictionary = TypeDictionary::new();

    for entry in response.data.schema.types {
        let name = entry.name.unwrap_or_default();
        if name.is_empty() || name.starts_with("__") {
            continue;
        }

        let fields = entry
            .fields
            .unwrap_or_default()
            .into_iter()
            .map(|field| {
                let (type_name, kind) = resolve_type_ref(&field.field_type);
                FieldDef {
                    name: field.name,
                    type_name,
                    kind,
                }
            })
            .collect();

        dictionary.insert(SchemaType {
            name,
            kind: entry.kind,
            possible_types: entry.possible_types.unwrap_or_default(),
            fields,
        });
    }

    dictionary
}

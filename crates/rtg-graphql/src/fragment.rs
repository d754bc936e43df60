//! Fragment generation: a bounded walk of the dictionary.
//!
//! The selection for a type mirrors its dictionary entry. Objects recurse
//! until [`FRAGMENT_DEPTH_LIMIT`]; at the ceiling they are omitted
//! entirely, which also makes cyclic schemas (Patient → Reference →
//! Patient) safe to walk without cycle detection. Unions and interfaces
//! are never expanded here; include handling selects their concrete
//! branches explicitly.

use crate::ast::{Field, Fragment};
use crate::dictionary::{FieldDef, TypeDictionary, TypeKind};

/// Maximum object-nesting depth of a generated fragment.
pub const FRAGMENT_DEPTH_LIMIT: usize = 3;

/// Conventional fragment name for a type.
pub fn fragment_name(type_name: &str) -> String {
    format!("{type_name}Fragment")
}

/// Generates the selection fragment for a named type. An unknown type
/// yields a fragment with an empty selection.
pub fn fragment_for(dictionary: &TypeDictionary, type_name: &str) -> Fragment {
    let fields = dictionary
        .get(type_name)
        .map(|schema| build_field_tree(dictionary, &schema.fields, 0))
        .unwrap_or_default();

    Fragment {
        name: fragment_name(type_name),
        on_type: type_name.to_string(),
        fields,
    }
}

fn build_field_tree(dictionary: &TypeDictionary, fields: &[FieldDef], depth: usize) -> Vec<Field> {
    let mut selection = Vec::new();
    for field in fields {
        match field.kind {
            TypeKind::Object if depth < FRAGMENT_DEPTH_LIMIT => {
                let sub_fields = dictionary
                    .get(&field.type_name)
                    .map(|schema| build_field_tree(dictionary, &schema.fields, depth + 1))
                    .unwrap_or_default();
                selection.push(Field {
                    name: field.name.clone(),
                    type_name: field.type_name.clone(),
                    kind: field.kind,
                    sub_fields,
                    ..Field::default()
                });
            }
            TypeKind::Scalar | TypeKind::Enum | TypeKind::List => {
                selection.push(Field {
                    name: field.name.clone(),
                    type_name: field.type_name.clone(),
                    kind: field.kind,
                    ..Field::default()
                });
            }
            _ => {}
        }
    }
    selection
}

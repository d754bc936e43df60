//! `_include` / `_revinclude` parameter parsing and resolution.
//!
//! The REST surface spells these as `source:field[:target]`, with the
//! field name optionally in kebab-case (`general-practitioner`). The
//! concrete types an include can produce are discovered through the
//! dictionary: the source field points at a reference type whose
//! `resource` field is a union of every possible target.

use crate::dictionary::TypeDictionary;
use crate::error::GraphError;

/// A parsed and resolved `_include` / `_revinclude` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeParam {
    pub resource_name: String,
    /// Field name after kebab → lowerCamel normalization.
    pub field_name: String,
    /// Explicit target type, when the client supplied a third part.
    pub target_type: Option<String>,
    /// Concrete types behind the referenced union.
    pub possible_types: Vec<String>,
}

impl IncludeParam {
    /// Types whose fragments this include spreads, the explicit target
    /// first, deduplicated.
    pub fn fragment_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        if let Some(target) = self.target_type.as_deref() {
            targets.push(target);
        }
        for possible in &self.possible_types {
            if !targets.contains(&possible.as_str()) {
                targets.push(possible);
            }
        }
        targets
    }
}

/// Normalizes a kebab-case name to lowerCamelCase. Names without a dash
/// pass through untouched.
pub fn kebab_to_lower_camel(name: &str) -> String {
    if !name.contains('-') {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    for (index, part) in name.split('-').enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            out.push_str(&part.to_lowercase());
        } else {
            let mut chars = part.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(&chars.as_str().to_lowercase());
            }
        }
    }
    out
}

/// Parses `source:field[:target]` and resolves the possible target types
/// through the dictionary. Unresolvable links are not an error; they
/// produce an empty possible-types list.
pub fn parse_include_param(
    dictionary: &TypeDictionary,
    raw: &str,
) -> Result<IncludeParam, GraphError> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(GraphError::InvalidIncludeParameter(raw.to_string()));
    }

    let mut include = IncludeParam {
        resource_name: parts[0].to_string(),
        field_name: kebab_to_lower_camel(parts[1]),
        target_type: parts.get(2).map(|target| target.to_string()),
        possible_types: Vec::new(),
    };

    // source.field -> referenceType.resource -> union.possibleTypes
    let union_type = dictionary
        .field(&include.resource_name, &include.field_name)
        .and_then(|field| dictionary.field(&field.type_name, "resource"))
        .and_then(|resource_field| dictionary.get(&resource_field.type_name));

    if let Some(union_type) = union_type {
        include.possible_types = union_type
            .possible_types
            .iter()
            .map(|possible| possible.name.clone())
            .collect();
    }

    Ok(include)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{FieldDef, PossibleType, SchemaType, TypeKind};

    fn dictionary() -> TypeDictionary {
        let mut dict = TypeDictionary::new();
        dict.insert(SchemaType {
            name: "Encounter".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![FieldDef {
                name: "subject".into(),
                type_name: "Reference".into(),
                kind: TypeKind::Object,
            }],
        });
        dict.insert(SchemaType {
            name: "Reference".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![FieldDef {
                name: "resource".into(),
                type_name: "ResourceUnion".into(),
                kind: TypeKind::Union,
            }],
        });
        dict.insert(SchemaType {
            name: "ResourceUnion".into(),
            kind: TypeKind::Union,
            possible_types: vec![
                PossibleType {
                    name: "Patient".into(),
                    kind: TypeKind::Object,
                },
                PossibleType {
                    name: "Practitioner".into(),
                    kind: TypeKind::Object,
                },
            ],
            fields: Vec::new(),
        });
        dict
    }

    #[test]
    fn test_kebab_to_lower_camel() {
        assert_eq!(kebab_to_lower_camel("subject"), "subject");
        assert_eq!(
            kebab_to_lower_camel("general-practitioner"),
            "generalPractitioner"
        );
        assert_eq!(kebab_to_lower_camel("Part-Of"), "partOf");
        assert_eq!(kebab_to_lower_camel("a--b"), "aB");
    }

    #[test]
    fn test_parse_resolves_union() {
        let include = parse_include_param(&dictionary(), "Encounter:subject").unwrap();
        assert_eq!(include.resource_name, "Encounter");
        assert_eq!(include.field_name, "subject");
        assert_eq!(include.target_type, None);
        assert_eq!(include.possible_types, ["Patient", "Practitioner"]);
    }

    #[test]
    fn test_parse_with_explicit_target() {
        let include = parse_include_param(&dictionary(), "Encounter:subject:Patient").unwrap();
        assert_eq!(include.target_type.as_deref(), Some("Patient"));
        // Discovered possible types are still resolved.
        assert_eq!(include.possible_types, ["Patient", "Practitioner"]);
        // Target first, duplicates collapsed.
        assert_eq!(include.fragment_targets(), ["Patient", "Practitioner"]);
    }

    #[test]
    fn test_parse_kebab_field() {
        let mut dict = dictionary();
        dict.insert(SchemaType {
            name: "Patient".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![FieldDef {
                name: "generalPractitioner".into(),
                type_name: "Reference".into(),
                kind: TypeKind::Object,
            }],
        });
        let include = parse_include_param(&dict, "Patient:general-practitioner").unwrap();
        assert_eq!(include.field_name, "generalPractitioner");
        assert_eq!(include.possible_types, ["Patient", "Practitioner"]);
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(parse_include_param(&dictionary(), "Encounter").is_err());
        assert!(parse_include_param(&dictionary(), "a:b:c:d").is_err());
    }

    #[test]
    fn test_unresolvable_source_is_not_an_error() {
        let include = parse_include_param(&dictionary(), "Observation:subject").unwrap();
        assert!(include.possible_types.is_empty());
    }
}

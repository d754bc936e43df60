//! Document composition for the REST verbs.
//!
//! A composed document is the fragment definitions (each emitted once,
//! keyed by name) followed by the operation. Searches select the resource
//! through its connection wrapper, attach one sub-field per include and
//! one sibling connection per revinclude; reads select by id; creates
//! embed the resource body as a string argument of the `<Type>Create`
//! mutation field.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::ast::{ArgumentValue, Arguments, Field, Fragment, OperationKind, Query};
use crate::dictionary::TypeDictionary;
use crate::error::GraphError;
use crate::fragment::{fragment_for, fragment_name};
use crate::include::IncludeParam;

/// Composes the search document for a resource type.
pub fn search_document(
    dictionary: &TypeDictionary,
    resource_type: &str,
    search_params: &Arguments,
    includes: &[IncludeParam],
    revincludes: &[IncludeParam],
) -> String {
    let mut fragments = BTreeMap::new();
    collect_fragment(&mut fragments, dictionary, resource_type);
    for include in includes {
        for target in include.fragment_targets() {
            collect_fragment(&mut fragments, dictionary, target);
        }
    }
    for revinclude in revincludes {
        collect_fragment(&mut fragments, dictionary, &revinclude.resource_name);
    }

    let include_fields: Vec<Field> = includes
        .iter()
        .map(|include| Field {
            name: include.field_name.clone(),
            sub_fields: vec![Field {
                name: "resource".into(),
                fragments: include
                    .fragment_targets()
                    .iter()
                    .map(|target| fragment_name(target))
                    .collect(),
                ..Field::default()
            }],
            ..Field::default()
        })
        .collect();

    let arguments = if search_params.is_empty() {
        Arguments::new()
    } else {
        let mut arguments = Arguments::new();
        arguments.insert(
            "search".into(),
            ArgumentValue::nested(search_params.clone()),
        );
        arguments
    };

    let mut fields = vec![Field {
        name: resource_type.to_string(),
        arguments,
        fragments: vec![fragment_name(resource_type)],
        sub_fields: include_fields,
        connection: true,
        ..Field::default()
    }];

    for revinclude in revincludes {
        let mut arguments = Arguments::new();
        arguments.insert(
            revinclude.field_name.clone(),
            ArgumentValue::nested(search_params.clone()),
        );
        fields.push(Field {
            name: revinclude.resource_name.clone(),
            arguments,
            fragments: vec![fragment_name(&revinclude.resource_name)],
            connection: true,
            ..Field::default()
        });
    }

    let query = Query {
        operation: OperationKind::Query,
        name: format!("Get{resource_type}"),
        variables: Vec::new(),
        fields,
    };

    render_document(&fragments, &query)
}

/// Composes the read-by-id document for a resource type.
pub fn read_document(dictionary: &TypeDictionary, resource_type: &str, id: &str) -> String {
    let mut fragments = BTreeMap::new();
    collect_fragment(&mut fragments, dictionary, resource_type);

    let mut arguments = Arguments::new();
    arguments.insert("id".into(), ArgumentValue::scalar(id));

    let query = Query {
        operation: OperationKind::Query,
        name: format!("Get{resource_type}"),
        variables: Vec::new(),
        fields: vec![Field {
            name: resource_type.to_string(),
            arguments,
            fragments: vec![fragment_name(resource_type)],
            ..Field::default()
        }],
    };

    render_document(&fragments, &query)
}

/// Composes the create mutation for a resource type. Any top-level `id`
/// in the body is stripped before the body is embedded as a string
/// literal.
pub fn create_document(
    dictionary: &TypeDictionary,
    resource_type: &str,
    body: &Value,
) -> Result<String, GraphError> {
    let mut resource = body.clone();
    if let Some(map) = resource.as_object_mut() {
        map.remove("id");
    }
    let encoded = serde_json::to_string(&resource)?;

    let mut fragments = BTreeMap::new();
    collect_fragment(&mut fragments, dictionary, resource_type);

    let mut arguments = Arguments::new();
    arguments.insert("resource".into(), ArgumentValue::scalar(encoded));

    let mutation = Query {
        operation: OperationKind::Mutation,
        name: format!("{resource_type}CreateMutation"),
        variables: Vec::new(),
        fields: vec![Field {
            name: format!("{resource_type}Create"),
            arguments,
            fragments: vec![fragment_name(resource_type)],
            ..Field::default()
        }],
    };

    Ok(render_document(&fragments, &mutation))
}

fn collect_fragment(
    fragments: &mut BTreeMap<String, Fragment>,
    dictionary: &TypeDictionary,
    type_name: &str,
) {
    fragments
        .entry(fragment_name(type_name))
        .or_insert_with(|| fragment_for(dictionary, type_name));
}

fn render_document(fragments: &BTreeMap<String, Fragment>, query: &Query) -> String {
    let mut document = String::new();
    for fragment in fragments.values() {
        document.push_str(&fragment.to_string());
        document.push('\n');
    }
    document.push_str(&query.to_string());
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{FieldDef, PossibleType, SchemaType, TypeKind};
    use crate::include::parse_include_param;
    use std::collections::BTreeSet;

    fn field(name: &str, type_name: &str, kind: TypeKind) -> FieldDef {
        FieldDef {
            name: name.into(),
            type_name: type_name.into(),
            kind,
        }
    }

    fn dictionary() -> TypeDictionary {
        let mut dict = TypeDictionary::new();
        dict.insert(SchemaType {
            name: "Encounter".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![
                field("id", "ID", TypeKind::Scalar),
                field("status", "String", TypeKind::Scalar),
                field("subject", "Reference", TypeKind::Object),
            ],
        });
        dict.insert(SchemaType {
            name: "Patient".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![field("id", "ID", TypeKind::Scalar)],
        });
        dict.insert(SchemaType {
            name: "Practitioner".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![field("id", "ID", TypeKind::Scalar)],
        });
        dict.insert(SchemaType {
            name: "Reference".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![
                field("reference", "String", TypeKind::Scalar),
                field("resource", "ResourceUnion", TypeKind::Union),
            ],
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

    fn defined_fragments(document: &str) -> BTreeSet<String> {
        document
            .lines()
            .filter_map(|line| {
                line.strip_prefix("fragment ")
                    .and_then(|rest| rest.split_whitespace().next())
                    .map(str::to_string)
            })
            .collect()
    }

    fn spread_fragments(document: &str) -> BTreeSet<String> {
        document
            .split("...")
            .skip(1)
            .filter_map(|rest| {
                rest.split(|c: char| !c.is_alphanumeric())
                    .next()
                    .map(str::to_string)
            })
            .collect()
    }

    #[test]
    fn test_search_with_include_expansion() {
        let dict = dictionary();
        let includes = vec![parse_include_param(&dict, "Encounter:subject").unwrap()];
        let document = search_document(&dict, "Encounter", &Arguments::new(), &includes, &[]);

        assert!(document.contains("fragment EncounterFragment on Encounter"));
        assert!(document.contains("fragment PatientFragment on Patient"));
        assert!(document.contains("fragment PractitionerFragment on Practitioner"));
        assert!(document.contains(
            "subject { resource { ...PatientFragment ...PractitionerFragment } }"
        ));
        assert!(document.contains("EncounterConnection"));
        assert!(document.contains("query GetEncounter"));
    }

    #[test]
    fn test_search_parameters_nest_under_search() {
        let dict = dictionary();
        let mut params = Arguments::new();
        params.insert("name".into(), ArgumentValue::scalar("Smith"));
        params.insert("_id".into(), ArgumentValue::scalar("123"));
        let document = search_document(&dict, "Patient", &params, &[], &[]);

        assert!(document.contains("(search: { _id: \"123\", name: \"Smith\" })"));
    }

    #[test]
    fn test_search_without_parameters_has_no_arguments() {
        let dict = dictionary();
        let document = search_document(&dict, "Patient", &Arguments::new(), &[], &[]);
        assert!(document.contains("PatientConnection {"));
        assert!(!document.contains("PatientConnection("));
    }

    #[test]
    fn test_revinclude_adds_sibling_connection() {
        let dict = dictionary();
        let mut params = Arguments::new();
        params.insert("_id".into(), ArgumentValue::scalar("e1"));
        let revincludes = vec![parse_include_param(&dict, "Encounter:subject").unwrap()];
        let document = search_document(&dict, "Patient", &params, &[], &revincludes);

        // Sibling connection field with the search params nested under the
        // reverse field name, not an include sub-field of the primary.
        assert!(document.contains("EncounterConnection(subject: { _id: \"e1\" })"));
        assert!(!document.contains("subject { resource"));
        assert!(document.contains("fragment EncounterFragment on Encounter"));
    }

    #[test]
    fn test_shared_possible_type_emits_fragment_once() {
        let mut dict = dictionary();
        dict.insert(SchemaType {
            name: "Observation".into(),
            kind: TypeKind::Object,
            possible_types: Vec::new(),
            fields: vec![
                field("id", "ID", TypeKind::Scalar),
                field("subject", "Reference", TypeKind::Object),
                field("performer", "Reference", TypeKind::Object),
            ],
        });
        let includes = vec![
            parse_include_param(&dict, "Observation:subject").unwrap(),
            parse_include_param(&dict, "Observation:performer").unwrap(),
        ];
        let document = search_document(&dict, "Observation", &Arguments::new(), &includes, &[]);

        assert_eq!(document.matches("fragment PatientFragment").count(), 1);
        // Both include branches still spread it.
        assert_eq!(
            document.matches("resource { ...PatientFragment ...PractitionerFragment }").count(),
            2
        );
    }

    #[test]
    fn test_documents_reference_exactly_the_fragments_they_define() {
        let dict = dictionary();
        let mut params = Arguments::new();
        params.insert("status".into(), ArgumentValue::scalar("finished"));
        let includes = vec![parse_include_param(&dict, "Encounter:subject").unwrap()];
        let revincludes = vec![parse_include_param(&dict, "Encounter:subject").unwrap()];
        let document = search_document(&dict, "Encounter", &params, &includes, &revincludes);

        assert_eq!(defined_fragments(&document), spread_fragments(&document));
    }

    #[test]
    fn test_read_document() {
        let dict = dictionary();
        let document = read_document(&dict, "Patient", "p1");
        assert_eq!(
            document,
            "fragment PatientFragment on Patient { id }\n\
             query GetPatient { Patient(id: \"p1\") { ...PatientFragment } }"
        );
    }

    #[test]
    fn test_create_document_strips_id() {
        let dict = dictionary();
        let body = serde_json::json!({"resourceType": "Patient", "id": "drop-me"});
        let document = create_document(&dict, "Patient", &body).unwrap();

        assert!(document.contains("mutation PatientCreateMutation"));
        assert!(document.contains(
            "PatientCreate(resource: \"{\\\"resourceType\\\":\\\"Patient\\\"}\")"
        ));
        assert!(document.contains("{ ...PatientFragment }"));
        assert!(!document.contains("drop-me"));
    }
}

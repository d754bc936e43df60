//! GraphQL AST and wire-form rendering.
//!
//! Rendering is a pure function of the tree: `Display` implementations
//! produce the canonical wire form with no I/O and no failure modes.
//! Arguments are kept in a `BTreeMap`, so argument order is stable
//! (sorted by name) and rendering is fully deterministic.

use std::collections::BTreeMap;
use std::fmt;

use crate::dictionary::TypeKind;

/// A variable declaration, rendered as `$name: Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub var_type: String,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}: {}", self.name, self.var_type)
    }
}

/// Named arguments of a field, ordered by name.
pub type Arguments = BTreeMap<String, ArgumentValue>;

/// An argument value: either a scalar string or a nested argument map.
///
/// A scalar renders double-quoted with inner quotes escaped; a nested map
/// renders as a GraphQL object literal; a value that is neither renders
/// as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentValue {
    pub value: String,
    pub sub_arguments: Arguments,
}

impl ArgumentValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_arguments: Arguments::new(),
        }
    }

    pub fn nested(sub_arguments: Arguments) -> Self {
        Self {
            value: String::new(),
            sub_arguments,
        }
    }
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.sub_arguments.is_empty() {
            let parts: Vec<String> = self
                .sub_arguments
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            write!(f, "{{ {} }}", parts.join(", "))
        } else if self.value.is_empty() {
            f.write_str("{}")
        } else {
            write!(f, "{:?}", self.value)
        }
    }
}

/// A field selection.
///
/// `type_name` and `kind` carry what the dictionary resolved for the
/// field; a `LIST`-kind field, or one with the `connection` flag set,
/// renders as a pagination wrapper (`nameConnection { pageInfo ... edges
/// { cursor node { ... } } }`) instead of a plain selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Arguments,
    pub sub_fields: Vec<Field>,
    /// Fragment spreads, emitted before sub-fields in the selection set.
    pub fragments: Vec<String>,
    pub type_name: String,
    pub kind: TypeKind,
    pub connection: bool,
}

impl Field {
    /// A bare field with nothing but a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn fmt_regular(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{alias}: ")?;
        }
        f.write_str(&self.name)?;

        if !self.arguments.is_empty() {
            let args: Vec<String> = self
                .arguments
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            write!(f, "({})", args.join(", "))?;
        }

        if !self.sub_fields.is_empty() || !self.fragments.is_empty() {
            let mut elements: Vec<String> = self
                .fragments
                .iter()
                .map(|name| format!("...{name}"))
                .collect();
            elements.extend(self.sub_fields.iter().map(Field::to_string));
            write!(f, " {{ {} }}", elements.join(" "))?;
        }

        Ok(())
    }

    fn fmt_connection(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = Field {
            name: "node".into(),
            sub_fields: self.sub_fields.clone(),
            fragments: self.fragments.clone(),
            ..Field::default()
        };
        let wrapper = Field {
            name: format!("{}Connection", self.name),
            alias: self.alias.clone(),
            arguments: self.arguments.clone(),
            sub_fields: vec![
                Field {
                    name: "pageInfo".into(),
                    sub_fields: vec![
                        Field::named("hasNextPage"),
                        Field::named("hasPreviousPage"),
                        Field::named("startCursor"),
                        Field::named("endCursor"),
                    ],
                    ..Field::default()
                },
                Field {
                    name: "edges".into(),
                    sub_fields: vec![Field::named("cursor"), node],
                    ..Field::default()
                },
            ],
            ..Field::default()
        };
        wrapper.fmt_regular(f)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TypeKind::List || self.connection {
            self.fmt_connection(f)
        } else {
            self.fmt_regular(f)
        }
    }
}

/// A named fragment definition targeting a specific type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub on_type: String,
    pub fields: Vec<Field>,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.fields.iter().map(Field::to_string).collect();
        write!(
            f,
            "fragment {} on {} {{ {} }}",
            self.name,
            self.on_type,
            fields.join(" ")
        )
    }
}

/// The operation kind of a composed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Mutation => f.write_str("mutation"),
        }
    }
}

/// A complete operation: kind, name, variable declarations and top-level
/// field selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub operation: OperationKind,
    pub name: String,
    pub variables: Vec<Variable>,
    pub fields: Vec<Field>,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.name)?;
        if !self.variables.is_empty() {
            let vars: Vec<String> = self.variables.iter().map(Variable::to_string).collect();
            write!(f, "({})", vars.join(", "))?;
        }
        let fields: Vec<String> = self.fields.iter().map(Field::to_string).collect();
        write!(f, " {{ {} }}", fields.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable() {
        let var = Variable {
            name: "id".into(),
            var_type: "ID!".into(),
        };
        assert_eq!(var.to_string(), "$id: ID!");
    }

    #[test]
    fn test_argument_scalar_quoting() {
        assert_eq!(ArgumentValue::scalar("Smith").to_string(), "\"Smith\"");
        assert_eq!(
            ArgumentValue::scalar("say \"hi\"").to_string(),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_argument_empty_renders_braces() {
        assert_eq!(ArgumentValue::default().to_string(), "{}");
    }

    #[test]
    fn test_argument_nested() {
        let mut inner = Arguments::new();
        inner.insert("name".into(), ArgumentValue::scalar("Smith"));
        inner.insert("_id".into(), ArgumentValue::scalar("123"));
        let value = ArgumentValue::nested(inner);
        assert_eq!(value.to_string(), "{ _id: \"123\", name: \"Smith\" }");
    }

    #[test]
    fn test_field_with_alias_and_arguments() {
        let mut args = Arguments::new();
        args.insert("id".into(), ArgumentValue::scalar("p1"));
        let field = Field {
            name: "Patient".into(),
            alias: Some("subject".into()),
            arguments: args,
            sub_fields: vec![Field::named("id"), Field::named("gender")],
            ..Field::default()
        };
        assert_eq!(
            field.to_string(),
            "subject: Patient(id: \"p1\") { id gender }"
        );
    }

    #[test]
    fn test_fragment_spreads_precede_sub_fields() {
        let field = Field {
            name: "resource".into(),
            fragments: vec!["PatientFragment".into()],
            sub_fields: vec![Field::named("id")],
            ..Field::default()
        };
        assert_eq!(field.to_string(), "resource { ...PatientFragment id }");
    }

    #[test]
    fn test_connection_wrapper() {
        let field = Field {
            name: "Patient".into(),
            fragments: vec!["PatientFragment".into()],
            connection: true,
            ..Field::default()
        };
        assert_eq!(
            field.to_string(),
            "PatientConnection { pageInfo { hasNextPage hasPreviousPage startCursor endCursor } \
             edges { cursor node { ...PatientFragment } } }"
        );
    }

    #[test]
    fn test_list_kind_renders_connection() {
        let field = Field {
            name: "items".into(),
            kind: TypeKind::List,
            ..Field::default()
        };
        assert!(field.to_string().starts_with("itemsConnection"));
    }

    #[test]
    fn test_connection_carries_alias_and_arguments() {
        let mut args = Arguments::new();
        args.insert("first".into(), ArgumentValue::scalar("10"));
        let field = Field {
            name: "Patient".into(),
            alias: Some("people".into()),
            arguments: args,
            connection: true,
            ..Field::default()
        };
        let rendered = field.to_string();
        assert!(rendered.starts_with("people: PatientConnection(first: \"10\")"));
    }

    #[test]
    fn test_fragment_rendering() {
        let fragment = Fragment {
            name: "PatientFragment".into(),
            on_type: "Patient".into(),
            fields: vec![Field::named("id"), Field::named("gender")],
        };
        assert_eq!(
            fragment.to_string(),
            "fragment PatientFragment on Patient { id gender }"
        );
    }

    #[test]
    fn test_query_with_variables() {
        let query = Query {
            operation: OperationKind::Query,
            name: "GetPatient".into(),
            variables: vec![Variable {
                name: "id".into(),
                var_type: "ID!".into(),
            }],
            fields: vec![Field::named("Patient")],
        };
        assert_eq!(query.to_string(), "query GetPatient($id: ID!) { Patient }");
    }

    #[test]
    fn test_query_without_variables_omits_parens() {
        let query = Query {
            operation: OperationKind::Query,
            name: "GetPatient".into(),
            variables: Vec::new(),
            fields: vec![Field::named("Patient")],
        };
        assert_eq!(query.to_string(), "query GetPatient { Patient }");
    }

    #[test]
    fn test_mutation_rendering() {
        let query = Query {
            operation: OperationKind::Mutation,
            name: "PatientCreateMutation".into(),
            variables: Vec::new(),
            fields: vec![Field::named("PatientCreate")],
        };
        assert_eq!(
            query.to_string(),
            "mutation PatientCreateMutation { PatientCreate }"
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut args = Arguments::new();
        args.insert("b".into(), ArgumentValue::scalar("2"));
        args.insert("a".into(), ArgumentValue::scalar("1"));
        let field = Field {
            name: "thing".into(),
            arguments: args,
            ..Field::default()
        };
        let first = field.to_string();
        let second = field.clone().to_string();
        assert_eq!(first, second);
        assert_eq!(first, "thing(a: \"1\", b: \"2\")");
    }
}

//! Field namespace resolution.
//!
//! A rule's `field` string is resolved once into a `FieldRef`; everything
//! downstream matches on the enum instead of re-parsing prefixes.

use crate::error::{QueryError, Result};
use crate::rule::Operator;

/// Core fields of the part master that owns a revision (`pm.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterField {
    Number,
    Name,
    Type,
    CreationDate,
}

/// Core fields of the revision itself (`pr.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionField {
    Version,
    Description,
    CreationDate,
    CheckoutDate,
    LifeCycleState,
    /// Read from the last iteration only.
    CheckInDate,
    /// Read from the last iteration only.
    ModificationDate,
    Status,
    Tags,
    LinkedDocuments,
}

/// Core fields of the revision author's account (`author.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorField {
    Login,
    Name,
    Email,
    Language,
}

/// Storage kind of a dynamic attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Text,
    LongText,
    Date,
    Boolean,
    Url,
    Number,
    Lov,
    PartNumber,
}

impl AttributeKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "TEXT" => AttributeKind::Text,
            "LONG_TEXT" => AttributeKind::LongText,
            "DATE" => AttributeKind::Date,
            "BOOLEAN" => AttributeKind::Boolean,
            "URL" => AttributeKind::Url,
            "NUMBER" => AttributeKind::Number,
            "LOV" => AttributeKind::Lov,
            "PART_NUMBER" => AttributeKind::PartNumber,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Text => "TEXT",
            AttributeKind::LongText => "LONG_TEXT",
            AttributeKind::Date => "DATE",
            AttributeKind::Boolean => "BOOLEAN",
            AttributeKind::Url => "URL",
            AttributeKind::Number => "NUMBER",
            AttributeKind::Lov => "LOV",
            AttributeKind::PartNumber => "PART_NUMBER",
        }
    }
}

/// Which iterations an attribute lookup runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    Revision,
    PathData,
}

/// The engine a field is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Revision,
    PathData,
}

/// Shape of the value a field yields, used to gate operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Date,
    Number,
    Boolean,
    Lov,
    Status,
    Tags,
    /// Not evaluated; always satisfied.
    Unchecked,
}

/// A resolved field reference.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    Master(MasterField),
    Revision(RevisionField),
    Author(AuthorField),
    Attribute {
        scope: AttributeScope,
        kind: AttributeKind,
        name: String,
    },
}

impl FieldRef {
    /// Resolve `field` by prefix, in fixed priority order.
    pub fn resolve(field: &str, operator: Operator, values: &[String]) -> Result<Self> {
        let unresolved = || QueryError::UnresolvedField {
            field: field.to_string(),
            operator: operator.to_string(),
            values: values.to_vec(),
        };

        if let Some(key) = field.strip_prefix("pm.") {
            return master_field(key).map(FieldRef::Master).ok_or_else(unresolved);
        }
        if let Some(key) = field.strip_prefix("pr.") {
            return revision_field(key).map(FieldRef::Revision).ok_or_else(unresolved);
        }
        if let Some(key) = field.strip_prefix("author.") {
            return author_field(key).map(FieldRef::Author).ok_or_else(unresolved);
        }
        if let Some(rest) = field.strip_prefix("attr-") {
            return attribute(AttributeScope::Revision, rest).ok_or_else(unresolved);
        }
        if let Some(rest) = field.strip_prefix("pd-attr-") {
            return attribute(AttributeScope::PathData, rest).ok_or_else(unresolved);
        }

        Err(unresolved())
    }

    /// Resolve and reject fields that belong to the other engine.
    pub fn resolve_for(
        family: Family,
        field: &str,
        operator: Operator,
        values: &[String],
    ) -> Result<Self> {
        let resolved = Self::resolve(field, operator, values)?;
        if resolved.family() == family {
            Ok(resolved)
        } else {
            Err(QueryError::UnresolvedField {
                field: field.to_string(),
                operator: operator.to_string(),
                values: values.to_vec(),
            })
        }
    }

    pub fn family(&self) -> Family {
        match self {
            FieldRef::Attribute {
                scope: AttributeScope::PathData,
                ..
            } => Family::PathData,
            _ => Family::Revision,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldRef::Master(MasterField::CreationDate) => ValueKind::Date,
            FieldRef::Master(_) => ValueKind::Text,
            FieldRef::Revision(field) => match field {
                RevisionField::Version
                | RevisionField::Description
                | RevisionField::LifeCycleState => ValueKind::Text,
                RevisionField::CreationDate
                | RevisionField::CheckoutDate
                | RevisionField::CheckInDate
                | RevisionField::ModificationDate => ValueKind::Date,
                RevisionField::Status => ValueKind::Status,
                RevisionField::Tags => ValueKind::Tags,
                RevisionField::LinkedDocuments => ValueKind::Unchecked,
            },
            FieldRef::Author(_) => ValueKind::Text,
            FieldRef::Attribute { kind, .. } => match kind {
                AttributeKind::Text
                | AttributeKind::LongText
                | AttributeKind::Url
                | AttributeKind::PartNumber => ValueKind::Text,
                AttributeKind::Date => ValueKind::Date,
                AttributeKind::Number => ValueKind::Number,
                AttributeKind::Boolean => ValueKind::Boolean,
                AttributeKind::Lov => ValueKind::Lov,
            },
        }
    }

    /// Fields held by an iteration rather than by the revision.
    pub fn is_last_iteration_only(&self) -> bool {
        matches!(
            self,
            FieldRef::Revision(RevisionField::CheckInDate | RevisionField::ModificationDate)
        )
    }
}

fn master_field(key: &str) -> Option<MasterField> {
    match key {
        "number" => Some(MasterField::Number),
        "name" => Some(MasterField::Name),
        "type" => Some(MasterField::Type),
        "creationDate" => Some(MasterField::CreationDate),
        _ => None,
    }
}

fn revision_field(key: &str) -> Option<RevisionField> {
    match key {
        "version" => Some(RevisionField::Version),
        "description" => Some(RevisionField::Description),
        "creationDate" => Some(RevisionField::CreationDate),
        "checkoutDate" => Some(RevisionField::CheckoutDate),
        "lifeCycleState" => Some(RevisionField::LifeCycleState),
        "checkInDate" => Some(RevisionField::CheckInDate),
        "modificationDate" => Some(RevisionField::ModificationDate),
        "status" => Some(RevisionField::Status),
        "tags" => Some(RevisionField::Tags),
        "linkedDocuments" => Some(RevisionField::LinkedDocuments),
        _ => None,
    }
}

fn author_field(key: &str) -> Option<AuthorField> {
    match key {
        "login" => Some(AuthorField::Login),
        "name" => Some(AuthorField::Name),
        "email" => Some(AuthorField::Email),
        "language" => Some(AuthorField::Language),
        _ => None,
    }
}

// `rest` is `<KIND>.<name>`; attribute names may themselves contain dots.
fn attribute(scope: AttributeScope, rest: &str) -> Option<FieldRef> {
    let (kind, name) = rest.split_once('.')?;
    let kind = AttributeKind::parse(kind)?;
    if name.is_empty() {
        return None;
    }
    Some(FieldRef::Attribute {
        scope,
        kind,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(field: &str) -> Result<FieldRef> {
        FieldRef::resolve(field, Operator::Equal, &["x".to_string()])
    }

    #[test]
    fn test_core_prefixes() {
        assert_eq!(resolve("pm.number").unwrap(), FieldRef::Master(MasterField::Number));
        assert_eq!(resolve("pr.status").unwrap(), FieldRef::Revision(RevisionField::Status));
        assert_eq!(resolve("author.login").unwrap(), FieldRef::Author(AuthorField::Login));
    }

    #[test]
    fn test_attribute_prefixes() {
        assert_eq!(
            resolve("attr-NUMBER.weight").unwrap(),
            FieldRef::Attribute {
                scope: AttributeScope::Revision,
                kind: AttributeKind::Number,
                name: "weight".to_string(),
            }
        );
        assert_eq!(
            resolve("pd-attr-DATE.installedOn").unwrap(),
            FieldRef::Attribute {
                scope: AttributeScope::PathData,
                kind: AttributeKind::Date,
                name: "installedOn".to_string(),
            }
        );
    }

    #[test]
    fn test_attribute_name_keeps_dots() {
        let resolved = resolve("attr-LONG_TEXT.spec.notes").unwrap();
        if let FieldRef::Attribute { kind, name, .. } = resolved {
            assert_eq!(kind, AttributeKind::LongText);
            assert_eq!(name, "spec.notes");
        } else {
            panic!("Expected attribute reference");
        }
    }

    #[test]
    fn test_unknown_prefix() {
        match resolve("unknown.x") {
            Err(QueryError::UnresolvedField { field, operator, values }) => {
                assert_eq!(field, "unknown.x");
                assert_eq!(operator, "equal");
                assert_eq!(values, vec!["x".to_string()]);
            }
            other => panic!("Expected UnresolvedField, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_or_kind() {
        assert!(matches!(resolve("pr.colour"), Err(QueryError::UnresolvedField { .. })));
        assert!(matches!(resolve("attr-BLOB.data"), Err(QueryError::UnresolvedField { .. })));
        assert!(matches!(resolve("attr-TEXT."), Err(QueryError::UnresolvedField { .. })));
    }

    #[test]
    fn test_family_gate() {
        let values = vec!["x".to_string()];
        let resolve_for =
            |family, field| FieldRef::resolve_for(family, field, Operator::Equal, &values);
        assert!(resolve_for(Family::Revision, "pd-attr-TEXT.note").is_err());
        assert!(resolve_for(Family::PathData, "pm.number").is_err());
        assert!(resolve_for(Family::PathData, "pd-attr-TEXT.note").is_ok());
    }

    #[test]
    fn test_last_iteration_fields() {
        assert!(resolve("pr.checkInDate").unwrap().is_last_iteration_only());
        assert!(resolve("pr.modificationDate").unwrap().is_last_iteration_only());
        assert!(!resolve("pr.creationDate").unwrap().is_last_iteration_only());
    }
}

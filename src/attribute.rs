//! Lookup of dynamic (name / kind / typed value) attributes on iterations.

use crate::field::AttributeKind;
use crate::model::{AttributeValue, InstanceAttribute, Iteration, PathDataIteration};
use crate::predicate::Scalar;

/// Anything that owns a collection of dynamic attributes.
pub trait AttributeStore {
    fn instance_attributes(&self) -> &[InstanceAttribute];

    /// Whether an attribute named `name` of `kind` has a value passing `test`.
    fn has_attribute(
        &self,
        kind: AttributeKind,
        name: &str,
        test: &dyn Fn(&Scalar) -> bool,
    ) -> bool {
        self.instance_attributes()
            .iter()
            .filter(|attr| attr.name == name)
            .filter_map(|attr| typed_value(kind, &attr.value))
            .any(|value| test(&value))
    }
}

impl AttributeStore for Iteration {
    fn instance_attributes(&self) -> &[InstanceAttribute] {
        &self.attributes
    }
}

impl AttributeStore for PathDataIteration {
    fn instance_attributes(&self) -> &[InstanceAttribute] {
        &self.attributes
    }
}

/// Comparable value of an attribute, if it is stored as `kind`.
///
/// `PART_NUMBER` attributes yield the number of the part they reference;
/// an unset reference yields nothing.
pub fn typed_value(kind: AttributeKind, value: &AttributeValue) -> Option<Scalar> {
    match (kind, value) {
        (AttributeKind::Text, AttributeValue::Text(text))
        | (AttributeKind::LongText, AttributeValue::LongText(text))
        | (AttributeKind::Url, AttributeValue::Url(text)) => Some(Scalar::Text(text.clone())),
        (AttributeKind::Number, AttributeValue::Number(n)) => Some(Scalar::Number(*n)),
        (AttributeKind::Boolean, AttributeValue::Boolean(b)) => Some(Scalar::Boolean(*b)),
        (AttributeKind::Date, AttributeValue::Date(date)) => Some(Scalar::Date(*date)),
        (AttributeKind::Lov, AttributeValue::Lov { index, .. }) => Some(Scalar::Lov(*index)),
        (AttributeKind::PartNumber, AttributeValue::PartNumber(reference)) => reference
            .as_ref()
            .map(|part| Scalar::Text(part.number.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartMasterRef;

    fn iteration(attributes: Vec<InstanceAttribute>) -> Iteration {
        Iteration {
            iteration: 1,
            check_in_date: None,
            modification_date: None,
            attributes,
        }
    }

    #[test]
    fn test_name_and_kind_must_both_match() {
        let it = iteration(vec![
            InstanceAttribute::new("weight", AttributeValue::Number(3.0)),
            InstanceAttribute::new("colour", AttributeValue::Text("red".to_string())),
        ]);

        assert!(it.has_attribute(AttributeKind::Number, "weight", &|v| *v == Scalar::Number(3.0)));
        assert!(!it.has_attribute(AttributeKind::Text, "weight", &|_| true));
        assert!(!it.has_attribute(AttributeKind::Number, "mass", &|_| true));
        assert!(!it.has_attribute(AttributeKind::LongText, "colour", &|_| true));
    }

    #[test]
    fn test_any_of_several_same_named_attributes() {
        let it = iteration(vec![
            InstanceAttribute::new("supplier", AttributeValue::Text("acme".to_string())),
            InstanceAttribute::new("supplier", AttributeValue::Text("globex".to_string())),
        ]);
        assert!(it.has_attribute(AttributeKind::Text, "supplier", &|v| {
            *v == Scalar::Text("globex".to_string())
        }));
    }

    #[test]
    fn test_part_number_dereferences_reference() {
        let it = iteration(vec![
            InstanceAttribute::new(
                "replaces",
                AttributeValue::PartNumber(Some(PartMasterRef {
                    workspace_id: "ws".to_string(),
                    number: "P-100".to_string(),
                })),
            ),
            InstanceAttribute::new("replacedBy", AttributeValue::PartNumber(None)),
        ]);

        assert!(it.has_attribute(AttributeKind::PartNumber, "replaces", &|v| {
            *v == Scalar::Text("P-100".to_string())
        }));
        assert!(!it.has_attribute(AttributeKind::PartNumber, "replacedBy", &|_| true));
    }

    #[test]
    fn test_lov_yields_index() {
        let value = AttributeValue::Lov {
            index: 2,
            items: vec!["S".to_string(), "M".to_string(), "L".to_string()],
        };
        assert_eq!(typed_value(AttributeKind::Lov, &value), Some(Scalar::Lov(2)));
    }
}

//! Segment predicate compiler.
//!
//! Translates a [`FilterCriteria`] tree into a [`Predicate`] in the contact
//! store's vocabulary. The function is pure and total: every input, including
//! malformed or stale criteria, has a defined safe output. Unresolvable
//! references and unsupported operator/type pairs compile to
//! [`Predicate::MatchNone`] (fail-closed); neutral criteria compile to the
//! bare audience list scope.

use serde_json::Value as JsonValue;

use crate::criteria::{Combinator, FilterCriteria, FilterRule, Operator};
use crate::fields::{ContactField, CustomFieldDefinition, CustomFieldType, FieldKind, FieldRegistry};
use crate::predicate::{
    coerce_epoch, coerce_number, coerce_string, parse_date_epoch, DAY_SECONDS, FieldTarget, Predicate,
};

/// Compile a criteria document for one audience list.
///
/// The result always carries the implicit `audienceListId = X` conjunct, so a
/// contact can never match outside its list. `None` (or a neutral criteria)
/// compiles to the scope alone, i.e. "entire list". The registry is a
/// read-only snapshot for the duration of the call; compiling the same
/// `(list, criteria, registry)` twice yields equal predicates.
pub fn compile(audience_list_id: &str, criteria: Option<&FilterCriteria>, registry: &FieldRegistry) -> Predicate {
    let scope = Predicate::equals(FieldTarget::ListScope, audience_list_id);
    match criteria {
        None => scope,
        Some(node) => Predicate::and([scope, compile_node(node, registry)]),
    }
}

fn compile_node(node: &FilterCriteria, registry: &FieldRegistry) -> Predicate {
    match node {
        FilterCriteria::Group(group) => {
            if group.rules.is_empty() {
                return Predicate::MatchAll;
            }
            let members = group.rules.iter().map(|rule| compile_node(rule, registry));
            match group.combinator {
                Combinator::And => Predicate::and(members),
                Combinator::Or => Predicate::or(members),
            }
        }
        FilterCriteria::Leaf(rule) => compile_rule(rule, registry),
    }
}

fn compile_rule(rule: &FilterRule, registry: &FieldRegistry) -> Predicate {
    if rule.is_custom_field {
        match registry.lookup(&rule.field) {
            // Stale or renamed custom field reference: match nothing rather
            // than leak unintended contacts into the segment.
            None => Predicate::MatchNone,
            Some(definition) => compile_custom(rule, definition),
        }
    } else {
        match ContactField::parse(&rule.field) {
            None => Predicate::MatchNone,
            Some(field) => compile_fixed(rule, field),
        }
    }
}

fn compile_fixed(rule: &FilterRule, field: ContactField) -> Predicate {
    let target = FieldTarget::Column(field);
    match field.kind() {
        FieldKind::Text | FieldKind::Tags => compile_text(rule, target),
        FieldKind::Status => compile_status(rule, target),
        FieldKind::Date => compile_date(rule, target),
    }
}

fn compile_custom(rule: &FilterRule, definition: &CustomFieldDefinition) -> Predicate {
    let target = FieldTarget::custom(&definition.name, definition.field_type);
    match definition.field_type {
        CustomFieldType::Number => compile_number(rule, target),
        CustomFieldType::Date => compile_date(rule, target),
        CustomFieldType::Select => compile_text(rule, target),
        CustomFieldType::Text | CustomFieldType::Textarea => match rule.operator {
            // Free-form bag values may hold boolean-ish scalars.
            Operator::IsTrue => Predicate::bool_is(target, true),
            Operator::IsFalse => Predicate::bool_is(target, false),
            _ => compile_text(rule, target),
        },
    }
}

/// String-valued targets: fixed text columns, tags, select/text custom fields.
fn compile_text(rule: &FilterRule, target: FieldTarget) -> Predicate {
    match rule.operator {
        Operator::Equals => match coerce_string(&rule.value) {
            Some(value) => Predicate::equals(target, value),
            None => Predicate::MatchNone,
        },
        Operator::NotEquals => match coerce_string(&rule.value) {
            Some(value) => Predicate::not(Predicate::equals(target, value)),
            None => Predicate::MatchNone,
        },
        Operator::Contains => match coerce_string(&rule.value) {
            Some(value) => Predicate::contains(target, value),
            None => Predicate::MatchNone,
        },
        Operator::NotContains => match coerce_string(&rule.value) {
            Some(value) => Predicate::not(Predicate::contains(target, value)),
            None => Predicate::MatchNone,
        },
        Operator::IsEmpty => Predicate::empty(target),
        Operator::IsNotEmpty => Predicate::not(Predicate::empty(target)),
        Operator::OneOf => match value_set(&rule.value) {
            Some(values) => Predicate::one_of(target, values),
            None => Predicate::MatchNone,
        },
        _ => Predicate::MatchNone,
    }
}

fn compile_status(rule: &FilterRule, target: FieldTarget) -> Predicate {
    match rule.operator {
        Operator::Equals => match coerce_string(&rule.value) {
            Some(value) => Predicate::equals(target, value),
            None => Predicate::MatchNone,
        },
        Operator::NotEquals => match coerce_string(&rule.value) {
            Some(value) => Predicate::not(Predicate::equals(target, value)),
            None => Predicate::MatchNone,
        },
        Operator::OneOf => match value_set(&rule.value) {
            Some(values) => Predicate::one_of(target, values),
            None => Predicate::MatchNone,
        },
        Operator::IsTrue => Predicate::bool_is(target, true),
        Operator::IsFalse => Predicate::bool_is(target, false),
        _ => Predicate::MatchNone,
    }
}

fn compile_number(rule: &FilterRule, target: FieldTarget) -> Predicate {
    match rule.operator {
        Operator::Equals => match coerce_number(&rule.value) {
            Some(value) => Predicate::number_equals(target, value),
            None => Predicate::MatchNone,
        },
        Operator::NotEquals => match coerce_number(&rule.value) {
            Some(value) => Predicate::not(Predicate::number_equals(target, value)),
            None => Predicate::MatchNone,
        },
        Operator::GreaterThan => match coerce_number(&rule.value) {
            Some(value) => Predicate::greater_than(target, value),
            None => Predicate::MatchNone,
        },
        Operator::LessThan => match coerce_number(&rule.value) {
            Some(value) => Predicate::less_than(target, value),
            None => Predicate::MatchNone,
        },
        Operator::Between => match bounds(&rule.value, coerce_number) {
            Some((min, max)) => Predicate::between(target, min, max),
            None => Predicate::MatchNone,
        },
        Operator::OneOf => match numeric_set(&rule.value) {
            Some(values) => Predicate::or(values.into_iter().map(|v| Predicate::number_equals(target.clone(), v))),
            None => Predicate::MatchNone,
        },
        Operator::IsEmpty => Predicate::empty(target),
        Operator::IsNotEmpty => Predicate::not(Predicate::empty(target)),
        Operator::IsTrue => Predicate::bool_is(target, true),
        Operator::IsFalse => Predicate::bool_is(target, false),
        _ => Predicate::MatchNone,
    }
}

fn compile_date(rule: &FilterRule, target: FieldTarget) -> Predicate {
    match rule.operator {
        Operator::Equals => date_equals(&rule.value, target),
        Operator::NotEquals => Predicate::not(date_equals(&rule.value, target)),
        Operator::GreaterThan => match coerce_epoch(&rule.value) {
            Some(epoch) => Predicate::greater_than(target, epoch),
            None => Predicate::MatchNone,
        },
        Operator::LessThan => match coerce_epoch(&rule.value) {
            Some(epoch) => Predicate::less_than(target, epoch),
            None => Predicate::MatchNone,
        },
        Operator::Between => match bounds(&rule.value, coerce_epoch) {
            Some((min, max)) => Predicate::between(target, min, max),
            None => Predicate::MatchNone,
        },
        Operator::IsEmpty => Predicate::empty(target),
        Operator::IsNotEmpty => Predicate::not(Predicate::empty(target)),
        _ => Predicate::MatchNone,
    }
}

/// Date equality: a date-only value covers its whole calendar day; a precise
/// timestamp compares to the second.
fn date_equals(value: &JsonValue, target: FieldTarget) -> Predicate {
    if let JsonValue::String(raw) = value {
        let trimmed = raw.trim();
        if !trimmed.contains('T') {
            if let Some(start) = parse_date_epoch(trimmed) {
                return Predicate::between(target, start as f64, (start + DAY_SECONDS - 1) as f64);
            }
        }
    }
    match coerce_epoch(value) {
        Some(epoch) => Predicate::number_equals(target, epoch),
        None => Predicate::MatchNone,
    }
}

/// One-of value set: an array of scalars, or a lone scalar as a singleton.
fn value_set(value: &JsonValue) -> Option<Vec<String>> {
    match value {
        JsonValue::Array(items) => {
            let values: Vec<String> = items.iter().filter_map(coerce_string).collect();
            (!items.is_empty() && values.len() == items.len()).then_some(values)
        }
        scalar => coerce_string(scalar).map(|v| vec![v]),
    }
}

fn numeric_set(value: &JsonValue) -> Option<Vec<f64>> {
    match value {
        JsonValue::Array(items) => {
            let values: Vec<f64> = items.iter().filter_map(coerce_number).collect();
            (!items.is_empty() && values.len() == items.len()).then_some(values)
        }
        scalar => coerce_number(scalar).map(|v| vec![v]),
    }
}

/// Between bounds: exactly two coercible scalars.
fn bounds(value: &JsonValue, coerce: fn(&JsonValue) -> Option<f64>) -> Option<(f64, f64)> {
    match value {
        JsonValue::Array(items) if items.len() == 2 => Some((coerce(&items[0])?, coerce(&items[1])?)),
        _ => None,
    }
}

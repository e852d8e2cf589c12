//! Finds references in a rendered template that point at nothing.

use std::collections::HashSet;

use serde_json::Value;

use crate::intrinsic;

struct Declared<'a> {
    parameters: HashSet<&'a str>,
    resources: HashSet<&'a str>,
    conditions: HashSet<&'a str>,
}

impl<'a> Declared<'a> {
    fn from_document(document: &'a Value) -> Self {
        return Self {
            parameters: section_names(document, "Parameters"),
            resources: section_names(document, "Resources"),
            conditions: section_names(document, "Conditions"),
        };
    }

    fn is_referenceable(&self, name: &str) -> bool {
        return intrinsic::is_pseudo_parameter(name)
            || self.parameters.contains(name)
            || self.resources.contains(name);
    }
}

/// Every unresolvable reference as `Kind:Name`, in document order, without
/// repeats. Empty when the template is closed.
pub fn dangling(document: &Value) -> Vec<String> {
    let declared = Declared::from_document(document);
    let mut found = vec![];

    for section in ["Conditions", "Resources", "Outputs"] {
        if let Some(value) = document.get(section) {
            walk(value, &declared, &mut found);
        }
    }

    let mut seen = HashSet::new();
    found.retain(|entry| seen.insert(entry.clone()));

    return found;
}

fn section_names<'a>(document: &'a Value, section: &str) -> HashSet<&'a str> {
    return match document.get(section).and_then(Value::as_object) {
        Some(entries) => entries.keys().map(String::as_str).collect(),
        None => HashSet::new(),
    };
}

fn walk(value: &Value, declared: &Declared, found: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, declared, found);
            }
        }
        Value::Object(entries) => {
            for (key, inner) in entries {
                match (key.as_str(), inner) {
                    ("Ref", Value::String(name)) => {
                        if !declared.is_referenceable(name) {
                            found.push(format!("Ref:{}", name));
                        }
                    }
                    ("Fn::GetAtt", target) => {
                        check_get_att(target, declared, found);
                    }
                    ("Fn::Sub", template) => {
                        check_sub(template, declared, found);
                    }
                    ("Fn::If", Value::Array(arguments)) => {
                        if let Some(Value::String(condition)) = arguments.first() {
                            check_condition(condition, declared, found);
                        }
                        for branch in arguments.iter().skip(1) {
                            walk(branch, declared, found);
                        }
                    }
                    // A string `Condition` names a condition; an object one is
                    // an IAM policy condition block.
                    ("Condition", Value::String(condition)) => {
                        check_condition(condition, declared, found);
                    }
                    _ => walk(inner, declared, found),
                }
            }
        }
        _ => (),
    }
}

fn check_get_att(target: &Value, declared: &Declared, found: &mut Vec<String>) {
    let name = match target {
        Value::Array(parts) => parts.first().and_then(Value::as_str),
        Value::String(dotted) => dotted.split('.').next(),
        _ => None,
    };

    if let Some(name) = name {
        if !declared.resources.contains(name) {
            found.push(format!("GetAtt:{}", name));
        }
    }
}

fn check_sub(template: &Value, declared: &Declared, found: &mut Vec<String>) {
    let (text, locals) = match template {
        Value::String(text) => (text.as_str(), None),
        Value::Array(parts) => match parts.first().and_then(Value::as_str) {
            Some(text) => (text, parts.get(1).and_then(Value::as_object)),
            None => return,
        },
        _ => return,
    };

    if let Some(locals) = locals {
        for local in locals.values() {
            walk(local, declared, found);
        }
    }

    for variable in intrinsic::sub_variables(text) {
        let is_local = locals.map_or(false, |locals| locals.contains_key(&variable));
        if !is_local && !declared.is_referenceable(&variable) {
            found.push(format!("Sub:{}", variable));
        }
    }
}

fn check_condition(name: &str, declared: &Declared, found: &mut Vec<String>) {
    if !declared.conditions.contains(name) {
        found.push(format!("Condition:{}", name));
    }
}

use serde_json::{json, Map, Value};

pub const REGION: &str = "AWS::Region";
pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const STACK_NAME: &str = "AWS::StackName";

const PSEUDO_PARAMETERS: [&str; 8] = [
    "AccountId",
    "NotificationARNs",
    "NoValue",
    "Partition",
    "Region",
    "StackId",
    "StackName",
    "URLSuffix",
];

/// Pseudo parameters are always resolvable, whether declared or not.
pub fn is_pseudo_parameter(name: &str) -> bool {
    return match name.strip_prefix("AWS::") {
        Some(pseudo) => PSEUDO_PARAMETERS.contains(&pseudo),
        None => false,
    };
}

pub fn reference(name: &str) -> Value {
    return json!({ "Ref": name });
}

pub fn get_att(name: &str, attribute: &str) -> Value {
    return json!({ "Fn::GetAtt": [name, attribute] });
}

pub fn join(delimiter: &str, values: Vec<Value>) -> Value {
    return json!({ "Fn::Join": [delimiter, values] });
}

pub fn select(index: &str, list: Value) -> Value {
    return json!({ "Fn::Select": [index, list] });
}

pub fn get_azs(region: Value) -> Value {
    return json!({ "Fn::GetAZs": region });
}

pub fn sub(template: &str) -> Value {
    return json!({ "Fn::Sub": template });
}

pub fn equals(left: Value, right: Value) -> Value {
    return json!({ "Fn::Equals": [left, right] });
}

pub fn if_(condition: &str, when_true: Value, when_false: Value) -> Value {
    return json!({ "Fn::If": [condition, when_true, when_false] });
}

pub fn region() -> Value {
    return reference(REGION);
}

pub fn account_id() -> Value {
    return reference(ACCOUNT_ID);
}

pub fn stack_name() -> Value {
    return reference(STACK_NAME);
}

/// Key/value tag list, in the order given.
pub fn tags(pairs: &[(&str, Value)]) -> Value {
    let tags = pairs
        .iter()
        .map(|(key, value)| {
            let mut tag = Map::new();
            tag.insert(String::from("Key"), Value::String(key.to_string()));
            tag.insert(String::from("Value"), value.clone());
            return Value::Object(tag);
        })
        .collect::<Vec<Value>>();

    return Value::Array(tags);
}

/// Names referenced by a `Fn::Sub` string. `${!Literal}` escapes and
/// `${Name.Attribute}` attribute lookups are handled.
pub fn sub_variables(template: &str) -> Vec<String> {
    let mut variables = vec![];
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = match after.find('}') {
            Some(end) => end,
            None => break,
        };

        let variable = &after[..end];
        if !variable.starts_with('!') && !variable.is_empty() {
            let name = match variable.split_once('.') {
                Some((name, _)) if !variable.starts_with("AWS::") => name,
                _ => variable,
            };
            variables.push(name.to_string());
        }

        rest = &after[end + 1..];
    }

    return variables;
}

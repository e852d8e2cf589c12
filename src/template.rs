use serde::Serialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::intrinsic;
use crate::references;

pub const FORMAT_VERSION: &str = "2010-09-09";

/// The rendered template, ready to be written out.
pub type Document = Value;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Logical ID {0} is already declared")]
    DuplicateName(String),

    #[error("Condition {0} is already declared")]
    DuplicateCondition(String),

    #[error("Output {0} is already declared")]
    DuplicateOutput(String),

    #[error("Invalid declaration of {0}: {1}")]
    InvalidDeclaration(String, String),

    #[error("Resource {0} of kind {1} is missing required property {2}")]
    MissingProperty(String, String, String),

    #[error("Dangling references: {0}")]
    DanglingReferences(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ParameterType {
    String,
    Number,
    #[serde(rename = "List<Number>")]
    NumberList,
    CommaDelimitedList,
}

/// A deploy-time input. Built with the setters below, then handed to
/// [`Template::declare_parameter`].
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "PascalCase")]
#[validate(schema(function = "validate_parameter_constraints"))]
pub struct Parameter {
    #[serde(skip)]
    #[validate(length(min = 1, max = 255), custom = "validate_logical_id")]
    pub name: String,

    #[serde(rename = "Type")]
    pub kind: ParameterType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_description: Option<String>,
}

impl Parameter {
    pub fn new(name: &str, kind: ParameterType) -> Self {
        return Self {
            name: name.to_string(),
            kind,
            description: None,
            default: None,
            allowed_pattern: None,
            allowed_values: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            constraint_description: None,
        };
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        return self;
    }

    pub fn default(mut self, default: Value) -> Self {
        self.default = Some(default);
        return self;
    }

    pub fn allowed_pattern(mut self, pattern: &str) -> Self {
        self.allowed_pattern = Some(pattern.to_string());
        return self;
    }

    pub fn allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = Some(values.iter().map(|value| value.to_string()).collect());
        return self;
    }

    pub fn min_length(mut self, length: u32) -> Self {
        self.min_length = Some(length);
        return self;
    }

    pub fn max_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        return self;
    }

    pub fn min_value(mut self, value: i64) -> Self {
        self.min_value = Some(value);
        return self;
    }

    pub fn max_value(mut self, value: i64) -> Self {
        self.max_value = Some(value);
        return self;
    }

    pub fn constraint_description(mut self, description: &str) -> Self {
        self.constraint_description = Some(description.to_string());
        return self;
    }
}

/// CloudFormation resource types this generator knows how to declare.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceKind {
    Vpc,
    InternetGateway,
    VpcGatewayAttachment,
    RouteTable,
    Route,
    Subnet,
    SubnetRouteTableAssociation,
    Eip,
    NatGateway,
    IamRole,
    IotPolicy,
    LogGroup,
    EcsCluster,
    EcsTaskDefinition,
    EcsService,
    EcrRepository,
    CodeBuildProject,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        return match self {
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::Eip => "AWS::EC2::EIP",
            ResourceKind::NatGateway => "AWS::EC2::NatGateway",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::IotPolicy => "AWS::IoT::Policy",
            ResourceKind::LogGroup => "AWS::Logs::LogGroup",
            ResourceKind::EcsCluster => "AWS::ECS::Cluster",
            ResourceKind::EcsTaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceKind::EcsService => "AWS::ECS::Service",
            ResourceKind::EcrRepository => "AWS::ECR::Repository",
            ResourceKind::CodeBuildProject => "AWS::CodeBuild::Project",
        };
    }

    /// Properties CloudFormation rejects the resource without.
    pub fn required_properties(&self) -> &'static [&'static str] {
        return match self {
            ResourceKind::Vpc => &["CidrBlock"],
            ResourceKind::VpcGatewayAttachment => &["VpcId"],
            ResourceKind::RouteTable => &["VpcId"],
            ResourceKind::Route => &["RouteTableId"],
            ResourceKind::Subnet => &["VpcId", "CidrBlock"],
            ResourceKind::SubnetRouteTableAssociation => &["SubnetId", "RouteTableId"],
            ResourceKind::NatGateway => &["SubnetId"],
            ResourceKind::IamRole => &["AssumeRolePolicyDocument"],
            ResourceKind::IotPolicy => &["PolicyDocument"],
            ResourceKind::EcsTaskDefinition => &["ContainerDefinitions"],
            ResourceKind::EcsService => &["TaskDefinition"],
            ResourceKind::CodeBuildProject => &["Artifacts", "Environment", "ServiceRole", "Source"],
            ResourceKind::InternetGateway
            | ResourceKind::Eip
            | ResourceKind::LogGroup
            | ResourceKind::EcsCluster
            | ResourceKind::EcrRepository => &[],
        };
    }
}

#[derive(Debug, Clone, Validate)]
struct Condition {
    #[validate(length(min = 1, max = 255), custom = "validate_logical_id")]
    name: String,

    #[validate(custom = "validate_condition_expression")]
    expression: Value,
}

#[derive(Debug, Clone, Validate)]
struct Resource {
    #[validate(length(min = 1, max = 255), custom = "validate_logical_id")]
    name: String,

    kind: ResourceKind,

    properties: Map<String, Value>,

    condition: Option<String>,
}

/// A stack output, optionally gated by a condition.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip)]
    #[validate(length(min = 1, max = 255), custom = "validate_logical_id")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    pub value: Value,
}

impl Output {
    pub fn new(name: &str, value: Value) -> Self {
        return Self {
            name: name.to_string(),
            description: None,
            condition: None,
            value,
        };
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        return self;
    }

    pub fn condition(mut self, condition: &ConditionHandle) -> Self {
        self.condition = Some(condition.name.clone());
        return self;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterHandle {
    name: String,
}

impl ParameterHandle {
    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn reference(&self) -> Value {
        return intrinsic::reference(&self.name);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionHandle {
    name: String,
}

impl ConditionHandle {
    pub fn name(&self) -> &str {
        return &self.name;
    }

    /// `Fn::If` on this condition.
    pub fn choose(&self, when_true: Value, when_false: Value) -> Value {
        return intrinsic::if_(&self.name, when_true, when_false);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn reference(&self) -> Value {
        return intrinsic::reference(&self.name);
    }

    pub fn get_att(&self, attribute: &str) -> Value {
        return intrinsic::get_att(&self.name, attribute);
    }
}

/// Parameters, conditions, resources and outputs in declaration order.
///
/// Nothing is evaluated here: references between declarations stay symbolic
/// until CloudFormation resolves them. [`Template::serialize`] only checks
/// that every referenced name was declared.
#[derive(Debug, Default)]
pub struct Template {
    version: Option<String>,
    description: Option<String>,
    parameters: Vec<Parameter>,
    conditions: Vec<Condition>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
}

impl Template {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn set_version(&mut self) {
        self.version = Some(String::from(FORMAT_VERSION));
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = Some(description.to_string());
    }

    pub fn declare_parameter(&mut self, parameter: Parameter) -> Result<ParameterHandle, Error> {
        match parameter.validate() {
            Ok(_) => (),
            Err(error) => {
                return Err(Error::InvalidDeclaration(
                    parameter.name.clone(),
                    error.to_string(),
                ))
            }
        }
        self.ensure_unique(&parameter.name)?;

        tracing::debug!(name = %parameter.name, "declared parameter");
        let handle = ParameterHandle {
            name: parameter.name.clone(),
        };
        self.parameters.push(parameter);

        return Ok(handle);
    }

    pub fn declare_condition(
        &mut self,
        name: &str,
        expression: Value,
    ) -> Result<ConditionHandle, Error> {
        let condition = Condition {
            name: name.to_string(),
            expression,
        };
        match condition.validate() {
            Ok(_) => (),
            Err(error) => {
                return Err(Error::InvalidDeclaration(
                    name.to_string(),
                    error.to_string(),
                ))
            }
        }
        if self.conditions.iter().any(|existing| existing.name == name) {
            return Err(Error::DuplicateCondition(name.to_string()));
        }

        tracing::debug!(name, "declared condition");
        self.conditions.push(condition);

        return Ok(ConditionHandle {
            name: name.to_string(),
        });
    }

    pub fn declare_resource(
        &mut self,
        name: &str,
        kind: ResourceKind,
        properties: Value,
        condition: Option<&ConditionHandle>,
    ) -> Result<ResourceHandle, Error> {
        let properties = match properties {
            Value::Object(properties) => properties,
            Value::Null => Map::new(),
            other => {
                return Err(Error::InvalidDeclaration(
                    name.to_string(),
                    format!("properties must be an object, got {}", other),
                ))
            }
        };

        let resource = Resource {
            name: name.to_string(),
            kind,
            properties,
            condition: condition.map(|condition| condition.name.clone()),
        };
        match resource.validate() {
            Ok(_) => (),
            Err(error) => {
                return Err(Error::InvalidDeclaration(
                    name.to_string(),
                    error.to_string(),
                ))
            }
        }

        for required in kind.required_properties() {
            if !resource.properties.contains_key(*required) {
                return Err(Error::MissingProperty(
                    name.to_string(),
                    kind.as_str().to_string(),
                    required.to_string(),
                ));
            }
        }
        self.ensure_unique(name)?;

        tracing::debug!(name, kind = kind.as_str(), "declared resource");
        self.resources.push(resource);

        return Ok(ResourceHandle {
            name: name.to_string(),
        });
    }

    pub fn declare_output(&mut self, output: Output) -> Result<(), Error> {
        match output.validate() {
            Ok(_) => (),
            Err(error) => {
                return Err(Error::InvalidDeclaration(
                    output.name.clone(),
                    error.to_string(),
                ))
            }
        }
        if self.outputs.iter().any(|existing| existing.name == output.name) {
            return Err(Error::DuplicateOutput(output.name));
        }

        tracing::debug!(name = %output.name, "declared output");
        self.outputs.push(output);

        return Ok(());
    }

    /// Render the template. Empty sections are left out.
    pub fn serialize(&self) -> Result<Document, Error> {
        let mut document = Map::new();

        if let Some(version) = &self.version {
            document.insert(
                String::from("AWSTemplateFormatVersion"),
                Value::String(version.clone()),
            );
        }
        if let Some(description) = &self.description {
            document.insert(
                String::from("Description"),
                Value::String(description.clone()),
            );
        }

        if !self.parameters.is_empty() {
            let mut parameters = Map::new();
            for parameter in &self.parameters {
                parameters.insert(parameter.name.clone(), to_value(parameter)?);
            }
            document.insert(String::from("Parameters"), Value::Object(parameters));
        }

        if !self.conditions.is_empty() {
            let mut conditions = Map::new();
            for condition in &self.conditions {
                conditions.insert(condition.name.clone(), condition.expression.clone());
            }
            document.insert(String::from("Conditions"), Value::Object(conditions));
        }

        let mut resources = Map::new();
        for resource in &self.resources {
            let mut rendered = Map::new();
            rendered.insert(
                String::from("Type"),
                Value::String(resource.kind.as_str().to_string()),
            );
            if let Some(condition) = &resource.condition {
                rendered.insert(String::from("Condition"), Value::String(condition.clone()));
            }
            if !resource.properties.is_empty() {
                rendered.insert(
                    String::from("Properties"),
                    Value::Object(resource.properties.clone()),
                );
            }
            resources.insert(resource.name.clone(), Value::Object(rendered));
        }
        document.insert(String::from("Resources"), Value::Object(resources));

        if !self.outputs.is_empty() {
            let mut outputs = Map::new();
            for output in &self.outputs {
                outputs.insert(output.name.clone(), to_value(output)?);
            }
            document.insert(String::from("Outputs"), Value::Object(outputs));
        }

        let document = Value::Object(document);
        let dangling = references::dangling(&document);
        if !dangling.is_empty() {
            return Err(Error::DanglingReferences(dangling.join(", ")));
        }

        tracing::info!(
            parameters = self.parameters.len(),
            conditions = self.conditions.len(),
            resources = self.resources.len(),
            outputs = self.outputs.len(),
            "serialized template"
        );

        return Ok(document);
    }

    // Parameters and resources share one namespace.
    fn ensure_unique(&self, name: &str) -> Result<(), Error> {
        let taken = self.parameters.iter().any(|parameter| parameter.name == name)
            || self.resources.iter().any(|resource| resource.name == name);
        if taken {
            return Err(Error::DuplicateName(name.to_string()));
        }

        return Ok(());
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, Error> {
    return match serde_json::to_value(value) {
        Ok(value) => Ok(value),
        Err(error) => Err(Error::SerializationError(error.to_string())),
    };
}

fn validate_logical_id(name: &str) -> Result<(), ValidationError> {
    if !name.chars().all(|character| character.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "Logical IDs may only contain ASCII letters and digits",
        ));
    }

    return Ok(());
}

fn validate_condition_expression(expression: &Value) -> Result<(), ValidationError> {
    let function = match expression.as_object() {
        Some(entries) if entries.len() == 1 => entries.keys().next().map(String::as_str),
        _ => None,
    };

    return match function {
        Some("Fn::Equals" | "Fn::And" | "Fn::Or" | "Fn::Not" | "Condition") => Ok(()),
        _ => Err(ValidationError::new(
            "A condition has to be a single Fn::Equals, Fn::And, Fn::Or, Fn::Not or Condition",
        )),
    };
}

fn validate_parameter_constraints(parameter: &Parameter) -> Result<(), ValidationError> {
    let has_length = parameter.min_length.is_some() || parameter.max_length.is_some();
    if has_length && parameter.kind != ParameterType::String {
        return Err(ValidationError::new(
            "MinLength and MaxLength only apply to String parameters",
        ));
    }

    let has_value = parameter.min_value.is_some() || parameter.max_value.is_some();
    if has_value && parameter.kind != ParameterType::Number {
        return Err(ValidationError::new(
            "MinValue and MaxValue only apply to Number parameters",
        ));
    }

    let default = match &parameter.default {
        Some(default) => default,
        None => return Ok(()),
    };

    match parameter.kind {
        ParameterType::Number => {
            let number = match default {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.parse::<f64>().ok(),
                _ => None,
            };
            let number = match number {
                Some(number) => number,
                None => {
                    return Err(ValidationError::new(
                        "The default of a Number parameter has to be numeric",
                    ))
                }
            };
            if parameter.min_value.map_or(false, |min| number < min as f64)
                || parameter.max_value.map_or(false, |max| number > max as f64)
            {
                return Err(ValidationError::new(
                    "The default violates the MinValue/MaxValue constraint",
                ));
            }
        }
        ParameterType::String => {
            let text = match default.as_str() {
                Some(text) => text,
                None => {
                    return Err(ValidationError::new(
                        "The default of a String parameter has to be a string",
                    ))
                }
            };
            let length = text.chars().count() as u32;
            if parameter.max_length.map_or(false, |max| length > max)
                || parameter.min_length.map_or(false, |min| length < min)
            {
                return Err(ValidationError::new(
                    "The default violates the MinLength/MaxLength constraint",
                ));
            }
            if let Some(allowed) = &parameter.allowed_values {
                if !allowed.iter().any(|value| value == text) {
                    return Err(ValidationError::new(
                        "The default is not one of the AllowedValues",
                    ));
                }
            }
        }
        ParameterType::NumberList | ParameterType::CommaDelimitedList => (),
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn template_with_vpc() -> (Template, ResourceHandle) {
        let mut template = Template::new();
        let vpc = template
            .declare_resource(
                "VPC",
                ResourceKind::Vpc,
                json!({ "CidrBlock": "10.0.0.0/16" }),
                None,
            )
            .unwrap();

        return (template, vpc);
    }

    #[test]
    fn parameter_is_rendered_with_type_and_default() {
        let mut template = Template::new();
        let handle = template
            .declare_parameter(
                Parameter::new("Prefix", ParameterType::String)
                    .description("CIDR prefix")
                    .default(json!("172.31")),
            )
            .unwrap();

        let document = template.serialize().unwrap();
        assert_eq!("Prefix", handle.name());
        assert_eq!(json!({ "Ref": "Prefix" }), handle.reference());
        assert_eq!(
            json!({ "Type": "String", "Description": "CIDR prefix", "Default": "172.31" }),
            document["Parameters"]["Prefix"]
        );
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let mut template = Template::new();
        template
            .declare_parameter(Parameter::new("Count", ParameterType::Number))
            .unwrap();

        let result = template.declare_parameter(Parameter::new("Count", ParameterType::Number));
        assert_eq!(Err(Error::DuplicateName(String::from("Count"))), result);
    }

    #[test]
    fn resource_cannot_reuse_a_parameter_name() {
        let mut template = Template::new();
        template
            .declare_parameter(Parameter::new("VPC", ParameterType::String))
            .unwrap();

        let result = template.declare_resource(
            "VPC",
            ResourceKind::Vpc,
            json!({ "CidrBlock": "10.0.0.0/16" }),
            None,
        );
        assert_eq!(Err(Error::DuplicateName(String::from("VPC"))), result);
    }

    #[test]
    fn duplicate_condition_is_rejected() {
        let mut template = Template::new();
        template
            .declare_condition("IsProd", intrinsic::equals(json!("a"), json!("a")))
            .unwrap();

        let result = template.declare_condition(
            "IsProd",
            intrinsic::equals(json!("b"), json!("b")),
        );
        assert_eq!(Err(Error::DuplicateCondition(String::from("IsProd"))), result);
    }

    #[test]
    fn duplicate_output_is_rejected() {
        let (mut template, vpc) = template_with_vpc();
        template
            .declare_output(Output::new("VpcId", vpc.reference()))
            .unwrap();

        let result = template.declare_output(Output::new("VpcId", vpc.reference()));
        assert_eq!(Err(Error::DuplicateOutput(String::from("VpcId"))), result);
    }

    #[test]
    fn logical_ids_must_be_alphanumeric() {
        let mut template = Template::new();

        let result = template.declare_parameter(Parameter::new("bad-name", ParameterType::String));
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::InvalidDeclaration(name, _) => assert_eq!("bad-name", name),
            _ => panic!("Expected `InvalidDeclaration` error"),
        }

        let result = template.declare_resource("", ResourceKind::EcsCluster, json!({}), None);
        match result.err().unwrap() {
            Error::InvalidDeclaration(_, _) => {}
            _ => panic!("Expected `InvalidDeclaration` error"),
        }
    }

    #[test]
    fn number_parameter_needs_numeric_default() {
        let mut template = Template::new();

        let result = template.declare_parameter(
            Parameter::new("Count", ParameterType::Number).default(json!("many")),
        );
        match result.err().unwrap() {
            Error::InvalidDeclaration(name, _) => assert_eq!("Count", name),
            _ => panic!("Expected `InvalidDeclaration` error"),
        }

        let result = template
            .declare_parameter(Parameter::new("Count", ParameterType::Number).default(json!(0)));
        assert_eq!(false, result.is_err());
    }

    #[test]
    fn number_default_must_respect_value_bounds() {
        let mut template = Template::new();

        let too_many = template.declare_parameter(
            Parameter::new("Devices", ParameterType::Number)
                .min_value(0)
                .max_value(100)
                .default(json!(250)),
        );
        assert_eq!(true, too_many.is_err());

        let too_few = template.declare_parameter(
            Parameter::new("Devices", ParameterType::Number)
                .min_value(1)
                .default(json!("0")),
        );
        assert_eq!(true, too_few.is_err());

        let handle = template
            .declare_parameter(
                Parameter::new("Devices", ParameterType::Number)
                    .min_value(0)
                    .max_value(100)
                    .constraint_description("Between 0 and 100 devices")
                    .default(json!(10)),
            )
            .unwrap();

        let document = template.serialize().unwrap();
        assert_eq!(
            json!({
                "Type": "Number",
                "Default": 10,
                "MinValue": 0,
                "MaxValue": 100,
                "ConstraintDescription": "Between 0 and 100 devices"
            }),
            document["Parameters"][handle.name()]
        );
    }

    #[test]
    fn value_bounds_only_apply_to_numbers() {
        let mut template = Template::new();

        let result = template.declare_parameter(
            Parameter::new("Prefix", ParameterType::String).max_value(10),
        );
        match result.err().unwrap() {
            Error::InvalidDeclaration(name, _) => assert_eq!("Prefix", name),
            _ => panic!("Expected `InvalidDeclaration` error"),
        }
    }

    #[test]
    fn condition_must_be_a_boolean_function() {
        let mut template = Template::new();

        for expression in [
            json!("not a boolean expression"),
            json!(true),
            json!({ "Ref": "Repo" }),
            json!({ "Fn::Equals": ["a", "a"], "Fn::Not": [] }),
        ] {
            let result = template.declare_condition("Weird", expression);
            match result.err().unwrap() {
                Error::InvalidDeclaration(name, _) => assert_eq!("Weird", name),
                _ => panic!("Expected `InvalidDeclaration` error"),
            }
        }

        let base = template
            .declare_condition("IsDev", intrinsic::equals(json!("dev"), json!("dev")))
            .unwrap();
        let result = template.declare_condition(
            "IsNotDev",
            json!({ "Fn::Not": [{ "Condition": base.name() }] }),
        );
        assert_eq!(false, result.is_err());
    }

    #[test]
    fn duplicate_resource_is_rejected() {
        let (mut template, _) = template_with_vpc();

        let result = template.declare_resource(
            "VPC",
            ResourceKind::Vpc,
            json!({ "CidrBlock": "10.1.0.0/16" }),
            None,
        );
        assert_eq!(Err(Error::DuplicateName(String::from("VPC"))), result);
    }

    #[test]
    fn string_default_must_respect_length_and_allowed_values() {
        let mut template = Template::new();

        let too_long = template.declare_parameter(
            Parameter::new("Endpoint", ParameterType::String)
                .max_length(4)
                .default(json!("abcdef")),
        );
        assert_eq!(true, too_long.is_err());

        let not_allowed = template.declare_parameter(
            Parameter::new("Stage", ParameterType::String)
                .allowed_values(&["dev", "prod"])
                .default(json!("test")),
        );
        assert_eq!(true, not_allowed.is_err());

        let length_on_number = template.declare_parameter(
            Parameter::new("Count", ParameterType::Number).max_length(3),
        );
        assert_eq!(true, length_on_number.is_err());
    }

    #[test]
    fn resource_properties_must_be_an_object() {
        let mut template = Template::new();

        let result = template.declare_resource("Cluster", ResourceKind::EcsCluster, json!([]), None);
        match result.err().unwrap() {
            Error::InvalidDeclaration(name, _) => assert_eq!("Cluster", name),
            _ => panic!("Expected `InvalidDeclaration` error"),
        }
    }

    #[test]
    fn missing_required_property_is_rejected() {
        let mut template = Template::new();

        let result = template.declare_resource("Subnet", ResourceKind::Subnet, json!({ "CidrBlock": "10.0.0.0/24" }), None);
        assert_eq!(
            Err(Error::MissingProperty(
                String::from("Subnet"),
                String::from("AWS::EC2::Subnet"),
                String::from("VpcId")
            )),
            result
        );
    }

    #[test]
    fn resources_keep_declaration_order() {
        let (mut template, vpc) = template_with_vpc();
        template
            .declare_resource("Zeta", ResourceKind::EcsCluster, Value::Null, None)
            .unwrap();
        template
            .declare_resource(
                "Alpha",
                ResourceKind::RouteTable,
                json!({ "VpcId": vpc.reference() }),
                None,
            )
            .unwrap();

        let document = template.serialize().unwrap();
        let names: Vec<&String> = document["Resources"].as_object().unwrap().keys().collect();
        assert_eq!(vec!["VPC", "Zeta", "Alpha"], names);
    }

    #[test]
    fn empty_properties_are_omitted() {
        let mut template = Template::new();
        template
            .declare_resource("Cluster", ResourceKind::EcsCluster, json!({}), None)
            .unwrap();

        let document = template.serialize().unwrap();
        assert_eq!(json!({ "Type": "AWS::ECS::Cluster" }), document["Resources"]["Cluster"]);
    }

    #[test]
    fn conditional_resource_carries_the_condition_name() {
        let mut template = Template::new();
        let repo = template
            .declare_parameter(Parameter::new("Repo", ParameterType::String).default(json!("none")))
            .unwrap();
        let builtin = template
            .declare_condition("UseBuiltIn", intrinsic::equals(repo.reference(), json!("none")))
            .unwrap();
        let registry = template
            .declare_resource("Registry", ResourceKind::EcrRepository, json!({}), Some(&builtin))
            .unwrap();
        template
            .declare_output(
                Output::new("RegistryArn", registry.get_att("Arn"))
                    .description("Registry ARN")
                    .condition(&builtin),
            )
            .unwrap();

        let document = template.serialize().unwrap();
        assert_eq!(
            json!({ "Type": "AWS::ECR::Repository", "Condition": "UseBuiltIn" }),
            document["Resources"]["Registry"]
        );
        assert_eq!(
            json!({ "Fn::Equals": [{ "Ref": "Repo" }, "none"] }),
            document["Conditions"]["UseBuiltIn"]
        );
        assert_eq!(
            json!({
                "Description": "Registry ARN",
                "Condition": "UseBuiltIn",
                "Value": { "Fn::GetAtt": ["Registry", "Arn"] }
            }),
            document["Outputs"]["RegistryArn"]
        );
    }

    #[test]
    fn dangling_reference_fails_serialization() {
        let mut template = Template::new();
        template
            .declare_resource(
                "Subnet",
                ResourceKind::Subnet,
                json!({ "VpcId": { "Ref": "MissingVpc" }, "CidrBlock": "10.0.0.0/24" }),
                None,
            )
            .unwrap();

        let result = template.serialize();
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::DanglingReferences(names) => assert_eq!(true, names.contains("MissingVpc")),
            _ => panic!("Expected `DanglingReferences` error"),
        }
    }

    #[test]
    fn unknown_pseudo_parameter_fails_serialization() {
        let mut template = Template::new();
        template
            .declare_resource(
                "Logs",
                ResourceKind::LogGroup,
                json!({
                    "LogGroupName": { "Ref": "AWS::Regoin" },
                    "Prefix": { "Fn::Sub": "${AWS::Bogus}-x" }
                }),
                None,
            )
            .unwrap();

        let result = template.serialize();
        assert_eq!(
            Err(Error::DanglingReferences(String::from(
                "Ref:AWS::Regoin, Sub:AWS::Bogus"
            ))),
            result
        );
    }

    #[test]
    fn metadata_sections_come_first() {
        let (mut template, _) = template_with_vpc();
        template.set_description("Demo");
        template.set_version();

        let document = template.serialize().unwrap();
        let sections: Vec<&String> = document.as_object().unwrap().keys().collect();
        assert_eq!(vec!["AWSTemplateFormatVersion", "Description", "Resources"], sections);
        assert_eq!(json!("2010-09-09"), document["AWSTemplateFormatVersion"]);
    }
}

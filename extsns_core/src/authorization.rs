//! Static permission resources.
//!
//! Each declared binding needs an `AWS::Lambda::Permission` in the compiled template so the
//! topic is allowed to invoke the function. Resource names are a pure function of the function
//! name and the topic's short name, so compiling twice yields the same template.

use crate::error::{ConfigurationError, ReconcileError};
use crate::identity::{
    normalize_name, normalize_topic_token, JoinExpression, JoinSegment, PseudoParameter,
    TopicReference, TOPIC_SERVICE,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Resource type of the generated permission.
pub const PERMISSION_TYPE: &str = "AWS::Lambda::Permission";
/// The action granted to the messaging platform.
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";
/// The messaging platform's service principal.
pub const TOPIC_PRINCIPAL: &str = "sns.amazonaws.com";

/// A compiled template, as far as this plugin touches it.
///
/// Only `Resources` is interpreted; every other top level key is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    /// Resources keyed by logical id
    #[serde(rename = "Resources", default)]
    pub resources: Map<String, Value>,
    /// All other template sections
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl CompiledTemplate {
    /// Creates an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a resource, returning the previous value.
    pub fn insert_resource(&mut self, name: impl Into<String>, resource: Value) -> Option<Value> {
        self.resources.insert(name.into(), resource)
    }

    /// Looks a resource up by logical id.
    pub fn resource(&self, name: &str) -> Option<&Value> {
        self.resources.get(name)
    }
}

/// A permission allowing a topic to invoke a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResource {
    /// Always [`PERMISSION_TYPE`]
    #[serde(rename = "Type")]
    pub resource_type: String,
    /// Permission properties
    #[serde(rename = "Properties")]
    pub properties: PermissionProperties,
}

/// Properties of an [`AuthorizationResource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionProperties {
    /// `Fn::GetAtt` of the function's ARN
    pub function_name: Value,
    /// Always [`INVOKE_ACTION`]
    pub action: String,
    /// Always [`TOPIC_PRINCIPAL`]
    pub principal: String,
    /// The topic ARN, literal or as an `Fn::Join`
    pub source_arn: Value,
}

/// Logical id of the function resource the host compiles for `function_name`.
pub fn function_logical_id(function_name: &str) -> Result<String, ConfigurationError> {
    let name = normalize_name(function_name)
        .ok_or(ConfigurationError::EmptyIdentifier("function name"))?;
    Ok(format!("{name}LambdaFunction"))
}

/// Logical id of the permission for `function_name` and `topic`.
pub fn permission_resource_name(
    function_name: &str,
    topic: &TopicReference,
) -> Result<String, ConfigurationError> {
    let function = normalize_name(function_name)
        .ok_or(ConfigurationError::EmptyIdentifier("function name"))?;
    let topic = normalize_topic_token(&topic.short_name()?)
        .ok_or(ConfigurationError::EmptyIdentifier("topic name"))?;
    Ok(format!("{function}LambdaPermission{topic}"))
}

/// The `SourceArn` condition of the permission.
///
/// Fully qualified ARNs are used literally. Bare names become a join over the template's
/// partition, region and account pseudo parameters, and join expressions are re-emitted after
/// checking that every reference in them is supported.
pub fn source_arn(topic: &TopicReference) -> Result<Value, ConfigurationError> {
    match topic {
        TopicReference::Literal(arn) if topic.is_fully_qualified() => Ok(Value::String(arn.clone())),
        TopicReference::Literal(name) => {
            let expression = JoinExpression::new(
                ":",
                vec![
                    JoinSegment::Literal("arn".to_string()),
                    JoinSegment::reference(PseudoParameter::Partition.name()),
                    JoinSegment::Literal(TOPIC_SERVICE.to_string()),
                    JoinSegment::reference(PseudoParameter::Region.name()),
                    JoinSegment::reference(PseudoParameter::AccountId.name()),
                    JoinSegment::Literal(name.clone()),
                ],
            );
            Ok(join_value(&expression))
        }
        TopicReference::Composite(expression) => {
            expression.validate()?;
            Ok(join_value(expression))
        }
        TopicReference::Unsupported(value) => {
            Err(ConfigurationError::UnsupportedSegment(value.to_string()))
        }
    }
}

fn join_value(expression: &JoinExpression) -> Value {
    let segments: Vec<Value> = expression
        .segments()
        .iter()
        .map(|segment| match segment {
            JoinSegment::Literal(s) => Value::String(s.clone()),
            JoinSegment::Ref { name } => json!({ "Ref": name }),
            JoinSegment::Unsupported(value) => value.clone(),
        })
        .collect();
    json!({ "Fn::Join": [expression.delimiter(), segments] })
}

/// Builds the permission for one binding without touching any template.
pub fn synthesize_authorization(
    function_name: &str,
    topic: &TopicReference,
) -> Result<(String, AuthorizationResource), ConfigurationError> {
    let resource_name = permission_resource_name(function_name, topic)?;
    let resource = AuthorizationResource {
        resource_type: PERMISSION_TYPE.to_string(),
        properties: PermissionProperties {
            function_name: json!({ "Fn::GetAtt": [function_logical_id(function_name)?, "Arn"] }),
            action: INVOKE_ACTION.to_string(),
            principal: TOPIC_PRINCIPAL.to_string(),
            source_arn: source_arn(topic)?,
        },
    };
    Ok((resource_name, resource))
}

/// Builds the permission for one binding and writes it into `template`.
///
/// An existing resource with the same name is replaced. Returns the resource name.
pub fn write_authorization(
    template: &mut CompiledTemplate,
    function_name: &str,
    topic: &TopicReference,
) -> Result<String, ReconcileError> {
    let (resource_name, resource) = synthesize_authorization(function_name, topic)?;
    let value = serde_json::to_value(&resource).map_err(|source| ReconcileError::Codec {
        what: format!("permission {resource_name}"),
        source,
    })?;
    log::debug!("Compiled {resource_name} for {function_name} and {topic}");
    template.insert_resource(resource_name.clone(), value);
    Ok(resource_name)
}

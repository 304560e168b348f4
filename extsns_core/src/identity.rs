//! Identifier normalization.
//!
//! Topic references reach the plugin in three shapes: a bare topic name, a fully qualified ARN,
//! or an `Fn::Join` expression mixing literals with `Ref`s to pseudo parameters. Everything in
//! this module is pure; nothing here talks to the platform.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix identifying a fully qualified topic reference.
pub const ARN_PREFIX: &str = "arn:aws";

/// Service segment of topic ARNs.
pub const TOPIC_SERVICE: &str = "sns";

/// Upper-cases the first character of `s` and leaves the rest untouched.
///
/// Returns `None` for an empty string.
pub fn normalize_name(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// Strips every character outside `[0-9A-Za-z]` and normalizes the remainder.
pub fn normalize_topic_token(token: &str) -> Option<String> {
    let stripped: String = token.chars().filter(char::is_ascii_alphanumeric).collect();
    normalize_name(&stripped)
}

/// Whether `reference` is already a fully qualified ARN.
pub fn is_fully_qualified(reference: &str) -> bool {
    reference.starts_with(ARN_PREFIX)
}

/// The components of an ARN.
///
/// The resource part is kept whole, so `function:name:alias` stays a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arn<'a> {
    /// Partition, e.g. `aws` or `aws-cn`
    pub partition: &'a str,
    /// Service, e.g. `lambda`
    pub service: &'a str,
    /// Region
    pub region: &'a str,
    /// Account id
    pub account: &'a str,
    /// Everything after the account
    pub resource: &'a str,
}

impl<'a> Arn<'a> {
    /// Splits `s` into its components, or `None` when it is not an ARN.
    pub fn parse(s: &'a str) -> Option<Self> {
        let mut parts = s.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let arn = Arn {
            partition: parts.next()?,
            service: parts.next()?,
            region: parts.next()?,
            account: parts.next()?,
            resource: parts.next()?,
        };
        if arn.partition.is_empty() {
            return None;
        }
        Some(arn)
    }
}

/// The pseudo parameters a topic expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoParameter {
    /// `AWS::AccountId`
    AccountId,
    /// `AWS::Region`
    Region,
    /// `AWS::Partition`
    Partition,
}

impl PseudoParameter {
    /// Looks a pseudo parameter up by its template name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AWS::AccountId" => Some(PseudoParameter::AccountId),
            "AWS::Region" => Some(PseudoParameter::Region),
            "AWS::Partition" => Some(PseudoParameter::Partition),
            _ => None,
        }
    }

    /// The template name of this pseudo parameter.
    pub fn name(&self) -> &'static str {
        match self {
            PseudoParameter::AccountId => "AWS::AccountId",
            PseudoParameter::Region => "AWS::Region",
            PseudoParameter::Partition => "AWS::Partition",
        }
    }

    fn value<'v>(&self, scope: &TopicScope<'v>) -> &'v str {
        match self {
            PseudoParameter::AccountId => scope.account,
            PseudoParameter::Region => scope.region,
            PseudoParameter::Partition => scope.partition,
        }
    }
}

/// Account, region and partition used to complete a topic reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicScope<'a> {
    /// Account id
    pub account: &'a str,
    /// Region
    pub region: &'a str,
    /// Partition
    pub partition: &'a str,
}

impl<'a> From<&Arn<'a>> for TopicScope<'a> {
    fn from(arn: &Arn<'a>) -> Self {
        TopicScope {
            account: arn.account,
            region: arn.region,
            partition: arn.partition,
        }
    }
}

/// A topic as declared under `externalSNS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicReference {
    /// A bare topic name or a fully qualified ARN
    Literal(String),
    /// An `Fn::Join` expression
    Composite(JoinExpression),
    /// Any other shape; resolving or naming it is an error
    Unsupported(serde_json::Value),
}

/// An `Fn::Join` expression: a delimiter and the segments it joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinExpression {
    /// `[delimiter, segments]`
    #[serde(rename = "Fn::Join")]
    pub join: (String, Vec<JoinSegment>),
}

/// One segment of an `Fn::Join` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinSegment {
    /// A literal string
    Literal(String),
    /// A `Ref` to a named value
    Ref {
        /// The referenced name
        #[serde(rename = "Ref")]
        name: String,
    },
    /// Anything else; evaluating it is an error
    Unsupported(serde_json::Value),
}

impl JoinExpression {
    /// Creates a new join expression.
    pub fn new(delimiter: impl Into<String>, segments: Vec<JoinSegment>) -> Self {
        JoinExpression {
            join: (delimiter.into(), segments),
        }
    }

    /// The delimiter placed between segments.
    pub fn delimiter(&self) -> &str {
        &self.join.0
    }

    /// The joined segments, in order.
    pub fn segments(&self) -> &[JoinSegment] {
        &self.join.1
    }

    /// Fails on the first segment that cannot be evaluated.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.segments().iter().try_for_each(JoinSegment::validate)
    }

    /// Evaluates the expression within `scope`.
    pub fn evaluate(&self, scope: &TopicScope<'_>) -> Result<String, ConfigurationError> {
        let parts = self
            .segments()
            .iter()
            .map(|segment| match segment {
                JoinSegment::Literal(s) => Ok(s.as_str()),
                JoinSegment::Ref { name } => PseudoParameter::from_name(name)
                    .map(|p| p.value(scope))
                    .ok_or_else(|| ConfigurationError::UnsupportedReference(name.clone())),
                JoinSegment::Unsupported(value) => Err(unsupported(value)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(self.delimiter()))
    }
}

impl JoinSegment {
    /// Creates a `Ref` segment.
    pub fn reference(name: impl Into<String>) -> Self {
        JoinSegment::Ref { name: name.into() }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            JoinSegment::Literal(_) => Ok(()),
            JoinSegment::Ref { name } => PseudoParameter::from_name(name)
                .map(|_| ())
                .ok_or_else(|| ConfigurationError::UnsupportedReference(name.clone())),
            JoinSegment::Unsupported(value) => Err(unsupported(value)),
        }
    }
}

impl TopicReference {
    /// Whether the reference is a literal fully qualified ARN.
    pub fn is_fully_qualified(&self) -> bool {
        matches!(self, TopicReference::Literal(s) if is_fully_qualified(s))
    }

    /// The last `:` separated token of the reference, used to name generated resources.
    pub fn short_name(&self) -> Result<String, ConfigurationError> {
        match self {
            TopicReference::Literal(s) if is_fully_qualified(s) => Ok(last_token(s).to_string()),
            TopicReference::Literal(s) => Ok(s.clone()),
            TopicReference::Composite(_) => Ok(last_token(&self.to_string()).to_string()),
            TopicReference::Unsupported(value) => Err(unsupported(value)),
        }
    }

    /// Resolves the reference to a topic ARN.
    ///
    /// Fully qualified ARNs are returned verbatim, join expressions are evaluated within `scope`
    /// and bare names are completed with the scope's partition, region and account.
    pub fn resolve(&self, scope: &TopicScope<'_>) -> Result<String, ConfigurationError> {
        match self {
            TopicReference::Literal(s) if is_fully_qualified(s) => Ok(s.clone()),
            TopicReference::Literal(name) => Ok(format!(
                "arn:{}:{}:{}:{}:{}",
                scope.partition, TOPIC_SERVICE, scope.region, scope.account, name
            )),
            TopicReference::Composite(expression) => expression.evaluate(scope),
            TopicReference::Unsupported(value) => Err(unsupported(value)),
        }
    }
}

/// Resolves `reference` to a topic ARN within the given account, region and partition.
pub fn resolve_topic_reference(
    reference: &TopicReference,
    account: &str,
    region: &str,
    partition: &str,
) -> Result<String, ConfigurationError> {
    reference.resolve(&TopicScope {
        account,
        region,
        partition,
    })
}

fn unsupported(value: &serde_json::Value) -> ConfigurationError {
    ConfigurationError::UnsupportedSegment(value.to_string())
}

fn last_token(s: &str) -> &str {
    s.rsplit(':').next().unwrap_or(s)
}

impl From<&str> for TopicReference {
    fn from(s: &str) -> Self {
        TopicReference::Literal(s.to_string())
    }
}

impl From<String> for TopicReference {
    fn from(s: String) -> Self {
        TopicReference::Literal(s)
    }
}

impl From<JoinExpression> for TopicReference {
    fn from(expression: JoinExpression) -> Self {
        TopicReference::Composite(expression)
    }
}

impl fmt::Display for TopicReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicReference::Literal(s) => f.write_str(s),
            TopicReference::Composite(expression) => {
                for (i, segment) in expression.segments().iter().enumerate() {
                    if i > 0 {
                        f.write_str(expression.delimiter())?;
                    }
                    match segment {
                        JoinSegment::Literal(s) => f.write_str(s)?,
                        JoinSegment::Ref { name } => write!(f, "${{{name}}}")?,
                        JoinSegment::Unsupported(value) => write!(f, "{value}")?,
                    }
                }
                Ok(())
            }
            TopicReference::Unsupported(value) => write!(f, "{value}"),
        }
    }
}

//! The host's function and event manifest, and the enumeration of declared bindings.

use crate::identity::TopicReference;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The event attribute declaring a topic binding.
pub const BINDING_ATTRIBUTE: &str = "externalSNS";

/// The declared functions, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Function definitions keyed by the manifest's function name
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDefinition>,
}

/// A function definition. Only `name` and `events` are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// The platform-side function name
    pub name: String,
    /// Declared events, in order
    #[serde(default)]
    pub events: Vec<EventDeclaration>,
    /// Everything else the host keeps on the definition
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One declared event of a function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDeclaration {
    /// The bound topic, when this event is an external topic binding
    #[serde(rename = "externalSNS", default, skip_serializing_if = "Option::is_none")]
    pub external_sns: Option<TopicReference>,
    /// Any other event attributes
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A declared intent linking one function to one topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binding<'a> {
    /// The manifest's function name
    pub function_name: &'a str,
    /// The function definition
    pub function: &'a FunctionDefinition,
    /// The bound topic
    pub topic: &'a TopicReference,
}

impl FunctionDefinition {
    /// Creates a definition with no events.
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDefinition {
            name: name.into(),
            events: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Appends an event bound to `topic`.
    pub fn with_binding(mut self, topic: impl Into<TopicReference>) -> Self {
        self.events.push(EventDeclaration {
            external_sns: Some(topic.into()),
            other: Map::new(),
        });
        self
    }

    /// Appends an arbitrary event.
    pub fn with_event(mut self, event: EventDeclaration) -> Self {
        self.events.push(event);
        self
    }
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a manifest from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Adds or replaces a function.
    pub fn with_function(mut self, name: impl Into<String>, function: FunctionDefinition) -> Self {
        self.functions.insert(name.into(), function);
        self
    }

    /// Every declared binding: functions in declaration order, then their events in order.
    ///
    /// Duplicates are not collapsed; the same pair declared twice is yielded twice.
    pub fn bindings(&self) -> impl Iterator<Item = Binding<'_>> {
        self.functions.iter().flat_map(|(function_name, function)| {
            function.events.iter().filter_map(move |event| {
                event.external_sns.as_ref().map(|topic| Binding {
                    function_name,
                    function,
                    topic,
                })
            })
        })
    }
}

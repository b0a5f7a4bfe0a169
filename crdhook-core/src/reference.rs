use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Resource types produced or consumed while assembling an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Encounter,
    Condition,
    ServiceRequest,
    Organization,
    Practitioner,
    Location,
    Coverage,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Encounter => "Encounter",
            ResourceType::Condition => "Condition",
            ResourceType::ServiceRequest => "ServiceRequest",
            ResourceType::Organization => "Organization",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::Location => "Location",
            ResourceType::Coverage => "Coverage",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceType::Patient),
            "Encounter" => Ok(ResourceType::Encounter),
            "Condition" => Ok(ResourceType::Condition),
            "ServiceRequest" => Ok(ResourceType::ServiceRequest),
            "Organization" => Ok(ResourceType::Organization),
            "Practitioner" => Ok(ResourceType::Practitioner),
            "Location" => Ok(ResourceType::Location),
            "Coverage" => Ok(ResourceType::Coverage),
            other => Err(format!("Unsupported resource type: {}", other)),
        }
    }
}

/// A server-assigned id tagged with its resource type, rendered `Type/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct ResourceReference {
    pub resource_type: ResourceType,
    pub id: String,
}

impl ResourceReference {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }

    /// Take the reference of a resource returned by the server.
    ///
    /// The body must carry the expected `resourceType` and a non-empty `id`.
    pub fn from_resource(expected: ResourceType, resource: &Value) -> Result<Self> {
        let actual = resource.get("resourceType").and_then(|v| v.as_str());
        if actual != Some(expected.as_str()) {
            return Err(CoreError::MalformedResource {
                expected: expected.to_string(),
                message: format!("resourceType is {:?}", actual.unwrap_or("missing")),
            });
        }

        match resource.get("id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => Ok(Self::new(expected, id)),
            _ => Err(CoreError::MalformedResource {
                expected: expected.to_string(),
                message: "server did not assign an id".to_string(),
            }),
        }
    }

    /// The `{"reference": "Type/id"}` element used inside resource bodies.
    pub fn to_reference_json(&self) -> Value {
        serde_json::json!({ "reference": self.to_string() })
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

impl From<ResourceReference> for String {
    fn from(reference: ResourceReference) -> Self {
        reference.to_string()
    }
}

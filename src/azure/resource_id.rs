//! Azure Resource Manager resource identifiers.
//!
//! ARM ids are `/`-separated key/value pairs:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{group}/providers/{namespace}/{type}/{name}
//! ```
//!
//! `subscriptions` is mandatory. `resourceGroups` and `providers` are lifted
//! into their own fields; every other pair is kept, in order, in `path`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Resource provider namespace for Analysis Services.
pub const ANALYSIS_SERVICES_NAMESPACE: &str = "Microsoft.AnalysisServices";

/// Path key under which Analysis Services server names live.
pub const SERVERS_SEGMENT: &str = "servers";

/// Errors produced while parsing a resource id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceIdError {
    /// The id was empty or only slashes.
    #[error("resource id is empty")]
    Empty,

    /// The id does not consist of key/value pairs.
    #[error("the number of path segments is not divisible by 2 in {0:?}")]
    OddSegments(String),

    /// A key or value in the id was empty.
    #[error("resource id {0:?} contains an empty segment")]
    EmptySegment(String),

    /// A required key is absent.
    #[error("resource id has no '{0}' segment")]
    MissingSegment(&'static str),
}

/// A parsed ARM resource id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// Subscription the resource lives in.
    pub subscription_id: String,
    /// Resource group, if the id is scoped to one.
    pub resource_group: Option<String>,
    /// Resource provider namespace (e.g. `Microsoft.AnalysisServices`).
    pub provider: Option<String>,
    /// Remaining key/value pairs after the provider namespace.
    pub path: Vec<(String, String)>,
}

impl ResourceId {
    /// Build the id of an Analysis Services server.
    pub fn analysis_server(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: Some(resource_group.into()),
            provider: Some(ANALYSIS_SERVICES_NAMESPACE.to_string()),
            path: vec![(SERVERS_SEGMENT.to_string(), name.into())],
        }
    }

    /// Look up a path value by key.
    pub fn segment(&self, key: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The resource group, or an error if the id is not group scoped.
    pub fn require_resource_group(&self) -> Result<&str, ResourceIdError> {
        self.resource_group
            .as_deref()
            .ok_or(ResourceIdError::MissingSegment("resourceGroups"))
    }

    /// The `(resource_group, server_name)` pair addressed by this id.
    pub fn analysis_server_parts(&self) -> Result<(&str, &str), ResourceIdError> {
        let group = self.require_resource_group()?;
        let name = self
            .segment(SERVERS_SEGMENT)
            .ok_or(ResourceIdError::MissingSegment(SERVERS_SEGMENT))?;
        Ok((group, name))
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let trimmed = id.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ResourceIdError::Empty);
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(ResourceIdError::OddSegments(id.to_string()));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut path = Vec::new();

        for pair in segments.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(ResourceIdError::EmptySegment(id.to_string()));
            }
            match key {
                "subscriptions" if subscription_id.is_none() => {
                    subscription_id = Some(value.to_string())
                }
                "resourceGroups" if resource_group.is_none() => {
                    resource_group = Some(value.to_string())
                }
                "providers" if provider.is_none() => provider = Some(value.to_string()),
                _ => path.push((key.to_string(), value.to_string())),
            }
        }

        Ok(Self {
            subscription_id: subscription_id
                .ok_or(ResourceIdError::MissingSegment("subscriptions"))?,
            resource_group,
            provider,
            path,
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if let Some(group) = &self.resource_group {
            write!(f, "/resourceGroups/{}", group)?;
        }
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.AnalysisServices/servers/acctest1";

    #[test]
    fn test_parse_server_id() {
        let id: ResourceId = SERVER_ID.parse().unwrap();
        assert_eq!(id.subscription_id, "00000000-0000-0000-0000-000000000000");
        assert_eq!(id.resource_group.as_deref(), Some("rg1"));
        assert_eq!(id.provider.as_deref(), Some(ANALYSIS_SERVICES_NAMESPACE));
        assert_eq!(id.segment("servers"), Some("acctest1"));
        assert_eq!(id.analysis_server_parts().unwrap(), ("rg1", "acctest1"));
    }

    #[test]
    fn test_display_matches_canonical_form() {
        let id = ResourceId::analysis_server("00000000-0000-0000-0000-000000000000", "rg1", "acctest1");
        assert_eq!(id.to_string(), SERVER_ID);

        let parsed: ResourceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_tolerates_trailing_slash() {
        let id: ResourceId = format!("{}/", SERVER_ID).parse().unwrap();
        assert_eq!(id.segment("servers"), Some("acctest1"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<ResourceId>(), Err(ResourceIdError::Empty));
        assert_eq!("///".parse::<ResourceId>(), Err(ResourceIdError::Empty));

        assert!(matches!(
            "/subscriptions/sub/resourceGroups".parse::<ResourceId>(),
            Err(ResourceIdError::OddSegments(_))
        ));

        assert!(matches!(
            "/subscriptions//resourceGroups/rg1".parse::<ResourceId>(),
            Err(ResourceIdError::EmptySegment(_))
        ));

        assert_eq!(
            "/resourceGroups/rg1/providers/Microsoft.AnalysisServices/servers/a".parse::<ResourceId>(),
            Err(ResourceIdError::MissingSegment("subscriptions"))
        );
    }

    #[test]
    fn test_server_parts_require_group_and_name() {
        let id: ResourceId = "/subscriptions/sub/providers/Microsoft.AnalysisServices/servers/a"
            .parse()
            .unwrap();
        assert_eq!(
            id.analysis_server_parts(),
            Err(ResourceIdError::MissingSegment("resourceGroups"))
        );

        let id: ResourceId = "/subscriptions/sub/resourceGroups/rg1".parse().unwrap();
        assert_eq!(
            id.analysis_server_parts(),
            Err(ResourceIdError::MissingSegment("servers"))
        );
    }
}

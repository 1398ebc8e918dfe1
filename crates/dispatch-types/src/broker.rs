//! Broker and service metadata.
//!
//! These types are inputs to contract synthesis and client construction;
//! they are never mutated at runtime. Serialization follows the wire names
//! used in the generated contract (`type`, `in`, `bearerFormat`, ...).

use serde::{Deserialize, Serialize};

/// Security scheme types understood by the generated contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityType {
    Plain,
    UserPassword,
    ApiKey,
    #[serde(rename = "X509")]
    X509,
    SymmetricEncryption,
    AsymmetricEncryption,
    HttpApiKey,
    Http,
    Oauth2,
    OpenIdConnect,
    ScramSha256,
    ScramSha512,
    Gssapi,
}

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    User,
    Password,
    Query,
    Header,
    Cookie,
}

/// Security scheme attached to a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub security_type: SecurityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub api_key_loc: Option<ApiKeyLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(rename = "bearerFormat", default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows: Option<String>,
    #[serde(
        rename = "openIdConnectUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub open_id_connect_url: Option<String>,
}

impl SecurityScheme {
    pub fn new(security_type: SecurityType) -> Self {
        Self {
            security_type,
            description: None,
            name: None,
            api_key_loc: None,
            scheme: None,
            bearer_format: None,
            flows: None,
            open_id_connect_url: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A broker as advertised in the generated contract.
///
/// The port is kept separate from the url; contract synthesis lifts it into
/// a server variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerDescriptor {
    pub url: String,
    pub description: String,
    pub port: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityScheme>,
}

impl BrokerDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: "Kafka broker".to_string(),
            port: "9092".to_string(),
            protocol: "kafka".to_string(),
            security: None,
        }
    }

    /// Descriptor for a local development broker.
    pub fn local() -> Self {
        Self::new("localhost").with_description("Local (dev) Kafka broker")
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_security(mut self, security: SecurityScheme) -> Self {
        self.security = Some(security);
        self
    }
}

/// Contact information for the service owners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub url: String,
    pub email: String,
}

impl Default for ContactInfo {
    fn default() -> Self {
        Self {
            name: "author".to_string(),
            url: "https://www.google.com".to_string(),
            email: "noreply@gmail.com".to_string(),
        }
    }
}

/// Service metadata rendered into the contract's info block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub title: String,
    pub version: String,
    pub description: String,
    pub contact: ContactInfo,
}

impl ServiceInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            title: "Kafka service".to_string(),
            version: "0.0.1".to_string(),
            description: "Description of the service".to_string(),
            contact: ContactInfo::default(),
        }
    }
}

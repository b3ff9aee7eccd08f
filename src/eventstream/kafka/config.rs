//! Kafka consumer configuration.
//!
//! Builds the settings for one consumer handle, including the various
//! authentication mechanisms brokers may require.
//!
//! # Example
//!
//! ```rust
//! use eventrelay::eventstream::kafka::config::KafkaConsumerConfig;
//!
//! let config = KafkaConsumerConfig::new("localhost:9092", "events", "relay")
//!     .with_sasl_scram_sha256("username", "password");
//! assert_eq!(config.group_id, "eventrelay-relay");
//! ```

use std::time::Duration;

use rdkafka::ClientConfig;
use thiserror::Error;

/// Errors that can occur during configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required configuration value.
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    /// Invalid security protocol specified.
    #[error("Invalid security protocol: {0}")]
    InvalidSecurityProtocol(String),

    /// Invalid SASL mechanism specified.
    #[error("Invalid SASL mechanism: {0}")]
    InvalidSaslMechanism(String),
}

/// Security protocol for Kafka connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// No encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL.
    Ssl,
    /// SASL authentication without TLS.
    SaslPlaintext,
    /// SASL authentication with TLS encryption.
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the Kafka configuration string for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }

    /// Parses a protocol name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSecurityProtocol` for unknown names.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(ConfigError::InvalidSecurityProtocol(name.to_string())),
        }
    }

    /// Whether the protocol authenticates with SASL.
    pub fn uses_sasl(&self) -> bool {
        matches!(self, Self::SaslPlaintext | Self::SaslSsl)
    }

    /// Whether the protocol encrypts with TLS.
    pub fn uses_ssl(&self) -> bool {
        matches!(self, Self::Ssl | Self::SaslSsl)
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN mechanism (username/password in clear text).
    Plain,
    /// SCRAM-SHA-256 mechanism.
    #[default]
    ScramSha256,
    /// SCRAM-SHA-512 mechanism.
    ScramSha512,
}

impl SaslMechanism {
    /// Returns the Kafka configuration string for this mechanism.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }

    /// Parses a mechanism name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSaslMechanism` for unknown names.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            _ => Err(ConfigError::InvalidSaslMechanism(name.to_string())),
        }
    }
}

/// SASL authentication configuration.
#[derive(Debug, Clone)]
pub struct SaslConfig {
    /// Authentication mechanism to use.
    pub mechanism: SaslMechanism,
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
}

/// SSL/TLS configuration.
#[derive(Debug, Clone)]
pub struct SslConfig {
    /// Path to CA certificate file.
    pub ca_location: Option<String>,
    /// Path to client certificate file (for mTLS).
    pub certificate_location: Option<String>,
    /// Path to client key file (for mTLS).
    pub key_location: Option<String>,
}

/// Configuration for one Kafka consumer handle.
///
/// # Example
///
/// ```rust
/// use eventrelay::eventstream::kafka::config::KafkaConsumerConfig;
///
/// let config = KafkaConsumerConfig::new("localhost:9092", "events", "relay")
///     .with_group_id("custom-group-id");
///
/// assert_eq!(config.group_id, "custom-group-id");
/// ```
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    /// Kafka broker addresses (comma-separated).
    pub brokers: String,

    /// Topic to consume from.
    pub topic: String,

    /// Consumer group ID (defaults to `eventrelay-{service_name}`).
    pub group_id: String,

    /// Service name used for the client id.
    pub service_name: String,

    /// Security protocol for the connection.
    pub security_protocol: SecurityProtocol,

    /// SASL configuration (required for SASL protocols).
    pub sasl_config: Option<SaslConfig>,

    /// SSL configuration.
    pub ssl_config: Option<SslConfig>,

    /// Auto offset reset policy ("earliest" or "latest").
    pub auto_offset_reset: String,

    /// Enable auto commit of offsets.
    pub enable_auto_commit: bool,

    /// Session timeout duration.
    pub session_timeout: Duration,
}

impl KafkaConsumerConfig {
    /// Creates a new configuration with sensible defaults.
    ///
    /// The consumer group ID defaults to `eventrelay-{service_name}`.
    pub fn new(brokers: &str, topic: &str, service_name: &str) -> Self {
        Self {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            group_id: format!("eventrelay-{}", service_name),
            service_name: service_name.to_string(),
            security_protocol: SecurityProtocol::default(),
            sasl_config: None,
            ssl_config: None,
            auto_offset_reset: "latest".to_string(),
            enable_auto_commit: true,
            session_timeout: Duration::from_secs(30),
        }
    }

    /// Sets a custom consumer group ID.
    pub fn with_group_id(mut self, group_id: &str) -> Self {
        self.group_id = group_id.to_string();
        self
    }

    /// Returns a copy of this configuration pointed at another topic.
    ///
    /// Every other setting, the group id included, is shared.
    pub fn for_topic(&self, topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..self.clone()
        }
    }

    /// Configures SASL/SCRAM-SHA-256 authentication.
    ///
    /// This also sets the security protocol to `SaslSsl`.
    pub fn with_sasl_scram_sha256(self, username: &str, password: &str) -> Self {
        self.with_sasl(SaslMechanism::ScramSha256, username, password)
    }

    /// Configures SASL/SCRAM-SHA-512 authentication.
    ///
    /// This also sets the security protocol to `SaslSsl`.
    pub fn with_sasl_scram_sha512(self, username: &str, password: &str) -> Self {
        self.with_sasl(SaslMechanism::ScramSha512, username, password)
    }

    fn with_sasl(mut self, mechanism: SaslMechanism, username: &str, password: &str) -> Self {
        self.security_protocol = SecurityProtocol::SaslSsl;
        self.sasl_config = Some(SaslConfig {
            mechanism,
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Configures SSL/TLS encryption with a CA certificate.
    pub fn with_ssl(mut self, ca_location: &str) -> Self {
        self.ssl_config = Some(SslConfig {
            ca_location: Some(ca_location.to_string()),
            certificate_location: None,
            key_location: None,
        });
        self
    }

    /// Sets the auto offset reset policy ("earliest" or "latest").
    pub fn with_auto_offset_reset(mut self, policy: &str) -> Self {
        self.auto_offset_reset = policy.to_string();
        self
    }

    /// Disables auto commit of offsets.
    pub fn with_manual_commit(mut self) -> Self {
        self.enable_auto_commit = false;
        self
    }

    /// Returns the client settings as key-value pairs.
    pub fn settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.brokers.clone()),
            ("group.id".to_string(), self.group_id.clone()),
            (
                "auto.offset.reset".to_string(),
                self.auto_offset_reset.clone(),
            ),
            (
                "enable.auto.commit".to_string(),
                self.enable_auto_commit.to_string(),
            ),
            (
                "session.timeout.ms".to_string(),
                self.session_timeout.as_millis().to_string(),
            ),
            (
                "client.id".to_string(),
                format!("eventrelay-{}", self.service_name),
            ),
            (
                "security.protocol".to_string(),
                self.security_protocol.as_str().to_string(),
            ),
        ];

        if let Some(sasl) = &self.sasl_config {
            settings.push((
                "sasl.mechanism".to_string(),
                sasl.mechanism.as_str().to_string(),
            ));
            settings.push(("sasl.username".to_string(), sasl.username.clone()));
            settings.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        if let Some(ssl) = &self.ssl_config {
            if let Some(ca) = &ssl.ca_location {
                settings.push(("ssl.ca.location".to_string(), ca.clone()));
            }
            if let Some(cert) = &ssl.certificate_location {
                settings.push(("ssl.certificate.location".to_string(), cert.clone()));
            }
            if let Some(key) = &ssl.key_location {
                settings.push(("ssl.key.location".to_string(), key.clone()));
            }
        }

        settings
    }

    /// Builds the rdkafka client configuration.
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        for (key, value) in self.settings() {
            client_config.set(key, value);
        }
        client_config
    }
}

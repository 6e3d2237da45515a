//! Mapper configuration.
//!
//! Connection settings are mandatory and validated at construction time.
//! Formats control the canonical string form of date/time/datetime values
//! in SQL statements; include defaults control which relation kinds are
//! loaded when a selection does not say otherwise.

use crate::error::Error;

/// Connection settings for the underlying SQL interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Database server host.
    pub host: String,
    /// Database name.
    pub database: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl ConnectionSettings {
    /// Create connection settings.
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Canonical string formats for temporal values (chrono format strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formats {
    /// Date format.
    pub date: String,
    /// Time format.
    pub time: String,
    /// Datetime format.
    pub datetime: String,
}

impl Default for Formats {
    fn default() -> Self {
        Self {
            date: "%Y-%m-%d".into(),
            time: "%H:%M:%S".into(),
            datetime: "%Y-%m-%d %H:%M:%S".into(),
        }
    }
}

/// Default include behavior for relation fields when a selection does not
/// override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeDefaults {
    /// Load many-to-one references by default.
    pub many_to_one: bool,
    /// Load one-to-many collections by default.
    pub one_to_many: bool,
    /// Load many-to-many collections by default.
    pub many_to_many: bool,
}

impl Default for IncludeDefaults {
    fn default() -> Self {
        Self {
            many_to_one: true,
            one_to_many: true,
            many_to_many: true,
        }
    }
}

/// Mapper configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection settings (mandatory).
    pub connection: ConnectionSettings,
    /// Temporal value formats.
    pub formats: Formats,
    /// Default relation include behavior.
    pub include: IncludeDefaults,
}

impl Config {
    /// Create a configuration, validating the mandatory connection settings.
    pub fn new(connection: ConnectionSettings) -> Result<Self, Error> {
        for (name, value) in [
            ("host", &connection.host),
            ("db", &connection.database),
            ("user", &connection.user),
        ] {
            if value.is_empty() {
                return Err(Error::Configuration(format!(
                    "the configuration has to specify a '{name}' value"
                )));
            }
        }

        Ok(Self {
            connection,
            formats: Formats::default(),
            include: IncludeDefaults::default(),
        })
    }

    /// Override the temporal formats.
    pub fn with_formats(mut self, formats: Formats) -> Self {
        self.formats = formats;
        self
    }

    /// Override the relation include defaults.
    pub fn with_include(mut self, include: IncludeDefaults) -> Self {
        self.include = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config =
            Config::new(ConnectionSettings::new("localhost", "app", "root", "secret")).unwrap();
        assert_eq!(config.formats.date, "%Y-%m-%d");
        assert!(config.include.one_to_many);
    }

    #[test]
    fn test_missing_host_fails() {
        let result = Config::new(ConnectionSettings::new("", "app", "root", "secret"));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_missing_database_fails() {
        let result = Config::new(ConnectionSettings::new("localhost", "", "root", "secret"));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::new(ConnectionSettings::new("localhost", "app", "root", ""))
            .unwrap()
            .with_include(IncludeDefaults {
                many_to_one: true,
                one_to_many: false,
                many_to_many: false,
            });
        assert!(!config.include.one_to_many);
    }
}

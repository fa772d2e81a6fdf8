//! Job configuration: `config.json` plus mail credentials from the
//! environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calendar::{HolidaySource, WeekendRule};
use crate::core::TransitionPolicy;
use crate::errors::ConfigError;
use crate::input::DuplicatePolicy;
use crate::notify::split_addresses;

/// Project name used in the log file name when none is configured.
pub const DEFAULT_PROJECT_NAME: &str = "FIN001_V3";

/// Sheet read from the holiday workbook when none is configured.
pub const DEFAULT_HOLIDAY_SHEET: &str = "Feriados";

/// The `process` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Human-readable process name.
    pub process_name: String,
    /// Responsible developer.
    #[serde(default)]
    pub developer: String,
    /// What the process does.
    #[serde(default)]
    pub description: String,
    /// Process identifier.
    #[serde(default)]
    pub id_process: String,
}

/// The `robot` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotConfig {
    /// Written to `EXECUTIONS.IDROBOT`.
    pub id_robot: String,
    /// Display name used in notifications.
    #[serde(default)]
    pub robot_name: String,
    /// Short robot code.
    #[serde(default)]
    pub robot_code: String,
    /// Robot version.
    #[serde(default)]
    pub version: String,
}

/// The `folders` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldersConfig {
    /// Where status log files are written.
    pub logs: PathBuf,
    /// Network root holding the `<MM>.<YYYY>/<DD>` folders.
    pub network: PathBuf,
    /// Local staging directory.
    pub local_staging: PathBuf,
}

/// An address list written either as a JSON list or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressList {
    /// `["a@x", "b@x"]`
    List(Vec<String>),
    /// `"a@x, b@x"`
    Text(String),
}

impl Default for AddressList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl AddressList {
    /// The non-blank addresses.
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        match self {
            Self::List(list) => list
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Self::Text(text) => split_addresses(text),
        }
    }
}

/// The `email` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    /// Sender address, also the fallback recipient.
    #[serde(default)]
    pub sender: String,
    /// Recipients.
    #[serde(default)]
    pub recipients: AddressList,
    /// Carbon-copy addresses.
    #[serde(default)]
    pub cc: AddressList,
}

/// The `holidays` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidaysConfig {
    /// The workbook, a CSV export, or a directory holding one CSV per sheet.
    pub file: PathBuf,
    /// Sheet name inside the workbook, or the CSV file stem in a directory.
    #[serde(default)]
    pub sheet: Option<String>,
}

impl HolidaysConfig {
    /// Where to read the calendar: `<file>/<sheet>.csv` when `file` is a
    /// directory, the named sheet when `file` is a workbook, otherwise `file`
    /// as CSV.
    #[must_use]
    pub fn source(&self) -> HolidaySource {
        let sheet = self.sheet.as_deref().unwrap_or(DEFAULT_HOLIDAY_SHEET);
        if self.file.is_dir() {
            HolidaySource::Csv(self.file.join(format!("{sheet}.csv")))
        } else {
            HolidaySource::from_path(&self.file, sheet)
        }
    }
}

/// The `store` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

/// The whole of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Process metadata.
    pub process: ProcessConfig,
    /// Robot metadata.
    pub robot: RobotConfig,
    /// Folder layout.
    pub folders: FoldersConfig,
    /// Notification addresses.
    #[serde(default)]
    pub email: EmailConfig,
    /// Holiday calendar.
    pub holidays: HolidaysConfig,
    /// Status store.
    pub store: StoreConfig,
    /// Weekday names treated as weekend. Defaults to Saturday and Sunday.
    #[serde(default)]
    pub weekend: Option<Vec<String>>,
    /// What to do when several files match one marker.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Transition checking for the tracker.
    #[serde(default)]
    pub transition_policy: TransitionPolicy,
    /// Used in the log file name.
    #[serde(default)]
    pub project_name: Option<String>,
}

impl JobConfig {
    /// Reads and validates `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.robot.id_robot.trim().is_empty() {
            return Err(ConfigError::invalid("robot.idRobot", "must not be empty"));
        }
        if self.folders.network.as_os_str().is_empty() {
            return Err(ConfigError::invalid("folders.network", "must not be empty"));
        }
        if self.folders.local_staging.as_os_str().is_empty() {
            return Err(ConfigError::invalid("folders.localStaging", "must not be empty"));
        }
        self.weekend_rule().map(|_| ())
    }

    /// The configured weekend rule.
    pub fn weekend_rule(&self) -> Result<WeekendRule, ConfigError> {
        match &self.weekend {
            Some(names) => WeekendRule::from_names(names.as_slice()),
            None => Ok(WeekendRule::default()),
        }
    }

    /// The project name used for the log file.
    #[must_use]
    pub fn project_name(&self) -> &str {
        self.project_name.as_deref().unwrap_or(DEFAULT_PROJECT_NAME)
    }

    /// Robot display name, falling back to the process name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.robot.robot_name.is_empty() {
            &self.process.process_name
        } else {
            &self.robot.robot_name
        }
    }
}

/// Mail relay credentials read from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MailCredentials {
    /// `RPA_MAIL_RELAY`
    pub relay: Option<String>,
    /// `RPA_MAIL_PORT`
    pub port: Option<u16>,
    /// `RPA_MAIL_USER`
    pub user: Option<String>,
    /// `RPA_MAIL_PASSWORD`
    pub password: Option<String>,
}

impl MailCredentials {
    /// Reads the credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the credentials through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("RPA_MAIL_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::invalid("RPA_MAIL_PORT", format!("'{raw}' is not a port: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            relay: get("RPA_MAIL_RELAY").map(|relay| sanitize_relay(&relay)),
            port,
            user: get("RPA_MAIL_USER"),
            password: get("RPA_MAIL_PASSWORD"),
        })
    }

    /// Returns true when relay, user and password are all present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.relay.is_some() && self.user.is_some() && self.password.is_some()
    }
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("relay", &self.relay)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Strips a URL scheme and stray punctuation from a relay host name.
fn sanitize_relay(raw: &str) -> String {
    let host = raw.trim().to_ascii_lowercase();
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(&host);
    host.trim_matches(|c| matches!(c, '`' | ' ' | ';')).to_string()
}

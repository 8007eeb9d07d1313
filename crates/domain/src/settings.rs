//! Engine-level options bound from `camel.main.*`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use autoconf_core::keys::option_eq;
use autoconf_core::{AutoconfError, AutoconfResult};

use crate::target::{parse_bool, parse_number, OptionTarget, SetOutcome};

/// What to do when a duration limit is hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurationAction {
    /// Stop the whole managed lifecycle
    #[default]
    Shutdown,
    /// Stop only the processing units, the process stays alive
    Stop,
}

impl FromStr for DurationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shutdown" => Ok(Self::Shutdown),
            "stop" => Ok(Self::Stop),
            other => Err(format!("unknown duration action: {other}")),
        }
    }
}

impl fmt::Display for DurationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Duration limits; zero disables a limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationSettings {
    pub max_seconds: u64,
    pub max_idle_seconds: u64,
    pub max_messages: u64,
    pub action: DurationAction,
    /// Reset counters when configuration is reloaded
    pub restart_on_reload: bool,
    /// Exit code reported when any limit was hit
    pub hit_exit_code: Option<i32>,
}

impl Default for DurationSettings {
    fn default() -> Self {
        Self {
            max_seconds: 0,
            max_idle_seconds: 0,
            max_messages: 0,
            action: DurationAction::Shutdown,
            restart_on_reload: true,
            hit_exit_code: None,
        }
    }
}

impl DurationSettings {
    pub fn is_limited(&self) -> bool {
        self.max_seconds > 0 || self.max_idle_seconds > 0 || self.max_messages > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainSettings {
    pub name: Option<String>,
    pub auto_configuration_enabled: bool,
    pub environment_variables_enabled: bool,
    pub system_properties_enabled: bool,
    pub fail_fast: bool,
    pub log_summary: bool,
    pub autowiring_enabled: bool,
    /// `dir/pattern` entries for override files
    pub file_configurations: Vec<String>,
    pub duration: DurationSettings,
}

impl Default for MainSettings {
    fn default() -> Self {
        Self {
            name: None,
            auto_configuration_enabled: true,
            environment_variables_enabled: true,
            system_properties_enabled: true,
            fail_fast: true,
            log_summary: true,
            autowiring_enabled: true,
            file_configurations: Vec::new(),
            duration: DurationSettings::default(),
        }
    }
}

impl MainSettings {
    pub const AUTO_CONFIGURATION_ENABLED: &'static str = "camel.main.autoConfigurationEnabled";
    pub const ENVIRONMENT_VARIABLES_ENABLED: &'static str =
        "camel.main.autoConfigurationEnvironmentVariablesEnabled";
    pub const SYSTEM_PROPERTIES_ENABLED: &'static str =
        "camel.main.autoConfigurationSystemPropertiesEnabled";
    pub const FAIL_FAST: &'static str = "camel.main.autoConfigurationFailFast";
    pub const FILE_CONFIGURATIONS: &'static str = "camel.main.fileConfigurations";
}

impl OptionTarget for MainSettings {
    fn type_name(&self) -> &str {
        "main"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        let d = &mut self.duration;
        match name {
            n if option_eq(n, "name") => self.name = Some(value.to_string()),
            n if option_eq(n, "autoConfigurationEnabled") => {
                self.auto_configuration_enabled = parse_bool(n, value)?
            }
            n if option_eq(n, "autoConfigurationEnvironmentVariablesEnabled") => {
                self.environment_variables_enabled = parse_bool(n, value)?
            }
            n if option_eq(n, "autoConfigurationSystemPropertiesEnabled") => {
                self.system_properties_enabled = parse_bool(n, value)?
            }
            n if option_eq(n, "autoConfigurationFailFast") => self.fail_fast = parse_bool(n, value)?,
            n if option_eq(n, "autoConfigurationLogSummary") => {
                self.log_summary = parse_bool(n, value)?
            }
            n if option_eq(n, "autowiredEnabled") => self.autowiring_enabled = parse_bool(n, value)?,
            n if option_eq(n, "fileConfigurations") => {
                self.file_configurations = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            n if option_eq(n, "durationMaxSeconds") => d.max_seconds = parse_number(n, value)?,
            n if option_eq(n, "durationMaxIdleSeconds") => {
                d.max_idle_seconds = parse_number(n, value)?
            }
            n if option_eq(n, "durationMaxMessages") => d.max_messages = parse_number(n, value)?,
            n if option_eq(n, "durationMaxAction") => {
                d.action = value
                    .parse()
                    .map_err(|e: String| AutoconfError::invalid_value(n, value, e))?
            }
            n if option_eq(n, "durationRestartOnReload") => {
                d.restart_on_reload = parse_bool(n, value)?
            }
            n if option_eq(n, "durationHitExitCode") => {
                d.hit_exit_code = Some(parse_number(n, value)?)
            }
            _ => return Ok(SetOutcome::Unknown),
        }
        Ok(SetOutcome::Applied)
    }
}

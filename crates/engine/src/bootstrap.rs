//! Options that gate the merge itself and therefore must be resolved first.

use tracing::debug;

use autoconf_core::{AutoconfResult, PropertyEntry, ProvenanceLedger, SourceKind};
use autoconf_domain::target::parse_bool;
use autoconf_domain::MainSettings;

use crate::aggregator::PropertySourceAggregator;

/// Bootstrap option values plus where each one came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOptions {
    pub auto_configuration_enabled: bool,
    pub environment_variables_enabled: bool,
    pub system_properties_enabled: bool,
    pub fail_fast: bool,
    pub file_configurations: Vec<String>,
    /// Entries for every bootstrap option found in a source
    pub resolved: ProvenanceLedger,
}

fn properties_only(kind: SourceKind) -> bool {
    !matches!(kind, SourceKind::Sys | SourceKind::Env)
}

impl BootstrapOptions {
    /// Resolve bootstrap options, starting from the programmatic `defaults`.
    ///
    /// The enable flags for environment and system sources are read from the
    /// properties layers only, since they decide whether those sources take
    /// part at all. Fail-fast and file configurations then use the full
    /// precedence of the sources that are enabled.
    pub fn resolve(
        aggregator: &PropertySourceAggregator,
        defaults: &MainSettings,
    ) -> AutoconfResult<Self> {
        let mut resolved = ProvenanceLedger::new();
        let mut lookup = |key: &str, allow: &dyn Fn(SourceKind) -> bool| -> AutoconfResult<Option<PropertyEntry>> {
            let found = aggregator.resolve_key(key, allow)?;
            if let Some(entry) = &found {
                debug!("Bootstrap option {} resolved from {}", entry.key, entry.source);
                resolved.merge_entry(entry.clone());
            }
            Ok(found)
        };

        let flag = |entry: Option<PropertyEntry>, default: bool| -> AutoconfResult<bool> {
            match entry {
                Some(e) => parse_bool(&e.key, &e.value),
                None => Ok(default),
            }
        };

        let auto_configuration_enabled = flag(
            lookup(MainSettings::AUTO_CONFIGURATION_ENABLED, &properties_only)?,
            defaults.auto_configuration_enabled,
        )?;
        let environment_variables_enabled = flag(
            lookup(MainSettings::ENVIRONMENT_VARIABLES_ENABLED, &properties_only)?,
            defaults.environment_variables_enabled,
        )?;
        let system_properties_enabled = flag(
            lookup(MainSettings::SYSTEM_PROPERTIES_ENABLED, &properties_only)?,
            defaults.system_properties_enabled,
        )?;

        let enabled = move |kind: SourceKind| match kind {
            SourceKind::Env => environment_variables_enabled,
            SourceKind::Sys => system_properties_enabled,
            _ => true,
        };

        let fail_fast = flag(lookup(MainSettings::FAIL_FAST, &enabled)?, defaults.fail_fast)?;
        let file_configurations = match lookup(MainSettings::FILE_CONFIGURATIONS, &enabled)? {
            Some(entry) => entry
                .value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.file_configurations.clone(),
        };

        Ok(Self {
            auto_configuration_enabled,
            environment_variables_enabled,
            system_properties_enabled,
            fail_fast,
            file_configurations,
            resolved,
        })
    }

    /// Whether sources of `kind` take part in the merge
    pub fn allows(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Env => self.environment_variables_enabled,
            SourceKind::Sys => self.system_properties_enabled,
            _ => true,
        }
    }

    pub fn apply_to(&self, settings: &mut MainSettings) {
        settings.auto_configuration_enabled = self.auto_configuration_enabled;
        settings.environment_variables_enabled = self.environment_variables_enabled;
        settings.system_properties_enabled = self.system_properties_enabled;
        settings.fail_fast = self.fail_fast;
        settings.file_configurations = self.file_configurations.clone();
    }
}

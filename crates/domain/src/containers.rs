//! Generic beans created directly from configuration.

use std::collections::BTreeMap;

use autoconf_core::keys;
use autoconf_core::{AutoconfError, AutoconfResult};

use crate::target::{OptionTarget, SetOutcome};

/// Map bean created by `camel.beans.name[key]=value`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MapBean {
    pub entries: BTreeMap<String, String>,
}

impl OptionTarget for MapBean {
    fn type_name(&self) -> &str {
        "map"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        self.entries.insert(name.to_string(), value.to_string());
        Ok(SetOutcome::Applied)
    }
}

/// List bean created when every bracket index is numeric
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListBean {
    pub items: Vec<String>,
}

impl ListBean {
    /// Largest index a configuration key may address
    pub const MAX_INDEX: usize = 4096;
}

impl OptionTarget for ListBean {
    fn type_name(&self) -> &str {
        "list"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        let idx: usize = name
            .parse()
            .map_err(|_| AutoconfError::invalid_value(name, value, "list index must be numeric"))?;
        if idx > Self::MAX_INDEX {
            return Err(AutoconfError::invalid_value(
                name,
                value,
                format!("list index exceeds {}", Self::MAX_INDEX),
            ));
        }
        if self.items.len() <= idx {
            self.items.resize(idx + 1, String::new());
        }
        self.items[idx] = value.to_string();
        Ok(SetOutcome::Applied)
    }
}

/// A plain value bound in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueBean {
    pub value: String,
}

impl OptionTarget for ValueBean {
    fn type_name(&self) -> &str {
        "value"
    }

    fn set_option(&mut self, _name: &str, _value: &str) -> AutoconfResult<SetOutcome> {
        Ok(SetOutcome::Unknown)
    }
}

/// Route template parameters grouped by template id.
///
/// Option names have the form `[id].parameter`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteTemplateParameters {
    pub templates: BTreeMap<String, BTreeMap<String, String>>,
}

impl RouteTemplateParameters {
    pub const BEAN_NAME: &'static str = "CamelMainRouteTemplateParametersSource";

    pub fn parameters(&self, id: &str) -> Option<&BTreeMap<String, String>> {
        self.templates.get(id)
    }
}

impl OptionTarget for RouteTemplateParameters {
    fn type_name(&self) -> &str {
        "routeTemplateParameters"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        let Some((_, id, rest)) = keys::split_bracket(name) else {
            return Ok(SetOutcome::Unknown);
        };
        let Some(param) = rest.strip_prefix('.').filter(|p| !p.is_empty()) else {
            return Ok(SetOutcome::Unknown);
        };
        self.templates
            .entry(id.to_string())
            .or_default()
            .insert(param.to_string(), value.to_string());
        Ok(SetOutcome::Applied)
    }
}

/// Context-wide global options
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GlobalOptions {
    pub options: BTreeMap<String, String>,
}

impl OptionTarget for GlobalOptions {
    fn type_name(&self) -> &str {
        "globalOptions"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        self.options.insert(name.to_string(), value.to_string());
        Ok(SetOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_bean_grows() {
        let mut list = ListBean::default();
        list.set_option("2", "c").unwrap();
        list.set_option("0", "a").unwrap();
        assert_eq!(list.items, vec!["a".to_string(), String::new(), "c".to_string()]);
        assert!(list.set_option("x", "d").is_err());
    }

    #[test]
    fn test_list_bean_rejects_huge_index() {
        let mut list = ListBean::default();
        assert!(list.set_option(&usize::MAX.to_string(), "x").is_err());
        assert!(list.set_option("1000000000", "x").is_err());
        assert!(list.items.is_empty());

        list.set_option(&ListBean::MAX_INDEX.to_string(), "last").unwrap();
        assert_eq!(list.items.len(), ListBean::MAX_INDEX + 1);
    }

    #[test]
    fn test_route_template_parameters() {
        let mut params = RouteTemplateParameters::default();
        assert_eq!(
            params.set_option("[t1].greeting", "hello").unwrap(),
            SetOutcome::Applied
        );
        params.set_option("[t1].templateId", "myTemplate").unwrap();
        assert_eq!(params.set_option("t1.greeting", "x").unwrap(), SetOutcome::Unknown);

        let t1 = params.parameters("t1").unwrap();
        assert_eq!(t1.get("greeting").map(String::as_str), Some("hello"));
        assert_eq!(t1.len(), 2);
    }
}

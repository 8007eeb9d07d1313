//! 占位符解析，并记录每一次查找

use parking_lot::Mutex;

use autoconf_core::{AutoconfError, AutoconfResult, DiagnosticsReport, ProvenanceLedger, SourceLabel};

const START: &str = "{{";
const END: &str = "}}";

/// 为每个解析过的占位符记录 `(name, value, default, source)`
#[derive(Default)]
pub struct PlaceholderRecorder {
    lookups: Mutex<ProvenanceLedger>,
}

impl PlaceholderRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, value: &str, default_value: Option<&str>, source: SourceLabel) {
        self.lookups
            .lock()
            .put_with_default(name, value, source, default_value.map(str::to_string));
    }

    pub fn lookups(&self) -> ProvenanceLedger {
        self.lookups.lock().clone()
    }

    pub fn clear(&self) {
        self.lookups.lock().clear();
    }

    /// 取值与默认值不同的查找记录，不包含模板 id
    pub fn summary(&self) -> DiagnosticsReport {
        let lookups = self.lookups.lock();
        let interesting = |key: &str| {
            key != "templateId"
                && lookups
                    .entry(key)
                    .is_some_and(|e| e.default_value.as_deref() != Some(e.value.as_str()))
        };
        DiagnosticsReport::from_ledger("Property-placeholders summary", &lookups, interesting)
    }

    /// 使用 `ledger` 替换 `text` 中的 `{{name}}` 和 `{{name:default}}`
    pub fn resolve(&self, text: &str, ledger: &ProvenanceLedger) -> AutoconfResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(START) {
            out.push_str(&rest[..start]);
            let after = &rest[start + START.len()..];
            let end = after.find(END).ok_or_else(|| {
                AutoconfError::Configuration(format!("占位符未闭合: {text}"))
            })?;
            let token = &after[..end];
            let (name, default_value) = match token.split_once(':') {
                Some((n, d)) => (n.trim(), Some(d)),
                None => (token.trim(), None),
            };

            let value = match (ledger.entry(name), default_value) {
                (Some(entry), _) => {
                    self.record(name, &entry.value, default_value, entry.source.clone());
                    entry.value.clone()
                }
                (None, Some(d)) => {
                    self.record(name, d, Some(d), SourceLabel::Initial);
                    d.to_string()
                }
                (None, None) => {
                    return Err(AutoconfError::Configuration(format!(
                        "配置中找不到占位符 [{name}] 对应的配置项"
                    )));
                }
            };
            out.push_str(&value);
            rest = &after[end + END.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

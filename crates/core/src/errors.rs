use thiserror::Error;

/// 配置引擎与生命周期控制器共用的错误类型
#[derive(Debug, Error)]
pub enum AutoconfError {
    /// 目标上没有可设置的同名属性
    #[error("无法解析的配置项: {key} (目标 {target})")]
    UnresolvableOption { key: String, target: String },

    /// 配置键引用的 bean 或单元不存在且无法创建
    #[error("无法解析{kind}: {name} (来自配置项 {key})")]
    UnresolvableTarget {
        kind: String,
        name: String,
        key: String,
    },

    #[error("创建 bean 失败: {name} - {message}")]
    BeanCreation { name: String, message: String },

    #[error("配置源格式错误: {location} - {message}")]
    MalformedSource { location: String, message: String },

    /// 保留原始值供调用方使用，但不参与展示（可能是敏感信息）
    #[error("无效的配置值: {key} - {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("生命周期错误: {0}")]
    Lifecycle(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl AutoconfError {
    pub fn unresolvable_option(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self::UnresolvableOption {
            key: key.into(),
            target: target.into(),
        }
    }

    pub fn unresolvable_target(
        kind: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::UnresolvableTarget {
            kind: kind.into(),
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSource {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// 宽松模式下只有无法解析的配置项可以降级为警告
    pub fn is_fatal_regardless_of_mode(&self) -> bool {
        !matches!(self, Self::UnresolvableOption { .. })
    }
}

/// 统一的结果类型
pub type AutoconfResult<T> = std::result::Result<T, AutoconfError>;

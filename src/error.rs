use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestflowError {
    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("脚本错误: {0}")]
    ScriptError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL 解析错误: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for RestflowError {
    fn from(err: anyhow::Error) -> Self {
        RestflowError::Other(err.to_string())
    }
}

impl From<crate::parser::ParseError> for RestflowError {
    fn from(err: crate::parser::ParseError) -> Self {
        RestflowError::ParseError(err.to_string())
    }
}

/// Result type for restflow crate
pub type Result<T> = std::result::Result<T, RestflowError>;

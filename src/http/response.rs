use crate::Result;
use crate::http::types::Status;
use crate::variable::response::NamedResponseRecord;
use std::time::Duration;

/// 一次完成的 HTTP 交换的响应
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub status_text: String,
    /// 保持服务端返回的顺序
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration: Duration,
}

impl Response {
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
        duration: Duration,
    ) -> Result<Self> {
        let status = Status::new(status)?;
        Ok(Self {
            status_text: status.reason_phrase().to_string(),
            status,
            headers,
            body,
            duration,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 按名称查找 header（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 生成供变量引用与脚本使用的快照
    pub fn to_record(&self) -> NamedResponseRecord {
        NamedResponseRecord::new(
            self.status.code(),
            self.status_text.clone(),
            self.headers.clone(),
            &self.body,
        )
    }
}

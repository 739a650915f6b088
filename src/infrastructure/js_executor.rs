//! JS 执行器 - 基础设施层
//!
//! 持有 page 资源，暴露"执行 JS"与"按位置取元素"的能力

use chromiumoxide::element::Element;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::DriverError;

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 eval() 能力
/// - 不认识 Record / FormContract
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 交出 page（用于关闭页面）
    pub fn into_page(self) -> Page {
        self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, DriverError> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result
            .into_value()
            .map_err(|e| DriverError::Cdp(format!("无法解析脚本返回值: {}", e)))?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, DriverError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value)
            .map_err(|e| DriverError::Cdp(format!("脚本返回值类型不符: {}", e)))
    }

    /// 按位置获取匹配选择器的元素
    pub async fn element(&self, selector: &str, index: usize) -> Result<Element, DriverError> {
        let mut elements = self.page.find_elements(selector).await?;
        if index >= elements.len() {
            return Err(DriverError::NoSuchElement {
                selector: selector.to_string(),
                index,
            });
        }
        Ok(elements.swap_remove(index))
    }
}

/// 将字符串编码为 JS 字面量
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

//! 表单契约
//!
//! 描述远端表单的全部易变部分：地址、各角色的定位策略表、填写计划以及成功判定依据。
//! 定位策略是数据而不是代码，新的页面变体只需追加候选选择器。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, FileError};

/// 一个角色的定位策略：按顺序尝试的候选选择器以及最少元素数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    /// 角色名称，例如 "submit"、"text_input"
    pub role: String,
    /// 候选 CSS 选择器，优先级从高到低
    pub candidates: Vec<String>,
    /// 至少需要匹配到的元素数量
    #[serde(default = "default_min_count")]
    pub min_count: usize,
}

fn default_min_count() -> usize {
    1
}

impl LocatorStrategy {
    pub fn new(role: impl Into<String>, min_count: usize, candidates: &[&str]) -> Self {
        Self {
            role: role.into(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            min_count,
        }
    }
}

/// 字段的输入动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    /// 先清空再逐字输入记录中的值
    Type,
    /// 点击 `index` 处的元素
    Click,
    /// 按记录值在选项中的位置点击 `index + 位置` 处的元素；值为空时跳过
    Choose { options: Vec<String> },
}

/// 填写计划中的一步
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStep {
    /// 记录中的字段名（也用于错误定位）
    pub field: String,
    /// 使用哪个角色解析出的元素
    pub role: String,
    /// 元素在该角色结果集中的位置
    pub index: usize,
    pub action: InputAction,
    /// 覆盖默认的字段间等待时间
    #[serde(default)]
    pub settle_ms: Option<u64>,
}

impl FieldStep {
    pub fn new(field: &str, role: &str, index: usize, action: InputAction) -> Self {
        Self {
            field: field.to_string(),
            role: role.to_string(),
            index,
            action,
            settle_ms: None,
        }
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = Some(ms);
        self
    }
}

/// 远端表单契约
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormContract {
    /// 表单地址
    pub url: String,
    /// 表单回答页 URL 模式（正则）；提交后 URL 不再匹配即视为已离开表单
    pub response_page_pattern: String,
    /// 页面文本中的成功短语
    pub success_phrases: Vec<String>,
    /// 明确的成功提示元素
    pub success_markers: Vec<String>,
    /// 提交按钮使用的角色
    pub submit_role: String,
    /// 记录标识对应的字段名
    pub key_field: String,
    /// 次要代码字段名
    #[serde(default)]
    pub secondary_code_field: Option<String>,
    /// 自由文本字段名
    #[serde(default)]
    pub filler_field: Option<String>,
    /// 角色定位策略表
    pub roles: Vec<LocatorStrategy>,
    /// 按声明顺序执行的填写计划
    pub plan: Vec<FieldStep>,
}

impl Default for FormContract {
    fn default() -> Self {
        Self {
            url: "https://forms.office.com/Pages/ResponsePage.aspx?id=_hCKfMAMzkOyEhANlhpOOFsKvQyKu1BNjf_6-FtY2WJUMU5ZRVZHU0FVSklCSUVaREgxTUI3ME5CNC4u".to_string(),
            response_page_pattern: "ResponsePage".to_string(),
            success_phrases: vec![
                "Thank you".to_string(),
                "submitted".to_string(),
            ],
            success_markers: vec![r#"div[role="alert"]"#.to_string()],
            submit_role: "submit".to_string(),
            key_field: "email".to_string(),
            secondary_code_field: Some("teacher_code".to_string()),
            filler_field: Some("feedback".to_string()),
            roles: vec![
                LocatorStrategy::new(
                    "text_input",
                    3,
                    &[
                        "input.-ar-67",
                        r#"input[data-automation-id="textInput"]"#,
                        r#"input[type="text"]"#,
                    ],
                ),
                LocatorStrategy::new(
                    "choice",
                    14,
                    &[r#"input[type="radio"]"#, r#"[role="radio"]"#],
                ),
                LocatorStrategy::new(
                    "submit",
                    1,
                    &[
                        r#"button[type="submit"]"#,
                        "button.office-form-bottom-button",
                        "button.css-221",
                        r#"button[data-automation-id="submitButton"]"#,
                    ],
                ),
            ],
            plan: vec![
                FieldStep::new("email", "text_input", 0, InputAction::Type),
                FieldStep::new("teacher_code", "text_input", 1, InputAction::Type),
                FieldStep::new("q1", "choice", 4, InputAction::Click).settle_ms(500),
                FieldStep::new("q2", "choice", 10, InputAction::Click).settle_ms(500),
                FieldStep::new("q3", "choice", 12, InputAction::Click).settle_ms(500),
                FieldStep::new("feedback", "text_input", 2, InputAction::Type),
            ],
        }
    }
}

impl FormContract {
    /// 从 TOML 文件加载契约
    pub fn from_toml_file(path: &Path) -> Result<Self, FileError> {
        let display = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| FileError::read_failed(&display, e))?;
        toml::from_str(&content).map_err(|e| FileError::parse_failed(&display, e))
    }

    /// 查找角色定位策略
    pub fn role(&self, name: &str) -> Option<&LocatorStrategy> {
        self.roles.iter().find(|r| r.role == name)
    }

    /// 编译回答页 URL 模式
    pub fn response_page_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.response_page_pattern).map_err(|e| {
            ConfigError::InvalidContract(format!(
                "回答页模式 '{}' 无效: {}",
                self.response_page_pattern, e
            ))
        })
    }

    /// 检查契约自洽：计划引用的角色都有策略，提交角色存在，选择器非空
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::InvalidContract("表单地址为空".to_string()));
        }
        // 表单本身必须位于回答页上，否则"离开回答页"无法作为成功信号
        if !self.response_page_regex()?.is_match(&self.url) {
            return Err(ConfigError::InvalidContract(format!(
                "表单地址不匹配回答页模式 '{}'",
                self.response_page_pattern
            )));
        }

        for strategy in &self.roles {
            if strategy.candidates.is_empty() {
                return Err(ConfigError::InvalidContract(format!(
                    "角色 {} 没有候选选择器",
                    strategy.role
                )));
            }
        }

        if self.role(&self.submit_role).is_none() {
            return Err(ConfigError::InvalidContract(format!(
                "提交角色 {} 没有定位策略",
                self.submit_role
            )));
        }

        for step in &self.plan {
            if self.role(&step.role).is_none() {
                return Err(ConfigError::InvalidContract(format!(
                    "字段 {} 引用了未定义的角色 {}",
                    step.field, step.role
                )));
            }
            if let InputAction::Choose { options } = &step.action {
                if options.is_empty() {
                    return Err(ConfigError::InvalidContract(format!(
                        "字段 {} 的选项为空",
                        step.field
                    )));
                }
            }
        }

        Ok(())
    }

    /// 计划中实际用到的角色（加上提交角色），按策略表顺序
    pub fn required_roles(&self) -> Vec<&LocatorStrategy> {
        self.roles
            .iter()
            .filter(|r| r.role == self.submit_role || self.plan.iter().any(|s| s.role == r.role))
            .collect()
    }
}

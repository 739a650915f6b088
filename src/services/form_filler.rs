//! 表单填写服务 - 业务能力层
//!
//! 按填写计划的声明顺序逐个字段操作，而不是按记录字段顺序

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::FormPage;
use crate::config::Timings;
use crate::error::{StageError, StageResult};
use crate::models::{FieldStep, InputAction, Record};
use crate::services::field_resolver::{ResolvedRole, ResolvedRoles};
use crate::utils::truncate_text;

/// 表单填写服务
pub struct FormFiller {
    field_settle: Duration,
    key_delay: Duration,
}

impl FormFiller {
    pub fn new(timings: &Timings) -> Self {
        Self {
            field_settle: timings.field_settle,
            key_delay: timings.key_delay,
        }
    }

    /// 填写整张表单，返回实际执行的步骤数
    ///
    /// 任何一步失败立即中止，不在同一页面上做局部恢复
    pub async fn fill<P: FormPage>(
        &self,
        page: &P,
        record: &Record,
        plan: &[FieldStep],
        resolved: &ResolvedRoles,
    ) -> StageResult<usize> {
        let mut performed = 0;

        for step in plan {
            let role = resolved.get(&step.role).ok_or_else(|| StageError::FillFailed {
                field: step.field.clone(),
                reason: format!("角色 {} 未解析", step.role),
            })?;
            if !role.belongs_to(page) {
                return Err(StageError::FillFailed {
                    field: step.field.clone(),
                    reason: "元素引用来自已被替换的页面".to_string(),
                });
            }

            if self.apply(page, record, step, role).await? {
                performed += 1;
                let settle = step
                    .settle_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.field_settle);
                sleep(settle).await;
            }
        }

        Ok(performed)
    }

    /// 执行单个步骤；返回是否实际操作了页面
    async fn apply<P: FormPage>(
        &self,
        page: &P,
        record: &Record,
        step: &FieldStep,
        role: &ResolvedRole,
    ) -> StageResult<bool> {
        match &step.action {
            InputAction::Type => {
                let value = record.get(&step.field).unwrap_or_default();
                let index = checked_index(step, role, step.index)?;
                debug!("填写 {}: {}", step.field, truncate_text(value, 40));
                page.clear_and_type(&role.selector, index, value, self.key_delay)
                    .await
                    .map_err(|e| StageError::from_fill(&step.field, e))?;
            }
            InputAction::Click => {
                let index = checked_index(step, role, step.index)?;
                debug!("点击 {} ({}[{}])", step.field, role.selector, index);
                page.click(&role.selector, index)
                    .await
                    .map_err(|e| StageError::from_fill(&step.field, e))?;
            }
            InputAction::Choose { options } => {
                let Some(value) = record.get(&step.field).filter(|v| !v.trim().is_empty()) else {
                    debug!("字段 {} 为空，跳过", step.field);
                    return Ok(false);
                };
                let position = options.iter().position(|o| o == value).ok_or_else(|| {
                    StageError::FillFailed {
                        field: step.field.clone(),
                        reason: format!("值 '{}' 不在可选项中", value),
                    }
                })?;
                let index = checked_index(step, role, step.index + position)?;
                debug!("选择 {}: {} ({}[{}])", step.field, value, role.selector, index);
                page.click(&role.selector, index)
                    .await
                    .map_err(|e| StageError::from_fill(&step.field, e))?;
            }
        }
        Ok(true)
    }
}

fn checked_index(step: &FieldStep, role: &ResolvedRole, index: usize) -> StageResult<usize> {
    if index >= role.count {
        return Err(StageError::FillFailed {
            field: step.field.clone(),
            reason: format!(
                "位置 {} 超出角色 {} 的元素数量 {}",
                index, role.role, role.count
            ),
        });
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePage, FakeWorld, CHOICE_SELECTOR, FORM_URL, TEXT_SELECTOR};
    use crate::browser::{BrowserHandle, Launcher};
    use crate::error::FailureClass;
    use crate::models::FormContract;
    use crate::services::field_resolver::FieldResolver;

    async fn prepared(world: &FakeWorld) -> (FakePage, ResolvedRoles) {
        let browser = world.launcher().launch().await.unwrap();
        let page = browser.new_page().await.unwrap();
        page.goto(FORM_URL).await.unwrap();
        let contract = FormContract::default();
        let resolved = FieldResolver::new(&Timings::fast())
            .resolve_all(&page, &contract.required_roles())
            .await
            .unwrap();
        (page, resolved)
    }

    fn record() -> Record {
        Record::new("a@example.com")
            .with_field("feedback", "Great course")
            .with_field("teacher_code", "AB-1")
            .with_field("email", "a@example.com")
    }

    #[tokio::test]
    async fn test_fill_follows_plan_order() {
        let world = FakeWorld::standard_form();
        let (page, resolved) = prepared(&world).await;
        let contract = FormContract::default();

        let performed = FormFiller::new(&Timings::fast())
            .fill(&page, &record(), &contract.plan, &resolved)
            .await
            .unwrap();

        assert_eq!(performed, 6);
        assert_eq!(
            world.typed_values(),
            vec!["a@example.com", "AB-1", "Great course"]
        );
        let clicks = world.state().clicks.clone();
        let radios: Vec<usize> = clicks
            .iter()
            .filter(|(s, _)| s == CHOICE_SELECTOR)
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(radios, vec![4, 10, 12]);
    }

    #[tokio::test]
    async fn test_typing_clears_previous_content() {
        let world = FakeWorld::standard_form();
        let (page, resolved) = prepared(&world).await;
        world.state().values.insert(
            (TEXT_SELECTOR.to_string(), 0),
            "leftover@example.comXX".to_string(),
        );
        let plan = vec![FieldStep::new("email", "text_input", 0, InputAction::Type)];
        let filler = FormFiller::new(&Timings::fast());

        filler.fill(&page, &record(), &plan, &resolved).await.unwrap();
        filler.fill(&page, &record(), &plan, &resolved).await.unwrap();

        assert_eq!(
            world.state().values.get(&(TEXT_SELECTOR.to_string(), 0)),
            Some(&"a@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_typed_blank() {
        let world = FakeWorld::standard_form();
        let (page, resolved) = prepared(&world).await;
        let plan = vec![FieldStep::new("feedback", "text_input", 2, InputAction::Type)];

        FormFiller::new(&Timings::fast())
            .fill(&page, &Record::new("k"), &plan, &resolved)
            .await
            .unwrap();
        assert_eq!(world.typed_values(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_detached_element_reports_field() {
        let world = FakeWorld::standard_form();
        let (page, resolved) = prepared(&world).await;
        world.state().fail_click = Some((CHOICE_SELECTOR.to_string(), 10));
        let contract = FormContract::default();

        let err = FormFiller::new(&Timings::fast())
            .fill(&page, &record(), &contract.plan, &resolved)
            .await
            .unwrap_err();

        assert_eq!(err.class(), FailureClass::FillFailed);
        assert!(matches!(err, StageError::FillFailed { ref field, .. } if field == "q2"));
        // 失败之后的字段不再填写
        assert!(!world.typed_values().contains(&"Great course".to_string()));
    }

    #[tokio::test]
    async fn test_stale_resolution_is_rejected() {
        let world = FakeWorld::standard_form();
        let (_old_page, resolved) = prepared(&world).await;
        let browser = world.launcher().launch().await.unwrap();
        let fresh = browser.new_page().await.unwrap();

        let err = FormFiller::new(&Timings::fast())
            .fill(&fresh, &record(), &FormContract::default().plan, &resolved)
            .await
            .unwrap_err();
        assert_eq!(err.class(), FailureClass::FillFailed);
        assert!(world.state().typed.is_empty());
    }

    #[tokio::test]
    async fn test_choose_maps_value_to_offset() {
        let world = FakeWorld::standard_form();
        let (page, resolved) = prepared(&world).await;
        let plan = vec![FieldStep::new(
            "rating",
            "choice",
            5,
            InputAction::Choose {
                options: vec!["low".into(), "mid".into(), "high".into()],
            },
        )];
        let filler = FormFiller::new(&Timings::fast());

        let chosen = Record::new("k").with_field("rating", "high");
        assert_eq!(filler.fill(&page, &chosen, &plan, &resolved).await.unwrap(), 1);
        assert_eq!(world.state().clicks, vec![(CHOICE_SELECTOR.to_string(), 7)]);

        // 空值跳过
        assert_eq!(filler.fill(&page, &Record::new("k"), &plan, &resolved).await.unwrap(), 0);

        let unknown = Record::new("k").with_field("rating", "extreme");
        let err = filler.fill(&page, &unknown, &plan, &resolved).await.unwrap_err();
        assert_eq!(err.class(), FailureClass::FillFailed);
    }
}

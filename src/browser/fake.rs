//! 测试用浏览器替身
//!
//! 所有页面共享一份可编排的 `WorldState`，测试通过它预设元素数量、导航失败、
//! 提交效果与断线时机，并在结束后检查点击与输入记录。

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{BrowserHandle, FormPage, Launcher};
use crate::error::DriverError;

pub const FORM_URL: &str = "https://forms.example.test/Pages/ResponsePage.aspx?id=abc";
pub const TEXT_SELECTOR: &str = "input.-ar-67";
pub const CHOICE_SELECTOR: &str = r#"input[type="radio"]"#;
pub const SUBMIT_SELECTOR: &str = r#"button[type="submit"]"#;
pub const MARKER_SELECTOR: &str = r#"div[role="alert"]"#;

/// 点击提交按钮后页面的反应
#[derive(Debug, Clone)]
pub enum SubmitEffect {
    /// 没有任何反应
    Nothing,
    /// 跳转到新地址
    Navigate(String),
    /// 跳转到新地址，但执行上下文重建期间读不到地址，直到再次查询提交按钮
    NavigateUnseen(String),
    /// 出现提示元素
    ShowMarker(String),
    /// 页面文本变化（地址不变）
    ShowText(String),
    /// 浏览器断开
    Disconnect,
}

#[derive(Debug, Default)]
pub struct WorldState {
    pub connected: bool,
    pub launches: u32,
    /// 剩余的启动失败次数
    pub launch_failures: u32,
    /// 首次启动之后的所有启动都失败
    pub fail_relaunch: bool,
    pub next_page: u32,
    pub open_pages: Vec<String>,
    pub closed_pages: Vec<String>,

    /// 表单加载后的元素数量
    pub form_counts: HashMap<String, usize>,
    pub counts: HashMap<String, usize>,
    pub url: String,
    pub url_hidden: bool,
    pub body: String,

    pub goto_calls: u32,
    /// 剩余的导航失败次数（超时）
    pub goto_failures: u32,
    pub goto_delay: Duration,
    /// 第 N 次导航时断线
    pub disconnect_on_goto: Option<u32>,
    /// 每次导航附带弹出的页面数量
    pub stray_pages_per_goto: u32,

    pub values: HashMap<(String, usize), String>,
    pub typed: Vec<(String, usize, String)>,
    pub clicks: Vec<(String, usize)>,
    pub fail_click: Option<(String, usize)>,

    pub submit_effects: VecDeque<SubmitEffect>,
    pub submit_enabled: bool,
    pub snapshot_fails: bool,
    pub snapshots: u32,
}

/// 共享的替身世界
#[derive(Debug, Clone, Default)]
pub struct FakeWorld {
    state: Arc<Mutex<WorldState>>,
}

impl FakeWorld {
    /// 与内置表单契约匹配的标准表单
    pub fn standard_form() -> Self {
        let world = Self::default();
        {
            let mut s = world.state();
            s.form_counts.insert(TEXT_SELECTOR.to_string(), 3);
            s.form_counts.insert(CHOICE_SELECTOR.to_string(), 14);
            s.form_counts.insert(SUBMIT_SELECTOR.to_string(), 1);
            s.submit_enabled = true;
        }
        world
    }

    pub fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap()
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            world: self.clone(),
        }
    }

    /// 预设每次提交的效果
    pub fn on_submit(&self, effects: impl IntoIterator<Item = SubmitEffect>) {
        self.state().submit_effects.extend(effects);
    }

    pub fn disconnect(&self) {
        self.state().connected = false;
    }

    /// 输入过的值（按顺序）
    pub fn typed_values(&self) -> Vec<String> {
        self.state().typed.iter().map(|(_, _, v)| v.clone()).collect()
    }

    pub fn submit_clicks(&self) -> usize {
        self.state()
            .clicks
            .iter()
            .filter(|(s, _)| s == SUBMIT_SELECTOR)
            .count()
    }
}

#[derive(Debug)]
pub struct FakeLauncher {
    world: FakeWorld,
}

#[async_trait]
impl Launcher for FakeLauncher {
    type Browser = FakeBrowser;

    async fn launch(&self) -> Result<FakeBrowser, DriverError> {
        let mut s = self.world.state();
        if s.launch_failures > 0 {
            s.launch_failures -= 1;
            return Err(DriverError::Launch("fake launch failure".to_string()));
        }
        if s.fail_relaunch && s.launches > 0 {
            return Err(DriverError::Launch("fake relaunch failure".to_string()));
        }
        s.launches += 1;
        s.connected = true;
        s.open_pages.clear();
        Ok(FakeBrowser {
            world: self.world.clone(),
            generation: s.launches,
        })
    }
}

#[derive(Debug)]
pub struct FakeBrowser {
    world: FakeWorld,
    generation: u32,
}

impl FakeBrowser {
    fn alive(&self, s: &WorldState) -> bool {
        s.connected && s.launches == self.generation
    }
}

fn open_page(world: &FakeWorld, s: &mut WorldState) -> FakePage {
    s.next_page += 1;
    let id = format!("page-{}", s.next_page);
    s.open_pages.push(id.clone());
    FakePage {
        id,
        world: world.clone(),
    }
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    type Page = FakePage;

    fn is_connected(&self) -> bool {
        self.alive(&self.world.state())
    }

    async fn new_page(&self) -> Result<FakePage, DriverError> {
        let mut s = self.world.state();
        if !self.alive(&s) {
            return Err(DriverError::Disconnected);
        }
        Ok(open_page(&self.world, &mut s))
    }

    async fn pages(&self) -> Result<Vec<FakePage>, DriverError> {
        let s = self.world.state();
        if !self.alive(&s) {
            return Err(DriverError::Disconnected);
        }
        Ok(s.open_pages
            .iter()
            .map(|id| FakePage {
                id: id.clone(),
                world: self.world.clone(),
            })
            .collect())
    }

    async fn close_page(&self, page: FakePage) -> Result<(), DriverError> {
        let mut s = self.world.state();
        if !self.alive(&s) {
            return Err(DriverError::Disconnected);
        }
        s.open_pages.retain(|id| *id != page.id);
        s.closed_pages.push(page.id);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let mut s = self.world.state();
        if s.launches == self.generation {
            s.connected = false;
            s.open_pages.clear();
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub id: String,
    world: FakeWorld,
}

impl FakePage {
    fn live_state(&self) -> Result<MutexGuard<'_, WorldState>, DriverError> {
        let s = self.world.state();
        if !s.connected {
            return Err(DriverError::Disconnected);
        }
        if !s.open_pages.contains(&self.id) {
            return Err(DriverError::PageClosed(self.id.clone()));
        }
        Ok(s)
    }

    fn check_element(s: &WorldState, selector: &str, index: usize) -> Result<(), DriverError> {
        if index >= s.counts.get(selector).copied().unwrap_or(0) {
            return Err(DriverError::NoSuchElement {
                selector: selector.to_string(),
                index,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FormPage for FakePage {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let delay = {
            let mut s = self.live_state()?;
            s.goto_calls += 1;
            if s.disconnect_on_goto == Some(s.goto_calls) {
                s.connected = false;
                return Err(DriverError::Disconnected);
            }
            if s.goto_failures > 0 {
                s.goto_failures -= 1;
                return Err(DriverError::Timeout("fake navigation timeout".to_string()));
            }
            s.goto_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut s = self.live_state()?;
        s.url = url.to_string();
        s.body = "Form".to_string();
        s.counts = s.form_counts.clone();
        s.values.clear();
        for _ in 0..s.stray_pages_per_goto {
            open_page(&self.world, &mut s);
        }
        Ok(())
    }

    async fn url(&self) -> Result<String, DriverError> {
        let s = self.live_state()?;
        if s.url_hidden {
            return Err(DriverError::Cdp("execution context was destroyed".to_string()));
        }
        Ok(s.url.clone())
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        Ok(self.live_state()?.counts.get(selector).copied().unwrap_or(0))
    }

    async fn clear_and_type(
        &self,
        selector: &str,
        index: usize,
        text: &str,
        _key_delay: Duration,
    ) -> Result<(), DriverError> {
        let mut s = self.live_state()?;
        Self::check_element(&s, selector, index)?;
        let slot = s
            .values
            .entry((selector.to_string(), index))
            .or_default();
        slot.clear();
        slot.push_str(text);
        s.typed.push((selector.to_string(), index, text.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str, index: usize) -> Result<(), DriverError> {
        let mut s = self.live_state()?;
        Self::check_element(&s, selector, index)?;
        if s.fail_click.as_ref() == Some(&(selector.to_string(), index)) {
            return Err(DriverError::Cdp("node is detached from document".to_string()));
        }
        s.clicks.push((selector.to_string(), index));
        if selector == SUBMIT_SELECTOR {
            match s.submit_effects.pop_front().unwrap_or(SubmitEffect::Nothing) {
                SubmitEffect::Nothing => {}
                SubmitEffect::Navigate(url) => {
                    s.url = url;
                    s.counts.remove(SUBMIT_SELECTOR);
                }
                SubmitEffect::NavigateUnseen(url) => {
                    s.url = url;
                    s.url_hidden = true;
                    s.counts.remove(SUBMIT_SELECTOR);
                }
                SubmitEffect::ShowMarker(marker) => {
                    s.counts.insert(marker, 1);
                }
                SubmitEffect::ShowText(text) => s.body = text,
                SubmitEffect::Disconnect => s.connected = false,
            }
        }
        Ok(())
    }

    async fn is_enabled(&self, selector: &str, index: usize) -> Result<bool, DriverError> {
        let mut s = self.live_state()?;
        s.url_hidden = false;
        let present = index < s.counts.get(selector).copied().unwrap_or(0);
        Ok(present && (selector != SUBMIT_SELECTOR || s.submit_enabled))
    }

    async fn body_text(&self) -> Result<String, DriverError> {
        Ok(self.live_state()?.body.clone())
    }

    async fn snapshot(&self) -> Result<Vec<u8>, DriverError> {
        let mut s = self.live_state()?;
        if s.snapshot_fails {
            return Err(DriverError::Cdp("screenshot failed".to_string()));
        }
        s.snapshots += 1;
        Ok(b"\x89PNG fake".to_vec())
    }
}

use std::str::FromStr;
use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 表单契约 TOML 文件（不设置则使用内置契约）
    pub form_contract_file: Option<String>,
    /// 记录来源文件（.json / .toml）
    pub records_file: String,
    /// 只处理从该记录开始的区间
    pub start_key: Option<String>,
    /// 只处理到该记录为止的区间
    pub end_key: Option<String>,
    /// 诊断文件存放目录
    pub diagnostics_dir: String,
    /// 处理结果报告文件
    pub report_file: String,
    /// 是否以无头模式启动浏览器
    pub headless: bool,
    /// 浏览器可执行文件路径
    pub chrome_executable: Option<String>,
    /// 浏览器调试端口；设置后连接已有浏览器而不是启动新浏览器
    pub browser_debug_port: Option<u16>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 填写内容 ---
    /// 每条记录都要填写的次要代码
    pub secondary_code: String,
    /// 自由文本字段的备选内容，按记录序号轮流使用
    pub filler_texts: Vec<String>,
    // --- 重试预算 ---
    /// 每条记录的最大尝试次数
    pub max_record_attempts: u32,
    /// 浏览器启动的最大尝试次数
    pub launch_attempts: u32,
    /// 各阶段的超时与等待时间
    pub timings: Timings,
}

/// 超时与等待时间
#[derive(Clone, Debug)]
pub struct Timings {
    /// 单次导航超时
    pub navigation_timeout: Duration,
    /// 单次记录尝试中的导航次数
    pub navigation_attempts: u32,
    /// 导航重试间隔
    pub navigation_retry_delay: Duration,
    /// 导航完成后等待页面变为可交互
    pub post_load_settle: Duration,
    /// 元素解析超时
    pub resolve_timeout: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 字段之间的等待时间
    pub field_settle: Duration,
    /// 逐字输入的按键间隔
    pub key_delay: Duration,
    /// 提交后等待成功信号的期限
    pub submission_timeout: Duration,
    /// 再次点击提交前的等待
    pub resubmit_delay: Duration,
    /// 提交成功后、回收页面前的等待
    pub post_submit_settle: Duration,
    /// 新页面打开后的等待
    pub page_settle: Duration,
    /// 记录级重试前的等待
    pub retry_delay: Duration,
    /// 浏览器重新启动前的等待
    pub launch_retry_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            navigation_attempts: 3,
            navigation_retry_delay: Duration::from_secs(5),
            post_load_settle: Duration::from_secs(5),
            resolve_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            field_settle: Duration::from_millis(1000),
            key_delay: Duration::from_millis(50),
            submission_timeout: Duration::from_secs(40),
            resubmit_delay: Duration::from_secs(5),
            post_submit_settle: Duration::from_secs(8),
            page_settle: Duration::from_secs(3),
            retry_delay: Duration::from_secs(5),
            launch_retry_delay: Duration::from_secs(5),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            form_contract_file: None,
            records_file: "new_emails.json".to_string(),
            start_key: None,
            end_key: None,
            diagnostics_dir: "diagnostics".to_string(),
            report_file: "results.json".to_string(),
            headless: false,
            chrome_executable: None,
            browser_debug_port: None,
            verbose_logging: false,
            secondary_code: String::new(),
            filler_texts: Vec::new(),
            max_record_attempts: 3,
            launch_attempts: 3,
            timings: Timings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            form_contract_file: env_opt("FORM_CONTRACT_FILE").or(default.form_contract_file),
            records_file: std::env::var("RECORDS_FILE").unwrap_or(default.records_file),
            start_key: env_opt("START_KEY").or(default.start_key),
            end_key: env_opt("END_KEY").or(default.end_key),
            diagnostics_dir: std::env::var("DIAGNOSTICS_DIR").unwrap_or(default.diagnostics_dir),
            report_file: std::env::var("REPORT_FILE").unwrap_or(default.report_file),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            chrome_executable: env_opt("CHROME_BIN").or(default.chrome_executable),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(default.browser_debug_port),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            secondary_code: std::env::var("SECONDARY_CODE").unwrap_or(default.secondary_code),
            filler_texts: env_opt("FILLER_TEXTS")
                .map(|v| split_pool(&v))
                .unwrap_or(default.filler_texts),
            max_record_attempts: env_parse("MAX_RECORD_ATTEMPTS")
                .filter(|v| *v > 0)
                .unwrap_or(default.max_record_attempts),
            launch_attempts: env_parse("LAUNCH_ATTEMPTS")
                .filter(|v| *v > 0)
                .unwrap_or(default.launch_attempts),
            timings: Timings::from_env(default.timings),
        }
    }
}

impl Timings {
    fn from_env(default: Self) -> Self {
        Self {
            navigation_timeout: env_millis("NAVIGATION_TIMEOUT_MS")
                .unwrap_or(default.navigation_timeout),
            navigation_attempts: env_parse("NAVIGATION_ATTEMPTS")
                .filter(|v| *v > 0)
                .unwrap_or(default.navigation_attempts),
            navigation_retry_delay: env_millis("NAVIGATION_RETRY_DELAY_MS")
                .unwrap_or(default.navigation_retry_delay),
            post_load_settle: env_millis("POST_LOAD_SETTLE_MS").unwrap_or(default.post_load_settle),
            resolve_timeout: env_millis("RESOLVE_TIMEOUT_MS").unwrap_or(default.resolve_timeout),
            poll_interval: env_millis("POLL_INTERVAL_MS").unwrap_or(default.poll_interval),
            field_settle: env_millis("FIELD_SETTLE_MS").unwrap_or(default.field_settle),
            key_delay: env_millis("KEY_DELAY_MS").unwrap_or(default.key_delay),
            submission_timeout: env_millis("SUBMISSION_TIMEOUT_MS")
                .unwrap_or(default.submission_timeout),
            resubmit_delay: env_millis("RESUBMIT_DELAY_MS").unwrap_or(default.resubmit_delay),
            post_submit_settle: env_millis("POST_SUBMIT_SETTLE_MS")
                .unwrap_or(default.post_submit_settle),
            page_settle: env_millis("PAGE_SETTLE_MS").unwrap_or(default.page_settle),
            retry_delay: env_millis("RETRY_DELAY_MS").unwrap_or(default.retry_delay),
            launch_retry_delay: env_millis("LAUNCH_RETRY_DELAY_MS")
                .unwrap_or(default.launch_retry_delay),
        }
    }

    /// 测试用：几乎不等待
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(200),
            navigation_attempts: 3,
            navigation_retry_delay: Duration::ZERO,
            post_load_settle: Duration::ZERO,
            resolve_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
            field_settle: Duration::ZERO,
            key_delay: Duration::ZERO,
            submission_timeout: Duration::from_millis(100),
            resubmit_delay: Duration::ZERO,
            post_submit_settle: Duration::ZERO,
            page_settle: Duration::ZERO,
            retry_delay: Duration::ZERO,
            launch_retry_delay: Duration::ZERO,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}

/// 以 `|` 分隔的备选文本
fn split_pool(value: &str) -> Vec<String> {
    value.split('|').map(|s| s.trim().to_string()).collect()
}

use form_batch_submit::browser::{BrowserHandle, ChromeLauncher, FormPage, LaunchOptions, Launcher};
use form_batch_submit::config::Config;
use form_batch_submit::models::{load_records, select_range, FormContract};
use form_batch_submit::services::{FieldResolver, Navigator};
use form_batch_submit::utils::logging;
use std::io::Write;

fn launcher(config: &Config) -> ChromeLauncher {
    ChromeLauncher::new(LaunchOptions {
        headless: config.headless,
        executable: config.chrome_executable.clone(),
        debug_port: config.browser_debug_port,
    })
}

#[test]
fn test_load_and_select_records_from_json() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"["a@example.com", "b@example.com", {{"key": "c@example.com", "fields": {{"feedback": "fixed"}}}}, "d@example.com"]"#
    )
    .unwrap();

    let config = Config {
        secondary_code: "AB-1".to_string(),
        filler_texts: vec!["one".to_string(), "two".to_string()],
        ..Config::default()
    };
    let contract = FormContract::default();

    let records = tokio_test::block_on(load_records(file.path(), &contract, &config));
    let records = tokio_test::assert_ok!(records);
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].get("email"), Some("a@example.com"));
    assert_eq!(records[0].get("teacher_code"), Some("AB-1"));
    assert_eq!(records[2].get("feedback"), Some("fixed"));

    let selected = select_range(records, Some("d@example.com"), Some("b@example.com")).unwrap();
    let keys: Vec<&str> = selected.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["b@example.com", "c@example.com", "d@example.com"]);
}

#[tokio::test]
#[ignore] // 默认忽略，需要本地浏览器：cargo test -- --ignored
async fn test_browser_launch_and_navigate() {
    logging::init(true);
    let config = Config::from_env();

    let mut browser = launcher(&config).launch().await.expect("启动浏览器失败");
    assert!(browser.is_connected());

    let page = browser.new_page().await.expect("打开页面失败");
    let loads = Navigator::new(&config.timings)
        .load(&page, "about:blank")
        .await
        .expect("导航失败");
    assert_eq!(loads, 1);
    assert_eq!(page.count("body").await.unwrap(), 1);

    browser.close().await.expect("关闭浏览器失败");
}

#[tokio::test]
#[ignore] // 需要能访问真实表单
async fn test_resolve_default_contract_roles() {
    logging::init(true);
    let config = Config::from_env();
    let contract = FormContract::default();

    let mut browser = launcher(&config).launch().await.expect("启动浏览器失败");
    let page = browser.new_page().await.expect("打开页面失败");
    Navigator::new(&config.timings)
        .load(&page, &contract.url)
        .await
        .expect("导航失败");

    let resolved = FieldResolver::new(&config.timings)
        .resolve_all(&page, &contract.required_roles())
        .await
        .expect("表单元素解析失败");
    assert_eq!(resolved.len(), contract.required_roles().len());

    browser.close().await.expect("关闭浏览器失败");
}

//! JS 执行器 - 基础设施层
//!
//! 持有页面资源，只暴露"执行 JS / 等待元素 / 点击"这类能力，不认识业务。

use std::time::{Duration, Instant};

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{AppResult, BrowserError};

/// 轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 元素定位方式
#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
}

impl Locator<'_> {
    /// 生成返回该元素（或 null）的 JS 表达式
    fn js_expr(&self) -> String {
        match self {
            Locator::Css(selector) => format!("document.querySelector({})", js_string(selector)),
            Locator::XPath(xpath) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_string(xpath)
            ),
        }
    }

    fn describe(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

/// 把字符串编码为 JS 字面量
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// JS 执行器
pub struct JsExecutor {
    page: Page,
    wait_timeout: Duration,
}

impl JsExecutor {
    pub fn new(page: Page, wait_timeout: Duration) -> Self {
        Self { page, wait_timeout }
    }

    /// 执行 JS 代码并返回 JSON 结果，`undefined` 和 `null` 都返回 `Null`
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 导航到指定 URL
    pub async fn goto(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| crate::error::AppError::navigation_failed(url, e))?;
        Ok(())
    }

    /// 轮询直到 JS 条件为真
    pub async fn wait_until(&self, condition_js: &str, what: &str) -> AppResult<()> {
        let started = Instant::now();
        loop {
            // 页面跳转过程中执行脚本可能失败，视为条件尚未满足
            let satisfied = self
                .eval_as::<bool>(format!("(() => {{ try {{ return !!({}); }} catch (e) {{ return false; }} }})()", condition_js))
                .await
                .unwrap_or(false);
            if satisfied {
                return Ok(());
            }
            if started.elapsed() >= self.wait_timeout {
                return Err(BrowserError::ElementTimeout {
                    selector: what.to_string(),
                    seconds: self.wait_timeout.as_secs(),
                }
                .into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 等待元素出现在 DOM 中
    pub async fn wait_for(&self, locator: Locator<'_>) -> AppResult<()> {
        self.wait_until(&format!("{} !== null", locator.js_expr()), locator.describe())
            .await
    }

    /// 等待元素可见
    pub async fn wait_for_visible(&self, locator: Locator<'_>) -> AppResult<()> {
        let condition = format!(
            "(() => {{ const el = {}; return el !== null && el.offsetParent !== null; }})()",
            locator.js_expr()
        );
        self.wait_until(&condition, locator.describe()).await
    }

    /// 元素是否存在（不等待）
    pub async fn exists(&self, locator: Locator<'_>) -> AppResult<bool> {
        self.eval_as(format!("{} !== null", locator.js_expr())).await
    }

    /// 等待元素出现后点击
    pub async fn click(&self, locator: Locator<'_>) -> AppResult<()> {
        self.wait_for(locator).await?;
        self.eval(format!("(() => {{ {}.click(); return true; }})()", locator.js_expr()))
            .await?;
        Ok(())
    }

    /// 等待输入框出现后填写内容并触发 input/change 事件
    pub async fn fill(&self, locator: Locator<'_>, value: &str) -> AppResult<()> {
        self.wait_for(locator).await?;
        self.eval(format!(
            "(() => {{ const el = {}; el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
            locator.js_expr(),
            js_string(value)
        ))
        .await?;
        Ok(())
    }

    /// 当前页面的 Cookie，格式为 `Cookie` 请求头
    pub async fn cookie_header(&self) -> AppResult<String> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("a'b\"c"), r#""a'b\"c""#);
    }

    #[test]
    fn test_locator_expressions() {
        let css = Locator::Css("#txtUsername").js_expr();
        assert_eq!(css, r##"document.querySelector("#txtUsername")"##);

        let xpath = Locator::XPath("//table[@id='gridResults']").js_expr();
        assert!(xpath.starts_with("document.evaluate(\"//table[@id='gridResults']\""));
        assert!(xpath.ends_with(".singleNodeValue"));
    }
}

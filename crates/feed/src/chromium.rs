//! Chromium feed: drives a chat web client through the DevTools protocol.
//!
//! The browser is launched with `chromiumoxide`, seeded with the persisted
//! session cookies and pointed at the conversation URL. Reading the feed is a
//! single script evaluation over the configured message selector; replying
//! focuses the input box, inserts text and presses Enter.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use feedreply_config::FeedConfig;
use feedreply_core::error::AdapterError;
use feedreply_core::feed::{FeedEntry, FeedSurface, Geometry, decode_data_url};
use feedreply_core::session::SessionStore;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Images smaller than this (in either dimension) are avatars or emoji.
const MIN_IMAGE_PX: u32 = 64;

/// Launch-time settings for [`ChromiumFeed`].
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub url: String,
    pub message_selector: String,
    pub input_selector: String,
    pub headless: bool,
    pub login_markers: Vec<String>,
    pub settle: Duration,
    pub cookie_domains: Vec<String>,
    pub user_agent: Option<String>,
    pub chrome_path: Option<String>,
    pub request_timeout: Duration,
}

impl ChromiumOptions {
    /// Options from the `[feed]` section; `url` overrides the default URL.
    pub fn from_config(config: &FeedConfig, url: Option<&str>) -> Self {
        Self {
            url: url.unwrap_or(&config.default_url).to_string(),
            message_selector: config.message_selector.clone(),
            input_selector: config.input_selector.clone(),
            headless: config.headless,
            login_markers: config.login_markers.clone(),
            settle: Duration::from_secs(config.settle_secs),
            cookie_domains: config.cookie_domains.clone(),
            user_agent: config.user_agent.clone(),
            chrome_path: config.chrome_path.clone(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Whether the landing URL means the session is not authenticated.
pub fn is_login_url(url: &str, markers: &[String]) -> bool {
    let url = url.to_lowercase();
    markers.iter().any(|m| url.contains(&m.to_lowercase()))
}

/// One element as reported by the snapshot script.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    text: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

impl From<RawEntry> for FeedEntry {
    fn from(raw: RawEntry) -> Self {
        let entry = match raw.image.filter(|s| !s.is_empty()) {
            Some(src) => FeedEntry::image(src, raw.text),
            None => FeedEntry::text(raw.text),
        };
        if raw.width > 0.0 && raw.height > 0.0 {
            entry.with_position(Geometry {
                x: raw.x,
                y: raw.y,
                width: raw.width,
                height: raw.height,
            })
        } else {
            entry
        }
    }
}

/// Build the snapshot script for a message selector.
fn snapshot_script(selector: &str) -> String {
    let selector = serde_json::Value::String(selector.to_string());
    format!(
        r#"(() => {{
    const selector = {selector};
    const big = (img) => (img.naturalWidth || img.width) >= {MIN_IMAGE_PX}
        && (img.naturalHeight || img.height) >= {MIN_IMAGE_PX};
    const items = [];
    const covered = new Set();
    for (const el of document.querySelectorAll(selector)) {{
        const row = el.closest('[role="row"]');
        const img = row ? Array.from(row.querySelectorAll('img')).find(big) : null;
        if (img) covered.add(img);
        items.push({{ node: el, text: (el.innerText || '').trim(), image: img ? img.src : null }});
    }}
    for (const row of document.querySelectorAll('[role="row"]')) {{
        const img = Array.from(row.querySelectorAll('img')).find(big);
        if (img && !covered.has(img)) items.push({{ node: img, text: '', image: img.src }});
    }}
    items.sort((a, b) =>
        (a.node.compareDocumentPosition(b.node) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1);
    return items.map(({{ node, text, image }}) => {{
        const r = node.getBoundingClientRect();
        return {{ text, image, x: r.x, y: r.y, width: r.width, height: r.height }};
    }});
}})()"#
    )
}

/// Run `body` against the input element; resolves to `false` when absent.
fn input_script(selector: &str, body: &str) -> String {
    let selector = serde_json::Value::String(selector.to_string());
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return false;
    {body}
    return true;
}})()"#
    )
}

fn fetch_image_script(src: &str) -> String {
    let src = serde_json::Value::String(src.to_string());
    format!(
        r#"(async () => {{
    const res = await fetch({src}, {{ credentials: 'include' }});
    if (!res.ok) throw new Error('HTTP ' + res.status);
    const blob = await res.blob();
    return await new Promise((resolve, reject) => {{
        const reader = new FileReader();
        reader.onload = () => resolve(reader.result);
        reader.onerror = () => reject(reader.error);
        reader.readAsDataURL(blob);
    }});
}})()"#
    )
}

/// A chat feed rendered in a Chromium tab.
pub struct ChromiumFeed {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    options: ChromiumOptions,
}

impl ChromiumFeed {
    /// Launch Chromium, seed cookies, open the feed and verify the session.
    pub async fn open(options: ChromiumOptions, session: &SessionStore) -> Result<Self, AdapterError> {
        let mut builder = BrowserConfig::builder();

        // chromiumoxide runs headless unless told otherwise
        if !options.headless {
            builder = builder.with_head();
        }

        builder = builder
            .request_timeout(options.request_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox");

        if let Some(ref ua) = options.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }

        if let Some(ref path) = options.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| AdapterError::Unreachable(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AdapterError::Unreachable(format!("browser launch failed: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
            debug!("browser event handler exited");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AdapterError::Unreachable(format!("cannot open tab: {e}")))?;

        let feed = Self {
            browser: Mutex::new(browser),
            page,
            handler,
            options,
        };

        feed.seed_cookies(session).await?;
        feed.navigate().await?;
        Ok(feed)
    }

    async fn seed_cookies(&self, session: &SessionStore) -> Result<(), AdapterError> {
        if session.is_empty() {
            warn!("No session cookies; the feed will likely ask for a login");
            return Ok(());
        }

        let mut cookies = Vec::with_capacity(session.len() * self.options.cookie_domains.len());
        for (name, value) in session.iter() {
            for domain in &self.options.cookie_domains {
                let cookie = CookieParam::builder()
                    .name(name)
                    .value(value)
                    .domain(domain.clone())
                    .path("/")
                    .build()
                    .map_err(|e| AdapterError::Navigation(format!("bad cookie {name}: {e}")))?;
                cookies.push(cookie);
            }
        }

        let count = cookies.len();
        self.page
            .execute(SetCookiesParams::new(cookies))
            .await
            .map_err(|e| AdapterError::Navigation(format!("cannot set cookies: {e}")))?;
        info!(count, "Session cookies loaded");
        Ok(())
    }

    async fn navigate(&self) -> Result<(), AdapterError> {
        info!(url = %self.options.url, "Opening feed");
        self.page
            .goto(self.options.url.as_str())
            .await
            .map_err(|e| AdapterError::Navigation(format!("{}: {e}", self.options.url)))?;
        if let Err(e) = self.page.wait_for_navigation().await {
            debug!(url = %self.options.url, error = %e, "Navigation wait failed");
        }

        tokio::time::sleep(self.options.settle).await;

        let landed = self.page.url().await.ok().flatten().unwrap_or_default();
        if is_login_url(&landed, &self.options.login_markers) {
            return Err(AdapterError::NotLoggedIn { url: landed });
        }

        info!(url = %landed, "Feed ready");
        Ok(())
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, js: String) -> Result<T, AdapterError> {
        self.page
            .evaluate(js.as_str())
            .await
            .map_err(|e| AdapterError::Unreachable(format!("script failed: {e}")))?
            .into_value()
            .map_err(|e| AdapterError::Unreachable(format!("unexpected script result: {e}")))
    }

    async fn with_input(&self, body: &str) -> Result<(), AdapterError> {
        let found: bool = self
            .eval(input_script(&self.options.input_selector, body))
            .await?;
        if found {
            Ok(())
        } else {
            Err(AdapterError::InputMissing(self.options.input_selector.clone()))
        }
    }

    async fn press_enter(&self, down: bool) -> Result<(), AdapterError> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(if down {
                DispatchKeyEventType::KeyDown
            } else {
                DispatchKeyEventType::KeyUp
            })
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13);
        if down {
            builder = builder.text("\r");
        }
        let params = builder
            .build()
            .map_err(|e| AdapterError::InputMissing(format!("key event: {e}")))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| AdapterError::Unreachable(format!("key event failed: {e}")))?;
        Ok(())
    }

    /// Close the browser.
    pub async fn close(&self) {
        if let Err(e) = self.browser.lock().await.close().await {
            debug!(error = %e, "browser close failed");
        }
        self.handler.abort();
    }
}

impl Drop for ChromiumFeed {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl FeedSurface for ChromiumFeed {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn read(&self) -> Result<Vec<FeedEntry>, AdapterError> {
        let raw: Vec<RawEntry> = self
            .eval(snapshot_script(&self.options.message_selector))
            .await?;
        Ok(raw.into_iter().map(FeedEntry::from).collect())
    }

    async fn clear_input(&self) -> Result<(), AdapterError> {
        self.with_input(
            "el.focus(); el.innerText = ''; el.dispatchEvent(new InputEvent('input', { bubbles: true }));",
        )
        .await
    }

    async fn type_input(&self, text: &str) -> Result<(), AdapterError> {
        self.with_input("el.focus();").await?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|e| AdapterError::Unreachable(format!("insert text failed: {e}")))?;
        Ok(())
    }

    async fn submit_input(&self) -> Result<(), AdapterError> {
        self.press_enter(true).await?;
        self.press_enter(false).await
    }

    async fn load_image(&self, entry: &FeedEntry) -> Result<Vec<u8>, AdapterError> {
        let Some(src) = entry.image_ref.as_deref() else {
            return Err(AdapterError::ImageUnavailable("entry has no image".into()));
        };
        if src.starts_with("data:") {
            return decode_data_url(src);
        }

        // Fetch inside the page so the request carries the session
        let params = EvaluateParams::builder()
            .expression(fetch_image_script(src))
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| AdapterError::ImageUnavailable(format!("bad fetch script: {e}")))?;

        let data_url: String = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| AdapterError::ImageUnavailable(format!("{src}: {e}")))?
            .into_value()
            .map_err(|e| AdapterError::ImageUnavailable(format!("{src}: {e}")))?;

        decode_data_url(&data_url)
    }
}

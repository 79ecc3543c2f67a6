//! `FantocciniConnector`: the one production `Connector` implementation
//! (§9 design notes), driving the portal family described in §4.3 over
//! the W3C WebDriver protocol via `fantoccini`. A persistent storage
//! state (cookies) is loaded from disk on start and flushed back on
//! close (§4.3.1, §5 "storage-state file per (platform, tenant):
//! exclusive lock while a HeadfulRun holds it").

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use cae_protocol::config::PlatformRecord;
use cae_protocol::PendingRequirement;
use cae_security::DomainAllowlist;
use fantoccini::{Client, ClientBuilder, Locator};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::connector::Connector;
use crate::error::PortalError;
use crate::frame::{grid_readiness, select_grid_frame, FrameDescriptor, GridObservation, GridReadiness};
use crate::navigation::{compute_screen_signature, navigate_to_pending_grid, NavigationStrategy, ScreenSignature};
use crate::overlay::{dismiss_overlays, OverlayDriver};
use crate::pagination::{collect_pages, ScrapedPage};
use crate::upload::{UploadEvidence, UploadSpec};

const GRID_RETRY_TIMEOUT: Duration = Duration::from_secs(8);
const DASHBOARD_TILE_SELECTOR: &str = r#"a.listado_link[href="javascript:Gestion(3);"]"#;

#[derive(Debug, Serialize, Deserialize, Default)]
struct StorageState {
    cookies: Vec<SerializedCookie>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
}

/// In-memory-only credential pair (§4.3.1, §5: "never flushed to disk
/// or evidence").
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct FantocciniConnector {
    client: Option<Client>,
    webdriver_url: String,
    platform: PlatformRecord,
    credentials: Credentials,
    allowlist: DomainAllowlist,
    storage_state_path: PathBuf,
}

impl FantocciniConnector {
    pub fn new(webdriver_url: String, platform: PlatformRecord, credentials: Credentials, storage_state_path: PathBuf) -> Self {
        let allowlist = DomainAllowlist::new(platform.allowed_domains.clone());
        Self { client: None, webdriver_url, platform, credentials, allowlist, storage_state_path }
    }

    async fn client(&mut self) -> Result<&mut Client, PortalError> {
        if self.client.is_none() {
            let client = ClientBuilder::native().connect(&self.webdriver_url).await?;
            self.client = Some(client);
        }
        Ok(self.client.as_mut().expect("just initialized"))
    }

    fn validate_navigation(&self, target: &str) -> Result<(), PortalError> {
        self.allowlist.validate(target).map(|_| ()).map_err(|e| match e {
            cae_security::SecurityError::DomainEscape { url, allowed } => PortalError::DomainEscape { url, allowed },
            cae_security::SecurityError::InvalidUrl(msg) => PortalError::WebDriver(msg),
        })
    }

    async fn goto(&mut self, target: &str) -> Result<(), PortalError> {
        self.validate_navigation(target)?;
        self.client().await?.goto(target).await?;
        Ok(())
    }

    fn load_storage_state(&self) -> StorageState {
        std::fs::read_to_string(&self.storage_state_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    async fn apply_storage_state(&mut self) -> Result<bool, PortalError> {
        let state = self.load_storage_state();
        if state.cookies.is_empty() {
            return Ok(false);
        }
        let client = self.client().await?;
        for cookie in &state.cookies {
            let mut c = fantoccini::cookies::Cookie::new(cookie.name.clone(), cookie.value.clone());
            if let Some(domain) = &cookie.domain {
                c.set_domain(domain.clone());
            }
            if let Some(path) = &cookie.path {
                c.set_path(path.clone());
            }
            let _ = client.add_cookie(c).await;
        }
        Ok(true)
    }

    async fn persist_storage_state(&mut self) -> Result<(), PortalError> {
        let client = self.client().await?;
        let cookies = client.get_all_cookies().await?;
        let state = StorageState {
            cookies: cookies
                .into_iter()
                .map(|c| SerializedCookie { name: c.name().to_string(), value: c.value().to_string(), domain: c.domain().map(str::to_string), path: c.path().map(str::to_string) })
                .collect(),
        };
        if let Some(parent) = self.storage_state_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&state) {
            let _ = std::fs::write(&self.storage_state_path, json);
        }
        Ok(())
    }

    async fn perform_login_form(&mut self) -> Result<(), PortalError> {
        let login = self.platform.login.clone();
        let base_url = self.platform.base_url.clone();
        let username = self.credentials.username.clone();
        let password = self.credentials.password.clone();
        self.goto(&base_url).await?;
        let client = self.client().await?;
        client.find(Locator::Css(&login.username_field)).await?.send_keys(&username).await?;
        client.find(Locator::Css(&login.password_field)).await?.send_keys(&password).await?;
        client.find(Locator::Css(&login.submit_button)).await?.click().await?;
        Ok(())
    }

    async fn verify_authenticated(&mut self) -> Result<bool, PortalError> {
        let marker = self.platform.login.authenticated_marker.clone();
        let client = self.client().await?;
        Ok(client.find(Locator::Css(&marker)).await.is_ok())
    }

    async fn enumerate_frames(&mut self) -> Result<Vec<FrameDescriptor>, PortalError> {
        // fantoccini exposes only one active frame context at a time,
        // so candidate frames are enumerated by index against the
        // top-level document's `<frame>`/`<iframe>` elements.
        let client = self.client().await?;
        let elements = client.find_all(Locator::Css("frame, iframe")).await?;
        let mut descriptors = Vec::new();
        for el in &elements {
            let name = el.attr("name").await.unwrap_or(None);
            let url = el.attr("src").await.unwrap_or(None);
            descriptors.push(FrameDescriptor { name, url, has_hdr_table: false });
        }
        Ok(descriptors)
    }

    async fn enter_grid_frame(&mut self) -> Result<(), PortalError> {
        let descriptors = self.enumerate_frames().await?;
        let Some(idx) = select_grid_frame(&descriptors) else {
            return Err(PortalError::GridNotFound);
        };
        let client = self.client().await?;
        let elements = client.find_all(Locator::Css("frame, iframe")).await?;
        let target = elements.into_iter().nth(idx).ok_or(PortalError::GridNotFound)?;
        client.enter_frame(Some(target)).await?;
        Ok(())
    }

    async fn observe_grid(&mut self) -> Result<GridObservation, PortalError> {
        let client = self.client().await?;
        let header_present = client.find(Locator::Css("table.hdr")).await.is_ok();
        let has_data_row = client.find(Locator::Css("table.hdr tbody tr")).await.is_ok();
        let has_no_results_indicator = client.find(Locator::Css(".sin-resultados, .no-results")).await.is_ok();
        let spinner_visible = client.find(Locator::Css(".spinner, .loading")).await.is_ok();
        Ok(GridObservation { spinner_visible, header_present, has_data_row, has_no_results_indicator })
    }

    async fn current_screen_signature(&mut self) -> Result<ScreenSignature, PortalError> {
        let client = self.client().await?;
        let url = client.current_url().await?.to_string();
        let title = client.title().await?;
        Ok(compute_screen_signature(&url, &title, &["table.hdr"]))
    }

    async fn attempt_navigate_to_grid(&mut self, strategy: NavigationStrategy) -> Result<ScreenSignature, PortalError> {
        let client = self.client().await?;
        match strategy {
            NavigationStrategy::DashboardTile => {
                if let Ok(el) = client.find(Locator::Css(DASHBOARD_TILE_SELECTOR)).await {
                    el.click().await?;
                } else {
                    let lowered = "abcdefghijklmnopqrstuvwxyzáéíóú";
                    let upped = "ABCDEFGHIJKLMNOPQRSTUVWXYZÁÉÍÓÚ";
                    let el = client
                        .find(Locator::XPath(&format!(
                            "//a[contains(translate(@aria-label, '{upped}', '{lowered}'), 'pendiente') or contains(translate(@aria-label, '{upped}', '{lowered}'), 'documentaci')]"
                        )))
                        .await?;
                    el.click().await?;
                }
            }
            NavigationStrategy::SideMenu => {
                client.find(Locator::LinkText("Coordinación")).await?.click().await?;
                let lowered = "abcdefghijklmnopqrstuvwxyzáéíóú";
                let upped = "ABCDEFGHIJKLMNOPQRSTUVWXYZÁÉÍÓÚ";
                client
                    .find(Locator::XPath(&format!(
                        "//a[contains(translate(text(), '{upped}', '{lowered}'), 'pendiente') or contains(translate(text(), '{upped}', '{lowered}'), 'documentaci')]"
                    )))
                    .await?
                    .click()
                    .await?;
            }
        }
        self.current_screen_signature().await
    }

    async fn wait_for_grid_ready(&mut self) -> Result<(), PortalError> {
        let deadline = tokio::time::Instant::now() + GRID_RETRY_TIMEOUT;
        loop {
            let observation = self.observe_grid().await?;
            match grid_readiness(&observation) {
                GridReadiness::Ready => return Ok(()),
                GridReadiness::NotReady => return Err(PortalError::GridNotFound),
                GridReadiness::HeaderOnlyRetry => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(PortalError::GridNotFound);
                    }
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
            }
        }
    }

    async fn click_next_page(&mut self) -> Result<(), PortalError> {
        let client = self.client().await?;
        client.find(Locator::Css("a.next-page:not(.disabled)")).await?.click().await?;
        Ok(())
    }

    async fn scrape_current_page(&mut self) -> Result<ScrapedPage, PortalError> {
        let client = self.client().await?;
        let rows = client.find_all(Locator::Css("table.hdr tbody tr")).await?;
        let mut items = Vec::new();
        for row in &rows {
            let cells = row.find_all(Locator::Css("td")).await?;
            if cells.len() < 3 {
                continue;
            }
            let tipo_doc = cells[0].text().await.unwrap_or_default();
            let elemento = cells[1].text().await.unwrap_or_default();
            let empresa = cells[2].text().await.unwrap_or_default();
            let normalized = cae_security::normalize(&format!("{tipo_doc}|{elemento}|{empresa}"));
            items.push(PendingRequirement {
                pending_item_key: normalized,
                tipo_doc,
                elemento,
                empresa,
                detected_period_key: None,
                portal_metadata: serde_json::Value::Null,
            });
        }
        let next_page_available = client.find(Locator::Css("a.next-page:not(.disabled)")).await.is_ok();
        let signature = self.current_screen_signature().await?;
        Ok(ScrapedPage { items, next_page_available, signature })
    }
}

#[async_trait]
impl Connector for FantocciniConnector {
    async fn login(&mut self) -> Result<(), PortalError> {
        let restored = self.apply_storage_state().await?;
        if restored && self.verify_authenticated().await? {
            info!(platform = self.platform.platform_key.as_str(), "reused storage state, already authenticated");
            return Ok(());
        }
        self.perform_login_form().await?;
        if !self.verify_authenticated().await? {
            return Err(PortalError::WebDriver("authenticated marker not found after login form submit".into()));
        }
        self.persist_storage_state().await?;
        Ok(())
    }

    async fn navigate_to_pending(&mut self) -> Result<ScreenSignature, PortalError> {
        dismiss_overlays(&mut FantocciniOverlayAdapter { connector: self }).map_err(|e| {
            warn!(error = %e, "overlay dismissal pipeline did not clear every blocker");
            e
        })?;
        let landed_on_grid = std::cell::Cell::new(false);
        let signature = {
            let connector = &mut *self;
            navigate_to_pending_grid(
                |strategy| {
                    let sig = futures::executor::block_on(connector.attempt_navigate_to_grid(strategy))?;
                    let observation = futures::executor::block_on(connector.observe_grid())?;
                    landed_on_grid.set(!matches!(grid_readiness(&observation), GridReadiness::NotReady));
                    Ok(sig)
                },
                |_sig| landed_on_grid.get(),
            )?
        };
        self.enter_grid_frame().await?;
        self.wait_for_grid_ready().await?;
        Ok(signature)
    }

    async fn extract_pending(&mut self, max_pages: u32) -> Result<Vec<PendingRequirement>, PortalError> {
        let connector = &mut *self;
        collect_pages(
            |page_number| {
                futures::executor::block_on(async {
                    if page_number > 0 {
                        connector.click_next_page().await?;
                    }
                    connector.scrape_current_page().await
                })
            },
            max_pages,
        )
    }

    async fn upload_one(&mut self, item: &PendingRequirement, spec: &UploadSpec) -> Result<UploadEvidence, PortalError> {
        let row_xpath = format!("//tr[.//td[contains(., {:?})]]//a[contains(@class, 'subir')]", item.tipo_doc);
        let client = self.client().await?;
        let screenshot_before = client.screenshot().await.unwrap_or_default();

        client.find(Locator::XPath(&row_xpath)).await?.click().await?;

        for date_field in &spec.form.date_fields {
            use cae_protocol::rules::DateFieldSource;
            let value = match date_field.source {
                DateFieldSource::ValidFrom => spec.valid_from,
                DateFieldSource::ValidTo => spec.valid_to,
                DateFieldSource::IssuedAt => spec.issued_at,
            };
            if let Some(date) = value {
                client.find(Locator::Css(&date_field.selector)).await?.send_keys(&date.format("%d/%m/%Y").to_string()).await?;
            }
        }

        let file_input = client.find(Locator::Css(&spec.form.upload_field_selector)).await?;
        file_input.send_keys(&spec.file_path.display().to_string()).await?;

        client.find(Locator::Css(&spec.form.submit_button_selector)).await?.click().await?;

        let mut confirmed = false;
        for pattern in &spec.form.confirmation_text_patterns {
            if let Ok(el) = client.find(Locator::XPath(&format!("//*[contains(text(), {pattern:?})]"))).await {
                if el.text().await.is_ok() {
                    confirmed = true;
                    break;
                }
            }
        }
        let screenshot_after = client.screenshot().await.unwrap_or_default();
        if !confirmed {
            return Err(PortalError::WebDriver("no confirmation text pattern matched after submit".into()));
        }

        Ok(UploadEvidence {
            screenshot_before,
            screenshot_after,
            form_snapshot: serde_json::json!({ "pending_item_key": spec.pending_item_key }),
            log_lines: vec![format!("uploaded {} via {}", spec.file_path.display(), spec.form.upload_field_selector)],
        })
    }
}

/// Adapts `FantocciniConnector`'s page access to `OverlayDriver`
/// (§4.3.3). Kept as a thin borrow-wrapper so `dismiss_overlays`'s pure
/// control flow never needs to know about fantoccini directly.
struct FantocciniOverlayAdapter<'a> {
    connector: &'a mut FantocciniConnector,
}

impl OverlayDriver for FantocciniOverlayAdapter<'_> {
    fn unread_count(&mut self) -> Result<Option<u32>, PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            let Ok(frame) = client.find(Locator::Css("iframe[src*='ComunicadosPrioritarios']")).await else {
                return Ok(None);
            };
            client.enter_frame(Some(frame)).await?;
            let text = client.find(Locator::Css(".contador-no-leidos")).await.ok();
            let count = match text {
                Some(el) => el.text().await.ok().and_then(|t| parse_unread_counter(&t)),
                None => Some(0),
            };
            client.enter_parent_frame().await?;
            Ok(count)
        })
    }

    fn click_first_unread(&mut self) -> Result<(), PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            client.find(Locator::Css(".comunicado-no-leido")).await?.click().await?;
            Ok(())
        })
    }

    fn mark_as_read(&mut self) -> Result<bool, PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            if let Ok(el) = client.find(Locator::LinkText("Marcar como leído")).await {
                el.click().await?;
                return Ok(true);
            }
            if let Ok(el) = client.find(Locator::XPath("//*[@role='button' and contains(., 'leído')]")).await {
                el.click().await?;
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn close_priority_modal(&mut self) -> Result<bool, PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            let script = "if (window.dhxWins) { window.dhxWins.forEachWindow(w => w.close()); return true; } return false;";
            if let Ok(serde_json::Value::Bool(true)) = client.execute(script, vec![]).await {
                return Ok(true);
            }
            if let Ok(el) = client.find(Locator::Css(".dhx-window-close")).await {
                el.click().await?;
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn news_window_present(&mut self) -> Result<bool, PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            let title = client.title().await.unwrap_or_default();
            Ok(matches_news_title(&title))
        })
    }

    fn try_suppress_news_window(&mut self) -> Result<(), PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            if let Ok(el) = client.find(Locator::Css("input[type=checkbox].no-volver-mostrar")).await {
                let _ = el.click().await;
            }
            Ok(())
        })
    }

    fn close_news_window(&mut self) -> Result<bool, PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            if let Ok(el) = client.find(Locator::Css(".dhx-window-close, .close-button")).await {
                let _ = el.click().await;
                return Ok(true);
            }
            Ok(false)
        })
    }

    fn generic_blocker_present(&mut self) -> Result<bool, PortalError> {
        futures::executor::block_on(async {
            let client = self.connector.client().await?;
            let title = client.title().await.unwrap_or_default();
            Ok(matches_generic_blocker_title(&title))
        })
    }

    fn close_generic_blocker(&mut self) -> Result<bool, PortalError> {
        self.close_news_window()
    }
}

fn parse_unread_counter(text: &str) -> Option<u32> {
    text.rsplit(':').next()?.trim().parse().ok()
}

fn matches_news_title(title: &str) -> bool {
    let lowered = title.to_lowercase();
    ["avisos", "comunicados", "noticias"].iter().any(|kw| lowered.contains(kw))
}

fn matches_generic_blocker_title(title: &str) -> bool {
    let lowered = title.to_lowercase();
    ["avisos", "comunicados", "noticias", "seguridad"].iter().any(|kw| lowered.contains(kw))
}

/// Close the browser and flush storage state (§4.4 `CLOSED`).
pub async fn close_and_flush(connector: &mut FantocciniConnector) -> Result<(), PortalError> {
    connector.persist_storage_state().await?;
    if let Some(client) = connector.client.take() {
        let _ = client.close().await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unread_counter_from_spanish_label() {
        assert_eq!(parse_unread_counter("No leído: 3"), Some(3));
        assert_eq!(parse_unread_counter("No leído: 0"), Some(0));
    }

    #[test]
    fn news_title_regex_is_case_insensitive() {
        assert!(matches_news_title("Avisos, Comunicados y Noticias sin leer"));
        assert!(!matches_news_title("Panel de control"));
    }
}

//! # Installed Applications
//!
//! Raw app entries as emitted by the orchestration library, and the
//! frontend-ready form the dashboard derives from every snapshot. Snapshots
//! are replaced wholesale: derived fields are recomputed on each emission,
//! never patched.

use crate::config::registry::DEFAULT_APM_REGISTRY;
use crate::utils::url::{append_trailing_slash, is_http_url, remove_starting_slash, resolve_pathname};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an app's frontend bundle lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContent {
    /// `ipfs` or `http`
    pub provider: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIcon {
    pub src: String,
    #[serde(default)]
    pub sizes: String,
}

/// An app installed in the organization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawApp {
    #[serde(default)]
    pub app_id: String,
    /// Fully qualified package name (`voting.aragonpm.eth`)
    #[serde(default)]
    pub app_name: Option<String>,
    pub name: String,
    pub proxy_address: String,
    #[serde(default)]
    pub code_address: String,
    #[serde(default)]
    pub content: Option<AppContent>,
    /// Background script, relative to the content base URL
    #[serde(default)]
    pub script: Option<String>,
    /// Web UI entry point, relative to the content base URL
    #[serde(default, rename = "start_url")]
    pub start_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub icons: Option<Vec<AppIcon>>,
    #[serde(default)]
    pub is_forwarder: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A raw app plus everything the UI derives from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendApp {
    #[serde(flatten)]
    pub app: RawApp,
    /// Absolute URL of the web UI entry point, empty when unknown
    pub src: String,
    pub base_url: String,
    pub apm_registry: String,
    pub has_web_app: bool,
    pub tags: Vec<String>,
}

impl FrontendApp {
    pub fn proxy_address(&self) -> &str {
        &self.app.proxy_address
    }

    pub fn name(&self) -> &str {
        &self.app.name
    }
}

/// Roles granted on one app: role name → manager and grantees
pub type AppPermissions = BTreeMap<String, PermissionEntry>;

/// Entity address → roles it can perform
pub type Permissions = BTreeMap<String, AppPermissions>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionEntry {
    pub manager: String,
    #[serde(default)]
    pub allowed_entities: Vec<String>,
}

/// Base URL of an app's content.
///
/// Supported locations:
/// - `ipfs:{HASH}` → `{gateway}/{HASH}/`
/// - `http:{HOST}[:{PORT}][/{PATH}]` → `http://{location}/`
/// - `http:http(s)://...` → the location, with a trailing slash
pub fn app_base_url(app: &RawApp, gateway: &str) -> String {
    let Some(content) = &app.content else {
        return String::new();
    };

    match content.provider.as_str() {
        "ipfs" => format!("{}/{}/", gateway, content.location),
        "http" if is_http_url(&content.location) => append_trailing_slash(&content.location),
        "http" => format!("http://{}/", content.location),
        _ => String::new(),
    }
}

/// Everything after the first `.` of the package name
pub fn apm_registry(app: &RawApp) -> String {
    let app_name = app.app_name.as_deref().unwrap_or("");
    match app_name.find('.') {
        Some(index) => app_name[index + 1..].to_string(),
        None => app_name.to_string(),
    }
}

pub fn has_web_app(app: &RawApp) -> bool {
    app.start_url.as_deref().is_some_and(|url| !url.is_empty())
}

pub fn app_tags(app: &RawApp) -> Vec<String> {
    let registry = apm_registry(app);
    let mut tags = Vec::new();

    if let Some(status) = app.status.as_deref().filter(|s| !s.is_empty()) {
        tags.push(status.to_string());
    }
    if registry != DEFAULT_APM_REGISTRY {
        tags.push(format!("{} registry", registry));
    }
    if !has_web_app(app) {
        tags.push("contract-only".to_string());
    }

    tags
}

/// Attach the data the frontend needs to each app of a snapshot
pub fn prepare_apps_for_frontend(apps: &[RawApp], gateway: &str) -> Vec<FrontendApp> {
    apps.iter()
        .map(|app| {
            let base_url = app_base_url(app, gateway);
            // Without the starting slash the entry point resolves below the base URL
            let start_url = remove_starting_slash(app.start_url.as_deref().unwrap_or(""));
            let src = if base_url.is_empty() {
                String::new()
            } else {
                resolve_pathname(start_url, &base_url)
            };

            FrontendApp {
                app: app.clone(),
                src,
                base_url,
                apm_registry: apm_registry(app),
                has_web_app: has_web_app(app),
                tags: app_tags(app),
            }
        })
        .collect()
}

/// Absolute URL of an app's background script, if it has one and its content is reachable
pub fn script_url(app: &RawApp, gateway: &str) -> Option<String> {
    let script = app.script.as_deref().filter(|s| !s.is_empty())?;
    let base_url = app_base_url(app, gateway);
    if base_url.is_empty() {
        return None;
    }
    Some(resolve_pathname(remove_starting_slash(script), &base_url))
}

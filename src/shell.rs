//! Navigation helpers for the dashboard shell: the app menu, the `main`
//! organization alias and what an app route displays.

use crate::apps::FrontendApp;
use crate::config::NetworkConfig;
use crate::utils::address::addresses_equal;

/// Route key of the built-in home page
pub const HOME_ROUTE_KEY: &str = "home";

/// Organization param that stands for the configured default organization
pub const MAIN_DAO_PARAM: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuIcon {
    /// The dashboard's own icon
    Default,
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub name: String,
    pub route_key: String,
    pub icon: MenuIcon,
}

fn app_icon(app: &FrontendApp) -> MenuIcon {
    match app.app.icons.as_deref() {
        Some([first, ..]) => MenuIcon::Url(format!("{}{}", app.base_url, first.src)),
        _ => MenuIcon::Default,
    }
}

/// Home, then every app with a web UI in snapshot order
pub fn menu_items(apps: &[FrontendApp]) -> Vec<MenuItem> {
    let home = MenuItem {
        name: "Home".to_string(),
        route_key: HOME_ROUTE_KEY.to_string(),
        icon: MenuIcon::Default,
    };

    std::iter::once(home)
        .chain(apps.iter().filter(|app| app.has_web_app).map(|app| MenuItem {
            name: app.name().to_string(),
            route_key: app.proxy_address().to_string(),
            icon: app_icon(app),
        }))
        .collect()
}

/// Path of an app page under an organization
pub fn app_route(dao_name: &str, route_key: &str) -> String {
    format!("/{}/{}", dao_name, route_key)
}

/// Organization to connect to for a route param
pub fn resolve_dao_param<'a>(param: &'a str, config: &'a NetworkConfig) -> &'a str {
    if param == MAIN_DAO_PARAM {
        &config.default_dao_address
    } else {
        param
    }
}

/// What an app route displays
#[derive(Debug, Clone, PartialEq)]
pub enum AppView<'a> {
    Home,
    Embedded(&'a FrontendApp),
    NotFound,
}

pub fn app_view<'a>(apps: &'a [FrontendApp], route_key: &str) -> AppView<'a> {
    if route_key == HOME_ROUTE_KEY {
        return AppView::Home;
    }
    apps.iter()
        .find(|app| addresses_equal(app.proxy_address(), route_key))
        .map_or(AppView::NotFound, AppView::Embedded)
}

//! Tabs of PTY windows: the host's [`TargetRegistry`]

use anyhow::{Context, Result};
use textcast_core::types::{CONNECT_ENV, WINDOW_ID_ENV};
use textcast_core::ConnectInfo;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::keys::KeyEvent;
use crate::pty::PtyWindow;
use crate::registry::{CloseHook, HookId, Query, TabId, TargetId, TargetRegistry};

struct Tab {
    id: TabId,
    title: String,
}

struct Window {
    id: TargetId,
    tab: TabId,
    title: String,
    pty: PtyWindow,
    indicator: bool,
    hooks: Vec<(HookId, CloseHook)>,
}

/// Every window the host runs, grouped in tabs
///
/// The active window is the first window of the first tab that has one.
pub struct PtyRegistry {
    tabs: Vec<Tab>,
    windows: Vec<Window>,
    next_hook: u64,
}

impl PtyRegistry {
    /// Spawn the configured layout. Each shell learns its window id and how
    /// to reach this host from its environment.
    pub fn spawn(
        config: &HostConfig,
        connect: &ConnectInfo,
        exited: mpsc::UnboundedSender<TargetId>,
    ) -> Result<Self> {
        let connect_json = connect.to_json()?;
        let mut registry = Self {
            tabs: Vec::new(),
            windows: Vec::new(),
            next_hook: 0,
        };
        let mut next_window: TargetId = 1;

        for (i, tab_config) in config.tabs.iter().enumerate() {
            let tab = i as TabId + 1;
            registry.tabs.push(Tab {
                id: tab,
                title: tab_config.title.clone(),
            });
            for spec in &tab_config.windows {
                let id = next_window;
                next_window += 1;
                let env = [
                    (WINDOW_ID_ENV.to_string(), id.to_string()),
                    (CONNECT_ENV.to_string(), connect_json.clone()),
                ];
                let pty = PtyWindow::spawn(id, spec, &env, exited.clone())
                    .with_context(|| format!("Failed to start window {:?}", spec.title))?;
                registry.windows.push(Window {
                    id,
                    tab,
                    title: spec.title.clone(),
                    pty,
                    indicator: false,
                    hooks: Vec::new(),
                });
            }
        }

        info!(
            "Started {} window(s) in {} tab(s)",
            registry.windows.len(),
            registry.tabs.len()
        );
        Ok(registry)
    }

    fn window(&self, id: TargetId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    fn window_mut(&mut self, id: TargetId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }
}

impl TargetRegistry for PtyRegistry {
    fn match_windows(&self, spec: &str) -> Vec<TargetId> {
        let Some(query) = Query::parse(spec) else {
            return Vec::new();
        };
        self.windows
            .iter()
            .enumerate()
            .filter(|(i, w)| query.matches(w.id, *i, &w.title))
            .map(|(_, w)| w.id)
            .collect()
    }

    fn match_tabs(&self, spec: &str) -> Vec<TabId> {
        let Some(query) = Query::parse(spec) else {
            return Vec::new();
        };
        self.tabs
            .iter()
            .enumerate()
            .filter(|(i, t)| query.matches(t.id, *i, &t.title))
            .map(|(_, t)| t.id)
            .collect()
    }

    fn tab_members(&self, tab: TabId) -> Vec<TargetId> {
        self.windows.iter().filter(|w| w.tab == tab).map(|w| w.id).collect()
    }

    fn active_target(&self) -> Option<TargetId> {
        self.windows.first().map(|w| w.id)
    }

    fn all_targets(&self) -> Vec<TargetId> {
        self.windows.iter().map(|w| w.id).collect()
    }

    fn contains(&self, target: TargetId) -> bool {
        self.window(target).is_some()
    }

    fn write(&mut self, target: TargetId, data: &[u8]) -> Result<()> {
        let window = self
            .window_mut(target)
            .ok_or_else(|| anyhow::anyhow!("Window {} not found", target))?;
        window.pty.write(data)
    }

    fn encode_key(&self, target: TargetId, key: &KeyEvent) -> Vec<u8> {
        let app_cursor = self
            .window(target)
            .map(|w| w.pty.application_cursor())
            .unwrap_or(false);
        key.encode(app_cursor)
    }

    fn set_indicator(&mut self, target: TargetId, on: bool) {
        if let Some(window) = self.window_mut(target) {
            if window.indicator != on {
                debug!("Window {} broadcast indicator {}", target, if on { "on" } else { "off" });
            }
            window.indicator = on;
        }
    }

    fn add_close_hook(&mut self, target: TargetId, hook: CloseHook) -> Option<HookId> {
        let id = HookId(self.next_hook);
        let window = self.window_mut(target)?;
        window.hooks.push((id, hook));
        self.next_hook += 1;
        Some(id)
    }

    fn remove_close_hook(&mut self, target: TargetId, hook: HookId) {
        if let Some(window) = self.window_mut(target) {
            window.hooks.retain(|(id, _)| *id != hook);
        }
    }

    fn close(&mut self, target: TargetId) -> Vec<CloseHook> {
        let Some(pos) = self.windows.iter().position(|w| w.id == target) else {
            return Vec::new();
        };
        let window = self.windows.remove(pos);
        if !self.windows.iter().any(|w| w.tab == window.tab) {
            self.tabs.retain(|t| t.id != window.tab);
        }
        window.hooks.into_iter().map(|(_, hook)| hook).collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{TabConfig, WindowConfig};
    use std::time::Duration;

    fn cat(title: &str) -> WindowConfig {
        WindowConfig {
            title: title.to_string(),
            command: "/bin/cat".to_string(),
            ..Default::default()
        }
    }

    fn layout() -> HostConfig {
        HostConfig {
            tabs: vec![
                TabConfig {
                    title: "main".to_string(),
                    windows: vec![cat("shell"), cat("logs")],
                },
                TabConfig {
                    title: "build".to_string(),
                    windows: vec![cat("make")],
                },
            ],
            ..Default::default()
        }
    }

    fn connect() -> ConnectInfo {
        ConnectInfo::new("127.0.0.1:8443".parse().unwrap(), "aa".to_string(), "00".repeat(32))
    }

    #[tokio::test]
    async fn test_layout_and_matching() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let reg = PtyRegistry::spawn(&layout(), &connect(), tx).unwrap();
        assert_eq!(reg.all_targets(), vec![1, 2, 3]);
        assert_eq!(reg.active_target(), Some(1));
        assert_eq!(reg.match_windows("title:log"), vec![2]);
        assert_eq!(reg.match_windows("id:3"), vec![3]);
        assert_eq!(reg.match_tabs("title:build"), vec![2]);
        assert_eq!(reg.match_tabs("index:0"), vec![1]);
        assert_eq!(reg.tab_members(1), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_close_fires_hooks_and_drops_empty_tab() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut reg = PtyRegistry::spawn(&layout(), &connect(), tx).unwrap();
        reg.add_close_hook(3, CloseHook::EndSession("s1".to_string()));
        assert_eq!(reg.close(3), vec![CloseHook::EndSession("s1".to_string())]);
        assert!(!reg.contains(3));
        assert!(reg.match_tabs("title:build").is_empty());
        assert!(reg.close(3).is_empty());
    }

    #[tokio::test]
    async fn test_shell_sees_window_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = HostConfig {
            tabs: vec![TabConfig {
                title: "main".to_string(),
                windows: vec![WindowConfig {
                    command: "/bin/sh".to_string(),
                    args: vec![
                        "-c".to_string(),
                        // Hangs instead of exiting when the variables are missing
                        format!(
                            "test \"${}\" = 1 && test -n \"${}\" || sleep 60",
                            WINDOW_ID_ENV, CONNECT_ENV
                        ),
                    ],
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };
        let _reg = PtyRegistry::spawn(&config, &connect(), tx).unwrap();
        let exited = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await.unwrap();
        assert_eq!(exited, Some(1));
    }
}

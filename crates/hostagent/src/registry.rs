//! Window/tab registry seen by the send-text pipeline
//!
//! The resolver, session manager and dispatcher only talk to windows through
//! [`TargetRegistry`]. The host implements it over PTY shells
//! ([`crate::windows::PtyRegistry`]); tests use [`mock::MockRegistry`].

use crate::keys::KeyEvent;

/// Window identifier, unique for the lifetime of the host
pub type TargetId = u64;

/// Tab identifier
pub type TabId = u64;

/// Registration handle for a close hook on one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Action to run when a window closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseHook {
    /// Purge the named broadcast session
    EndSession(String),
}

/// Parsed match expression
///
/// `id:N`, `index:N` (tabs only), `title:TEXT`, or `all`. Anything else is
/// treated as a title substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Id(u64),
    Index(usize),
    Title(String),
    All,
}

impl Query {
    pub fn parse(spec: &str) -> Option<Query> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        if spec == "all" {
            return Some(Query::All);
        }
        match spec.split_once(':') {
            Some(("id", n)) => n.trim().parse().ok().map(Query::Id),
            Some(("index", n)) => n.trim().parse().ok().map(Query::Index),
            Some(("title", t)) => Some(Query::Title(t.to_string())),
            _ => Some(Query::Title(spec.to_string())),
        }
    }

    /// Test one item against this query
    pub fn matches(&self, id: u64, index: usize, title: &str) -> bool {
        match self {
            Query::Id(want) => *want == id,
            Query::Index(want) => *want == index,
            Query::Title(text) => title.contains(text.as_str()),
            Query::All => true,
        }
    }
}

/// Host-side window registry
pub trait TargetRegistry {
    /// Windows matching a window expression, in registry order
    fn match_windows(&self, spec: &str) -> Vec<TargetId>;

    /// Tabs matching a tab expression, in registry order
    fn match_tabs(&self, spec: &str) -> Vec<TabId>;

    /// Windows of one tab, in tab order
    fn tab_members(&self, tab: TabId) -> Vec<TargetId>;

    /// Currently focused window
    fn active_target(&self) -> Option<TargetId>;

    fn all_targets(&self) -> Vec<TargetId>;

    fn contains(&self, target: TargetId) -> bool;

    /// Write bytes to the window's input
    fn write(&mut self, target: TargetId, data: &[u8]) -> anyhow::Result<()>;

    /// Encode a key event for this window's current keyboard mode
    fn encode_key(&self, target: TargetId, key: &KeyEvent) -> Vec<u8>;

    /// Toggle the broadcast indicator; unknown targets are ignored
    fn set_indicator(&mut self, target: TargetId, on: bool);

    /// Register a close hook; `None` if the window is gone
    fn add_close_hook(&mut self, target: TargetId, hook: CloseHook) -> Option<HookId>;

    /// Unregister a close hook; unknown ids are ignored
    fn remove_close_hook(&mut self, target: TargetId, hook: HookId);

    /// Drop a closed window and hand back its pending hooks
    fn close(&mut self, target: TargetId) -> Vec<CloseHook>;
}

#[cfg(test)]
pub mod mock {
    //! In-memory registry for tests

    use super::*;

    #[derive(Debug, Default)]
    pub struct MockWindow {
        pub id: TargetId,
        pub tab: TabId,
        pub title: String,
        pub indicator: bool,
        pub app_cursor: bool,
        pub written: Vec<Vec<u8>>,
        pub hooks: Vec<(HookId, CloseHook)>,
    }

    #[derive(Debug, Default)]
    pub struct MockRegistry {
        pub tabs: Vec<(TabId, String)>,
        pub windows: Vec<MockWindow>,
        pub active: Option<TargetId>,
        next_hook: u64,
    }

    impl MockRegistry {
        /// One tab per entry, each with the given window titles. Window ids
        /// count from 1 across tabs; the first window is active.
        pub fn with_tabs(layout: &[(&str, &[&str])]) -> Self {
            let mut reg = MockRegistry::default();
            let mut next_window = 1;
            for (i, (tab_title, windows)) in layout.iter().enumerate() {
                let tab = i as TabId + 1;
                reg.tabs.push((tab, tab_title.to_string()));
                for title in windows.iter() {
                    reg.windows.push(MockWindow {
                        id: next_window,
                        tab,
                        title: title.to_string(),
                        ..Default::default()
                    });
                    next_window += 1;
                }
            }
            reg.active = reg.windows.first().map(|w| w.id);
            reg
        }

        pub fn window(&self, id: TargetId) -> &MockWindow {
            self.windows.iter().find(|w| w.id == id).expect("no such window")
        }

        fn window_mut(&mut self, id: TargetId) -> Option<&mut MockWindow> {
            self.windows.iter_mut().find(|w| w.id == id)
        }

        pub fn indicator(&self, id: TargetId) -> bool {
            self.window(id).indicator
        }

        pub fn written(&self, id: TargetId) -> Vec<u8> {
            self.window(id).written.concat()
        }

        pub fn total_writes(&self) -> usize {
            self.windows.iter().map(|w| w.written.len()).sum()
        }
    }

    impl TargetRegistry for MockRegistry {
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
                .filter(|(i, (id, title))| query.matches(*id, *i, title))
                .map(|(_, (id, _))| *id)
                .collect()
        }

        fn tab_members(&self, tab: TabId) -> Vec<TargetId> {
            self.windows.iter().filter(|w| w.tab == tab).map(|w| w.id).collect()
        }

        fn active_target(&self) -> Option<TargetId> {
            self.active
        }

        fn all_targets(&self) -> Vec<TargetId> {
            self.windows.iter().map(|w| w.id).collect()
        }

        fn contains(&self, target: TargetId) -> bool {
            self.windows.iter().any(|w| w.id == target)
        }

        fn write(&mut self, target: TargetId, data: &[u8]) -> anyhow::Result<()> {
            let window = self
                .window_mut(target)
                .ok_or_else(|| anyhow::anyhow!("Window {} not found", target))?;
            window.written.push(data.to_vec());
            Ok(())
        }

        fn encode_key(&self, target: TargetId, key: &KeyEvent) -> Vec<u8> {
            let app_cursor = self.windows.iter().any(|w| w.id == target && w.app_cursor);
            key.encode(app_cursor)
        }

        fn set_indicator(&mut self, target: TargetId, on: bool) {
            if let Some(window) = self.window_mut(target) {
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
            if self.active == Some(target) {
                self.active = self.windows.first().map(|w| w.id);
            }
            window.hooks.into_iter().map(|(_, hook)| hook).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parse() {
        assert_eq!(Query::parse("id:3"), Some(Query::Id(3)));
        assert_eq!(Query::parse("index:0"), Some(Query::Index(0)));
        assert_eq!(Query::parse("title:vim"), Some(Query::Title("vim".to_string())));
        assert_eq!(Query::parse("all"), Some(Query::All));
        assert_eq!(Query::parse("logs"), Some(Query::Title("logs".to_string())));
        assert_eq!(Query::parse("id:x"), None);
        assert_eq!(Query::parse("  "), None);
    }

    #[test]
    fn test_query_matches() {
        assert!(Query::Title("bui".to_string()).matches(1, 0, "build"));
        assert!(!Query::Id(2).matches(1, 0, "build"));
        assert!(Query::Index(1).matches(9, 1, ""));
    }

    #[test]
    fn test_mock_hooks_fire_on_close() {
        use mock::MockRegistry;
        let mut reg = MockRegistry::with_tabs(&[("main", &["a", "b"])]);
        let keep = reg.add_close_hook(1, CloseHook::EndSession("s1".to_string())).unwrap();
        let gone = reg.add_close_hook(1, CloseHook::EndSession("s2".to_string())).unwrap();
        reg.remove_close_hook(1, gone);
        assert_ne!(keep, gone);
        assert_eq!(reg.close(1), vec![CloseHook::EndSession("s1".to_string())]);
        assert_eq!(reg.active_target(), Some(2));
        assert!(reg.add_close_hook(1, CloseHook::EndSession("s3".to_string())).is_none());
    }
}

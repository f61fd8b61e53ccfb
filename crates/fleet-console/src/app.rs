use crate::loader::LoadMode;
use crate::notice::NoticeQueue;
use crate::page::{PageSettings, PageWake, ServersPage};
use crate::poll::{View, ViewTracker};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fleet_core::{ControlPlane, ServerCommand};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

/// Host for the console views. Owns the Servers page only while that view
/// is showing.
pub struct App {
    plane: Arc<dyn ControlPlane>,
    notices: NoticeQueue,
    tracker: ViewTracker,
    settings: PageSettings,
    page: Option<ServersPage>,
    input: InputMode,
    search: String,
    quit: bool,
    dirty: bool,
    seen_revision: u64,
    pub status_note: Option<String>,
}

impl App {
    pub fn new(plane: Arc<dyn ControlPlane>, settings: PageSettings) -> Self {
        let mut app = Self {
            plane,
            notices: NoticeQueue::default(),
            tracker: ViewTracker::new(View::Servers),
            settings,
            page: None,
            input: InputMode::Normal,
            search: String::new(),
            quit: false,
            dirty: true,
            seen_revision: 0,
            status_note: None,
        };
        app.activate_servers();
        app
    }

    fn activate_servers(&mut self) {
        let page = ServersPage::activate(
            Arc::clone(&self.plane),
            Arc::new(self.notices.clone()),
            self.settings,
            self.tracker.liveness_for(View::Servers),
        );
        self.page = Some(page);
        self.search.clear();
        self.input = InputMode::Normal;
    }

    pub fn view(&self) -> View {
        self.tracker.current()
    }

    pub fn page(&self) -> Option<&ServersPage> {
        self.page.as_ref()
    }

    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    pub fn input_mode(&self) -> InputMode {
        self.input
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn switch_view(&mut self, view: View) {
        let current = self.view();
        if current == view {
            return;
        }
        info!(event = "view_switched", from = current.title(), to = view.title());
        self.tracker.set(view);
        if current == View::Servers {
            if let Some(mut page) = self.page.take() {
                page.deactivate();
            }
        }
        if view == View::Servers {
            self.activate_servers();
        }
        self.dirty = true;
    }

    /// Waits for work from the active page; pending when no page is live.
    pub async fn next_wake(&mut self) -> PageWake {
        match self.page.as_mut() {
            Some(page) => page.next_wake().await,
            None => std::future::pending().await,
        }
    }

    pub fn handle_wake(&mut self, wake: PageWake) {
        if let Some(page) = self.page.as_mut() {
            page.handle_wake(wake);
        }
    }

    /// Another tool rewrote the configured-servers file.
    pub fn on_config_changed(&mut self) {
        if let Some(page) = self.page.as_mut() {
            info!(event = "config_changed_reload");
            page.load(LoadMode::Silent);
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True when something visible changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        let mut redraw = std::mem::take(&mut self.dirty);
        if let Some(page) = self.page.as_mut() {
            redraw |= page.take_dirty();
        }
        let revision = self.notices.revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            redraw = true;
        }
        redraw
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        if self.notices.pending_error().is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                self.notices.dismiss_error();
                self.dirty = true;
            }
            return;
        }
        if let Some(page) = self.page.as_mut() {
            if page.logs().is_some() {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
                    page.close_logs();
                }
                return;
            }
        }
        match self.input {
            InputMode::Search => self.handle_search_key(key),
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.search.clear();
                self.input = InputMode::Normal;
            }
            KeyCode::Enter => self.input = InputMode::Normal,
            KeyCode::Backspace => {
                self.search.pop();
            }
            KeyCode::Char(ch) => self.search.push(ch),
            _ => return,
        }
        if let Some(page) = self.page.as_mut() {
            page.set_query(&self.search);
        }
        self.dirty = true;
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Tab | KeyCode::Char('?') => {
                let next = self.view().next();
                self.switch_view(next);
            }
            _ => {
                if self.view() == View::Servers {
                    self.handle_servers_key(key);
                }
            }
        }
    }

    fn handle_servers_key(&mut self, key: KeyEvent) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => page.select_next(),
            KeyCode::Up | KeyCode::Char('k') => page.select_prev(),
            KeyCode::Char('s') => {
                page.execute_selected(ServerCommand::Start);
            }
            KeyCode::Char('x') => {
                page.execute_selected(ServerCommand::Stop);
            }
            KeyCode::Char('R') => {
                page.execute_selected(ServerCommand::Restart);
            }
            KeyCode::Char('d') => {
                page.debug_selected();
            }
            KeyCode::Char('r') => page.load(LoadMode::Full),
            KeyCode::Char('f') => {
                let filter = page.cycle_status_filter();
                self.status_note = Some(format!("filter: {}", filter.label()));
                self.dirty = true;
            }
            KeyCode::Char('/') => {
                self.input = InputMode::Search;
                self.dirty = true;
            }
            KeyCode::Esc => {
                if !self.search.is_empty() {
                    self.search.clear();
                    page.set_query("");
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{configured, process, FakePlane};
    use fleet_core::ServerStatus;
    use std::time::Duration;

    const SETTINGS: PageSettings = PageSettings {
        poll_interval: Duration::from_millis(2000),
        request_timeout: Duration::from_secs(30),
        log_lines: 50,
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn drain(app: &mut App) {
        while app.page().map(|page| page.in_flight()).unwrap_or(0) > 0 {
            let wake = app.next_wake().await;
            app.handle_wake(wake);
        }
    }

    fn running_plane() -> Arc<FakePlane> {
        Arc::new(FakePlane::new(
            vec![
                process("p1", ServerStatus::Running),
                process("p2", ServerStatus::Exited),
            ],
            vec![configured("p1"), configured("p2")],
        ))
    }

    #[tokio::test]
    async fn leaving_the_view_discards_the_page() {
        let plane = running_plane();
        let mut app = App::new(plane.clone(), SETTINGS);
        drain(&mut app).await;
        assert!(app.page().unwrap().is_polling());

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.view(), View::Help);
        assert!(app.page().is_none());

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.view(), View::Servers);
        let page = app.page().unwrap();
        assert!(page.cache().is_empty());
        assert!(page.board().is_loading());
        drain(&mut app).await;
        assert_eq!(app.page().unwrap().cache().len(), 2);
    }

    #[tokio::test]
    async fn keys_dispatch_commands_for_the_selection() {
        let plane = running_plane();
        let mut app = App::new(plane.clone(), SETTINGS);
        drain(&mut app).await;

        app.handle_key(key(KeyCode::Char('s')));
        assert!(plane.commands().is_empty());
        app.handle_key(key(KeyCode::Char('x')));
        drain(&mut app).await;
        app.handle_key(key(KeyCode::Char('j')));
        app.handle_key(key(KeyCode::Char('s')));
        drain(&mut app).await;
        assert_eq!(
            plane.commands(),
            vec![
                (ServerCommand::Stop, "p1".to_string()),
                (ServerCommand::Start, "p2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn error_modal_swallows_keys_until_dismissed() {
        let plane = running_plane();
        plane.fail_commands("permission denied");
        let mut app = App::new(plane.clone(), SETTINGS);
        drain(&mut app).await;

        app.handle_key(key(KeyCode::Char('x')));
        drain(&mut app).await;
        assert!(app.take_redraw());
        assert!(app.notices().pending_error().is_some());

        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit());
        app.handle_key(key(KeyCode::Esc));
        assert!(app.notices().pending_error().is_none());
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit());
    }

    #[tokio::test]
    async fn search_mode_edits_the_query() {
        let plane = running_plane();
        let mut app = App::new(plane, SETTINGS);
        drain(&mut app).await;

        app.handle_key(key(KeyCode::Char('/')));
        assert_eq!(app.input_mode(), InputMode::Search);
        for ch in "p2".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.search(), "p2");
        let visible: Vec<&str> = app
            .page()
            .unwrap()
            .board()
            .visible_cards()
            .map(|card| card.server_id.as_str())
            .collect();
        assert_eq!(visible, vec!["p2"]);

        app.handle_key(key(KeyCode::Esc));
        assert!(app.search().is_empty());
        assert_eq!(app.page().unwrap().board().visible_cards().count(), 2);
    }

    #[tokio::test]
    async fn config_change_reloads_silently() {
        let plane = running_plane();
        let mut app = App::new(plane.clone(), SETTINGS);
        drain(&mut app).await;
        let calls = plane.list_calls();

        plane.set_processes(vec![process("p1", ServerStatus::Running)]);
        app.on_config_changed();
        assert!(!app.page().unwrap().board().is_loading());
        drain(&mut app).await;
        assert_eq!(plane.list_calls(), calls + 1);
        assert_eq!(app.page().unwrap().cache().len(), 1);
    }
}

use crate::board::{Board, ButtonKind, ServerCard};
use crate::filter::{apply_filters, FilterState, StatusFilter};
use crate::loader::{fetch_collection, LoadMode};
use crate::notice::Reporter;
use crate::poll::{Liveness, PollSession, TickOutcome};
use crate::scope::{with_deadline, ActivationScope};
use fleet_core::{find_matching, ControlError, ControlPlane, ManagedServer, ServerCommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PageSettings {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_lines: usize,
}

#[derive(Debug)]
pub enum CommandOutcome {
    Failed(ControlError),
    /// The lifecycle call succeeded; carries the follow-up silent fetch.
    Done {
        refreshed: Result<Vec<ManagedServer>, ControlError>,
    },
}

/// Results handed back from the activation scope to the select loop.
#[derive(Debug)]
pub enum PageEvent {
    Loaded {
        mode: LoadMode,
        result: Result<Vec<ManagedServer>, ControlError>,
    },
    Polled {
        epoch: u64,
        result: Result<Vec<ManagedServer>, ControlError>,
    },
    CommandFinished {
        command: ServerCommand,
        server_id: String,
        outcome: CommandOutcome,
    },
    LogsFetched {
        server_id: String,
        name: String,
        result: Result<String, ControlError>,
    },
}

#[derive(Debug)]
pub enum PageWake {
    Tick,
    Event(PageEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogView {
    pub server_id: String,
    pub name: String,
    pub text: String,
}

/// One activation of the Servers view: cache, rendered board, poll session
/// and the scope owning every remote call issued on its behalf.
pub struct ServersPage {
    cache: Vec<ManagedServer>,
    board: Board,
    poll: PollSession,
    scope: ActivationScope<PageEvent>,
    filter: FilterState,
    selected: usize,
    reporter: Arc<dyn Reporter>,
    log_lines: usize,
    logs: Option<LogView>,
    // Bumped whenever a load replaces the cache; polls issued against an
    // older cache are dropped.
    epoch: u64,
    // Full loads still outstanding; the skeleton stays up until all land.
    full_loads: usize,
}

impl ServersPage {
    pub fn new(
        plane: Arc<dyn ControlPlane>,
        reporter: Arc<dyn Reporter>,
        settings: PageSettings,
        liveness: Liveness,
    ) -> Self {
        Self {
            cache: Vec::new(),
            board: Board::default(),
            poll: PollSession::new(settings.poll_interval, liveness),
            scope: ActivationScope::new(plane, settings.request_timeout),
            filter: FilterState::default(),
            selected: 0,
            reporter,
            log_lines: settings.log_lines,
            logs: None,
            epoch: 0,
            full_loads: 0,
        }
    }

    /// Creates the page and kicks off its initial full load.
    pub fn activate(
        plane: Arc<dyn ControlPlane>,
        reporter: Arc<dyn Reporter>,
        settings: PageSettings,
        liveness: Liveness,
    ) -> Self {
        let mut page = Self::new(plane, reporter, settings, liveness);
        info!(event = "servers_view_activated");
        page.load(LoadMode::Full);
        page
    }

    /// Stops polling and aborts every in-flight call of this activation.
    pub fn deactivate(&mut self) {
        self.poll.stop();
        self.scope.cancel();
        self.cache.clear();
        self.logs = None;
        info!(event = "servers_view_deactivated");
    }

    pub fn cache(&self) -> &[ManagedServer] {
        &self.cache
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn logs(&self) -> Option<&LogView> {
        self.logs.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_active()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll.period()
    }

    pub fn in_flight(&self) -> usize {
        self.scope.in_flight()
    }

    /// Whether the host view is still showing this page.
    pub fn is_live(&self) -> bool {
        self.poll.is_live()
    }

    pub fn take_dirty(&mut self) -> bool {
        self.board.take_dirty()
    }

    pub fn load(&mut self, mode: LoadMode) {
        if mode == LoadMode::Full {
            self.full_loads += 1;
            self.board.set_loading(true);
        }
        let plane = self.scope.plane();
        let deadline = self.scope.deadline();
        debug!(event = "collection_load_started", mode = mode.as_str());
        self.scope.spawn(async move {
            let result = with_deadline(deadline, fetch_collection(plane.as_ref())).await;
            PageEvent::Loaded { mode, result }
        });
    }

    fn apply_load(&mut self, mode: LoadMode, result: Result<Vec<ManagedServer>, ControlError>) {
        match result {
            Ok(servers) => {
                info!(
                    event = "collection_loaded",
                    mode = mode.as_str(),
                    servers = servers.len()
                );
                self.replace_cache(servers);
            }
            Err(err) if mode == LoadMode::Full => {
                warn!(event = "collection_load_failed", mode = mode.as_str(), error = %err);
                self.replace_cache(Vec::new());
            }
            Err(err) => {
                warn!(event = "collection_load_failed", mode = mode.as_str(), error = %err);
            }
        }
        if mode == LoadMode::Full {
            self.full_loads = self.full_loads.saturating_sub(1);
            if self.full_loads == 0 {
                self.board.set_loading(false);
            }
        }
        if self.cache.is_empty() {
            self.poll.stop();
        } else {
            self.poll.start();
        }
    }

    fn replace_cache(&mut self, servers: Vec<ManagedServer>) {
        self.cache = servers;
        self.epoch = self.epoch.wrapping_add(1);
        self.board.render_full(&self.cache);
        apply_filters(&mut self.board, &self.filter);
        self.clamp_selection();
    }

    pub fn handle_tick(&mut self) {
        match self.poll.on_tick() {
            TickOutcome::Stopped => debug!(event = "poll_stopped", reason = "view_inactive"),
            TickOutcome::Skipped => debug!(event = "poll_skipped", reason = "refresh_in_flight"),
            TickOutcome::Fetch => {
                let plane = self.scope.plane();
                let deadline = self.scope.deadline();
                let epoch = self.epoch;
                self.scope.spawn(async move {
                    let result = with_deadline(deadline, plane.list_processes()).await;
                    PageEvent::Polled { epoch, result }
                });
            }
        }
    }

    fn apply_poll(&mut self, epoch: u64, result: Result<Vec<ManagedServer>, ControlError>) {
        self.poll.finish();
        if !self.poll.is_live() {
            self.poll.stop();
            return;
        }
        if epoch != self.epoch {
            debug!(event = "poll_discarded", reason = "stale_epoch");
            return;
        }
        let fresh = match result {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(event = "poll_failed", error = %err);
                return;
            }
        };
        for entry in self.cache.iter_mut() {
            let Some(observed) = find_matching(&fresh, &entry.id) else {
                continue;
            };
            entry.absorb_observed(observed);
            self.board.reconcile(&entry.id, entry);
        }
        if self.board.take_dirty() {
            apply_filters(&mut self.board, &self.filter);
            self.clamp_selection();
            self.board.mark_dirty();
        }
    }

    /// Dispatches a lifecycle command for `server_id`. Returns false when the
    /// matching button is missing or already busy.
    pub fn execute(&mut self, command: ServerCommand, server_id: &str) -> bool {
        if !self.board.begin_command(server_id, command) {
            debug!(event = "command_ignored", command = command.as_str(), server_id);
            return false;
        }
        info!(event = "command_dispatched", command = command.as_str(), server_id);
        let plane = self.scope.plane();
        let deadline = self.scope.deadline();
        let server_id = server_id.to_string();
        self.scope.spawn(async move {
            let outcome = match with_deadline(deadline, plane.run_command(command, &server_id)).await {
                Ok(()) => CommandOutcome::Done {
                    refreshed: with_deadline(deadline, fetch_collection(plane.as_ref())).await,
                },
                Err(err) => CommandOutcome::Failed(err),
            };
            PageEvent::CommandFinished {
                command,
                server_id,
                outcome,
            }
        });
        true
    }

    fn finish_command(&mut self, command: ServerCommand, server_id: String, outcome: CommandOutcome) {
        let name = self
            .board
            .card(&server_id)
            .map(|card| card.name.clone())
            .unwrap_or_else(|| server_id.clone());
        // Released before the follow-up render so the card gets its fresh buttons.
        self.board.end_command(&server_id, command);
        match outcome {
            CommandOutcome::Failed(err) => {
                error!(
                    event = "command_failed",
                    command = command.as_str(),
                    server_id = %server_id,
                    error = %err
                );
                self.reporter.report_error(
                    &command.failure_title(),
                    &command.failure_message(&name, &err.to_string()),
                );
            }
            CommandOutcome::Done { refreshed } => {
                info!(event = "command_succeeded", command = command.as_str(), server_id = %server_id);
                self.apply_load(LoadMode::Silent, refreshed);
                self.reporter.report_success(command.success_title(), &name);
            }
        }
    }

    /// Fetches the tail of a server's logs for the log overlay.
    pub fn debug(&mut self, server_id: &str) -> bool {
        let Some(card) = self.board.card(server_id) else {
            return false;
        };
        let name = card.name.clone();
        let plane = self.scope.plane();
        let deadline = self.scope.deadline();
        let max_lines = self.log_lines;
        let server_id = server_id.to_string();
        debug!(event = "logs_requested", server_id = %server_id, max_lines);
        self.scope.spawn(async move {
            let result = with_deadline(deadline, plane.get_logs(&server_id, max_lines)).await;
            PageEvent::LogsFetched {
                server_id,
                name,
                result,
            }
        });
        true
    }

    fn apply_logs(&mut self, server_id: String, name: String, result: Result<String, ControlError>) {
        match result {
            Ok(text) => {
                self.logs = Some(LogView {
                    server_id,
                    name,
                    text,
                });
                self.board.mark_dirty();
            }
            Err(err) => {
                warn!(event = "logs_failed", server_id = %server_id, error = %err);
                self.reporter.report_error(
                    "Debug Server Failed",
                    &format!("Failed to get container logs: {err}"),
                );
            }
        }
    }

    pub fn close_logs(&mut self) -> bool {
        if self.logs.take().is_some() {
            self.board.mark_dirty();
            return true;
        }
        false
    }

    /// Waits for the next poll tick or finished remote call.
    pub async fn next_wake(&mut self) -> PageWake {
        tokio::select! {
            _ = self.poll.next_tick() => PageWake::Tick,
            event = self.scope.next_event() => PageWake::Event(event),
        }
    }

    pub fn handle_wake(&mut self, wake: PageWake) {
        match wake {
            PageWake::Tick => self.handle_tick(),
            PageWake::Event(event) => self.handle_event(event),
        }
    }

    pub fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Loaded { mode, result } => self.apply_load(mode, result),
            PageEvent::Polled { epoch, result } => self.apply_poll(epoch, result),
            PageEvent::CommandFinished {
                command,
                server_id,
                outcome,
            } => self.finish_command(command, server_id, outcome),
            PageEvent::LogsFetched {
                server_id,
                name,
                result,
            } => self.apply_logs(server_id, name, result),
        }
    }

    pub fn cycle_status_filter(&mut self) -> StatusFilter {
        self.filter.status = self.filter.status.next();
        self.refilter();
        self.filter.status
    }

    pub fn set_query(&mut self, query: &str) {
        if self.filter.query == query {
            return;
        }
        self.filter.query = query.to_string();
        self.refilter();
    }

    fn refilter(&mut self) {
        apply_filters(&mut self.board, &self.filter);
        self.clamp_selection();
        self.board.mark_dirty();
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_card(&self) -> Option<&ServerCard> {
        self.board.visible_cards().nth(self.selected)
    }

    pub fn select_next(&mut self) {
        let visible = self.board.visible_cards().count();
        if visible > 0 && self.selected + 1 < visible {
            self.selected += 1;
            self.board.mark_dirty();
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.board.mark_dirty();
        }
    }

    fn clamp_selection(&mut self) {
        let visible = self.board.visible_cards().count();
        self.selected = self.selected.min(visible.saturating_sub(1));
    }

    /// Runs `command` against the selected card, if it offers that action.
    pub fn execute_selected(&mut self, command: ServerCommand) -> bool {
        let Some(server_id) = self.selected_with(ButtonKind::for_command(command)) else {
            return false;
        };
        self.execute(command, &server_id)
    }

    pub fn debug_selected(&mut self) -> bool {
        let Some(card) = self.selected_card() else {
            return false;
        };
        let server_id = card.server_id.clone();
        self.debug(&server_id)
    }

    fn selected_with(&self, kind: ButtonKind) -> Option<String> {
        let card = self.selected_card()?;
        card.button(kind)?;
        Some(card.server_id.clone())
    }
}

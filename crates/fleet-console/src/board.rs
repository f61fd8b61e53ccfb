//! Retained view model for the servers list.
//!
//! The terminal is redrawn only when the board reports itself dirty, so every
//! write below goes through a compare-then-set helper: rewriting a field with
//! the value it already shows is a wasted frame.

use crate::theme::{status_palette, StatusPalette};
use fleet_core::{ManagedServer, ServerCommand, ServerStatus};
use ratatui::style::{Color, Style};

const MISSING: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    Start,
    Stop,
    Restart,
    Debug,
}

impl ButtonKind {
    pub fn label(self) -> &'static str {
        match self {
            ButtonKind::Start => "Start",
            ButtonKind::Stop => "Stop",
            ButtonKind::Restart => "Restart",
            ButtonKind::Debug => "Debug",
        }
    }

    pub fn for_command(command: ServerCommand) -> Self {
        match command {
            ServerCommand::Start => ButtonKind::Start,
            ServerCommand::Stop => ButtonKind::Stop,
            ServerCommand::Restart => ButtonKind::Restart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub kind: ButtonKind,
    pub label: String,
    pub loading: bool,
    pub highlight: bool,
}

impl ActionButton {
    fn idle(kind: ButtonKind) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            loading: false,
            highlight: true,
        }
    }
}

/// Which buttons a card needs for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonSet {
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
    pub debug: bool,
}

impl ButtonSet {
    pub fn required_for(status: &ServerStatus) -> Self {
        match status {
            ServerStatus::Running => Self {
                stop: true,
                restart: true,
                ..Self::default()
            },
            status if status.is_halted() => Self {
                start: true,
                ..Self::default()
            },
            ServerStatus::Restarting => Self {
                stop: true,
                debug: true,
                ..Self::default()
            },
            _ => Self {
                debug: true,
                ..Self::default()
            },
        }
    }

    pub fn present(buttons: &[ActionButton]) -> Self {
        let mut set = Self::default();
        for button in buttons {
            match button.kind {
                ButtonKind::Start => set.start = true,
                ButtonKind::Stop => set.stop = true,
                ButtonKind::Restart => set.restart = true,
                ButtonKind::Debug => set.debug = true,
            }
        }
        set
    }

    pub fn buttons(self) -> Vec<ActionButton> {
        let mut buttons = Vec::new();
        if self.start {
            buttons.push(ActionButton::idle(ButtonKind::Start));
        }
        if self.stop {
            buttons.push(ActionButton::idle(ButtonKind::Stop));
        }
        if self.restart {
            buttons.push(ActionButton::idle(ButtonKind::Restart));
        }
        if self.debug {
            buttons.push(ActionButton::idle(ButtonKind::Debug));
        }
        buttons
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerCard {
    pub server_id: String,
    pub name: String,
    pub status_text: String,
    pub badge_text: String,
    pub badge_style: Style,
    pub icon_bg: Color,
    pub icon_fg: Color,
    pub version: String,
    pub port: String,
    pub uptime: String,
    pub cpu: String,
    pub memory: String,
    pub buttons: Vec<ActionButton>,
    pub visible: bool,
}

impl ServerCard {
    fn render(server: &ManagedServer) -> Self {
        let palette = status_palette(&server.status);
        let status_text = status_text(server);
        Self {
            server_id: server.id.clone(),
            name: server.shown_name().to_string(),
            badge_text: status_text.to_uppercase(),
            status_text,
            badge_style: palette.badge,
            icon_bg: palette.background,
            icon_fg: palette.foreground,
            version: server.version.clone(),
            port: server.port.to_string(),
            uptime: server.uptime.clone(),
            cpu: or_missing(&server.cpu).to_string(),
            memory: or_missing(&server.memory).to_string(),
            buttons: ButtonSet::required_for(&server.status).buttons(),
            visible: true,
        }
    }

    pub fn button(&self, kind: ButtonKind) -> Option<&ActionButton> {
        self.buttons.iter().find(|button| button.kind == kind)
    }

    pub fn has_loading_button(&self) -> bool {
        self.buttons.iter().any(|button| button.loading)
    }
}

fn status_text(server: &ManagedServer) -> String {
    server.status.as_str().to_string()
}

fn or_missing(value: &str) -> &str {
    if value.trim().is_empty() {
        MISSING
    } else {
        value
    }
}

fn set_text(slot: &mut String, value: &str, mutations: &mut u64) -> bool {
    if slot == value {
        return false;
    }
    slot.clear();
    slot.push_str(value);
    *mutations += 1;
    true
}

fn set_value<T: PartialEq>(slot: &mut T, value: T, mutations: &mut u64) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    *mutations += 1;
    true
}

#[derive(Debug, Default)]
pub struct Board {
    cards: Vec<ServerCard>,
    loading: bool,
    mutations: u64,
    dirty: bool,
}

impl Board {
    pub fn cards(&self) -> &[ServerCard] {
        &self.cards
    }

    pub fn visible_cards(&self) -> impl Iterator<Item = &ServerCard> {
        self.cards.iter().filter(|card| card.visible)
    }

    pub fn card(&self, server_id: &str) -> Option<&ServerCard> {
        self.cards.iter().find(|card| card.server_id == server_id)
    }

    fn card_mut(&mut self, server_id: &str) -> Option<&mut ServerCard> {
        self.cards.iter_mut().find(|card| card.server_id == server_id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Count of view writes since the board was created.
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn set_loading(&mut self, loading: bool) {
        if set_value(&mut self.loading, loading, &mut self.mutations) {
            self.dirty = true;
        }
    }

    /// Replaces every card. Used after a full or silent load. A card that
    /// still exists keeps its button group while a command on it is in
    /// flight, so the busy button stays locked until `end_command`.
    pub fn render_full(&mut self, servers: &[ManagedServer]) {
        let previous = std::mem::take(&mut self.cards);
        self.cards = servers
            .iter()
            .map(|server| {
                let mut card = ServerCard::render(server);
                if let Some(busy) = previous
                    .iter()
                    .find(|old| old.server_id == card.server_id && old.has_loading_button())
                {
                    card.buttons = busy.buttons.clone();
                }
                card
            })
            .collect();
        self.mutations += 1;
        self.dirty = true;
    }

    /// Patches the card rendered for `server_id` with `fresh`, touching only
    /// the fields whose displayed text differs. Unknown ids are ignored.
    pub fn reconcile(&mut self, server_id: &str, fresh: &ManagedServer) {
        let before = self.mutations;
        let Some(index) = self
            .cards
            .iter()
            .position(|card| card.server_id == server_id)
        else {
            return;
        };
        let mutations = &mut self.mutations;
        let card = &mut self.cards[index];

        set_text(&mut card.name, fresh.shown_name(), mutations);

        let status = status_text(fresh);
        let palette: StatusPalette = status_palette(&fresh.status);
        if set_text(&mut card.status_text, &status, mutations) {
            set_text(&mut card.badge_text, &status.to_uppercase(), mutations);
        }
        set_value(&mut card.badge_style, palette.badge, mutations);
        set_value(&mut card.icon_bg, palette.background, mutations);
        set_value(&mut card.icon_fg, palette.foreground, mutations);

        set_text(&mut card.version, &fresh.version, mutations);
        set_text(&mut card.port, &fresh.port.to_string(), mutations);
        set_text(&mut card.uptime, &fresh.uptime, mutations);
        set_text(&mut card.cpu, or_missing(&fresh.cpu), mutations);
        set_text(&mut card.memory, or_missing(&fresh.memory), mutations);

        // A button mid-command is left alone; the command's own refresh
        // re-renders the group.
        let required = ButtonSet::required_for(&fresh.status);
        if !card.has_loading_button() && ButtonSet::present(&card.buttons) != required {
            card.buttons = required.buttons();
            *mutations += 1;
        }

        if self.mutations != before {
            self.dirty = true;
        }
    }

    /// Puts the button for `command` into its loading state. Returns false
    /// when the card or button is missing or the button is already busy.
    pub fn begin_command(&mut self, server_id: &str, command: ServerCommand) -> bool {
        let kind = ButtonKind::for_command(command);
        let Some(card) = self.card_mut(server_id) else {
            return false;
        };
        let Some(button) = card.buttons.iter_mut().find(|button| button.kind == kind) else {
            return false;
        };
        if button.loading {
            return false;
        }
        button.loading = true;
        button.highlight = false;
        button.label = command.progress_label().to_string();
        self.mutations += 1;
        self.dirty = true;
        true
    }

    /// Restores the idle label of a button left loading by `command`.
    pub fn end_command(&mut self, server_id: &str, command: ServerCommand) {
        let kind = ButtonKind::for_command(command);
        let Some(card) = self.card_mut(server_id) else {
            return;
        };
        let Some(button) = card
            .buttons
            .iter_mut()
            .find(|button| button.kind == kind && button.loading)
        else {
            return;
        };
        button.loading = false;
        button.highlight = true;
        button.label = command.label().to_string();
        self.mutations += 1;
        self.dirty = true;
    }

    pub(crate) fn set_visible(&mut self, index: usize, visible: bool) {
        if let Some(card) = self.cards.get_mut(index) {
            if set_value(&mut card.visible, visible, &mut self.mutations) {
                self.dirty = true;
            }
        }
    }
}

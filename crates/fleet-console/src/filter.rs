use crate::board::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Running,
    Stopped,
    Exited,
    Created,
    Restarting,
    Error,
}

impl StatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Running => "running",
            StatusFilter::Stopped => "stopped",
            StatusFilter::Exited => "exited",
            StatusFilter::Created => "created",
            StatusFilter::Restarting => "restarting",
            StatusFilter::Error => "error",
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Running,
            StatusFilter::Running => StatusFilter::Stopped,
            StatusFilter::Stopped => StatusFilter::Exited,
            StatusFilter::Exited => StatusFilter::Created,
            StatusFilter::Created => StatusFilter::Restarting,
            StatusFilter::Restarting => StatusFilter::Error,
            StatusFilter::Error => StatusFilter::All,
        }
    }

    fn matches(self, badge_text: &str) -> bool {
        match self {
            StatusFilter::All => true,
            other => badge_text.to_lowercase().contains(other.label()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub status: StatusFilter,
    pub query: String,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        self.status != StatusFilter::All || !self.query.trim().is_empty()
    }
}

/// Shows or hides rendered cards. Reads only what is on the board; the cache
/// is never consulted. Returns the number of visible cards.
pub fn apply_filters(board: &mut Board, filter: &FilterState) -> usize {
    let query = filter.query.trim().to_lowercase();
    let decisions: Vec<bool> = board
        .cards()
        .iter()
        .map(|card| {
            let matches_search = query.is_empty() || card.name.to_lowercase().contains(&query);
            matches_search && filter.status.matches(&card.badge_text)
        })
        .collect();
    for (index, visible) in decisions.iter().enumerate() {
        board.set_visible(index, *visible);
    }
    decisions.into_iter().filter(|visible| *visible).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{ManagedServer, ServerStatus};

    fn board() -> Board {
        let servers = [
            ("p1", "File System", ServerStatus::Running),
            ("p2", "Database Connector", ServerStatus::Running),
            ("p3", "Web Scraper", ServerStatus::Exited),
            ("p4", "Email Handler", ServerStatus::Error),
        ]
        .into_iter()
        .map(|(id, name, status)| ManagedServer {
            id: id.to_string(),
            name: name.to_string(),
            status,
            ..Default::default()
        })
        .collect::<Vec<_>>();
        let mut board = Board::default();
        board.render_full(&servers);
        board
    }

    fn visible_ids(board: &Board) -> Vec<&str> {
        board
            .visible_cards()
            .map(|card| card.server_id.as_str())
            .collect()
    }

    #[test]
    fn status_filter_hides_other_statuses() {
        let mut board = board();
        let filter = FilterState {
            status: StatusFilter::Running,
            query: String::new(),
        };
        assert_eq!(apply_filters(&mut board, &filter), 2);
        assert_eq!(visible_ids(&board), vec!["p1", "p2"]);
    }

    #[test]
    fn search_is_case_insensitive_and_combines_with_status() {
        let mut board = board();
        let filter = FilterState {
            status: StatusFilter::All,
            query: "SCRAPER".to_string(),
        };
        assert_eq!(apply_filters(&mut board, &filter), 1);
        assert_eq!(visible_ids(&board), vec!["p3"]);

        let filter = FilterState {
            status: StatusFilter::Running,
            query: "scraper".to_string(),
        };
        assert_eq!(apply_filters(&mut board, &filter), 0);
    }

    #[test]
    fn applying_same_filter_twice_is_idempotent() {
        let mut board = board();
        let filter = FilterState {
            status: StatusFilter::Error,
            query: String::new(),
        };
        apply_filters(&mut board, &filter);
        let mutations = board.mutations();
        board.take_dirty();
        apply_filters(&mut board, &filter);
        assert_eq!(board.mutations(), mutations);
        assert!(!board.take_dirty());
        assert_eq!(visible_ids(&board), vec!["p4"]);
    }

    #[test]
    fn reset_filter_shows_everything() {
        let mut board = board();
        apply_filters(
            &mut board,
            &FilterState {
                status: StatusFilter::Exited,
                query: String::new(),
            },
        );
        assert_eq!(apply_filters(&mut board, &FilterState::default()), 4);
    }

    #[test]
    fn filter_cycle_returns_to_all() {
        let mut filter = StatusFilter::All;
        for _ in 0..7 {
            filter = filter.next();
        }
        assert_eq!(filter, StatusFilter::All);
    }
}

//! Scroll anchoring for a list viewport with a "home" edge.
//!
//! Keeps the view pinned to home while new content arrives and the user has
//! not navigated away, without ever fighting an explicit scroll. Pure state
//! machine: callers feed it geometry measurements, item counts and the
//! user-content-expand signal, and act on the returned decision.

/// Which edge the view wants to rest on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeEdge {
    Top,
    Bottom,
}

/// A point-in-time measurement of the scrollable container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl Geometry {
    /// Distance from the home edge in the container's units.
    pub fn distance_from(&self, home: HomeEdge) -> u32 {
        match home {
            HomeEdge::Bottom => self
                .scroll_height
                .saturating_sub(self.scroll_top + self.client_height),
            HomeEdge::Top => self.scroll_top,
        }
    }
}

/// What the view should do after an item-count change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDecision {
    /// Preserve the user's position.
    Stay,
    /// First content for this key: jump to home without animation.
    SnapHome,
    /// New content while resting at home: move to home smoothly.
    ScrollHome,
}

pub const DEFAULT_THRESHOLD: u32 = 8;
pub const DEFAULT_STICKY_AWAY_THRESHOLD: u32 = 48;

/// Per-container anchor state.
///
/// `away` is the hysteresis flag: armed once the user moves beyond
/// `sticky_away_threshold`, cleared only when they return within
/// `threshold`. It keeps content-height changes far from the viewport from
/// being misread as "still home". Decisions never clear it; only an observed
/// scroll back to home does.
#[derive(Debug, Clone)]
pub struct ScrollAnchor {
    home: HomeEdge,
    threshold: u32,
    sticky_away_threshold: u32,
    at_home: bool,
    away: bool,
    last_observed_at_home: bool,
    prev_count: usize,
}

impl ScrollAnchor {
    pub fn new(home: HomeEdge) -> Self {
        Self::with_thresholds(home, DEFAULT_THRESHOLD, DEFAULT_STICKY_AWAY_THRESHOLD)
    }

    pub fn with_thresholds(home: HomeEdge, threshold: u32, sticky_away_threshold: u32) -> Self {
        Self {
            home,
            threshold,
            sticky_away_threshold,
            at_home: true,
            away: false,
            last_observed_at_home: true,
            prev_count: 0,
        }
    }

    pub fn home(&self) -> HomeEdge {
        self.home
    }

    pub fn is_at_home(&self) -> bool {
        self.at_home
    }

    /// Key identity changed (session or view switch): forget all history and
    /// treat the next content as a fresh first paint.
    pub fn reset(&mut self) {
        self.at_home = true;
        self.away = false;
        self.last_observed_at_home = true;
        self.prev_count = 0;
    }

    /// A scroll event happened; record where the user actually is.
    pub fn observe_scroll(&mut self, geometry: Geometry) {
        let dist = geometry.distance_from(self.home);
        let at_home = dist <= self.threshold;
        self.at_home = at_home;
        self.last_observed_at_home = at_home;
        if dist > self.sticky_away_threshold {
            self.away = true;
        }
        if at_home {
            // Sticky-away clears only on an explicit return to home.
            self.away = false;
        }
    }

    /// Child content was expanded/collapsed by the user. Content height
    /// changed without a scroll event, so treat it exactly like a manual
    /// scroll-away.
    pub fn note_user_expand(&mut self) {
        self.away = true;
        self.at_home = false;
        self.last_observed_at_home = false;
    }

    /// The rendered item count changed; `geometry` is the measurement taken
    /// at decision time (it may reflect content shifts, which is why the
    /// last *observed* position takes precedence over it).
    pub fn on_item_count(&mut self, count: usize, geometry: Geometry) -> ScrollDecision {
        let prev = self.prev_count;
        let is_initial = prev == 0 && count > 0;
        let has_new = count > prev;

        let dist = geometry.distance_from(self.home);
        let now_at_home = dist <= self.threshold;
        let away_sticky_now = dist > self.sticky_away_threshold;
        let prev_observed_at_home = self.last_observed_at_home;

        let decision = if is_initial {
            self.away = false;
            ScrollDecision::SnapHome
        } else if has_new {
            let was_at_home = prev_observed_at_home || now_at_home;
            if was_at_home && !self.away {
                ScrollDecision::ScrollHome
            } else if now_at_home && !self.away && !away_sticky_now {
                ScrollDecision::ScrollHome
            } else {
                ScrollDecision::Stay
            }
        } else {
            ScrollDecision::Stay
        };

        self.prev_count = count;
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_home_bottom() -> Geometry {
        Geometry {
            scroll_top: 900,
            scroll_height: 1000,
            client_height: 100,
        }
    }

    fn away_bottom(dist: u32) -> Geometry {
        Geometry {
            scroll_top: 900 - dist,
            scroll_height: 1000,
            client_height: 100,
        }
    }

    #[test]
    fn bottom_distance_zero_is_home() {
        assert_eq!(at_home_bottom().distance_from(HomeEdge::Bottom), 0);
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.observe_scroll(at_home_bottom());
        assert!(anchor.is_at_home());
    }

    #[test]
    fn first_content_snaps_then_new_items_scroll() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        assert_eq!(
            anchor.on_item_count(5, at_home_bottom()),
            ScrollDecision::SnapHome
        );
        anchor.observe_scroll(at_home_bottom());
        assert_eq!(
            anchor.on_item_count(6, at_home_bottom()),
            ScrollDecision::ScrollHome
        );
    }

    #[test]
    fn armed_sticky_away_ignores_stale_at_home_measurement() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.on_item_count(5, at_home_bottom());
        anchor.observe_scroll(away_bottom(100));
        // Stale geometry claims we are back at home; the sticky flag wins.
        assert_eq!(
            anchor.on_item_count(6, at_home_bottom()),
            ScrollDecision::Stay
        );
    }

    #[test]
    fn returning_home_disarms_sticky_away() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.on_item_count(5, at_home_bottom());
        anchor.observe_scroll(away_bottom(100));
        anchor.observe_scroll(at_home_bottom());
        assert_eq!(
            anchor.on_item_count(6, at_home_bottom()),
            ScrollDecision::ScrollHome
        );
    }

    #[test]
    fn user_expand_counts_as_scrolling_away() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.on_item_count(5, at_home_bottom());
        anchor.note_user_expand();
        assert!(!anchor.is_at_home());
        assert_eq!(
            anchor.on_item_count(6, at_home_bottom()),
            ScrollDecision::Stay
        );
    }

    #[test]
    fn mid_distance_away_without_sticky_still_stays() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.on_item_count(5, at_home_bottom());
        // Past the at-home threshold but short of the sticky one.
        anchor.observe_scroll(away_bottom(20));
        assert_eq!(
            anchor.on_item_count(6, away_bottom(20)),
            ScrollDecision::Stay
        );
    }

    #[test]
    fn reset_makes_the_next_content_initial_again() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.on_item_count(5, at_home_bottom());
        anchor.observe_scroll(away_bottom(100));
        anchor.reset();
        assert_eq!(
            anchor.on_item_count(3, at_home_bottom()),
            ScrollDecision::SnapHome
        );
    }

    #[test]
    fn top_home_uses_scroll_top_as_distance() {
        let g = Geometry {
            scroll_top: 0,
            scroll_height: 500,
            client_height: 100,
        };
        assert_eq!(g.distance_from(HomeEdge::Top), 0);
        let mut anchor = ScrollAnchor::new(HomeEdge::Top);
        anchor.on_item_count(2, g);
        anchor.observe_scroll(g);
        assert_eq!(anchor.on_item_count(3, g), ScrollDecision::ScrollHome);
        let far = Geometry {
            scroll_top: 120,
            ..g
        };
        anchor.observe_scroll(far);
        assert_eq!(anchor.on_item_count(4, g), ScrollDecision::Stay);
    }

    #[test]
    fn unchanged_count_never_moves_the_view() {
        let mut anchor = ScrollAnchor::new(HomeEdge::Bottom);
        anchor.on_item_count(5, at_home_bottom());
        anchor.observe_scroll(at_home_bottom());
        assert_eq!(
            anchor.on_item_count(5, at_home_bottom()),
            ScrollDecision::Stay
        );
    }
}

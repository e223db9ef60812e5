use serde::{Deserialize, Serialize};

use crate::filter::TraceFilter;
use crate::window::TimeWindowKey;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DashboardView {
    TraceList,
    TraceDetail,
    Charts,
}

/// The closed set of view transitions. Everything that mutates the
/// dashboard state goes through `ViewState::apply`; there is no other
/// mutation path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ViewAction {
    ShowTraceList,
    ShowTrace(String),
    SelectSpan(String),
    ShowCharts,
    SelectWindow(TimeWindowKey),
    SetFilter(TraceFilter),
}

impl ViewAction {
    /// Map a URL path to the same transition an interactive selection
    /// would produce, so deep links rehydrate identical state.
    /// Unknown paths land on the trace list.
    pub fn from_path(path: &str) -> ViewAction {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        match (segments.next(), segments.next()) {
            (Some("charts"), _) => ViewAction::ShowCharts,
            (Some("traces"), Some(trace_id)) => ViewAction::ShowTrace(trace_id.to_string()),
            _ => ViewAction::ShowTraceList,
        }
    }
}

/// Token tying an in-flight fetch to the selection that issued it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchToken(u64);

/// Process-wide dashboard state: active view, current selection,
/// filters, and the fetch generation used to drop stale results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewState {
    pub view: DashboardView,
    pub selected_trace: Option<String>,
    pub selected_span: Option<String>,
    pub window: TimeWindowKey,
    pub filter: TraceFilter,
    fetch_generation: u64,
}

impl ViewState {
    pub fn new(default_window: TimeWindowKey) -> Self {
        Self {
            view: DashboardView::TraceList,
            selected_trace: None,
            selected_span: None,
            window: default_window,
            filter: TraceFilter::default(),
            fetch_generation: 0,
        }
    }

    /// Apply a transition. Returns a token when the new state needs a
    /// fetch; the caller passes it back through `accepts` before
    /// applying results, so a stale in-flight fetch can never
    /// overwrite state selected later.
    pub fn apply(&mut self, action: ViewAction) -> Option<FetchToken> {
        match action {
            ViewAction::ShowTraceList => {
                self.view = DashboardView::TraceList;
                self.selected_trace = None;
                self.selected_span = None;
                Some(self.next_generation())
            }
            ViewAction::ShowTrace(trace_id) => {
                self.view = DashboardView::TraceDetail;
                self.selected_trace = Some(trace_id);
                self.selected_span = None;
                Some(self.next_generation())
            }
            ViewAction::SelectSpan(span_id) => {
                self.selected_span = Some(span_id);
                None
            }
            ViewAction::ShowCharts => {
                self.view = DashboardView::Charts;
                Some(self.next_generation())
            }
            ViewAction::SelectWindow(window) => {
                self.window = window;
                if self.view == DashboardView::Charts {
                    Some(self.next_generation())
                } else {
                    None
                }
            }
            ViewAction::SetFilter(filter) => {
                self.filter = filter;
                None
            }
        }
    }

    pub fn accepts(&self, token: FetchToken) -> bool {
        token.0 == self.fetch_generation
    }

    fn next_generation(&mut self) -> FetchToken {
        self.fetch_generation += 1;
        FetchToken(self.fetch_generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_trace_selects_and_triggers_fetch() {
        let mut state = ViewState::new(TimeWindowKey::LastDay);
        let token = state.apply(ViewAction::ShowTrace("trace_1".into()));
        assert!(token.is_some());
        assert_eq!(state.view, DashboardView::TraceDetail);
        assert_eq!(state.selected_trace.as_deref(), Some("trace_1"));
    }

    #[test]
    fn stale_fetch_is_rejected_after_new_selection() {
        let mut state = ViewState::new(TimeWindowKey::LastDay);
        state.apply(ViewAction::ShowCharts);
        let stale = state.apply(ViewAction::SelectWindow(TimeWindowKey::LastHour)).unwrap();
        let fresh = state.apply(ViewAction::SelectWindow(TimeWindowKey::All)).unwrap();
        assert!(!state.accepts(stale));
        assert!(state.accepts(fresh));
    }

    #[test]
    fn window_change_outside_charts_does_not_fetch() {
        let mut state = ViewState::new(TimeWindowKey::LastDay);
        assert!(state.apply(ViewAction::SelectWindow(TimeWindowKey::All)).is_none());
        assert_eq!(state.window, TimeWindowKey::All);
    }

    #[test]
    fn span_selection_is_local() {
        let mut state = ViewState::new(TimeWindowKey::LastDay);
        state.apply(ViewAction::ShowTrace("t".into()));
        assert!(state.apply(ViewAction::SelectSpan("s".into())).is_none());
        assert_eq!(state.selected_span.as_deref(), Some("s"));
    }

    #[test]
    fn paths_map_to_transitions() {
        assert_eq!(ViewAction::from_path("/charts"), ViewAction::ShowCharts);
        assert_eq!(
            ViewAction::from_path("/traces/trace_42"),
            ViewAction::ShowTrace("trace_42".into())
        );
        assert_eq!(ViewAction::from_path("/traces"), ViewAction::ShowTraceList);
        assert_eq!(ViewAction::from_path("/"), ViewAction::ShowTraceList);
        assert_eq!(ViewAction::from_path("/nonsense"), ViewAction::ShowTraceList);
    }

    #[test]
    fn back_to_list_clears_selection() {
        let mut state = ViewState::new(TimeWindowKey::LastDay);
        state.apply(ViewAction::ShowTrace("t".into()));
        state.apply(ViewAction::SelectSpan("s".into()));
        state.apply(ViewAction::ShowTraceList);
        assert_eq!(state.selected_trace, None);
        assert_eq!(state.selected_span, None);
    }
}

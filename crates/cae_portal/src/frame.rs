//! Deterministic frame & grid selection (§4.3.2) and grid load
//! readiness. Kept as pure functions over an observed frame/grid
//! snapshot so the priority order is unit-testable without a real
//! browser; `run.rs` is the only place that feeds these functions
//! actual fantoccini observations.

use serde::{Deserialize, Serialize};

/// What the driver observed about one candidate frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub name: Option<String>,
    pub url: Option<String>,
    /// Whether this frame contains a unique `table.hdr` header selector.
    pub has_hdr_table: bool,
}

const URL_SUBSTRING_HINTS: &[&str] = &["subcontratas", "documento", "gestion_documental", "pendiente"];

/// Choose the grid frame by priority order (§4.3.2), stopping at the
/// first match. Returns the index into `frames` of the chosen frame.
pub fn select_grid_frame(frames: &[FrameDescriptor]) -> Option<usize> {
    // 1. frame name=f3
    if let Some(idx) = frames.iter().position(|f| f.name.as_deref() == Some("f3")) {
        return Some(idx);
    }
    // 2. frame URL contains buscador.asp?Apartado_ID=3
    if let Some(idx) = frames.iter().position(|f| f.url.as_deref().is_some_and(|u| u.contains("buscador.asp?Apartado_ID=3"))) {
        return Some(idx);
    }
    // 3. frame URL contains any of the coordination-document hints
    if let Some(idx) = frames
        .iter()
        .position(|f| f.url.as_deref().is_some_and(|u| URL_SUBSTRING_HINTS.iter().any(|hint| u.contains(hint))))
    {
        return Some(idx);
    }
    // 4. frame containing the unique table.hdr header selector
    frames.iter().position(|f| f.has_hdr_table)
}

/// What the driver observed about the chosen grid frame's load state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridObservation {
    pub spinner_visible: bool,
    pub header_present: bool,
    pub has_data_row: bool,
    pub has_no_results_indicator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridReadiness {
    /// Spinner absent, header present, and at least one of a data row
    /// or an explicit "no results" indicator: safe to scrape.
    Ready,
    /// Only the header is present; caller should wait up to a bounded
    /// timeout and retry once (§4.3.2).
    HeaderOnlyRetry,
    /// Header itself is missing; the grid frame was mis-selected or has
    /// not loaded at all.
    NotReady,
}

pub fn grid_readiness(obs: &GridObservation) -> GridReadiness {
    if obs.spinner_visible || !obs.header_present {
        return GridReadiness::NotReady;
    }
    if obs.has_data_row || obs.has_no_results_indicator {
        GridReadiness::Ready
    } else {
        GridReadiness::HeaderOnlyRetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_named_frame_over_url_hints() {
        let frames = vec![
            FrameDescriptor { name: None, url: Some("x/pendiente".into()), has_hdr_table: false },
            FrameDescriptor { name: Some("f3".into()), url: None, has_hdr_table: false },
        ];
        assert_eq!(select_grid_frame(&frames), Some(1));
    }

    #[test]
    fn falls_back_to_apartado_url() {
        let frames = vec![FrameDescriptor {
            name: Some("other".into()),
            url: Some("/buscador.asp?Apartado_ID=3".into()),
            has_hdr_table: false,
        }];
        assert_eq!(select_grid_frame(&frames), Some(0));
    }

    #[test]
    fn falls_back_to_substring_hints() {
        let frames = vec![FrameDescriptor { name: None, url: Some("/gestion_documental/x".into()), has_hdr_table: false }];
        assert_eq!(select_grid_frame(&frames), Some(0));
    }

    #[test]
    fn falls_back_to_header_presence_last() {
        let frames = vec![
            FrameDescriptor { name: None, url: Some("/unrelated".into()), has_hdr_table: false },
            FrameDescriptor { name: None, url: None, has_hdr_table: true },
        ];
        assert_eq!(select_grid_frame(&frames), Some(1));
    }

    #[test]
    fn no_candidate_frame_returns_none() {
        let frames = vec![FrameDescriptor { name: None, url: Some("/unrelated".into()), has_hdr_table: false }];
        assert_eq!(select_grid_frame(&frames), None);
    }

    #[test]
    fn ready_requires_header_and_a_row_or_no_results() {
        assert_eq!(
            grid_readiness(&GridObservation { spinner_visible: false, header_present: true, has_data_row: true, has_no_results_indicator: false }),
            GridReadiness::Ready
        );
        assert_eq!(
            grid_readiness(&GridObservation { spinner_visible: false, header_present: true, has_data_row: false, has_no_results_indicator: true }),
            GridReadiness::Ready
        );
    }

    #[test]
    fn header_only_retries_once() {
        assert_eq!(
            grid_readiness(&GridObservation { spinner_visible: false, header_present: true, has_data_row: false, has_no_results_indicator: false }),
            GridReadiness::HeaderOnlyRetry
        );
    }

    #[test]
    fn spinner_visible_is_not_ready() {
        assert_eq!(
            grid_readiness(&GridObservation { spinner_visible: true, header_present: true, has_data_row: true, has_no_results_indicator: false }),
            GridReadiness::NotReady
        );
    }
}

//! Paginated scraping (§4.3.5): enumerate pages until a stop
//! condition, deduplicating `pending_item_key` across pages.

use std::collections::HashSet;

use cae_protocol::PendingRequirement;

use crate::navigation::ScreenSignature;

/// One scraped page: its items, whether a "next page" control is
/// present and enabled, and the page's screen signature (for the loop
/// guard against a next-page control that doesn't actually advance).
pub struct ScrapedPage {
    pub items: Vec<PendingRequirement>,
    pub next_page_available: bool,
    pub signature: ScreenSignature,
}

/// Drive pagination (§4.3.5): stop once any of next-page absent/
/// disabled, `max_pages` reached, or the observed page signature
/// repeats the previous one (loop guard). Items are deduplicated by
/// `pending_item_key` across pages, first occurrence wins, and overall
/// order is preserved.
pub fn collect_pages(mut fetch_page: impl FnMut(u32) -> Result<ScrapedPage, crate::error::PortalError>, max_pages: u32) -> Result<Vec<PendingRequirement>, crate::error::PortalError> {
    let mut seen_keys = HashSet::new();
    let mut out = Vec::new();
    let mut last_signature: Option<ScreenSignature> = None;

    for page_number in 0..max_pages {
        let page = fetch_page(page_number)?;

        if let Some(prev) = &last_signature {
            if *prev == page.signature {
                break;
            }
        }
        last_signature = Some(page.signature.clone());

        for item in page.items {
            if seen_keys.insert(item.pending_item_key.clone()) {
                out.push(item);
            }
        }

        if !page.next_page_available {
            break;
        }
    }

    Ok(out)
}

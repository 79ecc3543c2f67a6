//! Overlay / blocker dismissal pipeline (§4.3.3). The click/close
//! strategies themselves are browser-specific, so they're expressed as
//! an `OverlayDriver` trait; the pipeline's control flow (loop-until-
//! zero, strategy fallback order, best-effort steps) is a pure
//! function of that trait, which makes the fallback ordering testable
//! against a fake driver without a real browser.

use crate::error::PortalError;

/// Everything the dismissal pipeline needs to poke at the page. Every
/// method is fallible only in the WebDriver-error sense; "couldn't find
/// this element" is expressed by returning `Ok(false)`/`Ok(None)`, not
/// an `Err`, since absence is an expected branch here, not a failure.
pub trait OverlayDriver {
    /// Unread counter on the Priority Communications modal, if present.
    fn unread_count(&mut self) -> Result<Option<u32>, PortalError>;
    /// Click the first unread entry.
    fn click_first_unread(&mut self) -> Result<(), PortalError>;
    /// Click "Marcar como leído", trying role lookup, then XPath to a
    /// clickable ancestor, then a coordinate click at the element's
    /// bounding-box center. Returns whether any strategy succeeded.
    fn mark_as_read(&mut self) -> Result<bool, PortalError>;
    /// Close the Priority Communications modal: DHTMLX window API
    /// first, then the close button, then Escape.
    fn close_priority_modal(&mut self) -> Result<bool, PortalError>;

    /// Whether a news/notices window (title matches
    /// `/avisos|comunicados|noticias/i`) is currently showing.
    fn news_window_present(&mut self) -> Result<bool, PortalError>;
    /// Best-effort activation of a "do not show again" control. Must
    /// never abort the pipeline on failure (§4.3.3 step 2).
    fn try_suppress_news_window(&mut self) -> Result<(), PortalError>;
    /// Close the news window: button, force click, coordinate click, JS
    /// API, Escape, in that order.
    fn close_news_window(&mut self) -> Result<bool, PortalError>;

    /// Whether a generic DHTMLX blocker (title matches
    /// `/avisos|comunicados|noticias|seguridad/i`) is showing.
    fn generic_blocker_present(&mut self) -> Result<bool, PortalError>;
    fn close_generic_blocker(&mut self) -> Result<bool, PortalError>;
}

/// Bounded iteration count so a driver bug (counter that never reaches
/// zero) can't spin the pipeline forever.
const MAX_UNREAD_ITERATIONS: u32 = 50;

/// Run the full pipeline (§4.3.3): Priority Communications modal, then
/// the news/notices window, then any generic DHTMLX blocker. Returns
/// `Ok(())` once nothing blocking remains, or
/// `Err(PortalError::DhxBlockerNotDismissed)` if step 1 or 2 exhausts
/// every strategy without clearing the blocker.
pub fn dismiss_overlays(driver: &mut dyn OverlayDriver) -> Result<(), PortalError> {
    dismiss_priority_modal(driver)?;
    dismiss_news_window(driver)?;
    // Step 3 is explicitly best-effort; its failure never surfaces.
    let _ = driver.generic_blocker_present().and_then(|present| if present { driver.close_generic_blocker() } else { Ok(true) });
    Ok(())
}

fn dismiss_priority_modal(driver: &mut dyn OverlayDriver) -> Result<(), PortalError> {
    let mut iterations = 0;
    loop {
        let Some(count) = driver.unread_count()? else {
            return Ok(());
        };
        if count == 0 {
            break;
        }
        if iterations >= MAX_UNREAD_ITERATIONS {
            return Err(PortalError::DhxBlockerNotDismissed);
        }
        iterations += 1;
        let before = count;
        driver.click_first_unread()?;
        driver.mark_as_read()?;
        let after = driver.unread_count()?.unwrap_or(0);
        if after >= before {
            return Err(PortalError::DhxBlockerNotDismissed);
        }
    }
    if !driver.close_priority_modal()? {
        return Err(PortalError::DhxBlockerNotDismissed);
    }
    Ok(())
}

fn dismiss_news_window(driver: &mut dyn OverlayDriver) -> Result<(), PortalError> {
    if !driver.news_window_present()? {
        return Ok(());
    }
    // Best-effort; never aborts the pipeline (§4.3.3 step 2).
    let _ = driver.try_suppress_news_window();
    if !driver.close_news_window()? {
        return Err(PortalError::DhxBlockerNotDismissed);
    }
    Ok(())
}

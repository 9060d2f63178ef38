use crate::scraping::page::{ChatPage, PointerKind};
use crate::types::ElementHandle;
use tracing::{debug, warn};

/// Click `element` the way a pointer would.
///
/// Fires `mousemove → mousedown → mouseup → click` at the element's visual
/// center. Before every event the topmost element at that point is resolved
/// again and the event goes there, since the page may re-render between
/// events. Returns `false` (after logging) if the element has no box, any
/// hit-test comes back empty, or a dispatch fails; never errors.
pub async fn simulate_click(page: &dyn ChatPage, element: ElementHandle) -> bool {
    let rect = match page.element_rect(element).await {
        Ok(Some(rect)) => rect,
        Ok(None) => {
            warn!("click: {:?} is detached", element);
            return false;
        }
        Err(e) => {
            warn!("click: cannot measure {:?}: {}", element, e);
            return false;
        }
    };
    let point = rect.center();

    for kind in PointerKind::SEQUENCE {
        let target = match page.element_at_point(point).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(
                    "click: no element at ({:.1}, {:.1}) for {}",
                    point.x,
                    point.y,
                    kind.event_type()
                );
                return false;
            }
            Err(e) => {
                warn!("click: hit-test failed for {}: {}", kind.event_type(), e);
                return false;
            }
        };

        if let Err(e) = page.dispatch_pointer(target, kind, point).await {
            warn!("click: {} dispatch failed: {}", kind.event_type(), e);
            return false;
        }
        debug!("click: {} → {:?}", kind.event_type(), target);
    }

    true
}

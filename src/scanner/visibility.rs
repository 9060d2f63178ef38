use crate::types::Rect;

/// Pure visibility test.
///
/// Visible iff at least `tolerance` of the element's height lies inside
/// `container`, and its horizontal extent stays within `[0, viewport_width]`.
pub fn is_sufficiently_visible(
    element: Option<Rect>,
    container: Rect,
    viewport_width: f64,
    tolerance: f64,
) -> bool {
    let Some(rect) = element else {
        return false;
    };
    if rect.height <= 0.0 {
        return false;
    }

    let visible_height = rect.bottom().min(container.bottom()) - rect.top.max(container.top);
    let ratio = visible_height / rect.height;

    ratio >= tolerance && rect.left >= 0.0 && rect.right() <= viewport_width
}

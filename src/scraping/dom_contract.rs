//! Selectors for the one host-page layout the scanner understands.

use serde::Serialize;

/// Every CSS selector / class marker the live page driver relies on.
///
/// Serialized into the injected scripts as a JSON object, so a layout change
/// is a change to [`DomContract::default`] only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomContract {
    /// Element id of the scrollable chat list.
    pub chat_list_id: String,
    /// Chat-list rows.
    pub contact_row: String,
    /// Display-name label inside a row.
    pub contact_name: String,
    /// Interactive child of a row.
    pub contact_click_target: String,
    /// Time/date label candidates inside a row (filtered by text shape in the script).
    pub contact_timestamp_candidates: String,
    /// Regex source for last-activity labels.
    pub contact_timestamp_pattern: String,
    /// Container of the open conversation.
    pub message_area: String,
    /// Scrollable list inside `message_area`.
    pub message_scroller: String,
    /// Rows inside the conversation.
    pub message_row: String,
    /// Class marking an incoming bubble.
    pub incoming_class: String,
    /// Class marking an outgoing bubble.
    pub outgoing_class: String,
    /// Element carrying the message id attribute.
    pub message_id_holder: String,
    pub message_id_attribute: String,
    /// Copyable text span of a bubble.
    pub message_text: String,
    /// Attribute on the copyable container holding `[time, date] author: `.
    pub message_preamble_attribute: String,
}

impl Default for DomContract {
    fn default() -> Self {
        Self {
            chat_list_id: "pane-side".into(),
            contact_row: r#"div[role="listitem"]"#.into(),
            contact_name: r#"span[dir="auto"][title]"#.into(),
            contact_click_target: r#"div[tabindex="-1"]"#.into(),
            contact_timestamp_candidates: "div".into(),
            contact_timestamp_pattern: concat!(
                r"^(\d{1,2}:\d{2}|Yesterday|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday",
                r"|\d{2}/\d{2}/\d{4})$"
            )
            .into(),
            message_area: ".copyable-area".into(),
            message_scroller: r#"div[tabindex="0"]"#.into(),
            message_row: r#"div[role="row"]"#.into(),
            incoming_class: "message-in".into(),
            outgoing_class: "message-out".into(),
            message_id_holder: "div[data-id]".into(),
            message_id_attribute: "data-id".into(),
            message_text: ".selectable-text.copyable-text".into(),
            message_preamble_attribute: "data-pre-plain-text".into(),
        }
    }
}

impl DomContract {
    /// JSON literal for embedding into an injected script.
    pub fn to_js_literal(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_literal_is_camel_case_json() {
        let literal = DomContract::default().to_js_literal();
        let v: serde_json::Value = serde_json::from_str(&literal).unwrap();
        assert_eq!(v["chatListId"], "pane-side");
        assert_eq!(v["outgoingClass"], "message-out");
    }

    #[test]
    fn test_timestamp_pattern_matches_row_labels() {
        let re = regex::Regex::new(&DomContract::default().contact_timestamp_pattern).unwrap();
        for ok in ["09:45", "9:05", "Yesterday", "Sunday", "30/03/2025"] {
            assert!(re.is_match(ok), "{ok}");
        }
        for bad in ["Hello", "30/3/2025", "Yesterday at noon"] {
            assert!(!re.is_match(bad), "{bad}");
        }
    }
}

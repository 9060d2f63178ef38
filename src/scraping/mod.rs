pub mod browser_manager;
pub mod cdp_page;
pub mod dom_contract;
pub mod page;

pub use page::{ChatPage, ContactRow, MessageRow, PointerKind};

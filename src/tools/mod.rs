pub mod scan;

pub use scan::{run_scan, run_scan_on_page, wait_for_chat_list, ScanJob};

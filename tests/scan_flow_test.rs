mod common;

use common::{init_logger, FakeContact, MockChatPage};
use contact_scout::core::config::ScanPolicy;
use contact_scout::scanner::{ProcessOutcome, Registry, ScanError, ScanState, Scanner};
use contact_scout::tools::{run_scan_on_page, wait_for_chat_list, ScanJob};
use contact_scout::types::{Direction, RegistryExport, StopReason};
use std::time::Duration;

fn job() -> ScanJob {
    ScanJob {
        policy: ScanPolicy::default(),
        login_timeout: Duration::from_secs(30),
        storage_key: "whatsappContactsData".to_string(),
        export_dir: None,
        sync: None,
    }
}

#[tokio::test(start_paused = true)]
async fn every_contact_is_processed_exactly_once() {
    init_logger();
    let page = MockChatPage::with_contacts(10, 2);
    let mut registry = Registry::new();
    let mut scanner = Scanner::new(&page, ScanPolicy::default());
    assert_eq!(scanner.state(), ScanState::Idle);

    let report = scanner.run(&mut registry).await.unwrap();

    assert_eq!(scanner.state(), ScanState::Done(StopReason::ListExhausted));
    assert_eq!(report.stop_reason, StopReason::ListExhausted);
    assert_eq!(report.contacts_found, 10);
    assert_eq!(report.processed, 10);
    assert_eq!(report.with_messages, 10);
    assert_eq!(report.process_attempts, 10);
    assert_eq!(report.open_failures, 0);

    assert_eq!(registry.len(), 10);
    assert_eq!(registry.unprocessed_count(), 0);
    for record in registry.iter() {
        assert_eq!(page.opens(record.name()), 1, "{}", record.name());
        assert_eq!(record.messages().len(), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn process_next_takes_topmost_visible_first() {
    init_logger();
    let page = MockChatPage::with_contacts(6, 1);
    let mut registry = Registry::new();
    let mut scanner = Scanner::new(&page, ScanPolicy::default());

    contact_scout::scanner::extract_contacts(&page, &mut registry).await;

    let visible = scanner.visible_unprocessed(&registry).await;
    let names: Vec<&str> = visible.iter().map(|(n, _)| n.as_str()).collect();
    // The overscan row below the list is rendered but not visible.
    assert_eq!(names, ["Contact 00", "Contact 01", "Contact 02", "Contact 03"]);

    let first = scanner.process_next(&mut registry).await.unwrap();
    assert_eq!(
        first,
        ProcessOutcome::Opened {
            name: "Contact 00".into(),
            messages: 1
        }
    );
    let second = scanner.process_next(&mut registry).await.unwrap();
    assert_eq!(second.name(), "Contact 01");
    assert_eq!(scanner.visible_unprocessed(&registry).await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unclickable_contact_is_marked_processed_without_messages() {
    init_logger();
    let page = MockChatPage::new(vec![
        FakeContact::new("Alice").messages(2),
        FakeContact::new("Blocked").messages(4).unclickable(),
        FakeContact::new("Carol").messages(1),
    ]);
    let mut registry = Registry::new();

    let report = Scanner::new(&page, ScanPolicy::default())
        .run(&mut registry)
        .await
        .unwrap();

    let blocked = registry.get("Blocked").unwrap();
    assert!(blocked.processed());
    assert!(blocked.messages().is_empty());
    assert_eq!(page.opens("Blocked"), 0);
    assert_eq!(report.open_failures, 1);
    assert_eq!(report.processed, 3);
    assert_eq!(report.with_messages, 2);
}

#[tokio::test(start_paused = true)]
async fn all_processed_ends_scan_when_list_keeps_scrolling() {
    init_logger();
    let page = MockChatPage::with_contacts(3, 1);
    let mut registry = Registry::new();
    let policy = ScanPolicy {
        no_scroll_threshold: 100,
        ..ScanPolicy::default()
    };

    let report = Scanner::new(&page, policy).run(&mut registry).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::AllProcessed);
    assert_eq!(report.processed, 3);
}

#[tokio::test(start_paused = true)]
async fn unreachable_contacts_end_in_stall() {
    init_logger();
    let page = MockChatPage::new(vec![
        FakeContact::new("Alice").messages(1),
        FakeContact::new("Hidden").offscreen(),
    ]);
    let mut registry = Registry::new();
    let policy = ScanPolicy {
        no_scroll_threshold: 100,
        ..ScanPolicy::default()
    };

    let report = Scanner::new(&page, policy).run(&mut registry).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Stalled);
    assert!(!registry.get("Hidden").unwrap().processed());
    assert!(registry.get("Alice").unwrap().processed());
}

#[tokio::test(start_paused = true)]
async fn scan_without_chat_list_fails_fast() {
    init_logger();
    let page = MockChatPage::with_contacts(3, 1).without_chat_list();
    let mut registry = Registry::new();

    let result = Scanner::new(&page, ScanPolicy::default())
        .run(&mut registry)
        .await;

    assert!(matches!(result, Err(ScanError::ChatListMissing)));
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn end_to_end_scan_exports_to_page_storage() {
    init_logger();
    let conversation = [
        (Direction::Incoming, "hello"),
        (Direction::Outgoing, "hi"),
        (Direction::Incoming, "how are you?"),
    ];
    let page = MockChatPage::new(vec![
        FakeContact::new("Alice")
            .label("Yesterday")
            .conversation(&conversation),
        FakeContact::new("Bob").conversation(&conversation),
    ]);

    let response = run_scan_on_page(&page, &job()).await.unwrap();

    assert!(!response.synced);
    assert!(response.warnings.is_empty());
    assert_eq!(response.report.processed, 2);

    let stored = page.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, "whatsappContactsData");
    let exported: RegistryExport = serde_json::from_str(&stored[0].1).unwrap();
    assert_eq!(exported, response.contacts);

    for name in ["Alice", "Bob"] {
        let contact = &exported[name];
        assert!(contact.processed);
        assert_eq!(contact.message_count, 3);
        let texts: Vec<&str> = contact.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hello", "hi", "how are you?"]);
        let outgoing = contact
            .messages
            .iter()
            .filter(|m| m.direction == Direction::Outgoing)
            .count();
        assert_eq!(outgoing, 1);
    }
    assert_eq!(exported["Alice"].last_interaction.text, "Yesterday");
    assert_eq!(exported["Bob"].last_interaction.text, "Unknown");

    // Wire format keys.
    let raw: serde_json::Value = serde_json::from_str(&stored[0].1).unwrap();
    assert_eq!(raw["Alice"]["messageCount"], 3);
    assert_eq!(raw["Alice"]["messages"][1]["direction"], "outgoing");
}

#[tokio::test(start_paused = true)]
async fn login_wait_polls_until_list_appears() {
    init_logger();
    let page = MockChatPage::with_contacts(2, 1).login_after(5);

    wait_for_chat_list(&page, Duration::from_secs(30)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn login_wait_times_out() {
    init_logger();
    let page = MockChatPage::with_contacts(2, 1).without_chat_list();

    let result = wait_for_chat_list(&page, Duration::from_secs(3)).await;
    assert!(matches!(result, Err(ScanError::LoginTimeout(3))));

    let mut job = job();
    job.login_timeout = Duration::from_secs(3);
    assert!(matches!(
        run_scan_on_page(&page, &job).await,
        Err(ScanError::LoginTimeout(3))
    ));
    assert!(page.stored().is_empty());
}

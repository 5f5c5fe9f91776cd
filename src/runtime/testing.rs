//! Mock implementations for testing
//!
//! These mocks enable integration testing of the widget without real I/O.

use super::{mount, WidgetEvent, WidgetHandle};
use crate::config::WidgetConfig;
use crate::db::{DbError, DbResult, KeyValueStore, MemoryStore};
use crate::reply::{ReplyError, ReplyPayload, ReplyRequest, ReplyService};
use crate::session::{LeadInfo, SessionStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

// ============================================================================
// Mock Reply Service
// ============================================================================

/// Mock reply service that returns queued responses
pub struct MockReplyService {
    responses: Mutex<VecDeque<Result<ReplyPayload, ReplyError>>>,
    delay: Duration,
    /// Record of all requests made
    pub requests: Mutex<Vec<ReplyRequest>>,
    request_times: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockReplyService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            request_times: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Simulate network latency on every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a successful response with the given `reply` text
    pub fn queue_reply(&self, reply: &str) {
        self.queue_payload(ReplyPayload::text(reply));
    }

    pub fn queue_payload(&self, payload: ReplyPayload) {
        self.responses.lock().unwrap().push_back(Ok(payload));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: ReplyError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<ReplyRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Clock readings at which each request started
    pub fn request_times(&self) -> Vec<Instant> {
        self.request_times.lock().unwrap().clone()
    }

    /// Highest number of calls ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockReplyService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyService for MockReplyService {
    async fn reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, ReplyError> {
        self.requests.lock().unwrap().push(request.clone());
        self.request_times.lock().unwrap().push(Instant::now());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ReplyError::remote_unavailable("No mock response queued")))
    }

    fn endpoint(&self) -> &str {
        "mock://reply"
    }
}

/// Reply service that never answers
pub struct HangingReplyService;

#[async_trait]
impl ReplyService for HangingReplyService {
    async fn reply(&self, _request: &ReplyRequest) -> Result<ReplyPayload, ReplyError> {
        std::future::pending().await
    }

    fn endpoint(&self) -> &str {
        "mock://hanging"
    }
}

// ============================================================================
// Failing Store
// ============================================================================

/// Key/value store whose every operation fails, like a full storage quota
#[derive(Default)]
pub struct FailingStore;

impl FailingStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> DbResult<Option<String>> {
        Err(DbError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> DbResult<()> {
        Err(DbError::Unavailable("quota exceeded".into()))
    }

    fn remove(&self, _key: &str) -> DbResult<()> {
        Err(DbError::Unavailable("storage disabled".into()))
    }
}

// ============================================================================
// Test Widget Builder
// ============================================================================

/// Helper for mounting test widgets with minimal boilerplate
pub struct TestWidget {
    pub handle: WidgetHandle,
    pub events: broadcast::Receiver<WidgetEvent>,
    pub reply: Arc<MockReplyService>,
    pub kv: Arc<dyn KeyValueStore>,
}

pub struct TestWidgetBuilder {
    config: WidgetConfig,
    kv: Option<Arc<dyn KeyValueStore>>,
    reply: Option<Arc<MockReplyService>>,
    lead: Option<LeadInfo>,
}

impl TestWidget {
    pub fn builder() -> TestWidgetBuilder {
        TestWidgetBuilder {
            config: WidgetConfig::default(),
            kv: None,
            reply: None,
            lead: None,
        }
    }

    /// Wait until no exchange is running or queued, then return the snapshot
    pub async fn settle(&self) -> super::Snapshot {
        let deadline = Instant::now() + Duration::from_secs(600);
        loop {
            let snapshot = self.handle.snapshot().await.expect("widget stopped");
            if !snapshot.busy {
                return snapshot;
            }
            assert!(Instant::now() < deadline, "widget never went idle");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Drain every event broadcast so far
    pub fn drain_events(&mut self) -> Vec<WidgetEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl TestWidgetBuilder {
    pub fn config(mut self, config: WidgetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn kv(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn reply(mut self, reply: MockReplyService) -> Self {
        self.reply = Some(Arc::new(reply));
        self
    }

    /// Pre-store lead info so the widget opens straight into chat
    pub fn lead(mut self, name: &str, email: &str) -> Self {
        self.lead = Some(LeadInfo::new(name, email));
        self
    }

    pub fn build(self) -> TestWidget {
        let kv = self
            .kv
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        if let Some(lead) = &self.lead {
            SessionStore::new(kv.clone()).save_lead(lead).unwrap();
        }
        let reply = self.reply.unwrap_or_else(|| Arc::new(MockReplyService::new()));

        let handle = mount(&self.config, kv.clone(), reply.clone());
        let events = handle.subscribe();

        TestWidget {
            handle,
            events,
            reply,
            kv,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{self, Message, Origin};
    use crate::reply::ReplyErrorKind;
    use crate::runtime::{HandleError, LeadDraft, FAILURE_NOTICE};
    use crate::session::PENDING_PROMPT_KEY;
    use crate::state_machine::{MenuItem, Screen};
    use proptest::prelude::*;

    /// Mounted with lead info and opened, so the chat input is live
    async fn chat_widget(reply: MockReplyService) -> TestWidget {
        let widget = TestWidget::builder()
            .lead("ada", "ada@example.com")
            .reply(reply)
            .build();
        widget.handle.open().await.unwrap();
        // Round trip so the open has been processed before the test drains events
        let snapshot = widget.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.screen, Screen::Chat);
        widget
    }

    fn bot_texts(messages: &[Message]) -> Vec<&str> {
        messages
            .iter()
            .filter(|m| m.origin == Origin::Bot)
            .map(|m| m.text.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_mock_reply_service() {
        let mock = MockReplyService::new();
        mock.queue_reply("Hello");

        let request = ReplyRequest {
            chat_id: "user_1".into(),
            message: "hi".into(),
        };
        let payload = mock.reply(&request).await.unwrap();
        assert_eq!(payload.fragments(), vec!["Hello".to_string()]);

        // Second call should fail (no more responses)
        assert!(mock.reply(&request).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_fragment_reply() {
        let reply = MockReplyService::new();
        reply.queue_reply("Hi\\kHow can I help?\\k");
        let widget = chat_widget(reply).await;

        widget.handle.submit("  hello  ").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(
            snapshot.messages,
            vec![
                Message::user("hello"),
                Message::bot("Hi"),
                Message::bot("How can I help?"),
            ]
        );
        assert_eq!(snapshot.typing, None);

        let requests = widget.reply.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].chat_id, snapshot.session_id.as_str());
        assert_eq!(requests[0].message, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragment_pacing_and_typing_sequence() {
        let reply = MockReplyService::new();
        reply.queue_reply("one\\ktwo");
        let mut widget = chat_widget(reply).await;
        widget.drain_events();

        let start = Instant::now();
        widget.handle.submit("go").await.unwrap();
        widget.settle().await;

        // Two fragments, each 1000ms thinking + 200ms settle
        assert!(start.elapsed() >= Duration::from_millis(2400));

        let label = WidgetConfig::default().typing_label();
        let typing = |active| WidgetEvent::Typing {
            active,
            label: label.clone(),
        };
        let events = widget.drain_events();
        assert_eq!(
            events,
            vec![
                WidgetEvent::MessageAppended {
                    message: Message::user("go")
                },
                typing(true),
                typing(false),
                WidgetEvent::MessageAppended {
                    message: Message::bot("one")
                },
                typing(true),
                typing(false),
                WidgetEvent::MessageAppended {
                    message: Message::bot("two")
                },
                WidgetEvent::ExchangeFinished { queued: 0 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_queued_and_answered_in_order() {
        let reply = MockReplyService::new().with_delay(Duration::from_millis(300));
        reply.queue_reply("ra");
        reply.queue_reply("rb1\\krb2");
        reply.queue_reply("rc");
        let widget = chat_widget(reply).await;

        for text in ["a", "b", "c"] {
            widget.handle.submit(text).await.unwrap();
        }

        let busy = widget.handle.snapshot().await.unwrap();
        assert!(busy.busy);
        assert_eq!(busy.queued, 2);
        // All user messages land immediately, in submission order
        assert_eq!(
            busy.messages,
            vec![Message::user("a"), Message::user("b"), Message::user("c")]
        );

        let snapshot = widget.settle().await;
        assert_eq!(bot_texts(&snapshot.messages), vec!["ra", "rb1", "rb2", "rc"]);
        assert_eq!(snapshot.queued, 0);

        let sent: Vec<String> = widget
            .reply
            .recorded_requests()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(sent, vec!["a", "b", "c"]);
        assert_eq!(widget.reply.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_entry_waits_for_cooldown() {
        let reply = MockReplyService::new();
        reply.queue_reply("first");
        reply.queue_reply("second");
        let widget = chat_widget(reply).await;

        widget.handle.submit("a").await.unwrap();
        widget.handle.submit("b").await.unwrap();
        widget.settle().await;

        let times = widget.reply.request_times();
        assert_eq!(times.len(), 2);
        // One fragment (1000 + 200) then the 2000ms cooldown
        assert!(times[1] - times[0] >= Duration::from_millis(3200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_appends_one_notice_and_drains_queue() {
        let reply = MockReplyService::new().with_delay(Duration::from_millis(100));
        reply.queue_error(ReplyError::remote_unavailable("connection refused"));
        reply.queue_reply("recovered");
        let mut widget = chat_widget(reply).await;
        widget.drain_events();

        widget.handle.submit("a").await.unwrap();
        widget.handle.submit("b").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(
            snapshot.messages,
            vec![
                Message::user("a"),
                Message::user("b"),
                Message::bot(FAILURE_NOTICE),
                Message::bot("recovered"),
            ]
        );

        let failures: Vec<_> = widget
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                WidgetEvent::ExchangeFailed { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![ReplyErrorKind::RemoteUnavailable]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_uses_generic_notice() {
        let reply = MockReplyService::new();
        reply.queue_error(ReplyError::malformed_response("expected value at line 1"));
        let mut widget = chat_widget(reply).await;

        widget.handle.submit("a").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(bot_texts(&snapshot.messages), vec![FAILURE_NOTICE]);
        assert!(widget.drain_events().iter().any(|e| matches!(
            e,
            WidgetEvent::ExchangeFailed {
                kind: ReplyErrorKind::MalformedResponse,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reply_appends_nothing() {
        let reply = MockReplyService::new();
        reply.queue_payload(ReplyPayload::default());
        let widget = chat_widget(reply).await;

        widget.handle.submit("anyone?").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(snapshot.messages, vec![Message::user("anyone?")]);
        assert_eq!(snapshot.typing, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_remote_times_out() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        SessionStore::new(kv.clone())
            .save_lead(&LeadInfo::new("ada", "ada@example.com"))
            .unwrap();
        let config = WidgetConfig {
            request_timeout: Some(Duration::from_secs(5)),
            ..WidgetConfig::default()
        };
        let handle = mount(&config, kv, HangingReplyService);
        handle.open().await.unwrap();

        let start = Instant::now();
        handle.submit("hello?").await.unwrap();
        loop {
            let snapshot = handle.snapshot().await.unwrap();
            if !snapshot.busy {
                assert_eq!(bot_texts(&snapshot.messages), vec![FAILURE_NOTICE]);
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lead_capture_gates_first_exchange() {
        let reply = MockReplyService::new();
        reply.queue_reply("Thanks Ada!");
        let widget = TestWidget::builder().reply(reply).build();

        widget.handle.open().await.unwrap();
        assert_eq!(widget.handle.snapshot().await.unwrap().screen, Screen::Intro);

        widget.handle.select_topic("Pricing & Plans").await.unwrap();
        let snapshot = widget.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.screen, Screen::Form);
        assert_eq!(snapshot.greeting, "Hi Guest");
        assert_eq!(
            widget.kv.get(PENDING_PROMPT_KEY).unwrap().as_deref(),
            Some("Pricing & Plans")
        );
        assert!(widget.reply.recorded_requests().is_empty());

        widget.handle.submit_lead("ada", "ada@example.com").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(snapshot.screen, Screen::Chat);
        assert_eq!(snapshot.greeting, "Hi Ada");
        // The announcement is sent but not echoed
        assert_eq!(snapshot.messages, vec![Message::bot("Thanks Ada!")]);

        let requests = widget.reply.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].message,
            "User info: Name = ada, Email = ada@example.com\n\nPricing & Plans"
        );
        assert_eq!(widget.kv.get(PENDING_PROMPT_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_topic_with_lead_is_sent_as_user_message() {
        let reply = MockReplyService::new();
        reply.queue_reply("We have three plans.");
        let widget = TestWidget::builder()
            .lead("ada", "ada@example.com")
            .reply(reply)
            .build();

        widget.handle.navigate(MenuItem::Home).await.unwrap();
        widget.handle.select_topic("Pricing & Plans").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(snapshot.screen, Screen::Chat);
        assert_eq!(
            snapshot.messages,
            vec![
                Message::user("Pricing & Plans"),
                Message::bot("We have three plans."),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_lead_keeps_draft() {
        let mut widget = TestWidget::builder().build();
        widget.handle.navigate(MenuItem::Messages).await.unwrap();
        widget.handle.submit_lead("Ada", "").await.unwrap();

        let snapshot = widget.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.screen, Screen::Form);
        assert_eq!(
            snapshot.form_draft,
            Some(LeadDraft {
                name: "Ada".into(),
                email: String::new(),
            })
        );
        assert!(widget.drain_events().contains(&WidgetEvent::ValidationFailed {
            message: "Please enter email.".into()
        }));
        assert!(widget.reply.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_input_rejected_outside_chat() {
        let mut widget = TestWidget::builder().build();
        widget.handle.submit("hello").await.unwrap();

        let snapshot = widget.handle.snapshot().await.unwrap();
        assert!(snapshot.messages.is_empty());
        assert!(!snapshot.busy);
        assert!(widget
            .drain_events()
            .iter()
            .any(|e| matches!(e, WidgetEvent::Rejected { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_restores_session() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let reply = MockReplyService::new();
        reply.queue_reply("hi there");
        let first = TestWidget::builder()
            .kv(kv.clone())
            .lead("ada", "ada@example.com")
            .reply(reply)
            .build();
        first.handle.open().await.unwrap();
        first.handle.submit("hello").await.unwrap();
        let before = first.settle().await;
        first.handle.shutdown();

        let second = TestWidget::builder().kv(kv.clone()).build();
        second.handle.open().await.unwrap();
        let after = second.handle.snapshot().await.unwrap();

        assert_eq!(after.session_id, before.session_id);
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.screen, Screen::Chat);
        assert_eq!(
            conversation::load(kv.as_ref(), &after.session_id).unwrap(),
            before.messages
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_starts_a_fresh_session() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let reply = MockReplyService::new();
        reply.queue_reply("hi there");
        let first = TestWidget::builder()
            .kv(kv.clone())
            .lead("ada", "ada@example.com")
            .reply(reply)
            .build();
        first.handle.open().await.unwrap();
        first.handle.submit("hello").await.unwrap();
        let before = first.settle().await;

        first.handle.shutdown();
        first.handle.stopped().await;
        SessionStore::new(kv.clone()).clear().unwrap();
        assert_eq!(
            conversation::load(kv.as_ref(), &before.session_id).unwrap(),
            Vec::new()
        );

        let second = TestWidget::builder().kv(kv.clone()).build();
        second.handle.open().await.unwrap();
        let after = second.handle.snapshot().await.unwrap();

        assert_ne!(after.session_id, before.session_id);
        assert!(after.messages.is_empty());
        assert_eq!(after.screen, Screen::Intro);
        assert_eq!(after.greeting, "Hi Guest");
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_does_not_stop_delivery() {
        let reply = MockReplyService::new();
        reply.queue_reply("still works");
        let widget = TestWidget::builder()
            .kv(Arc::new(FailingStore::new()))
            .reply(reply)
            .build();

        widget.handle.open().await.unwrap();
        widget.handle.select_topic("Contact Human Support").await.unwrap();
        widget.handle.submit_lead("ada", "ada@example.com").await.unwrap();
        widget.handle.submit("and another").await.unwrap();
        let snapshot = widget.settle().await;

        assert_eq!(snapshot.screen, Screen::Chat);
        assert_eq!(
            snapshot.messages,
            vec![
                Message::user("and another"),
                Message::bot("still works"),
                Message::bot(FAILURE_NOTICE),
            ]
        );
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let widget = TestWidget::builder().build();
        widget.handle.shutdown();
        widget.handle.stopped().await;

        assert!(matches!(widget.handle.open().await, Err(HandleError::Stopped)));
        assert!(matches!(widget.handle.snapshot().await, Err(HandleError::Stopped)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any burst: user messages keep submission order, replies keep
        /// exchange order and fragment order, one call at a time
        #[test]
        fn prop_burst_preserves_order(
            replies in proptest::collection::vec(
                proptest::collection::vec("[a-z]{1,6}", 0..4),
                1..6,
            )
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();

            let (snapshot, max_in_flight) = rt.block_on(async {
                let reply = MockReplyService::new().with_delay(Duration::from_millis(50));
                for fragments in &replies {
                    reply.queue_reply(&fragments.join("\\k"));
                }
                let widget = chat_widget(reply).await;
                for i in 0..replies.len() {
                    widget.handle.submit(format!("msg{i}")).await.unwrap();
                }
                (widget.settle().await, widget.reply.max_in_flight())
            });

            let users: Vec<String> = snapshot
                .messages
                .iter()
                .filter(|m| m.origin == Origin::User)
                .map(|m| m.text.clone())
                .collect();
            let expected_users: Vec<String> = (0..replies.len()).map(|i| format!("msg{i}")).collect();
            prop_assert_eq!(users, expected_users);

            let expected_bots: Vec<String> = replies.iter().flatten().cloned().collect();
            let bots: Vec<String> = bot_texts(&snapshot.messages).into_iter().map(String::from).collect();
            prop_assert_eq!(bots, expected_bots);

            // The first reply can only follow the first user message
            if let Some(first_bot) = snapshot.messages.iter().position(|m| m.origin == Origin::Bot) {
                prop_assert!(first_bot >= 1);
            }
            prop_assert_eq!(max_in_flight, 1);
        }
    }
}

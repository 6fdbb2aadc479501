//! Conversation turns against scripted reply generators: ordering, failure, timeout, retries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use omni_chat::{
    ConversationError, ConversationService, GenerationError, ReplyGenerator, SessionStore, Turn,
    TurnRole, ValidationError,
};
use tokio::sync::{Barrier, Notify};

/// Replies with `echo: <last user text>` and records what it was asked.
#[derive(Default)]
struct EchoGenerator {
    calls: Mutex<Vec<(Vec<Turn>, String)>>,
}

#[async_trait]
impl ReplyGenerator for EchoGenerator {
    async fn generate(
        &self,
        history: &[Turn],
        instructions: &str,
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((history.to_vec(), instructions.to_string()));
        let last = history.last().map_or("", |turn| turn.content.as_str());
        Ok(format!("echo: {last}"))
    }
}

/// Fails the first `failures` calls, then echoes.
struct FlakyGenerator {
    failures: Mutex<usize>,
}

#[async_trait]
impl ReplyGenerator for FlakyGenerator {
    async fn generate(
        &self,
        history: &[Turn],
        _instructions: &str,
    ) -> Result<String, GenerationError> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(GenerationError::Rejected {
                status: 503,
                body: "model loading".to_string(),
            });
        }
        Ok(format!("reply to {} turns", history.len()))
    }
}

struct SlowGenerator(Duration);

#[async_trait]
impl ReplyGenerator for SlowGenerator {
    async fn generate(
        &self,
        _history: &[Turn],
        _instructions: &str,
    ) -> Result<String, GenerationError> {
        tokio::time::sleep(self.0).await;
        Ok("too late".to_string())
    }
}

struct BlankGenerator;

#[async_trait]
impl ReplyGenerator for BlankGenerator {
    async fn generate(
        &self,
        _history: &[Turn],
        _instructions: &str,
    ) -> Result<String, GenerationError> {
        Ok("   ".to_string())
    }
}

/// Parks inside `generate` until released, so tests can touch the store mid-generation.
#[derive(Default)]
struct GatedGenerator {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ReplyGenerator for GatedGenerator {
    async fn generate(
        &self,
        _history: &[Turn],
        _instructions: &str,
    ) -> Result<String, GenerationError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("released".to_string())
    }
}

/// Holds every caller until `parties` generations are running at once.
struct RendezvousGenerator {
    barrier: Barrier,
}

#[async_trait]
impl ReplyGenerator for RendezvousGenerator {
    async fn generate(
        &self,
        history: &[Turn],
        _instructions: &str,
    ) -> Result<String, GenerationError> {
        self.barrier.wait().await;
        Ok(format!("reply seeing {} turns", history.len()))
    }
}

fn service_with(generator: Arc<dyn ReplyGenerator>) -> ConversationService {
    ConversationService::new(SessionStore::new(), generator, "Be brief.")
}

fn roles(history: &[Turn]) -> Vec<TurnRole> {
    history.iter().map(|turn| turn.role).collect()
}

#[tokio::test]
async fn handle_message_records_user_then_assistant_turn() {
    let generator = Arc::new(EchoGenerator::default());
    let service = service_with(generator.clone());

    let reply = service.handle_message("s1", "hello").await.unwrap();
    assert_eq!(reply, "echo: hello");

    let history = service.history("s1").expect("session");
    assert_eq!(roles(&history), [TurnRole::User, TurnRole::Assistant]);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].content, "echo: hello");
}

#[tokio::test]
async fn user_text_is_recorded_as_sent() {
    let service = service_with(Arc::new(EchoGenerator::default()));
    let text = "  indented code:\n    let x = 1;\n";

    service.handle_message("s1", text).await.unwrap();

    let history = service.history("s1").unwrap();
    assert_eq!(history[0].content, text);
}

#[tokio::test]
async fn generator_sees_full_history_and_instructions() {
    let generator = Arc::new(EchoGenerator::default());
    let service = service_with(generator.clone());

    service.handle_message("s1", "first").await.unwrap();
    service.handle_message("s1", "second").await.unwrap();

    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    let (history, instructions) = &calls[1];
    assert_eq!(instructions, "Be brief.");
    let contents = history
        .iter()
        .map(|turn| turn.content.as_str())
        .collect::<Vec<_>>();
    assert_eq!(contents, ["first", "echo: first", "second"]);
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let generator = Arc::new(EchoGenerator::default());
    let service = service_with(generator);

    service.handle_message("a", "from a").await.unwrap();
    service.handle_message("b", "from b").await.unwrap();

    assert_eq!(service.history("a").unwrap().len(), 2);
    assert_eq!(service.history("b").unwrap()[0].content, "from b");
    assert_eq!(service.list_sessions().len(), 2);
}

#[tokio::test]
async fn empty_input_is_rejected_without_touching_store() {
    let service = service_with(Arc::new(EchoGenerator::default()));

    let error = service.handle_message("s1", "   ").await.unwrap_err();
    assert!(matches!(
        error,
        ConversationError::Validation(ValidationError::EmptyContent)
    ));
    let error = service.handle_message("  ", "hi").await.unwrap_err();
    assert!(matches!(
        error,
        ConversationError::Validation(ValidationError::EmptySessionId)
    ));
    assert!(service.store().is_empty());
}

#[tokio::test]
async fn empty_input_leaves_existing_session_unchanged() {
    let service = service_with(Arc::new(EchoGenerator::default()));
    service.handle_message("s1", "hello").await.unwrap();
    let before = service.list_sessions();

    let error = service.handle_message("s1", "   ").await.unwrap_err();
    assert!(matches!(
        error,
        ConversationError::Validation(ValidationError::EmptyContent)
    ));

    assert_eq!(service.history("s1").unwrap().len(), 2);
    assert_eq!(service.list_sessions(), before, "last_active untouched");
}

#[tokio::test]
async fn concurrent_identical_messages_each_keep_their_user_turn() {
    let service = service_with(Arc::new(RendezvousGenerator {
        barrier: Barrier::new(2),
    }));

    let (first, second) = tokio::join!(
        service.handle_message("s", "yes"),
        service.handle_message("s", "yes")
    );
    first.unwrap();
    second.unwrap();

    let history = service.history("s").unwrap();
    assert_eq!(history.len(), 4);
    let user_turns = history
        .iter()
        .filter(|turn| turn.role == TurnRole::User)
        .count();
    assert_eq!(user_turns, 2);
    assert!(
        history
            .iter()
            .all(|turn| turn.role == TurnRole::Assistant || turn.content == "yes")
    );
}

#[tokio::test]
async fn failed_generation_keeps_user_turn_and_retry_does_not_duplicate_it() {
    let service = service_with(Arc::new(FlakyGenerator {
        failures: Mutex::new(1),
    }));

    let error = service.handle_message("s1", "question").await.unwrap_err();
    assert!(matches!(error, ConversationError::GenerationFailure(_)));
    assert!(!error.is_retryable());
    let history = service.history("s1").expect("session kept");
    assert_eq!(roles(&history), [TurnRole::User]);

    let reply = service.handle_message("s1", "question").await.unwrap();
    assert_eq!(reply, "reply to 1 turns");
    let history = service.history("s1").unwrap();
    assert_eq!(roles(&history), [TurnRole::User, TurnRole::Assistant]);
}

#[tokio::test]
async fn slow_generation_times_out_and_is_retryable() {
    let service = service_with(Arc::new(SlowGenerator(Duration::from_secs(5))))
        .with_generation_timeout(Duration::from_millis(30));

    let error = service.handle_message("s1", "hi").await.unwrap_err();
    assert!(matches!(error, ConversationError::GenerationTimeout(_)));
    assert!(error.is_retryable());

    let history = service.history("s1").expect("session kept");
    assert_eq!(roles(&history), [TurnRole::User]);
}

#[tokio::test]
async fn blank_reply_is_a_generation_failure() {
    let service = service_with(Arc::new(BlankGenerator));

    let error = service.handle_message("s1", "hi").await.unwrap_err();
    assert!(matches!(
        error,
        ConversationError::GenerationFailure(GenerationError::EmptyReply)
    ));
    assert_eq!(service.history("s1").unwrap().len(), 1);
}

#[tokio::test]
async fn store_stays_usable_while_a_reply_is_generating() {
    let generator = Arc::new(GatedGenerator::default());
    let service = service_with(generator.clone());

    let in_flight = tokio::spawn({
        let service = service.clone();
        async move { service.handle_message("busy", "slow question").await }
    });
    generator.entered.notified().await;

    // Same session and other sessions are readable and writable mid-generation.
    assert_eq!(service.history("busy").unwrap().len(), 1);
    assert_eq!(service.list_sessions().len(), 1);
    service
        .store()
        .append_turn("other", TurnRole::User, "independent")
        .unwrap();
    assert_eq!(service.list_sessions().len(), 2);

    generator.release.notify_one();
    let reply = in_flight.await.unwrap().unwrap();
    assert_eq!(reply, "released");
    assert_eq!(service.history("busy").unwrap().len(), 2);
}

#[tokio::test]
async fn clear_session_reports_whether_it_existed() {
    let service = service_with(Arc::new(EchoGenerator::default()));
    service.handle_message("s1", "hi").await.unwrap();

    assert!(service.clear_session("s1"));
    assert!(!service.clear_session("s1"));
    assert!(service.history("s1").is_none());
}

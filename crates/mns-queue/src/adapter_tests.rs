//! Tests for the MNS transport adapter.

use super::*;
use crate::message::{Priority, ReceivedMessage};
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Transport Spy
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Receive(Option<u64>),
    Delete(String),
    Send(SendMessageRequest),
    Attributes,
}

#[derive(Default)]
struct SpyService {
    calls: Mutex<Vec<Call>>,
    receive_results: Mutex<VecDeque<Result<ReceivedMessage, QueueTransportError>>>,
    delete_result: Mutex<Option<QueueTransportError>>,
}

impl SpyService {
    fn with_receive(results: Vec<Result<ReceivedMessage, QueueTransportError>>) -> Self {
        Self {
            receive_results: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueService for SpyService {
    async fn receive_message(
        &self,
        wait: Option<WaitSeconds>,
    ) -> Result<ReceivedMessage, QueueTransportError> {
        self.record(Call::Receive(wait.map(|w| w.as_secs())));
        self.receive_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(empty_queue()))
    }

    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<bool, QueueTransportError> {
        self.record(Call::Delete(receipt.as_str().to_string()));
        match self.delete_result.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(true),
        }
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<MessageId, QueueTransportError> {
        self.record(Call::Send(request.clone()));
        Ok("sent-1".parse().unwrap())
    }

    async fn get_attributes(&self) -> Result<QueueAttributes, QueueTransportError> {
        self.record(Call::Attributes);
        Ok(QueueAttributes {
            queue_name: "test-queue".to_string(),
            active_messages: 4,
            ..QueueAttributes::default()
        })
    }
}

// ============================================================================
// Test Helper Functions
// ============================================================================

fn test_config() -> QueueConfig {
    QueueConfig::new(
        "https://123456.mns.cn-hangzhou.aliyuncs.com",
        "test-access",
        "test-secret",
        "test-queue",
    )
}

fn empty_queue() -> QueueTransportError {
    QueueTransportError::new(QueueTransportError::MESSAGE_NOT_EXIST, "Message not exist.")
        .with_status(404)
}

fn received(id: &str, body: &str) -> ReceivedMessage {
    ReceivedMessage {
        message_id: id.parse().unwrap(),
        receipt_handle: ReceiptHandle::new(format!("rh-{}", id)),
        body: body.to_string(),
        enqueue_time: Utc::now().timestamp_millis(),
        next_visible_time: None,
        first_dequeue_time: None,
        dequeue_count: Some(1),
        priority: Some(8),
    }
}

fn adapter(service: SpyService) -> MnsQueue<SpyService> {
    MnsQueue::with_service(&test_config(), service).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn test_each_missing_field_is_rejected() {
        let configs = [
            QueueConfig::new("", "a", "s", "q"),
            QueueConfig::new("https://mns.example.com", "", "s", "q"),
            QueueConfig::new("https://mns.example.com", "a", "", "q"),
            QueueConfig::new("https://mns.example.com", "a", "s", ""),
        ];

        for config in configs {
            let result = MnsQueue::with_service(&config, SpyService::default());
            assert!(matches!(result, Err(ConfigurationError::Missing { .. })));
        }
    }

    #[tokio::test]
    async fn test_invalid_config_makes_no_transport_calls() {
        let spy = std::sync::Arc::new(SpyService::default());
        let config = QueueConfig::new("https://mns.example.com", "a", "", "q");

        let result = MnsQueue::with_service(&config, ArcService(spy.clone()));

        assert!(result.is_err());
        assert!(spy.calls().is_empty());
    }

    #[test]
    fn test_connect_rejects_config_without_network() {
        let config = QueueConfig::new("https://mns.example.com", "a", "s", "");

        let result = MnsQueue::connect(&config);
        assert!(matches!(result, Err(WorkerError::Configuration(_))));
    }

    #[test]
    fn test_connect_builds_queue_handle() {
        let queue = MnsQueue::connect(&test_config()).unwrap();

        assert_eq!(queue.queue_name(), "test-queue");
        assert_eq!(queue.service().queue_name(), "test-queue");
    }

    /// Shares a spy with the test so it can be inspected after a failed build
    struct ArcService(std::sync::Arc<SpyService>);

    #[async_trait]
    impl QueueService for ArcService {
        async fn receive_message(
            &self,
            wait: Option<WaitSeconds>,
        ) -> Result<ReceivedMessage, QueueTransportError> {
            self.0.receive_message(wait).await
        }

        async fn delete_message(
            &self,
            receipt: &ReceiptHandle,
        ) -> Result<bool, QueueTransportError> {
            self.0.delete_message(receipt).await
        }

        async fn send_message(
            &self,
            request: &SendMessageRequest,
        ) -> Result<MessageId, QueueTransportError> {
            self.0.send_message(request).await
        }

        async fn get_attributes(&self) -> Result<QueueAttributes, QueueTransportError> {
            self.0.get_attributes().await
        }
    }
}

// ============================================================================
// Reserve
// ============================================================================

mod reserve_tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_builds_message() {
        let queue = adapter(SpyService::with_receive(vec![Ok(received("m1", "X"))]));

        let message = queue
            .reserve(Some(WaitSeconds::new(3).unwrap()))
            .await
            .unwrap()
            .expect("message expected");

        assert_eq!(message.id.as_str(), "m1");
        assert_eq!(message.body.as_ref(), b"X");
        assert_eq!(message.receipt_handle.as_str(), "rh-m1");
        assert_eq!(message.ttr, 0);
        assert!(message.attempt >= 0.0 && message.attempt < 5.0);
        assert_eq!(message.dequeue_count, Some(1));
        assert_eq!(queue.service().calls(), vec![Call::Receive(Some(3))]);
    }

    #[tokio::test]
    async fn test_reserve_attempt_is_elapsed_time() {
        let mut old = received("m1", "X");
        old.enqueue_time = Utc::now().timestamp_millis() - 60_000;
        let queue = adapter(SpyService::with_receive(vec![Ok(old)]));

        let message = queue.reserve(None).await.unwrap().unwrap();

        assert!(message.attempt >= 60.0 && message.attempt < 65.0);
    }

    #[tokio::test]
    async fn test_empty_queue_is_none() {
        let queue = adapter(SpyService::with_receive(vec![Err(empty_queue())]));

        let result = queue.reserve(None).await.unwrap();

        assert!(result.is_none());
        assert_eq!(queue.service().calls(), vec![Call::Receive(None)]);
    }

    #[tokio::test]
    async fn test_other_errors_keep_code_and_message() {
        let queue = adapter(SpyService::with_receive(vec![Err(QueueTransportError::new(
            "QueueNotExist",
            "The queue name you provided is not exist.",
        ))]));

        let error = queue.reserve(None).await.unwrap_err();

        assert_eq!(error.code(), "QueueNotExist");
        assert_eq!(error.message(), "The queue name you provided is not exist.");
    }

    #[tokio::test]
    async fn test_base64_body_is_decoded() {
        let service = SpyService::with_receive(vec![Ok(received("m1", "aGVsbG8gd29ybGQ="))]);
        let queue = MnsQueue::with_service(&test_config().with_base64(true), service).unwrap();

        let message = queue.reserve(None).await.unwrap().unwrap();

        assert_eq!(message.body.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_malformed() {
        let service = SpyService::with_receive(vec![Ok(received("m1", "not base64!"))]);
        let queue = MnsQueue::with_service(&test_config().with_base64(true), service).unwrap();

        let error = queue.reserve(None).await.unwrap_err();

        assert_eq!(error.code(), QueueTransportError::MALFORMED_RESPONSE);
    }

    #[tokio::test]
    async fn test_plain_body_is_passed_through() {
        let queue = adapter(SpyService::with_receive(vec![Ok(received(
            "m1",
            "aGVsbG8gd29ybGQ=",
        ))]));

        let message = queue.reserve(None).await.unwrap().unwrap();

        assert_eq!(message.body.as_ref(), b"aGVsbG8gd29ybGQ=");
    }
}

// ============================================================================
// Acknowledge, Publish and Metadata
// ============================================================================

mod operation_tests {
    use super::*;

    #[tokio::test]
    async fn test_acknowledge_forwards_receipt() {
        let queue = adapter(SpyService::default());

        let deleted = queue.acknowledge(&ReceiptHandle::new("rh-m1")).await.unwrap();

        assert!(deleted);
        assert_eq!(queue.service().calls(), vec![Call::Delete("rh-m1".to_string())]);
    }

    #[tokio::test]
    async fn test_acknowledge_error_surfaces() {
        let spy = SpyService::default();
        *spy.delete_result.lock().unwrap() = Some(QueueTransportError::new(
            "ReceiptHandleError",
            "The receipt handle you provided is not valid.",
        ));
        let queue = adapter(spy);

        let error = queue
            .acknowledge(&ReceiptHandle::new("expired"))
            .await
            .unwrap_err();

        assert_eq!(error.code(), "ReceiptHandleError");
    }

    #[tokio::test]
    async fn test_publish_encodes_body_and_options() {
        let queue = MnsQueue::with_service(
            &test_config().with_base64(true),
            SpyService::default(),
        )
        .unwrap();
        let options = SendOptions::new()
            .with_ttr(60)
            .with_delay(10)
            .with_priority(Priority::new(2).unwrap());

        let id = queue.publish(b"hello world", &options).await.unwrap();

        assert_eq!(id.as_str(), "sent-1");
        assert_eq!(
            queue.service().calls(),
            vec![Call::Send(SendMessageRequest {
                body: "aGVsbG8gd29ybGQ=".to_string(),
                delay_seconds: 10,
                priority: 2,
            })]
        );
    }

    #[tokio::test]
    async fn test_publish_plain_text_body() {
        let queue = adapter(SpyService::default());

        queue.publish(b"{\"job\":1}", &SendOptions::new()).await.unwrap();

        assert_eq!(
            queue.service().calls(),
            vec![Call::Send(SendMessageRequest {
                body: "{\"job\":1}".to_string(),
                delay_seconds: 0,
                priority: 8,
            })]
        );
    }

    #[tokio::test]
    async fn test_publish_rejects_binary_without_base64() {
        let queue = adapter(SpyService::default());

        let result = queue.publish(&[0xff, 0xfe], &SendOptions::new()).await;

        match result.unwrap_err() {
            WorkerError::InvalidArgument { arg, .. } => assert_eq!(arg, "body"),
            other => panic!("Expected invalid argument, got {:?}", other),
        }
        assert!(queue.service().calls().is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejects_excessive_delay() {
        let queue = adapter(SpyService::default());
        let options = SendOptions::new().with_delay(SendOptions::MAX_DELAY_SECONDS + 1);

        let result = queue.publish(b"x", &options).await;

        assert!(matches!(result, Err(WorkerError::Configuration(_))));
        assert!(queue.service().calls().is_empty());
    }

    #[tokio::test]
    async fn test_query_attributes() {
        let queue = adapter(SpyService::default());

        let attributes = queue.query_attributes().await.unwrap();

        assert_eq!(attributes.active_messages, 4);
        assert_eq!(queue.service().calls(), vec![Call::Attributes]);
    }

    #[test]
    fn test_status_is_always_unsupported() {
        let queue = adapter(SpyService::default());

        for id in ["m1", "", "never-issued", "5F290C926D472878-2-14D9529A8FA-200000001"] {
            let error = queue.query_status(id).unwrap_err();
            assert_eq!(error.operation, "status");
            assert_eq!(error.transport, "MNS");
        }
        assert!(queue.service().calls().is_empty());
    }
}

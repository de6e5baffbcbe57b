//! Aliyun MNS client using the HTTP REST API.
//!
//! Requests are built and signed by hand instead of going through a vendor SDK,
//! which keeps the transport small and lets tests point the client at a mock
//! HTTP server.
//!
//! ## Authentication
//!
//! Every request carries `Authorization: MNS {AccessKeyId}:{Signature}` where the
//! signature is the base64 HMAC-SHA1 of:
//!
//! ```text
//! VERB \n CONTENT-MD5 \n CONTENT-TYPE \n DATE \n CanonicalizedMNSHeaders CanonicalizedResource
//! ```
//!
//! `CanonicalizedMNSHeaders` are the lower-cased `x-mns-*` headers sorted by name,
//! each rendered as `name:value\n`. `CanonicalizedResource` is the request path
//! including its query string.
//!
//! ## Primitives
//!
//! | Operation      | Request                                          |
//! |----------------|--------------------------------------------------|
//! | receive        | `GET /queues/{queue}/messages?waitseconds=N`     |
//! | delete         | `DELETE /queues/{queue}/messages?ReceiptHandle=` |
//! | send           | `POST /queues/{queue}/messages`                  |
//! | get attributes | `GET /queues/{queue}`                            |

use crate::config::{QueueConfig, SecretKey};
use crate::error::{QueueTransportError, WorkerError};
use crate::message::{
    MessageId, QueueAttributes, ReceiptHandle, ReceivedMessage, SendMessageRequest, WaitSeconds,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client as HttpClient, Method, StatusCode};
use sha1::Sha1;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, trace};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// API version sent in `x-mns-version`
pub const MNS_API_VERSION: &str = "2015-06-06";

const XML_NAMESPACE: &str = "http://mns.aliyuncs.com/doc/v1/";
const CONTENT_TYPE_XML: &str = "text/xml;charset=utf-8";

/// Extra time allowed on top of the long-poll wait before a request times out
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

// ============================================================================
// Queue Service Primitives
// ============================================================================

/// The four remote primitives the transport adapter is built on
///
/// Implemented by [`QueueRef`] for a real MNS queue and by fakes in tests.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Long-poll for one message
    ///
    /// An empty queue is reported the way the service reports it: as an error
    /// whose code is [`QueueTransportError::MESSAGE_NOT_EXIST`].
    async fn receive_message(
        &self,
        wait: Option<WaitSeconds>,
    ) -> Result<ReceivedMessage, QueueTransportError>;

    /// Delete a received message; `true` when the service confirms the delete
    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<bool, QueueTransportError>;

    /// Send one message and return the id the service assigned
    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<MessageId, QueueTransportError>;

    /// Fetch queue-level attributes
    async fn get_attributes(&self) -> Result<QueueAttributes, QueueTransportError>;
}

// ============================================================================
// Request Signing
// ============================================================================

type HmacSha1 = Hmac<Sha1>;

/// MNS request signer
#[derive(Clone)]
struct MnsSigner {
    access_key: String,
    secret_key: SecretKey,
}

impl MnsSigner {
    fn new(access_key: String, secret_key: SecretKey) -> Self {
        Self {
            access_key,
            secret_key,
        }
    }

    /// Build the canonical string covered by the signature
    fn string_to_sign(
        method: &str,
        content_md5: &str,
        content_type: &str,
        date: &str,
        mns_headers: &BTreeMap<String, String>,
        resource: &str,
    ) -> String {
        let canonical_headers: String = mns_headers
            .iter()
            .filter(|(name, _)| name.starts_with("x-mns-"))
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();

        format!(
            "{}\n{}\n{}\n{}\n{}{}",
            method, content_md5, content_type, date, canonical_headers, resource
        )
    }

    /// Compute the `Authorization` header value for a request
    fn authorization(
        &self,
        method: &str,
        content_type: &str,
        date: &str,
        mns_headers: &BTreeMap<String, String>,
        resource: &str,
    ) -> String {
        let string_to_sign =
            Self::string_to_sign(method, "", content_type, date, mns_headers, resource);

        format!(
            "MNS {}:{}",
            self.access_key,
            self.signature(&string_to_sign)
        )
    }

    fn signature(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.expose().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// Format a timestamp the way the `Date` header expects it
fn http_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ============================================================================
// MNS Client
// ============================================================================

/// Account-level MNS client
///
/// Holds the HTTP connection pool and credentials. Cheap to clone; clones share
/// the pool.
#[derive(Clone)]
pub struct MnsClient {
    http_client: HttpClient,
    signer: MnsSigner,
    endpoint: String,
}

impl MnsClient {
    /// Create a client from a validated configuration
    ///
    /// No request is sent here.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::Configuration`] if the configuration is incomplete
    /// - [`WorkerError::Transport`] if the HTTP client cannot be built
    pub fn new(config: &QueueConfig) -> Result<Self, WorkerError> {
        config.validate()?;

        let http_client = HttpClient::builder()
            .build()
            .map_err(|e| QueueTransportError::network("Failed to create HTTP client", e))?;

        Ok(Self {
            http_client,
            signer: MnsSigner::new(config.access_key.clone(), config.secret_key.clone()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Handle for a single queue on this account
    pub fn queue_ref(&self, queue_name: &str) -> QueueRef {
        QueueRef {
            client: self.clone(),
            queue_name: queue_name.to_string(),
        }
    }

    /// Send a signed request and return the status and body text
    ///
    /// Non-success statuses are turned into a [`QueueTransportError`] built from
    /// the service's error document.
    async fn execute(
        &self,
        method: Method,
        resource: &str,
        body: Option<String>,
        timeout: Duration,
    ) -> Result<(StatusCode, String), QueueTransportError> {
        let date = http_date(&Utc::now());
        let content_type = if body.is_some() { CONTENT_TYPE_XML } else { "" };

        let mut mns_headers = BTreeMap::new();
        mns_headers.insert("x-mns-version".to_string(), MNS_API_VERSION.to_string());

        let authorization = self.signer.authorization(
            method.as_str(),
            content_type,
            &date,
            &mns_headers,
            resource,
        );

        let url = format!("{}{}", self.endpoint, resource);
        trace!(method = %method, url = %url, "Sending MNS request");

        let mut request = self
            .http_client
            .request(method, &url)
            .timeout(timeout)
            .header("Date", &date)
            .header("Authorization", authorization);

        for (name, value) in &mns_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(body) = body {
            request = request.header("Content-Type", content_type).body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                QueueTransportError::network(format!("Request timeout: {}", e), e)
            } else if e.is_connect() {
                QueueTransportError::network(format!("Connection failed: {}", e), e)
            } else {
                QueueTransportError::network(format!("HTTP request failed: {}", e), e)
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            QueueTransportError::network(format!("Failed to read response body: {}", e), e)
        })?;

        if !status.is_success() {
            return Err(parse_error_response(&text, status.as_u16()));
        }

        Ok((status, text))
    }
}

impl fmt::Debug for MnsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnsClient")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.signer.access_key)
            .finish()
    }
}

// ============================================================================
// Queue Handle
// ============================================================================

/// A single MNS queue, resolved once and reused for every call
#[derive(Debug, Clone)]
pub struct QueueRef {
    client: MnsClient,
    queue_name: String,
}

impl QueueRef {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn messages_resource(&self) -> String {
        format!("/queues/{}/messages", self.queue_name)
    }

    fn default_timeout() -> Duration {
        REQUEST_TIMEOUT_MARGIN
    }
}

#[async_trait]
impl QueueService for QueueRef {
    async fn receive_message(
        &self,
        wait: Option<WaitSeconds>,
    ) -> Result<ReceivedMessage, QueueTransportError> {
        // Without an explicit wait the queue's own PollingWaitSeconds applies,
        // which is never longer than the service maximum.
        let poll = wait
            .map(|w| w.as_secs())
            .unwrap_or(WaitSeconds::MAX as u64);
        let timeout = Duration::from_secs(poll) + REQUEST_TIMEOUT_MARGIN;

        let resource = match wait {
            Some(wait) => format!("{}?waitseconds={}", self.messages_resource(), wait.as_secs()),
            None => self.messages_resource(),
        };

        let (_, body) = self
            .client
            .execute(Method::GET, &resource, None, timeout)
            .await?;

        parse_receive_message_response(&body)
    }

    async fn delete_message(&self, receipt: &ReceiptHandle) -> Result<bool, QueueTransportError> {
        let resource = format!(
            "{}?ReceiptHandle={}",
            self.messages_resource(),
            urlencoding::encode(receipt.as_str())
        );

        let (status, _) = self
            .client
            .execute(Method::DELETE, &resource, None, Self::default_timeout())
            .await?;

        Ok(status == StatusCode::NO_CONTENT)
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<MessageId, QueueTransportError> {
        let body = build_send_message_body(request);

        let (_, response) = self
            .client
            .execute(
                Method::POST,
                &self.messages_resource(),
                Some(body),
                Self::default_timeout(),
            )
            .await?;

        let fields = parse_flat_document(&response, "Message")?;
        let message_id = required(&fields, "MessageId")?;
        debug!(message_id = %message_id, queue = %self.queue_name, "Message sent");

        MessageId::from_str(message_id)
            .map_err(|_| QueueTransportError::malformed("Empty MessageId in send response"))
    }

    async fn get_attributes(&self) -> Result<QueueAttributes, QueueTransportError> {
        let resource = format!("/queues/{}", self.queue_name);

        let (_, body) = self
            .client
            .execute(Method::GET, &resource, None, Self::default_timeout())
            .await?;

        parse_queue_attributes_response(&body)
    }
}

// ============================================================================
// XML Documents
// ============================================================================

/// Render the body of a SendMessage request
fn build_send_message_body(request: &SendMessageRequest) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Message xmlns=\"{}\">\
         <MessageBody>{}</MessageBody>\
         <DelaySeconds>{}</DelaySeconds>\
         <Priority>{}</Priority>\
         </Message>",
        XML_NAMESPACE,
        quick_xml::escape::escape(&request.body),
        request.delay_seconds,
        request.priority
    )
}

/// Collect the child elements of a one-level XML document into a map
///
/// All MNS responses used here are flat: a root element whose children hold
/// text. An `<Error>` root is turned into the error it describes.
fn parse_flat_document(
    xml: &str,
    expected_root: &str,
) -> Result<HashMap<String, String>, QueueTransportError> {
    let mut reader = Reader::from_str(xml);

    let mut fields = HashMap::new();
    let mut root: Option<String> = None;
    let mut current: Option<String> = None;
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match depth {
                    1 => root = Some(name),
                    2 => {
                        fields.entry(name.clone()).or_insert_with(String::new);
                        current = Some(name);
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) if depth == 1 => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                fields.insert(name, String::new());
            }
            Ok(Event::Text(e)) if depth == 2 => {
                if let Some(ref name) = current {
                    let text = e.unescape().map_err(|e| {
                        QueueTransportError::malformed(format!("Failed to parse XML: {}", e))
                    })?;
                    if let Some(value) = fields.get_mut(name) {
                        value.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(e)) if depth == 2 => {
                if let Some(ref name) = current {
                    if let Some(value) = fields.get_mut(name) {
                        value.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(QueueTransportError::malformed(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some(name) if name == expected_root => Ok(fields),
        Some("Error") => Err(error_from_fields(&fields, None)),
        Some(other) => Err(QueueTransportError::malformed(format!(
            "Expected <{}> document, found <{}>",
            expected_root, other
        ))),
        None => Err(QueueTransportError::malformed(format!(
            "Expected <{}> document, found empty response",
            expected_root
        ))),
    }
}

/// Turn an error response into a transport error
///
/// Falls back to a generic code when the body is not an MNS error document.
fn parse_error_response(xml: &str, status_code: u16) -> QueueTransportError {
    match parse_flat_document(xml, "Error") {
        Ok(fields) => error_from_fields(&fields, Some(status_code)),
        Err(_) => QueueTransportError::new(
            QueueTransportError::UNKNOWN_ERROR,
            format!("HTTP status {} without an MNS error document", status_code),
        )
        .with_status(status_code),
    }
}

fn error_from_fields(fields: &HashMap<String, String>, status: Option<u16>) -> QueueTransportError {
    let code = fields
        .get("Code")
        .filter(|c| !c.is_empty())
        .cloned()
        .unwrap_or_else(|| QueueTransportError::UNKNOWN_ERROR.to_string());
    let message = fields
        .get("Message")
        .cloned()
        .unwrap_or_else(|| "Unknown error".to_string());

    let mut error = QueueTransportError::new(code, message);
    if let Some(request_id) = fields.get("RequestId").filter(|r| !r.is_empty()) {
        error = error.with_request_id(request_id.clone());
    }
    if let Some(status) = status {
        error = error.with_status(status);
    }
    error
}

fn required<'a>(
    fields: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, QueueTransportError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| QueueTransportError::malformed(format!("{} not found in response", name)))
}

fn optional_number<T: FromStr>(
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, QueueTransportError> {
    match fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map(Some).map_err(|_| {
            QueueTransportError::malformed(format!("{} is not a number: '{}'", name, value))
        }),
        None => Ok(None),
    }
}

/// Parse a ReceiveMessage response
fn parse_receive_message_response(xml: &str) -> Result<ReceivedMessage, QueueTransportError> {
    let fields = parse_flat_document(xml, "Message")?;

    let message_id = MessageId::from_str(required(&fields, "MessageId")?)
        .map_err(|_| QueueTransportError::malformed("Empty MessageId in receive response"))?;
    let receipt_handle = required(&fields, "ReceiptHandle")?;
    if receipt_handle.is_empty() {
        return Err(QueueTransportError::malformed(
            "Empty ReceiptHandle in receive response",
        ));
    }

    let enqueue_time = optional_number::<i64>(&fields, "EnqueueTime")?
        .ok_or_else(|| QueueTransportError::malformed("EnqueueTime not found in response"))?;

    Ok(ReceivedMessage {
        message_id,
        receipt_handle: ReceiptHandle::new(receipt_handle),
        body: required(&fields, "MessageBody")?.to_string(),
        enqueue_time,
        next_visible_time: optional_number(&fields, "NextVisibleTime")?,
        first_dequeue_time: optional_number(&fields, "FirstDequeueTime")?,
        dequeue_count: optional_number(&fields, "DequeueCount")?,
        priority: optional_number(&fields, "Priority")?,
    })
}

/// Parse a GetQueueAttributes response
fn parse_queue_attributes_response(xml: &str) -> Result<QueueAttributes, QueueTransportError> {
    let fields = parse_flat_document(xml, "Queue")?;
    let number = |name: &str| optional_number::<u64>(&fields, name).map(|v| v.unwrap_or(0));

    Ok(QueueAttributes {
        queue_name: fields.get("QueueName").cloned().unwrap_or_default(),
        create_time: number("CreateTime")?,
        last_modify_time: number("LastModifyTime")?,
        delay_seconds: number("DelaySeconds")?,
        maximum_message_size: number("MaximumMessageSize")?,
        message_retention_period: number("MessageRetentionPeriod")?,
        visibility_timeout: number("VisibilityTimeout")?,
        polling_wait_seconds: number("PollingWaitSeconds")?,
        active_messages: number("ActiveMessages")?,
        inactive_messages: number("InactiveMessages")?,
        delay_messages: number("DelayMessages")?,
        logging_enabled: fields
            .get("LoggingEnabled")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    })
}

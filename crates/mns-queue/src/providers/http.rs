//! MNS client over the REST/XML API.
//!
//! Requests are signed by hand with the MNS scheme instead of going through a
//! vendor SDK, which keeps the client small and lets tests point it at a mock
//! HTTP server.
//!
//! ## Signing
//!
//! ```text
//! Authorization: MNS <AccessKeyId>:<Signature>
//! Signature = base64(HMAC-SHA1(secret,
//!     VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n" + Date + "\n"
//!     + CanonicalizedMNSHeaders + CanonicalizedResource))
//! ```
//!
//! `CanonicalizedMNSHeaders` are the lower-cased `x-mns-*` headers, sorted by
//! name, each rendered as `name:value\n`. `CanonicalizedResource` is the
//! request path including its query string.
//!
//! ## Example
//!
//! ```no_run
//! use mns_queue::providers::MnsHttpClient;
//! use mns_queue::ConnectionConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectionConfig::new(
//!     "https://1234567890.mns.cn-hangzhou.aliyuncs.com",
//!     "LTAI-access-key",
//!     "access-secret",
//!     "default",
//! );
//! let client = MnsHttpClient::from_config(&config)?;
//! # Ok(())
//! # }
//! ```

use crate::client::MnsClient;
use crate::config::{ConnectionConfig, HttpOptions};
use crate::error::MnsError;
use crate::message::{
    BatchDeleteOutcome, DeleteFailure, MessageId, QueueAttributes, QueueName, ReceiptHandle,
    ReceivedMessage, SendMessageRequest, SendMessageResponse, Timestamp, VisibilityChange,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client as HttpClient, Method};
use sha1::Sha1;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

/// API version sent in `x-mns-version`
pub const MNS_API_VERSION: &str = "2015-06-06";

const CONTENT_TYPE: &str = "text/xml;charset=utf-8";
const XML_NAMESPACE: &str = "http://mns.aliyuncs.com/doc/v1/";

// ============================================================================
// Request Signing
// ============================================================================

type HmacSha1 = Hmac<Sha1>;

/// Access key pair plus optional STS token
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Produces `Authorization` headers for MNS requests
#[derive(Clone, Debug)]
struct MnsSigner {
    credentials: Credentials,
}

impl MnsSigner {
    fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// `x-mns-*` headers every request carries
    fn mns_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("x-mns-version".to_string(), MNS_API_VERSION.to_string());
        if let Some(token) = &self.credentials.security_token {
            headers.insert("x-mns-security-token".to_string(), token.clone());
        }
        headers
    }

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
            .map(|(name, value)| format!("{}:{}\n", name.to_ascii_lowercase(), value))
            .collect();

        format!(
            "{}\n{}\n{}\n{}\n{}{}",
            method, content_md5, content_type, date, canonical_headers, resource
        )
    }

    fn signature(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha1::new_from_slice(self.credentials.access_key_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn authorization(&self, string_to_sign: &str) -> String {
        format!(
            "MNS {}:{}",
            self.credentials.access_key_id,
            self.signature(string_to_sign)
        )
    }
}

/// RFC 1123 date as required by the `Date` header
fn http_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ============================================================================
// MNS HTTP Client
// ============================================================================

/// MNS client speaking the REST/XML API
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct MnsHttpClient {
    http_client: HttpClient,
    signer: MnsSigner,
    endpoint: String,
    base64_body: bool,
}

impl MnsHttpClient {
    /// Create new client for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is empty or the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        credentials: Credentials,
        options: &HttpOptions,
    ) -> Result<Self, MnsError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(MnsError::Configuration(
                "Endpoint cannot be empty".to_string(),
            ));
        }

        let mut builder =
            HttpClient::builder().timeout(std::time::Duration::from_secs(options.timeout));
        if let Some(connect_timeout) = options.connect_timeout {
            builder = builder.connect_timeout(std::time::Duration::from_secs(connect_timeout));
        }
        let http_client = builder
            .build()
            .map_err(|e| MnsError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer: MnsSigner::new(credentials),
            endpoint,
            base64_body: options.base64_body,
        })
    }

    /// Create a data-plane client from connection settings
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, MnsError> {
        Self::new(&config.endpoint, Self::credentials(config), &config.http)
    }

    /// Create a client for the separate console endpoint, if one is configured
    pub fn console_from_config(config: &ConnectionConfig) -> Result<Option<Self>, MnsError> {
        config
            .console_endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, Self::credentials(config), &config.http))
            .transpose()
    }

    fn credentials(config: &ConnectionConfig) -> Credentials {
        let credentials = Credentials::new(config.key.clone(), config.secret.clone());
        match &config.token {
            Some(token) => credentials.with_security_token(token.clone()),
            None => credentials,
        }
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a signed request and return status plus body, whatever the status
    #[instrument(skip(self, body), fields(endpoint = %self.endpoint))]
    async fn execute(
        &self,
        method: Method,
        resource: &str,
        body: Option<String>,
    ) -> Result<(u16, String), MnsError> {
        let date = http_date(&Utc::now());
        let mns_headers = self.signer.mns_headers();
        let string_to_sign = MnsSigner::string_to_sign(
            method.as_str(),
            "",
            CONTENT_TYPE,
            &date,
            &mns_headers,
            resource,
        );

        let url = format!("{}{}", self.endpoint, resource);
        let mut request = self
            .http_client
            .request(method, &url)
            .header("Date", &date)
            .header("Content-Type", CONTENT_TYPE)
            .header("Authorization", self.signer.authorization(&string_to_sign));

        for (name, value) in &mns_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MnsError::Network(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                MnsError::Network(format!("Connection failed: {}", e))
            } else {
                MnsError::Network(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| MnsError::Network(format!("Failed to read response body: {}", e)))?;

        debug!(status, "MNS response received");
        Ok((status, text))
    }

    /// Send a signed request, turning any non-2xx answer into an error
    async fn request(
        &self,
        method: Method,
        resource: &str,
        body: Option<String>,
    ) -> Result<String, MnsError> {
        let (status, text) = self.execute(method, resource, body).await?;
        if !is_success(status) {
            return Err(parse_error_response(&text, status));
        }
        Ok(text)
    }

    fn encode_body(&self, body: &str) -> String {
        if self.base64_body {
            STANDARD.encode(body.as_bytes())
        } else {
            body.to_string()
        }
    }
}

impl fmt::Debug for MnsHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnsHttpClient")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.signer.credentials)
            .field("base64_body", &self.base64_body)
            .finish()
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn messages_resource(queue: &QueueName) -> String {
    format!("/queues/{}/messages", queue.as_str())
}

#[async_trait]
impl MnsClient for MnsHttpClient {
    async fn send_message(
        &self,
        queue: &QueueName,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, MnsError> {
        let body = send_message_body(&self.encode_body(&request.message_body), &request);
        let response = self
            .request(Method::POST, &messages_resource(queue), Some(body))
            .await?;

        parse_send_message_response(&response)
    }

    async fn receive_message(
        &self,
        queue: &QueueName,
        wait_seconds: Option<u32>,
    ) -> Result<ReceivedMessage, MnsError> {
        let mut resource = messages_resource(queue);
        if let Some(wait) = wait_seconds {
            resource.push_str(&format!("?waitseconds={}", wait));
        }

        let response = self.request(Method::GET, &resource, None).await?;
        parse_received_messages(&response, self.base64_body)?
            .into_iter()
            .next()
            .ok_or_else(|| MnsError::Serialization("Message not found in response".to_string()))
    }

    async fn batch_receive_message(
        &self,
        queue: &QueueName,
        num_of_messages: u32,
        wait_seconds: Option<u32>,
    ) -> Result<Vec<ReceivedMessage>, MnsError> {
        let mut resource = format!(
            "{}?numOfMessages={}",
            messages_resource(queue),
            num_of_messages
        );
        if let Some(wait) = wait_seconds {
            resource.push_str(&format!("&waitseconds={}", wait));
        }

        let response = self.request(Method::GET, &resource, None).await?;
        parse_received_messages(&response, self.base64_body)
    }

    async fn batch_delete_message(
        &self,
        queue: &QueueName,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<BatchDeleteOutcome, MnsError> {
        let body = batch_delete_body(receipt_handles);
        let (status, text) = self
            .execute(Method::DELETE, &messages_resource(queue), Some(body))
            .await?;

        if is_success(status) {
            return Ok(BatchDeleteOutcome::default());
        }

        let failures = parse_delete_failures(&text)?;
        if failures.is_empty() {
            return Err(parse_error_response(&text, status));
        }

        Ok(BatchDeleteOutcome { failures })
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<VisibilityChange, MnsError> {
        let resource = format!(
            "{}?receiptHandle={}&visibilityTimeout={}",
            messages_resource(queue),
            urlencoding::encode(receipt_handle.as_str()),
            visibility_timeout
        );

        let response = self.request(Method::PUT, &resource, None).await?;
        parse_visibility_change(&response)
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MnsError> {
        let resource = format!(
            "{}?ReceiptHandle={}",
            messages_resource(queue),
            urlencoding::encode(receipt_handle.as_str())
        );

        self.request(Method::DELETE, &resource, None).await?;
        Ok(())
    }

    async fn get_queue_attributes(&self, queue: &QueueName) -> Result<QueueAttributes, MnsError> {
        let resource = format!("/queues/{}", queue.as_str());
        let response = self.request(Method::GET, &resource, None).await?;
        parse_queue_attributes(&response)
    }
}

// ============================================================================
// XML Bodies
// ============================================================================

fn send_message_body(encoded_body: &str, request: &SendMessageRequest) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Message xmlns="{}"><MessageBody>{}</MessageBody>"#,
        XML_NAMESPACE,
        escape(encoded_body)
    );
    if let Some(delay) = request.delay_seconds {
        xml.push_str(&format!("<DelaySeconds>{}</DelaySeconds>", delay));
    }
    if let Some(priority) = request.priority {
        xml.push_str(&format!("<Priority>{}</Priority>", priority));
    }
    xml.push_str("</Message>");
    xml
}

fn batch_delete_body(receipt_handles: &[ReceiptHandle]) -> String {
    let handles: String = receipt_handles
        .iter()
        .map(|handle| format!("<ReceiptHandle>{}</ReceiptHandle>", escape(handle.as_str())))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ReceiptHandles xmlns="{}">{}</ReceiptHandles>"#,
        XML_NAMESPACE, handles
    )
}

// ============================================================================
// XML Parsing
// ============================================================================

/// Collect the child element texts of every `record` element
///
/// `MessageBody` keeps its text verbatim; every other field is trimmed.
fn collect_records(xml: &str, record: &str) -> Result<Vec<HashMap<String, String>>, MnsError> {
    let mut reader = Reader::from_str(xml);

    let mut records = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == record {
                    current = Some(HashMap::new());
                    field = None;
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = e.unescape().map_err(|e| {
                        MnsError::Serialization(format!("Failed to parse XML: {}", e))
                    })?;
                    fields.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    fields.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == record.as_bytes() {
                    if let Some(fields) = current.take() {
                        records.push(fields);
                    }
                } else if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    if name != "MessageBody" {
                        if let Some(value) = fields.get_mut(name) {
                            *value = value.trim().to_string();
                        }
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MnsError::Serialization(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn parse_number<T: FromStr>(fields: &HashMap<String, String>, name: &str) -> Option<T> {
    fields.get(name).and_then(|value| value.trim().parse().ok())
}

fn parse_timestamp(fields: &HashMap<String, String>, name: &str) -> Option<Timestamp> {
    parse_number::<i64>(fields, name).and_then(Timestamp::from_millis)
}

/// Parse the `Error` document MNS returns with non-2xx answers
fn parse_error_response(xml: &str, status: u16) -> MnsError {
    let fields = collect_records(xml, "Error")
        .ok()
        .and_then(|records| records.into_iter().next())
        .unwrap_or_default();

    MnsError::Service {
        status,
        code: fields
            .get("Code")
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()),
        message: fields
            .get("Message")
            .cloned()
            .unwrap_or_else(|| format!("HTTP status {}", status)),
        request_id: fields.get("RequestId").cloned(),
    }
}

fn parse_send_message_response(xml: &str) -> Result<SendMessageResponse, MnsError> {
    let fields = collect_records(xml, "Message")?
        .into_iter()
        .next()
        .ok_or_else(|| MnsError::Serialization("Message not found in response".to_string()))?;

    let message_id = fields
        .get("MessageId")
        .and_then(|id| MessageId::from_str(id).ok())
        .ok_or_else(|| {
            MnsError::Serialization("MessageId not found in response".to_string())
        })?;

    Ok(SendMessageResponse {
        message_id,
        body_md5: fields.get("MessageBodyMD5").cloned(),
    })
}

fn parse_received_messages(xml: &str, base64_body: bool) -> Result<Vec<ReceivedMessage>, MnsError> {
    collect_records(xml, "Message")?
        .into_iter()
        .map(|fields| received_message_from_fields(fields, base64_body))
        .collect()
}

fn received_message_from_fields(
    mut fields: HashMap<String, String>,
    base64_body: bool,
) -> Result<ReceivedMessage, MnsError> {
    let message_id = fields
        .get("MessageId")
        .and_then(|id| MessageId::from_str(id).ok())
        .ok_or_else(|| MnsError::Serialization("MessageId not found in message".to_string()))?;

    let receipt_handle = fields
        .remove("ReceiptHandle")
        .map(ReceiptHandle::new)
        .ok_or_else(|| {
            MnsError::Serialization("ReceiptHandle not found in message".to_string())
        })?;

    let raw_body = fields.remove("MessageBody").unwrap_or_default();
    let body = if base64_body {
        let decoded = STANDARD
            .decode(raw_body.trim())
            .map_err(|e| MnsError::Serialization(format!("Base64 decode failed: {}", e)))?;
        String::from_utf8(decoded)
            .map_err(|e| MnsError::Serialization(format!("Message body is not UTF-8: {}", e)))?
    } else {
        raw_body
    };

    Ok(ReceivedMessage {
        message_id,
        receipt_handle,
        body,
        body_md5: fields.get("MessageBodyMD5").cloned(),
        dequeue_count: parse_number(&fields, "DequeueCount").unwrap_or(0),
        enqueue_time: parse_timestamp(&fields, "EnqueueTime"),
        first_dequeue_time: parse_timestamp(&fields, "FirstDequeueTime"),
        next_visible_time: parse_timestamp(&fields, "NextVisibleTime"),
        priority: parse_number(&fields, "Priority"),
    })
}

fn parse_delete_failures(xml: &str) -> Result<Vec<DeleteFailure>, MnsError> {
    Ok(collect_records(xml, "Error")?
        .into_iter()
        .filter_map(|mut fields| {
            let error_code = fields.remove("ErrorCode")?;
            Some(DeleteFailure {
                receipt_handle: ReceiptHandle::new(
                    fields.remove("ReceiptHandle").unwrap_or_default(),
                ),
                error_code,
                error_message: fields.remove("ErrorMessage").unwrap_or_default(),
            })
        })
        .collect())
}

fn parse_visibility_change(xml: &str) -> Result<VisibilityChange, MnsError> {
    let mut fields = collect_records(xml, "ChangeVisibility")?
        .into_iter()
        .next()
        .ok_or_else(|| {
            MnsError::Serialization("ChangeVisibility not found in response".to_string())
        })?;

    let receipt_handle = fields
        .remove("ReceiptHandle")
        .map(ReceiptHandle::new)
        .ok_or_else(|| {
            MnsError::Serialization("ReceiptHandle not found in response".to_string())
        })?;

    Ok(VisibilityChange {
        receipt_handle,
        next_visible_time: parse_timestamp(&fields, "NextVisibleTime"),
    })
}

fn parse_queue_attributes(xml: &str) -> Result<QueueAttributes, MnsError> {
    let fields = collect_records(xml, "Queue")?
        .into_iter()
        .next()
        .ok_or_else(|| MnsError::Serialization("Queue not found in response".to_string()))?;

    Ok(QueueAttributes {
        queue_name: fields.get("QueueName").cloned(),
        active_messages: parse_number(&fields, "ActiveMessages"),
        inactive_messages: parse_number(&fields, "InactiveMessages"),
        delay_messages: parse_number(&fields, "DelayMessages"),
        visibility_timeout: parse_number(&fields, "VisibilityTimeout"),
        polling_wait_seconds: parse_number(&fields, "PollingWaitSeconds"),
        delay_seconds: parse_number(&fields, "DelaySeconds"),
        maximum_message_size: parse_number(&fields, "MaximumMessageSize"),
        message_retention_period: parse_number(&fields, "MessageRetentionPeriod"),
    })
}

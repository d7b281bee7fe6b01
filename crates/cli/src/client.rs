// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT client for CLI commands
//!
//! The CLI is one-shot: it connects, performs a single request or a
//! retained-state read, and exits. The event loop is driven inline rather
//! than from a background task, so every await has a deadline.

use std::collections::BTreeMap;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::{json, Map, Value};
use sprinkler_daemon::mqtt::BrokerConfig;
use thiserror::Error;
use tokio::time::Instant;

/// How long to wait for a response to a request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to collect retained state after subscribing
const GATHER_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("timed out waiting for the controller (is sprinklerd connected?)")]
    Timeout,
    #[error("mqtt error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("mqtt connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request failed (code {code}): {message}")]
    Request { code: i64, message: String },
}

/// One-shot client for the controller's MQTT surface
pub struct ControllerClient {
    client: AsyncClient,
    eventloop: EventLoop,
    prefix: String,
}

impl ControllerClient {
    pub fn connect(broker: &BrokerConfig) -> Self {
        let client_id = format!("sprinklerctl-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &broker.host, broker.port);
        options.set_keep_alive(Duration::from_secs(10));
        if let (Some(username), Some(password)) = (&broker.username, &broker.password) {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, 16);
        Self {
            client,
            eventloop,
            prefix: broker.prefix.clone(),
        }
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.prefix, suffix)
    }

    /// Send one request and wait for the response with a matching rid
    pub async fn request(&mut self, kind: &str, mut payload: Map<String, Value>) -> Result<Value, ClientError> {
        let rid = i64::from(std::process::id());
        payload.insert("rid".into(), json!(rid));
        payload.insert("type".into(), json!(kind));

        let responses = self.topic("responses");
        self.client
            .subscribe(&responses, QoS::ExactlyOnce)
            .await?;
        self.client
            .publish(
                self.topic("requests"),
                QoS::ExactlyOnce,
                false,
                serde_json::to_vec(&Value::Object(payload))?,
            )
            .await?;

        let deadline = Instant::now() + REQUEST_TIMEOUT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.eventloop.poll())
                .await
                .map_err(|_| ClientError::Timeout)??;
            let Event::Incoming(Packet::Publish(publish)) = event else {
                continue;
            };
            if publish.topic != responses {
                continue;
            }
            let response: Value = serde_json::from_slice(&publish.payload)?;
            if response["rid"] != json!(rid) {
                continue;
            }
            if response["result"] == json!("success") {
                return Ok(response);
            }
            return Err(ClientError::Request {
                code: response["code"].as_i64().unwrap_or(0),
                message: response["message"]
                    .as_str()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
    }

    /// Collect the retained state topics under the prefix
    pub async fn gather_state(&mut self) -> Result<BTreeMap<String, Vec<u8>>, ClientError> {
        self.client
            .subscribe(self.topic("#"), QoS::AtLeastOnce)
            .await?;

        let mut topics = BTreeMap::new();
        let deadline = Instant::now() + GATHER_WINDOW;
        loop {
            let event = match tokio::time::timeout_at(deadline, self.eventloop.poll()).await {
                Ok(event) => event?,
                Err(_) => break, // window elapsed; retained messages are in
            };
            if let Event::Incoming(Packet::Publish(publish)) = event {
                let suffix = publish
                    .topic
                    .strip_prefix(&format!("{}/", self.prefix))
                    .unwrap_or(&publish.topic)
                    .to_string();
                topics.insert(suffix, publish.payload.to_vec());
            }
        }
        if topics.is_empty() {
            return Err(ClientError::Timeout);
        }
        Ok(topics)
    }
}

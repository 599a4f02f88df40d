//! One-shot request/response relay between a caller and the background
//! service that owns the dispatcher.
//!
//! Each request carries its own reply channel, so concurrent requests need no
//! identifiers and no ordering. The caller always gets a string back: when the
//! service is gone, drops the request or is too slow, the fixed fallback
//! message stands in for the answer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::classify::ErrorKind;
use crate::dispatcher::CompileDispatcher;
use crate::request::CompileRequestPayload;

pub const COMPILE_ACTION: &str = "compile";

/// Wire shape of a bridge message: `{"action": "compile", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub action: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BridgeMessage {
    pub fn compile(payload: &CompileRequestPayload) -> Self {
        Self {
            action: COMPILE_ACTION.to_string(),
            data: serde_json::to_value(payload).unwrap_or_default(),
        }
    }
}

struct Envelope {
    message: BridgeMessage,
    reply: oneshot::Sender<String>,
}

/// Fallback shown whenever no answer arrives.
pub fn fallback_message() -> &'static str {
    ErrorKind::BridgeFailure.message()
}

/// Caller side of the bridge. Cheap to clone; one clone per test case is fine.
#[derive(Clone)]
pub struct BridgeClient {
    sender: mpsc::UnboundedSender<Envelope>,
    response_timeout: Duration,
}

impl BridgeClient {
    pub async fn send(&self, message: BridgeMessage) -> String {
        let (reply, response) = oneshot::channel();
        if self.sender.send(Envelope { message, reply }).is_err() {
            log::error!("Background service is not running");
            return fallback_message().to_string();
        }

        match tokio::time::timeout(self.response_timeout, response).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => {
                log::warn!("Background service dropped the request without answering");
                fallback_message().to_string()
            }
            Err(_) => {
                log::warn!(
                    "No answer from the background service within {:?}",
                    self.response_timeout
                );
                fallback_message().to_string()
            }
        }
    }

    pub async fn request_compile(&self, payload: &CompileRequestPayload) -> String {
        self.send(BridgeMessage::compile(payload)).await
    }

    /// Sends every payload at once and waits for all answers, in input order.
    pub async fn request_compile_all(&self, payloads: &[CompileRequestPayload]) -> Vec<String> {
        join_all(payloads.iter().map(|payload| self.request_compile(payload))).await
    }
}

/// Receiving side: owns the dispatcher and answers every `compile` message on
/// its own task.
pub struct BackgroundService {
    dispatcher: Arc<CompileDispatcher>,
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl BackgroundService {
    pub fn new(
        dispatcher: Arc<CompileDispatcher>,
        response_timeout: Duration,
    ) -> (Self, BridgeClient) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let client = BridgeClient {
            sender,
            response_timeout,
        };
        (
            Self {
                dispatcher,
                receiver,
            },
            client,
        )
    }

    /// Starts the service on the current runtime. It stops once every client
    /// has been dropped.
    pub fn spawn(
        dispatcher: Arc<CompileDispatcher>,
        response_timeout: Duration,
    ) -> (BridgeClient, JoinHandle<()>) {
        let (service, client) = Self::new(dispatcher, response_timeout);
        (client, tokio::spawn(service.run()))
    }

    pub async fn run(mut self) {
        while let Some(Envelope { message, reply }) = self.receiver.recv().await {
            if message.action != COMPILE_ACTION {
                log::debug!("Ignoring bridge message with action '{}'", message.action);
                continue;
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                let answer = handle_compile(&dispatcher, message.data).await;
                if reply.send(answer).is_err() {
                    log::debug!("Caller went away before the compile result was ready");
                }
            });
        }
        log::debug!("Bridge closed, background service stopping");
    }
}

async fn handle_compile(dispatcher: &CompileDispatcher, data: serde_json::Value) -> String {
    match serde_json::from_value::<CompileRequestPayload>(data) {
        Ok(payload) => dispatcher.compile_payload(payload).await,
        Err(e) => {
            log::error!("Malformed compile request: {}", e);
            fallback_message().to_string()
        }
    }
}

//! # Commerce API Module
//!
//! Client for the SMM panel REST API. Every action is a `GET` against a single
//! base endpoint carrying the shared secret as the `key` query parameter.
//!
//! Reads (`services`, `balance`) are retried with exponential backoff and
//! jitter. Order placement is sent exactly once: a retry could double-charge
//! the customer.

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::commerce_config::CommerceConfig;
use crate::commerce_errors::CommerceError;

/// Identifier of a panel service
pub type ServiceId = u64;

/// One entry of the panel's service catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceListing {
    pub id: ServiceId,
    pub name: String,
    /// Price in the panel currency per 1000 units
    pub rate_per_thousand: f64,
}

/// Account balance reported by the panel
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub amount: String,
    pub currency: Option<String>,
}

/// Parameters of a new order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub service_id: ServiceId,
    pub link: String,
    pub quantity: u64,
}

/// Identifier assigned by the panel to a placed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The operations the flow controller needs from the SMM panel
#[async_trait]
pub trait CommerceApi: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceListing>, CommerceError>;
    async fn get_balance(&self) -> Result<Balance, CommerceError>;
    /// Returns `CommerceError::Rejected` when the panel answers without an order id
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderId, CommerceError>;
}

/// Panels encode ids and prices either as JSON numbers or as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Int(u64),
    Float(f64),
    Text(String),
}

impl NumOrString {
    fn as_text(&self) -> String {
        match self {
            NumOrString::Int(n) => n.to_string(),
            NumOrString::Float(f) => f.to_string(),
            NumOrString::Text(s) => s.trim().to_string(),
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            NumOrString::Int(n) => Some(*n),
            NumOrString::Float(_) => None,
            NumOrString::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            NumOrString::Int(n) => Some(*n as f64),
            NumOrString::Float(f) => Some(*f),
            NumOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireService {
    service: NumOrString,
    name: String,
    rate: NumOrString,
}

#[derive(Debug, Deserialize)]
struct WireBalance {
    balance: NumOrString,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    order: Option<NumOrString>,
}

/// Surface `{"error": ...}` bodies as rejections before typed decoding.
fn check_error_payload(value: &Value) -> Result<(), CommerceError> {
    if let Some(message) = value.get("error") {
        let message = message
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string());
        return Err(CommerceError::Rejected(message));
    }
    Ok(())
}

/// Decode a `services` response body
pub fn parse_services(value: Value) -> Result<Vec<ServiceListing>, CommerceError> {
    check_error_payload(&value)?;
    let wire: Vec<WireService> = serde_json::from_value(value)?;

    let mut listings = Vec::with_capacity(wire.len());
    for entry in wire {
        let (Some(id), Some(rate)) = (entry.service.as_u64(), entry.rate.as_f64()) else {
            warn!(service = %entry.service.as_text(), "Skipping service with unparsable id or rate");
            continue;
        };
        listings.push(ServiceListing {
            id,
            name: entry.name,
            rate_per_thousand: rate,
        });
    }
    Ok(listings)
}

/// Decode a `balance` response body
pub fn parse_balance(value: Value) -> Result<Balance, CommerceError> {
    check_error_payload(&value)?;
    let wire: WireBalance = serde_json::from_value(value)?;
    Ok(Balance {
        amount: wire.balance.as_text(),
        currency: wire.currency,
    })
}

/// Decode an `add` response body
pub fn parse_order(value: Value) -> Result<OrderId, CommerceError> {
    check_error_payload(&value)?;
    let wire: WireOrder = serde_json::from_value(value)?;
    match wire.order.map(|order| order.as_text()) {
        Some(order) if !order.is_empty() => Ok(OrderId(order)),
        _ => Err(CommerceError::Rejected("response carried no order id".to_string())),
    }
}

/// reqwest-backed client for an SMM panel speaking the v2 API
pub struct SmmPanelClient {
    client: Client,
    api_key: SecretString,
    config: CommerceConfig,
    breaker: CircuitBreaker,
}

impl SmmPanelClient {
    pub fn new(config: CommerceConfig, api_key: SecretString) -> Result<Self, CommerceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CommerceError::Transport(e.to_string()))?;
        let breaker = CircuitBreaker::new(config.recovery.clone());

        Ok(Self {
            client,
            api_key,
            config,
            breaker,
        })
    }

    async fn call(&self, action: &str, params: &[(&str, String)]) -> Result<Value, CommerceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("key", self.api_key.expose_secret().to_string()),
            ("action", action.to_string()),
        ];
        query.extend(params.iter().cloned());

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommerceError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }

    /// Run `op` behind the circuit breaker, retrying retryable failures
    /// `attempts - 1` times.
    async fn guarded<T, F, Fut>(&self, action: &str, attempts: u32, op: F) -> Result<T, CommerceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CommerceError>>,
    {
        if self.breaker.is_open() {
            warn!(action, "Commerce API circuit open, failing fast");
            return Err(CommerceError::CircuitOpen);
        }

        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.config.recovery.backoff_delay(attempt);
                    let jitter_ceiling = (self.config.recovery.base_retry_delay_ms / 2).max(1);
                    let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
                    let delay = delay + std::time::Duration::from_millis(jitter);
                    warn!(action, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Commerce API call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    // A rejection is a well-formed answer, the panel itself is healthy.
                    if matches!(e, CommerceError::Rejected(_)) {
                        self.breaker.record_success();
                    } else {
                        self.breaker.record_failure();
                    }
                    return Err(e);
                }
            }
        }
    }

    fn read_attempts(&self) -> u32 {
        self.config.recovery.max_retries + 1
    }
}

#[async_trait]
impl CommerceApi for SmmPanelClient {
    async fn list_services(&self) -> Result<Vec<ServiceListing>, CommerceError> {
        let services = self
            .guarded("services", self.read_attempts(), || async move {
                parse_services(self.call("services", &[]).await?)
            })
            .await?;
        debug!(count = services.len(), "Fetched service catalog");
        Ok(services)
    }

    async fn get_balance(&self) -> Result<Balance, CommerceError> {
        self.guarded("balance", self.read_attempts(), || async move {
            parse_balance(self.call("balance", &[]).await?)
        })
        .await
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderId, CommerceError> {
        let params = [
            ("service", order.service_id.to_string()),
            ("link", order.link.clone()),
            ("quantity", order.quantity.to_string()),
        ];
        let params = &params;
        let order_id = self
            .guarded("add", 1, || async move { parse_order(self.call("add", params).await?) })
            .await?;
        info!(order_id = %order_id, service_id = order.service_id, quantity = order.quantity, "Order placed");
        Ok(order_id)
    }
}

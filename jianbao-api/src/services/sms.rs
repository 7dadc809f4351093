//! SMS Notification Sender
//!
//! `TemplatedSmsSender` implements `NotificationSender`: it normalizes the
//! phone number, picks the template for the notification category and hands
//! the message to an `SmsGateway`. The gateway is the vendor seam:
//!
//! - `HttpSmsGateway`: posts the send request to an SMS relay over HTTP
//! - `LogOnlyGateway`: used when SMS is not configured; logs and succeeds
//!
//! Nothing here retries. One call is one delivery attempt.

use std::sync::Arc;

use async_trait::async_trait;
use jianbao_core::{
    AppraisalId, DeliveryReceipt, NotificationCategory, NotificationSender, NotifyError,
};
use serde::{Deserialize, Serialize};

use crate::config::SmsConfig;
use crate::constants::DEFAULT_PHONE_COUNTRY_CODE;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// PHONE NUMBERS
// ============================================================================

/// Normalize a mainland number to E.164.
///
/// `"18811766851"` and `"8618811766851"` both become `"+8618811766851"`;
/// numbers already carrying `+86` are only trimmed.
pub fn format_phone_number(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with(DEFAULT_PHONE_COUNTRY_CODE) {
        phone.to_string()
    } else if phone.starts_with("86") {
        format!("+{}", phone)
    } else {
        format!("{}{}", DEFAULT_PHONE_COUNTRY_CODE, phone)
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// One outbound message, already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsRequest {
    pub phone_number: String,
    pub template_id: String,
    pub template_params: Vec<String>,
}

/// Transport to the SMS vendor.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, request: &SmsRequest) -> Result<DeliveryReceipt, NotifyError>;
}

#[derive(Debug, Serialize)]
struct RelaySendRequest<'a> {
    sdk_app_id: &'a str,
    sign_name: &'a str,
    region: &'a str,
    template_id: &'a str,
    phone_number_set: [&'a str; 1],
    template_param_set: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RelaySendResponse {
    request_id: Option<String>,
    #[serde(default)]
    send_status_set: Vec<RelaySendStatus>,
}

#[derive(Debug, Deserialize)]
struct RelaySendStatus {
    code: String,
    #[serde(default)]
    message: String,
}

/// Gateway that forwards send requests to an HTTP relay.
///
/// The relay speaks the vendor's SendSms shape in snake_case and reports a
/// per-number status; anything other than `Ok` is a rejection.
pub struct HttpSmsGateway {
    client: reqwest::Client,
    config: SmsConfig,
}

impl HttpSmsGateway {
    pub fn new(config: SmsConfig) -> ApiResult<Self> {
        config.validate().map_err(|e| ApiError::invalid_input(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, request: &SmsRequest) -> Result<DeliveryReceipt, NotifyError> {
        let body = RelaySendRequest {
            sdk_app_id: &self.config.sdk_app_id,
            sign_name: &self.config.sign_name,
            region: &self.config.region,
            template_id: &request.template_id,
            phone_number_set: [request.phone_number.as_str()],
            template_param_set: &request.template_params,
        };

        let response = self
            .client
            .post(&self.config.gateway_url)
            .basic_auth(&self.config.secret_id, Some(&self.config.secret_key))
            .header("User-Agent", "jianbao-sms/1.0")
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Transport {
                reason: format!("relay returned HTTP {}", status),
            });
        }

        let parsed: RelaySendResponse =
            response.json().await.map_err(|e| NotifyError::Transport {
                reason: format!("invalid relay response: {}", e),
            })?;

        if let Some(first) = parsed.send_status_set.first() {
            if first.code != "Ok" {
                return Err(NotifyError::Rejected {
                    phone: request.phone_number.clone(),
                    code: first.code.clone(),
                    message: first.message.clone(),
                });
            }
        }

        Ok(DeliveryReceipt {
            request_id: parsed.request_id,
            phone_number: request.phone_number.clone(),
            template_id: request.template_id.clone(),
        })
    }
}

/// Gateway used when SMS credentials are missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyGateway;

#[async_trait]
impl SmsGateway for LogOnlyGateway {
    async fn send(&self, request: &SmsRequest) -> Result<DeliveryReceipt, NotifyError> {
        tracing::warn!(
            phone_number = %request.phone_number,
            template_id = %request.template_id,
            "SMS not configured, message logged only"
        );
        Ok(DeliveryReceipt {
            request_id: None,
            phone_number: request.phone_number.clone(),
            template_id: request.template_id.clone(),
        })
    }
}

// ============================================================================
// SENDER
// ============================================================================

/// Status notification sender backed by an `SmsGateway`.
pub struct TemplatedSmsSender {
    gateway: Arc<dyn SmsGateway>,
    template_supplement: String,
    template_outcome: String,
}

impl TemplatedSmsSender {
    pub fn new(gateway: Arc<dyn SmsGateway>, config: &SmsConfig) -> Self {
        Self {
            gateway,
            template_supplement: config.template_supplement.clone(),
            template_outcome: config.template_outcome.clone(),
        }
    }

    /// Build the sender for a configuration, falling back to the log-only
    /// gateway when required settings are missing.
    pub fn from_config(config: &SmsConfig) -> Self {
        let gateway: Arc<dyn SmsGateway> = match config.validate() {
            Ok(()) => match HttpSmsGateway::new(config.clone()) {
                Ok(gateway) => Arc::new(gateway),
                Err(e) => {
                    tracing::error!(error = %e, "SMS gateway unavailable, using log-only sender");
                    Arc::new(LogOnlyGateway)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "SMS service unavailable, using log-only sender");
                Arc::new(LogOnlyGateway)
            }
        };
        Self::new(gateway, config)
    }

    pub fn template_for(&self, category: NotificationCategory) -> &str {
        match category {
            NotificationCategory::Supplement => &self.template_supplement,
            NotificationCategory::FinalOutcome => &self.template_outcome,
        }
    }
}

#[async_trait]
impl NotificationSender for TemplatedSmsSender {
    async fn send_status_notification(
        &self,
        phone: &str,
        category: NotificationCategory,
        appraisal_id: &AppraisalId,
    ) -> Result<DeliveryReceipt, NotifyError> {
        let request = SmsRequest {
            phone_number: format_phone_number(phone),
            template_id: self.template_for(category).to_string(),
            template_params: Vec::new(),
        };

        let result = self.gateway.send(&request).await;
        match &result {
            Ok(receipt) => tracing::info!(
                appraisal_id = %appraisal_id,
                category = category.as_str(),
                phone_number = %receipt.phone_number,
                request_id = ?receipt.request_id,
                "Status SMS accepted"
            ),
            Err(e) => tracing::error!(
                appraisal_id = %appraisal_id,
                category = category.as_str(),
                phone_number = %request.phone_number,
                error = %e,
                "Status SMS failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number("18811766851"), "+8618811766851");
        assert_eq!(format_phone_number(" 8618811766851 "), "+8618811766851");
        assert_eq!(format_phone_number("+8618811766851"), "+8618811766851");
    }

    #[derive(Default)]
    struct CapturingGateway {
        requests: Mutex<Vec<SmsRequest>>,
    }

    #[async_trait]
    impl SmsGateway for CapturingGateway {
        async fn send(&self, request: &SmsRequest) -> Result<DeliveryReceipt, NotifyError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(DeliveryReceipt {
                request_id: Some("req-1".to_string()),
                phone_number: request.phone_number.clone(),
                template_id: request.template_id.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_template_selected_by_category() {
        let gateway = Arc::new(CapturingGateway::default());
        let sender = TemplatedSmsSender::new(gateway.clone(), &SmsConfig::default());
        let id = AppraisalId::new("a1").unwrap();

        sender
            .send_status_notification("13800000000", NotificationCategory::Supplement, &id)
            .await
            .unwrap();
        sender
            .send_status_notification("13800000000", NotificationCategory::FinalOutcome, &id)
            .await
            .unwrap();

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(requests[0].template_id, "2532458");
        assert_eq!(requests[1].template_id, "2532457");
        assert_eq!(requests[0].phone_number, "+8613800000000");
    }

    #[tokio::test]
    async fn test_unconfigured_sender_logs_only() {
        let sender = TemplatedSmsSender::from_config(&SmsConfig::default());
        let id = AppraisalId::new("a1").unwrap();
        let receipt = sender
            .send_status_notification("13800000000", NotificationCategory::FinalOutcome, &id)
            .await
            .unwrap();
        assert_eq!(receipt.request_id, None);
    }

    #[test]
    fn test_http_gateway_requires_config() {
        assert!(HttpSmsGateway::new(SmsConfig::default()).is_err());
    }
}

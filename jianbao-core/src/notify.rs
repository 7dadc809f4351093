//! Outbound notification seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AppraisalId, NotificationCategory, NotifyError};

/// What a gateway reported back for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub request_id: Option<String>,
    pub phone_number: String,
    pub template_id: String,
}

/// Sends a status notification to a submitter.
///
/// Implementations pick the message template from `category`. There is no
/// retry contract: one call is one attempt.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_status_notification(
        &self,
        phone: &str,
        category: NotificationCategory,
        appraisal_id: &AppraisalId,
    ) -> Result<DeliveryReceipt, NotifyError>;
}

use crate::domain::model::{DeliveryFailure, DeliveryStatus, DispatchOutcome, RecipientId};
use crate::domain::ports::{CredentialStatus, Notifier};
use crate::utils::error::{NotifierError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Sends one message to every recipient, in order, isolating failures.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, send_timeout: Duration) -> Self {
        Self {
            notifier,
            send_timeout,
        }
    }

    /// Checks the preconditions that abort a run before any send.
    pub fn check_preconditions(&self, recipients: &[RecipientId]) -> Result<()> {
        match self.notifier.credential_status() {
            CredentialStatus::Valid => {}
            CredentialStatus::Missing => {
                return Err(NotifierError::config("bot token is not set"));
            }
            CredentialStatus::Placeholder => {
                return Err(NotifierError::config(
                    "bot token still has its placeholder value",
                ));
            }
        }

        if recipients.is_empty() {
            return Err(NotifierError::config("recipient list is empty"));
        }

        Ok(())
    }

    /// Attempts every recipient exactly once. Only a precondition failure
    /// returns `Err`; per-recipient failures are recorded in the outcomes.
    pub async fn dispatch(&self, message: &str, recipients: &[RecipientId]) -> Result<Vec<DispatchOutcome>> {
        if let Err(e) = self.check_preconditions(recipients) {
            tracing::error!("❌ Dispatch aborted before sending: {}", e);
            return Err(e);
        }

        let mut outcomes = Vec::with_capacity(recipients.len());

        for &recipient in recipients {
            let status = match tokio::time::timeout(self.send_timeout, self.notifier.send(recipient, message)).await {
                Ok(Ok(())) => {
                    tracing::info!("✅ Sent to {}", recipient);
                    DeliveryStatus::Sent
                }
                Ok(Err(failure)) => {
                    tracing::error!("❌ Delivery to {} failed [{}]: {}", recipient, failure.kind(), failure);
                    DeliveryStatus::Failed(failure)
                }
                Err(_) => {
                    let failure = DeliveryFailure::Timeout(self.send_timeout);
                    tracing::error!("❌ Delivery to {} failed [{}]: {}", recipient, failure.kind(), failure);
                    DeliveryStatus::Failed(failure)
                }
            };

            outcomes.push(DispatchOutcome { recipient, status });
        }

        Ok(outcomes)
    }
}

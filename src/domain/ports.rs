use crate::domain::model::{DeliveryFailure, RecipientId};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// State of the delivery credential, checked before any send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid,
    Missing,
    Placeholder,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn credential_status(&self) -> CredentialStatus;

    async fn send(&self, recipient: RecipientId, text: &str) -> std::result::Result<(), DeliveryFailure>;
}

/// Flavor text collaborator. `None` means unavailable and the caller falls back.
pub trait Greeter: Send + Sync {
    fn personal_greeting(&self, name: &str) -> Option<String>;
    fn collective_greeting(&self, names: &[String]) -> Option<String>;
    fn closing_phrase(&self) -> Option<String>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

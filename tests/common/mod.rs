// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mostrador::application::{LedgerService, Notifier, NotifyError};
use mostrador::domain::{Client, Notification};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(db_path(&temp_dir).to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test service whose notifications are captured instead of sent
pub async fn recording_service() -> Result<(LedgerService, Arc<RecordingNotifier>, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service.with_notifier(notifier.clone());
    Ok((service, notifier, temp_dir))
}

pub fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("test.db")
}

/// Raw pool on the test database, for setting up states the service never produces
pub async fn raw_pool(temp_dir: &TempDir) -> Result<SqlitePool> {
    let url = format!("sqlite:{}", db_path(temp_dir).display());
    Ok(SqlitePool::connect(&url).await?)
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc()
}

/// Create a client with a phone number
pub async fn create_client(service: &LedgerService, name: &str, phone: &str) -> Result<Client> {
    Ok(service
        .create_client(name.to_string(), Some(phone.to_string()), None)
        .await?)
}

/// Captures every notification in memory
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until at least `count` notifications arrived (they are sent from spawned tasks)
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Rejects every message, like a webhook that is down
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

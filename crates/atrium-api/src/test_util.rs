//! Shared doubles for handler-level tests.

use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use atrium_db::Database;

use crate::email::Mailer;
use crate::rate_limit;
use crate::{AppState, AppStateInner};

/// Captures (recipient, reset link) pairs instead of sending anything.
pub(crate) struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<()> {
        if self.fail {
            bail!("SMTP relay unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), reset_link.to_string()));
        Ok(())
    }
}

pub(crate) fn test_state(mailer: Arc<dyn Mailer>) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".to_string(),
        frontend_base_url: "https://atrium.test".to_string(),
        mailer,
        reset_limiter: rate_limit::reset_limiter(600),
    })
}

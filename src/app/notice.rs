use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the user. Blocking notices stay until dismissed; transient
/// ones carry an expiry and disappear on the next [`Notices::expire`] past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub expires_at: Option<OffsetDateTime>,
}

impl Notice {
    pub fn is_blocking(&self) -> bool {
        self.expires_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn blocking(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Error => tracing::warn!(message = %message, "blocking notice"),
            NoticeLevel::Info => tracing::info!(message = %message, "blocking notice"),
        }
        self.items.push(Notice {
            level,
            message,
            expires_at: None,
        });
    }

    pub fn transient(&mut self, message: impl Into<String>, expires_at: OffsetDateTime) {
        self.items.push(Notice {
            level: NoticeLevel::Info,
            message: message.into(),
            expires_at: Some(expires_at),
        });
    }

    pub fn expire(&mut self, now: OffsetDateTime) {
        self.items
            .retain(|notice| notice.expires_at.map(|at| at > now).unwrap_or(true));
    }

    /// Acknowledges the oldest blocking notice.
    pub fn dismiss(&mut self) -> Option<Notice> {
        let idx = self.items.iter().position(Notice::is_blocking)?;
        Some(self.items.remove(idx))
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

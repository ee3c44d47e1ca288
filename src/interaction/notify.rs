use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
    created_at: Instant,
}

/// Toast queue. Every notice can be dismissed and expires on its own.
#[derive(Debug)]
pub struct Notifications {
    items: Vec<Notice>,
    next_id: u64,
    lifetime: Duration,
}

impl Notifications {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
            lifetime,
        }
    }

    fn push(&mut self, kind: NoticeKind, message: String, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notice {
            id,
            kind,
            message,
            created_at: now,
        });
        id
    }

    pub fn info(&mut self, message: impl Into<String>, now: Instant) -> u64 {
        self.push(NoticeKind::Info, message.into(), now)
    }

    pub fn error(&mut self, message: impl Into<String>, now: Instant) -> u64 {
        self.push(NoticeKind::Error, message.into(), now)
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|notice| notice.id != id);
    }

    pub fn expire(&mut self, now: Instant) {
        let lifetime = self.lifetime;
        self.items
            .retain(|notice| now.saturating_duration_since(notice.created_at) < lifetime);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

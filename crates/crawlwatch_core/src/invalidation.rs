use crate::{CacheKey, Notification, NotificationKind, TargetId};

/// Which cache keys a change makes suspect.
///
/// Listings are filtered server-side by arbitrary text, so any change to a
/// target may move it in or out of any listing page: every plan that names a
/// target also covers all listing keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationPlan {
    Nothing,
    AllListings,
    Targets(Vec<TargetId>),
}

impl InvalidationPlan {
    pub fn for_notification(notification: &Notification) -> Self {
        match (&notification.kind, &notification.target_id) {
            (NotificationKind::CrawlUpdate, Some(target_id)) => {
                InvalidationPlan::Targets(vec![target_id.clone()])
            }
            (NotificationKind::CrawlUpdate, None)
            | (NotificationKind::Connection, _)
            | (NotificationKind::Ping, _)
            | (NotificationKind::Unknown(_), _) => InvalidationPlan::Nothing,
        }
    }

    pub fn for_targets<'a>(targets: impl IntoIterator<Item = &'a TargetId>) -> Self {
        let mut ids: Vec<TargetId> = Vec::new();
        for id in targets {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        if ids.is_empty() {
            InvalidationPlan::AllListings
        } else {
            InvalidationPlan::Targets(ids)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, InvalidationPlan::Nothing)
    }

    pub fn covers(&self, key: &CacheKey) -> bool {
        match self {
            InvalidationPlan::Nothing => false,
            InvalidationPlan::AllListings => key.is_listing(),
            InvalidationPlan::Targets(ids) => match key.target() {
                None => true,
                Some(id) => ids.contains(id),
            },
        }
    }
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{LifecycleState, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
}

pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationBridge<N> {
    notifier: N,
    last_notified: Option<RequestId>,
}

impl<N: Notifier> NotificationBridge<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            last_notified: None,
        }
    }

    pub fn observe(&mut self, state: &LifecycleState) -> bool {
        let LifecycleState::Error {
            request_id,
            message,
        } = state
        else {
            return false;
        };
        if self.last_notified == Some(*request_id) {
            return false;
        }

        self.last_notified = Some(*request_id);
        self.notifier.notify(Notification {
            message: message.clone(),
        });
        true
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }
}

use tokio_util::sync::CancellationToken;

/// Handle to a live notification subscription.
///
/// Unsubscribing (or dropping the handle) stops all further callbacks. It is
/// safe to unsubscribe while the listener is still attaching; the attachment
/// is then torn down as soon as it completes.
#[must_use = "dropping a Subscription unsubscribes it"]
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// False once unsubscribed, or once the user scope it was bound to changed.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_cancels_token() {
        let token = CancellationToken::new();
        let subscription = Subscription::new(token.clone());
        assert!(subscription.is_active());

        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert!(token.is_cancelled());

        // Second call is harmless
        subscription.unsubscribe();
    }

    #[test]
    fn test_drop_cancels_token() {
        let token = CancellationToken::new();
        drop(Subscription::new(token.clone()));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_parent_cancellation_deactivates() {
        let parent = CancellationToken::new();
        let subscription = Subscription::new(parent.child_token());

        parent.cancel();
        assert!(!subscription.is_active());
    }
}

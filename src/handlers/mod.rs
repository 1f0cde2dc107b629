pub mod auth;
pub mod calls;
pub mod certificate;
pub mod devices;
pub mod lifecycle;
pub mod router;
pub mod sso;
pub mod traits;

use router::MessageRouter;
use std::sync::Arc;

/// Builds the full handler table. Called once per client; the router panics
/// on duplicate names, so a bad table fails fast at construction.
pub(crate) fn build_router() -> MessageRouter {
    let mut router = MessageRouter::new();

    router.register(Arc::new(lifecycle::UserAuthorizedHandler));
    router.register(Arc::new(lifecycle::ConnectionStatusHandler));
    router.register(Arc::new(lifecycle::ConnectionFailureHandler));
    router.register(Arc::new(lifecycle::AuthenticationResultHandler));
    router.register(Arc::new(lifecycle::LifecycleStateHandler));
    router.register(Arc::new(lifecycle::LoggedInHandler));

    router.register(Arc::new(auth::EmailRequiredHandler));
    router.register(Arc::new(auth::CredentialsRequiredHandler));
    router.register(Arc::new(auth::SsoSignInRequiredHandler));

    router.register(Arc::new(sso::SsoNavigateHandler));
    router.register(Arc::new(sso::CanCancelSsoHandler));

    router.register(Arc::new(calls::CallStateHandler));
    router.register(Arc::new(calls::VideoResolutionHandler));
    router.register(Arc::new(calls::AttendedTransferHandler));

    router.register(Arc::new(devices::TelephonyDevicesHandler));
    router.register(Arc::new(devices::MultimediaStartedHandler));
    router.register(Arc::new(devices::MultimediaStoppedHandler));
    router.register(Arc::new(devices::MultimediaDeviceChangeHandler));
    router.register(Arc::new(devices::RingtoneHandler));

    router.register(Arc::new(certificate::InvalidCertificateHandler));

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_duplicate_names() {
        let router = build_router();
        assert_eq!(router.handler_count(), 20);
    }
}

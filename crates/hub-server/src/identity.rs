//! Identity extraction at upgrade time.
//!
//! The hub trusts whoever sits in front of it to have authenticated the
//! request already. An [`IdentityProvider`] only turns that collaborator's
//! output into a typed [`Identity`]; returning `None` refuses the upgrade.

use hub_core::Identity;
use tokio_tungstenite::tungstenite::handshake::server::Request;

/// Resolves the upgrade request to an already-authenticated identity.
pub trait IdentityProvider: Send + Sync + 'static {
    fn identify(&self, request: &Request) -> Option<Identity>;
}

impl<F> IdentityProvider for F
where
    F: Fn(&Request) -> Option<Identity> + Send + Sync + 'static,
{
    fn identify(&self, request: &Request) -> Option<Identity> {
        self(request)
    }
}

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Reads the identity from headers set by an authenticating front proxy.
///
/// Only safe when the hub is not reachable except through that proxy.
#[derive(Debug, Clone)]
pub struct TrustedHeaders {
    pub user_id_header: String,
    pub user_name_header: String,
}

impl Default for TrustedHeaders {
    fn default() -> Self {
        TrustedHeaders {
            user_id_header: USER_ID_HEADER.to_string(),
            user_name_header: USER_NAME_HEADER.to_string(),
        }
    }
}

impl IdentityProvider for TrustedHeaders {
    fn identify(&self, request: &Request) -> Option<Identity> {
        let headers = request.headers();

        let user_id = headers
            .get(self.user_id_header.as_str())?
            .to_str()
            .ok()?
            .trim()
            .parse::<i64>()
            .ok()?;

        let name = headers
            .get(self.user_name_header.as_str())?
            .to_str()
            .ok()?
            .trim();
        if name.is_empty() {
            return None;
        }

        Some(Identity::new(user_id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/ws");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn reads_both_headers() {
        let req = request(&[("x-user-id", "42"), ("x-user-name", " alice ")]);
        assert_eq!(
            TrustedHeaders::default().identify(&req),
            Some(Identity::new(42, "alice"))
        );
    }

    #[test]
    fn refuses_incomplete_identity() {
        let provider = TrustedHeaders::default();
        assert!(provider.identify(&request(&[])).is_none());
        assert!(provider.identify(&request(&[("x-user-id", "42")])).is_none());
        assert!(provider.identify(&request(&[("x-user-name", "alice")])).is_none());
        assert!(provider
            .identify(&request(&[("x-user-id", "abc"), ("x-user-name", "alice")]))
            .is_none());
        assert!(provider
            .identify(&request(&[("x-user-id", "1"), ("x-user-name", "  ")]))
            .is_none());
    }

    #[test]
    fn closures_are_providers() {
        let fixed = |_: &Request| Some(Identity::new(7, "bot"));
        assert_eq!(fixed.identify(&request(&[])), Some(Identity::new(7, "bot")));
    }
}

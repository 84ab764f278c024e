use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers attached to the websocket upgrade request
pub type Headers = HashMap<String, String>;

/// Supplies upgrade-request headers for every dial
///
/// Called on the initial connect and again on every reconnection attempt, so
/// tokens or cookies can be refreshed between attempts.
///
/// # Example
/// ```ignore
/// struct SessionCookie(Arc<RwLock<String>>);
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for SessionCookie {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = Headers::new();
///         headers.insert("Cookie".to_string(), self.0.read().clone());
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn get_headers(&self) -> Headers;
}

/// Fixed set of headers, same on every dial
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: Headers,
}

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl HeaderProvider for StaticHeaders {
    async fn get_headers(&self) -> Headers {
        self.headers.clone()
    }
}

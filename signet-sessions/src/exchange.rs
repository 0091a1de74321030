//! Inbound/outbound exchange abstraction
//!
//! Carriers read credentials from the request side of an exchange and write
//! refreshed credentials to both sides. Framework integrations implement
//! [`Exchange`] or build an [`HttpExchange`] from their request parts.

use cookie::Cookie;
use http::header::{HeaderName, HeaderValue, COOKIE, SET_COOKIE};
use http::{HeaderMap, Method};
use tracing::warn;

/// One request/response pair as seen by the session layer
pub trait Exchange {
    /// Request method
    fn method(&self) -> &Method;

    /// Value of a request header, if present and valid UTF-8
    fn request_header(&self, name: &str) -> Option<&str>;

    fn set_request_header(&mut self, name: &str, value: &str);

    fn remove_request_header(&mut self, name: &str);

    fn set_response_header(&mut self, name: &str, value: &str);

    fn remove_response_header(&mut self, name: &str);

    /// Value of a named request cookie
    fn request_cookie(&self, name: &str) -> Option<String>;

    /// Add or replace a cookie on the request so later code in the same request sees it
    fn set_request_cookie(&mut self, name: &str, value: &str);

    fn remove_request_cookie(&mut self, name: &str);

    /// Emit a `Set-Cookie` on the response
    fn set_response_cookie(&mut self, cookie: Cookie<'static>);

    /// Whether the request arrived over an encrypted transport
    fn is_tls(&self) -> bool;
}

/// [`Exchange`] over plain `http` header maps
#[derive(Debug, Clone)]
pub struct HttpExchange {
    method: Method,
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    tls: bool,
}

impl HttpExchange {
    pub fn new(method: Method, request_headers: HeaderMap) -> Self {
        Self {
            method,
            request_headers,
            response_headers: HeaderMap::new(),
            tls: false,
        }
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Seed the response side, e.g. with headers a handler already produced
    pub fn with_response_headers(mut self, response_headers: HeaderMap) -> Self {
        self.response_headers = response_headers;
        self
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Split into (request headers, response headers)
    pub fn into_headers(self) -> (HeaderMap, HeaderMap) {
        (self.request_headers, self.response_headers)
    }

    /// All `Set-Cookie` values emitted so far
    pub fn response_cookies(&self) -> Vec<Cookie<'static>> {
        self.response_headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_string()).ok())
            .collect()
    }

    fn request_cookies(&self) -> Vec<Cookie<'static>> {
        self.request_headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| {
                Cookie::split_parse(v.to_string())
                    .filter_map(Result::ok)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn write_request_cookies(&mut self, cookies: &[Cookie<'static>]) {
        self.request_headers.remove(COOKIE);
        if cookies.is_empty() {
            return;
        }
        let joined = cookies
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; ");
        insert_header(&mut self.request_headers, COOKIE.as_str(), &joined);
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    let name = match HeaderName::from_bytes(name.as_bytes()) {
        Ok(name) => name,
        Err(e) => {
            warn!("Refusing to set invalid header name {:?}: {}", name, e);
            return;
        }
    };
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => warn!("Refusing to set invalid value for header {}: {}", name, e),
    }
}

impl Exchange for HttpExchange {
    fn method(&self) -> &Method {
        &self.method
    }

    fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn set_request_header(&mut self, name: &str, value: &str) {
        insert_header(&mut self.request_headers, name, value);
    }

    fn remove_request_header(&mut self, name: &str) {
        self.request_headers.remove(name);
    }

    fn set_response_header(&mut self, name: &str, value: &str) {
        insert_header(&mut self.response_headers, name, value);
    }

    fn remove_response_header(&mut self, name: &str) {
        self.response_headers.remove(name);
    }

    fn request_cookie(&self, name: &str) -> Option<String> {
        self.request_cookies()
            .into_iter()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }

    fn set_request_cookie(&mut self, name: &str, value: &str) {
        let mut cookies: Vec<_> = self
            .request_cookies()
            .into_iter()
            .filter(|c| c.name() != name)
            .collect();
        cookies.push(Cookie::new(name.to_string(), value.to_string()));
        self.write_request_cookies(&cookies);
    }

    fn remove_request_cookie(&mut self, name: &str) {
        let cookies: Vec<_> = self
            .request_cookies()
            .into_iter()
            .filter(|c| c.name() != name)
            .collect();
        self.write_request_cookies(&cookies);
    }

    fn set_response_cookie(&mut self, cookie: Cookie<'static>) {
        // Replace an earlier Set-Cookie for the same name within this exchange
        let kept: Vec<HeaderValue> = self
            .response_headers
            .get_all(SET_COOKIE)
            .iter()
            .filter(|v| {
                v.to_str()
                    .ok()
                    .and_then(|s| Cookie::parse(s.to_string()).ok())
                    .map_or(true, |c| c.name() != cookie.name())
            })
            .cloned()
            .collect();
        self.response_headers.remove(SET_COOKIE);
        for value in kept {
            self.response_headers.append(SET_COOKIE, value);
        }

        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.response_headers.append(SET_COOKIE, value);
            }
            Err(e) => warn!("Refusing to emit invalid cookie {}: {}", cookie.name(), e),
        }
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

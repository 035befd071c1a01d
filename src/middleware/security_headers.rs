use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Request, Response};
use std::collections::BTreeMap;

pub fn content_security_policy() -> String {
    [
        "default-src 'self'",
        "script-src 'self'",
        "style-src 'self' 'unsafe-inline'",
        "img-src 'self' data: https:",
        "font-src 'self'",
        "connect-src 'self'",
        "frame-ancestors 'none'",
        "base-uri 'self'",
        "form-action 'self'",
    ]
    .join("; ")
}

/// Headers attached to every response.
pub fn secure_headers() -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        ("X-Content-Type-Options", "nosniff".to_string()),
        ("X-Frame-Options", "DENY".to_string()),
        ("X-XSS-Protection", "1; mode=block".to_string()),
        ("Referrer-Policy", "strict-origin-when-cross-origin".to_string()),
        ("Permissions-Policy", "camera=(), microphone=(), geolocation=()".to_string()),
        ("Content-Security-Policy", content_security_policy()),
    ])
}

pub struct SecureHeaders {
    headers: BTreeMap<&'static str, String>,
}

impl SecureHeaders {
    pub fn new() -> Self {
        Self { headers: secure_headers() }
    }
}

impl Default for SecureHeaders {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl Fairing for SecureHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Secure Headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        for (name, value) in &self.headers {
            response.set_header(Header::new(*name, value.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::get;
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use rocket::routes;

    #[get("/")]
    fn index() -> &'static str {
        "ok"
    }

    #[test]
    fn header_map_is_fixed() {
        let headers = secure_headers();
        assert_eq!(headers.len(), 6);
        assert_eq!(headers["X-Frame-Options"], "DENY");
        assert_eq!(headers["Referrer-Policy"], "strict-origin-when-cross-origin");
        assert!(headers["Content-Security-Policy"].starts_with("default-src 'self'"));
    }

    #[rocket::async_test]
    async fn headers_attached_to_success_and_error_responses() {
        let rocket = rocket::build().attach(SecureHeaders::new()).mount("/", routes![index]);
        let client = Client::tracked(rocket).await.expect("valid rocket instance");

        for (uri, status) in [("/", Status::Ok), ("/missing", Status::NotFound)] {
            let response = client.get(uri).dispatch().await;
            assert_eq!(response.status(), status);
            assert_eq!(response.headers().get_one("X-Content-Type-Options"), Some("nosniff"));
            assert_eq!(response.headers().get_one("Permissions-Policy"), Some("camera=(), microphone=(), geolocation=()"));
        }
    }
}

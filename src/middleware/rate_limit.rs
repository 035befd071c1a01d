use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{SESSION_COOKIE, parse_bearer};
use crate::config::RateLimitConfig;
use crate::service::credentials::{CredentialService, hash_token};
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Independent counter families; each has its own limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Read,
    Mutation,
    Auth,
}

impl Bucket {
    fn for_method(method: Method) -> Self {
        match method {
            Method::Post | Method::Put | Method::Patch | Method::Delete => Bucket::Mutation,
            _ => Bucket::Read,
        }
    }

    fn limit(self, config: &RateLimitConfig) -> u32 {
        match self {
            Bucket::Read => config.read_limit,
            Bucket::Mutation => config.mutation_limit,
            Bucket::Auth => config.auth_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// `remaining` is how many more calls the tightest subject may make in its window.
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// One subject's counter. The window opens on the first hit and closes
/// `window` later; the next hit after that opens a fresh one.
#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    opened_at: Instant,
    hits: u32,
}

impl FixedWindow {
    fn open(now: Instant) -> Self {
        Self { opened_at: now, hits: 0 }
    }

    fn is_closed(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.opened_at) >= window
    }

    fn roll(&mut self, now: Instant, window: Duration) {
        if self.is_closed(now, window) {
            *self = FixedWindow::open(now);
        }
    }

    fn closes_in(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.opened_at))
    }
}

/// In-process fixed-window limiter. State is lost on restart and is not shared
/// between instances.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Duration,
    sweep_every: Duration,
    windows: Mutex<HashMap<(Bucket, String), FixedWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms.max(1)),
            sweep_every: Duration::from_secs(config.cleanup_interval_seconds.max(1)),
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sweep_every);
            loop {
                ticker.tick().await;
                let swept = self.sweep().await;
                if swept > 0 {
                    debug!(swept, "dropped closed rate limit windows");
                }
            }
        });
    }

    async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, counter| !counter.is_closed(now, self.window));
        before - windows.len()
    }

    /// Counts one call for `identifier` in `bucket`.
    pub async fn hit(&self, identifier: &str, bucket: Bucket) -> RateLimitDecision {
        self.admit(&[identifier.to_string()], bucket).await
    }

    /// Admits a call only when every subject still has room, then counts it
    /// against all of them. Denied calls are not counted.
    async fn admit(&self, subjects: &[String], bucket: Bucket) -> RateLimitDecision {
        let limit = bucket.limit(&self.config);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let retry_after = subjects
            .iter()
            .filter_map(|subject| {
                let counter = windows.entry((bucket, subject.clone())).or_insert_with(|| FixedWindow::open(now));
                counter.roll(now, self.window);
                (counter.hits >= limit).then(|| counter.closes_in(now, self.window))
            })
            .max();

        if let Some(retry_after) = retry_after {
            return RateLimitDecision::Denied { retry_after };
        }

        let remaining = subjects
            .iter()
            .filter_map(|subject| {
                windows.get_mut(&(bucket, subject.clone())).map(|counter| {
                    counter.hits += 1;
                    limit - counter.hits
                })
            })
            .min()
            .unwrap_or(limit);

        RateLimitDecision::Allowed { remaining }
    }

    /// Client address plus, when present, the caller's session digest or token
    /// subject. Fails only when no subject exists and the config insists on an IP.
    fn subjects(&self, request: &Request<'_>) -> Result<Vec<String>, RateLimitError> {
        let mut subjects = Vec::with_capacity(2);
        if let Some(ip) = request.client_ip() {
            subjects.push(format!("ip:{ip}"));
        }
        if let Some(caller) = caller_key(request) {
            subjects.push(format!("user:{caller}"));
        }

        if subjects.is_empty() {
            warn!(method = %request.method(), uri = %request.uri(), "client ip unavailable for rate limiting");
            if self.config.require_client_ip {
                return Err(RateLimitError::MissingClientIp);
            }
            subjects.push("ip:unknown".to_string());
        }
        Ok(subjects)
    }
}

/// Seconds until the caller may retry; read by the 429 catcher.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRetryAfter(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    TooManyRequests,
    MissingClientIp,
}

impl From<RateLimitError> for Status {
    fn from(error: RateLimitError) -> Self {
        match error {
            RateLimitError::TooManyRequests => Status::TooManyRequests,
            RateLimitError::MissingClientIp => Status::BadRequest,
        }
    }
}

/// Picks the bucket a guarded route is counted in.
pub trait BucketPolicy: Send + Sync + 'static {
    const DESCRIPTION: &'static str;

    fn bucket(request: &Request<'_>) -> Bucket;
}

/// Reads and mutations by HTTP method.
#[derive(Debug)]
pub struct ByMethod;

impl BucketPolicy for ByMethod {
    const DESCRIPTION: &'static str = "Too Many Requests";

    fn bucket(request: &Request<'_>) -> Bucket {
        Bucket::for_method(request.method())
    }
}

/// Credential endpoints share the stricter auth bucket.
#[derive(Debug)]
pub struct CredentialAttempts;

impl BucketPolicy for CredentialAttempts {
    const DESCRIPTION: &'static str = "Too Many Requests - too many authentication attempts";

    fn bucket(_request: &Request<'_>) -> Bucket {
        Bucket::Auth
    }
}

/// Request guard that succeeds while the caller is under the limit of the
/// bucket chosen by `P`. Without a managed limiter every request passes.
#[derive(Debug)]
pub struct RateLimited<P>(PhantomData<fn() -> P>);

pub type RateLimit = RateLimited<ByMethod>;
pub type AuthRateLimit = RateLimited<CredentialAttempts>;

#[rocket::async_trait]
impl<'r, P: BucketPolicy> FromRequest<'r> for RateLimited<P> {
    type Error = RateLimitError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(limiter) = request.rocket().state::<Arc<RateLimiter>>() else {
            return Outcome::Success(RateLimited(PhantomData));
        };

        let subjects = match limiter.subjects(request) {
            Ok(subjects) => subjects,
            Err(error) => return Outcome::Error((error.into(), error)),
        };

        let bucket = P::bucket(request);
        match limiter.admit(&subjects, bucket).await {
            RateLimitDecision::Allowed { .. } => Outcome::Success(RateLimited(PhantomData)),
            RateLimitDecision::Denied { retry_after } => {
                let seconds = retry_after_secs(retry_after);
                request.local_cache(|| Some(RateLimitRetryAfter(seconds)));

                let request_id = request.local_cache(|| None::<crate::middleware::RequestId>);
                warn!(
                    security_event = "rate_limited",
                    request_id = %request_id.as_ref().map(|r| r.0.as_str()).unwrap_or("unknown"),
                    bucket = ?bucket,
                    uri = %request.uri(),
                    retry_after_secs = seconds,
                    "rate limit exceeded"
                );
                Outcome::Error((RateLimitError::TooManyRequests.into(), RateLimitError::TooManyRequests))
            }
        }
    }
}

impl<'a, P: BucketPolicy> OpenApiFromRequest<'a> for RateLimited<P> {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        responses.responses.insert(
            "429".to_string(),
            RefOr::Object(OpenApiResponse {
                description: P::DESCRIPTION.to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_millis().div_ceil(1000).max(1) as u64
}

/// Session cookies are keyed by token digest so no database lookup is needed here.
fn caller_key(request: &Request<'_>) -> Option<String> {
    if let Some(cookie) = request.cookies().get_private(SESSION_COOKIE) {
        return Some(hash_token(cookie.value()));
    }

    let token = request.headers().get_one("Authorization").and_then(parse_bearer)?;
    let credentials = request.rocket().state::<CredentialService>()?;
    credentials.validate_token(token).map(|identity| identity.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::error::too_many_requests;
    use rocket::http::ContentType;
    use rocket::local::asynchronous::Client;
    use rocket::{catchers, get, post, routes};

    #[get("/limited")]
    async fn limited(_rate_limit: RateLimit) -> Status {
        Status::Ok
    }

    #[post("/login")]
    async fn login(_rate_limit: AuthRateLimit) -> Status {
        Status::Ok
    }

    fn limiter(read_limit: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            read_limit,
            mutation_limit: 1,
            auth_limit: 1,
            window_ms,
            cleanup_interval_seconds: 60,
            require_client_ip: false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn three_per_second_then_denied_then_fresh_window() {
        let limiter = limiter(3, 1000);

        for remaining in [2, 1, 0] {
            assert_eq!(limiter.hit("127.0.0.1", Bucket::Read).await, RateLimitDecision::Allowed { remaining });
        }
        assert!(!limiter.hit("127.0.0.1", Bucket::Read).await.is_allowed());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!limiter.hit("127.0.0.1", Bucket::Read).await.is_allowed());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(limiter.hit("127.0.0.1", Bucket::Read).await, RateLimitDecision::Allowed { remaining: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn denial_reports_time_left_in_window() {
        let limiter = limiter(1, 1000);

        limiter.hit("127.0.0.1", Bucket::Read).await;
        tokio::time::advance(Duration::from_millis(400)).await;

        assert_eq!(
            limiter.hit("127.0.0.1", Bucket::Read).await,
            RateLimitDecision::Denied {
                retry_after: Duration::from_millis(600)
            }
        );
    }

    #[tokio::test]
    async fn buckets_and_identifiers_are_counted_apart() {
        let limiter = limiter(10, 60_000);

        assert!(limiter.hit("10.0.0.1", Bucket::Mutation).await.is_allowed());
        assert!(!limiter.hit("10.0.0.1", Bucket::Mutation).await.is_allowed());
        assert!(limiter.hit("10.0.0.1", Bucket::Read).await.is_allowed());
        assert!(limiter.hit("10.0.0.2", Bucket::Mutation).await.is_allowed());
    }

    #[tokio::test]
    async fn one_exhausted_subject_denies_without_counting_the_others() {
        let limiter = limiter(2, 60_000);
        let ip = "ip:10.0.0.1".to_string();
        let user = "user:writer".to_string();

        limiter.admit(std::slice::from_ref(&user), Bucket::Read).await;
        limiter.admit(std::slice::from_ref(&user), Bucket::Read).await;

        let decision = limiter.admit(&[ip.clone(), user.clone()], Bucket::Read).await;
        assert!(!decision.is_allowed());
        assert_eq!(limiter.hits_for(&ip, Bucket::Read).await, 0);
        assert_eq!(limiter.hits_for(&user, Bucket::Read).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_hits_never_exceed_the_limit() {
        let limiter = Arc::new(limiter(25, 60_000));
        let calls: Vec<_> = (0..100)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.hit("burst", Bucket::Read).await.is_allowed() })
            })
            .collect();

        let mut allowed = 0;
        for call in calls {
            if call.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 25);
        assert_eq!(limiter.hits_for("burst", Bucket::Read).await, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_closed_windows() {
        let limiter = limiter(5, 1000);
        limiter.hit("10.0.0.1", Bucket::Read).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        limiter.hit("10.0.0.2", Bucket::Read).await;
        tokio::time::advance(Duration::from_millis(600)).await;

        assert_eq!(limiter.sweep().await, 1);
        assert_eq!(limiter.hits_for("10.0.0.2", Bucket::Read).await, 1);
    }

    #[test]
    fn bucket_follows_method() {
        for method in [Method::Get, Method::Head, Method::Options] {
            assert_eq!(Bucket::for_method(method), Bucket::Read);
        }
        for method in [Method::Post, Method::Put, Method::Patch, Method::Delete] {
            assert_eq!(Bucket::for_method(method), Bucket::Mutation);
        }
    }

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[rocket::async_test]
    async fn denied_request_gets_retry_after_header() {
        let rocket = rocket::build()
            .manage(Arc::new(limiter(0, 60_000)))
            .mount("/", routes![limited])
            .register("/", catchers![too_many_requests]);

        let client = Client::tracked(rocket).await.expect("valid rocket instance");
        let response = client.get("/limited").dispatch().await;

        assert_eq!(response.status(), Status::TooManyRequests);
        assert_eq!(response.headers().get_one("Retry-After"), Some("60"));
        assert_eq!(response.content_type(), Some(ContentType::JSON));
    }

    #[rocket::async_test]
    async fn auth_routes_use_their_own_bucket() {
        let rocket = rocket::build().manage(Arc::new(limiter(10, 60_000))).mount("/", routes![limited, login]);
        let client = Client::tracked(rocket).await.expect("valid rocket instance");

        assert_eq!(client.post("/login").dispatch().await.status(), Status::Ok);
        assert_eq!(client.post("/login").dispatch().await.status(), Status::TooManyRequests);
        assert_eq!(client.get("/limited").dispatch().await.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn unmanaged_limiter_lets_everything_through() {
        let rocket = rocket::build().mount("/", routes![limited]);
        let client = Client::tracked(rocket).await.expect("valid rocket instance");
        for _ in 0..5 {
            assert_eq!(client.get("/limited").dispatch().await.status(), Status::Ok);
        }
    }

    impl RateLimiter {
        async fn hits_for(&self, subject: &str, bucket: Bucket) -> u32 {
            let windows = self.windows.lock().await;
            windows.get(&(bucket, subject.to_string())).map(|counter| counter.hits).unwrap_or(0)
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use percent_encoding::percent_decode_str;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_ORIGIN: &str = "https://www.reddit.com";
pub const GRAPHQL_PATH: &str = "/svc/shreddit/graphql";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const COMMENT_KIND: &str = "t1";
const COMMENT_PREFIX: &str = "t1_";

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("reddit: csrf token cookie missing")]
    MissingCsrf,
}

/// Supplies the browser session cookies sent along with authenticated calls.
pub trait CookieSource: Send + Sync {
    fn cookie_header(&self) -> Option<String>;

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookie_header()
            .and_then(|header| cookie_value(&header, name))
    }
}

/// A fixed raw `Cookie` header, as configured for the session.
#[derive(Debug, Default)]
pub struct CookieJar {
    header: Option<String>,
}

impl CookieJar {
    pub fn new(header: Option<String>) -> Self {
        Self {
            header: header.filter(|value| !value.trim().is_empty()),
        }
    }
}

impl CookieSource for CookieJar {
    fn cookie_header(&self) -> Option<String> {
        self.header.clone()
    }
}

/// Looks up one cookie in a `name=value; name2=value2` header. A name that appears
/// more than once is ambiguous and yields `None`.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    let mut matches = header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| *key == name);
    let (_, value) = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(percent_decode_str(value).decode_utf8_lossy().into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteState {
    #[default]
    None,
    Up,
    Down,
}

impl VoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteState::None => "NONE",
            VoteState::Up => "UP",
            VoteState::Down => "DOWN",
        }
    }
}

/// GraphQL operation name and input field for a thing identifier.
pub fn vote_operation(thing_id: &str) -> (&'static str, &'static str) {
    if thing_id.starts_with(COMMENT_PREFIX) {
        ("UpdateCommentVoteState", "commentId")
    } else {
        ("UpdatePostVoteState", "postId")
    }
}

pub fn vote_body(thing_id: &str, state: VoteState, csrf: &str) -> Value {
    let (operation, input_key) = vote_operation(thing_id);
    json!({
        "operation": operation,
        "variables": {
            "input": {
                input_key: thing_id,
                "voteState": state.as_str(),
            }
        },
        "csrf_token": csrf,
    })
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub origin: Option<String>,
    pub graphql_path: Option<String>,
    pub timeout: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("reddit-inline/{}", crate::VERSION),
            origin: None,
            graphql_path: None,
            timeout: Duration::from_secs(20),
            http_client: None,
        }
    }
}

pub struct Client {
    cookies: Arc<dyn CookieSource>,
    http: HttpClient,
    user_agent: String,
    origin: Url,
    graphql_url: Url,
}

impl Client {
    pub fn new(cookies: Arc<dyn CookieSource>, config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("reddit client user agent required");
        }
        let origin = config
            .origin
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let origin = Url::parse(&origin).context("reddit: parse origin")?;
        let graphql_path = config
            .graphql_path
            .unwrap_or_else(|| GRAPHQL_PATH.to_string());
        let graphql_url = origin
            .join(&graphql_path)
            .context("reddit: build graphql url")?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };

        Ok(Client {
            cookies,
            http,
            user_agent: config.user_agent,
            origin,
            graphql_url,
        })
    }

    /// Absolute URL of the comment-tree document for a post permalink.
    pub fn comments_url(&self, permalink: &str) -> Result<Url> {
        self.origin
            .join(&format!("{}.json", permalink))
            .with_context(|| format!("reddit: invalid permalink {permalink}"))
    }

    /// Fetches the top-level comment listing of a post.
    pub fn comments(&self, permalink: &str) -> Result<Listing<Comment>> {
        let url = self.comments_url(permalink)?;
        debug!("GET {url}");
        let mut req = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.clone());
        if let Some(cookies) = self.cookies.cookie_header() {
            req = req.header(COOKIE, cookies);
        }
        let resp = check_status(req.send()?)?;
        let payload: Vec<Value> = resp.json().context("reddit: decode comments payload")?;
        parse_comments_payload(payload)
    }

    /// Sets the vote state of a comment (`t1_`) or post on behalf of the session.
    pub fn vote(&self, thing_id: &str, state: VoteState) -> Result<()> {
        let csrf = self
            .cookies
            .cookie(CSRF_COOKIE)
            .filter(|token| !token.is_empty())
            .ok_or(VoteError::MissingCsrf)?;
        let cookies = self.cookies.cookie_header().unwrap_or_default();

        let body = vote_body(thing_id, state, &csrf);
        debug!("vote {thing_id} -> {}", state.as_str());
        let resp = self
            .http
            .post(self.graphql_url.clone())
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, cookies)
            .json(&body)
            .send()?;
        check_status(resp)?;
        Ok(())
    }
}

fn check_status(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    match status.as_u16() {
        401 => Err(anyhow!("reddit: unauthorized")),
        403 => Err(anyhow!("reddit: forbidden")),
        429 => Err(anyhow!("reddit: rate limited: {}", body)),
        _ => Err(anyhow!("reddit: api error {}: {}", status, body)),
    }
}

/// Decodes the two-element `[post listing, comment listing]` document.
pub fn parse_comments_payload(mut payload: Vec<Value>) -> Result<Listing<Comment>> {
    if payload.len() < 2 {
        bail!("reddit: comments payload missing elements");
    }
    let comments: ListingEnvelope<Comment> = serde_json::from_value(payload.swap_remove(1))
        .context("reddit: decode comment listing")?;
    Ok(comments.data)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

impl Listing<Comment> {
    /// Comment-kind children in listing order; `more` stubs are skipped.
    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.children
            .iter()
            .filter(|thing| thing.kind == COMMENT_KIND)
            .map(|thing| &thing.data)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

/// One comment record. Every field is optional on the wire; absent or mistyped
/// values fall back to defaults so a single bad record never fails the listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    pub is_submitter: bool,
    pub replies: Option<Box<Listing<Comment>>>,
}

impl<'de> Deserialize<'de> for Comment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CommentHelper {
            #[serde(default)]
            id: Value,
            #[serde(default)]
            name: Value,
            #[serde(default)]
            author: Value,
            #[serde(default)]
            body: Value,
            #[serde(default)]
            score: Value,
            #[serde(default)]
            created_utc: Value,
            #[serde(default)]
            is_submitter: Value,
            #[serde(default)]
            replies: Value,
        }

        let helper = CommentHelper::deserialize(deserializer)?;
        let replies = if helper.replies.is_object() {
            serde_json::from_value::<ListingEnvelope<Comment>>(helper.replies)
                .ok()
                .map(|listing| Box::new(listing.data))
        } else {
            None
        };
        Ok(Comment {
            id: string_field(&helper.id),
            name: string_field(&helper.name),
            author: helper
                .author
                .as_str()
                .filter(|author| !author.is_empty())
                .map(str::to_string),
            body: string_field(&helper.body),
            score: helper
                .score
                .as_i64()
                .or_else(|| helper.score.as_f64().map(|score| score as i64))
                .unwrap_or(0),
            created_utc: helper.created_utc.as_f64().unwrap_or(0.0),
            is_submitter: helper.is_submitter.as_bool().unwrap_or(false),
            replies,
        })
    }
}

fn string_field(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListingEnvelope<T> {
    #[serde(default)]
    kind: String,
    data: Listing<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;

    #[test]
    fn comment_operation_mapping() {
        assert_eq!(
            vote_operation("t1_abc"),
            ("UpdateCommentVoteState", "commentId")
        );
        assert_eq!(vote_operation("t3_xyz"), ("UpdatePostVoteState", "postId"));
        assert_eq!(vote_operation(""), ("UpdatePostVoteState", "postId"));
    }

    #[test]
    fn vote_body_shape() {
        let body = vote_body("t1_abc", VoteState::Down, "tok");
        assert_eq!(body["operation"], "UpdateCommentVoteState");
        assert_eq!(body["variables"]["input"]["commentId"], "t1_abc");
        assert_eq!(body["variables"]["input"]["voteState"], "DOWN");
        assert_eq!(body["csrf_token"], "tok");

        let body = vote_body("t3_xyz", VoteState::None, "tok");
        assert_eq!(body["variables"]["input"]["postId"], "t3_xyz");
        assert_eq!(body["variables"]["input"]["voteState"], "NONE");
    }

    #[test]
    fn cookie_lookup() {
        let header = "session=abc; csrf_token=a%2Fb; other=1";
        assert_eq!(cookie_value(header, "csrf_token").as_deref(), Some("a/b"));
        assert_eq!(cookie_value(header, "session").as_deref(), Some("abc"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("xcsrf_token=1", "csrf_token"), None);
    }

    #[test]
    fn duplicate_cookie_is_ambiguous() {
        let header = "csrf_token=one; session=abc; csrf_token=two";
        assert_eq!(cookie_value(header, "csrf_token"), None);
        assert_eq!(cookie_value(header, "session").as_deref(), Some("abc"));

        let jar = Arc::new(CookieJar::new(Some(header.into())));
        let client = Client::new(jar, ClientConfig::default()).unwrap();
        let err = client.vote("t1_abc", VoteState::Up).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VoteError>(),
            Some(VoteError::MissingCsrf)
        ));
    }

    #[test]
    fn vote_without_csrf_fails_before_network() {
        let jar = Arc::new(CookieJar::new(Some("session=abc".into())));
        let client = Client::new(
            jar,
            ClientConfig {
                origin: Some("http://127.0.0.1:9".into()),
                ..ClientConfig::default()
            },
        )
        .unwrap();
        let err = client.vote("t1_abc", VoteState::Up).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VoteError>(),
            Some(VoteError::MissingCsrf)
        ));
    }

    #[test]
    fn comments_url_appends_json() {
        let client = Client::new(Arc::new(CookieJar::default()), ClientConfig::default()).unwrap();
        let url = client
            .comments_url("/r/rust/comments/abc/title/")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.reddit.com/r/rust/comments/abc/title/.json"
        );
    }

    #[test]
    fn decode_listing_with_defaults() {
        let payload = json!([
            {"kind": "Listing", "data": {"children": []}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {
                    "name": "t1_a", "author": "alice", "body": "hi", "score": 12,
                    "created_utc": 1700000000.0, "is_submitter": true,
                    "replies": {"kind": "Listing", "data": {"children": [
                        {"kind": "t1", "data": {"name": "t1_b"}},
                        {"kind": "more", "data": {"count": 4, "children": ["x"]}}
                    ]}}
                }},
                {"kind": "t1", "data": {"name": "t1_c", "replies": "", "score": "oops"}},
                {"kind": "more", "data": {"count": 10}}
            ]}}
        ]);
        let payload: Vec<Value> = serde_json::from_value(payload).unwrap();
        let listing = parse_comments_payload(payload).unwrap();
        let comments: Vec<&Comment> = listing.comments().collect();
        assert_eq!(comments.len(), 2);

        let first = comments[0];
        assert_eq!(first.author.as_deref(), Some("alice"));
        assert!(first.is_submitter);
        let replies = first.replies.as_ref().unwrap();
        assert_eq!(replies.children.len(), 2);
        assert_eq!(replies.comments().count(), 1);

        let second = comments[1];
        assert_eq!(second.author, None);
        assert_eq!(second.body, "");
        assert_eq!(second.score, 0);
        assert_eq!(second.created_utc, 0.0);
        assert!(second.replies.is_none());
    }

    #[test]
    fn short_payload_is_an_error() {
        let payload = vec![json!({"kind": "Listing"})];
        assert!(parse_comments_payload(payload).is_err());
    }

    struct Received {
        method: String,
        url: String,
        cookie: Option<String>,
        content_type: Option<String>,
        body: String,
    }

    /// Serves a single request with the given status and body, handing back what
    /// the client sent.
    fn serve_once(status: u16, body: &str) -> (String, thread::JoinHandle<Received>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let origin = format!("http://{}", server.server_addr().to_ip().unwrap());
        let body = body.to_string();
        let handle = thread::spawn(move || {
            let mut request = server
                .recv_timeout(Duration::from_secs(5))
                .unwrap()
                .expect("client sent a request");
            let header = |name: &str| {
                request
                    .headers()
                    .iter()
                    .find(|entry| entry.field.to_string().eq_ignore_ascii_case(name))
                    .map(|entry| entry.value.to_string())
            };
            let cookie = header("Cookie");
            let content_type = header("Content-Type");
            let mut sent = String::new();
            request.as_reader().read_to_string(&mut sent).unwrap();
            let received = Received {
                method: request.method().to_string(),
                url: request.url().to_string(),
                cookie,
                content_type,
                body: sent,
            };
            request
                .respond(tiny_http::Response::from_string(body).with_status_code(status))
                .unwrap();
            received
        });
        (origin, handle)
    }

    fn client_for(origin: String) -> Client {
        let jar = Arc::new(CookieJar::new(Some(
            "session=abc; csrf_token=tok%3D".to_string(),
        )));
        Client::new(
            jar,
            ClientConfig {
                origin: Some(origin),
                timeout: Duration::from_secs(5),
                ..ClientConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn vote_posts_graphql_request() {
        let (origin, server) = serve_once(200, "{}");
        client_for(origin).vote("t1_abc", VoteState::Up).unwrap();

        let received = server.join().unwrap();
        assert_eq!(received.method, "POST");
        assert_eq!(received.url, GRAPHQL_PATH);
        assert_eq!(
            received.cookie.as_deref(),
            Some("session=abc; csrf_token=tok%3D")
        );
        assert!(received
            .content_type
            .unwrap_or_default()
            .starts_with("application/json"));
        let body: Value = serde_json::from_str(&received.body).unwrap();
        assert_eq!(body["operation"], "UpdateCommentVoteState");
        assert_eq!(body["variables"]["input"]["commentId"], "t1_abc");
        assert_eq!(body["variables"]["input"]["voteState"], "UP");
        assert_eq!(body["csrf_token"], "tok=");
    }

    #[test]
    fn post_vote_uses_post_id() {
        let (origin, server) = serve_once(200, "{}");
        client_for(origin).vote("t3_xyz", VoteState::None).unwrap();

        let body: Value = serde_json::from_str(&server.join().unwrap().body).unwrap();
        assert_eq!(body["operation"], "UpdatePostVoteState");
        assert_eq!(body["variables"]["input"]["postId"], "t3_xyz");
        assert!(body["variables"]["input"].get("commentId").is_none());
    }

    #[test]
    fn vote_fails_on_non_success_status() {
        let (origin, server) = serve_once(403, "nope");
        let err = client_for(origin).vote("t1_abc", VoteState::Down).unwrap_err();
        assert!(err.to_string().contains("forbidden"));
        server.join().unwrap();

        let (origin, server) = serve_once(500, "boom");
        let err = client_for(origin).vote("t1_abc", VoteState::Down).unwrap_err();
        assert!(err.to_string().contains("api error 500"));
        assert!(err.to_string().contains("boom"));
        server.join().unwrap();
    }

    #[test]
    fn comments_fetches_permalink_json() {
        let payload = json!([
            {"kind": "Listing", "data": {"children": []}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {"name": "t1_a", "author": "alice", "body": "hi"}}
            ]}}
        ]);
        let (origin, server) = serve_once(200, &payload.to_string());
        let listing = client_for(origin)
            .comments("/r/rust/comments/abc/title/")
            .unwrap();

        let received = server.join().unwrap();
        assert_eq!(received.method, "GET");
        assert_eq!(received.url, "/r/rust/comments/abc/title/.json");
        assert_eq!(
            received.cookie.as_deref(),
            Some("session=abc; csrf_token=tok%3D")
        );
        let comments: Vec<&Comment> = listing.comments().collect();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author.as_deref(), Some("alice"));
    }

    #[test]
    fn comments_rejects_single_listing_payload() {
        let payload = json!([{"kind": "Listing", "data": {"children": []}}]);
        let (origin, server) = serve_once(200, &payload.to_string());
        assert!(client_for(origin).comments("/r/x/comments/1/").is_err());
        server.join().unwrap();
    }

    #[test]
    fn comments_fail_on_non_success_status() {
        let (origin, server) = serve_once(429, "slow down");
        let err = client_for(origin).comments("/r/x/comments/1/").unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        server.join().unwrap();
    }
}

//! Incoming HTTP request type.
//!
//! A [`Request`] is a set of independent bags, decoded once when the request
//! arrives:
//!
//! | Bag | Accessor | Source |
//! |---|---|---|
//! | query | [`query`](Request::query) | URI query string |
//! | body | [`post`](Request::post) | urlencoded, JSON or multipart body |
//! | attributes | [`attributes`](Request::attributes) | route parameters |
//! | cookies | [`cookies`](Request::cookies) | `Cookie` header |
//! | files | [`files`](Request::files) | multipart file parts |
//! | server | [`server`](Request::server) | method, URI, version, headers, peer |
//! | content | [`content`](Request::content) | the raw body bytes |
//!
//! [`get`](Request::get), [`input`](Request::input) and [`all`](Request::all)
//! read the merged surface: body over query, plus files for `all`.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HeaderName, HeaderValue, REFERER};
use http::{HeaderMap, Method, Uri, Version};
use http_body_util::BodyExt;
use serde_json::Value;

use crate::error::Error;
use crate::input::{self, Input};
use crate::route::Route;
use crate::router::Services;
use crate::upload::{Files, UploadedFile};

// ── Metadata ──────────────────────────────────────────────────────────────────

/// Server and transport metadata for one request.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Metadata {
    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
}

// ── RequestData ───────────────────────────────────────────────────────────────

/// Everything a request carries, detached from routing and services.
///
/// Form requests are rehydrated from one of these.
#[derive(Clone, Debug, Default)]
pub struct RequestData {
    pub query: Input,
    pub body: Input,
    pub attributes: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub files: Files,
    pub server: Metadata,
    pub content: Bytes,
}

// ── Request ───────────────────────────────────────────────────────────────────

/// An incoming HTTP request.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub(crate) data: RequestData,
    pub(crate) route: Option<Route>,
    pub(crate) services: Services,
}

impl Request {
    /// Decodes a request from its head and fully-read body.
    ///
    /// The body is decoded by content type: `application/x-www-form-urlencoded`,
    /// `application/json` (and `+json` types) and `multipart/form-data`
    /// populate the body bag; anything else is only available as raw content.
    pub async fn from_parts(
        parts: http::request::Parts,
        content: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Self, Error> {
        let query = match parts.uri.query() {
            Some(q) => Input::from_urlencoded(q.as_bytes())?,
            None => Input::new(),
        };
        let cookies = parse_cookies(&parts.headers);

        let content_type = parts.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let (body, files) = match content_type.as_deref() {
            Some(ct) if !content.is_empty() => decode_body(ct, content.clone()).await?,
            _ => (Input::new(), Files::new()),
        };

        let server = Metadata {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
        };

        Ok(Self {
            data: RequestData {
                query,
                body,
                attributes: HashMap::new(),
                cookies,
                files,
                server,
                content,
            },
            route: None,
            services: Services::default(),
        })
    }

    /// Reads the whole hyper body, then decodes as [`from_parts`](Request::from_parts).
    pub(crate) async fn from_hyper(
        req: hyper::Request<hyper::body::Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Self, Error> {
        let (parts, body) = req.into_parts();
        let content = body.collect().await?.to_bytes();
        Self::from_parts(parts, content, Some(remote_addr)).await
    }

    /// Builds a request in memory, for tests and internal sub-requests.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Replaces every bag with `data`. Routing and services are untouched.
    pub fn initialize(&mut self, data: RequestData) {
        self.data = data;
    }

    /// A copy of every bag.
    pub fn to_data(&self) -> RequestData {
        self.data.clone()
    }

    pub(crate) fn attach(&mut self, route: Route, services: Services) {
        self.data.attributes = route.params.clone();
        self.route = Some(route);
        self.services = services;
    }

    // ── Server metadata ───────────────────────────────────────────────────────

    pub fn server(&self) -> &Metadata { &self.data.server }
    pub fn method(&self) -> &Method { &self.data.server.method }
    pub fn uri(&self) -> &Uri { &self.data.server.uri }
    pub fn path(&self) -> &str { self.data.server.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.data.server.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.data.server.remote_addr }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.data.server.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn referer(&self) -> Option<&str> {
        self.data.server.headers.get(REFERER).and_then(|v| v.to_str().ok())
    }

    /// `true` when the request was sent by script (`X-Requested-With: XMLHttpRequest`).
    pub fn ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    // ── Bags ──────────────────────────────────────────────────────────────────

    pub fn query(&self) -> &Input { &self.data.query }
    pub fn post(&self) -> &Input { &self.data.body }
    pub fn attributes(&self) -> &HashMap<String, String> { &self.data.attributes }
    pub fn cookies(&self) -> &HashMap<String, String> { &self.data.cookies }
    pub fn files(&self) -> &Files { &self.data.files }
    pub fn content(&self) -> &Bytes { &self.data.content }
    pub fn body(&self) -> &[u8] { &self.data.content }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.data.attributes.get(key).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.data.cookies.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.data.files.get(name)
    }

    /// The matched route, once the router has dispatched the request.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    // ── Merged input ──────────────────────────────────────────────────────────

    /// Reads one input field from the merged query and body, exactly as
    /// [`input`](Request::input) would resolve it. Absent → `Null`.
    ///
    /// A literal key (`user.email` sent as a field name) wins over a dotted
    /// walk into a nested value, in either bag.
    pub fn get(&self, key: &str) -> &Value {
        input::lookup(&[&self.data.query, &self.data.body], key)
    }

    /// `true` when [`get`](Request::get) finds a value that is not an empty string.
    pub fn has(&self, key: &str) -> bool {
        input::is_filled(self.get(key))
    }

    /// Query and body merged; body wins on conflicts.
    pub fn input(&self) -> Input {
        let mut input = self.data.query.clone();
        input.merge(&self.data.body);
        input
    }

    /// [`input`](Request::input) plus a description of each uploaded file.
    pub fn all(&self) -> Input {
        let mut all = self.input();
        for (name, file) in &self.data.files {
            all.insert(name.clone(), file.describe());
        }
        all
    }

    /// Input without the named fields. Files are never included.
    pub fn except(&self, keys: &[&str]) -> Input {
        self.input().except(keys)
    }

    pub fn only(&self, keys: &[&str]) -> Input {
        self.input().only(keys)
    }
}

// ── Body decoding ─────────────────────────────────────────────────────────────

async fn decode_body(content_type: &str, content: Bytes) -> Result<(Input, Files), Error> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/x-www-form-urlencoded" => Ok((Input::from_urlencoded(&content)?, Files::new())),
        "multipart/form-data" => decode_multipart(content_type, content).await,
        ct if ct == "application/json" || ct.ends_with("+json") => {
            let value: Value = serde_json::from_slice(&content)?;
            Ok((Input::from_json(value), Files::new()))
        }
        _ => Ok((Input::new(), Files::new())),
    }
}

async fn decode_multipart(content_type: &str, content: Bytes) -> Result<(Input, Files), Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(content) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = Vec::new();
    let mut files = Files::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else { continue };

        match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await?;
                files.insert(name, UploadedFile::new(filename, content_type, data));
            }
            None => fields.push((name, field.text().await?)),
        }
    }

    Ok((Input::from_pairs(fields), files))
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers.get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().trim_matches('"').to_owned()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// In-memory [`Request`] construction.
///
/// ```rust
/// use formgate::Request;
/// use http::Method;
///
/// let req = Request::builder()
///     .method(Method::POST)
///     .uri("/users?ref=home")
///     .ajax()
///     .form([("email", "ada@example.com")])
///     .build();
///
/// assert!(req.ajax());
/// assert_eq!(req.get("email"), "ada@example.com");
/// assert_eq!(req.get("ref"), "home");
/// ```
#[derive(Default)]
pub struct RequestBuilder {
    data: RequestData,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.data.server.method = method;
        self
    }

    /// Sets the URI and decodes its query string.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid URI.
    pub fn uri(mut self, uri: &str) -> Self {
        let uri: Uri = uri.parse().expect("invalid request uri");
        self.data.query = uri.query()
            .and_then(|q| Input::from_urlencoded(q.as_bytes()).ok())
            .unwrap_or_default();
        self.data.server.uri = uri;
        self
    }

    /// Appends a header.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::from_bytes(name.as_bytes()).expect("invalid header name");
        let value = HeaderValue::from_str(value).expect("invalid header value");
        self.data.server.headers.append(name, value);
        self
    }

    /// Marks the request as sent by script.
    pub fn ajax(self) -> Self {
        self.header("x-requested-with", "XMLHttpRequest")
    }

    pub fn referer(self, url: &str) -> Self {
        self.header("referer", url)
    }

    /// A urlencoded form body.
    pub fn form<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.data.content = serde_urlencoded::to_string(&pairs).unwrap_or_default().into();
        self.data.body = Input::from_pairs(pairs);
        self.header("content-type", "application/x-www-form-urlencoded")
    }

    /// A JSON body.
    pub fn json(mut self, value: Value) -> Self {
        self.data.content = value.to_string().into();
        self.data.body = Input::from_json(value);
        self.header("content-type", "application/json")
    }

    pub fn file(mut self, name: &str, file: UploadedFile) -> Self {
        self.data.files.insert(name.to_owned(), file);
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.data.cookies.insert(name.to_owned(), value.to_owned());
        self
    }

    /// A route attribute, as the router would set it.
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.data.attributes.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.data.server.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        Request { data: self.data, route: None, services: Services::default() }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parts(method: Method, uri: &str, headers: &[(&str, &str)]) -> http::request::Parts {
        let mut builder = http::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn decodes_urlencoded_body_and_query() {
        let parts = parts(
            Method::POST,
            "/signup?plan=pro&email=query@example.com",
            &[("content-type", "application/x-www-form-urlencoded; charset=utf-8")],
        );
        let req = Request::from_parts(parts, Bytes::from_static(b"email=ada%40example.com&tags[]=a"), None)
            .await
            .unwrap();

        assert_eq!(req.query().get("plan"), "pro");
        assert_eq!(req.get("email"), "ada@example.com");
        assert_eq!(req.get("plan"), "pro");
        assert_eq!(req.get("tags"), &json!(["a"]));
        assert_eq!(req.input().get("email"), "ada@example.com");
    }

    #[tokio::test]
    async fn decodes_json_body() {
        let parts = parts(Method::POST, "/", &[("content-type", "application/vnd.api+json")]);
        let req = Request::from_parts(parts, Bytes::from_static(br#"{"user":{"name":"Ada"}}"#), None)
            .await
            .unwrap();
        assert_eq!(req.get("user.name"), "Ada");
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let parts = parts(Method::POST, "/", &[("content-type", "application/json")]);
        let err = Request::from_parts(parts, Bytes::from_static(b"{"), None).await.unwrap_err();
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn decodes_multipart_fields_and_files() {
        let body = concat!(
            "--XYZ\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "Holiday\r\n",
            "--XYZ\r\n",
            "Content-Disposition: form-data; name=\"photo\"; filename=\"beach.jpg\"\r\n",
            "Content-Type: image/jpeg\r\n\r\n",
            "JPEGDATA\r\n",
            "--XYZ--\r\n",
        );
        let parts = parts(Method::POST, "/photos", &[("content-type", "multipart/form-data; boundary=XYZ")]);
        let req = Request::from_parts(parts, Bytes::from_static(body.as_bytes()), None).await.unwrap();

        assert_eq!(req.get("title"), "Holiday");
        let photo = req.file("photo").unwrap();
        assert_eq!(photo.filename(), "beach.jpg");
        assert_eq!(photo.content_type(), Some("image/jpeg"));
        assert_eq!(photo.data().as_ref(), b"JPEGDATA");
        assert_eq!(req.all().get("photo.size"), &json!(8));
    }

    #[tokio::test]
    async fn parses_cookies_and_metadata() {
        let addr: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let parts = parts(Method::GET, "/", &[("cookie", "session=abc; theme=\"dark\""), ("referer", "/prev")]);
        let req = Request::from_parts(parts, Bytes::new(), Some(addr)).await.unwrap();

        assert_eq!(req.cookie("session"), Some("abc"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.referer(), Some("/prev"));
        assert_eq!(req.remote_addr(), Some(addr));
        assert!(!req.ajax());
    }

    #[test]
    fn get_agrees_with_merged_input_across_bags() {
        let req = Request::builder()
            .uri("/contact?page=2&shared=query&user.email=ok%40example.com&a.b=query")
            .json(json!({
                "note": "hi",
                "shared": "body",
                "user": { "email": "not-an-email" },
                "a": { "b": "body" },
            }))
            .build();

        let cases = [
            ("note", json!("hi")),
            ("page", json!("2")),
            ("shared", json!("body")),
            ("user.email", json!("ok@example.com")),
            ("a.b", json!("query")),
            ("missing", Value::Null),
        ];
        let (input, all) = (req.input(), req.all());
        for (key, expected) in cases {
            assert_eq!(req.get(key), &expected, "key={key}");
            assert_eq!(req.get(key), input.get(key), "input key={key}");
            assert_eq!(req.get(key), all.get(key), "all key={key}");
        }
    }

    #[test]
    fn dotted_walk_follows_the_bag_that_wins_the_top_key() {
        let req = Request::builder()
            .uri("/?profile=x")
            .json(json!({ "profile": { "name": "Ada" } }))
            .build();
        assert_eq!(req.get("profile.name"), "Ada");
        assert_eq!(req.get("profile.name"), req.input().get("profile.name"));
    }

    #[test]
    fn has_reads_the_merged_surface() {
        let req = Request::builder()
            .uri("/?name=query")
            .form([("name", ""), ("email", "a@b.co")])
            .build();
        assert!(!req.has("name"));
        assert_eq!(req.has("name"), req.input().has("name"));
        assert!(req.has("email"));
        assert!(!req.has("missing"));
    }

    #[test]
    fn except_never_includes_files() {
        let req = Request::builder()
            .form([("email", "a@b.co"), ("password", "secret")])
            .file("avatar", UploadedFile::new("a.png", None, vec![1u8]))
            .build();
        let kept = req.except(&["password"]);
        assert_eq!(kept.keys().collect::<Vec<_>>(), ["email"]);
        assert!(req.all().contains_key("avatar"));
    }

    #[test]
    fn ajax_detection_is_case_insensitive() {
        let req = Request::builder().header("X-Requested-With", "xmlhttprequest").build();
        assert!(req.ajax());
    }
}

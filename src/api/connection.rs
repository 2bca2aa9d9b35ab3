//! Connection to a Wikibase web API
//!
//! One [`ApiConnection`] manages one logical session to one API base URL:
//! login state, cached tokens, timeouts and user agent, request
//! construction and response envelope parsing. The underlying HTTP client
//! is built lazily and dropped whenever the configuration changes, so the
//! next request picks up the new settings.
//!
//! A connection's session can be serialized to JSON (credentials and
//! token cache included) and restored later without re-authenticating,
//! provided the remote session is still valid.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use super::errors::{classify_error, ConnectionError};
use super::tokens::{TokenCache, TOKEN_CSRF, TOKEN_LOGIN};

/// URL of the API of wikidata.org.
pub const WIKIDATA_API_URL: &str = "https://www.wikidata.org/w/api.php";
/// URL of the API of test.wikidata.org.
pub const TEST_WIKIDATA_API_URL: &str = "https://test.wikidata.org/w/api.php";
/// URL of the API of commons.wikimedia.org.
pub const WIKIMEDIA_COMMONS_API_URL: &str = "https://commons.wikimedia.org/w/api.php";

/// Default user agent for all API requests.
pub const DEFAULT_USER_AGENT: &str = "WikibaseClient/0.1 (+https://github.com/wikibase-client)";

/// Parameter naming the API action to perform.
const PARAM_ACTION: &str = "action";
/// Parameter naming the requested result format.
const PARAM_FORMAT: &str = "format";
/// Parameter asserting server-side that we are still logged in.
const ASSERT_PARAMETER: &str = "assert";

/// HTTP request method accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// How the connection authenticates against the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    /// Anonymous connection; writes will be rejected.
    #[default]
    #[serde(rename = "none")]
    None,
    /// Bot-password style login via the two-step `action=login` flow.
    #[serde(rename = "password")]
    Password { username: String, password: String },
    /// Pre-issued OAuth access token, sent as a bearer Authorization
    /// header on every request.
    #[serde(rename = "oauth")]
    OAuth {
        #[serde(rename = "accessToken")]
        access_token: String,
    },
}

/// A named file attachment for a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Filename exposed to the server.
    pub remote_name: String,
    /// Local file to read the content from.
    pub path: PathBuf,
}

impl FileUpload {
    pub fn new(remote_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            remote_name: remote_name.into(),
            path: path.into(),
        }
    }
}

/// A connection to the web API of one Wikibase site.
///
/// Not designed for concurrent mutation: token updates, configuration
/// changes and login/logout are serialized per instance.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiConnection {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "loggedIn", default)]
    logged_in: bool,
    #[serde(default)]
    username: String,
    #[serde(default)]
    tokens: TokenCache,
    /// Maximum time to wait when establishing a connection, in
    /// milliseconds. Negative means no timeout.
    #[serde(rename = "connectTimeoutMs", default = "unset_timeout")]
    connect_timeout_ms: i64,
    /// Maximum time to wait for the server response, in milliseconds.
    /// Negative means no timeout.
    #[serde(rename = "readTimeoutMs", default = "unset_timeout")]
    read_timeout_ms: i64,
    #[serde(rename = "userAgent", default = "default_user_agent")]
    user_agent: String,
    #[serde(default)]
    credentials: Credentials,
    /// Lazily built; dropped on any configuration change so the next
    /// request rebuilds it with the new settings.
    #[serde(skip)]
    client: Option<Client>,
}

fn unset_timeout() -> i64 {
    -1
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl ApiConnection {
    /// Creates an anonymous connection to the API at the given base URL,
    /// e.g. [`WIKIDATA_API_URL`].
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConnectionError> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|e| ConnectionError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            logged_in: false,
            username: String::new(),
            tokens: TokenCache::new(),
            connect_timeout_ms: -1,
            read_timeout_ms: -1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credentials: Credentials::None,
            client: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this connection considers itself logged in. This reflects
    /// local state only; use [`ApiConnection::check_credentials`] to ask
    /// the server.
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// The name of the logged-in user, or the empty string.
    pub fn current_user(&self) -> &str {
        &self.username
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn connect_timeout_ms(&self) -> i64 {
        self.connect_timeout_ms
    }

    pub fn read_timeout_ms(&self) -> i64 {
        self.read_timeout_ms
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Sets the connect timeout in milliseconds; negative unsets it.
    pub fn set_connect_timeout_ms(&mut self, timeout_ms: i64) {
        self.connect_timeout_ms = timeout_ms;
        self.client = None;
    }

    /// Sets the response timeout in milliseconds; negative unsets it.
    pub fn set_read_timeout_ms(&mut self, timeout_ms: i64) {
        self.read_timeout_ms = timeout_ms;
        self.client = None;
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
        self.client = None;
    }

    /// Logs in with the configured credentials.
    ///
    /// On success the username is populated and all previously cached
    /// tokens are invalidated, since tokens are session-scoped.
    pub fn login(&mut self) -> Result<(), ConnectionError> {
        match self.credentials.clone() {
            Credentials::None => Err(ConnectionError::Auth(
                "no credentials configured on this connection".to_string(),
            )),
            Credentials::Password { username, password } => {
                self.login_with_password(&username, &password)
            }
            Credentials::OAuth { .. } => self.login_with_access_token(),
        }
    }

    fn login_with_password(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(), ConnectionError> {
        let login_token = self.get_or_fetch_token(TOKEN_LOGIN)?;

        let params = params_from(&[
            (PARAM_ACTION, "login"),
            ("lgname", username),
            ("lgpassword", password),
            ("lgtoken", &login_token),
        ]);
        let root = self.send_json_request(HttpMethod::Post, params)?;

        let result = root
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("");
        if result == "Success" {
            let confirmed = root
                .pointer("/login/lgusername")
                .and_then(Value::as_str)
                .unwrap_or(username);
            self.logged_in = true;
            self.username = confirmed.to_string();
            // the login token is spent and any csrf token belongs to the
            // previous (anonymous) session
            self.tokens.clear_all();
            debug!("logged in as {}", self.username);
            Ok(())
        } else {
            let reason = root
                .pointer("/login/reason")
                .and_then(Value::as_str)
                .unwrap_or(result);
            Err(ConnectionError::Auth(format!(
                "login for '{username}' failed: {reason}"
            )))
        }
    }

    fn login_with_access_token(&mut self) -> Result<(), ConnectionError> {
        // The token is pre-issued; confirm it is accepted and learn the
        // username from the server.
        let params = params_from(&[(PARAM_ACTION, "query"), ("meta", "userinfo")]);
        let root = self.send_json_request(HttpMethod::Post, params)?;

        if root.pointer("/query/userinfo/anon").is_some() {
            return Err(ConnectionError::Auth(
                "access token was not accepted by the server".to_string(),
            ));
        }
        let name = root
            .pointer("/query/userinfo/name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ConnectionError::UnexpectedResponse(
                    "userinfo response did not contain a user name".to_string(),
                )
            })?;
        self.logged_in = true;
        self.username = name.to_string();
        self.tokens.clear_all();
        debug!("logged in as {}", self.username);
        Ok(())
    }

    /// Logs the current user out.
    ///
    /// Idempotent, and never fails destructively: the local session state
    /// (login flag, username, tokens, cookies) is always reset, even when
    /// the server-side logout request cannot be sent.
    pub fn logout(&mut self) {
        let result = if self.logged_in {
            self.send_logout_request()
        } else {
            Ok(())
        };
        self.logged_in = false;
        self.username.clear();
        self.tokens.clear_all();
        // dropping the client discards the cookie jar
        self.client = None;
        if let Err(e) = result {
            warn!("server-side logout failed, local state reset anyway: {e}");
        }
    }

    fn send_logout_request(&mut self) -> Result<(), ConnectionError> {
        let token = self.get_or_fetch_token(TOKEN_CSRF)?;
        let params = params_from(&[(PARAM_ACTION, "logout"), ("token", &token)]);
        self.send_json_request(HttpMethod::Post, params)?;
        Ok(())
    }

    /// Asks the server whether the current credentials are still valid,
    /// without changing local state.
    ///
    /// Fails with [`crate::MediaWikiError::AssertUserFailed`] when the
    /// remote session has silently expired.
    pub fn check_credentials(&mut self) -> Result<(), ConnectionError> {
        let params = params_from(&[(PARAM_ACTION, "query")]);
        self.send_json_request(HttpMethod::Post, params)?;
        Ok(())
    }

    /// Returns the cached token of the given type, fetching it from the
    /// server on a cache miss.
    ///
    /// Staleness is not detected here. A caller that receives a
    /// token-related API error should call
    /// [`ApiConnection::clear_token`] and retry once; the retry decision
    /// is the caller's, never this layer's.
    pub fn get_or_fetch_token(&mut self, token_type: &str) -> Result<String, ConnectionError> {
        if let Some(token) = self.tokens.get(token_type) {
            return Ok(token.to_string());
        }
        let value = self.fetch_token(token_type)?;
        self.tokens.insert(token_type, value.clone());
        Ok(value)
    }

    /// Removes the cached token of the given type.
    pub fn clear_token(&mut self, token_type: &str) {
        self.tokens.clear(token_type);
    }

    fn fetch_token(&mut self, token_type: &str) -> Result<String, ConnectionError> {
        let params = params_from(&[
            (PARAM_ACTION, "query"),
            ("meta", "tokens"),
            ("type", token_type),
        ]);
        let root = self.send_json_request(HttpMethod::Post, params)?;

        let field = format!("{token_type}token");
        root.pointer(&format!("/query/tokens/{field}"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                error!("token response did not contain '{field}'");
                ConnectionError::UnexpectedResponse(format!(
                    "token response did not contain '{field}'"
                ))
            })
    }

    /// Sends a request and returns the parsed response envelope.
    ///
    /// Forces `format=json`, and `assert=user` when logged in so a
    /// silently dropped session is detected server-side. A non-2xx status
    /// or malformed body is an error; an `error` node in the envelope is
    /// classified and returned as a typed error; a `warnings` node is
    /// logged, never raised.
    ///
    /// Parameter keys are unique by construction of the map; values that
    /// are pipe-separated lists are built with [`implode_objects`].
    pub fn send_json_request(
        &mut self,
        method: HttpMethod,
        parameters: BTreeMap<String, String>,
    ) -> Result<Value, ConnectionError> {
        let parameters = self.prepare_parameters(parameters);
        let client = self.http_client()?;
        let request = match method {
            HttpMethod::Get => client.get(&self.base_url).query(&parameters),
            HttpMethod::Post => client.post(&self.base_url).form(&parameters),
        };
        let response = self.authorize(request).send()?;
        self.parse_envelope(response)
    }

    /// Like [`ApiConnection::send_json_request`], but attaches files and
    /// sends a multipart POST. Each attachment is keyed by its form field
    /// name.
    pub fn send_json_request_with_files(
        &mut self,
        parameters: BTreeMap<String, String>,
        files: &HashMap<String, FileUpload>,
    ) -> Result<Value, ConnectionError> {
        let parameters = self.prepare_parameters(parameters);
        let client = self.http_client()?;

        let mut form = Form::new();
        for (key, value) in &parameters {
            form = form.text(key.clone(), value.clone());
        }
        for (field, upload) in files {
            let part = Part::file(&upload.path)?.file_name(upload.remote_name.clone());
            form = form.part(field.clone(), part);
        }

        let request = client.post(&self.base_url).multipart(form);
        let response = self.authorize(request).send()?;
        self.parse_envelope(response)
    }

    fn prepare_parameters(
        &self,
        mut parameters: BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        parameters.insert(PARAM_FORMAT.to_string(), "json".to_string());
        if self.logged_in {
            parameters.insert(ASSERT_PARAMETER.to_string(), "user".to_string());
        }
        parameters
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::OAuth { access_token } => request.bearer_auth(access_token),
            _ => request,
        }
    }

    fn parse_envelope(&self, response: Response) -> Result<Value, ConnectionError> {
        let status = response.status();
        if !status.is_success() {
            let headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect();
            error!(
                "HTTP request failed. status: {}, headers: {:?}",
                status.as_u16(),
                headers
            );
            return Err(ConnectionError::Status {
                status: status.as_u16(),
                headers,
            });
        }

        // fully buffered so the raw body is available on parse failure
        let body = response.text()?;
        let root: Value = match serde_json::from_str(&body) {
            Ok(root) => root,
            Err(source) => {
                error!(
                    "JSON parse failed. status: {}, body: {:?}",
                    status.as_u16(),
                    body
                );
                return Err(ConnectionError::Parse { source, body });
            }
        };

        if let Some(error_node) = root.get("error") {
            return Err(classify_error(error_node).into());
        }
        log_warnings(&root);
        Ok(root)
    }

    fn http_client(&mut self) -> Result<Client, ConnectionError> {
        match self.client.clone() {
            Some(client) => Ok(client),
            None => {
                let client = self.build_client()?;
                self.client = Some(client.clone());
                Ok(client)
            }
        }
    }

    fn build_client(&self) -> Result<Client, ConnectionError> {
        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .cookie_store(true)
            .gzip(true)
            .timeout(None::<Duration>);
        if self.connect_timeout_ms >= 0 {
            builder = builder.connect_timeout(Duration::from_millis(self.connect_timeout_ms as u64));
        }
        if self.read_timeout_ms >= 0 {
            builder = builder.timeout(Duration::from_millis(self.read_timeout_ms as u64));
        }
        Ok(builder.build()?)
    }
}

/// Builds the parameter map for one request from literal pairs.
pub(crate) fn params_from(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Extracts the warning strings from a parsed response envelope.
///
/// Each module key under `warnings` contributes its inner string values
/// as one warning each; inner lists expand to one warning per element,
/// preferring the element's `html.*` text over its raw form; anything
/// else yields a catch-all warning naming the module. Module and element
/// order is preserved.
pub fn extract_warnings(root: &Value) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(Value::Object(modules)) = root.get("warnings") else {
        return warnings;
    };

    for (module, module_node) in modules {
        let outputs: Vec<&Value> = match module_node {
            Value::Object(map) => map.values().collect(),
            Value::Array(entries) => entries.iter().collect(),
            _ => Vec::new(),
        };
        for output in outputs {
            match output {
                Value::String(text) => warnings.push(format!("[{module}]: {text}")),
                Value::Array(entries) => {
                    for entry in entries {
                        let text = entry
                            .pointer("/html/*")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| entry.to_string());
                        warnings.push(format!("[{module}]: {text}"));
                    }
                }
                other => warnings.push(format!(
                    "[{module}]: warning was not understood, JSON source: {other}"
                )),
            }
        }
    }

    warnings
}

fn log_warnings(root: &Value) {
    for warning in extract_warnings(root) {
        warn!("API warning {warning}");
    }
}

/// Joins the items with `|`, for pipe-separated parameter values such as
/// id lists. No escaping is performed; items must not contain `|`.
pub fn implode_objects<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: ToString,
{
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

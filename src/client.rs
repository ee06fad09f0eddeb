//! The AFLUX request client.
//!
//! [`AfluxClient`] owns one blocking HTTP session for its whole lifetime
//! and issues every operation as a single synchronous GET. Retries, when
//! configured, are handled transparently inside the client; callers only
//! ever see the final outcome. Dropping the client releases the session.

use reqwest::blocking::{Client, Response};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::constants::{AFLOW_API, AFLOW_DEFAULT_PAGING, AFLOW_SERVER, HTTP_PROTOCOLS};
use crate::entry::{self, AfluxResponse, Entry};
use crate::error::AfluxError;
use crate::query::is_query_valid;
use crate::retry::{RetryDecision, RetryPolicy};

/// Path of the relaxed structure file under an entry's direct URL.
const CONTCAR_PATH: &str = "/CONTCAR.relax";

/// Client for the AFLOW AFLUX API.
///
/// The client is synchronous: every call blocks until the server answers
/// or the configured retry budget runs out. One client holds one pooled
/// HTTP session; the session is released when the client is dropped, on
/// every exit path. A dropped client cannot be released twice, so teardown
/// is idempotent by construction.
///
/// # Example
///
/// ```no_run
/// use aflux::AfluxClient;
///
/// # fn example() -> Result<(), aflux::AfluxError> {
/// let client = AfluxClient::new(Some(3))?;
/// let hits = client.request("nspecies(2),Egap(1.0*,5.0) ", None, Some(64), false)?;
/// println!("{hits}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AfluxClient {
    http: Client,
    retry: Option<RetryPolicy>,
    base_url: String,
}

/// Help payload for one keyword, as served by `help(<keyword>)`.
#[derive(Debug, Deserialize)]
struct KeywordHelp {
    description: String,
    units: String,
    status: String,
    #[serde(rename = "__comment__")]
    comment: Vec<String>,
}

impl AfluxClient {
    /// Creates a client against the production AFLOW server.
    ///
    /// `max_retries` bounds the automatic retries per request; `None`
    /// disables them entirely, so the first failure surfaces.
    ///
    /// # Errors
    ///
    /// Returns [`AfluxError::Session`] if the HTTP session cannot be built.
    pub fn new(max_retries: Option<u32>) -> Result<Self, AfluxError> {
        Self::with_base_url(max_retries, format!("{AFLOW_SERVER}{AFLOW_API}"))
    }

    /// Creates a client with a custom base URL (for testing against a
    /// local mock server).
    ///
    /// # Errors
    ///
    /// Returns [`AfluxError::Session`] if the HTTP session cannot be built.
    pub fn with_base_url(
        max_retries: Option<u32>,
        base_url: impl Into<String>,
    ) -> Result<Self, AfluxError> {
        Self::with_retry_policy(max_retries.map(RetryPolicy::with_max_retries), base_url)
    }

    /// Creates a client with full control over the retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`AfluxError::Session`] if the HTTP session cannot be built.
    pub fn with_retry_policy(
        retry: Option<RetryPolicy>,
        base_url: impl Into<String>,
    ) -> Result<Self, AfluxError> {
        // No request timeout: a hung request blocks until the transport
        // itself gives up, matching the session's documented contract.
        let http = Client::builder()
            .timeout(None)
            .build()
            .map_err(|source| AfluxError::Session { source })?;

        Ok(Self {
            http,
            retry,
            base_url: base_url.into(),
        })
    }

    /// The server origin plus API path every matchbook is appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a matchbook query to the AFLUX API and returns the parsed
    /// JSON response.
    ///
    /// # Arguments
    ///
    /// * `matchbook` - The query to run. See <https://aflow.org/documentation/>.
    /// * `paging` - Page number; defaults to page 0, which returns all
    ///   pages at once.
    /// * `chunk_size` - Entries per page. Worth tuning down when the
    ///   server answers HTTP 500 on large result sets.
    /// * `no_directives` - Use the matchbook verbatim, without the paging
    ///   and format directives.
    ///
    /// # Errors
    ///
    /// [`AfluxError::InvalidArgument`] for an out-of-range `paging` or
    /// `chunk_size` or a matchbook that fails validation (no network call
    /// is made); [`AfluxError::HttpStatus`]/[`AfluxError::Network`] when
    /// the request fails after any configured retries;
    /// [`AfluxError::Decode`] when the body is not JSON.
    #[instrument(skip(self), fields(matchbook = %matchbook))]
    pub fn request(
        &self,
        matchbook: &str,
        paging: Option<i64>,
        chunk_size: Option<i64>,
        no_directives: bool,
    ) -> Result<AfluxResponse, AfluxError> {
        if chunk_size.is_some_and(|c| c < 1) {
            return Err(AfluxError::invalid_argument(
                "chunk_size must be greater than 0",
            ));
        }

        if paging.is_some_and(|p| p < 0) {
            return Err(AfluxError::invalid_argument(
                "paging must be greater than or equal to 0",
            ));
        }

        if !is_query_valid(matchbook) {
            return Err(AfluxError::invalid_argument(
                "invalid query: contains invalid characters or keywords",
            ));
        }

        let url = self.query_url(matchbook, paging, chunk_size, no_directives);
        self.request_json(&url)
    }

    /// Prints help information for the AFLOW API.
    ///
    /// With no keyword, prints the server's general help text. With a
    /// keyword, prints the description/units/status block for it; when the
    /// server has nothing for the keyword, a short notice is printed and
    /// the call still succeeds.
    ///
    /// # Errors
    ///
    /// [`AfluxError::InvalidArgument`] when the keyword fails matchbook
    /// validation; [`AfluxError::Decode`] when a response has an
    /// unexpected shape; transport failures from the general-help request.
    #[instrument(skip(self))]
    pub fn help(&self, keyword: Option<&str>) -> Result<(), AfluxError> {
        let Some(keyword) = keyword else {
            // General help: https://aflow.org/API/aflux/? — the empty
            // matchbook can never pass validation, so the GET goes out
            // directly.
            let url = self.query_url("", None, None, true);
            let help_data = self.request_json(&url)?;
            println!("{}", join_help_lines(&help_data, &url)?);
            return Ok(());
        };

        if !is_query_valid(keyword) {
            return Err(AfluxError::invalid_argument(
                "invalid query: contains invalid keywords",
            ));
        }

        // Keyword help: https://aflow.org/API/aflux/?help(<keyword>)
        let matchbook = format!("help({keyword})");
        let help_data = match self.request(&matchbook, None, None, true) {
            Ok(data) => data,
            Err(AfluxError::HttpStatus { .. } | AfluxError::Decode { .. }) => {
                // Deliberately lossy: an unknown keyword is not an error
                // worth surfacing from a help lookup.
                println!("No help information found for keyword: {keyword}");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let context_url = format!("{}{matchbook}", self.base_url);
        let payload = help_data
            .get(keyword)
            .cloned()
            .ok_or_else(|| AfluxError::decode(&context_url, "response is not keyed by keyword"))?;
        let help: KeywordHelp = serde_json::from_value(payload)
            .map_err(|e| AfluxError::decode(&context_url, e.to_string()))?;

        println!("{}", format_keyword_help(keyword, &help));
        Ok(())
    }

    /// Fetches the relaxed CONTCAR structure file for an entry.
    ///
    /// Entries in the legacy VASP4 format come back without a species-name
    /// line; it is synthesized from the entry's `species` array so the
    /// returned text is always readable by modern tools.
    ///
    /// # Errors
    ///
    /// [`AfluxError::InvalidArgument`] when the entry lacks `aurl` (no
    /// network call is made) or a needed `species` array; transport errors
    /// from the fetch itself.
    #[instrument(skip_all)]
    pub fn get_contcar(&self, entry: &Entry) -> Result<String, AfluxError> {
        let aurl = entry::entry_aurl(entry)?;
        let url = entry::direct_url(aurl, CONTCAR_PATH);

        debug!(url = %url, "fetching CONTCAR");
        let body = self.fetch_text(&url)?;
        entry::patch_species_line(&body, entry)
    }

    /// Fetches an arbitrary property string for an entry and splits it
    /// into its value strings.
    ///
    /// # Errors
    ///
    /// [`AfluxError::InvalidArgument`] when the entry lacks `aurl` (no
    /// network call is made); transport errors from the fetch itself.
    #[instrument(skip(self, entry), fields(property = %property))]
    pub fn get_property(&self, entry: &Entry, property: &str) -> Result<Vec<String>, AfluxError> {
        let aurl = entry::entry_aurl(entry)?;
        let url = entry::direct_url(aurl, &format!("/?{property}"));

        debug!(url = %url, "fetching property");
        let body = self.fetch_text(&url)?;
        Ok(entry::split_property(&body))
    }

    /// Builds the full query URL for a matchbook.
    fn query_url(
        &self,
        matchbook: &str,
        paging: Option<i64>,
        chunk_size: Option<i64>,
        no_directives: bool,
    ) -> String {
        if no_directives {
            return format!("{}{matchbook}", self.base_url);
        }

        let paging = paging.unwrap_or(AFLOW_DEFAULT_PAGING);
        let paging_directive = match chunk_size {
            Some(chunk) => format!("$paging({paging},{chunk})"),
            None => format!("$paging({paging})"),
        };

        format!("{}{matchbook}{paging_directive}format(json)", self.base_url)
    }

    /// Issues a GET and parses the body as JSON.
    fn request_json(&self, url: &str) -> Result<AfluxResponse, AfluxError> {
        let response = self.execute_get(url)?;
        response
            .json::<AfluxResponse>()
            .map_err(|e| AfluxError::decode(url, e.to_string()))
    }

    /// Issues a GET and returns the body as text.
    fn fetch_text(&self, url: &str) -> Result<String, AfluxError> {
        let response = self.execute_get(url)?;
        response
            .text()
            .map_err(|e| AfluxError::network(url, e))
    }

    /// Issues a GET, retrying per the configured policy.
    ///
    /// Retries only engage when a policy is configured and the URL scheme
    /// is in the allowed protocol set; the policy decides per failure and
    /// the loop sleeps between attempts. Any non-success status becomes an
    /// [`AfluxError::HttpStatus`] carrying the Retry-After header.
    #[instrument(skip(self), fields(url = %url))]
    fn execute_get(&self, url: &str) -> Result<Response, AfluxError> {
        let policy = self.retry.as_ref().filter(|_| scheme_allows_retry(url));
        let mut attempt: u32 = 1;

        loop {
            let error = match self.http.get(url).send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(std::string::ToString::to_string);
                    AfluxError::http_status_with_retry_after(url, status, retry_after)
                }
                Err(e) if e.is_timeout() => AfluxError::timeout(url),
                Err(e) => AfluxError::network(url, e),
            };

            let decision = match policy {
                Some(policy) => policy.should_retry(&error, attempt),
                None => RetryDecision::DoNotRetry {
                    reason: "automatic retries disabled".to_string(),
                },
            };

            match decision {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        attempt = next_attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying AFLUX request"
                    );
                    std::thread::sleep(delay);
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, error = %error, "request failed");
                    return Err(error);
                }
            }
        }
    }
}

/// Returns true when the URL uses a scheme the retry adapter is mounted
/// for.
fn scheme_allows_retry(url: &str) -> bool {
    Url::parse(url)
        .map(|u| HTTP_PROTOCOLS.contains(&u.scheme()))
        .unwrap_or(false)
}

/// Renders a general-help response (an array of lines) as one block.
fn join_help_lines(help_data: &AfluxResponse, url: &str) -> Result<String, AfluxError> {
    let lines = help_data
        .as_array()
        .ok_or_else(|| AfluxError::decode(url, "expected a JSON array of help lines"))?;

    let lines: Vec<&str> = lines
        .iter()
        .map(|line| {
            line.as_str()
                .ok_or_else(|| AfluxError::decode(url, "help line is not a string"))
        })
        .collect::<Result<_, _>>()?;

    Ok(lines.join("\n"))
}

/// Renders the help block for one keyword.
fn format_keyword_help(keyword: &str, help: &KeywordHelp) -> String {
    let mut block = format!(
        "{keyword}:\n  description: {}\n  units: {}\n  status: {}",
        help.description, help.units, help.status
    );

    let comment = help.comment.join("\n    ");
    let comment = comment.trim();
    if !comment.is_empty() {
        block.push_str(&format!("\n  comment:\n    {comment}"));
    }

    block
}

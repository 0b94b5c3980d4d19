// Wire protocol client for the remote seat service
//
// Reproduces the mobile client's traffic shape: fixed fingerprint headers,
// the session credential riding as the Cookie header, and the three
// endpoints (session refresh, server time, signed check-in).

pub mod beacon;
pub mod crypto;

use rand::Rng;
use reqwest::header;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rsa::RsaPublicKey;
use serde_json::Value;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::credential::{SessionCredential, SESSION_FIELD};
use crate::errors::ProtocolError;
use crate::models::{CheckinOutcome, RefreshOutcome};

use beacon::BeaconReading;

pub const BASE_URL: &str = "https://wechat.v2.traceint.com/index.php";
pub const DEVICES_PATH: &str = "/wxApp/devices.html";
pub const SIGN_PATH: &str = "/wxApp/sign.html";
pub const GET_TIME_PATH: &str = "/wxApp/getTime.html";

/// RSA public key published by the remote service, base64-encoded SPKI DER.
pub const PUBLIC_KEY_B64: &str = "MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA0dmmkW4xPa+HhBTyaa0dgAb0fVZRS67jK4y15BQthjJ/ZuUZQmrbGqhG7rwnxfm7g+nFH9zEyRU5KLX3ty9jpNrPjyg7FBF9OvBDYHEt83b77W3mfBjpmoTJOt27E7RZ4InHqJQjqSEo4bw1PDz2OBmtlNIlXMu0VA8I0Bh39hBBnm0oouRV7FdqEzAp8nsF7a3VuBYpx9xek+cRVip0pMXI1AXM6bmyWWNzV0oikQW4ZIbutgDziTMeW28zl/hRbW9Ht34w0sWYyxumuLr1qweW3qnxycn3zn47weFYe6nJp71z+lgVtNTGtowNPPqBLXqusvwf+uNhSy1wKQFpUwIDAQAB";

const MINIPROGRAM_REFERER: &str = "https://servicewechat.com/wx3b9352e6b254ed2b/25/page-frame.html";
const WEB_ORIGIN: &str = "https://web.traceint.com";
const APP_VERSION: &str = "2.2.5";
const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_7 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 MicroMessenger/8.0.67(0x18004239) NetType/WIFI Language/zh_CN";

const KEEPALIVE_SUCCESS_MESSAGE: &str = "Session renewed successfully";

// Success wording remap: the remote's scan wording and the verified wording
// both mean the seat is confirmed; the more specific one is surfaced.
const MSG_SCAN_OK: &str = "扫码成功";
const MSG_VERIFIED: &str = "到馆验证成功";

/// Stateful client for one account's session.
///
/// Holds the evolving credential for the duration of one exchange and
/// merges server-driven cookie rotation into it; callers read the rotated
/// credential out of the returned outcome and persist it.
pub struct ProtocolClient {
    http: Client,
    base_url: String,
    public_key: RsaPublicKey,
    credential: SessionCredential,
}

impl ProtocolClient {
    pub fn new(remote: &RemoteConfig, credential: SessionCredential) -> Result<Self, ProtocolError> {
        let public_key = crypto::parse_public_key(&remote.public_key)?;
        // The imitated client speaks HTTP/1.1 only
        let http = Client::builder()
            .timeout(Duration::from_secs(remote.timeout_seconds))
            .http1_only()
            .build()
            .map_err(|e| ProtocolError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: remote.base_url.trim_end_matches('/').to_string(),
            public_key,
            credential,
        })
    }

    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    /// Renews the session by replaying the device-list poll the mobile
    /// client performs while idle.
    ///
    /// No network call happens when the credential lacks its session
    /// sub-field. Cookie rotation is merged as soon as the response
    /// arrives, before the body is even parsed, so a garbled body or a
    /// remote error code cannot lose an already-rotated credential.
    pub async fn refresh_session(&mut self) -> RefreshOutcome {
        let Some(session_id) = self.credential.session_id().map(str::to_string) else {
            return RefreshOutcome::failure(ProtocolError::CredentialMissing.to_string(), None);
        };

        self.humanized_delay().await;

        let url = format!("{}{}", self.base_url, DEVICES_PATH);
        let response = match self
            .request(Method::POST, &url)
            .form(&[("t", session_id.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return RefreshOutcome::failure(ProtocolError::Transport(e.to_string()).to_string(), None)
            }
        };

        if let Err(e) = response.error_for_status_ref() {
            return RefreshOutcome::failure(ProtocolError::Transport(e.to_string()).to_string(), None);
        }

        let status = response.status();
        let rotated = self.absorb_set_cookies(&response);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return RefreshOutcome::failure(
                    ProtocolError::Transport(e.to_string()).to_string(),
                    rotated,
                )
            }
        };

        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(parse_err) => {
                let degraded = ProtocolError::UnparseableResponse {
                    status: status.as_u16(),
                    body,
                };
                tracing::warn!(error = %degraded, "keep-alive response was not JSON");
                return RefreshOutcome::failure(format!("Request failed: {}", parse_err), rotated);
            }
        };

        if payload.get("code").and_then(Value::as_i64) == Some(0) {
            tracing::info!("keep-alive success");
            RefreshOutcome::success(KEEPALIVE_SUCCESS_MESSAGE, rotated)
        } else {
            tracing::warn!(%payload, "keep-alive rejected by remote");
            let err = ProtocolError::Remote {
                code: code_label(payload.get("code")),
                payload: payload.to_string(),
            };
            RefreshOutcome::failure(err.to_string(), rotated)
        }
    }

    /// Performs the signed check-in: fetch server time, encrypt it with
    /// the service's public key, submit it alongside a simulated beacon
    /// reading. Every failure collapses into a `CheckinOutcome`.
    pub async fn sign_in(&mut self, major: i32, minor: i32) -> CheckinOutcome {
        match self.sign_in_inner(major, minor).await {
            Ok(outcome) => outcome,
            Err(ProtocolError::CredentialMissing) => {
                CheckinOutcome::failure(ProtocolError::CredentialMissing.to_string())
            }
            Err(ProtocolError::Transport(reason)) | Err(ProtocolError::Crypto(reason)) => {
                tracing::error!(error = %reason, "check-in exception");
                CheckinOutcome::failure(format!("签到异常: {}", reason))
            }
            Err(other) => {
                tracing::error!(error = %other, "check-in exception");
                CheckinOutcome::failure(format!("签到异常: {}", other))
            }
        }
    }

    async fn sign_in_inner(&mut self, major: i32, minor: i32) -> Result<CheckinOutcome, ProtocolError> {
        // Step 1: server time, plain text body
        let time_url = format!("{}{}", self.base_url, GET_TIME_PATH);
        let time_response = self
            .request(Method::GET, &time_url)
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        let server_time = time_response
            .text()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        // Step 2: encrypt it for the freshness proof
        let pass = crypto::encrypt(&self.public_key, server_time.as_bytes())?;

        // Step 3: session sub-field plus the beacon payload
        let session_id = self
            .credential
            .session_id()
            .ok_or(ProtocolError::CredentialMissing)?
            .to_string();
        let readings = [BeaconReading::simulated(major, minor)];
        let devices = serde_json::to_string(&readings)
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        // Step 4: submit; the remote signals failure through the payload,
        // not through HTTP status, so no status check here
        let sign_url = format!("{}{}", self.base_url, SIGN_PATH);
        let response = self
            .request(Method::POST, &sign_url)
            .form(&[
                ("t", session_id.as_str()),
                ("devices", devices.as_str()),
                ("pass", pass.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        // Step 5: classify
        Ok(classify_checkin(status, body))
    }

    /// Shared fingerprint headers. Host and Accept-Encoding are left to
    /// the HTTP stack; everything else mirrors the imitated client.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::CONNECTION, "keep-alive")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "*/*")
            .header("App-Version", APP_VERSION)
            .header("Sec-Fetch-Site", "same-site")
            .header("Priority", "u=3, i")
            .header(header::ACCEPT_LANGUAGE, "zh-CN,zh-Hans;q=0.9")
            .header("Sec-Fetch-Mode", "cors")
            .header(header::ORIGIN, WEB_ORIGIN)
            .header(header::REFERER, MINIPROGRAM_REFERER)
            .header("Sec-Fetch-Dest", "empty")
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, self.credential.to_string())
    }

    /// Randomized 0.5 to 1.5 second pause to imitate human-timed
    /// interaction before calling out.
    async fn humanized_delay(&self) {
        let millis = rand::thread_rng().gen_range(500..=1500);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Merges the cookie pair of every `Set-Cookie` header into the held
    /// credential. Returns the merged credential only when it actually
    /// changed; attribute segments (Path, Expires, ...) are discarded.
    fn absorb_set_cookies(&mut self, response: &reqwest::Response) -> Option<SessionCredential> {
        let mut update = SessionCredential::new();
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            if let Some((name, cookie_value)) = pair.split_once('=') {
                update.set(name.trim(), cookie_value.trim());
            }
        }
        if update.is_empty() {
            return None;
        }

        let before = self.credential.clone();
        self.credential.merge(&update);
        if self.credential == before {
            return None;
        }

        if let Some(rotated_id) = update.session_id() {
            let preview: String = rotated_id.chars().take(10).collect();
            tracing::info!("{} updated: {}...", SESSION_FIELD, preview);
        }
        Some(self.credential.clone())
    }
}

/// Classifies a check-in response. Non-JSON bodies degrade to a synthetic
/// payload carrying the raw text and HTTP status, so an HTML error page
/// surfaces as a failure message instead of a fault.
fn classify_checkin(status: StatusCode, body: String) -> CheckinOutcome {
    let payload = match serde_json::from_str::<Value>(&body) {
        Ok(payload) => payload,
        Err(_) => {
            let degraded = ProtocolError::UnparseableResponse {
                status: status.as_u16(),
                body,
            };
            tracing::debug!(error = %degraded, "check-in response degraded to synthetic payload");
            match degraded {
                ProtocolError::UnparseableResponse { status, body } => {
                    serde_json::json!({ "msg": body, "code": status })
                }
                _ => Value::Null,
            }
        }
    };

    let code = payload.get("code").cloned();
    let message = truthy_message(payload.get("msg"))
        .or_else(|| truthy_message(payload.get("message")))
        .unwrap_or_else(|| payload.to_string());

    if code_means_success(code.as_ref()) {
        let message = if message == MSG_SCAN_OK {
            MSG_VERIFIED.to_string()
        } else {
            message
        };
        CheckinOutcome::success(format!("签到成功：{}", message))
    } else {
        CheckinOutcome::failure(format!("签到失败 ({}): {}", code_label(code.as_ref()), message))
    }
}

/// Code `"0"` or `"200"`, as string or integer, means success. Anything
/// else, including an absent code, is a failure.
fn code_means_success(code: Option<&Value>) -> bool {
    match code {
        Some(Value::Number(n)) => matches!(n.as_i64(), Some(0) | Some(200)),
        Some(Value::String(s)) => s == "0" || s == "200",
        _ => false,
    }
}

fn code_label(code: Option<&Value>) -> String {
    match code {
        None => Value::Null.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Message extraction with the remote's loose conventions: empty strings,
/// zero, null, and empty containers all count as "no message there".
fn truthy_message(value: Option<&Value>) -> Option<String> {
    let value = value?;
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(value.to_string()),
        Value::Number(n) => (n.as_f64() != Some(0.0)).then(|| n.to_string()),
        Value::String(s) => (!s.is_empty()).then(|| s.clone()),
        Value::Array(items) => (!items.is_empty()).then(|| value.to_string()),
        Value::Object(map) => (!map.is_empty()).then(|| value.to_string()),
    }
}

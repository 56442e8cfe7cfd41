//! [`RemoteBundleSource`]: poll (or long-poll) a remote endpoint for bundles,
//! one independent fetch loop per `pdpId` (spec §4.4.3, §6.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::local_bundle::load_bundle;
use crate::configuration::VoterSource;
use crate::security::BundleSecurityPolicy;

/// How a fetch loop schedules its next request after a `304` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Wait `pollInterval` (or the per-`pdpId` override) before retrying.
    Polling,
    /// Reconnect immediately.
    LongPoll,
}

/// Configuration for a [`RemoteBundleSource`] (spec §4.4.3).
pub struct RemoteBundleConfig {
    /// The remote endpoint's base URL; `GET {baseUrl}/{pdpId}` is issued
    /// per fetch.
    pub base_url: String,
    /// The PDPs to fetch bundles for; each gets an independent fetch loop.
    pub pdp_ids: Vec<String>,
    /// Polling vs. long-poll scheduling after a `304`.
    pub fetch_mode: FetchMode,
    /// Default interval between polls.
    pub poll_interval: Duration,
    /// Bound on any single HTTP call.
    pub request_timeout: Duration,
    /// An optional auth header name/value pair; both or neither.
    pub auth_header: Option<(String, String)>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// How fetched bundles are authenticated.
    pub security_policy: BundleSecurityPolicy,
    /// Per-`pdpId` poll interval overrides.
    pub per_pdp_poll_interval: HashMap<String, Duration>,
    /// Initial backoff after a transport/4xx/5xx error.
    pub backoff_initial: Duration,
    /// Backoff ceiling.
    pub backoff_max: Duration,
}

/// Runs one fetch loop per configured `pdpId`, publishing new bundles to a
/// [`VoterSource`] and retaining the last-good configuration on failure.
pub struct RemoteBundleSource {
    disposed: Arc<AtomicBool>,
}

impl RemoteBundleSource {
    /// Construct and start all per-`pdpId` fetch loops.
    pub fn start(config: RemoteBundleConfig, sink: Arc<dyn VoterSource>) -> Self {
        let disposed = Arc::new(AtomicBool::new(false));
        let config = Arc::new(config);
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .redirect(if config.follow_redirects { reqwest::redirect::Policy::default() } else { reqwest::redirect::Policy::none() })
            .build()
            .expect("reqwest client configuration is always valid");

        for pdp_id in &config.pdp_ids {
            let pdp_id = pdp_id.clone();
            let config = Arc::clone(&config);
            let sink = Arc::clone(&sink);
            let client = client.clone();
            let disposed = Arc::clone(&disposed);
            std::thread::spawn(move || run_fetch_loop(&client, &config, &pdp_id, sink.as_ref(), &disposed));
        }

        Self { disposed }
    }

    /// Cancel every fetch loop. Idempotent.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

fn run_fetch_loop(
    client: &reqwest::blocking::Client,
    config: &RemoteBundleConfig,
    pdp_id: &str,
    sink: &dyn VoterSource,
    disposed: &AtomicBool,
) {
    let mut etag: Option<String> = None;
    let mut backoff = config.backoff_initial;

    while !disposed.load(Ordering::SeqCst) {
        let url = format!("{}/{}", config.base_url.trim_end_matches('/'), pdp_id);
        let mut request = client.get(&url).header("Accept", "application/octet-stream");
        if let Some(tag) = &etag {
            request = request.header("If-None-Match", tag.as_str());
        }
        if let Some((name, value)) = &config.auth_header {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.send() {
            Ok(response) if response.status().as_u16() == 304 => {
                backoff = config.backoff_initial;
                match config.fetch_mode {
                    FetchMode::Polling => sleep_interruptible(poll_interval(config, pdp_id), disposed),
                    FetchMode::LongPoll => {}
                }
            }
            Ok(response) if response.status().is_success() => {
                let new_etag = response.headers().get(reqwest::header::ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);
                match response.bytes() {
                    Ok(body) => match load_bundle(&body, pdp_id, &config.security_policy, &url) {
                        Ok(config_record) => {
                            sink.load_configuration(config_record, true);
                            etag = new_etag;
                            backoff = config.backoff_initial;
                        }
                        Err(err) => {
                            tracing::warn!(pdp_id, %err, "discarding invalid remote bundle, retaining last-good configuration");
                            sleep_interruptible(backoff, disposed);
                            backoff = (backoff * 2).min(config.backoff_max);
                        }
                    },
                    Err(err) => {
                        tracing::warn!(pdp_id, %err, "failed to read remote bundle body");
                        sleep_interruptible(backoff, disposed);
                        backoff = (backoff * 2).min(config.backoff_max);
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(pdp_id, status = %response.status(), "remote bundle fetch failed, backing off");
                sleep_interruptible(backoff, disposed);
                backoff = (backoff * 2).min(config.backoff_max);
            }
            Err(err) => {
                tracing::warn!(pdp_id, %err, "remote bundle transport error, backing off");
                sleep_interruptible(backoff, disposed);
                backoff = (backoff * 2).min(config.backoff_max);
            }
        }
    }
}

fn poll_interval(config: &RemoteBundleConfig, pdp_id: &str) -> Duration {
    config.per_pdp_poll_interval.get(pdp_id).copied().unwrap_or(config.poll_interval)
}

fn sleep_interruptible(duration: Duration, disposed: &AtomicBool) {
    const STEP: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while remaining > Duration::ZERO && !disposed.load(Ordering::SeqCst) {
        let step = remaining.min(STEP);
        std::thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::configuration::PdpConfiguration;

    struct Captured(Mutex<Vec<PdpConfiguration>>);
    impl VoterSource for Captured {
        fn load_configuration(&self, config: PdpConfiguration, _replace: bool) {
            self.0.lock().unwrap().push(config);
        }
        fn remove_configuration_for_pdp(&self, _pdp_id: &str) {}
    }

    fn unsigned_bundle(document: &str) -> Vec<u8> {
        pdp_bundle::BundleBuilder::new(b"{}".to_vec(), "2026-01-01T00:00:00Z".to_string())
            .with_document("p.sapl", document.as_bytes().to_vec())
            .build()
            .unwrap()
    }

    /// A hand-rolled single-connection-per-request HTTP server serving a
    /// fixed response script by request index, clamping to the last scripted
    /// response once exhausted, for exercising the fetch loop's ETag/304
    /// handling without a full HTTP client-testing dependency.
    fn start_scripted_server(responses: Vec<(u16, Option<&'static str>, Vec<u8>)>) -> (String, Arc<AtomicBool>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = Arc::clone(&shutdown);
        let counter = AtomicUsize::new(0);
        std::thread::spawn(move || {
            loop {
                if shutdown_thread.load(Ordering::SeqCst) {
                    break;
                }
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let mut buf = [0u8; 4096];
                        let _ = stream.read(&mut buf);
                        let idx = counter.fetch_add(1, Ordering::SeqCst).min(responses.len() - 1);
                        let (status, etag, body) = &responses[idx];
                        let status_line = match status {
                            200 => "200 OK",
                            304 => "304 Not Modified",
                            _ => "500 Internal Server Error",
                        };
                        let mut head = format!(
                            "HTTP/1.1 {status_line}\r\nConnection: close\r\nContent-Length: {}\r\n",
                            body.len()
                        );
                        if let Some(tag) = etag {
                            head.push_str(&format!("ETag: \"{tag}\"\r\n"));
                        }
                        head.push_str("\r\n");
                        let _ = stream.write_all(head.as_bytes());
                        let _ = stream.write_all(body);
                        let _ = stream.flush();
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });
        (format!("http://{addr}"), shutdown)
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..300 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition never became true");
    }

    #[test]
    fn fetch_loop_reloads_on_etag_change_and_skips_304() {
        let bundle_v1 = unsigned_bundle("permit");
        let bundle_v2 = unsigned_bundle("deny");
        let mut script = vec![(200u16, Some("v1"), bundle_v1), (304u16, None, Vec::new()), (200u16, Some("v2"), bundle_v2)];
        for _ in 0..20 {
            script.push((304, None, Vec::new()));
        }
        let (base_url, shutdown) = start_scripted_server(script);

        let sink = Arc::new(Captured(Mutex::new(Vec::new())));
        let config = RemoteBundleConfig {
            base_url,
            pdp_ids: vec!["default".to_string()],
            fetch_mode: FetchMode::Polling,
            poll_interval: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
            auth_header: None,
            follow_redirects: false,
            security_policy: BundleSecurityPolicy::Unverified { accept_risk: true },
            per_pdp_poll_interval: HashMap::new(),
            backoff_initial: Duration::from_millis(10),
            backoff_max: Duration::from_millis(50),
        };
        let source = RemoteBundleSource::start(config, Arc::clone(&sink) as Arc<dyn VoterSource>);

        wait_for(|| sink.0.lock().unwrap().len() >= 2);
        std::thread::sleep(Duration::from_millis(200));
        source.dispose();
        shutdown.store(true, Ordering::SeqCst);

        let captured = sink.0.lock().unwrap();
        assert_eq!(captured.len(), 2, "the 304 response must not trigger an extra publish");
        assert_eq!(captured[0].sapl_documents[0].text, "permit");
        assert_eq!(captured[1].sapl_documents[0].text, "deny");
    }
}

//! Resilient fetcher against a real HTTP server, through the reqwest transport

use std::sync::Arc;
use std::time::Duration;

use m3u_guide::config::FetchConfig;
use m3u_guide::fetch::{AffinityStore, FetchOptions, InMemoryAffinityStore, ResilientFetcher};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetch_config(proxies: Vec<String>) -> FetchConfig {
    FetchConfig {
        request_timeout: Duration::from_millis(500),
        max_retries: 0,
        proxies,
        ..FetchConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_direct_request_carries_normalized_headers() {
        let server = MockServer::start().await;
        let config = fetch_config(Vec::new());
        let (origin, user_agent) = (config.origin.clone(), config.user_agent.clone());

        Mock::given(method("GET"))
            .and(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<tv></tv>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ResilientFetcher::new(config);
        let url = format!("{}/list.m3u", server.uri());
        let body = fetcher
            .fetch(
                &url,
                &FetchOptions::accept("application/xml, text/xml, */*"),
                &CancellationToken::new(),
            )
            .await
            .expect("direct fetch should succeed");

        assert_eq!(&body[..], b"<tv></tv>");

        let requests = server.received_requests().await.expect("recording enabled");
        let header = |name: &str| {
            requests[0]
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        assert_eq!(header("origin"), Some(origin));
        assert_eq!(header("user-agent"), Some(user_agent));
        assert_eq!(header("accept").as_deref(), Some("application/xml, text/xml, */*"));
    }

    #[tokio::test]
    async fn test_blocked_direct_request_falls_back_to_proxy() {
        let server = MockServer::start().await;
        let target = format!("{}/blocked.m3u", server.uri());

        Mock::given(method("GET"))
            .and(path("/blocked.m3u"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dead-proxy"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/proxy"))
            .and(query_param("url", target.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U"))
            .mount(&server)
            .await;

        let dead = format!("{}/dead-proxy?u=", server.uri());
        let good = format!("{}/proxy?url=", server.uri());
        let affinity = Arc::new(InMemoryAffinityStore::new());
        let fetcher = ResilientFetcher::new(fetch_config(vec![dead, good.clone()]))
            .with_affinity_store(affinity.clone());

        let body = fetcher
            .fetch(&target, &FetchOptions::default(), &CancellationToken::new())
            .await
            .expect("proxy fetch should succeed");

        assert_eq!(&body[..], b"#EXTM3U");
        assert_eq!(affinity.get(&target).await, Some(good));
    }

    #[tokio::test]
    async fn test_slow_direct_response_times_out() {
        let server = MockServer::start().await;
        let target = format!("{}/slow.m3u", server.uri());

        Mock::given(method("GET"))
            .and(path("/slow.m3u"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("too late")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .mount(&server)
            .await;

        let fetcher = ResilientFetcher::new(fetch_config(vec![format!("{}/proxy?url=", server.uri())]));
        let body = fetcher
            .fetch(&target, &FetchOptions::default(), &CancellationToken::new())
            .await
            .expect("proxy fetch should succeed after timeout");

        assert_eq!(&body[..], b"via proxy");
    }

    #[tokio::test]
    async fn test_everything_failing_is_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = ResilientFetcher::new(fetch_config(vec![format!("{}/proxy?url=", server.uri())]));
        let err = fetcher
            .fetch(
                &format!("{}/gone.m3u", server.uri()),
                &FetchOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(!err.is_cancelled());
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
    }
}

//! Integration tests for the CRM fetcher against a mock HTTP server
//!
//! Key behaviors tested:
//! - Cursor pagination follows `next_start` until `more_items_in_collection` is false
//! - Mail thread endpoints are fetched with exactly one request
//! - Errors mid-pagination keep earlier pages and record a warning
//! - The token is sent on every request and the cursor never outlives a call
//! - A slow server degrades into a timeout warning instead of an error

#[cfg(test)]
mod fetcher_tests {
    use salespulse::config::ClientConfig;
    use salespulse::crm::{CrmClient, CrmSource, Endpoint, ThreadKey, WarningReason};
    use salespulse::report_core::MonthWindow;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "test-token";

    fn client(server: &MockServer) -> CrmClient {
        let mut config = ClientConfig::new(server.uri(), TOKEN);
        config.page_limit = 2;
        CrmClient::new(config).unwrap()
    }

    fn page(data: Value, more: bool, next_start: Option<u64>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": data,
            "additional_data": {
                "pagination": {
                    "start": 0,
                    "limit": 2,
                    "more_items_in_collection": more,
                    "next_start": next_start
                }
            }
        }))
    }

    fn deal(id: i64) -> Value {
        json!({ "id": id, "add_time": "2024-10-01 08:00:00", "status": "open", "value": 10 })
    }

    #[tokio::test]
    async fn test_follows_cursor_until_last_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param_is_missing("start"))
            .respond_with(page(json!([deal(1), deal(2)]), true, Some(2)))
            .expect(1)
            .mount(&server)
            .await;
        // next_start on the last page must be ignored
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param("start", "2"))
            .respond_with(page(json!([deal(3)]), false, Some(4)))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = client(&server).fetch(Endpoint::Deals, &[]).await;

        let ids: Vec<i64> = fetched
            .records
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!fetched.is_partial());
    }

    #[tokio::test]
    async fn test_token_and_limit_on_every_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param_is_missing("start"))
            .respond_with(page(json!([deal(1)]), true, Some(1)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param("start", "1"))
            .respond_with(page(json!([deal(2)]), false, None))
            .mount(&server)
            .await;

        client(&server).fetch(Endpoint::Deals, &[]).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            let pairs: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
            assert!(pairs.contains(&("api_token".to_string(), TOKEN.to_string())));
            assert!(pairs.contains(&("limit".to_string(), "2".to_string())));
        }
    }

    #[tokio::test]
    async fn test_cursor_does_not_leak_between_calls() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param_is_missing("start"))
            .respond_with(page(json!([deal(1)]), true, Some(1)))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param("start", "1"))
            .respond_with(page(json!([deal(2)]), false, None))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let first = client.fetch(Endpoint::Deals, &[]).await;
        let second = client.fetch(Endpoint::Deals, &[]).await;

        assert_eq!(first.records, second.records);
        assert_eq!(second.records.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_keeps_earlier_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param_is_missing("start"))
            .respond_with(page(json!([deal(1), deal(2)]), true, Some(2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param("start", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetched = client(&server).fetch(Endpoint::Deals, &[]).await;

        assert_eq!(fetched.records.len(), 2);
        assert_eq!(fetched.warnings.len(), 1);
        assert_eq!(fetched.warnings[0].endpoint, "deals");
        assert_eq!(fetched.warnings[0].reason, WarningReason::Status(500));
    }

    #[tokio::test]
    async fn test_first_page_failure_is_empty_with_warning() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let deals = client(&server).deals().await;

        assert!(deals.records.is_empty());
        assert_eq!(deals.warnings[0].reason, WarningReason::Status(401));
    }

    #[tokio::test]
    async fn test_missing_cursor_stops_with_warning() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .respond_with(page(json!([deal(1)]), true, None))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = client(&server).fetch(Endpoint::Deals, &[]).await;

        assert_eq!(fetched.records.len(), 1);
        assert_eq!(fetched.warnings[0].reason, WarningReason::MissingCursor);
    }

    #[tokio::test]
    async fn test_slow_page_becomes_timeout_warning() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param_is_missing("start"))
            .respond_with(page(json!([deal(1), deal(2)]), true, Some(2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(query_param("start", "2"))
            .respond_with(page(json!([deal(3)]), false, None).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut config = ClientConfig::new(server.uri(), TOKEN);
        config.page_limit = 2;
        config.request_timeout = Duration::from_millis(300);
        let client = CrmClient::new(config).unwrap();

        let fetched = client.fetch(Endpoint::Deals, &[]).await;

        assert_eq!(fetched.records.len(), 2);
        assert_eq!(fetched.warnings.len(), 1);
        assert_eq!(fetched.warnings[0].endpoint, "deals");
        assert_eq!(fetched.warnings[0].reason, WarningReason::Timeout);
    }

    #[tokio::test]
    async fn test_null_data_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/activities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": null
            })))
            .mount(&server)
            .await;

        let fetched = client(&server).fetch(Endpoint::Activities, &[]).await;

        assert!(fetched.records.is_empty());
        assert!(!fetched.is_partial());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_warning() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/deals"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let fetched = client(&server).fetch(Endpoint::Deals, &[]).await;

        assert!(fetched.records.is_empty());
        assert!(matches!(fetched.warnings[0].reason, WarningReason::Decode(_)));
    }

    #[tokio::test]
    async fn test_mail_thread_single_request() {
        let server = MockServer::start().await;

        // pagination metadata on a thread endpoint is not followed
        Mock::given(method("GET"))
            .and(path("/persons/7/mailMessages"))
            .respond_with(page(
                json!([
                    { "timestamp": "2024-10-02T10:00:00Z",
                      "data": { "from": [{ "email_address": "agent@acme.io" }],
                                "to": [{ "email_address": "Jane@Example.com" }] } },
                    { "timestamp": "2024-10-01 09:30:00",
                      "data": { "from": [{ "email_address": "jane@example.com" }],
                                "to": [{ "email_address": "agent@acme.io" }] } }
                ]),
                true,
                Some(2),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let thread = client(&server).mail_thread(ThreadKey::Person(7)).await;

        assert_eq!(thread.records.len(), 2);
        assert!(thread.records[0].recipients.contains("jane@example.com"));

        let requests = server.received_requests().await.unwrap();
        let keys: Vec<String> = requests[0]
            .url
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect();
        assert_eq!(keys, vec!["api_token".to_string()]);
    }

    #[tokio::test]
    async fn test_activities_sent_with_month_bounds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/activities"))
            .and(query_param("start_date", "2024-02-01"))
            .and(query_param("end_date", "2024-02-29"))
            .respond_with(page(
                json!([
                    { "id": 1, "add_time": "2024-02-03 10:00:00", "done": true },
                    { "add_time": "2024-02-04 10:00:00", "done": false }
                ]),
                false,
                None,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let window = MonthWindow::new(2, 2024).unwrap();
        let activities = client(&server).activities(&window).await;

        assert_eq!(activities.records.len(), 1);
        assert!(activities.records[0].done);
        assert_eq!(activities.rejected, 1);
    }

    #[tokio::test]
    async fn test_collection_endpoint_uses_since_until() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/activities/collection"))
            .and(query_param("since", "2024-10-01 00:00:00"))
            .and(query_param("until", "2024-10-31 23:59:59"))
            .respond_with(page(json!([]), false, None))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = ClientConfig::new(server.uri(), TOKEN);
        config.activities_endpoint = Endpoint::ActivitiesCollection;
        let client = CrmClient::new(config).unwrap();

        let window = MonthWindow::new(10, 2024).unwrap();
        let activities = client.activities(&window).await;
        assert!(activities.records.is_empty());
        assert!(!activities.is_partial());
    }
}

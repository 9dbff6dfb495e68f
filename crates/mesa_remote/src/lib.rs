pub mod client;
pub mod config;
pub mod store;

pub use client::ApiClient;
pub use config::RemoteConfig;
pub use store::HttpReportStore;

#[cfg(test)]
mod tests {
    use super::client::{classify_status, validate_base_url};
    use super::{ApiClient, RemoteConfig};
    use mesa_core::error::ErrorKind;

    #[test]
    fn base_url_requires_tls_off_loopback() {
        assert!(validate_base_url("https://mesa.example.gob/api").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_base_url("http://localhost:8080/api").is_ok());
        assert!(validate_base_url("http://[::1]:8080").is_ok());
        assert!(validate_base_url("http://LOCALHOST:8080").is_ok());

        assert!(validate_base_url("http://mesa.example.gob").is_err());
        assert!(validate_base_url("ftp://mesa.example.gob").is_err());
        assert!(validate_base_url("https://user@mesa.example.gob").is_err());
        assert!(validate_base_url("https://mesa.example.gob/api?x=1").is_err());
        assert!(validate_base_url("http://127.0.0.1.evil.com:8080").is_err());
        assert!(validate_base_url("http://127.0.0.1:0").is_err());
        assert!(validate_base_url("http://127.0.0.1:99999").is_err());
        assert!(validate_base_url("https://").is_err());
        assert!(validate_base_url("https://mesa.example.gob/api#frag").is_err());
        assert!(validate_base_url("https://:pw@mesa.example.gob").is_err());

        let err = validate_base_url("http://10.0.0.5").expect_err("plain http off loopback");
        assert_eq!(err.code, "REMOTE_BASE_URL_INVALID");
    }

    #[test]
    fn report_ids_are_encoded_as_single_path_segments() {
        for base in ["https://mesa.example.gob/api", "https://mesa.example.gob/api/"] {
            let client = ApiClient::new(&RemoteConfig::new(base, "t")).expect("client");
            let url = client.endpoint(&["reports", "a/b c"]).expect("endpoint");
            assert_eq!(url.as_str(), "https://mesa.example.gob/api/reports/a%2Fb%20c");
            let url = client.endpoint(&["reports", "ñ"]).expect("endpoint");
            assert_eq!(url.as_str(), "https://mesa.example.gob/api/reports/%C3%B1");
        }
        let client =
            ApiClient::new(&RemoteConfig::new("http://127.0.0.1:8080", "t")).expect("client");
        let url = client.endpoint(&["reports", "../admin"]).expect("endpoint");
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/reports/..%2Fadmin");
    }

    #[test]
    fn statuses_map_onto_error_kinds() {
        let cases = [
            (400, ErrorKind::Validation, false),
            (422, ErrorKind::Validation, false),
            (401, ErrorKind::Authorization, false),
            (403, ErrorKind::Authorization, false),
            (404, ErrorKind::NotFound, false),
            (429, ErrorKind::Server, true),
            (500, ErrorKind::Server, true),
            (503, ErrorKind::Server, true),
            (418, ErrorKind::Server, false),
        ];
        for (status, kind, retryable) in cases {
            let err = classify_status(status, "");
            assert_eq!((err.kind, err.retryable), (kind, retryable), "status {status}");
        }
    }

    #[test]
    fn server_message_is_preferred_when_present() {
        let err = classify_status(422, r#"{"message": "descripcion demasiado corta"}"#);
        assert_eq!(err.message, "descripcion demasiado corta");
        assert!(err.details.as_deref().unwrap_or_default().contains("status=422"));
    }
}

use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

// Per-request timeouts (e.g. the Gemini call) override the client default.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}

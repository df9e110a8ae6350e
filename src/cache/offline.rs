//! Fallback page served when a navigation cannot reach the network.

use bytes::Bytes;

use super::AssetResponse;

/// Static HTML shown while offline.
pub const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>MediBot AI - Offline</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            color: white;
            text-align: center;
        }
        .offline-container {
            max-width: 400px;
            padding: 2rem;
        }
        .offline-icon {
            font-size: 4rem;
            margin-bottom: 1rem;
        }
        button {
            background: rgba(255, 255, 255, 0.2);
            border: 2px solid white;
            color: white;
            padding: 0.75rem 1.5rem;
            border-radius: 8px;
            cursor: pointer;
            font-size: 1rem;
        }
    </style>
</head>
<body>
    <div class="offline-container">
        <div class="offline-icon">🏥</div>
        <h1>MediBot AI</h1>
        <h3>You're currently offline</h3>
        <p>Please check your internet connection to use MediBot AI.</p>
        <button onclick="window.location.reload()">Try Again</button>
    </div>
</body>
</html>
"#;

/// Offline page response for `url`.
#[must_use]
pub fn offline_response(url: &str) -> AssetResponse {
    AssetResponse::new(url, 200, Bytes::from_static(OFFLINE_PAGE.as_bytes()))
        .with_content_type("text/html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_page_is_html() {
        let response = offline_response("http://medibot.test/chat");
        assert_eq!(response.url, "http://medibot.test/chat");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        let body = std::str::from_utf8(&response.body).unwrap();
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("You're currently offline"));
    }
}

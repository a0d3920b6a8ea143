// HTTP response utilities for file downloads with optional Brotli encoding
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
};
use bytes::Bytes;
use tokio::io::AsyncReadExt;

/// True when the client lists `br` in Accept-Encoding.
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').any(|enc| enc.trim().split(';').next() == Some("br")))
        .unwrap_or(false)
}

pub async fn brotli_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = BrotliEncoder::new(std::io::Cursor::new(data));
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}

/// Attachment response carrying `filename`, compressed when `compress` is set.
pub async fn download_response(
    data: Vec<u8>,
    filename: &str,
    mime_type: &str,
    compress: bool,
) -> Result<Response<Body>, StatusCode> {
    let original_len = data.len();
    let (body_bytes, content_encoding) = if compress {
        let compressed = brotli_compress(&data).await.map_err(|e| {
            tracing::error!("Brotli compression error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tracing::debug!(filename, original_len, compressed_len = compressed.len(), "download compressed");
        (compressed, Some("br"))
    } else {
        (data, None)
    };

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        filename.replace(['"', '\\'], "_")
    ))
    .map_err(|e| {
        tracing::error!("Invalid download filename {}: {}", filename, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut response_builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));

    if let Some(encoding) = content_encoding {
        response_builder = response_builder
            .header(header::CONTENT_ENCODING, encoding)
            .header(header::VARY, "accept-encoding");
    }

    response_builder
        .body(Body::from(Bytes::from(body_bytes)))
        .map_err(|e| {
            tracing::error!("Response build error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::BrotliDecoder;

    #[test]
    fn test_accepts_brotli() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_brotli(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, br;q=0.9"));
        assert!(accepts_brotli(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, brotli-ish"));
        assert!(!accepts_brotli(&headers));
    }

    #[tokio::test]
    async fn test_plain_download_headers() {
        let response = download_response(b"a,b\n1,2\n".to_vec(), "data_export_1.csv", "text/csv", false)
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"data_export_1.csv\""
        );
        assert_eq!(headers[header::CONTENT_LENGTH], "8");
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn test_compressed_download_round_trips() {
        let payload = "account,balance\n".repeat(200).into_bytes();
        let compressed = brotli_compress(&payload).await.unwrap();
        assert!(compressed.len() < payload.len());

        let mut decoder = BrotliDecoder::new(std::io::Cursor::new(compressed));
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).await.unwrap();
        assert_eq!(restored, payload);

        let response = download_response(payload, "r.csv", "text/csv", true).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    }
}

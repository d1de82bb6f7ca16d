//! HTTP(S) firmware download on ESP-IDF.

use std::time::Duration;

use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::Read as _;
use log::{debug, warn};

use crate::app::ports::{FirmwareSource, FirmwareStream, StreamError};
use crate::ota::OTA_CHUNK_SIZE;

#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFirmwareSource;

impl FirmwareSource for HttpFirmwareSource {
    fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn FirmwareStream + '_>, StreamError> {
        let mut conn = EspHttpConnection::new(&Configuration {
            timeout: Some(timeout),
            buffer_size: Some(OTA_CHUNK_SIZE),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HTTP: client init failed: {:?}", e);
            StreamError::Connect
        })?;

        conn.initiate_request(Method::Get, url, &[]).map_err(|e| {
            warn!("HTTP: request failed: {:?}", e);
            StreamError::Connect
        })?;
        conn.initiate_response().map_err(|e| {
            warn!("HTTP: no response: {:?}", e);
            StreamError::Headers
        })?;

        let status = conn.status();
        debug!("HTTP: GET {} -> {}", url, status);
        if !(200..300).contains(&status) {
            warn!("HTTP: unexpected status {}", status);
            return Err(StreamError::Headers);
        }
        Ok(Box::new(HttpFirmwareStream { conn }))
    }
}

struct HttpFirmwareStream {
    conn: EspHttpConnection,
}

impl FirmwareStream for HttpFirmwareStream {
    fn content_length(&mut self) -> Result<usize, StreamError> {
        self.conn
            .header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .ok_or(StreamError::Headers)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.conn.read(buf).map_err(|e| {
            warn!("HTTP: read failed: {:?}", e);
            StreamError::Read
        })
    }
}

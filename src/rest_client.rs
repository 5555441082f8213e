use std::{
    cell::Cell,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client, Method};

use crate::config::Config;
use crate::error::TogglError;

/// Basic認証でAPIトークンと組み合わせる固定のパスワード。
const API_TOKEN_PASSWORD: &str = "api_token";

/// REST APIへHTTPリクエストを送信するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait RestRequester {
    /// 指定されたメソッド、ルート、ペイロードでリクエストを送信し、レスポンスボディを返す。
    ///
    /// # Arguments
    ///
    /// * `method` - HTTPメソッド
    /// * `route` - ベースURLからの相対パス(クエリ文字列を含む)
    /// * `payload` - JSONのリクエストボディ
    async fn request(&self, method: Method, route: &str, payload: Option<String>)
        -> Result<String>;
}

/// Toggl APIへのリクエストを直列化し、リクエスト間に一定の間隔を空けるクライアント。
///
/// 最後のリクエストの完了時刻を内部に保持するため、同時に複数の呼び出し元から
/// 利用することは想定していない。
pub struct TogglRestClient {
    client: Client,
    base_url: String,
    api_token: String,
    pause_between_requests: Duration,
    last_request: Cell<Option<Instant>>,
}

impl TogglRestClient {
    /// 新しい`TogglRestClient`を返す。
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
            pause_between_requests: config.pause_between_requests,
            last_request: Cell::new(None),
        }
    }

    /// 前回のリクエストから設定された間隔が経過するまで待機する。
    async fn wait_for_next_slot(&self) {
        let Some(last_request) = self.last_request.get() else {
            return;
        };

        let elapsed = last_request.elapsed();
        if elapsed < self.pause_between_requests {
            let wait_time = self.pause_between_requests - elapsed;
            debug!("Waiting {:?} before the next request", wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    async fn send(&self, method: Method, route: &str, payload: Option<String>) -> Result<String> {
        let url = format!("{}/{}", self.base_url, route);
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.api_token, Some(API_TOKEN_PASSWORD))
            .header(CONTENT_TYPE, "application/json");
        if let Some(payload) = payload {
            builder = builder.body(payload);
        }

        let response = builder.send().await.map_err(|source| TogglError::Transport {
            method: method.to_string(),
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| TogglError::Transport {
                method: method.to_string(),
                url: url.clone(),
                source,
            })
            .context("Failed to read response body")?;

        if !status.is_success() {
            return Err(TogglError::Status {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(body)
    }
}

#[async_trait(?Send)]
impl RestRequester for TogglRestClient {
    async fn request(
        &self,
        method: Method,
        route: &str,
        payload: Option<String>,
    ) -> Result<String> {
        self.wait_for_next_slot().await;

        let result = self.send(method, route, payload).await;
        self.last_request.set(Some(Instant::now()));

        result
    }
}

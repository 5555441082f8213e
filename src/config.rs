use std::{env, time::Duration};

use anyhow::{Context, Result};

/// Toggl APIのデフォルトのURL。
pub const DEFAULT_API_URL: &str = "https://api.track.toggl.com/api/v8";

/// Toggl APIは概ね1秒に1リクエストまでしか許容しない。
pub const DEFAULT_PAUSE_BETWEEN_REQUESTS: Duration = Duration::from_millis(1000);

const API_TOKEN_ENV: &str = "TOGGL_API_TOKEN";
const API_URL_ENV: &str = "TOGGL_API_URL";
const REQUEST_PAUSE_ENV: &str = "TOGGL_REQUEST_PAUSE_MS";

/// Toggl APIへ接続するための設定。
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_token: String,
    pub api_url: String,
    pub pause_between_requests: Duration,
}

impl Config {
    /// 環境変数から設定を読み込む。
    ///
    /// APIトークンは`token`が指定されていればそれを優先し、なければ`TOGGL_API_TOKEN`を利用する。
    pub fn load(token: Option<String>) -> Result<Self> {
        Self::from_lookup(token, |key| env::var(key).ok())
    }

    fn from_lookup<F>(token: Option<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = token
            .filter(|token| !token.is_empty())
            .or_else(|| lookup(API_TOKEN_ENV))
            .with_context(|| format!("Either --token or {} must be set", API_TOKEN_ENV))?;

        let api_url = lookup(API_URL_ENV)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let pause_between_requests = match lookup(REQUEST_PAUSE_ENV) {
            Some(millis) => Duration::from_millis(
                millis
                    .parse()
                    .with_context(|| format!("{} must be a number: {}", REQUEST_PAUSE_ENV, millis))?,
            ),
            None => DEFAULT_PAUSE_BETWEEN_REQUESTS,
        };

        Ok(Self {
            api_token,
            api_url,
            pause_between_requests,
        })
    }
}

use thiserror::Error;

/// Toggl APIとのやり取りおよびリポジトリ層で発生するエラー。
///
/// 各層では`anyhow::Context`で操作内容を付与して返すため、呼び出し側は
/// `downcast_ref::<TogglError>()`で根本原因を判別できる。
#[derive(Debug, Error)]
pub enum TogglError {
    /// ネットワークエラーなどでリクエストを送信できなかった。
    #[error("Failed to send the {method} request to {url}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 2xx以外のステータスが返された。
    #[error("The {method} request against {url} failed ({status}): {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// JSONのシリアライズ・デシリアライズに失敗した。
    #[error("Failed to (de)serialize {what}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// 名前やIDに一致するエンティティが存在しない。
    #[error("No {entity} found ({key})")]
    NotFound { entity: &'static str, key: String },

    /// 期間の指定が不正。
    #[error("Invalid time range: {start} - {stop}")]
    InvalidRange { start: String, stop: String },

    /// 入力値の検証エラー。
    #[error("{0}")]
    Validation(String),

    /// Toggl APIがサポートしていない操作。
    #[error("{0}")]
    Unsupported(String),
}

impl TogglError {
    /// `NotFound`エラーを作成する。
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// 指定されたエラーの根本原因が`NotFound`かどうかを返す。
    pub fn is_not_found(error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<TogglError>(),
            Some(TogglError::NotFound { .. })
        )
    }
}

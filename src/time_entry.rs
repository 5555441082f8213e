use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Toggl APIのtime entry。
///
/// ワークスペースやプロジェクトはIDで参照する。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TimeEntry {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "wid")]
    pub workspace_id: i64,
    /// `None`または`0`はプロジェクトなしを表す。
    #[serde(rename = "pid", default)]
    pub project_id: Option<i64>,
    pub start: DateTime<Utc>,
    /// `None`は計測中を表す。
    #[serde(default)]
    pub stop: Option<DateTime<Utc>>,
    #[serde(default)]
    pub billable: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl TimeEntry {
    /// プロジェクトが設定されている場合はそのIDを返す。
    pub fn project(&self) -> Option<i64> {
        self.project_id.filter(|id| *id != 0)
    }

    /// 計測中のtime entryかどうかを返す。
    pub fn is_running(&self) -> bool {
        self.stop.is_none()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

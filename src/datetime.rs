use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Toggl APIおよびCSVで利用するISO 8601形式(例: `2016-08-01T09:00:01+00:00`)。
const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// 日時をISO 8601形式の文字列に変換する。
pub fn format_iso8601(datetime: &DateTime<Utc>) -> String {
    datetime.format(ISO8601_FORMAT).to_string()
}

/// 日時を検索条件用のISO 8601形式の文字列に変換する。
///
/// 秒未満の値がある場合のみ小数部を含める(例: `2016-07-31T23:59:59.999999999+00:00`)。
pub fn format_iso8601_query(datetime: &DateTime<Utc>) -> String {
    datetime.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string()
}

/// ISO 8601形式の文字列をパースする。
///
/// オフセットは任意で、UTCに変換して返す。
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>> {
    let datetime = DateTime::parse_from_str(s.trim(), ISO8601_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s.trim()))
        .with_context(|| format!("Failed to parse date: {}", s))?;

    Ok(datetime.to_utc())
}

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_datetime::now;

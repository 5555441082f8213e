use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};

use crate::error::TogglError;

/// 開始日時と終了日時で表される期間。開始は常に終了より前になる。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
}

impl TimeRange {
    /// 新しい`TimeRange`を返す。
    ///
    /// `stop`が`start`以前の場合は空の期間となるためエラーを返す。
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self> {
        if stop <= start {
            return Err(invalid_range(&start, &stop).into());
        }

        Ok(Self { start, stop })
    }

    pub fn start(&self) -> &DateTime<Utc> {
        &self.start
    }

    pub fn stop(&self) -> &DateTime<Utc> {
        &self.stop
    }
}

fn invalid_range<Tz: TimeZone>(start: &DateTime<Tz>, stop: &DateTime<Tz>) -> TogglError
where
    Tz::Offset: std::fmt::Display,
{
    TogglError::InvalidRange {
        start: start.to_rfc3339(),
        stop: stop.to_rfc3339(),
    }
}

/// 指定された期間を月ごとの期間に分割する。
///
/// Toggl APIは1リクエストで返すtime entryの件数に上限があるため、1か月程度の期間ごとに取得する必要がある。
///
/// - 開始日と終了日は呼び出し元のタイムゾーンでの暦日を使い、UTCの00:00:01と23:59:59に正規化する。
/// - 最初の期間は開始日から、最後の期間は終了日までとし、それ以外の期間は月の初日から末日までとする。
/// - 最後以外の期間は月末の23:59:59.999999999で終わる。
///
/// # Examples
///
/// ```
/// // 2016-07-12 ~ 2016-07-31, 2016-08-01 ~ 2016-08-12
/// let ranges = monthly_time_ranges(&start, &end)?;
/// ```
pub fn monthly_time_ranges<Tz: TimeZone>(
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
) -> Result<Vec<TimeRange>>
where
    Tz::Offset: std::fmt::Display,
{
    if start >= end {
        return Err(invalid_range(start, end).into());
    }

    let first_day = start.date_naive();
    let last_day = end.date_naive();
    let normalized_start = at_utc(first_day, 0, 0, 1)?;
    let normalized_end = at_utc(last_day, 23, 59, 59)?;

    let mut ranges = Vec::new();
    let first_month = first_day.with_day(1).context("Failed to set day")?;
    let last_month = last_day.with_day(1).context("Failed to set day")?;
    let mut month = first_month;
    while month <= last_month {
        let next_month = month
            .checked_add_months(Months::new(1))
            .context("Failed to add month")?;

        let range_start = if month == first_month {
            normalized_start
        } else {
            at_utc(month, 0, 0, 0)?
        };
        // 月末は翌月の00:00:00の直前とし、次の期間との間に隙間を作らない
        let range_stop = if month == last_month {
            normalized_end
        } else {
            at_utc(next_month, 0, 0, 0)? - Duration::nanoseconds(1)
        };

        let range = TimeRange::new(range_start, range_stop).with_context(|| {
            format!(
                "Failed to calculate time ranges between {} and {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )
        })?;
        ranges.push(range);

        month = next_month;
    }

    Ok(ranges)
}

fn at_utc(date: NaiveDate, hour: u32, minute: u32, second: u32) -> Result<DateTime<Utc>> {
    let datetime = date
        .and_hms_opt(hour, minute, second)
        .context("Failed to set hour, minute, and second")?;

    Ok(Utc.from_utc_datetime(&datetime))
}

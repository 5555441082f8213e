use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::info;

use crate::csv_mapper::{write_row, CsvTimeRecordMapper};
use crate::datetime;
use crate::time_record::TimeRecordProvider;

/// `export`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    #[clap(short = 't', long = "token", help = "Toggl API token (defaults to $TOGGL_API_TOKEN)")]
    pub token: Option<String>,

    #[clap(
        help = "First day to export in the format YYYY-MM-DD (UTC)",
        parse(try_from_str = parse_date),
    )]
    pub start_date: NaiveDate,

    #[clap(
        help = "Last day to export in the format YYYY-MM-DD (UTC, defaults to today)",
        parse(try_from_str = parse_date),
    )]
    pub end_date: Option<NaiveDate>,
}

pub struct ExportCommand<'a, T: TimeRecordProvider> {
    time_records: &'a T,
    mapper: CsvTimeRecordMapper,
}

impl<'a, T: TimeRecordProvider> ExportCommand<'a, T> {
    /// 新しい`ExportCommand`を返す。
    ///
    /// # Arguments
    /// * `time_records` - 時間記録を取得するためのリポジトリ
    pub fn new(time_records: &'a T) -> Self {
        Self {
            time_records,
            mapper: CsvTimeRecordMapper::new(),
        }
    }

    /// `export`サブコマンドの処理を行う。
    ///
    /// 開始日の00:00:00から終了日の23:59:59(UTC)までの時間記録をCSVとして出力し、出力した件数を返す。
    /// 終了日が指定されていない場合は、UTCで現在の日付を利用する。
    ///
    /// # Arguments
    ///
    /// * `args` - `export`サブコマンドの引数
    /// * `output` - CSVの出力先
    pub async fn run<W: Write>(&self, args: &ExportArgs, output: &mut W) -> Result<usize> {
        let end_date = args
            .end_date
            .unwrap_or_else(|| datetime::now().date_naive());
        let start = at_utc(args.start_date, 0, 0, 0)?;
        let stop = at_utc(end_date, 23, 59, 59)?;
        info!("Start at: {}, End at: {}", start, stop);

        let mut writer = csv::Writer::from_writer(output);
        write_row(&mut writer, self.mapper.column_names())?;

        let records = self
            .time_records
            .get_time_records(&start, &stop)
            .await
            .with_context(|| {
                format!(
                    "Failed to retrieve time records between {} and {}",
                    start, stop
                )
            })?;

        for record in &records {
            write_row(&mut writer, &self.mapper.get_row(record))?;
        }
        info!("Exported {} time records", records.len());

        Ok(records.len())
    }
}

fn at_utc(date: NaiveDate, hour: u32, minute: u32, second: u32) -> Result<DateTime<Utc>> {
    let datetime = date
        .and_hms_opt(hour, minute, second)
        .context("Failed to set hour, minute, and second")?;

    Ok(Utc.from_utc_datetime(&datetime))
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}

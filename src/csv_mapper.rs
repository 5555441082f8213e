use std::io::{Read, Write};

use anyhow::{Context, Result};

use crate::datetime::{format_iso8601, parse_iso8601};
use crate::error::TogglError;
use crate::time_record::TimeRecord;

/// CSVの列名。この順番で値を読み書きする。
pub const COLUMN_NAMES: [&str; 7] = [
    "Start",
    "Stop",
    "Workspace Name",
    "Project Name",
    "Client Name",
    "Tag(s)",
    "Description",
];

const TAGS_SEPARATOR: &str = ",";

/// 説明文の最大文字数(この値以上は受け付けない)。
const MAX_DESCRIPTION_LENGTH: usize = 3000;

/// CSVの行と時間記録を相互に変換する。
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvTimeRecordMapper;

impl CsvTimeRecordMapper {
    /// 新しい`CsvTimeRecordMapper`を返す。
    pub fn new() -> Self {
        Self
    }

    pub fn column_names(&self) -> &'static [&'static str] {
        &COLUMN_NAMES
    }

    /// CSVの全行を時間記録に変換する。
    ///
    /// 先頭行の最初の値が`Start`の場合はヘッダー行として読み飛ばす。
    /// 1行でも変換できない場合はエラーを返す。
    pub fn get_time_records(&self, rows: &[Vec<String>]) -> Result<Vec<TimeRecord>> {
        let rows = match rows.first() {
            Some(header) if header.first().map(String::as_str) == Some(COLUMN_NAMES[0]) => {
                &rows[1..]
            }
            _ => rows,
        };

        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                self.get_time_record(row).with_context(|| {
                    format!("Failed to create time record from row {} ({:?})", index + 1, row)
                })
            })
            .collect()
    }

    /// CSVの1行を時間記録に変換する。
    pub fn get_time_record(&self, row: &[String]) -> Result<TimeRecord> {
        if row.len() != COLUMN_NAMES.len() {
            return Err(TogglError::Validation(format!(
                "Wrong number of values in the given row. Required: {}, given: {}",
                COLUMN_NAMES.len(),
                row.len()
            ))
            .into());
        }

        let start = parse_iso8601(&row[0]).context("Cannot parse the start date")?;
        let stop = parse_iso8601(&row[1]).context("Cannot parse the stop date")?;

        let description = row[6].trim();
        if description.chars().count() >= MAX_DESCRIPTION_LENGTH {
            return Err(TogglError::Validation(format!(
                "The description of the time record starting at {} is too long",
                format_iso8601(&start)
            ))
            .into());
        }

        Ok(TimeRecord {
            start,
            stop,
            workspace_name: row[2].trim().to_string(),
            project_name: row[3].trim().to_string(),
            client_name: row[4].trim().to_string(),
            description: description.to_string(),
            tags: split_tags(&row[5]),
        })
    }

    /// 時間記録をCSVの1行に変換する。
    pub fn get_row(&self, record: &TimeRecord) -> Vec<String> {
        vec![
            format_iso8601(&record.start),
            format_iso8601(&record.stop),
            record.workspace_name.clone(),
            record.project_name.clone(),
            record.client_name.clone(),
            record.tags.join(TAGS_SEPARATOR),
            record.description.clone(),
        ]
    }
}

fn split_tags(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return vec![];
    }

    value
        .split(TAGS_SEPARATOR)
        .map(|tag| tag.trim().to_string())
        .collect()
}

/// CSVテキストをすべて読み込み、行のリストとして返す。
///
/// 列数の検証は`CsvTimeRecordMapper`で行うため、ここでは行ごとの列数が異なっていてもよい。
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Vec<String>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    csv_reader
        .records()
        .map(|record| {
            let record = record.context("Failed to read time records from CSV")?;
            Ok(record.iter().map(String::from).collect())
        })
        .collect()
}

/// CSVの1行を書き込む。
pub fn write_row<W: Write, S: AsRef<[u8]>>(
    writer: &mut csv::Writer<W>,
    row: &[S],
) -> Result<()> {
    writer
        .write_record(row)
        .context("Failed to write CSV row")?;
    writer.flush().context("Failed to flush CSV output")?;

    Ok(())
}

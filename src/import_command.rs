use std::io::Read;

use anyhow::{Context, Result};
use log::info;

use crate::csv_mapper::{read_rows, CsvTimeRecordMapper};
use crate::progress::ProgressPresenter;
use crate::time_record::TimeRecordProvider;

/// `import`サブコマンドの引数。CSVは標準入力から読み込む。
#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    #[clap(short = 't', long = "token", help = "Toggl API token (defaults to $TOGGL_API_TOKEN)")]
    pub token: Option<String>,
}

pub struct ImportCommand<'a, T: TimeRecordProvider> {
    time_records: &'a T,
    mapper: CsvTimeRecordMapper,
}

impl<'a, T: TimeRecordProvider> ImportCommand<'a, T> {
    /// 新しい`ImportCommand`を返す。
    ///
    /// # Arguments
    /// * `time_records` - 時間記録を作成するためのリポジトリ
    pub fn new(time_records: &'a T) -> Self {
        Self {
            time_records,
            mapper: CsvTimeRecordMapper::new(),
        }
    }

    /// `import`サブコマンドの処理を行う。
    ///
    /// CSVのすべての行を時間記録に変換してから、先頭から順に1件ずつ作成し、作成した件数を返す。
    /// 途中で作成に失敗した場合は、以降の時間記録は作成せずにエラーを返す。
    ///
    /// # Arguments
    ///
    /// * `input` - CSVの入力元
    /// * `progress` - 進捗の表示先
    pub async fn run<R: Read, P: ProgressPresenter>(
        &self,
        input: R,
        progress: &mut P,
    ) -> Result<usize> {
        let rows = read_rows(input)?;
        let records = self.mapper.get_time_records(&rows)?;
        if records.is_empty() {
            info!("No time records to import");
            return Ok(0);
        }

        let total = records.len();
        progress.start(total)?;
        for (index, record) in records.iter().enumerate() {
            self.time_records
                .create_time_record(record)
                .await
                .with_context(|| {
                    format!("Failed to create time record {} of {}", index + 1, total)
                })?;
            progress.increment()?;
        }
        progress.finish()?;
        info!("Imported {} time records", total);

        Ok(total)
    }
}

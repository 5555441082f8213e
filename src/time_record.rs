use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
#[cfg(test)]
use mockall::automock;

use crate::error::TogglError;
use crate::model_converter::ModelConverter;
use crate::project::ProjectProvider;
use crate::time_range::monthly_time_ranges;
use crate::toggl::TimeEntryApi;

/// 名前でワークスペース、プロジェクト、クライアントを参照する1件の時間記録。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeRecord {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub workspace_name: String,
    pub project_name: String,
    pub client_name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// 時間記録を読み書きするためのtrait。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait TimeRecordProvider {
    /// 時間記録を作成する。
    ///
    /// プロジェクト(およびクライアント)が存在しない場合は先に作成する。
    async fn create_time_record(&self, time_record: &TimeRecord) -> Result<()>;

    /// 指定された期間のすべての時間記録を返す。
    ///
    /// プロジェクトのないtime entryと計測中のtime entryは含まない。
    async fn get_time_records(
        &self,
        start: &DateTime<Utc>,
        stop: &DateTime<Utc>,
    ) -> Result<Vec<TimeRecord>>;
}

/// Toggl APIのtime entryを時間記録として読み書きするリポジトリ。
pub struct TimeRecordRepository<'a, A: TimeEntryApi, P: ProjectProvider, M: ModelConverter> {
    api: &'a A,
    projects: &'a P,
    converter: &'a M,
}

impl<'a, A: TimeEntryApi, P: ProjectProvider, M: ModelConverter> TimeRecordRepository<'a, A, P, M> {
    /// 新しい`TimeRecordRepository`を返す。
    pub fn new(api: &'a A, projects: &'a P, converter: &'a M) -> Self {
        Self {
            api,
            projects,
            converter,
        }
    }

    /// 1つの期間のtime entryを取得し、時間記録に変換する。
    async fn get_time_records_in_range(
        &self,
        start: &DateTime<Utc>,
        stop: &DateTime<Utc>,
    ) -> Result<Vec<TimeRecord>> {
        let time_entries = self.api.get_time_entries(start, stop).await?;

        let mut records = Vec::with_capacity(time_entries.len());
        for time_entry in time_entries {
            if time_entry.project().is_none() {
                debug!("Skipping time entry {} without project", time_entry.id);
                continue;
            }
            if time_entry.is_running() {
                debug!("Skipping running time entry {}", time_entry.id);
                continue;
            }

            let record = self
                .converter
                .to_time_record(&time_entry)
                .await
                .with_context(|| format!("Failed to convert time entry ({:?})", time_entry))?;
            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait(?Send)]
impl<'a, A: TimeEntryApi, P: ProjectProvider, M: ModelConverter> TimeRecordProvider
    for TimeRecordRepository<'a, A, P, M>
{
    async fn create_time_record(&self, time_record: &TimeRecord) -> Result<()> {
        // 一覧の読み込みエラーは「プロジェクトが存在しない」とは扱わない
        self.projects
            .get_projects()
            .await
            .context("Failed to load projects")?;

        let existing = self
            .projects
            .get_project_by_name(
                &time_record.project_name,
                &time_record.workspace_name,
                &time_record.client_name,
            )
            .await;
        match existing {
            Ok(_) => {}
            Err(error) if TogglError::is_not_found(&error) => {
                self.projects
                    .create_project(
                        &time_record.project_name,
                        &time_record.workspace_name,
                        &time_record.client_name,
                    )
                    .await
                    .with_context(|| {
                        format!("Failed to create project for time record: {:?}", time_record)
                    })?;
            }
            Err(error) => {
                return Err(error.context(format!(
                    "Failed to resolve project for time record: {:?}",
                    time_record
                )))
            }
        }

        let time_entry = self
            .converter
            .to_time_entry(time_record)
            .await
            .with_context(|| {
                format!(
                    "Failed to convert the given time record ({:?}) into a valid time entry",
                    time_record
                )
            })?;

        self.api
            .create_time_entry(&time_entry)
            .await
            .with_context(|| format!("Failed to create time record ({:?})", time_record))?;

        Ok(())
    }

    async fn get_time_records(
        &self,
        start: &DateTime<Utc>,
        stop: &DateTime<Utc>,
    ) -> Result<Vec<TimeRecord>> {
        if start > stop {
            return Err(TogglError::InvalidRange {
                start: start.to_rfc3339(),
                stop: stop.to_rfc3339(),
            }
            .into());
        }

        // Toggl APIは1リクエストあたりの件数に上限があるため月ごとに取得する
        let ranges = monthly_time_ranges(start, stop)?;
        info!("Retrieving time records in {} chunks", ranges.len());

        let mut records = Vec::new();
        for (index, range) in ranges.iter().enumerate() {
            let chunk = self
                .get_time_records_in_range(range.start(), range.stop())
                .await
                .with_context(|| {
                    format!(
                        "Failed to retrieve time records for chunk {} of {} ({} - {})",
                        index + 1,
                        ranges.len(),
                        range.start(),
                        range.stop()
                    )
                })?;
            records.extend(chunk);
        }

        Ok(records)
    }
}

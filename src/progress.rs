use std::io::Write;

use anyhow::{Context, Result};
#[cfg(test)]
use mockall::automock;

/// 処理の進捗を表示するためのtrait。
#[cfg_attr(test, automock)]
pub trait ProgressPresenter {
    /// 全体の件数を設定して表示を開始する。
    fn start(&mut self, total: usize) -> Result<()>;

    /// 完了した件数を1つ進める。
    fn increment(&mut self) -> Result<()>;

    /// 表示を終了する。
    fn finish(&mut self) -> Result<()>;
}

/// 進捗を`Importing n/total`の形式で1行に上書きしながら表示する。
pub struct ConsoleProgress<'a, W: Write> {
    writer: &'a mut W,
    total: usize,
    current: usize,
}

impl<'a, W: Write> ConsoleProgress<'a, W> {
    /// 新しい`ConsoleProgress`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            total: 0,
            current: 0,
        }
    }

    fn render(&mut self) -> Result<()> {
        write!(self.writer, "\rImporting {}/{}", self.current, self.total)
            .and_then(|_| self.writer.flush())
            .context("Failed to write progress")
    }
}

impl<'a, W: Write> ProgressPresenter for ConsoleProgress<'a, W> {
    fn start(&mut self, total: usize) -> Result<()> {
        self.total = total;
        self.current = 0;
        self.render()
    }

    fn increment(&mut self) -> Result<()> {
        self.current = (self.current + 1).min(self.total);
        self.render()
    }

    fn finish(&mut self) -> Result<()> {
        writeln!(self.writer).context("Failed to write progress")
    }
}

/// 何も表示しない`ProgressPresenter`。
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressPresenter for SilentProgress {
    fn start(&mut self, _total: usize) -> Result<()> {
        Ok(())
    }

    fn increment(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

use super::{Error, Options, Output, Restic};
use crate::context::RunContext;
use tokio::io::{AsyncBufReadExt, BufReader};

impl Restic {
    pub async fn version_string(&self, ctx: &RunContext) -> Result<String, Error> {
        let mut process = self.run(
            &ctx.with_json(false),
            &["version"],
            &Options {
                stdout: Output::Capture,
                stderr: Output::Null,
            },
        )?;
        let mut version = None;
        if let Some(stdout) = process.stdout().take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await.map_err(Error::SubprocessIoError)? {
                if let Some(v) = version_line(&line) {
                    version = Some(v.to_string());
                    break;
                }
            }
        }
        process.wait().await?;
        version.ok_or(Error::FailedToGetResticVersion)
    }
}

fn version_line(line: &str) -> Option<&str> {
    Some(line.trim()).filter(|s| !s.is_empty())
}

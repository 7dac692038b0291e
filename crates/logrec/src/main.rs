use anyhow::Context;
use logrec::runtime::{boot, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boot::init_logging();
    let (config, args) = boot::boot()?;

    let summary = run::run(config, args.files)
        .await
        .context("Run aborted")?;

    if summary.failed > 0 {
        anyhow::bail!("{} of {} files failed", summary.failed, summary.failed + summary.reports.len());
    }
    Ok(())
}

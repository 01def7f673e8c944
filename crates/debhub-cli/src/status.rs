use debhub_core::{
    index::{IndexBuilder, PackageStatus},
    CoreResult,
};
use nu_ansi_term::Color::{Blue, Cyan, Green, LightRed, Red, Yellow};
use tracing::info;

use crate::utils::{format_bytes, Colored};

pub fn display_status(builder: &IndexBuilder, owner: &str, repo: Option<&str>) -> CoreResult<()> {
    let report = builder.status(owner, repo)?;

    let loaded = report.iter().filter(|s| s.outcome.is_ok()).count();
    for (idx, status) in report.iter().enumerate() {
        print_status(idx + 1, status);
    }

    info!(
        assets = report.len(),
        loaded,
        "{} of {} assets loaded",
        Colored(Green, loaded),
        report.len()
    );
    Ok(())
}

fn print_status(position: usize, status: &PackageStatus) {
    let asset = &status.asset;
    let channel = if asset.prerelease {
        Colored(Yellow, "pre-release")
    } else {
        Colored(Green, "release")
    };

    match &status.outcome {
        Ok(package) => {
            info!(
                tag = %asset.tag_name,
                file = %asset.file_name,
                prerelease = asset.prerelease,
                status = "ok",
                "[{position}] {}:{} ({channel}) {}",
                Colored(Blue, &asset.repo_name),
                Colored(Cyan, &asset.tag_name),
                Colored(Green, "ok")
            );
            info!(
                package = %package.key(),
                suite = %package.suite,
                "    {} {} {} [{}]",
                package.name(),
                Colored(LightRed, package.version()),
                package.architecture(),
                package.suite
            );
            info!(url = %package.download_url, "    {}", package.download_url);
            info!(
                size = package.file_size,
                updated_at = %package.updated_at.to_rfc3339(),
                "    {} | {}",
                format_bytes(package.file_size),
                package.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        Err(err) => {
            info!(
                tag = %asset.tag_name,
                file = %asset.file_name,
                prerelease = asset.prerelease,
                status = %err,
                "[{position}] {}:{} ({channel}) {}",
                Colored(Blue, &asset.repo_name),
                Colored(Cyan, &asset.tag_name),
                Colored(Red, err)
            );
            info!("    {}", asset.file_name);
        }
    }
}

use std::env;
use steward_core::RunContext;
use tracing::instrument;

#[instrument(skip(ctx))]
pub fn get_version_info(ctx: &RunContext) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");
    let description = env!("CARGO_PKG_DESCRIPTION");

    tracing::debug!(
        package_name = name,
        package_version = version,
        "Gathering package information"
    );

    // Set by the release build, absent in local builds
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let build_date = env::var("BUILD_DATE").unwrap_or_else(|_| "unknown".to_string());

    format!(
        "{name} {version} - {description}\n\
        Target: {target}\n\
        Build Date: {build_date}\n\
        Run ID: {}",
        ctx.run_id()
    )
}

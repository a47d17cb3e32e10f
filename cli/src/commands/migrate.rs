use super::{build_request, collaborators};
use crate::config::MigrateConfig;
use crate::output::{print_report, OutputFormat};
use crate::ObjectArgs;
use anyhow::Result;
use migration::{ContentKind, Pipeline};

/// Migrate one object of `kind` and print its report
pub async fn execute(kind: ContentKind, args: ObjectArgs, config: &MigrateConfig, format: OutputFormat) -> Result<()> {
    let mut request = build_request(&args.tenants, config)?
        .with_section(args.to_section)
        .with_redirect_urls(args.redirect_urls);
    if let Some(website) = args.to_website {
        request = request.with_website(website);
    }

    let pipeline = Pipeline::new(collaborators(config)?);
    let report = pipeline.migrate(kind, &request, &args.id).await?;
    print_report(&report, format)
}

#![allow(clippy::expect_used)]

use veracode_api::{
    ApplicationQuery, ApplicationsApi, FindingsApi, FindingsQuery, IdentityApi, ScanType,
    VeracodeClient, VeracodeConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = VeracodeConfig::new(
        std::env::var("VERACODE_API_KEY_ID")
            .expect("VERACODE_API_KEY_ID environment variable required"),
        std::env::var("VERACODE_API_KEY_SECRET")
            .expect("VERACODE_API_KEY_SECRET environment variable required"),
    );
    let client = VeracodeClient::new(config)?;

    let principal = IdentityApi::new(&client).get_principal().await?;
    println!("Signed in as {}", principal.display_name());

    // Ten most recently listed applications
    let query = ApplicationQuery::new().with_size(10);
    let applications = ApplicationsApi::new(&client).get_applications(&query).await?;
    println!(
        "Found {} applications across {} pages",
        applications.total_elements(),
        applications.total_pages()
    );

    let Some(first) = applications.items().first() else {
        return Ok(());
    };
    println!("Listing static findings of {}", first.name());

    let findings = FindingsApi::new(&client)
        .get_findings(
            &first.guid,
            &FindingsQuery::new()
                .with_scan_type(ScanType::Static)
                .with_annotations(true),
        )
        .await?;
    for finding in findings.items() {
        println!(
            "  #{:<6} {:<13} {}",
            finding.issue_id,
            finding.severity().map(|s| s.label()).unwrap_or("N/A"),
            finding.title()
        );
    }

    Ok(())
}

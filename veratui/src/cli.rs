//! CLI argument parsing for veratui
use clap::Parser;
use std::path::PathBuf;
use veracode_api::VeracodeRegion;
use veracode_api::validation::MAX_PAGE_SIZE;

#[derive(Parser, Debug)]
#[command(
    name = "veratui",
    version,
    about = "Terminal browser for Veracode scan results",
    long_about = "Browse Veracode applications, sandboxes, findings and static data paths from the terminal",
    after_help = "CREDENTIALS:
  Read from ~/.veracode/veracode.yml (api.key-id, api.key-secret) unless
  --config is given. VERACODE_API_KEY_ID and VERACODE_API_KEY_SECRET
  override the file.

KEYS (application list):
  n/s/t/m   focus name, scan status, scan type, modified-after filter
  a         focus the table
  PgDn/PgUp next/previous page
  Enter     open the selected application
  Esc       back / quit
  q         quit"
)]
pub struct Cli {
    /// Veracode region (commercial, european, federal)
    #[arg(long, default_value = "commercial", value_parser = parse_region)]
    pub region: VeracodeRegion,

    /// Path to the Veracode credentials file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Results per page (1-500)
    #[arg(long, default_value_t = 100, value_parser = validate_page_size)]
    pub page_size: u32,

    /// Write debug logs to this file
    #[arg(long)]
    pub debug_log: Option<PathBuf>,
}

fn parse_region(s: &str) -> Result<VeracodeRegion, String> {
    s.parse()
}

fn validate_page_size(s: &str) -> Result<u32, String> {
    let size: u32 = s
        .parse()
        .map_err(|_| format!("Invalid page size '{s}': must be a number"))?;
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(format!(
            "Invalid page size {size}: must be between 1 and {MAX_PAGE_SIZE}"
        ));
    }
    Ok(size)
}

//! CLI probe for the transactional core.
//!
//! Usage: `txguard_cli <db_path> <organization_name> <owner_user_uuid>`
//!
//! Opens (and migrates) the database, creates one organization with its owner
//! as a single atomic operation, and prints the caller response as JSON.

use std::process::ExitCode;
use std::sync::Arc;
use txguard_core::{
    init_logging_from_config, report_for, AtomicExecutor, EngineConfig, NewOrganization,
    OrganizationService, RequestContext, SqliteResource,
};
use uuid::Uuid;

const USAGE: &str = "usage: txguard_cli <db_path> <organization_name> <owner_user_uuid>";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [db_path, name, owner] = args.as_slice() else {
        return Err(USAGE.to_string());
    };
    let owner = Uuid::parse_str(owner).map_err(|err| format!("invalid owner uuid: {err}"))?;

    let config = EngineConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config)?;

    let resource = SqliteResource::open(db_path)
        .map_err(|err| format!("failed to open database: {err}"))?
        .with_busy_timeout(config.busy_timeout());
    let ctx = RequestContext::new(Uuid::new_v4().to_string(), Arc::new(resource));
    let service = OrganizationService::new(AtomicExecutor::from_config(&config));

    let outcome = service
        .create_organization(&ctx, NewOrganization::named(name.as_str()), owner)
        .await;
    let response = report_for(ctx.request_id(), &outcome);
    let json = serde_json::to_string(&response).map_err(|err| err.to_string())?;
    println!("{json}");

    log::logger().flush();
    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

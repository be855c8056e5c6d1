//! CLI smoke entry point.
//!
//! # Responsibility
//! - Assemble the company service from environment configuration.
//! - Run one create/update/delete probe and print every published event,
//!   acting as the topic consumer.

use company_core::db::{open_db, open_db_in_memory};
use company_core::{
    core_version, init_logging, AppConfig, ChannelEventsWriter, Company, CompanyService,
    EventsWriter, RequestContext, SqliteCompanyRepository,
};
use log::info;
use serde_json::{json, Map};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("company_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_logging(config.log_level, config.log_dir.as_deref())?;
    println!("company_core version={}", core_version());

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = SqliteCompanyRepository::try_new(conn)?;

    let (writer, receiver) = ChannelEventsWriter::new(config.events_topic.as_str());
    let writer = Arc::new(writer);
    let consumer = thread::spawn(move || {
        for message in receiver {
            println!(
                "event topic={} payload={}",
                message.topic,
                String::from_utf8_lossy(&message.payload)
            );
        }
    });

    let service = CompanyService::new(config.app_name.as_str(), repo, Arc::clone(&writer));
    let probe = run_probe(&service);

    writer.close();
    consumer
        .join()
        .map_err(|_| "event consumer thread panicked")?;
    probe
}

fn run_probe(
    service: &CompanyService<SqliteCompanyRepository, Arc<ChannelEventsWriter>>,
) -> Result<(), Box<dyn Error>> {
    let ctx = RequestContext::with_timeout(PROBE_TIMEOUT);
    let mut company = Company::new(
        format!("probe-{}", uuid_suffix()),
        "created by company_cli",
        1,
        false,
        "Cooperative",
    );

    let id = service.create(&ctx, &mut company)?;
    info!("event=cli_probe module=cli status=created company_id={id}");

    let mut fields = Map::new();
    fields.insert("employee_cnt".to_string(), json!(2.0));
    fields.insert("registered".to_string(), json!(true));
    service.update_fields(&ctx, id, fields)?;
    println!("company {}", serde_json::to_string(&service.get(&ctx, id)?)?);

    service.delete(&ctx, id)?;
    info!("event=cli_probe module=cli status=ok company_id={id}");
    Ok(())
}

/// Short random suffix keeping probe names unique within the name limit.
fn uuid_suffix() -> String {
    company_core::CompanyId::new_v4().simple().to_string()[..6].to_string()
}

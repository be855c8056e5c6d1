use company_core::db::open_db_in_memory;
use company_core::{
    ChannelEventsWriter, Company, CompanyId, CompanyPatch, CompanyRepository, CompanyService,
    CompanyServiceError, EventsError, EventsWriter, MutationEvent, RepoError, RepoResult,
    RequestContext, SqliteCompanyRepository,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const APP_NAME: &str = "test-app";

#[derive(Clone, Default)]
struct RecordingWriter {
    events: Arc<Mutex<Vec<MutationEvent>>>,
}

impl RecordingWriter {
    fn events(&self) -> Vec<MutationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventsWriter for RecordingWriter {
    fn write(&self, ctx: &RequestContext, events: &[MutationEvent]) -> Result<(), EventsError> {
        ctx.check()?;
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(())
    }

    fn close(&self) {}
}

struct FailingWriter;

impl EventsWriter for FailingWriter {
    fn write(&self, _ctx: &RequestContext, _events: &[MutationEvent]) -> Result<(), EventsError> {
        Err(EventsError::Transport("broker unavailable".to_string()))
    }

    fn close(&self) {}
}

/// Repository whose storage always fails; counts every call it receives.
#[derive(Clone, Default)]
struct BrokenRepository {
    calls: Arc<AtomicUsize>,
}

impl BrokenRepository {
    fn fail<T>(&self) -> RepoResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepoError::from(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
            Some("disk I/O error".to_string()),
        )))
    }
}

impl CompanyRepository for BrokenRepository {
    fn get_company(&self, _ctx: &RequestContext, _id: CompanyId) -> RepoResult<Company> {
        self.fail()
    }

    fn create_company(&self, _ctx: &RequestContext, _company: &Company) -> RepoResult<()> {
        self.fail()
    }

    fn update_company(
        &self,
        _ctx: &RequestContext,
        _id: CompanyId,
        _patch: &CompanyPatch,
    ) -> RepoResult<()> {
        self.fail()
    }

    fn delete_company(&self, _ctx: &RequestContext, _id: CompanyId) -> RepoResult<()> {
        self.fail()
    }
}

fn service() -> (
    CompanyService<SqliteCompanyRepository, RecordingWriter>,
    RecordingWriter,
) {
    let repo = SqliteCompanyRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let writer = RecordingWriter::default();
    (CompanyService::new(APP_NAME, repo, writer.clone()), writer)
}

fn sample_company(name: &str) -> Company {
    Company::new(name, "", 6, true, "NonProfit")
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn create_then_get_returns_equal_company() {
    let (service, _) = service();
    let ctx = RequestContext::background();
    let mut company = sample_company("some name");

    let id = service.create(&ctx, &mut company).unwrap();

    assert_eq!(company.id, id);
    assert_eq!(service.get(&ctx, id).unwrap(), company);
}

#[test]
fn create_overwrites_caller_supplied_id() {
    let (service, _) = service();
    let ctx = RequestContext::background();
    let supplied = Uuid::new_v4();
    let mut company = sample_company("some name");
    company.id = supplied;

    let id = service.create(&ctx, &mut company).unwrap();

    assert_ne!(id, supplied);
    assert!(matches!(
        service.get(&ctx, supplied),
        Err(CompanyServiceError::NotFound(_))
    ));
}

#[test]
fn create_emits_created_event_with_full_entity() {
    let (service, writer) = service();
    let mut company = sample_company("some name");

    service
        .create(&RequestContext::background(), &mut company)
        .unwrap();

    let events = writer.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "CompanyCreated");
    assert_eq!(events[0].producer, APP_NAME);
    assert_eq!(events[0].data, serde_json::to_value(&company).unwrap());
}

#[test]
fn create_invalid_company_reports_every_violation_and_stores_nothing() {
    let (service, writer) = service();
    let mut company = Company::new("na", "", -1, false, "NonaProfit");

    let err = service
        .create(&RequestContext::background(), &mut company)
        .unwrap_err();

    match &err {
        CompanyServiceError::Validation(validation) => {
            assert_eq!(validation.violations().len(), 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("validation error: "));
    assert!(company.id.is_nil());
    assert!(writer.events().is_empty());
}

#[test]
fn create_duplicate_name_returns_conflict_on_second_call() {
    let (service, writer) = service();
    let ctx = RequestContext::background();

    service
        .create(&ctx, &mut sample_company("some name"))
        .unwrap();
    let err = service
        .create(&ctx, &mut sample_company("some name"))
        .unwrap_err();

    assert_eq!(err, CompanyServiceError::Conflict("some name".to_string()));
    assert_eq!(
        err.to_string(),
        "company with the name \"some name\" already exists"
    );
    assert_eq!(writer.events().len(), 1);
}

#[test]
fn get_unknown_id_returns_not_found_carrying_id() {
    let (service, _) = service();
    let unknown = Uuid::new_v4();

    let err = service
        .get(&RequestContext::background(), unknown)
        .unwrap_err();
    assert_eq!(err, CompanyServiceError::NotFound(unknown));
}

#[test]
fn update_normalizes_float_and_drops_unknown_keys() {
    let (service, writer) = service();
    let ctx = RequestContext::background();
    let id = service
        .create(&ctx, &mut sample_company("some name"))
        .unwrap();

    service
        .update_fields(&ctx, id, fields(json!({ "employee_cnt": 12.0, "bogus": "x" })))
        .unwrap();

    assert_eq!(service.get(&ctx, id).unwrap().employee_cnt, 12);

    let events = writer.events();
    let updated = events.last().unwrap();
    assert_eq!(updated.name, "CompanyUpdated");
    assert_eq!(
        updated.data,
        json!({ "employee_cnt": 12, "id": id.to_string() })
    );
    assert!(updated.data.get("bogus").is_none());
}

#[test]
fn update_with_wrong_type_is_rejected_before_storage() {
    let repo = BrokenRepository::default();
    let writer = RecordingWriter::default();
    let service = CompanyService::new(APP_NAME, repo.clone(), writer.clone());

    let err = service
        .update_fields(
            &RequestContext::background(),
            Uuid::new_v4(),
            fields(json!({ "name": 123 })),
        )
        .unwrap_err();

    match &err {
        CompanyServiceError::Validation(validation) => {
            assert_eq!(validation.violations()[0].field(), "name");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("unsupported type for field name"));
    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    assert!(writer.events().is_empty());
}

#[test]
fn update_with_unknown_key_behaves_like_update_without_it() {
    let outcome = |update: Value| {
        let (service, writer) = service();
        let ctx = RequestContext::background();
        let id = service
            .create(&ctx, &mut sample_company("some name"))
            .unwrap();
        service.update_fields(&ctx, id, fields(update)).unwrap();

        let mut stored = service.get(&ctx, id).unwrap();
        stored.id = Uuid::nil();
        let mut payload = writer.events().last().unwrap().data.clone();
        payload.as_object_mut().unwrap().remove("id");
        (stored, payload)
    };

    assert_eq!(
        outcome(json!({ "random field": 123, "name": "new name" })),
        outcome(json!({ "name": "new name" }))
    );
}

#[test]
fn update_unknown_id_returns_not_found_without_event() {
    let (service, writer) = service();
    let unknown = Uuid::new_v4();

    let err = service
        .update_fields(
            &RequestContext::background(),
            unknown,
            fields(json!({ "registered": false })),
        )
        .unwrap_err();

    assert_eq!(err, CompanyServiceError::NotFound(unknown));
    assert!(writer.events().is_empty());
}

#[test]
fn update_to_taken_name_returns_conflict() {
    let (service, _) = service();
    let ctx = RequestContext::background();
    service.create(&ctx, &mut sample_company("acme")).unwrap();
    let id = service.create(&ctx, &mut sample_company("globex")).unwrap();

    let err = service
        .update_fields(&ctx, id, fields(json!({ "name": "acme" })))
        .unwrap_err();

    assert_eq!(err, CompanyServiceError::Conflict("acme".to_string()));
    assert_eq!(service.get(&ctx, id).unwrap().name, "globex");
}

#[test]
fn update_with_only_unknown_keys_emits_id_only_event() {
    let (service, writer) = service();
    let ctx = RequestContext::background();
    let mut company = sample_company("some name");
    let id = service.create(&ctx, &mut company).unwrap();

    service
        .update_fields(&ctx, id, fields(json!({ "bogus": true })))
        .unwrap();

    assert_eq!(service.get(&ctx, id).unwrap(), company);
    assert_eq!(
        writer.events().last().unwrap().data,
        json!({ "id": id.to_string() })
    );
}

#[test]
fn delete_then_get_returns_not_found() {
    let (service, writer) = service();
    let ctx = RequestContext::background();
    let id = service
        .create(&ctx, &mut sample_company("some name"))
        .unwrap();

    service.delete(&ctx, id).unwrap();

    assert_eq!(
        service.get(&ctx, id).unwrap_err(),
        CompanyServiceError::NotFound(id)
    );
    let deleted = writer.events().last().unwrap().clone();
    assert_eq!(deleted.name, "CompanyDeleted");
    assert_eq!(deleted.data, json!({ "id": id.to_string() }));
}

#[test]
fn delete_unknown_id_returns_not_found() {
    let (service, writer) = service();
    let unknown = Uuid::new_v4();

    assert_eq!(
        service
            .delete(&RequestContext::background(), unknown)
            .unwrap_err(),
        CompanyServiceError::NotFound(unknown)
    );
    assert!(writer.events().is_empty());
}

#[test]
fn storage_failures_surface_as_internal_without_events() {
    let repo = BrokenRepository::default();
    let writer = RecordingWriter::default();
    let service = CompanyService::new(APP_NAME, repo.clone(), writer.clone());
    let ctx = RequestContext::background();
    let id = Uuid::new_v4();

    assert_eq!(
        service.get(&ctx, id).unwrap_err(),
        CompanyServiceError::Internal
    );
    assert_eq!(
        service
            .create(&ctx, &mut sample_company("some name"))
            .unwrap_err(),
        CompanyServiceError::Internal
    );
    assert_eq!(
        service
            .update_fields(&ctx, id, fields(json!({ "registered": true })))
            .unwrap_err(),
        CompanyServiceError::Internal
    );
    assert_eq!(
        service.delete(&ctx, id).unwrap_err(),
        CompanyServiceError::Internal
    );
    assert_eq!(
        CompanyServiceError::Internal.to_string(),
        "internal server error"
    );
    assert_eq!(repo.calls.load(Ordering::SeqCst), 4);
    assert!(writer.events().is_empty());
}

#[test]
fn notification_failure_does_not_fail_the_mutation() {
    let repo = SqliteCompanyRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let service = CompanyService::new(APP_NAME, repo, FailingWriter);
    let ctx = RequestContext::background();

    let id = service
        .create(&ctx, &mut sample_company("some name"))
        .unwrap();
    service
        .update_fields(&ctx, id, fields(json!({ "employee_cnt": 3 })))
        .unwrap();
    assert_eq!(service.get(&ctx, id).unwrap().employee_cnt, 3);
    service.delete(&ctx, id).unwrap();
}

#[test]
fn cancelled_context_fails_as_internal_and_stores_nothing() {
    let (service, writer) = service();
    let cancelled = RequestContext::background();
    cancelled.cancel();

    let mut company = sample_company("some name");
    let err = service.create(&cancelled, &mut company).unwrap_err();

    assert_eq!(err, CompanyServiceError::Internal);
    assert!(matches!(
        service.get(&RequestContext::background(), company.id),
        Err(CompanyServiceError::NotFound(_))
    ));
    assert!(writer.events().is_empty());
}

#[test]
fn channel_writer_delivers_serialized_events() {
    let repo = SqliteCompanyRepository::try_new(open_db_in_memory().unwrap()).unwrap();
    let (writer, receiver) = ChannelEventsWriter::new("companies");
    let service = CompanyService::new(APP_NAME, repo, writer);
    let ctx = RequestContext::background();

    let id = service
        .create(&ctx, &mut sample_company("some name"))
        .unwrap();
    service
        .update_fields(&ctx, id, fields(json!({ "description": "updated" })))
        .unwrap();
    service.delete(&ctx, id).unwrap();

    let names: Vec<String> = receiver
        .try_iter()
        .map(|message| {
            assert_eq!(message.topic, "companies");
            let event: MutationEvent = serde_json::from_slice(&message.payload).unwrap();
            assert_eq!(event.producer, APP_NAME);
            event.name
        })
        .collect();
    assert_eq!(names, ["CompanyCreated", "CompanyUpdated", "CompanyDeleted"]);
}

#[test]
fn one_service_serves_concurrent_callers() {
    let (service, writer) = service();
    let service = Arc::new(service);

    std::thread::scope(|scope| {
        for index in 0..8_i64 {
            let service = Arc::clone(&service);
            scope.spawn(move || {
                let ctx = RequestContext::background();
                let mut company = sample_company(&format!("company {index}"));
                let id = service.create(&ctx, &mut company).unwrap();
                service
                    .update_fields(&ctx, id, fields(json!({ "employee_cnt": index })))
                    .unwrap();
                assert_eq!(service.get(&ctx, id).unwrap().employee_cnt, index);
            });
        }
    });

    assert_eq!(writer.events().len(), 16);
}

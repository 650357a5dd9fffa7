use std::sync::Arc;

use nimbus_console::{CreateFlavor, EditFlavor, FailureMode, FlavorContext, InMemoryCloud, Operation};
use nimbus_engine::{Collaborators, Workflow, WorkflowState};
use nimbus_types::{FieldErrorKind, FormData, Requester, Resource, ResourceKind, RunOutcome};
use serde_json::json;

fn small_flavor() -> Resource {
    Resource::new("7", "m1.small")
        .with_attribute("vcpus", 1)
        .with_attribute("ram", 2048)
        .with_attribute("disk", 20)
        .with_attribute("ephemeral", 0)
        .with_attribute("swap", 0)
}

fn cloud() -> Arc<InMemoryCloud> {
    let extra_specs = json!({"hw:cpu_policy": "dedicated"}).as_object().cloned().unwrap_or_default();
    Arc::new(
        InMemoryCloud::new()
            .with_resource(ResourceKind::Flavor, Resource::new("1", "m1.tiny").with_attribute("ram", 512))
            .with_resource(ResourceKind::Flavor, small_flavor())
            .with_auxiliary(ResourceKind::Flavor, "7", extra_specs),
    )
}

fn requester() -> Requester {
    Requester::new("admin", "admin-project")
}

fn create(cloud: &Arc<InMemoryCloud>) -> Workflow<CreateFlavor> {
    Workflow::new(
        CreateFlavor::new(Collaborators::uniform(cloud.clone())),
        requester(),
        FlavorContext::default(),
    )
    .expect("valid definition")
}

fn edit(cloud: &Arc<InMemoryCloud>) -> Workflow<EditFlavor> {
    Workflow::new(
        EditFlavor::new(Collaborators::uniform(cloud.clone()), &small_flavor()),
        requester(),
        FlavorContext::editing("7"),
    )
    .expect("valid definition")
}

fn submission(name: &str) -> FormData {
    [
        ("name", name),
        ("vcpus", "2"),
        ("memory_mb", "4096"),
        ("disk_gb", "40"),
        ("eph_gb", "0"),
        ("swap_mb", "0"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn create_with_generated_identifier() {
    let cloud = cloud();
    let mut workflow = create(&cloud);

    let outcome = workflow.run(&submission("m1.large")).expect("run");

    let RunOutcome::Completed { message, entity, .. } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message, "Created flavor \"m1.large\".");
    assert_eq!(entity.name, "m1.large");
    assert_eq!(entity.attributes["ram"], 4096);
    assert!(cloud.contains(ResourceKind::Flavor, &entity.id));
}

#[test]
fn create_with_explicit_identifier() {
    let cloud = cloud();
    let mut workflow = create(&cloud);
    let mut form = submission("m1.large");
    form.insert("flavor_id", "42");

    let outcome = workflow.run(&form).expect("run");

    assert_eq!(outcome.entity().map(|flavor| flavor.id.as_str()), Some("42"));
}

#[test]
fn create_rejects_used_name_and_identifier() {
    let cloud = cloud();
    let mut workflow = create(&cloud);
    let mut form = submission("m1.small");
    form.insert("flavor_id", "7");

    let outcome = workflow.run(&form).expect("run");

    let (step, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(step, "flavor_info");
    assert_eq!(
        errors.field_messages("name"),
        ["The name \"m1.small\" is already used by another flavor."]
    );
    assert_eq!(
        errors.field_messages("flavor_id"),
        ["The ID \"7\" is already used by another flavor."]
    );
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Flavor), 0);
}

#[test]
fn create_reports_every_invalid_field() {
    let cloud = cloud();
    let mut workflow = create(&cloud);
    let mut form = submission("bad/name");
    form.insert("flavor_id", "not-an-id");
    form.insert("vcpus", "0");

    let outcome = workflow.run(&form).expect("run");

    let (_, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(
        errors.field_messages("name"),
        ["Name may only contain letters, numbers, underscores, periods and hyphens."]
    );
    assert_eq!(errors.fields["flavor_id"].len(), 1);
    assert_eq!(
        errors.field_messages("vcpus"),
        ["Ensure this value is greater than or equal to 1."]
    );
}

#[test]
fn vcpus_beyond_the_supported_range_is_a_field_error() {
    let cloud = cloud();
    let mut workflow = create(&cloud);
    let mut form = submission("m1.huge");
    form.insert("vcpus", "5000000000");

    let outcome = workflow.run(&form).expect("run");

    let (step, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(step, "flavor_info");
    assert_eq!(
        errors.field_messages("vcpus"),
        ["Ensure this value is less than or equal to 4294967295."]
    );
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Flavor), 0);
}

#[test]
fn unavailable_flavor_list_blocks_the_uniqueness_check() {
    let cloud = cloud();
    cloud.fail(Operation::List, ResourceKind::Flavor, FailureMode::Unavailable);
    let mut workflow = create(&cloud);

    let outcome = workflow.run(&submission("m1.large")).expect("run");

    let (_, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(errors.field_messages("name"), ["Unable to get flavor list."]);
    assert_eq!(errors.fields["name"][0].kind, FieldErrorKind::Unavailable);
    assert_eq!(workflow.state(), WorkflowState::Failed);
}

#[test]
fn edit_keeps_its_own_name_and_extra_specs() {
    let cloud = cloud();
    let mut workflow = edit(&cloud);

    let outcome = workflow.run(&submission("m1.small")).expect("run");

    let RunOutcome::Completed { message, entity, .. } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message, "Updated flavor \"m1.small\".");
    assert_ne!(entity.id, "7");
    assert!(!cloud.contains(ResourceKind::Flavor, "7"));
    assert_eq!(
        cloud
            .auxiliary(ResourceKind::Flavor, &entity.id)
            .and_then(|specs| specs.get("hw:cpu_policy").cloned()),
        Some(json!("dedicated"))
    );
}

#[test]
fn edit_rejects_the_name_of_another_flavor() {
    let cloud = cloud();
    let mut workflow = edit(&cloud);

    let outcome = workflow.run(&submission("m1.tiny")).expect("run");

    let (_, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(
        errors.field_messages("name"),
        ["The name \"m1.tiny\" is already used by another flavor."]
    );
    assert!(cloud.contains(ResourceKind::Flavor, "7"));
}

#[test]
fn edit_reports_partial_finalize_when_create_fails() {
    let cloud = cloud();
    cloud.fail(Operation::Create, ResourceKind::Flavor, FailureMode::Unavailable);
    let mut workflow = edit(&cloud);

    let outcome = workflow.run(&submission("m1.small")).expect("run");

    let RunOutcome::PartialFinalize {
        message,
        removed,
        replacement,
        ..
    } = outcome
    else {
        panic!("expected partial finalize");
    };
    assert_eq!(message, "Unable to update flavor.");
    assert_eq!(removed, "7");
    assert_eq!(replacement, None);
    assert!(!cloud.contains(ResourceKind::Flavor, "7"));
    assert_eq!(workflow.state(), WorkflowState::PartialFinalize);
}

#[test]
fn edit_reports_replacement_when_extra_specs_are_not_reapplied() {
    let cloud = cloud();
    cloud.fail(Operation::SetAuxiliary, ResourceKind::Flavor, FailureMode::Rejected);
    let mut workflow = edit(&cloud);

    let outcome = workflow.run(&submission("m1.small")).expect("run");

    let RunOutcome::PartialFinalize { replacement, .. } = outcome else {
        panic!("expected partial finalize");
    };
    let replacement = replacement.expect("replacement id");
    assert!(cloud.contains(ResourceKind::Flavor, &replacement));
}

#[test]
fn edit_changes_nothing_when_extra_specs_cannot_be_read() {
    let cloud = cloud();
    cloud.fail(Operation::GetAuxiliary, ResourceKind::Flavor, FailureMode::Unavailable);
    let mut workflow = edit(&cloud);

    let outcome = workflow.run(&submission("m1.small")).expect("run");

    assert!(matches!(outcome, RunOutcome::FinalizeFailed { .. }));
    assert!(cloud.contains(ResourceKind::Flavor, "7"));
    assert_eq!(cloud.call_count(Operation::Delete, ResourceKind::Flavor), 0);
}

#[test]
fn edit_render_starts_from_current_values() {
    let cloud = cloud();

    let view = edit(&cloud).render().expect("render");

    let info = view.step("flavor_info").expect("flavor step");
    assert!(info.field("flavor_id").is_none());
    assert_eq!(
        info.field("memory_mb").and_then(|field| field.initial.clone()),
        Some(nimbus_types::FieldValue::Integer(2048))
    );
}

use std::sync::Arc;

use nimbus_console::{ConsoleSettings, FailureMode, InMemoryCloud, LaunchContext, LaunchInstance, Operation};
use nimbus_engine::{Collaborators, Workflow, WorkflowState};
use nimbus_types::{
    FieldErrorKind, FieldValue, FormData, NETWORK_SERVICE_PERMISSION, Project, Requester, Resource, ResourceKind, RunOutcome,
    VOLUME_SERVICE_PERMISSION,
};

fn requester() -> Requester {
    let mut requester = Requester::new("u-1", "p-1")
        .with_permission(VOLUME_SERVICE_PERMISSION)
        .with_permission(NETWORK_SERVICE_PERMISSION);
    requester.username = "alice".into();
    requester.authorized_projects = vec![Project {
        id: "p-1".into(),
        name: "demo".into(),
    }];
    requester
}

fn cloud() -> Arc<InMemoryCloud> {
    let cloud = InMemoryCloud::new()
        .with_resource(
            ResourceKind::Image,
            Resource::new("img-1", "cirros")
                .with_attribute("status", "active")
                .with_attribute("is_public", true),
        )
        .with_resource(
            ResourceKind::Image,
            Resource::new("snap-1", "web-backup")
                .with_attribute("status", "active")
                .with_attribute("owner", "p-1")
                .with_attribute("image_type", "snapshot"),
        )
        .with_resource(
            ResourceKind::Flavor,
            Resource::new("1", "m1.tiny")
                .with_attribute("ram", 512)
                .with_attribute("vcpus", 1)
                .with_attribute("disk", 1),
        )
        .with_resource(
            ResourceKind::Flavor,
            Resource::new("2", "m1.small")
                .with_attribute("ram", 2048)
                .with_attribute("vcpus", 1)
                .with_attribute("disk", 20),
        )
        .with_resource(
            ResourceKind::AvailabilityZone,
            Resource::new("nova", "nova").with_attribute("available", true),
        )
        .with_resource(ResourceKind::Keypair, Resource::new("ops", "ops"))
        .with_resource(ResourceKind::SecurityGroup, Resource::new("sg-1", "default"))
        .with_resource(ResourceKind::Network, Resource::new("net-1", "private").with_attribute("tenant_id", "p-1"))
        .with_resource(ResourceKind::Network, Resource::new("net-2", "public").with_attribute("shared", true))
        .with_resource(ResourceKind::Network, Resource::new("net-3", "other").with_attribute("tenant_id", "p-2"))
        .with_resource(
            ResourceKind::Volume,
            Resource::new("vol-1", "data")
                .with_attribute("status", "available")
                .with_attribute("size", 10),
        )
        .with_resource(
            ResourceKind::Volume,
            Resource::new("vol-2", "busy").with_attribute("status", "in-use").with_attribute("size", 5),
        );
    Arc::new(cloud)
}

fn launch(cloud: &Arc<InMemoryCloud>, requester: &Requester) -> Workflow<LaunchInstance> {
    let definition = LaunchInstance::new(Collaborators::uniform(cloud.clone()), &ConsoleSettings::default());
    Workflow::new(definition, requester.clone(), LaunchContext::seeded_from(requester)).expect("valid definition")
}

fn image_submission() -> FormData {
    let mut form: FormData = [
        ("source_type", "image_id"),
        ("image_id", "img-1"),
        ("name", "web"),
        ("flavor", "2"),
        ("count", "1"),
        ("keypair", "ops"),
        ("groups", "default"),
        ("volume_type", ""),
    ]
    .into_iter()
    .collect();
    form.insert_many("network", ["net-1", "net-2"]);
    form
}

#[test]
fn image_launch_creates_one_server() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());

    let outcome = workflow.run(&image_submission()).expect("run");

    let RunOutcome::Completed { message, entity, warnings } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message, "Launched instance named \"web\".");
    assert!(warnings.is_empty());
    assert_eq!(entity.name, "web");
    assert_eq!(entity.attributes["image_id"], "img-1");
    assert_eq!(entity.attributes["flavor_id"], "2");
    assert_eq!(entity.attributes["key_name"], "ops");
    assert!(entity.attributes["block_device_mapping"].is_null());
    assert_eq!(entity.attributes["nics"][0]["net-id"], "net-1");
    assert_eq!(entity.attributes["nics"][1]["net-id"], "net-2");
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Server), 1);
    assert_eq!(workflow.state(), WorkflowState::Completed);
    assert_eq!(
        workflow.telemetry().invoked_steps(),
        [
            "set_instance_details",
            "set_access_controls",
            "set_network",
            "volume_options",
            "post_creation"
        ]
    );
}

#[test]
fn image_listing_is_fetched_once_per_run() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());

    workflow.run(&image_submission()).expect("run");

    assert_eq!(cloud.call_count(Operation::List, ResourceKind::Image), 1);
}

#[test]
fn boot_volume_conflicts_with_image_source() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());
    let mut form = image_submission();
    form.insert("volume_type", "volume_id");
    form.insert("volume_id", "vol-1:vol");

    let outcome = workflow.run(&form).expect("run");

    let (step, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(step, "set_instance_details");
    assert_eq!(errors.form.len(), 1);
    assert!(errors.form[0].starts_with("You can't select an instance source when booting from a Volume."));
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Server), 0);
    assert_eq!(workflow.state(), WorkflowState::Failed);
}

#[test]
fn multiple_instances_cannot_boot_from_volume() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());
    let mut form = image_submission();
    form.insert("image_id", "");
    form.insert("count", "3");
    form.insert("volume_type", "volume_id");
    form.insert("volume_id", "vol-1:vol");

    let outcome = workflow.run(&form).expect("run");

    let (step, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(step, "set_instance_details");
    assert_eq!(
        errors.form,
        ["Launching multiple instances is only supported for images and instance snapshots."]
    );
}

#[test]
fn boot_from_volume_builds_block_device_mapping() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());
    let mut form = image_submission();
    form.insert("image_id", "");
    form.insert("volume_type", "volume_id");
    form.insert("volume_id", "vol-1:vol");
    form.insert("delete_on_terminate", "true");

    let outcome = workflow.run(&form).expect("run");

    let entity = outcome.entity().expect("server");
    assert!(entity.attributes["image_id"].is_null());
    assert_eq!(entity.attributes["block_device_mapping"]["vda"], "vol-1:vol::1");
}

#[test]
fn volume_choice_is_required_once_volume_boot_is_selected() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());
    let mut form = image_submission();
    form.insert("image_id", "");
    form.insert("volume_type", "volume_snapshot_id");

    let outcome = workflow.run(&form).expect("run");

    let (step, errors) = outcome.step_errors().expect("validation failure");
    assert_eq!(step, "volume_options");
    assert_eq!(errors.form, ["Please choose a volume, or select Don't boot from a volume."]);
}

#[test]
fn flavor_listing_failure_halts_before_finalize() {
    let cloud = cloud();
    cloud.fail(Operation::List, ResourceKind::Flavor, FailureMode::Unavailable);
    let mut workflow = launch(&cloud, &requester());

    let outcome = workflow.run(&image_submission()).expect("run");

    let RunOutcome::Failed { step, errors, warnings } = outcome else {
        panic!("expected validation failure");
    };
    assert_eq!(step, "set_instance_details");
    assert_eq!(errors.field_messages("flavor"), ["Unable to retrieve instance flavors."]);
    assert_eq!(errors.fields["flavor"][0].kind, FieldErrorKind::Unavailable);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field.as_deref(), Some("flavor"));
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Server), 0);
}

#[test]
fn unclassified_failure_aborts_the_run() {
    let cloud = cloud();
    cloud.fail(Operation::List, ResourceKind::Keypair, FailureMode::Unexpected);
    let mut workflow = launch(&cloud, &requester());

    let error = workflow.run(&image_submission()).expect_err("unexpected failure");

    assert!(error.to_string().contains("set_access_controls"));
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Server), 0);
}

#[test]
fn disabled_services_are_never_consulted() {
    let cloud = cloud();
    let requester = Requester::new("u-1", "p-1");
    let mut workflow = launch(&cloud, &requester);
    let mut form = image_submission();
    form.insert("volume_type", "volume_id");

    let outcome = workflow.run(&form).expect("run");

    assert!(outcome.is_completed(), "{:?}", outcome);
    assert_eq!(workflow.telemetry().skipped_steps(), ["select_project_user", "set_network", "volume_options"]);
    assert_eq!(cloud.call_count(Operation::List, ResourceKind::Network), 0);
    assert_eq!(cloud.call_count(Operation::List, ResourceKind::Volume), 0);
    assert_eq!(cloud.call_count(Operation::List, ResourceKind::VolumeSnapshot), 0);
    assert_eq!(workflow.context().network_ids, None);
    assert_eq!(workflow.context().boot_volume, None);

    let entity = outcome.entity().expect("server");
    assert!(entity.attributes["nics"].is_null());
    assert!(entity.attributes["block_device_mapping"].is_null());
}

#[test]
fn finalize_failure_reports_the_failure_message() {
    let cloud = cloud();
    cloud.fail(Operation::Create, ResourceKind::Server, FailureMode::Rejected);
    let mut workflow = launch(&cloud, &requester());
    let mut form = image_submission();
    form.insert("count", "2");

    let outcome = workflow.run(&form).expect("run");

    let RunOutcome::FinalizeFailed { message, .. } = outcome else {
        panic!("expected finalize failure");
    };
    assert_eq!(message, "Unable to launch 2 instances named \"web\".");
    assert_eq!(workflow.state(), WorkflowState::FinalizeFailed);
}

#[test]
fn render_presents_enabled_steps_with_initial_values() {
    let cloud = cloud();
    let mut workflow = launch(&cloud, &requester());

    let view = workflow.render().expect("render");

    assert!(view.step("select_project_user").is_none());
    let details = view.step("set_instance_details").expect("details step");
    let images = &details.field("image_id").expect("image field").choices;
    assert_eq!(images[0].label, "Select Image");
    assert_eq!(images[1].value, "img-1");
    assert_eq!(images.len(), 2);
    let snapshots = &details.field("instance_snapshot_id").expect("snapshot field").choices;
    assert_eq!(snapshots[1].value, "snap-1");
    assert_eq!(details.field("count").and_then(|field| field.initial.clone()), Some(FieldValue::Integer(1)));

    let flavors: Vec<&str> = details
        .field("flavor")
        .expect("flavor field")
        .choices
        .iter()
        .map(|choice| choice.label.as_str())
        .collect();
    assert_eq!(flavors, ["m1.tiny", "m1.small"]);

    let access = view.step("set_access_controls").expect("access step");
    assert_eq!(
        access.field("keypair").and_then(|field| field.initial.clone()),
        Some(FieldValue::Choice("ops".into()))
    );

    let networks: Vec<&str> = view
        .step("set_network")
        .and_then(|step| step.field("network"))
        .expect("network field")
        .choices
        .iter()
        .map(|choice| choice.value.as_str())
        .collect();
    assert_eq!(networks, ["net-1", "net-2"]);

    let volumes = &view
        .step("volume_options")
        .and_then(|step| step.field("volume_id"))
        .expect("volume field")
        .choices;
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[1].value, "vol-1:vol");
    assert_eq!(volumes[1].label, "data - 10 GB (Volume)");

    assert_eq!(workflow.state(), WorkflowState::Created);
    assert_eq!(cloud.call_count(Operation::Create, ResourceKind::Server), 0);
}

#[test]
fn rendering_twice_yields_the_same_choices() {
    let cloud = cloud();

    let first = launch(&cloud, &requester()).render().expect("first render");
    let second = launch(&cloud, &requester()).render().expect("second render");

    assert_eq!(first, second);
}

#[test]
fn degraded_optional_choices_render_with_a_warning() {
    let cloud = cloud();
    cloud.fail(Operation::List, ResourceKind::AvailabilityZone, FailureMode::Unavailable);

    let view = launch(&cloud, &requester()).render().expect("render");

    let zones = &view
        .step("set_instance_details")
        .and_then(|step| step.field("availability_zone"))
        .expect("zone field")
        .choices;
    assert!(zones.is_empty());
    assert_eq!(view.warnings.len(), 1);
    assert_eq!(view.warnings[0].message, "Unable to retrieve availability zones.");
}

#[test]
fn render_leaves_no_listings_or_warnings_for_the_run() {
    let cloud = cloud();
    cloud.fail(Operation::List, ResourceKind::AvailabilityZone, FailureMode::Unavailable);
    let mut workflow = launch(&cloud, &requester());

    let view = workflow.render().expect("render");
    let outcome = workflow.run(&image_submission()).expect("run");

    assert_eq!(view.warnings.len(), 1);
    let RunOutcome::Completed { warnings, .. } = outcome else {
        panic!("expected completion");
    };
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message, "Unable to retrieve availability zones.");
    assert_eq!(cloud.call_count(Operation::List, ResourceKind::Image), 2);
}

//! Building, sharing and closing a composition

mod common;

use std::sync::Arc;

use common::*;
use partwire::{
    CompositionFailure, CompositionHelper, ConfigureError, ExportError, HostDisposed, HostState,
    TypeInfo,
};

fn lifecycle_helper(log: &Arc<EventLog>) -> CompositionHelper {
    let mut helper = CompositionHelper::new();
    helper
        .add_assembly(lifecycle_assembly(), [])
        .unwrap()
        .compose_export(log.clone())
        .unwrap();
    helper
}

#[test]
fn shared_part_is_constructed_once() {
    let log = Arc::new(EventLog::default());
    let helper = lifecycle_helper(&log);

    let first = helper.get_export::<Session>().unwrap();
    let second = helper.get_export::<Session>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(log.count("construct session"), 1);
    assert_eq!(log.count("construct connection"), 1);
}

#[test]
fn shared_part_is_the_same_instance_for_all_its_contracts() {
    let log = Arc::new(EventLog::default());
    let helper = lifecycle_helper(&log);

    let connection = helper.get_export::<Connection>().unwrap();
    let tracked = helper.get_export::<dyn Tracked>().unwrap();
    let session = helper.get_export::<Session>().unwrap();

    assert_eq!(
        Arc::as_ptr(&connection) as *const (),
        Arc::as_ptr(&tracked) as *const ()
    );
    assert!(Arc::ptr_eq(&connection, &session.connection));
    assert_eq!(tracked.label(), "connection");
}

#[test]
fn non_shared_part_is_constructed_for_every_request() {
    let log = Arc::new(EventLog::default());
    let helper = lifecycle_helper(&log);

    let first = helper.get_export::<Request>().unwrap();
    let second = helper.get_export::<Request>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(log.count("construct request"), 2);
}

#[test]
fn separate_helpers_do_not_share_instances() {
    let log = Arc::new(EventLog::default());
    let first = lifecycle_helper(&log);
    let second = lifecycle_helper(&log);

    let a = first.get_export::<Connection>().unwrap();
    let b = second.get_export::<Connection>().unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn close_disposes_shared_parts_in_reverse_creation_order_then_owned_overrides() {
    let log = Arc::new(EventLog::default());
    let mut helper = lifecycle_helper(&log);
    helper
        .compose_disposable_export(Arc::new(OwnedResource {
            name: "first resource",
            log: log.clone(),
        }))
        .unwrap()
        .compose_disposable_export(Arc::new(OwnedResource {
            name: "second resource",
            log: log.clone(),
        }))
        .unwrap();

    helper.get_export::<Session>().unwrap();
    helper.get_export::<Request>().unwrap();
    helper.close();

    assert_eq!(
        log.events(),
        vec![
            "construct connection",
            "construct session",
            "construct request",
            "dispose session",
            "dispose connection",
            "dispose second resource",
            "dispose first resource",
        ]
    );
}

#[test]
fn close_leaves_borrowed_overrides_and_unused_parts_alone() {
    let log = Arc::new(EventLog::default());
    let helper = lifecycle_helper(&log);

    helper.get_export::<Request>().unwrap();
    helper.close();

    assert_eq!(log.events(), vec!["construct request"]);
}

#[test]
fn close_is_idempotent() {
    let log = Arc::new(EventLog::default());
    let helper = lifecycle_helper(&log);
    helper.get_export::<Connection>().unwrap();

    helper.close();
    helper.close();

    assert_eq!(log.count("dispose connection"), 1);
    assert_eq!(helper.state(), HostState::Disposed);
}

#[test]
fn close_before_build_runs_no_release_hooks() {
    let log = Arc::new(EventLog::default());
    let mut helper = lifecycle_helper(&log);
    helper
        .compose_disposable_export(Arc::new(OwnedResource {
            name: "resource",
            log: log.clone(),
        }))
        .unwrap();

    helper.close();

    assert!(log.events().is_empty());
    assert_eq!(helper.state(), HostState::Disposed);
}

#[test]
fn every_operation_fails_after_close() {
    let log = Arc::new(EventLog::default());
    let mut helper = lifecycle_helper(&log);
    helper.get_export::<Connection>().unwrap();
    helper.close();

    assert!(matches!(
        helper.get_export::<Connection>(),
        Err(ExportError::Disposed(HostDisposed))
    ));
    assert!(matches!(
        helper.get_exports::<Connection>(),
        Err(ExportError::Disposed(HostDisposed))
    ));
    assert!(matches!(
        helper.try_get_export::<Connection>(),
        Err(HostDisposed)
    ));
    assert!(matches!(helper.build(), Err(ExportError::Disposed(_))));
    assert_eq!(helper.exportable_types(), Err(HostDisposed));
    assert_eq!(
        helper.add_part::<Request>().err(),
        Some(ConfigureError::Disposed(HostDisposed))
    );
}

#[test]
fn host_taken_before_close_reports_the_close() {
    let log = Arc::new(EventLog::default());
    let helper = lifecycle_helper(&log);
    let host = helper.host().unwrap();
    assert!(!host.is_disposed());

    helper.close();

    assert!(host.is_disposed());
    assert_eq!(helper.state(), HostState::Disposed);
    assert!(matches!(
        host.get_export(&partwire::Contract::of::<Connection>()),
        Err(ExportError::Disposed(HostDisposed))
    ));
}

#[test]
fn drop_runs_no_release_hooks() {
    let log = Arc::new(EventLog::default());
    {
        let mut helper = lifecycle_helper(&log);
        helper
            .compose_disposable_export(Arc::new(OwnedResource {
                name: "resource",
                log: log.clone(),
            }))
            .unwrap();
        helper.get_export::<Session>().unwrap();
    }

    assert_eq!(
        log.events(),
        vec!["construct connection", "construct session"]
    );
}

#[test]
fn configuration_is_rejected_once_built() {
    let log = Arc::new(EventLog::default());
    let mut helper = lifecycle_helper(&log);
    assert_eq!(helper.state(), HostState::Unbuilt);

    helper.get_export::<Request>().unwrap();

    assert_eq!(helper.state(), HostState::Built);
    assert_eq!(
        helper.add_assembly(test_assembly(), []).err(),
        Some(ConfigureError::AlreadyBuilt)
    );
    assert_eq!(
        helper.compose_export(stub()).err(),
        Some(ConfigureError::AlreadyBuilt)
    );
    assert_eq!(
        helper.add_part::<Request>().err(),
        Some(ConfigureError::AlreadyBuilt)
    );
}

#[test]
fn failed_build_can_be_fixed_and_retried() {
    let log = Arc::new(EventLog::default());
    let mut helper = CompositionHelper::new();
    helper.add_assembly(lifecycle_assembly(), []).unwrap();

    let result = helper.get_export::<Request>();

    assert!(matches!(
        result,
        Err(ExportError::Composition(CompositionFailure::DependencyGraph(_)))
    ));
    assert_eq!(helper.state(), HostState::Unbuilt);
    assert!(helper.try_get_export::<Request>().unwrap().is_none());

    helper.compose_export(log.clone()).unwrap();

    assert!(helper.get_export::<Request>().is_ok());
    assert_eq!(helper.state(), HostState::Built);
}

#[test]
fn build_is_explicit_and_reports_failures() {
    let mut helper = CompositionHelper::new();
    helper
        .add_assembly(lifecycle_assembly(), [TypeInfo::of::<Request>()])
        .unwrap();

    match helper.build() {
        Err(ExportError::Composition(CompositionFailure::DependencyGraph(errors))) => {
            // Connection and Session both miss the log
            assert_eq!(errors.errors.len(), 2);
        }
        other => panic!("expected a dependency graph failure, got {other:?}"),
    }
}

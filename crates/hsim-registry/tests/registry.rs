//! Registry Test Suite
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_duplicate_add_keeps_original` | Second add under a tag fails, first survives |
//! | `test_lookup_miss_is_absent` | Misses return `None` |
//! | `test_session_from_definitions` | Filters, controls and sites built from TOML |
//! | `test_clear_terminates_links_once` | Sites and controls share one link |
//! | `test_site_errors` | Unknown family, missing control, rejected sizes |

use hsim_control::SimFeAdapter;
use hsim_core::{
    DaqResponse, ErrorCategory, ExperimentalControl, ExperimentalSite, Namespace, RegistryError, ResponseKind,
    ResponseQuery, SizeSpec, TrialResponse,
};
use hsim_registry::{Definitions, LocalSite, Registry, SiteDefinition};
use hsim_transport::mock::{self, Message};

// =============================================================================
// Helpers
// =============================================================================

fn adapter(tag: i32, label: &str) -> (Box<dyn ExperimentalControl>, mock::PeerHarness) {
    let (channel, harness) = mock::pair_labelled(label);
    let control: Box<dyn ExperimentalControl> =
        Box::new(SimFeAdapter::with_data_size(tag, Box::new(channel), 4));
    (control, harness)
}

fn definitions(text: &str) -> Definitions {
    toml::from_str(text).unwrap()
}

const SESSION: &str = r#"
    [[filters]]
    tag = 1
    type = "linear"
    gain = 2.0

    [[controls]]
    tag = 1
    type = "SimFEAdapter"
    [controls.config]
    mock = true
    mock_stiffness = 10.0
    data_size = 8
    daq_filters = { force = 1 }

    [[sites]]
    tag = 5
    control = 1
    trial = { disp = 1 }
    daq = { disp = 1, force = 1 }
"#;

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_duplicate_add_keeps_original() {
    let registry = Registry::new();
    let (first, _first_peer) = adapter(3, "first");
    let (second, second_peer) = adapter(3, "second");

    registry.add_control(3, first).unwrap();
    let err = registry.add_control(3, second).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::DuplicateTag {
            namespace: Namespace::Controls,
            tag: 3
        }
    ));
    assert_eq!(err.category(), ErrorCategory::Registry);

    let kept = registry.control(3).unwrap();
    assert!(kept.lock().to_string().contains("peer: first"));

    // The rejected control was dropped and sent its terminate message.
    assert_eq!(second_peer.recv().and_then(|m| m.opcode()), Some(99.0));
    assert_eq!(second_peer.recv(), None);
}

#[test]
fn test_lookup_miss_is_absent() {
    let registry = Registry::with_builtin_factories();
    assert!(registry.control(99).is_none());
    assert!(registry.site(99).is_none());
    assert!(registry.filter(99).is_none());
    assert_eq!(registry.families(), vec!["SimFEAdapter", "xPCtarget"]);
}

#[test]
fn test_session_from_definitions() {
    let registry = Registry::with_builtin_factories();
    registry.load(&definitions(SESSION)).unwrap();

    let site = registry.site(5).unwrap();
    let mut site = site.lock();
    assert_eq!(site.family(), "LocalSite");
    let (trial, daq) = site.sizes().unwrap();
    assert_eq!(trial, SizeSpec::new().with(ResponseKind::Displacement, 1));
    assert_eq!(daq.get(ResponseKind::Force), 1);

    site.setup().unwrap();
    site.set_trial_response(&TrialResponse::new().disp(&[0.5])).unwrap();
    let mut disp = [0.0];
    let mut force = [0.0];
    site.get_daq_response(&mut DaqResponse::new().disp(&mut disp).force(&mut force))
        .unwrap();
    site.commit_state().unwrap();

    // force = 2.0 * (10.0 * 0.5) through the daq filter
    assert_eq!(disp, [0.5]);
    assert_eq!(force, [10.0]);
}

#[test]
fn test_clear_terminates_links_once() {
    let registry = Registry::new();
    let (control, harness) = adapter(1, "shared");
    registry.add_control(1, control).unwrap();

    let copy = registry.control(1).unwrap().lock().get_copy();
    let mut site = LocalSite::new(2, copy);
    site.set_size(
        SizeSpec::new().with(ResponseKind::Displacement, 1),
        SizeSpec::new()
            .with(ResponseKind::Displacement, 1)
            .with(ResponseKind::Force, 1),
    )
    .unwrap();
    site.setup().unwrap();
    assert!(matches!(harness.try_next(), Some(Message::Id(_))));
    assert_eq!(site.response(ResponseQuery::Target(ResponseKind::Displacement)), Some(vec![0.0]));
    registry.add_site(2, Box::new(site)).unwrap();

    registry.clear();
    let dies = harness
        .drain()
        .into_iter()
        .filter(|m| m.opcode() == Some(99.0))
        .count();
    assert_eq!(dies, 1);
    assert!(registry.control(1).is_none());
    assert!(registry.site(2).is_none());
}

#[test]
fn test_site_errors() {
    let registry = Registry::with_builtin_factories();
    registry.load(&definitions(SESSION)).unwrap();

    let unknown = SiteDefinition {
        tag: 6,
        family: "ActorSite".to_string(),
        control: 1,
        trial: SizeSpec::new(),
        daq: SizeSpec::new(),
    };
    assert!(matches!(
        registry.create_site(&unknown),
        Err(RegistryError::UnknownFamily {
            namespace: Namespace::Sites,
            ..
        })
    ));

    let missing = SiteDefinition {
        family: "LocalSite".to_string(),
        control: 42,
        ..unknown.clone()
    };
    assert!(matches!(
        registry.create_site(&missing),
        Err(RegistryError::NotFound {
            namespace: Namespace::Controls,
            tag: 42
        })
    ));

    let no_force = SiteDefinition {
        control: 1,
        trial: SizeSpec::new().with(ResponseKind::Displacement, 1),
        daq: SizeSpec::new().with(ResponseKind::Displacement, 1),
        ..missing
    };
    let err = registry.create_site(&no_force).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(registry.site(6).is_none());
}

#[test]
fn test_unknown_control_family() {
    let registry = Registry::with_builtin_factories();
    let defs = definitions("[[controls]]\ntag = 1\ntype = \"ECxPCtarget2\"");
    let err = registry.check(&defs).unwrap_err();
    assert_eq!(err.to_string(), "unknown control type 'ECxPCtarget2'");
    assert!(registry.control(1).is_none());
}

#[test]
fn test_missing_filter_reference() {
    let registry = Registry::with_builtin_factories();
    let defs = definitions(
        "[[controls]]\ntag = 1\ntype = \"SimFEAdapter\"\n[controls.config]\nmock = true\nctrl_filters = { disp = 3 }",
    );
    let err = registry.load(&defs).unwrap_err();
    assert_eq!(err.to_string(), "filter with tag 3 not found");
}

mod common;

use callback_chain::config::{EngineConfig, Environment};
use callback_chain::{Action, CallbackError, Concern, FilterSpec, Guard, HaltPolicy, Outcome};
use common::{engine_with_config, engine_with_events, mark, unit, Doc};
use rstest::rstest;
use serial_test::serial;
use std::fs;

fn falsy() -> Action<Doc, i32> {
    Action::inline(|doc: &mut Doc| {
        doc.trace.push("falsy".to_string());
        Ok(Outcome::from_bool(doc.flag))
    })
}

#[rstest]
#[case::explicit_ignores_false(HaltPolicy::Explicit, false, false)]
#[case::legacy_halts_on_false(HaltPolicy::LegacyFalsy, false, true)]
#[case::legacy_continues_on_true(HaltPolicy::LegacyFalsy, true, false)]
fn test_before_false_follows_policy(#[case] policy: HaltPolicy, #[case] flag: bool, #[case] halts: bool) {
    let mut config = EngineConfig::default();
    config.engine.halt_policy = policy;
    let (engine, class) = engine_with_config(&config, &["save"]);
    engine.attach(class, "save", FilterSpec::before(falsy())).unwrap();
    engine.attach(class, "save", FilterSpec::after(mark("a"))).unwrap();

    let mut doc = Doc::new(class);
    doc.flag = flag;
    let outcome = engine.run_event(&mut doc, "save", unit(4)).unwrap();

    assert_eq!(outcome.is_halted(), halts);
    if halts {
        assert_eq!(doc.trace, vec!["falsy"]);
        assert_eq!(outcome.value, None);
    } else {
        assert_eq!(doc.trace, vec!["falsy", "unit", "a"]);
        assert_eq!(outcome.value, Some(4));
    }
}

#[rstest]
#[case(HaltPolicy::Explicit)]
#[case(HaltPolicy::LegacyFalsy)]
fn test_after_false_never_halts(#[case] policy: HaltPolicy) {
    let mut config = EngineConfig::default();
    config.engine.halt_policy = policy;
    let (engine, class) = engine_with_config(&config, &["save"]);
    engine.attach(class, "save", FilterSpec::after(falsy())).unwrap();
    engine.attach(class, "save", FilterSpec::after(mark("a"))).unwrap();

    let mut doc = Doc::new(class);
    let outcome = engine.run_event(&mut doc, "save", unit(4)).unwrap();

    assert!(!outcome.is_halted());
    assert_eq!(doc.trace, vec!["unit", "falsy", "a"]);
}

#[test]
#[serial]
fn test_engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("production.toml"),
        "[engine]\nhalt_policy = \"legacy_falsy\"\n\n[pool]\ninitial_capacity = 2\nmax_free = 2\n",
    )
    .unwrap();

    let config = EngineConfig::load_from_dir(dir.path(), Environment::Production).unwrap();
    let (engine, class) = engine_with_config(&config, &["save"]);
    assert_eq!(engine.halt_policy(), HaltPolicy::LegacyFalsy);
    assert_eq!(engine.pool_stats().allocated, 2);
    assert_eq!(engine.pool_stats().free, 2);

    let mut doc = Doc::new(class);
    engine.run_event(&mut doc, "save", unit(1)).unwrap();
    assert_eq!(engine.pool_stats().allocated, 2);
}

#[test]
fn test_named_guards_and_methods() {
    let (engine, record) = engine_with_events(&["save"]);
    let post = engine.register_class("Post", Some(record)).unwrap();
    engine.define_predicate(record, "flagged", |doc: &Doc| doc.flag).unwrap();
    engine
        .define_method(
            record,
            "stamp",
            callback_chain::Callable::simple(|doc: &mut Doc| {
                doc.score += 10;
                Ok(Outcome::Continue)
            }),
        )
        .unwrap();

    // 子類別可以引用祖先定義的方法與謂詞
    engine
        .attach(
            post,
            "save",
            FilterSpec::before(Action::method("stamp")).guard(Guard::unless_method("flagged")),
        )
        .unwrap();

    let mut doc = Doc::new(post);
    engine.run_event(&mut doc, "save", |doc| doc.score).unwrap();
    assert_eq!(doc.score, 10);

    doc.flag = true;
    let outcome = engine.run_event(&mut doc, "save", |doc| doc.score).unwrap();
    assert_eq!(outcome.value, Some(10));

    assert!(matches!(
        engine.attach(post, "save", FilterSpec::before(mark("x")).guard(Guard::if_method("missing"))),
        Err(CallbackError::UnknownMethod { .. })
    ));
}

#[test]
fn test_around_method_shape_is_checked() {
    let (engine, class) = engine_with_events(&["save"]);
    engine
        .define_method(
            class,
            "plain",
            callback_chain::Callable::simple(|_: &mut Doc| Ok(Outcome::Continue)),
        )
        .unwrap();

    assert!(matches!(
        engine.attach(class, "save", FilterSpec::around(Action::method("plain"))),
        Err(CallbackError::InvalidFilter(_))
    ));
    assert_eq!(engine.chain_version(class, "save").unwrap(), 0);
}

#[test]
fn test_concern_applies_to_each_class_once() {
    let (engine, record) = engine_with_events(&["save"]);
    let comment = engine.register_class("Comment", None).unwrap();

    engine
        .define_concern(
            Concern::new("trackable")
                .event("save")
                .event("touch")
                .filter("save", FilterSpec::after(mark("track")))
                .filter("touch", FilterSpec::before(mark("touched"))),
        )
        .unwrap();
    assert!(matches!(
        engine.define_concern(Concern::new("trackable")),
        Err(CallbackError::DuplicateDefinition(_))
    ));

    for class in [record, comment] {
        assert!(engine.include_concern(class, "trackable").unwrap());
        assert!(!engine.include_concern(class, "trackable").unwrap());
        assert_eq!(engine.events(class).unwrap(), vec!["save", "touch"]);
    }

    let mut doc = Doc::new(comment);
    engine.run_event(&mut doc, "save", unit(1)).unwrap();
    engine.run_event(&mut doc, "touch", unit(1)).unwrap();
    assert_eq!(doc.trace, vec!["unit", "track", "touched", "unit"]);

    assert!(matches!(
        engine.include_concern(record, "searchable"),
        Err(CallbackError::UnknownConcern(_))
    ));
}

#[test]
fn test_failed_concern_include_leaves_chain_untouched() {
    let (engine, class) = engine_with_events(&["save"]);
    engine
        .define_concern(
            Concern::new("stamped")
                .filter("save", FilterSpec::before(mark("first")))
                .filter("save", FilterSpec::after(Action::method("stamp"))),
        )
        .unwrap();

    assert!(matches!(
        engine.include_concern(class, "stamped"),
        Err(CallbackError::UnknownMethod { .. })
    ));
    assert_eq!(engine.chain_len(class, "save").unwrap(), 0);
    assert!(engine.included_concerns(class).is_empty());

    engine
        .define_method(
            class,
            "stamp",
            callback_chain::Callable::simple(|doc: &mut Doc| {
                doc.trace.push("stamp".to_string());
                Ok(Outcome::Continue)
            }),
        )
        .unwrap();
    assert!(engine.include_concern(class, "stamped").unwrap());
    assert_eq!(engine.chain_len(class, "save").unwrap(), 2);

    let mut doc = Doc::new(class);
    engine.run_event(&mut doc, "save", unit(1)).unwrap();
    assert_eq!(doc.trace, vec!["first", "unit", "stamp"]);
}

#[test]
fn test_concern_included_by_ancestor_is_not_reapplied() {
    let (engine, record) = engine_with_events(&["save"]);
    let post = engine.register_class("Post", Some(record)).unwrap();
    engine
        .define_method(
            record,
            "audit",
            callback_chain::Callable::simple(|doc: &mut Doc| {
                doc.trace.push("audit".to_string());
                Ok(Outcome::Continue)
            }),
        )
        .unwrap();
    engine
        .define_concern(Concern::new("audited").filter("save", FilterSpec::after(Action::method("audit"))))
        .unwrap();

    assert!(engine.include_concern(record, "audited").unwrap());
    assert!(!engine.include_concern(post, "audited").unwrap());

    let mut doc = Doc::new(post);
    engine.run_event(&mut doc, "save", unit(1)).unwrap();
    assert_eq!(doc.trace, vec!["unit", "audit"]);
}

#[test]
fn test_reset_event_keeps_event_defined() {
    let (engine, class) = engine_with_events(&["save"]);
    engine.attach(class, "save", FilterSpec::before(mark("b"))).unwrap();
    assert_eq!(engine.reset_event(class, "save").unwrap(), 2);

    let mut doc = Doc::new(class);
    let outcome = engine.run_event(&mut doc, "save", unit(6)).unwrap();
    assert_eq!(doc.trace, vec!["unit"]);
    assert_eq!(outcome.value, Some(6));
    assert_eq!(engine.chain_len(class, "save").unwrap(), 0);
}

#[test]
fn test_description_serializes() {
    let (engine, class) = engine_with_events(&["save"]);
    engine
        .define_method(class, "audit", callback_chain::Callable::simple(|_: &mut Doc| Ok(Outcome::Continue)))
        .unwrap();
    engine.attach(class, "save", FilterSpec::after(Action::method("audit"))).unwrap();
    engine
        .attach(class, "save", FilterSpec::before(mark("b")).when(|doc: &Doc| doc.flag))
        .unwrap();

    let json = serde_json::to_value(engine.describe(class, "save").unwrap()).unwrap();
    assert_eq!(json["event"], "save");
    assert_eq!(json["version"], 2);
    assert_eq!(json["filters"][0]["kind"], "after");
    assert_eq!(json["filters"][1]["guards"], 1);
}

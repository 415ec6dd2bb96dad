// tests/properties.rs

use proptest::prelude::*;
use serde_json::{Value, json};

use launchkit::app::Application;
use launchkit::context::{ArgSegment, LaunchArgs, LaunchContext};
use launchkit::hooks::{HookCatalog, HookKind};
use launchkit_test_utils::recording::{HookLog, recording_hook};

// Arbitrarily nested JSON arrays of short string tokens.
fn nested_strategy() -> impl Strategy<Value = Value> {
    let leaf = "[a-z0-9-]{1,6}".prop_map(Value::String);
    leaf.prop_recursive(4, 32, 4, |inner| {
        proptest::collection::vec(inner, 0..4).prop_map(Value::Array)
    })
}

fn depth_first(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| depth_first(item, out)),
        _ => unreachable!(),
    }
}

proptest! {
    #[test]
    fn flattening_preserves_depth_first_order(
        items in proptest::collection::vec(nested_strategy(), 0..6)
    ) {
        let value = Value::Array(items.clone());
        let args = LaunchArgs::from_nested(&value).unwrap();

        let mut expected = Vec::new();
        depth_first(&value, &mut expected);
        prop_assert_eq!(args.flatten(), expected);
        prop_assert!(args.segments().iter().all(|segment| !segment.is_empty()));
    }

    #[test]
    fn inserted_segments_stay_contiguous(
        base in proptest::collection::vec(proptest::collection::vec("[a-z]{1,4}", 1..4), 1..5),
        inserts in proptest::collection::vec(
            (any::<prop::sample::Index>(), proptest::collection::vec("[A-Z]{1,4}", 1..4)),
            0..5,
        ),
    ) {
        let mut args = LaunchArgs::new();
        for segment in &base {
            args.push_segment(ArgSegment::new(segment.clone()));
        }
        for (index, tokens) in &inserts {
            let at = index.index(args.segments().len() + 1);
            args.insert_segment(at, ArgSegment::new(tokens.clone()));
        }

        let flat = args.flatten();
        for segment in base.iter().chain(inserts.iter().map(|(_, tokens)| tokens)) {
            let found = flat
                .windows(segment.len())
                .any(|window| window == segment.as_slice());
            prop_assert!(found, "segment {:?} was split in {:?}", segment, flat);
        }
        prop_assert_eq!(
            flat.len(),
            base.iter().map(Vec::len).sum::<usize>()
                + inserts.iter().map(|(_, t)| t.len()).sum::<usize>()
        );
    }

    #[test]
    fn hooks_run_by_order_then_declaration(
        orders in proptest::collection::vec(proptest::option::of(-5i32..5), 0..12)
    ) {
        let log = HookLog::new();
        let hooks = orders
            .iter()
            .enumerate()
            .map(|(i, order)| {
                let hook = recording_hook(&log, &format!("hook-{i}"), HookKind::Pre);
                match order {
                    Some(order) => hook.with_order(*order),
                    None => hook,
                }
            })
            .collect();
        let mut ctx = LaunchContext::builder(Application::new("maya", "2025"))
            .hooks(HookCatalog::new().with_hooks("generated", hooks))
            .build();
        ctx.run_prelaunch_hooks().unwrap();

        let mut ordered: Vec<(i32, usize)> = orders
            .iter()
            .enumerate()
            .filter_map(|(i, order)| order.map(|o| (o, i)))
            .collect();
        ordered.sort();
        let expected: Vec<String> = ordered
            .into_iter()
            .map(|(_, i)| i)
            .chain(
                orders
                    .iter()
                    .enumerate()
                    .filter(|(_, order)| order.is_none())
                    .map(|(i, _)| i),
            )
            .map(|i| format!("hook-{i}"))
            .collect();
        prop_assert_eq!(log.entries(), expected);
    }
}

#[test]
fn top_level_string_is_a_single_token() {
    let args = LaunchArgs::from_nested(&json!("-batch")).unwrap();
    assert_eq!(args.flatten(), vec!["-batch"]);
}

#[test]
fn objects_are_rejected() {
    assert!(LaunchArgs::from_nested(&json!([{"flag": true}])).is_err());
    assert!(LaunchArgs::from_nested(&json!([null])).is_err());
}

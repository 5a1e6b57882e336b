use std::collections::HashMap;

use memento::memo::{MemoConfig, MemoTable, Scope, StaticMethod};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

/// Collect counter values keyed by `name{label=value,...}`.
fn counters(recorder: &DebuggingRecorder) -> HashMap<String, u64> {
    recorder
        .snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| {
            let DebugValue::Counter(count) = value else {
                return None;
            };
            let key = composite_key.key();
            let mut labels: Vec<String> = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            labels.sort();
            Some((format!("{}{{{}}}", key.name(), labels.join(",")), count))
        })
        .collect()
}

fn table(config: MemoConfig) -> std::sync::Arc<MemoTable> {
    MemoTable::builder("Metered")
        .define(Scope::Static, ["no_args", "fails"])
        .memoize(Scope::Static, ["no_args", "fails"])
        .config(config)
        .build()
        .expect("valid declarations")
}

#[test]
fn memo_calls_emit_expected_counters() {
    let recorder = DebuggingRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let table = table(MemoConfig::default());
        let no_args = StaticMethod::new(&table, "no_args", |_: &()| "value".to_string())
            .expect("static no_args");
        let fails = StaticMethod::fallible(&table, "fails", |_: &()| Err::<u8, _>("boom"))
            .expect("static fails");

        no_args.call(());
        no_args.call(());
        no_args.call(());
        assert!(fails.try_call(()).is_err());
        table.reset_static();
    });

    let counters = counters(&recorder);

    assert_eq!(
        counters.get("memento_miss_total{operation=no_args,scope=static}"),
        Some(&1)
    );
    assert_eq!(
        counters.get("memento_hit_total{operation=no_args,scope=static}"),
        Some(&2)
    );
    assert_eq!(
        counters.get("memento_failure_total{operation=fails,scope=static}"),
        Some(&1)
    );
    assert_eq!(
        counters.get("memento_reset_total{kind=all,scope=static}"),
        Some(&1)
    );
}

#[test]
fn metrics_can_be_switched_off() {
    let recorder = DebuggingRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let table = table(MemoConfig {
            record_metrics: false,
            ..MemoConfig::default()
        });
        let no_args = StaticMethod::new(&table, "no_args", |_: &()| 1u8).expect("static no_args");
        no_args.call(());
        no_args.call(());
        table.reset_static();
    });

    assert!(counters(&recorder).is_empty());
}

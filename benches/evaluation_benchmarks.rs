use criterion::{Criterion, criterion_group, criterion_main};
use reforge::{
    ConditionalValue, ConfigRow, ConfigValue, Contexts, Operator, Resolver, RuntimeConfig, ValueType, WeightedValue,
    encrypt, generate_new_hex_key, stable_hash32,
};
use std::hint::black_box;

fn targeted_flag() -> RuntimeConfig {
    let rule = |property: &str, operator: Operator, values: &[&str], result: &str| {
        ConditionalValue::when(
            vec![reforge::Criterion::new(
                property,
                operator,
                ConfigValue::string_list(values.iter().copied()),
            )],
            ConfigValue::string(result),
        )
    };

    RuntimeConfig::builder("bench.targeted")
        .id("1")
        .row(ConfigRow::for_env(
            5,
            vec![
                rule("user.plan", Operator::PropIsOneOf, &["pro", "team"], "paid"),
                rule("user.email", Operator::PropEndsWithOneOf, &["@example.com"], "staff"),
                rule("user.country", Operator::PropIsNotOneOf, &["US", "CA"], "intl"),
                ConditionalValue::always(ConfigValue::string("default")),
            ],
        ))
        .build(ValueType::String)
}

fn rollout_flag() -> RuntimeConfig {
    RuntimeConfig::builder("bench.rollout")
        .id("2")
        .row(ConfigRow::new(vec![ConditionalValue::always(ConfigValue::weighted(
            vec![
                WeightedValue {
                    weight: 50,
                    value: ConfigValue::string("control"),
                },
                WeightedValue {
                    weight: 30,
                    value: ConfigValue::string("variant-a"),
                },
                WeightedValue {
                    weight: 20,
                    value: ConfigValue::string("variant-b"),
                },
            ],
            Some("user.trackingId"),
        ))]))
        .build(ValueType::String)
}

fn bench_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookups");

    let mut resolver = Resolver::builder()
        .configs([targeted_flag(), rollout_flag()])
        .project_env_id(5)
        .build();
    resolver.set("bench.static", ConfigValue::bool(true)).unwrap();

    let staff = Contexts::new()
        .with("user", "email", "jo@example.com")
        .with("user", "country", "US")
        .with("user", "trackingId", "visitor-42");

    group.bench_function("static_value", |b| {
        b.iter(|| resolver.get(black_box("bench.static"), None).unwrap())
    });

    group.bench_function("targeted_match", |b| {
        b.iter(|| resolver.get(black_box("bench.targeted"), Some(&staff)).unwrap())
    });

    group.bench_function("hash_bound_rollout", |b| {
        b.iter(|| resolver.get(black_box("bench.rollout"), Some(&staff)).unwrap())
    });

    group.bench_function("missing_with_default", |b| {
        b.iter(|| resolver.get_or(black_box("bench.missing"), None, false).unwrap())
    });

    group.finish();
}

fn bench_log_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_levels");

    let mut resolver = Resolver::builder().build();
    resolver
        .set("log-level.app", ConfigValue::log_level(reforge::LogLevel::Info))
        .unwrap();

    group.bench_function("should_log_deep_path", |b| {
        b.iter(|| resolver.should_log(black_box("app.http.handlers.checkout"), "debug", None, None))
    });

    group.bench_function("get_log_level_missing_config", |b| {
        b.iter(|| resolver.get_log_level(black_box("app.http")))
    });

    group.finish();
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("stable_hash32", |b| {
        b.iter(|| stable_hash32(black_box("bench.rolloutvisitor-42")).unwrap())
    });

    let key = generate_new_hex_key();
    let payload = encrypt("some-secret", &key).unwrap();
    let mut resolver = Resolver::builder().build();
    resolver.set("bench.key", ConfigValue::string(key)).unwrap();
    resolver
        .set("bench.secret", ConfigValue::string(payload).decrypt_with("bench.key"))
        .unwrap();

    group.bench_function("decrypt_secret", |b| {
        b.iter(|| resolver.get(black_box("bench.secret"), None).unwrap())
    });

    group.finish();
}

criterion_group!(evaluation_benches, bench_lookups, bench_log_levels, bench_primitives);

criterion_main!(evaluation_benches);

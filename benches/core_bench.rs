//! Benchmarks for the compile pipeline.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jalm_provision::core::catalog::Catalog;
use jalm_provision::core::config::CompilerConfig;
use jalm_provision::core::diagnostics::Diagnostics;
use jalm_provision::core::types::{FunctionEntry, TemplateEntry};
use jalm_provision::core::{parser, planner, selector};
use jalm_provision::materialize::Materializer;

const INTENT: &str = r#"
app:
  name: Barbershop Classic
  runtime: python
features:
  booking_widget: true
  telegram_notifications: true
  file_upload: {max_mb: 10}
integrations:
  database: {enabled: true, type: postgresql, version: "15"}
  telegram_bot: {enabled: true}
  sendgrid: {enabled: true}
variables:
  ADMIN_CHAT_ID: ""
  SLOT_MINUTES: 30
"#;

fn catalog(n: usize) -> Catalog {
    let tags = ["booking", "validation", "notification", "slots", "reports", "admin"];
    let functions = (0..n)
        .map(|i| FunctionEntry {
            id: format!("fn_{i:04}"),
            version: "1.0.0".to_string(),
            description: format!("function {i}"),
            tags: vec![tags[i % tags.len()].to_string()],
        })
        .collect();
    let templates = (0..n / 2)
        .map(|i| TemplateEntry {
            id: format!("tpl-{i:04}"),
            version: "1.0.0".to_string(),
            description: String::new(),
            category: "general".to_string(),
            tags: vec![tags[i % tags.len()].to_string()],
        })
        .collect();
    Catalog::from_entries(functions, templates, &mut Diagnostics::default())
}

fn bench_slugify(c: &mut Criterion) {
    c.bench_function("slugify", |b| {
        b.iter(|| black_box(parser::slugify(black_box("Барбершоп 'Classic' Downtown #2"))));
    });
}

fn bench_parse_intent(c: &mut Criterion) {
    c.bench_function("parse_intent", |b| {
        b.iter(|| black_box(parser::parse(black_box(INTENT.as_bytes())).unwrap()));
    });
}

fn bench_select_and_plan(c: &mut Criterion) {
    let intent = parser::parse(INTENT.as_bytes()).unwrap();
    let config = CompilerConfig::default();
    let mut group = c.benchmark_group("select_and_plan");
    for n in [10, 100, 1000] {
        let cat = catalog(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &cat, |b, cat| {
            b.iter(|| {
                let mut diags = Diagnostics::default();
                let sel = selector::select(&intent, cat, &config.selection, &mut diags);
                let plan = planner::plan(&intent, &sel, &config.planning, &mut diags).unwrap();
                black_box(plan);
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let intent = parser::parse(INTENT.as_bytes()).unwrap();
    let config = CompilerConfig::default();
    let mut diags = Diagnostics::default();
    let sel = selector::select(&intent, &catalog(100), &config.selection, &mut diags);
    let plan = planner::plan(&intent, &sel, &config.planning, &mut diags).unwrap();
    let materializer = Materializer::from_config(&config);

    c.bench_function("render_deployment", |b| {
        b.iter(|| black_box(materializer.render(black_box(&plan)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_slugify,
    bench_parse_intent,
    bench_select_and_plan,
    bench_render
);
criterion_main!(benches);

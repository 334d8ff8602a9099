use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use filter_dispatcher::backend::FilterBuilder;
use filter_dispatcher::compiler::FilterCompiler;
use filter_dispatcher::config::{CompilerConfig, SchemaMapping};
use filter_dispatcher::lexer::Lexer;
use filter_dispatcher::normalizer::Normalizer;
use filter_dispatcher::parser::{parse_predicate, parse_predicates, Parser};
use std::hint::black_box;

const TEST_CASES: [(&str, &str); 4] = [
    ("simple", r#"r => r.Name == "Open""#),
    ("medium", r#"r => r.Age >= 18 && r.Tier != null && !["gold", "silver"].Contains(r.Tier)"#),
    (
        "complex",
        r#"r => (r.Name.StartsWith("A", true) || r.Score < 2.5 * 3) && !(r.Active == false || r.Created < @"2024-01-01T00:00:00Z") && [1, 2, null, 4 + 1].Contains(r.Age)"#,
    ),
    ("negations", r#"r => !(!(r.Age > 1 && !(r.Height <= 2)) || !r.Name.EndsWith("x"))"#),
];

// 创建一个使用演示字段映射的编译器
fn create_compiler() -> FilterCompiler {
    FilterCompiler::new(CompilerConfig::default(), SchemaMapping::demo())
}

// 基准测试：词法分析性能
fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for (name, text) in TEST_CASES {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &text, |b, &text| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(text)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

// 基准测试：语法分析性能
fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for (name, text) in TEST_CASES {
        // 预先词法分析
        let tokens: Vec<_> = Lexer::new(text).collect();

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(tokens));
                match parser.parse() {
                    Ok(predicates) => black_box(predicates),
                    Err(e) => panic!("解析失败: {e}"),
                }
            })
        });
    }

    group.finish();
}

// 基准测试：规范化性能
fn benchmark_normalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalizer_performance");
    let normalizer = Normalizer::new();

    for (name, text) in TEST_CASES {
        let predicate = parse_predicate(text).expect("解析应该成功");

        group.bench_with_input(BenchmarkId::new("normalize", name), &predicate, |b, predicate| {
            b.iter(|| black_box(normalizer.normalize(black_box(predicate)).expect("规范化应该成功")))
        });
    }

    group.finish();
}

// 基准测试：各后端过滤器生成性能
fn benchmark_builders(c: &mut Criterion) {
    let compiler = create_compiler();
    let document = compiler.document_builder();
    let search = compiler.search_builder();
    let sql = compiler.sql_builder();
    let mut group = c.benchmark_group("builder_performance");

    for (name, text) in TEST_CASES {
        let predicate = parse_predicate(text).expect("解析应该成功");
        let canonical = Normalizer::new().normalize(&predicate).expect("规范化应该成功");

        group.bench_with_input(BenchmarkId::new("document", name), &canonical, |b, node| {
            b.iter(|| black_box(document.build(black_box(node)).expect("生成应该成功")))
        });
        group.bench_with_input(BenchmarkId::new("search", name), &canonical, |b, node| {
            b.iter(|| black_box(search.build(black_box(node)).expect("生成应该成功")))
        });
        group.bench_with_input(BenchmarkId::new("sql", name), &canonical, |b, node| {
            b.iter(|| black_box(sql.build(black_box(node)).expect("生成应该成功")))
        });
    }

    group.finish();
}

// 基准测试：完整的端到端处理
fn benchmark_end_to_end(c: &mut Criterion) {
    let compiler = create_compiler();
    let mut group = c.benchmark_group("end_to_end_performance");

    for (name, text) in TEST_CASES {
        group.bench_with_input(BenchmarkId::new("full_pipeline", name), &text, |b, &text| {
            b.iter(|| {
                let predicates = parse_predicates(black_box(text)).expect("解析应该成功");
                let result = compiler.compile(&predicates).expect("编译应该成功");
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_normalizer,
    benchmark_builders,
    benchmark_end_to_end
);
criterion_main!(benches);

use anyhow::Context;
use filter_dispatcher::compiler::FilterCompiler;
use filter_dispatcher::config::{CompilerConfig, ConfigError};
use filter_dispatcher::parser::parse_predicates;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const DEFAULT_CONFIG_PATH: &str = "filter_dispatcher.json";

/// 加载编译器配置：显式指定的文件必须存在；默认文件缺失时使用默认配置
fn load_config(path: Option<&str>) -> anyhow::Result<CompilerConfig> {
    match path {
        Some(path) => CompilerConfig::from_json_file(path)
            .with_context(|| format!("无法加载配置文件 {path}")),
        None => match CompilerConfig::from_json_file(DEFAULT_CONFIG_PATH) {
            Ok(config) => {
                println!("✅ 使用JSON配置文件: {DEFAULT_CONFIG_PATH}");
                Ok(config)
            }
            Err(ConfigError::Missing(_)) => {
                println!("⚠️ 未找到 {DEFAULT_CONFIG_PATH}，使用默认配置");
                Ok(CompilerConfig::default())
            }
            Err(e) => Err(e.into()),
        },
    }
}

fn print_schema(compiler: &FilterCompiler) {
    let config = compiler.config();
    let mapping = compiler.schema_mapping();
    println!("记录类型: {}", config.record_type);
    println!("SQL 表名: {}", config.sql_table);
    println!("搜索过滤器扁平化: {}", config.flatten_search_filters);
    for record_type in mapping.record_types() {
        println!("[{record_type}]");
        if let Some(fields) = mapping.records.get(record_type) {
            let mut fields: Vec<_> = fields.iter().collect();
            fields.sort();
            for (property, storage) in fields {
                println!("  {property} -> {storage}");
            }
        }
    }
}

fn print_help() {
    println!("输入谓词，多个 Where 子句用 ';' 分隔，例如:");
    println!(r#"  r => r.Name == "a" && r.Age > 10"#);
    println!(r#"  Age >= 18; !["gold", "silver"].Contains(Tier)"#);
    println!("命令: :schema 显示字段映射, :help 显示帮助, :quit 退出");
}

/// 编译一行输入并打印所有后端的过滤器
fn compile_line(compiler: &FilterCompiler, line: &str) -> anyhow::Result<()> {
    let predicates = parse_predicates(line).context("解析失败")?;
    let compiled = compiler.compile(&predicates).context("编译失败")?;

    println!("\n[规范形式]:");
    for clause in &compiled.clauses {
        println!("  {clause}");
    }

    println!("\n[文档数据库]:");
    match &compiled.document {
        Some(filter) => println!("{}", serde_json::to_string_pretty(filter)?),
        None => println!("{{}}"),
    }

    println!("\n[搜索引擎]:");
    match &compiled.search {
        Some(filter) => println!("{}", serde_json::to_string_pretty(filter)?),
        None => println!(r#"{{ "match_all": {{}} }}"#),
    }

    println!("\n[SQL]:\n{}\n", compiled.sql);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    println!("--- Filter Dispatcher: 谓词到多后端过滤器编译器 ---");

    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref())?;
    let compiler = FilterCompiler::from_config(config).context("无法加载字段映射")?;
    tracing::info!(record_type = %compiler.config().record_type, "compiler ready");
    print_help();

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match line {
                    ":quit" | ":q" => break,
                    ":help" => print_help(),
                    ":schema" => print_schema(&compiler),
                    _ => {
                        if let Err(e) = compile_line(&compiler, line) {
                            println!("✗ {e:#}");
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use callback_chain::config::{self, EngineConfig};
use callback_chain::monitor::init_logging;
use callback_chain::{
    Action, CallbackEngine, CallbackTarget, Callable, ClassId, FilterSpec, Guard, Outcome, PoolStats, ChainDescription,
};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "callback_bench", about = "callback_chain 事件執行壓力測試工具")]
struct Cli {
    /// 事件執行次數
    #[arg(short, long, default_value_t = 100_000)]
    iterations: usize,

    /// 平行模式使用的執行緒數
    #[arg(short, long, default_value_t = num_cpus::get())]
    threads: usize,

    /// 使用 rayon 平行執行
    #[arg(short, long)]
    parallel: bool,

    /// 以 JSON 格式輸出結果
    #[arg(long)]
    json: bool,
}

/// 範例目標物件
struct Document {
    class: ClassId,
    title: String,
    words: usize,
    published: bool,
    audit: Vec<&'static str>,
}

impl Document {
    fn new(class: ClassId, index: usize) -> Self {
        Self {
            class,
            title: format!("  draft {}  ", index),
            words: index % 500,
            published: index % 3 == 0,
            audit: Vec::new(),
        }
    }
}

impl CallbackTarget for Document {
    fn class_id(&self) -> ClassId {
        self.class
    }
}

#[derive(Serialize)]
struct Report {
    iterations: usize,
    parallel: bool,
    threads: usize,
    completed: usize,
    halted: usize,
    elapsed_ms: f64,
    runs_per_sec: f64,
    pool: PoolStats,
    chains: Vec<ChainDescription>,
}

// 建立 Record -> Post 類別與過濾器
fn build_engine(config: &EngineConfig) -> Result<(CallbackEngine<Document, usize>, ClassId)> {
    let engine = CallbackEngine::new(config);
    let record = engine.register_class("Record", None)?;
    let post = engine.register_class("Post", Some(record))?;

    engine.define_event(record, "save")?;
    engine.define_method(
        record,
        "normalize_title",
        Callable::simple(|doc: &mut Document| {
            doc.title = doc.title.trim().to_string();
            Ok(Outcome::Continue)
        }),
    )?;
    engine.define_predicate(record, "empty", |doc: &Document| doc.words == 0)?;
    engine.attach(record, "save", FilterSpec::before(Action::method("normalize_title")))?;
    engine.attach(
        record,
        "save",
        FilterSpec::before(Action::inline(|_: &mut Document| Ok(Outcome::halt()))).guard(Guard::if_method("empty")),
    )?;

    // 子類別在第一次附加時取得父類別的快照
    engine.attach(
        post,
        "save",
        FilterSpec::around(Action::around(|doc: &mut Document, next| {
            doc.audit.push("transaction");
            next.run(doc)?;
            doc.audit.push("commit");
            Ok(())
        })),
    )?;
    engine.attach(
        post,
        "save",
        FilterSpec::after(Action::inline(|doc: &mut Document| {
            doc.audit.push("notify");
            Ok(Outcome::Continue)
        }))
        .when(|doc: &Document| doc.published),
    )?;

    Ok((engine, post))
}

fn run_once(engine: &CallbackEngine<Document, usize>, class: ClassId, index: usize) -> Result<bool> {
    let mut doc = Document::new(class, index);
    let outcome = engine
        .run_event(&mut doc, "save", |doc| doc.words * 2)
        .context("事件執行失敗")?;
    Ok(outcome.halted)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化配置，失敗時使用預設值
    let engine_config = match config::init_config() {
        Ok(config) => config.clone(),
        Err(e) => {
            eprintln!("無法加載配置，使用預設值: {}", e);
            EngineConfig::default()
        }
    };
    init_logging(&engine_config.log)?;

    let (engine, post) = build_engine(&engine_config)?;
    info!(
        "開始執行 {} 次事件 (parallel={}, threads={})",
        cli.iterations, cli.parallel, cli.threads
    );

    let started = Instant::now();
    let halted = if cli.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build()
            .context("無法建立執行緒池")?;
        pool.install(|| {
            (0..cli.iterations)
                .into_par_iter()
                .map(|index| run_once(&engine, post, index))
                .try_fold(|| 0usize, |acc, halted| halted.map(|h| acc + usize::from(h)))
                .try_reduce(|| 0, |a, b| Ok(a + b))
        })?
    } else {
        let mut halted = 0;
        for index in 0..cli.iterations {
            halted += usize::from(run_once(&engine, post, index)?);
        }
        halted
    };
    let elapsed = started.elapsed();

    let report = Report {
        iterations: cli.iterations,
        parallel: cli.parallel,
        threads: if cli.parallel { cli.threads } else { 1 },
        completed: cli.iterations - halted,
        halted,
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        runs_per_sec: throughput(cli.iterations, elapsed),
        pool: engine.pool_stats(),
        chains: engine
            .events(post)?
            .iter()
            .map(|event| engine.describe(post, event))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if report.pool.in_use != 0 {
        warn!("仍有 {} 個上下文未歸還", report.pool.in_use);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn throughput(iterations: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        iterations as f64 / secs
    } else {
        0.0
    }
}

fn print_report(report: &Report) {
    println!("執行次數:   {}", report.iterations);
    println!("完成 / 中止: {} / {}", report.completed, report.halted);
    println!("執行緒:     {}", report.threads);
    println!("耗時:       {:.2} ms ({:.0} 次/秒)", report.elapsed_ms, report.runs_per_sec);
    println!(
        "上下文池:   allocated={} free={} in_use={} acquisitions={}",
        report.pool.allocated, report.pool.free, report.pool.in_use, report.pool.acquisitions
    );
    for chain in &report.chains {
        println!("鏈 {} (version {}, compiled={}):", chain.event, chain.version, chain.compiled);
        for filter in &chain.filters {
            println!("  {:<6} {:?} guards={}", filter.kind.as_str(), filter.action, filter.guards);
        }
    }
}

//! Demo subjects, also used as the worker binary of the isolation tests.

use revbench::prelude::*;
use std::time::Duration;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

const BENCHMARK: &str = "demo";

fn sizes() -> Vec<ParameterSet> {
    vec![
        ParameterSet::new(0).with("size", "100"),
        ParameterSet::new(1).with("size", "10000"),
    ]
}

fn sum_vec(params: &ParameterSet) {
    let size = params.parse::<u64>("size").unwrap_or(100);
    let values: Vec<u64> = (0..size).collect();
    std::hint::black_box(values.iter().sum::<u64>());
}

fn fold_vec(params: &ParameterSet) {
    let size = params.parse::<u64>("size").unwrap_or(100);
    let values: Vec<u64> = (0..size).collect();
    std::hint::black_box(values.iter().fold(0u64, |acc, v| acc.wrapping_add(*v)));
}

fn chatty(_: &ParameterSet) {
    println!("debug: still here");
}

fn panicking(_: &ParameterSet) {
    panic!("subject exploded");
}

fn sleepy(params: &ParameterSet) {
    let millis = params.parse::<u64>("millis").unwrap_or(50);
    std::thread::sleep(Duration::from_millis(millis));
}

fn hooked(_: &ParameterSet) {
    std::hint::black_box(String::from("measured"));
}

fn prepare(_: &ParameterSet) -> HookResult {
    Ok(())
}

fn refuse(_: &ParameterSet) -> HookResult {
    Err("fixture unavailable".into())
}

register_subject!(
    SubjectDef::new(BENCHMARK, "sum_vec", sum_vec)
        .revs(50)
        .iterations(5)
        .warmup(1)
        .params(sizes)
        .groups(&["vectors"])
        .output_time_unit("microseconds")
);
register_subject!(
    SubjectDef::new(BENCHMARK, "fold_vec", fold_vec)
        .revs(50)
        .iterations(5)
        .params(sizes)
        .groups(&["vectors"])
        .retry_threshold(20.0)
);
register_subject!(SubjectDef::new(BENCHMARK, "chatty", chatty).groups(&["faulty"]));
register_subject!(SubjectDef::new(BENCHMARK, "panicking", panicking).groups(&["faulty"]));
register_subject!(SubjectDef::new(BENCHMARK, "sleepy", sleepy).groups(&["slow"]));
register_subject!(
    SubjectDef::new(BENCHMARK, "hooked", hooked)
        .before(&["prepare"])
        .after(&["prepare"])
        .revs(10)
        .iterations(3)
);
register_subject!(
    SubjectDef::new(BENCHMARK, "broken_setup", hooked)
        .before(&["refuse"])
        .groups(&["faulty"])
);
register_hook!(HookDef::new(BENCHMARK, "prepare", prepare));
register_hook!(HookDef::new(BENCHMARK, "refuse", refuse));

fn main() {
    if let Err(e) = revbench::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

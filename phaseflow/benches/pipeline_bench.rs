//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phaseflow::prelude::*;
use std::sync::Arc;

fn counting_pipeline(interceptors: usize) -> Pipeline<u64> {
    let call = ApplicationPhase::call();
    let mut pipeline = application_call_pipeline::<u64>().unwrap();
    for _ in 0..interceptors {
        pipeline
            .intercept(&call, |ctx, n| {
                ctx.on_finish(|| Ok(()));
                *n += 1;
                Ok(())
            })
            .unwrap();
    }
    pipeline
}

fn pipeline_benchmark(c: &mut Criterion) {
    let pipeline = counting_pipeline(16);
    c.bench_function("execute_16_interceptors", |b| {
        b.iter(|| black_box(pipeline.execute(black_box(0))))
    });

    let mut pausing = counting_pipeline(4);
    pausing
        .intercept(&ApplicationPhase::call(), |ctx, _| {
            ctx.pause();
            Ok(())
        })
        .unwrap();
    pausing
        .intercept(&ApplicationPhase::fallback(), |_, n| {
            *n += 1;
            Ok(())
        })
        .unwrap();
    c.bench_function("pause_and_proceed", |b| {
        b.iter(|| {
            let machine = PipelineMachine::new();
            let _ = machine.execute(0, &pausing);
            black_box(machine.proceed())
        })
    });

    let secondary = Arc::new(counting_pipeline(4));
    let mut forking = application_call_pipeline::<u64>().unwrap();
    forking
        .intercept(&ApplicationPhase::call(), move |ctx, n| {
            let _ = ctx.fork(*n, &secondary)?;
            Ok(())
        })
        .unwrap();
    c.bench_function("fork_4_interceptors", |b| {
        b.iter(|| black_box(forking.execute(black_box(0))))
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);

//! Field-access throughput: checked gate vs optimized bypass.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tabula_core::{
    arg, receiver, AccessMode, ClassBody, Config, Instance, Registry, UndefinedPolicy, Value,
};

fn build_registry(access: AccessMode) -> Registry {
    let reg = Registry::with_config(Config {
        undefined: UndefinedPolicy::Strict,
        access,
    });
    reg.define(
        "Particle",
        &[],
        ClassBody::new()
            .set("x", 0.0)
            .set("y", 0.0)
            .set("protected__vx", 1.0)
            .set("protected__vy", 1.0)
            .method("step", |args| {
                let this = receiver(args)?;
                let n = arg(args, 1).as_number().unwrap_or(1.0);
                for _ in 0..n as usize {
                    let x = this.get("x")?.as_number().unwrap_or(0.0);
                    let vx = this.get("vx")?.as_number().unwrap_or(0.0);
                    this.set("x", x + vx)?;
                }
                Ok(Value::Nil)
            }),
    )
    .unwrap();
    reg
}

fn spawn(reg: &Registry) -> Instance {
    reg.instantiate("Particle", &[])
        .unwrap()
        .as_instance()
        .cloned()
        .unwrap()
}

fn bench_public_access(c: &mut Criterion) {
    let checked = build_registry(AccessMode::Checked);
    let optimized = build_registry(AccessMode::Optimized);
    let a = spawn(&checked);
    let b = spawn(&optimized);

    c.bench_function("public_get_set/checked", |bench| {
        bench.iter(|| {
            let x = a.get("x").unwrap().as_number().unwrap();
            a.set("x", black_box(x + 1.0)).unwrap();
        })
    });
    c.bench_function("public_get_set/optimized", |bench| {
        bench.iter(|| {
            let x = b.get("x").unwrap().as_number().unwrap();
            b.set("x", black_box(x + 1.0)).unwrap();
        })
    });
}

fn bench_method_dispatch(c: &mut Criterion) {
    let reg = build_registry(AccessMode::Checked);
    let p = spawn(&reg);

    c.bench_function("method_step_100", |bench| {
        bench.iter(|| p.call("step", &[black_box(Value::Number(100.0))]).unwrap())
    });
}

fn bench_instantiate(c: &mut Criterion) {
    let reg = build_registry(AccessMode::Checked);

    c.bench_function("instantiate", |bench| {
        bench.iter(|| black_box(reg.instantiate("Particle", &[]).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_public_access,
    bench_method_dispatch,
    bench_instantiate
);
criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lumen_dom::{Props, VNode, h, text};
use lumen_renderer::{Detached, LiveNode, NewTree, reconcile_blocking};

fn rows(count: usize, edited_every: usize) -> Vec<VNode> {
    (0..count)
        .map(|i| {
            let label = if edited_every > 0 && i % edited_every == 0 {
                format!("row {i} (edited)")
            } else {
                format!("row {i}")
            };
            h(
                "tr",
                Props::new().set("class", "row"),
                vec![h("td", Props::new(), vec![text(label)])],
            )
            .with_key(i.to_string())
        })
        .collect()
}

fn bench_keyed_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_rows");
    group.sample_size(20);
    for &count in &[100usize, 1000usize] {
        let body = LiveNode::element("tbody");
        reconcile_blocking(&body, NewTree::Fragment(rows(count, 0)), &Detached, None);
        let edited = rows(count, 10);
        let plain = rows(count, 0);
        group.bench_with_input(BenchmarkId::new("update_every_10th", count), &count, |b, _| {
            b.iter(|| {
                reconcile_blocking(&body, NewTree::Fragment(edited.clone()), &Detached, None);
                reconcile_blocking(&body, NewTree::Fragment(plain.clone()), &Detached, None);
            });
        });

        let mut reversed = rows(count, 0);
        reversed.reverse();
        group.bench_with_input(BenchmarkId::new("reverse", count), &count, |b, _| {
            b.iter(|| {
                reconcile_blocking(&body, NewTree::Fragment(reversed.clone()), &Detached, None);
                reconcile_blocking(&body, NewTree::Fragment(plain.clone()), &Detached, None);
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().without_plots();
    targets = bench_keyed_rows
}
criterion_main!(benches);

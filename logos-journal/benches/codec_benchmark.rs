use criterion::{criterion_group, criterion_main, Criterion};
use logos_journal::{
    ChangeSpan, ContentHash, DeltaCodec, Direction, JournalConfig, MemoryHost, UndoRedoCoordinator,
};
use std::hint::black_box;

/// Source file with `n` occurrences of `old_name`, and the spans renaming them.
fn rename_fixture(n: usize) -> (String, Vec<ChangeSpan>) {
    let mut text = String::new();
    let mut spans = Vec::with_capacity(n);
    for i in 0..n {
        text.push_str(&format!("let value_{i} = "));
        let start = text.len();
        text.push_str("old_name");
        spans.push(ChangeSpan::new(start, text.len(), "new_name"));
        text.push_str("(x);\n");
    }
    (text, spans)
}

fn bench_encode_shared(c: &mut Criterion) {
    let (text, spans) = rename_fixture(500);
    let mut buf = Vec::new();

    c.bench_function("encode_undo_redo_500_shared", |b| {
        b.iter(|| {
            let codec = DeltaCodec::for_spans(black_box(&text), black_box(&spans));
            codec.encode_undo(&text, &spans, &mut buf).unwrap();
            codec.encode_redo(&spans, &mut buf).unwrap();
            black_box(buf.len());
        })
    });
}

fn bench_apply_undo(c: &mut Criterion) {
    let (text, spans) = rename_fixture(500);
    let codec = DeltaCodec::for_spans(&text, &spans);
    let new_text = logos_journal::span::apply(&text, &spans).unwrap();
    let mut blob = Vec::new();
    codec.encode_undo(&text, &spans, &mut blob).unwrap();
    let mut decoded = Vec::new();
    let mut out = String::new();

    c.bench_function("apply_undo_500_spans", |b| {
        b.iter(|| {
            codec
                .apply_into(black_box(&new_text), &blob, Direction::Undo, &mut decoded, &mut out)
                .unwrap();
            black_box(out.len());
        })
    });
}

fn bench_content_hash(c: &mut Criterion) {
    let (text, _) = rename_fixture(2000);

    c.bench_function("content_hash_2000_lines", |b| {
        b.iter(|| black_box(ContentHash::of(black_box(&text))))
    });
}

fn bench_commit_and_replay(c: &mut Criterion) {
    let (text, spans) = rename_fixture(100);

    c.bench_function("commit_and_undo_20_files", |b| {
        b.iter(|| {
            let mut coordinator = UndoRedoCoordinator::new(JournalConfig::for_testing());
            let mut host = MemoryHost::new();
            let files: Vec<_> = (0..20).map(|i| host.add_file(format!("f{i}.rs"), text.clone())).collect();

            let id = coordinator.begin_record().unwrap();
            for &file in &files {
                let (old, new) = host.apply_edit(file, &spans).unwrap();
                coordinator.add_file_delta(&mut host, id, file, &old, &new, &spans).unwrap();
            }
            coordinator.commit_record(&mut host, id, "rename old_name");
            black_box(coordinator.undo_multi_file(&mut host).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_encode_shared,
    bench_apply_undo,
    bench_content_hash,
    bench_commit_and_replay,
);
criterion_main!(benches);

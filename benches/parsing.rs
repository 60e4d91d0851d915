use std::hint::black_box;

use chatprep::{ChunkedParser, ClockZone, Corpus, Message, ParserConfig, Sender};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn build_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i % 5 == 4 {
                format!("continuation of message {}\n", i - 1)
            } else {
                format!(
                    "{}/{}/22, {}:{:02} pm - user{}: message number {i} with some text\n",
                    i % 28 + 1,
                    i % 12 + 1,
                    i % 12 + 1,
                    i % 60,
                    i % 17
                )
            }
        })
        .collect()
}

fn bench_parsing(c: &mut Criterion) {
    let lines = build_lines(1 << 16);
    let total_bytes: usize = lines.iter().map(String::len).sum();

    let mut group = c.benchmark_group("parse_lines");
    group.throughput(Throughput::Bytes(total_bytes as u64));
    for workers in [1usize, 4] {
        let cfg = ParserConfig::builder()
            .workers(workers)
            .clock_zone(ClockZone::Utc)
            .build()
            .expect("configuration");
        let parser = ChunkedParser::new(&cfg);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &lines, |b, lines| {
            b.iter(|| {
                let parsed = parser.parse_lines(lines, 0, 0).expect("parse");
                let _ = black_box(parsed);
            });
        });
    }
    group.finish();
}

fn greek(i: usize) -> char {
    char::from_u32(0x3b1 + (i % 40) as u32).unwrap_or('x')
}

fn bench_rare_filter(c: &mut Criterion) {
    let messages: Vec<Message> = (0..1 << 15)
        .map(|i: usize| Message {
            time: i as i64,
            sender: Sender::Id((i % 7) as u32),
            content: format!("msg {i} {}", greek(i)),
            line_index: i,
            chat_id: 0,
        })
        .collect();

    c.bench_function("filter_rare_keep_32", |b| {
        b.iter(|| {
            let mut corpus = Corpus::from_messages(messages.clone());
            let report = corpus.filter_rare(32, 4).expect("filter");
            let _ = black_box(report);
        });
    });
}

criterion_group!(benches, bench_parsing, bench_rare_filter);
criterion_main!(benches);

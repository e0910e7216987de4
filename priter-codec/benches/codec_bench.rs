use criterion::{criterion_group, criterion_main, Criterion};
use priter_codec::{RecordKind, RecordReader, RecordWriter};

fn encode_decode_kv_stream(c: &mut Criterion) {
    c.bench_function("encode 1000 kv records", |b| {
        b.iter(|| {
            let mut buf = Vec::new();
            let mut writer = RecordWriter::new(&mut buf, RecordKind::Kv);
            for i in 0..1000 {
                let key = format!("key-{i}");
                let value = format!("value-{i}");
                writer.append_kv(key.as_bytes(), value.as_bytes()).unwrap();
            }
            writer.close().unwrap();
        })
    });

    let mut encoded = Vec::new();
    {
        let mut writer = RecordWriter::new(&mut encoded, RecordKind::Kv);
        for i in 0..1000 {
            let key = format!("key-{i}");
            let value = format!("value-{i}");
            writer.append_kv(key.as_bytes(), value.as_bytes()).unwrap();
        }
        writer.close().unwrap();
    }

    c.bench_function("decode 1000 kv records", |b| {
        b.iter(|| {
            let mut reader = RecordReader::new(&encoded[..], RecordKind::Kv);
            let mut count = 0;
            while reader.next().unwrap().is_some() {
                count += 1;
            }
            assert_eq!(count, 1000);
        })
    });
}

criterion_group!(benches, encode_decode_kv_stream);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use xraypanel::geodata::parse_geo_tags;

fn varint(mut v: u64, out: &mut Vec<u8>) {
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn len_field(field: u64, payload: &[u8], out: &mut Vec<u8>) {
    varint((field << 3) | 2, out);
    varint(payload.len() as u64, out);
    out.extend_from_slice(payload);
}

/// 模拟 geosite.dat：每个条目带若干域名子消息
fn geosite_fixture(entries: usize, domains_per_entry: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..entries {
        let mut entry = Vec::new();
        len_field(1, format!("TAG-{}", i % (entries / 2).max(1)).as_bytes(), &mut entry);
        for j in 0..domains_per_entry {
            let mut domain = Vec::new();
            varint(1 << 3, &mut domain);
            varint(2, &mut domain);
            len_field(2, format!("host{}.site{}.com", j, i).as_bytes(), &mut domain);
            len_field(2, &domain, &mut entry);
        }
        len_field(1, &entry, &mut buf);
    }
    buf
}

/// 模拟 geoip.dat：每个条目带 CIDR 列表
fn geoip_fixture(entries: usize, cidrs_per_entry: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..entries {
        let mut entry = Vec::new();
        len_field(1, format!("c{}", i).as_bytes(), &mut entry);
        for j in 0..cidrs_per_entry {
            let mut cidr = Vec::new();
            len_field(1, &[(j % 256) as u8, (i % 256) as u8, 0, 0], &mut cidr);
            varint(2 << 3, &mut cidr);
            varint(16, &mut cidr);
            len_field(2, &cidr, &mut entry);
        }
        len_field(1, &entry, &mut buf);
    }
    buf
}

fn bench_geosite(c: &mut Criterion) {
    let buf = geosite_fixture(1500, 40);
    c.bench_function("geosite_tags_1500_entries", |b| {
        b.iter(|| {
            black_box(parse_geo_tags(black_box(&buf)).unwrap());
        });
    });
}

fn bench_geoip(c: &mut Criterion) {
    let buf = geoip_fixture(250, 400);
    c.bench_function("geoip_codes_250_entries", |b| {
        b.iter(|| {
            black_box(parse_geo_tags(black_box(&buf)).unwrap());
        });
    });
}

criterion_group!(benches, bench_geosite, bench_geoip);
criterion_main!(benches);

// Copyright (c) 2025 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;
use std::time::Instant;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;

use wave_cc::congestion_control::BurstLedger;
use wave_cc::AckBurst;
use wave_cc::Config;
use wave_cc::CongestionController;
use wave_cc::SentPacket;

pub fn burst_ledger_benchmark(c: &mut Criterion) {
    const RANGE: u64 = 1_000;
    let now = Instant::now();

    let mut ledger = BurstLedger::new();
    for i in 0..RANGE {
        ledger.record_sent(now + Duration::from_millis(i), 1444);
    }
    let tail = now + Duration::from_millis(RANGE - 1);
    c.bench_function("burst ledger find tail", |b| b.iter(|| ledger.find(tail)));

    c.bench_function("burst ledger record and excise", |b| {
        b.iter(|| {
            let id = ledger.record_sent(now + Duration::from_secs(3600), 1444);
            ledger.excise(id)
        })
    });
}

pub fn wave_benchmark(c: &mut Criterion) {
    let conf = Config::new().unwrap();
    let mut stats = conf.new_connection_stats();
    let mut cc = conf.new_congestion_controller(&mut stats);
    let start = Instant::now();

    c.bench_function("wave burst sampled", |b| {
        let mut round = 0;
        b.iter(|| {
            round += 1;
            let sent = start + Duration::from_millis(round);
            for pkt_num in 0..10 {
                let pkt = SentPacket {
                    pkt_num,
                    time_sent: sent,
                    sent_size: 1444,
                };
                cc.on_sent(&mut stats, &pkt);
            }
            for pkt_num in 0..10 {
                let pkt = SentPacket {
                    pkt_num,
                    time_sent: sent,
                    sent_size: 1444,
                };
                let acked = sent + Duration::from_millis(20) + Duration::from_micros(pkt_num * 100);
                cc.on_ack(&mut stats, &pkt, acked);
            }
        })
    });

    c.bench_function("wave ack burst", |b| {
        let ack = AckBurst::new(14440, Duration::from_millis(20));
        b.iter(|| cc.on_ack_burst(&mut stats, &ack, start))
    });
}

criterion_group!(benches, burst_ledger_benchmark, wave_benchmark);
criterion_main!(benches);

//! Round-trip timing arithmetic.
//!
//! Each round trip is logged as a set of stage spans (start/end clock
//! readings). Sensor and gateway clocks tick in microseconds, data-storage
//! clocks in nanoseconds. All derived metrics are in milliseconds.
//!
//! On disk a round-trip log is a directory holding one `<STAGE>.csv` per
//! stage with `Start_Time` and `End_Time` columns; row `i` of every file
//! belongs to round trip `i`.

use crate::core::aggregate::{percent_of, MeanStd};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Resolution of a stage clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockUnit {
    Micros,
    Nanos,
}

impl ClockUnit {
    fn per_ms(self) -> f64 {
        match self {
            ClockUnit::Micros => 1e3,
            ClockUnit::Nanos => 1e6,
        }
    }
}

/// Start and end clock readings of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSpan {
    pub start: f64,
    pub end: f64,
}

impl StageSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Elapsed time in ms.
    pub fn delta_ms(&self, unit: ClockUnit) -> f64 {
        (self.end - self.start) / unit.per_ms()
    }
}

/// Logged stages of a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Rtt,
    SensorSend,
    SensorReceive,
    GatewayUpstream,
    GatewayDownstream,
    Storage,
    Encrypt,
    Decrypt,
    StorageEncrypt,
    StorageDecrypt,
}

impl Stage {
    /// Log file stem.
    pub fn file_stem(self) -> &'static str {
        match self {
            Stage::Rtt => "RTT",
            Stage::SensorSend => "S_PROC",
            Stage::SensorReceive => "R_PROC",
            Stage::GatewayUpstream => "GW_US_PROC",
            Stage::GatewayDownstream => "GW_DS_PROC",
            Stage::Storage => "DS_PROC",
            Stage::Encrypt => "ENC",
            Stage::Decrypt => "DEC",
            Stage::StorageEncrypt => "DS_ENC",
            Stage::StorageDecrypt => "DS_DEC",
        }
    }

    pub fn clock(self) -> ClockUnit {
        match self {
            Stage::Storage | Stage::StorageEncrypt | Stage::StorageDecrypt => ClockUnit::Nanos,
            _ => ClockUnit::Micros,
        }
    }
}

/// Encryption and decryption spans of one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CryptoSpans {
    pub encrypt: StageSpan,
    pub decrypt: StageSpan,
}

impl CryptoSpans {
    fn total_ms(&self, unit: ClockUnit) -> f64 {
        self.encrypt.delta_ms(unit) + self.decrypt.delta_ms(unit)
    }
}

/// One round trip: sensor -> gateway -> data storage -> gateway -> sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundTripRecord {
    pub rtt: StageSpan,
    pub sensor_send: StageSpan,
    pub sensor_receive: StageSpan,
    pub gateway_upstream: StageSpan,
    pub gateway_downstream: StageSpan,
    pub storage: StageSpan,
    /// Absent when the method does not encrypt
    pub sensor_crypto: Option<CryptoSpans>,
    pub storage_crypto: Option<CryptoSpans>,
}

/// Why a record was rejected. A record can fail several checks at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub non_finite: bool,
    pub zero: bool,
    pub start_after_end: bool,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        !(self.non_finite || self.zero || self.start_after_end)
    }
}

impl RoundTripRecord {
    fn spans(&self) -> impl Iterator<Item = StageSpan> + '_ {
        let crypto = [self.sensor_crypto, self.storage_crypto]
            .into_iter()
            .flatten()
            .flat_map(|c| [c.encrypt, c.decrypt]);
        [
            self.rtt,
            self.sensor_send,
            self.sensor_receive,
            self.gateway_upstream,
            self.gateway_downstream,
            self.storage,
        ]
        .into_iter()
        .chain(crypto)
    }

    /// Check every clock reading: zero, NaN/inf, and start after end are
    /// invalid.
    pub fn validity(&self) -> Validity {
        let mut validity = Validity::default();
        for span in self.spans() {
            for v in [span.start, span.end] {
                validity.non_finite |= !v.is_finite();
                validity.zero |= v == 0.0;
            }
            validity.start_after_end |= span.start > span.end;
        }
        validity
    }

    pub fn rtt_ms(&self) -> f64 {
        self.rtt.delta_ms(Stage::Rtt.clock())
    }

    pub fn sensor_send_ms(&self) -> f64 {
        self.sensor_send.delta_ms(Stage::SensorSend.clock())
    }

    pub fn sensor_receive_ms(&self) -> f64 {
        self.sensor_receive.delta_ms(Stage::SensorReceive.clock())
    }

    pub fn gateway_upstream_ms(&self) -> f64 {
        self.gateway_upstream.delta_ms(Stage::GatewayUpstream.clock())
    }

    pub fn gateway_downstream_ms(&self) -> f64 {
        self.gateway_downstream.delta_ms(Stage::GatewayDownstream.clock())
    }

    pub fn storage_ms(&self) -> f64 {
        self.storage.delta_ms(Stage::Storage.clock())
    }

    /// RTT minus all processing stages.
    pub fn hw_and_network_ms(&self) -> f64 {
        self.rtt_ms()
            - self.sensor_send_ms()
            - self.sensor_receive_ms()
            - self.gateway_downstream_ms()
            - self.gateway_upstream_ms()
            - self.storage_ms()
    }

    /// Hardware and network time as a percentage of RTT.
    pub fn hw_and_network_share(&self) -> Option<f64> {
        percent_of(self.hw_and_network_ms(), self.rtt_ms())
    }

    /// Gateway -> data storage -> gateway, without storage processing.
    pub fn storage_network_ms(&self) -> f64 {
        let gateway_gap = StageSpan::new(self.gateway_upstream.end, self.gateway_downstream.start);
        gateway_gap.delta_ms(ClockUnit::Micros) - self.storage_ms()
    }

    /// Time spent on the BLE link: RTT minus the gateway's whole turnaround
    /// and the sensor's own processing.
    pub fn ble_transmission_ms(&self) -> f64 {
        let gateway_turnaround =
            StageSpan::new(self.gateway_upstream.start, self.gateway_downstream.end);
        self.rtt_ms()
            - gateway_turnaround.delta_ms(ClockUnit::Micros)
            - self.sensor_send_ms()
            - self.sensor_receive_ms()
    }

    pub fn sensor_crypto_ms(&self) -> Option<f64> {
        self.sensor_crypto.map(|c| c.total_ms(ClockUnit::Micros))
    }

    pub fn storage_crypto_ms(&self) -> Option<f64> {
        self.storage_crypto.map(|c| c.total_ms(ClockUnit::Nanos))
    }

    /// Sensor encryption + decryption as a percentage of RTT.
    pub fn sensor_crypto_share(&self) -> Option<f64> {
        percent_of(self.sensor_crypto_ms()?, self.rtt_ms())
    }

    /// Storage encryption + decryption as a percentage of RTT.
    pub fn storage_crypto_share(&self) -> Option<f64> {
        percent_of(self.storage_crypto_ms()?, self.rtt_ms())
    }
}

/// Derived per-record quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMetric {
    Rtt,
    SensorProcessing,
    SensorReceive,
    StorageProcessing,
    GatewayUpstream,
    GatewayDownstream,
    HwAndNetwork,
    HwAndNetworkShare,
    StorageNetwork,
    BleTransmission,
    SensorCrypto,
    StorageCrypto,
    SensorCryptoShare,
    StorageCryptoShare,
}

impl TimingMetric {
    pub const ALL: [TimingMetric; 14] = [
        TimingMetric::Rtt,
        TimingMetric::SensorProcessing,
        TimingMetric::SensorReceive,
        TimingMetric::StorageProcessing,
        TimingMetric::GatewayUpstream,
        TimingMetric::GatewayDownstream,
        TimingMetric::HwAndNetwork,
        TimingMetric::HwAndNetworkShare,
        TimingMetric::StorageNetwork,
        TimingMetric::BleTransmission,
        TimingMetric::SensorCrypto,
        TimingMetric::StorageCrypto,
        TimingMetric::SensorCryptoShare,
        TimingMetric::StorageCryptoShare,
    ];

    /// Value for one record; `None` when undefined for it.
    pub fn of(self, record: &RoundTripRecord) -> Option<f64> {
        match self {
            TimingMetric::Rtt => Some(record.rtt_ms()),
            TimingMetric::SensorProcessing => Some(record.sensor_send_ms()),
            TimingMetric::SensorReceive => Some(record.sensor_receive_ms()),
            TimingMetric::StorageProcessing => Some(record.storage_ms()),
            TimingMetric::GatewayUpstream => Some(record.gateway_upstream_ms()),
            TimingMetric::GatewayDownstream => Some(record.gateway_downstream_ms()),
            TimingMetric::HwAndNetwork => Some(record.hw_and_network_ms()),
            TimingMetric::HwAndNetworkShare => record.hw_and_network_share(),
            TimingMetric::StorageNetwork => Some(record.storage_network_ms()),
            TimingMetric::BleTransmission => Some(record.ble_transmission_ms()),
            TimingMetric::SensorCrypto => record.sensor_crypto_ms(),
            TimingMetric::StorageCrypto => record.storage_crypto_ms(),
            TimingMetric::SensorCryptoShare => record.sensor_crypto_share(),
            TimingMetric::StorageCryptoShare => record.storage_crypto_share(),
        }
    }
}

impl fmt::Display for TimingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimingMetric::Rtt => "Round Trip Time [ms]",
            TimingMetric::SensorProcessing => "Sensor Processing Time [ms]",
            TimingMetric::SensorReceive => "Sensor Receive Processing Time [ms]",
            TimingMetric::StorageProcessing => "Data-Storage Processing Time [ms]",
            TimingMetric::GatewayUpstream => "Gateway Upstream Processing Time [ms]",
            TimingMetric::GatewayDownstream => "Gateway Downstream Processing Time [ms]",
            TimingMetric::HwAndNetwork => "Hardware and Network Time [ms]",
            TimingMetric::HwAndNetworkShare => "Hardware and Network Time [% of RTT]",
            TimingMetric::StorageNetwork => "Gateway to Data-Storage to Gateway Time [ms]",
            TimingMetric::BleTransmission => "BLE Transmission Time [ms]",
            TimingMetric::SensorCrypto => "Sensor Crypto Time [ms]",
            TimingMetric::StorageCrypto => "Data-Storage Crypto Time [ms]",
            TimingMetric::SensorCryptoShare => "Sensor Crypto Time [% of RTT]",
            TimingMetric::StorageCryptoShare => "Data-Storage Crypto Time [% of RTT]",
        };
        f.write_str(label)
    }
}

/// Counts of rejected records by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCounts {
    pub kept: usize,
    pub removed: usize,
    pub non_finite: usize,
    pub zero: usize,
    pub start_after_end: usize,
}

/// Drop invalid records, counting each failed check.
pub fn filter_valid(records: Vec<RoundTripRecord>) -> (Vec<RoundTripRecord>, FilterCounts) {
    let total = records.len();
    let mut counts = FilterCounts::default();
    let kept: Vec<RoundTripRecord> = records
        .into_iter()
        .filter(|record| {
            let validity = record.validity();
            counts.non_finite += usize::from(validity.non_finite);
            counts.zero += usize::from(validity.zero);
            counts.start_after_end += usize::from(validity.start_after_end);
            validity.is_valid()
        })
        .collect();

    counts.kept = kept.len();
    counts.removed = total - kept.len();
    (kept, counts)
}

/// Mean/std of every metric across records; undefined values are skipped.
pub fn summarize_timing(records: &[RoundTripRecord]) -> Vec<(TimingMetric, MeanStd)> {
    TimingMetric::ALL
        .iter()
        .map(|&metric| {
            let values = records.iter().filter_map(move |r| metric.of(r));
            (metric, MeanStd::of_iter(values))
        })
        .filter(|(_, stats)| !stats.is_empty())
        .collect()
}

/// Start and end columns of one stage file. Empty cells are NaN.
fn read_stage(path: &Path) -> Result<Vec<StageSpan>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            Error::MalformedTrace(format!("{}: missing column '{name}'", path.display()))
        })
    };
    let start_col = column("Start_Time")?;
    let end_col = column("End_Time")?;

    let parse = |field: Option<&str>, row: usize| -> Result<f64> {
        match field.unwrap_or("") {
            "" => Ok(f64::NAN),
            s => s.parse().map_err(|_| {
                Error::MalformedTrace(format!("{}: row {row}: bad value '{s}'", path.display()))
            }),
        }
    };

    let mut spans = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        spans.push(StageSpan::new(
            parse(record.get(start_col), i + 1)?,
            parse(record.get(end_col), i + 1)?,
        ));
    }
    Ok(spans)
}

/// Load the round-trip log in `dir`.
///
/// Every non-crypto stage file must exist. Crypto stages are attached only
/// when both files of a pair are present and `with_crypto` is set. Rows
/// missing from a shorter file become NaN spans and fail validation.
pub fn load_round_trips(dir: impl AsRef<Path>, with_crypto: bool) -> Result<Vec<RoundTripRecord>> {
    let dir = dir.as_ref();
    let load = |stage: Stage| -> Result<Option<Vec<StageSpan>>> {
        let path = dir.join(format!("{}.csv", stage.file_stem()));
        if path.exists() {
            read_stage(&path).map(Some)
        } else {
            Ok(None)
        }
    };
    let require = |stage: Stage| -> Result<Vec<StageSpan>> {
        load(stage)?.ok_or_else(|| {
            Error::MalformedTrace(format!(
                "{}: missing {}.csv",
                dir.display(),
                stage.file_stem()
            ))
        })
    };

    let rtt = require(Stage::Rtt)?;
    let sensor_send = require(Stage::SensorSend)?;
    let sensor_receive = require(Stage::SensorReceive)?;
    let gateway_upstream = require(Stage::GatewayUpstream)?;
    let gateway_downstream = require(Stage::GatewayDownstream)?;
    let storage = require(Stage::Storage)?;

    let pair = |enc: Stage, dec: Stage| -> Result<Option<(Vec<StageSpan>, Vec<StageSpan>)>> {
        if !with_crypto {
            return Ok(None);
        }
        Ok(load(enc)?.zip(load(dec)?))
    };
    let sensor_crypto = pair(Stage::Encrypt, Stage::Decrypt)?;
    let storage_crypto = pair(Stage::StorageEncrypt, Stage::StorageDecrypt)?;

    let required = [
        &rtt,
        &sensor_send,
        &sensor_receive,
        &gateway_upstream,
        &gateway_downstream,
        &storage,
    ];
    let rows = required
        .iter()
        .map(|s| s.len())
        .chain(sensor_crypto.iter().flat_map(|(e, d)| [e.len(), d.len()]))
        .chain(storage_crypto.iter().flat_map(|(e, d)| [e.len(), d.len()]))
        .max()
        .unwrap_or(0);

    let missing = StageSpan::new(f64::NAN, f64::NAN);
    let at = |spans: &[StageSpan], i: usize| spans.get(i).copied().unwrap_or(missing);
    let crypto_at = |pair: &Option<(Vec<StageSpan>, Vec<StageSpan>)>, i: usize| {
        pair.as_ref().map(|(enc, dec)| CryptoSpans {
            encrypt: at(enc, i),
            decrypt: at(dec, i),
        })
    };

    let records: Vec<RoundTripRecord> = (0..rows)
        .map(|i| RoundTripRecord {
            rtt: at(&rtt, i),
            sensor_send: at(&sensor_send, i),
            sensor_receive: at(&sensor_receive, i),
            gateway_upstream: at(&gateway_upstream, i),
            gateway_downstream: at(&gateway_downstream, i),
            storage: at(&storage, i),
            sensor_crypto: crypto_at(&sensor_crypto, i),
            storage_crypto: crypto_at(&storage_crypto, i),
        })
        .collect();

    debug!(dir = %dir.display(), rows, "loaded round-trip log");
    Ok(records)
}

/// Load, filter and summarize one round-trip log.
pub fn analyze_round_trips(
    dir: impl AsRef<Path>,
    with_crypto: bool,
) -> Result<(Vec<(TimingMetric, MeanStd)>, FilterCounts)> {
    let dir = dir.as_ref();
    let (records, counts) = filter_valid(load_round_trips(dir, with_crypto)?);
    if counts.removed > 0 {
        info!(
            dir = %dir.display(),
            removed = counts.removed,
            non_finite = counts.non_finite,
            zero = counts.zero,
            start_after_end = counts.start_after_end,
            "dropped invalid round trips"
        );
    }
    Ok((summarize_timing(&records), counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RTT 10 ms; sensor 1 + 0.5 ms; gateway up 0.2 ms, down 0.3 ms;
    /// storage 2 ms (in ns); gateway gap 4 ms.
    fn record() -> RoundTripRecord {
        RoundTripRecord {
            rtt: StageSpan::new(1_000.0, 11_000.0),
            sensor_send: StageSpan::new(1_000.0, 2_000.0),
            sensor_receive: StageSpan::new(10_500.0, 11_000.0),
            gateway_upstream: StageSpan::new(3_000.0, 3_200.0),
            gateway_downstream: StageSpan::new(7_200.0, 7_500.0),
            storage: StageSpan::new(5_000_000.0, 7_000_000.0),
            sensor_crypto: None,
            storage_crypto: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_stage_deltas() {
        let r = record();
        assert!(close(r.rtt_ms(), 10.0));
        assert!(close(r.sensor_send_ms(), 1.0));
        assert!(close(r.sensor_receive_ms(), 0.5));
        assert!(close(r.gateway_upstream_ms(), 0.2));
        assert!(close(r.gateway_downstream_ms(), 0.3));
        assert!(close(r.storage_ms(), 2.0));
    }

    #[test]
    fn test_hw_and_network() {
        let r = record();
        // 10 - 1 - 0.5 - 0.3 - 0.2 - 2
        assert!(close(r.hw_and_network_ms(), 6.0));
        assert!(close(r.hw_and_network_share().unwrap(), 60.0));
    }

    #[test]
    fn test_ble_transmission() {
        let r = record();
        // Gateway turnaround 3000..7500 us = 4.5 ms; 10 - 4.5 - 1 - 0.5
        assert!(close(r.ble_transmission_ms(), 4.0));
    }

    #[test]
    fn test_storage_network() {
        let r = record();
        // Gap 3200..7200 us = 4 ms, minus 2 ms storage processing
        assert!(close(r.storage_network_ms(), 2.0));
    }

    #[test]
    fn test_crypto_shares() {
        let mut r = record();
        assert_eq!(r.sensor_crypto_share(), None);

        r.sensor_crypto = Some(CryptoSpans {
            encrypt: StageSpan::new(1_100.0, 1_400.0),
            decrypt: StageSpan::new(10_600.0, 10_800.0),
        });
        r.storage_crypto = Some(CryptoSpans {
            encrypt: StageSpan::new(5_100_000.0, 5_600_000.0),
            decrypt: StageSpan::new(6_000_000.0, 6_500_000.0),
        });
        assert!(close(r.sensor_crypto_ms().unwrap(), 0.5));
        assert!(close(r.sensor_crypto_share().unwrap(), 5.0));
        assert!(close(r.storage_crypto_share().unwrap(), 10.0));
    }

    #[test]
    fn test_zero_rtt_share_is_undefined() {
        let mut r = record();
        r.rtt = StageSpan::new(5.0, 5.0);
        assert_eq!(r.hw_and_network_share(), None);
    }

    #[test]
    fn test_validity() {
        assert!(record().validity().is_valid());

        let mut r = record();
        r.rtt.start = 0.0;
        assert!(r.validity().zero);

        let mut r = record();
        r.storage.end = f64::INFINITY;
        assert!(r.validity().non_finite);

        let mut r = record();
        r.sensor_send = StageSpan::new(2_000.0, 1_000.0);
        let v = r.validity();
        assert!(v.start_after_end);
        assert!(!v.zero);
    }

    #[test]
    fn test_filter_valid_counts() {
        let mut bad_zero = record();
        bad_zero.gateway_upstream.end = 0.0;
        let mut bad_nan = record();
        bad_nan.rtt.end = f64::NAN;

        let (kept, counts) = filter_valid(vec![record(), bad_zero, bad_nan, record()]);
        assert_eq!(kept.len(), 2);
        assert_eq!(counts.kept, 2);
        assert_eq!(counts.removed, 2);
        assert_eq!(counts.zero, 1);
        // Zero end before a positive start also trips the ordering check.
        assert_eq!(counts.start_after_end, 1);
        assert_eq!(counts.non_finite, 1);
    }

    #[test]
    fn test_summarize_skips_undefined() {
        let summary = summarize_timing(&[record(), record()]);
        let metrics: Vec<TimingMetric> = summary.iter().map(|(m, _)| *m).collect();

        assert!(metrics.contains(&TimingMetric::BleTransmission));
        assert!(!metrics.contains(&TimingMetric::SensorCrypto));

        let (_, rtt) = summary[0];
        assert!(close(rtt.mean, 10.0));
        assert_eq!(rtt.std, 0.0);
    }

    #[test]
    fn test_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("rtt_log_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let write = |stem: &str, rows: &[(&str, &str)]| {
            let mut text = String::from("Seq_Num,Start_Time,End_Time\n");
            for (i, (s, e)) in rows.iter().enumerate() {
                text.push_str(&format!("{i},{s},{e}\n"));
            }
            std::fs::write(dir.join(format!("{stem}.csv")), text).unwrap();
        };
        write("RTT", &[("1000", "11000"), ("1000", "12000")]);
        write("S_PROC", &[("1000", "2000"), ("1000", "2000")]);
        write("R_PROC", &[("10500", "11000"), ("10500", "11000")]);
        write("GW_US_PROC", &[("3000", "3200"), ("3000", "3200")]);
        write("GW_DS_PROC", &[("7200", "7500"), ("", "7500")]);
        write("DS_PROC", &[("5000000", "7000000")]);
        write("ENC", &[("1100", "1400"), ("1100", "1400")]);

        let records = load_round_trips(&dir, true).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record());
        // DEC.csv is missing, so sensor crypto is not attached.
        assert!(records[0].sensor_crypto.is_none());

        let (kept, counts) = filter_valid(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(counts.non_finite, 1);

        std::fs::remove_file(dir.join("RTT.csv")).unwrap();
        let err = load_round_trips(&dir, false).unwrap_err();
        assert!(err.to_string().contains("RTT.csv"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

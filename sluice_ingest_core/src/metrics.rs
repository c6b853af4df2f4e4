use sluice_observability::{Counter, Histogram, UpDownCounter};

pub struct IngestionMetrics {
    pub actions: Counter<u64>,
    pub bytes: Counter<u64>,
    pub failed_items: Counter<u64>,
    pub in_flight_batches: UpDownCounter<i64>,
    pub batch_duration: Histogram<f64>,
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        let meter = sluice_observability::meter("ingest");
        Self {
            actions: meter
                .u64_counter("ingest.bulk.actions")
                .with_unit("{action}")
                .with_description("number of operations sent to the cluster")
                .build(),
            bytes: meter
                .u64_counter("ingest.bulk.bytes")
                .with_unit("By")
                .with_description("estimated bytes sent to the cluster")
                .build(),
            failed_items: meter
                .u64_counter("ingest.bulk.failed_items")
                .with_unit("{action}")
                .with_description("number of operations rejected or lost")
                .build(),
            in_flight_batches: meter
                .i64_up_down_counter("ingest.bulk.in_flight")
                .with_unit("{batch}")
                .with_description("number of batches handed to the transport")
                .build(),
            batch_duration: meter
                .f64_histogram("ingest.bulk.duration")
                .with_unit("s")
                .with_description("time to complete a batch")
                .build(),
        }
    }
}

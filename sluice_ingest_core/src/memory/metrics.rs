use sluice_observability::UpDownCounter;

#[derive(Debug)]
pub struct ClusterMetrics {
    pub indices_count: UpDownCounter<i64>,
    pub documents_count: UpDownCounter<i64>,
}

impl Default for ClusterMetrics {
    fn default() -> Self {
        let meter = sluice_observability::meter("cluster");

        Self {
            indices_count: meter
                .i64_up_down_counter("cluster.indices.count")
                .with_description("the number of indices")
                .build(),
            documents_count: meter
                .i64_up_down_counter("cluster.documents.count")
                .with_description("the number of stored documents")
                .build(),
        }
    }
}
